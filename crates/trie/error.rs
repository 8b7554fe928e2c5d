use ethereum_types::H256;
use mpt_rlp::error::RLPDecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error("Invalid root: root hashes must be 32 bytes long")]
    InvalidRoot,
    #[error("Node with hash {0:#x} is missing from the store")]
    MissingNode(H256),
    #[error("Key is reserved for root persistence")]
    ReservedKey,
    #[error("Invalid batch operation: put with an empty value")]
    InvalidBatchOp,
    #[error("Mutation stack underflow")]
    StackUnderflow,
    #[error("Invalid proof: {0}")]
    InvalidProof(String),
    #[error("Verification Error: {0}")]
    Verify(String),
    #[error("Lock Error: Panicked when trying to acquire a lock")]
    LockError,
    #[error("Database error: {0}")]
    DbError(anyhow::Error),
}
