//! Integration test package for the mpt workspace. The suites live under
//! `tests/`; this library target is intentionally empty.
