//! Cross-crate end-to-end scenarios and property tests for apiforge.
//!
//! All tests live under `tests/`; this library is intentionally empty.
