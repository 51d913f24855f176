//! Cross-crate integration tests.
//!
//! Drives [`RotatingWriter`](rotalog_core::RotatingWriter) against real
//! stores and checks the physical outcome: which segments exist, what they
//! hold, and what survives a restart.
