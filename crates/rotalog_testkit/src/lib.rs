//! # Rotalog Testkit
//!
//! Test utilities for Rotalog.
//!
//! This crate provides:
//! - Fixtures: writers on a manual clock, temporary file stores, and
//!   documents of an exact encoded size
//! - A fault-injecting store wrapper
//! - Property-based test generators using proptest
//! - Cross-crate integration and stress tests
//!
//! ## Usage
//!
//! ```rust,ignore
//! use rotalog_testkit::prelude::*;
//!
//! #[test]
//! fn rolls_over() {
//!     let harness = MemoryHarness::new(small_config(1024, 3));
//!     for _ in 0..4 {
//!         harness.writer.write(padded_fields(300)).unwrap();
//!     }
//!     assert_eq!(harness.writer.state().unwrap().history.len(), 1);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod faults;
pub mod fixtures;
pub mod generators;
pub mod integration;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::faults::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use faults::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
