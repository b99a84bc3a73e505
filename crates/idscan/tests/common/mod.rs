//! Shared test utilities for idscan integration tests.
//!
//! - Scripted OCR and LLM collaborators with call counters
//! - `TestHarness` wiring a `JobTracker` to them inside a temp directory

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
