//! End-to-end tests for the Quill backend
//!
//! These tests drive the authoring API the way a front end would, run the
//! full pipeline, and check the finalized IR and emitted text.

mod harness;

mod closures;
mod exceptions;
mod generators;
mod memory;
mod output;
mod pipeline;
