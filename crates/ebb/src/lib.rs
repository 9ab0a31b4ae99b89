//! Ebb: an identity-mapped entity graph and change-tracking engine for
//! client/server data synchronization.
//!
//! ## Crate layout
//! - `core`: the engine. Values, identity, entity models, the tracked
//!   graph, and the change-set pipeline.
//!
//! The `prelude` module mirrors the runtime surface used by calling code.

pub use ebb_core as core;

//
// Consts
//

/// Workspace version re-export for downstream tooling/tests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use ebb_core::{
    changeset::{build_operations, validate_entries},
    error::{EngineError, ErrorClass, ErrorOrigin},
    submit::{SubmitOutcome, SubmitResult, apply_submit_results},
};

///
/// Prelude
///
/// Prelude contains only domain vocabulary.
///

pub mod prelude {
    pub use ebb_core::prelude::*;
}
