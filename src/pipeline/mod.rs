//! Pipeline module - session orchestration from selection to registered model

pub mod artifact;
pub mod context;

pub use artifact::*;
pub use context::*;
