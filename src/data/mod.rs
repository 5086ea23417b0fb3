//! Data module - datasets, feature sets, matrices and splits

pub mod dataset;
pub mod feature_set;
pub mod loader;
pub mod matrix;
pub mod split;

pub use dataset::*;
pub use feature_set::*;
pub use loader::*;
pub use matrix::*;
pub use split::*;
