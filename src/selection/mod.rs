//! Feature selection: scorers, policies, stages and their combinations

pub mod cascade;
pub mod controller;
pub mod ensemble;
pub mod mutual_info;
pub mod policy;
pub mod scorer;
pub mod stage;

pub use cascade::{run_cascade, CascadeConfig, CascadeReport, StageCount};
pub use controller::{
    run_pipeline, PhaseDetail, PhaseMethod, PhaseOutcome, PipelineOutcome, PipelineRequest,
};
pub use ensemble::{run_ensemble, CombineMode, EnsembleConfig, EnsembleReport};
pub use policy::SelectionPolicy;
pub use scorer::{FeatureScore, RfeBase, ScoreTable, ScorerKind, ScorerOptions};
pub use stage::{SelectionResult, SelectionStage};
