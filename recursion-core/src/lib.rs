pub mod backend;
pub mod circuit;
pub mod codec;
pub mod config;
pub mod inputs;
pub mod pipeline;
pub mod proof;
pub mod utils;

pub use codec::{aggregate_proof, split_aggregated_proof};
pub use config::PipelineConfig;
pub use pipeline::{PipelineContext, PipelineOutcome};
pub use proof::{ProofData, RecursiveArtifacts};
