//! Fatal conditions of the simulation that callers may want to tell apart.
//!
//! Everything else goes through `anyhow` with a message naming the offending
//! input. Rejections that only call for a new attempt are not errors at all,
//! see `simulation::event::Rejection`.
use crate::shared::gene::Region;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("no genes to choose from for region {0}")]
    EmptyGenePool(Region),

    #[error("too many tries ({0}) in recombinator, no valid rearrangement could be generated")]
    TooManyTries(usize),

    #[error(
        "conserved codons were corrupted (seed {seed}), but since rearranging from scratch \
         with a generated germline set we can't retry: it would screw up the prevalence ratios"
    )]
    StrictCodonCorruption { seed: u64 },

    #[error(
        "out of frame rearrangement (seed {seed}), but since rearranging from scratch \
         with a generated germline set we can't retry: it would screw up the prevalence ratios"
    )]
    StrictOutOfFrame { seed: u64 },

    #[error("mutation process binary not found: {0}")]
    MissingBinary(PathBuf),

    #[error("mutation process failed for region {region} (exit status {status}): {stderr}")]
    ProcessFailed {
        region: Region,
        status: String,
        stderr: String,
    },

    #[error("leaf name {name} not as expected in mutation process output {path}")]
    UnexpectedLeaves { name: String, path: PathBuf },
}
