#![warn(clippy::large_types_passed_by_value)]

pub mod shared;
pub mod simulation;

pub use crate::shared::{
    Dna, Gene, GermlineSet, Locus, Region, SimulationError, SimulationParameters, Tree,
    TreeRecord,
};
pub use crate::simulation::{
    BppSeqGen, GeneratedLine, MutationProcess, Recombinator, RegionJob, SimulationTables,
};
