//! The simulation engine
pub mod assembler;
pub mod bppseqgen;
pub mod event;
pub mod indels;
pub mod mutation;
pub mod recombinator;
pub mod sampler;
pub mod tables;

pub use assembler::GeneSegmentAssembler;
pub use bppseqgen::{BppSeqGen, SubstitutionModels};
pub use event::{
    Boundary, CodonPositions, Erosions, GeneratedLine, RearrangementChoice, RecombinationEvent,
};
pub use indels::{IndelInfo, IndelInjector};
pub use mutation::{MutationProcess, RegionJob, RegionalMutationDriver};
pub use recombinator::{Recombinator, SimulationTables};
pub use sampler::EventSampler;
pub use tables::{
    InsertionContentTable, MutationRateProfile, MutationRateProfiles, VersionFrequencyTable,
};
