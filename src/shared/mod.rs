//! Building blocks shared by the whole simulation (not specific to one stage)
pub mod distributions;
pub mod errors;
pub mod gene;
pub mod parameters;
pub mod parser;
pub mod sequence;
pub mod tree;
pub mod utils;

pub use errors::SimulationError;
pub use gene::{ConservedCodon, Gene, GermlineSet, Locus, Region};
pub use parameters::{IndelLocation, RejectionPolicy, SimulationParameters};
pub use sequence::{nucleotides_inv, Dna};
pub use tree::{Tree, TreeRecord};
