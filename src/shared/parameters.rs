//! The structs used for specifying the parameters of the simulation
use crate::shared::gene::{Locus, Region};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where indels are allowed to land in a sequence
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndelLocation {
    /// anywhere in the V gene, upstream of the conserved cysteine
    V,
    /// between the two conserved codons
    Cdr3,
    /// at this exact position of the sequence (a single indel per sequence)
    Position(usize),
}

/// What to do when a rearrangement corrupts a conserved codon or ends up out
/// of frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// discard the whole event and start again with the next seed
    Retry,
    /// abort the simulation
    Fatal,
}

/// Mean erosion lengths used when rearranging from scratch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScratchErosionMeans {
    pub v_3p: f64,
    pub d_5p: f64,
    pub d_3p: f64,
    pub j_5p: f64,
}

impl Default for ScratchErosionMeans {
    fn default() -> Self {
        ScratchErosionMeans {
            v_3p: 2.,
            d_5p: 3.,
            d_3p: 3.,
            j_5p: 4.,
        }
    }
}

/// Mean insertion lengths used when rearranging from scratch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScratchInsertionMeans {
    pub vd: f64,
    pub dj: f64,
}

impl ScratchInsertionMeans {
    pub fn for_locus(locus: Locus) -> Self {
        if locus.has_d() {
            ScratchInsertionMeans { vd: 5., dj: 5. }
        } else {
            ScratchInsertionMeans { vd: 0., dj: 5. }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParameters {
    pub locus: Locus,

    // Generate rearrangements with the heuristics below instead of an empirical
    // rearrangement table
    pub rearrange_from_scratch: bool,
    // The germline set was itself generated with imposed allele prevalences,
    // retrying an event would bias these
    pub generate_germline_set: bool,
    // Overrides the policy derived from the two flags above
    pub rejection_policy: Option<RejectionPolicy>,
    pub scratch_erosion_means: ScratchErosionMeans,
    pub scratch_insertion_means: Option<ScratchInsertionMeans>,
    pub allowed_cdr3_lengths: Option<Vec<usize>>,
    // Also apply the v_5p and j_3p erosions of the rearrangement table
    pub mimic_data_read_length: bool,
    // Offset (0, 1 or 2) of the first complete codon in the germline V genes
    pub reading_frame_offset: usize,

    // Constant mutation frequency everywhere, instead of per-gene profiles
    pub mutate_from_scratch: bool,
    // Constant rate across sites instead of a Gamma rate distribution
    // (only used when mutating from scratch)
    pub flat_mute_freq: bool,
    pub mutation_multiplier: Option<f64>,

    pub indel_frequency: f64,
    pub n_indels_per_indeld_seq: Vec<usize>,
    pub mean_indel_length: f64,
    pub indel_location: Option<IndelLocation>,

    pub remove_nonfunctional_seqs: bool,
    pub max_attempts: usize,
    pub max_insertion_tries: usize,
    // Parent directory of the scratch directories (system temp dir if unset)
    pub workdir: Option<PathBuf>,
}

impl Default for SimulationParameters {
    fn default() -> SimulationParameters {
        SimulationParameters {
            locus: Locus::Igh,
            rearrange_from_scratch: false,
            generate_germline_set: false,
            rejection_policy: None,
            scratch_erosion_means: ScratchErosionMeans::default(),
            scratch_insertion_means: None,
            allowed_cdr3_lengths: None,
            mimic_data_read_length: false,
            reading_frame_offset: 0,
            mutate_from_scratch: false,
            flat_mute_freq: false,
            mutation_multiplier: None,
            indel_frequency: 0.,
            n_indels_per_indeld_seq: vec![1, 2],
            mean_indel_length: 5.,
            indel_location: None,
            remove_nonfunctional_seqs: false,
            max_attempts: 9999,
            max_insertion_tries: 9999,
            workdir: None,
        }
    }
}

impl SimulationParameters {
    /// Load the parameters from a json file (missing keys take their default value)
    pub fn load_json(filename: &Path) -> Result<SimulationParameters> {
        let contents = fs::read_to_string(filename)
            .with_context(|| format!("Error reading the parameter file {}", filename.display()))?;
        let params: SimulationParameters = serde_json::from_str(&contents)
            .with_context(|| format!("Error parsing the parameter file {}", filename.display()))?;
        params.check()?;
        Ok(params)
    }

    pub fn save_json(&self, filename: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(filename, contents)
            .with_context(|| format!("Error writing the parameter file {}", filename.display()))?;
        Ok(())
    }

    pub fn check(&self) -> Result<()> {
        if !(0. ..=1.).contains(&self.indel_frequency) {
            return Err(anyhow!(
                "indel_frequency must be in [0, 1] (got {})",
                self.indel_frequency
            ));
        }
        if self.indel_frequency > 0. && self.n_indels_per_indeld_seq.is_empty() {
            return Err(anyhow!(
                "n_indels_per_indeld_seq can't be empty when indel_frequency is non-zero"
            ));
        }
        if self.reading_frame_offset > 2 {
            return Err(anyhow!(
                "reading_frame_offset must be 0, 1 or 2 (got {})",
                self.reading_frame_offset
            ));
        }
        if let Some(m) = self.mutation_multiplier {
            if m < 0. || !m.is_finite() {
                return Err(anyhow!("Invalid mutation_multiplier {}", m));
            }
        }
        if let Some(IndelLocation::Position(p)) = self.indel_location {
            if p >= 500 {
                return Err(anyhow!("indel_location must be less than 500 (got {})", p));
            }
        }
        if self.max_attempts == 0 {
            return Err(anyhow!("max_attempts must be at least 1"));
        }
        Ok(())
    }

    /// Policy applied to codon corruption and out-of-frame rearrangements
    pub fn rejection_policy(&self) -> RejectionPolicy {
        match self.rejection_policy {
            Some(p) => p,
            None if self.rearrange_from_scratch && self.generate_germline_set => {
                RejectionPolicy::Fatal
            }
            None => RejectionPolicy::Retry,
        }
    }

    /// T-cell receptors don't hypermutate: unless told otherwise they are
    /// simulated without mutations
    pub fn mutation_multiplier(&self) -> Option<f64> {
        match self.mutation_multiplier {
            None if self.locus.is_tcr() => Some(0.),
            m => m,
        }
    }

    pub fn insertion_means(&self) -> ScratchInsertionMeans {
        self.scratch_insertion_means
            .clone()
            .unwrap_or_else(|| ScratchInsertionMeans::for_locus(self.locus))
    }

    /// Mean length of the scratch erosion on the `end` side of `region`
    pub fn scratch_erosion_mean(&self, region: Region, five_prime: bool) -> f64 {
        let m = &self.scratch_erosion_means;
        match (region, five_prime) {
            (Region::V, false) => m.v_3p,
            (Region::D, true) => m.d_5p,
            (Region::D, false) => m.d_3p,
            (Region::J, true) => m.j_5p,
            // effective erosions are never drawn from scratch
            _ => 0.,
        }
    }
}
