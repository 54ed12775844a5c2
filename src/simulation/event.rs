//! Rearrangement choices, the per-attempt working record and the final output line
use crate::shared::gene::{GermlineSet, Locus, Region};
use crate::shared::sequence::Dna;
use crate::simulation::indels::IndelInfo;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The two junctions where non-templated nucleotides are added
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Boundary {
    Vd,
    Dj,
}

impl Boundary {
    pub const ALL: [Boundary; 2] = [Boundary::Vd, Boundary::Dj];

    pub fn name(&self) -> &'static str {
        match self {
            Boundary::Vd => "vd",
            Boundary::Dj => "dj",
        }
    }
}

/// Number of nucleotides removed at each end of each gene.
///
/// `v_3p`, `d_5p`, `d_3p` and `j_5p` are the physical erosions of the
/// recombination. `v_5p` and `j_3p` only mimic the limited read length of real
/// data and are left at 0 unless asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Erosions {
    pub v_5p: usize,
    pub v_3p: usize,
    pub d_5p: usize,
    pub d_3p: usize,
    pub j_5p: usize,
    pub j_3p: usize,
}

impl Erosions {
    pub fn five_prime(&self, region: Region) -> usize {
        match region {
            Region::V => self.v_5p,
            Region::D => self.d_5p,
            Region::J => self.j_5p,
        }
    }

    pub fn three_prime(&self, region: Region) -> usize {
        match region {
            Region::V => self.v_3p,
            Region::D => self.d_3p,
            Region::J => self.j_3p,
        }
    }

    /// Same erosions with the read-length ones set to 0
    pub fn physical(&self) -> Erosions {
        Erosions {
            v_5p: 0,
            j_3p: 0,
            ..*self
        }
    }
}

/// Everything that defines a rearrangement, before any nucleotide is drawn
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RearrangementChoice {
    pub v_gene: String,
    pub d_gene: String,
    pub j_gene: String,
    pub erosions: Erosions,
    pub vd_insertion: usize,
    pub dj_insertion: usize,
}

impl RearrangementChoice {
    pub fn gene(&self, region: Region) -> &str {
        match region {
            Region::V => &self.v_gene,
            Region::D => &self.d_gene,
            Region::J => &self.j_gene,
        }
    }

    pub fn insertion_length(&self, boundary: Boundary) -> usize {
        match boundary {
            Boundary::Vd => self.vd_insertion,
            Boundary::Dj => self.dj_insertion,
        }
    }

    /// Distance from the first nucleotide of the V conserved codon to the last
    /// nucleotide of the J conserved codon, `None` if one of the codons is
    /// (partly) eroded away.
    pub fn cdr3_length(&self, glfo: &GermlineSet) -> Result<Option<usize>> {
        let v = glfo.get(Region::V, &self.v_gene)?;
        let d = glfo.get(Region::D, &self.d_gene)?;
        let j = glfo.get(Region::J, &self.j_gene)?;
        let e = &self.erosions;
        let (Some(v_cdr3), Some(j_cdr3)) = (v.cdr3_pos, j.cdr3_pos) else {
            return Ok(None);
        };
        if v_cdr3 + 3 + e.v_3p > v.len() || j_cdr3 < e.j_5p {
            return Ok(None);
        }
        let d_len = d.len().saturating_sub(e.d_5p + e.d_3p);
        Ok(Some(
            (v.len() - e.v_3p - v_cdr3)
                + self.vd_insertion
                + d_len
                + self.dj_insertion
                + (j_cdr3 - e.j_5p)
                + 3,
        ))
    }
}

/// Position of the first nucleotide of each conserved codon in a sequence
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodonPositions {
    pub v: usize,
    pub j: usize,
}

impl CodonPositions {
    pub fn get(&self, region: Region) -> Option<usize> {
        match region {
            Region::V => Some(self.v),
            Region::J => Some(self.j),
            Region::D => None,
        }
    }

    pub fn cdr3_length(&self) -> usize {
        (self.j + 3).saturating_sub(self.v)
    }

    /// Both codons start a codon of the reading frame beginning at `frame_start`
    pub fn in_frame(&self, frame_start: usize) -> bool {
        self.v % 3 == frame_start && self.j % 3 == frame_start
    }
}

/// Why an attempt was thrown away
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejection {
    OutOfFrame,
    StopCodonInInsertions,
    CorruptedCodons,
    NoFunctionalLeaves,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Rejection::OutOfFrame => "out of frame rearrangement",
            Rejection::StopCodonInInsertions => "insertions keep introducing stop codons",
            Rejection::CorruptedCodons => "conserved codons eroded or mutated",
            Rejection::NoFunctionalLeaves => "no functional sequence left",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EventStage {
    Chosen,
    Assembled,
    Validated,
    Mutated,
    Finalized,
}

/// Working record of a single attempt. Dropped as soon as the attempt is
/// rejected, turned into a `GeneratedLine` otherwise.
#[derive(Clone, Debug)]
pub struct RecombinationEvent {
    stage: EventStage,
    pub seed: u64,
    pub choice: RearrangementChoice,
    pub eroded_seqs: HashMap<Region, Dna>,
    pub insertions: HashMap<Boundary, Dna>,
    pub naive_seq: Dna,
    pub frame_start: usize,
    pub codon_positions: Option<CodonPositions>,
    pub unmutated_codons: HashMap<Region, Vec<u8>>,
    pub tree: Option<String>,
    pub scaled_trees: HashMap<Region, String>,
    pub leaf_names: Vec<String>,
    pub final_seqs: Vec<Dna>,
    pub final_codon_positions: Vec<CodonPositions>,
    pub indel_infos: Vec<IndelInfo>,
}

impl RecombinationEvent {
    pub fn new(seed: u64, choice: RearrangementChoice) -> RecombinationEvent {
        RecombinationEvent {
            stage: EventStage::Chosen,
            seed,
            choice,
            eroded_seqs: HashMap::new(),
            insertions: HashMap::new(),
            naive_seq: Dna::new(),
            frame_start: 0,
            codon_positions: None,
            unmutated_codons: HashMap::new(),
            tree: None,
            scaled_trees: HashMap::new(),
            leaf_names: Vec::new(),
            final_seqs: Vec::new(),
            final_codon_positions: Vec::new(),
            indel_infos: Vec::new(),
        }
    }

    pub fn stage(&self) -> EventStage {
        self.stage
    }

    /// Move from stage `from` to stage `to`, fails if the event is not at `from`
    pub fn advance(&mut self, from: EventStage, to: EventStage) -> Result<()> {
        if self.stage != from || to <= from {
            return Err(anyhow!(
                "Invalid event transition {:?} -> {:?} (event is at {:?})",
                from,
                to,
                self.stage
            ));
        }
        self.stage = to;
        Ok(())
    }

    pub fn eroded(&self, region: Region) -> &Dna {
        static EMPTY: Dna = Dna { seq: Vec::new() };
        self.eroded_seqs.get(&region).unwrap_or(&EMPTY)
    }

    pub fn insertion(&self, boundary: Boundary) -> &Dna {
        static EMPTY: Dna = Dna { seq: Vec::new() };
        self.insertions.get(&boundary).unwrap_or(&EMPTY)
    }

    /// The fragment mutated together with the D gene: vd insertion + D + dj insertion
    pub fn d_fragment(&self) -> Dna {
        let mut seq = self.insertion(Boundary::Vd).clone();
        seq.extend(self.eroded(Region::D));
        seq.extend(self.insertion(Boundary::Dj));
        seq
    }

    /// Save the conserved codons of the naive sequence, so that mutations
    /// hitting them can be reverted later.
    pub fn record_unmutated_codons(&mut self) {
        self.unmutated_codons.clear();
        if let Some(pos) = self.codon_positions {
            for region in [Region::V, Region::J] {
                let p = pos.get(region).unwrap_or_default();
                if let Some(codon) = self.naive_seq.codon_at(p) {
                    self.unmutated_codons.insert(region, codon.to_vec());
                }
            }
        }
    }

    /// Put back the naive conserved codons in a mutated sequence. Only the
    /// codons are touched, so the overall mutation rate is barely affected.
    pub fn revert_conserved_codons(&self, seq: &mut Dna) {
        let Some(pos) = self.codon_positions else {
            return;
        };
        for (region, codon) in self.unmutated_codons.iter() {
            if let Some(p) = pos.get(*region) {
                if seq.codon_at(p) != Some(codon.as_slice()) {
                    log::debug!(
                        "reverting mutated {} conserved codon at position {}",
                        region,
                        p
                    );
                    seq.set_codon(p, codon);
                }
            }
        }
    }

    pub fn finalize(mut self, n_attempts: usize) -> Result<GeneratedLine> {
        self.advance(EventStage::Mutated, EventStage::Finalized)?;
        let codon_positions = self
            .codon_positions
            .ok_or(anyhow!("Finalizing an event without codon positions"))?;
        let n_leaves = self.final_seqs.len();
        if self.leaf_names.len() != n_leaves || self.final_codon_positions.len() != n_leaves {
            return Err(anyhow!(
                "Inconsistent number of leaves in event (seed {})",
                self.seed
            ));
        }
        if self.indel_infos.len() != n_leaves {
            self.indel_infos = self
                .final_seqs
                .iter()
                .map(|_| IndelInfo::default())
                .collect();
        }
        let unique_ids = self
            .leaf_names
            .iter()
            .map(|name| format!("{}-{}", self.seed, name))
            .collect();
        let vd_insertion = self.insertion(Boundary::Vd).clone();
        let dj_insertion = self.insertion(Boundary::Dj).clone();
        Ok(GeneratedLine {
            seed: self.seed,
            n_attempts,
            v_gene: self.choice.v_gene,
            d_gene: self.choice.d_gene,
            j_gene: self.choice.j_gene,
            erosions: self.choice.erosions,
            vd_insertion,
            dj_insertion,
            naive_seq: self.naive_seq,
            codon_positions,
            cdr3_length: codon_positions.cdr3_length(),
            unique_ids,
            leaf_names: self.leaf_names,
            seqs: self.final_seqs,
            leaf_codon_positions: self.final_codon_positions,
            indel_infos: self.indel_infos,
            tree: self.tree,
            scaled_trees: self.scaled_trees,
        })
    }
}

/// One simulated clonal family: a single rearrangement and its mutated leaves
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeneratedLine {
    pub seed: u64,
    pub n_attempts: usize,
    pub v_gene: String,
    pub d_gene: String,
    pub j_gene: String,
    pub erosions: Erosions,
    pub vd_insertion: Dna,
    pub dj_insertion: Dna,
    pub naive_seq: Dna,
    pub codon_positions: CodonPositions,
    pub cdr3_length: usize,
    pub unique_ids: Vec<String>,
    pub leaf_names: Vec<String>,
    pub seqs: Vec<Dna>,
    pub leaf_codon_positions: Vec<CodonPositions>,
    pub indel_infos: Vec<IndelInfo>,
    // chosen tree (after the mutation multiplier), None if nothing was mutated
    pub tree: Option<String>,
    pub scaled_trees: HashMap<Region, String>,
}

impl GeneratedLine {
    pub fn n_leaves(&self) -> usize {
        self.seqs.len()
    }

    /// Both conserved codons intact, in frame and no stop codon
    pub fn is_functional(&self, iseq: usize, locus: Locus) -> bool {
        let (Some(seq), Some(pos)) = (self.seqs.get(iseq), self.leaf_codon_positions.get(iseq))
        else {
            return false;
        };
        for region in [Region::V, Region::J] {
            let (Some(codon), Some(p)) = (locus.conserved_codon(region), pos.get(region)) else {
                continue;
            };
            if !codon.is_intact(seq.codon_at(p)) {
                return false;
            }
        }
        if pos.j < pos.v || (pos.j - pos.v) % 3 != 0 {
            return false;
        }
        !seq.has_stop_codon(pos.v % 3)
    }

    /// Keep only the leaves at `indices`
    pub fn restrict_to(&mut self, indices: &[usize]) {
        fn pick<T: Clone>(v: &[T], indices: &[usize]) -> Vec<T> {
            indices.iter().filter_map(|&i| v.get(i).cloned()).collect()
        }
        self.unique_ids = pick(&self.unique_ids, indices);
        self.leaf_names = pick(&self.leaf_names, indices);
        self.seqs = pick(&self.seqs, indices);
        self.leaf_codon_positions = pick(&self.leaf_codon_positions, indices);
        self.indel_infos = pick(&self.indel_infos, indices);
    }

    pub fn gene(&self, region: Region) -> &str {
        match region {
            Region::V => &self.v_gene,
            Region::D => &self.d_gene,
            Region::J => &self.j_gene,
        }
    }
}
