//! Shm-like insertions and deletions added to some of the leaf sequences
use crate::shared::distributions::{geometric_minus_one, UniformError};
use crate::shared::gene::Region;
use crate::shared::parameters::{IndelLocation, SimulationParameters};
use crate::shared::sequence::Dna;
use crate::simulation::event::{CodonPositions, RecombinationEvent};
use anyhow::{anyhow, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndelKind {
    Insertion,
    Deletion,
}

/// A single indel. `pos` is a position in the sequence as it was just before
/// this indel was applied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indel {
    pub kind: IndelKind,
    pub pos: usize,
    pub len: usize,
    // inserted or deleted nucleotides
    pub seq: Dna,
}

/// Indels of one leaf sequence
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndelInfo {
    // sequence before any indel (empty if there are no indels)
    pub reversed_seq: Dna,
    pub indels: Vec<Indel>,
    pub genes: HashMap<Region, String>,
}

impl IndelInfo {
    pub fn has_indels(&self) -> bool {
        !self.indels.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct IndelInjector {
    frequency: f64,
    n_indels_choices: Vec<usize>,
    mean_length: f64,
    location: Option<IndelLocation>,
    nucleotides: UniformError,
}

impl IndelInjector {
    pub fn new(params: &SimulationParameters) -> Result<IndelInjector> {
        let mut n_indels_choices = params.n_indels_per_indeld_seq.clone();
        if let Some(IndelLocation::Position(_)) = params.indel_location {
            if n_indels_choices.iter().any(|&n| n > 1) {
                log::info!(
                    "indel location set to a single position, ignoring indel counts above 1"
                );
                n_indels_choices.retain(|&n| n <= 1);
            }
        }
        if params.indel_frequency > 0. && n_indels_choices.is_empty() {
            return Err(anyhow!("No allowed number of indels per sequence"));
        }
        if params.indel_frequency > 0. && params.mean_indel_length < 1. {
            return Err(anyhow!(
                "mean_indel_length must be at least 1 (got {})",
                params.mean_indel_length
            ));
        }
        Ok(IndelInjector {
            frequency: params.indel_frequency,
            n_indels_choices,
            mean_length: params.mean_indel_length,
            location: params.indel_location,
            nucleotides: UniformError::new(),
        })
    }

    /// Add indels to a fraction of the leaves of `event`, updating their codon
    /// positions
    pub fn add_shm_indels<R: Rng>(&self, event: &mut RecombinationEvent, rng: &mut R) -> Result<()> {
        let n_leaves = event.final_seqs.len();
        event.indel_infos = vec![IndelInfo::default(); n_leaves];
        if self.frequency == 0. {
            return Ok(());
        }
        let hit = Bernoulli::new(self.frequency)
            .map_err(|e| anyhow!("Invalid indel frequency {}: {}", self.frequency, e))?;
        let genes: HashMap<Region, String> = Region::ALL
            .iter()
            .map(|&r| (r, event.choice.gene(r).to_string()))
            .collect();

        for iseq in 0..n_leaves {
            if !hit.sample(rng) {
                continue;
            }
            let n_indels = *self
                .n_indels_choices
                .choose(rng)
                .ok_or(anyhow!("No allowed number of indels per sequence"))?;
            let original = event.final_seqs[iseq].clone();
            let mut codons = event.final_codon_positions[iseq];
            let (seq, indels) = self.add_indels(n_indels, &original, &mut codons, rng)?;
            log::debug!("added {} indels to leaf {}", indels.len(), iseq);
            event.final_seqs[iseq] = seq;
            event.final_codon_positions[iseq] = codons;
            event.indel_infos[iseq] = IndelInfo {
                reversed_seq: original,
                indels,
                genes: genes.clone(),
            };
        }
        Ok(())
    }

    /// Apply `n_indels` indels one after the other. Indels that can't be placed
    /// (e.g. a deletion that would eat into a conserved codon) are skipped.
    pub fn add_indels<R: Rng>(
        &self,
        n_indels: usize,
        seq: &Dna,
        codons: &mut CodonPositions,
        rng: &mut R,
    ) -> Result<(Dna, Vec<Indel>)> {
        let mut seq = seq.clone();
        let mut indels = Vec::new();
        for _ in 0..n_indels {
            let kind = if rng.gen_bool(0.5) {
                IndelKind::Insertion
            } else {
                IndelKind::Deletion
            };
            let len = geometric_minus_one(self.mean_length, rng)? + 1;
            let candidates = self.candidate_positions(kind, len, seq.len(), codons);
            let Some(&pos) = candidates.choose(rng) else {
                log::debug!("no room for a {:?} of length {}, skipping it", kind, len);
                continue;
            };
            let indel = match kind {
                IndelKind::Insertion => {
                    let inserted = Dna {
                        seq: (0..len)
                            .map(|_| self.nucleotides.random_nucleotide(rng))
                            .collect(),
                    };
                    let tail = seq.seq.split_off(pos);
                    seq.seq.extend(inserted.seq.iter());
                    seq.seq.extend(tail);
                    for p in [&mut codons.v, &mut codons.j] {
                        if *p >= pos {
                            *p += len;
                        }
                    }
                    Indel {
                        kind,
                        pos,
                        len,
                        seq: inserted,
                    }
                }
                IndelKind::Deletion => {
                    let deleted = Dna {
                        seq: seq.seq.drain(pos..pos + len).collect(),
                    };
                    for p in [&mut codons.v, &mut codons.j] {
                        if *p >= pos + len {
                            *p -= len;
                        }
                    }
                    Indel {
                        kind,
                        pos,
                        len,
                        seq: deleted,
                    }
                }
            };
            indels.push(indel);
        }
        Ok((seq, indels))
    }

    /// Positions where an indel can go without touching a conserved codon
    fn candidate_positions(
        &self,
        kind: IndelKind,
        len: usize,
        seq_len: usize,
        codons: &CodonPositions,
    ) -> Vec<usize> {
        // allowed range for the indel (end excluded)
        let (start, end) = match self.location {
            None => (0, seq_len),
            Some(IndelLocation::V) => (0, codons.v),
            Some(IndelLocation::Cdr3) => (codons.v + 3, codons.j),
            Some(IndelLocation::Position(p)) => (p, seq_len),
        };
        let end = end.min(seq_len);
        let last = match (kind, self.location) {
            (_, Some(IndelLocation::Position(p))) => p,
            (IndelKind::Insertion, _) => end,
            (IndelKind::Deletion, _) if end >= len => end - len,
            (IndelKind::Deletion, _) => return Vec::new(),
        };
        let windows = [(codons.v, codons.v + 3), (codons.j, codons.j + 3)];
        (start..=last)
            .filter(|&pos| match kind {
                // inserting before `pos` must not split a codon
                IndelKind::Insertion => {
                    pos <= seq_len && windows.iter().all(|&(a, b)| pos <= a || pos >= b)
                }
                IndelKind::Deletion => {
                    pos + len <= seq_len
                        && windows.iter().all(|&(a, b)| pos + len <= a || pos >= b)
                }
            })
            .collect()
    }
}
