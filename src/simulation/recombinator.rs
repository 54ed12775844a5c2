//! Full simulation of a clonal family: rearrangement, mutation, indels.
use crate::shared::errors::SimulationError;
use crate::shared::gene::{GermlineSet, Region};
use crate::shared::parameters::{RejectionPolicy, SimulationParameters};
use crate::shared::tree::TreeRecord;
use crate::simulation::assembler::GeneSegmentAssembler;
use crate::simulation::event::{
    EventStage, GeneratedLine, RecombinationEvent, Rejection,
};
use crate::simulation::indels::IndelInjector;
use crate::simulation::mutation::{MutationProcess, RegionalMutationDriver};
use crate::simulation::sampler::EventSampler;
use crate::simulation::tables::{
    InsertionContentTable, MutationRateProfiles, VersionFrequencyTable,
};
use anyhow::{anyhow, Result};
#[cfg(feature = "kdam")]
use kdam::TqdmParallelIterator;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use rayon::prelude::*;

/// The empirical inputs of the simulation
#[derive(Clone, Debug, Default)]
pub struct SimulationTables {
    // not needed when rearranging from scratch
    pub version_freqs: Option<VersionFrequencyTable>,
    // uniform if not given
    pub insertion_content: Option<InsertionContentTable>,
    // not needed when mutating from scratch
    pub mutation_profiles: MutationRateProfiles,
}

pub struct Recombinator {
    germlines: GermlineSet,
    params: SimulationParameters,
    policy: RejectionPolicy,
    insertion_content: InsertionContentTable,
    sampler: EventSampler,
    assembler: GeneSegmentAssembler,
    driver: RegionalMutationDriver,
    indels: IndelInjector,
}

impl Recombinator {
    pub fn new(
        germlines: GermlineSet,
        params: SimulationParameters,
        tables: SimulationTables,
        trees: Vec<TreeRecord>,
        process: Box<dyn MutationProcess>,
    ) -> Result<Recombinator> {
        params.check()?;
        if germlines.locus != params.locus {
            return Err(anyhow!(
                "Germline set is for locus {} but the simulation is for {}",
                germlines.locus.name(),
                params.locus.name()
            ));
        }

        let sampler = if params.rearrange_from_scratch {
            EventSampler::from_scratch(&germlines, &params)?
        } else {
            let table = tables.version_freqs.ok_or(anyhow!(
                "A rearrangement frequency table is needed unless rearranging from scratch"
            ))?;
            EventSampler::from_table(table, &germlines, &params)?
        };

        if !params.mutate_from_scratch && params.mutation_multiplier() != Some(0.) {
            for region in Region::ALL {
                if region == Region::D && !germlines.locus.has_d() {
                    continue;
                }
                for gene in germlines.genes(region) {
                    if tables.mutation_profiles.get(&gene.name).is_none() {
                        log::warn!(
                            "no mutation frequencies for gene {}, events using it will fail",
                            gene.name
                        );
                    }
                }
            }
        }

        let driver = RegionalMutationDriver::new(
            trees,
            tables.mutation_profiles,
            process,
            params.mutation_multiplier(),
            params.mutate_from_scratch,
            params.workdir.clone(),
        )?;

        Ok(Recombinator {
            policy: params.rejection_policy(),
            insertion_content: tables
                .insertion_content
                .unwrap_or_else(InsertionContentTable::uniform),
            assembler: GeneSegmentAssembler::new(
                params.reading_frame_offset,
                params.max_insertion_tries,
            ),
            indels: IndelInjector::new(&params)?,
            sampler,
            driver,
            germlines,
            params,
        })
    }

    pub fn germlines(&self) -> &GermlineSet {
        &self.germlines
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    /// Keep trying until an attempt succeeds. Attempt `i` uses the seed
    /// `seed + i`, so the same seed always gives back the same line.
    pub fn combine(&self, seed: u64) -> Result<GeneratedLine> {
        for attempt in 0..self.params.max_attempts {
            if attempt > 0 {
                log::debug!("unproductive event, rerunning (try {})", attempt);
            }
            if let Some(mut line) = self.try_to_combine(seed.wrapping_add(attempt as u64))? {
                line.n_attempts = attempt + 1;
                return Ok(line);
            }
        }
        Err(SimulationError::TooManyTries(self.params.max_attempts).into())
    }

    /// Generate one line per seed, in parallel. Results are in seed order.
    pub fn combine_many(&self, seeds: &[u64]) -> Result<Vec<GeneratedLine>> {
        #[cfg(feature = "kdam")]
        let lines = seeds
            .par_iter()
            .tqdm()
            .map(|&s| self.combine(s))
            .collect();
        #[cfg(not(feature = "kdam"))]
        let lines = seeds.par_iter().map(|&s| self.combine(s)).collect();
        lines
    }

    /// A single attempt. `Ok(None)` means the event was rejected and should be
    /// retried with another seed.
    pub fn try_to_combine(&self, seed: u64) -> Result<Option<GeneratedLine>> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let glfo = &self.germlines;

        let choice = self
            .sampler
            .choose_vdj_combo(glfo, &self.insertion_content, &mut rng)?;
        let mut event = RecombinationEvent::new(seed, choice);

        if let Some(rejection) =
            self.assembler
                .erode_and_insert(&mut event, glfo, &self.insertion_content, &mut rng)?
        {
            return Ok(self.reject(seed, rejection));
        }

        event.record_unmutated_codons();
        if !self.assembler.codons_ok(&event, glfo) {
            if self.policy == RejectionPolicy::Fatal {
                return Err(SimulationError::StrictCodonCorruption { seed }.into());
            }
            return Ok(self.reject(seed, Rejection::CorruptedCodons));
        }
        if !self.assembler.in_frame(&event) {
            if self.policy == RejectionPolicy::Fatal {
                return Err(SimulationError::StrictOutOfFrame { seed }.into());
            }
            return Ok(self.reject(seed, Rejection::OutOfFrame));
        }
        event.advance(EventStage::Assembled, EventStage::Validated)?;

        self.driver.add_mutants(&mut event, glfo, &mut rng)?;
        self.indels.add_shm_indels(&mut event, &mut rng)?;
        let mut line = event.finalize(1)?;

        if self.params.remove_nonfunctional_seqs {
            let functional: Vec<usize> = (0..line.n_leaves())
                .filter(|&i| line.is_functional(i, glfo.locus))
                .collect();
            if functional.is_empty() {
                return Ok(self.reject(seed, Rejection::NoFunctionalLeaves));
            }
            if functional.len() < line.n_leaves() {
                line.restrict_to(&functional);
            }
        }
        Ok(Some(line))
    }

    fn reject(&self, seed: u64, rejection: Rejection) -> Option<GeneratedLine> {
        log::debug!("rejected event with seed {}: {}", seed, rejection);
        None
    }
}
