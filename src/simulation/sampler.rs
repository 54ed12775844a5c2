//! Choice of the rearrangement parameters of an event
use crate::shared::distributions::{geometric_minus_one, DiscreteDistribution};
use crate::shared::errors::SimulationError;
use crate::shared::gene::{GermlineSet, Region};
use crate::shared::parameters::SimulationParameters;
use crate::simulation::assembler::Layout;
use crate::simulation::event::{Boundary, Erosions, RearrangementChoice};
use crate::simulation::tables::{InsertionContentTable, VersionFrequencyTable};
use anyhow::{anyhow, Result};
use rand::Rng;
use std::collections::HashMap;

#[derive(Clone, Debug)]
enum SamplingMode {
    Empirical(VersionFrequencyTable),
    Scratch(HashMap<Region, DiscreteDistribution>),
}

#[derive(Clone, Debug)]
pub struct EventSampler {
    mode: SamplingMode,
    params: SimulationParameters,
}

impl EventSampler {
    /// Sample from an empirical rearrangement table
    pub fn from_table(
        table: VersionFrequencyTable,
        glfo: &GermlineSet,
        params: &SimulationParameters,
    ) -> Result<EventSampler> {
        for (choice, _) in table.iter() {
            for region in Region::ALL {
                if !glfo.contains(region, choice.gene(region)) {
                    return Err(anyhow!(
                        "Gene {} of the rearrangement table is not in the germline set",
                        choice.gene(region)
                    ));
                }
            }
        }
        Ok(EventSampler {
            mode: SamplingMode::Empirical(table),
            params: params.clone(),
        })
    }

    /// Sample genes uniformly (or following the allele prevalences) and draw
    /// erosion/insertion lengths from geometric distributions
    pub fn from_scratch(glfo: &GermlineSet, params: &SimulationParameters) -> Result<EventSampler> {
        let mut genes = HashMap::new();
        for region in Region::ALL {
            let n = glfo.genes(region).len();
            if n == 0 {
                return Err(SimulationError::EmptyGenePool(region).into());
            }
            let weights = glfo
                .prevalence_weights(region)
                .unwrap_or_else(|| vec![1.; n]);
            genes.insert(region, DiscreteDistribution::new(weights)?);
        }
        Ok(EventSampler {
            mode: SamplingMode::Scratch(genes),
            params: params.clone(),
        })
    }

    /// Choose the full set of rearrangement parameters
    pub fn choose_vdj_combo<R: Rng>(
        &self,
        glfo: &GermlineSet,
        content: &InsertionContentTable,
        rng: &mut R,
    ) -> Result<RearrangementChoice> {
        let mut choice = match &self.mode {
            SamplingMode::Empirical(table) => table.choose(rng).clone(),
            SamplingMode::Scratch(genes) => self.get_scratchline(genes, glfo, content, rng)?,
        };
        if !self.params.mimic_data_read_length {
            choice.erosions = choice.erosions.physical();
        }
        Ok(choice)
    }

    /// Choose the genes once, then redraw erosions and insertions until the
    /// rearrangement is in frame, without stop codon, and with an allowed CDR3
    /// length. Only the insertion lengths are kept.
    fn get_scratchline<R: Rng>(
        &self,
        genes: &HashMap<Region, DiscreteDistribution>,
        glfo: &GermlineSet,
        content: &InsertionContentTable,
        rng: &mut R,
    ) -> Result<RearrangementChoice> {
        let mut chosen = HashMap::new();
        for region in Region::ALL {
            let pool = glfo.genes(region);
            if pool.is_empty() {
                return Err(SimulationError::EmptyGenePool(region).into());
            }
            let d = genes
                .get(&region)
                .ok_or(SimulationError::EmptyGenePool(region))?;
            chosen.insert(region, pool[d.generate(rng)].name.clone());
        }
        let mut choice = RearrangementChoice {
            v_gene: chosen[&Region::V].clone(),
            d_gene: chosen[&Region::D].clone(),
            j_gene: chosen[&Region::J].clone(),
            ..Default::default()
        };

        let mut itry = 0;
        loop {
            let layout = self.try_scratch_erode_insert(&mut choice, glfo, content, rng)?;
            itry += 1;
            if !self.keep_trying(&layout) {
                break;
            }
            if itry % 50 == 0 {
                log::warn!(
                    "finding an in-frame and stop-less {}rearrangement is taking an oddly large number of tries ({} so far)",
                    if self.params.allowed_cdr3_lengths.is_some() {
                        "(and with allowed cdr3 lengths) "
                    } else {
                        ""
                    },
                    itry
                );
            }
        }
        Ok(choice)
    }

    fn keep_trying(&self, layout: &Layout) -> bool {
        if !layout.in_frame() || layout.has_stop_codon() {
            return true;
        }
        match (&self.params.allowed_cdr3_lengths, layout.cdr3_length()) {
            (Some(allowed), Some(l)) => !allowed.contains(&l),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    /// Draw the physical erosions and the insertions of `choice` (genes already
    /// set), and lay out the corresponding naive sequence.
    pub fn try_scratch_erode_insert<R: Rng>(
        &self,
        choice: &mut RearrangementChoice,
        glfo: &GermlineSet,
        content: &InsertionContentTable,
        rng: &mut R,
    ) -> Result<Layout> {
        let mut erosions = Erosions::default();
        for (region, five_prime) in [
            (Region::V, false),
            (Region::D, true),
            (Region::D, false),
            (Region::J, true),
        ] {
            let gene = glfo.get(region, choice.gene(region))?;
            let n = if region == Region::D && !glfo.locus.has_d() {
                // the placeholder D is always entirely eroded from the left
                if five_prime {
                    gene.len()
                } else {
                    0
                }
            } else {
                let mut max_erosion = (gene.len() / 2).saturating_sub(2);
                if let (Some(_), Some(codon_pos)) =
                    (glfo.locus.conserved_codon(region), gene.cdr3_pos)
                {
                    let n_bases_to_codon = if five_prime {
                        codon_pos
                    } else {
                        gene.len().saturating_sub(codon_pos + 3)
                    };
                    max_erosion = max_erosion.min(n_bases_to_codon);
                }
                let mean = self.params.scratch_erosion_mean(region, five_prime);
                max_erosion.min(geometric_minus_one(mean, rng)?)
            };
            match (region, five_prime) {
                (Region::V, _) => erosions.v_3p = n,
                (Region::D, true) => erosions.d_5p = n,
                (Region::D, false) => erosions.d_3p = n,
                (Region::J, _) => erosions.j_5p = n,
            }
        }
        choice.erosions = erosions;

        let means = self.params.insertion_means();
        let mut insertions = HashMap::new();
        for (bound, mean) in [(Boundary::Vd, means.vd), (Boundary::Dj, means.dj)] {
            let length = if mean == 0. {
                0
            } else {
                geometric_minus_one(mean, rng)?
            };
            insertions.insert(bound, content.draw(bound, length, rng));
        }
        choice.vd_insertion = insertions[&Boundary::Vd].len();
        choice.dj_insertion = insertions[&Boundary::Dj].len();

        Layout::new(
            glfo,
            choice,
            &insertions[&Boundary::Vd],
            &insertions[&Boundary::Dj],
            self.params.reading_frame_offset,
        )
    }
}
