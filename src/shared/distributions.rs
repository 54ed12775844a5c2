//! Distributions used by the generation process
use crate::shared::sequence::NUCLEOTIDES;
use anyhow::{anyhow, Result};
use rand::Rng;
use rand_distr::{Distribution, Geometric, Uniform, WeightedAliasIndex};

/// Generate an integer with a given probability (alias method, O(1) per draw)
#[derive(Clone, Debug)]
pub struct DiscreteDistribution {
    distribution: WeightedAliasIndex<f64>,
}

impl DiscreteDistribution {
    pub fn new(weights: Vec<f64>) -> Result<Self> {
        if !weights.iter().all(|&x| x >= 0.) {
            return Err(anyhow!(
                "Error when creating distribution: negative weights"
            ))?;
        }

        let distribution = match weights.iter().sum::<f64>().abs() < 1e-10 {
            // when all the value are 0, all the values are equiprobable.
            true => WeightedAliasIndex::new(vec![1.; weights.len()])
                .map_err(|e| anyhow!(format!("Error when creating distribution: {}", e)))?,
            false => WeightedAliasIndex::new(weights)
                .map_err(|e| anyhow!(format!("Error when creating distribution: {}", e)))?,
        };
        Ok(DiscreteDistribution { distribution })
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> usize {
        self.distribution.sample(rng)
    }
}

/// Inverse-CDF sampling: each outcome owns a segment of [0, 1) and a uniform
/// draw picks the first outcome whose cumulative probability exceeds it.
/// O(n) per draw, but one uniform number per draw whatever the table size.
#[derive(Clone, Debug, Default)]
pub struct CumulativeDistribution {
    probas: Vec<f64>,
}

impl CumulativeDistribution {
    pub fn new(probas: Vec<f64>) -> Result<Self> {
        if probas.is_empty() {
            return Err(anyhow!("Error when creating distribution: no outcome"));
        }
        if probas.iter().any(|&p| p < 0. || !p.is_finite()) {
            return Err(anyhow!(
                "Error when creating distribution: negative or non-finite probability"
            ));
        }
        Ok(CumulativeDistribution { probas })
    }

    /// Index of the segment containing `u`
    ///```
    /// use vdjsim::shared::distributions::CumulativeDistribution;
    /// let d = CumulativeDistribution::new(vec![0.2, 0.0, 0.5, 0.3]).unwrap();
    /// assert_eq!(d.index_of(0.1), 0);
    /// assert_eq!(d.index_of(0.2), 2);
    /// assert_eq!(d.index_of(0.75), 3);
    ///```
    pub fn index_of(&self, u: f64) -> usize {
        let mut sum_prob = 0.;
        for (idx, p) in self.probas.iter().enumerate() {
            sum_prob += p;
            if u < sum_prob {
                return idx;
            }
        }
        // rounding can leave a sliver at the top of the interval
        self.probas
            .iter()
            .rposition(|&p| p > 0.)
            .unwrap_or(self.probas.len() - 1)
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> usize {
        let u: f64 = rng.gen();
        self.index_of(u)
    }

    pub fn probabilities(&self) -> &[f64] {
        &self.probas
    }

    pub fn len(&self) -> usize {
        self.probas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probas.is_empty()
    }
}

/// Draw from a geometric distribution with mean `mean` (support starting at 1)
/// and subtract one, so the support starts at 0. A mean at or below 1 always
/// gives 0.
pub fn geometric_minus_one<R: Rng>(mean: f64, rng: &mut R) -> Result<usize> {
    if !mean.is_finite() || mean < 0. {
        return Err(anyhow!("Invalid mean length {} for a geometric draw", mean));
    }
    if mean <= 1. {
        return Ok(0);
    }
    let geo = Geometric::new(1. / mean)
        .map_err(|e| anyhow!("Error when creating geometric distribution: {}", e))?;
    Ok(geo.sample(rng) as usize)
}

/// Uniformly random nucleotides
#[derive(Clone, Debug)]
pub struct UniformError {
    nucleotide: Uniform<usize>,
}

impl Default for UniformError {
    fn default() -> UniformError {
        UniformError::new()
    }
}

impl UniformError {
    pub fn new() -> UniformError {
        UniformError {
            nucleotide: Uniform::new_inclusive(0, 3),
        }
    }

    pub fn random_nucleotide<R: Rng>(&self, rng: &mut R) -> u8 {
        NUCLEOTIDES[self.nucleotide.sample(rng)]
    }
}
