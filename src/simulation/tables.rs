//! Empirical tables driving the simulation: rearrangement frequencies,
//! insertion content and per-position mutation frequencies.
use crate::shared::distributions::CumulativeDistribution;
use crate::shared::gene::{GermlineSet, Region};
use crate::shared::sequence::{nucleotides_inv, Dna, NUCLEOTIDES};
use crate::shared::utils::{is_normed, EPSILON_INSERTION, EPSILON_VERSION};
use crate::simulation::event::{Boundary, Erosions, RearrangementChoice};
use anyhow::{anyhow, Context, Result};
use csv::Reader;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Above this size the cumulative sums of the inverse-CDF draw lose too much
/// precision.
pub const MAX_VERSION_TABLE_SIZE: usize = 100_000_000;

/// Frequencies of full rearrangements (genes, erosions, insertion lengths)
#[derive(Clone, Debug)]
pub struct VersionFrequencyTable {
    choices: Vec<RearrangementChoice>,
    distribution: CumulativeDistribution,
}

impl VersionFrequencyTable {
    /// Build the table from (choice, count) pairs. Counts are normalized,
    /// duplicated choices are an error.
    pub fn new(counts: Vec<(RearrangementChoice, f64)>) -> Result<VersionFrequencyTable> {
        if counts.is_empty() {
            return Err(anyhow!("Empty rearrangement frequency table"));
        }
        if counts.len() >= MAX_VERSION_TABLE_SIZE {
            return Err(anyhow!(
                "Rearrangement frequency table too large ({} entries)",
                counts.len()
            ));
        }
        let mut seen = HashSet::new();
        for (c, n) in counts.iter() {
            if !seen.insert(c) {
                return Err(anyhow!("Duplicated rearrangement in frequency table: {:?}", c));
            }
            if *n < 0. || !n.is_finite() {
                return Err(anyhow!("Invalid count {} in frequency table for {:?}", n, c));
            }
        }
        let total: f64 = counts.iter().map(|(_, n)| n).sum();
        if total <= 0. {
            return Err(anyhow!("Rearrangement frequency table with zero total count"));
        }

        let (choices, probas): (Vec<_>, Vec<_>) =
            counts.into_iter().map(|(c, n)| (c, n / total)).unzip();
        let test_total: f64 = probas.iter().sum();
        if !is_normed(test_total, EPSILON_VERSION) {
            return Err(anyhow!(
                "Rearrangement frequencies sum to {} after normalization",
                test_total
            ));
        }
        Ok(VersionFrequencyTable {
            choices,
            distribution: CumulativeDistribution::new(probas)?,
        })
    }

    /// Read the table from a csv file with columns v_gene, d_gene, j_gene,
    /// v_5p_del, v_3p_del, d_5p_del, d_3p_del, j_5p_del, j_3p_del,
    /// vd_insertion, dj_insertion, count (and optionally cdr3_length).
    /// Rows using genes absent from `glfo`, or with a CDR3 length not in
    /// `allowed_cdr3_lengths`, are skipped.
    pub fn read_csv(
        path: &Path,
        glfo: &GermlineSet,
        allowed_cdr3_lengths: Option<&[usize]>,
    ) -> Result<VersionFrequencyTable> {
        let mut rdr = Reader::from_path(path)
            .with_context(|| format!("Error opening the frequency table {}", path.display()))?;
        let headers = rdr.headers()?.clone();
        let col = |name: &str| -> Result<usize> {
            headers.iter().position(|h| h == name).ok_or(anyhow!(
                "Column {} missing from the frequency table {}",
                name,
                path.display()
            ))
        };
        let gene_cols = [col("v_gene")?, col("d_gene")?, col("j_gene")?];
        let del_cols = [
            col("v_5p_del")?,
            col("v_3p_del")?,
            col("d_5p_del")?,
            col("d_3p_del")?,
            col("j_5p_del")?,
            col("j_3p_del")?,
        ];
        let ins_cols = [col("vd_insertion")?, col("dj_insertion")?];
        let count_col = col("count")?;
        let cdr3_col = col("cdr3_length").ok();

        let mut counts = Vec::new();
        for (irow, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| anyhow!("Error reading the record {:?}", e))?;
            let field = |i: usize| -> Result<&str> {
                record
                    .get(i)
                    .ok_or(anyhow!("Row {} of {} is too short", irow + 1, path.display()))
            };
            let int = |i: usize| -> Result<usize> {
                field(i)?.trim().parse::<usize>().with_context(|| {
                    format!("Invalid integer in row {} of {}", irow + 1, path.display())
                })
            };

            let genes = [field(gene_cols[0])?, field(gene_cols[1])?, field(gene_cols[2])?];
            if Region::ALL
                .iter()
                .zip(genes.iter())
                .any(|(&r, g)| !glfo.contains(r, g))
            {
                continue;
            }
            let choice = RearrangementChoice {
                v_gene: genes[0].to_string(),
                d_gene: genes[1].to_string(),
                j_gene: genes[2].to_string(),
                erosions: Erosions {
                    v_5p: int(del_cols[0])?,
                    v_3p: int(del_cols[1])?,
                    d_5p: int(del_cols[2])?,
                    d_3p: int(del_cols[3])?,
                    j_5p: int(del_cols[4])?,
                    j_3p: int(del_cols[5])?,
                },
                vd_insertion: int(ins_cols[0])?,
                dj_insertion: int(ins_cols[1])?,
            };

            if let Some(allowed) = allowed_cdr3_lengths {
                let cdr3 = match cdr3_col {
                    Some(c) => Some(int(c)?),
                    None => choice.cdr3_length(glfo)?,
                };
                if !cdr3.is_some_and(|l| allowed.contains(&l)) {
                    continue;
                }
            }

            let count: f64 = field(count_col)?.trim().parse().with_context(|| {
                format!("Invalid count in row {} of {}", irow + 1, path.display())
            })?;
            counts.push((choice, count));
        }

        if counts.is_empty() {
            return Err(anyhow!(
                "Didn't find any gene combinations in {}",
                path.display()
            ));
        }
        VersionFrequencyTable::new(counts)
            .with_context(|| format!("Invalid frequency table {}", path.display()))
    }

    /// Walk the cumulative distribution up to a uniform draw
    pub fn choose<R: Rng>(&self, rng: &mut R) -> &RearrangementChoice {
        &self.choices[self.distribution.generate(rng)]
    }

    pub fn len(&self) -> usize {
        self.choices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RearrangementChoice, f64)> {
        self.choices
            .iter()
            .zip(self.distribution.probabilities().iter().copied())
    }
}

/// Nucleotide composition of the insertions, per boundary
#[derive(Clone, Debug)]
pub struct InsertionContentTable {
    probs: HashMap<Boundary, CumulativeDistribution>,
}

impl InsertionContentTable {
    /// Counts are in ACGT order
    pub fn new(vd: [f64; 4], dj: [f64; 4]) -> Result<InsertionContentTable> {
        let mut probs = HashMap::new();
        for (bound, counts) in [(Boundary::Vd, vd), (Boundary::Dj, dj)] {
            let total: f64 = counts.iter().sum();
            if counts.iter().any(|&c| c < 0.) || total <= 0. {
                return Err(anyhow!(
                    "Invalid {} insertion content counts {:?}",
                    bound.name(),
                    counts
                ));
            }
            let p: Vec<f64> = counts.iter().map(|c| c / total).collect();
            if !is_normed(p.iter().sum(), EPSILON_INSERTION) {
                return Err(anyhow!(
                    "{} insertion content doesn't sum to one",
                    bound.name()
                ));
            }
            probs.insert(bound, CumulativeDistribution::new(p)?);
        }
        Ok(InsertionContentTable { probs })
    }

    pub fn uniform() -> InsertionContentTable {
        let probs = Boundary::ALL
            .iter()
            .map(|&b| (b, CumulativeDistribution::new(vec![0.25; 4])))
            .filter_map(|(b, d)| d.ok().map(|d| (b, d)))
            .collect();
        InsertionContentTable { probs }
    }

    /// Read `<dir>/vd_insertion_content.csv` and `<dir>/dj_insertion_content.csv`
    /// (columns `<bound>_insertion_content,count`). Nucleotides absent from a
    /// file get a zero count.
    pub fn read_csv(dir: &Path) -> Result<InsertionContentTable> {
        let mut counts = HashMap::new();
        for bound in Boundary::ALL {
            let path = dir.join(format!("{}_insertion_content.csv", bound.name()));
            let mut rdr = Reader::from_path(&path).with_context(|| {
                format!("Error opening the insertion content file {}", path.display())
            })?;
            let mut c = [0.; 4];
            for result in rdr.records() {
                let record = result.map_err(|e| anyhow!("Error reading the record {:?}", e))?;
                let nuke = record
                    .get(0)
                    .and_then(|n| n.trim().bytes().next())
                    .ok_or(anyhow!("Empty nucleotide in {}", path.display()))?;
                let idx = nucleotides_inv(nuke.to_ascii_uppercase()).ok_or(anyhow!(
                    "Invalid nucleotide {} in {}",
                    nuke as char,
                    path.display()
                ))?;
                c[idx] += record
                    .get(1)
                    .unwrap_or_default()
                    .trim()
                    .parse::<f64>()
                    .with_context(|| format!("Invalid count in {}", path.display()))?;
            }
            counts.insert(bound, c);
        }
        InsertionContentTable::new(counts[&Boundary::Vd], counts[&Boundary::Dj])
    }

    /// Draw `length` nucleotides, each one independently
    pub fn draw<R: Rng>(&self, boundary: Boundary, length: usize, rng: &mut R) -> Dna {
        match self.probs.get(&boundary) {
            Some(d) => Dna {
                seq: (0..length).map(|_| NUCLEOTIDES[d.generate(rng)]).collect(),
            },
            None => Dna {
                seq: (0..length)
                    .map(|_| NUCLEOTIDES[rng.gen_range(0..4)])
                    .collect(),
            },
        }
    }

    pub fn probabilities(&self, boundary: Boundary) -> Option<&[f64]> {
        self.probs.get(&boundary).map(|d| d.probabilities())
    }
}

/// Relative mutation frequency along a germline gene
#[derive(Clone, Debug, Default)]
pub struct MutationRateProfile {
    pub freqs: HashMap<usize, f64>,
    pub overall_mean: f64,
}

impl MutationRateProfile {
    /// Frequency at a germline position (overall mean where unknown)
    pub fn rate_at(&self, position: usize) -> f64 {
        self.freqs
            .get(&position)
            .copied()
            .unwrap_or(self.overall_mean)
    }
}

#[derive(Clone, Debug, Default)]
pub struct MutationRateProfiles {
    profiles: HashMap<String, MutationRateProfile>,
}

impl MutationRateProfiles {
    pub fn new() -> MutationRateProfiles {
        MutationRateProfiles::default()
    }

    pub fn insert(&mut self, gene: &str, profile: MutationRateProfile) {
        self.profiles.insert(gene.to_string(), profile);
    }

    pub fn get(&self, gene: &str) -> Option<&MutationRateProfile> {
        self.profiles.get(gene)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Read a csv file with columns gene, position, mute_freq. The position
    /// `overall_mean` sets the mean explicitly, otherwise it is the mean of the
    /// listed positions.
    pub fn read_csv(path: &Path) -> Result<MutationRateProfiles> {
        let mut rdr = Reader::from_path(path)
            .with_context(|| format!("Error opening the mutation frequency file {}", path.display()))?;
        let mut explicit_means = HashMap::<String, f64>::new();
        let mut result = MutationRateProfiles::new();
        for result_record in rdr.records() {
            let record =
                result_record.map_err(|e| anyhow!("Error reading the record {:?}", e))?;
            let (Some(gene), Some(position), Some(freq)) =
                (record.get(0), record.get(1), record.get(2))
            else {
                return Err(anyhow!("Invalid row in {}", path.display()));
            };
            let freq: f64 = freq.trim().parse().with_context(|| {
                format!("Invalid mutation frequency for {} in {}", gene, path.display())
            })?;
            if freq < 0. {
                return Err(anyhow!("Negative mutation frequency for gene {}", gene));
            }
            let profile = result.profiles.entry(gene.to_string()).or_default();
            if position.trim() == "overall_mean" {
                explicit_means.insert(gene.to_string(), freq);
            } else {
                let pos: usize = position.trim().parse().with_context(|| {
                    format!("Invalid position for {} in {}", gene, path.display())
                })?;
                profile.freqs.insert(pos, freq);
            }
        }
        for (gene, profile) in result.profiles.iter_mut() {
            profile.overall_mean = match explicit_means.get(gene) {
                Some(&m) => m,
                None if !profile.freqs.is_empty() => {
                    profile.freqs.values().sum::<f64>() / profile.freqs.len() as f64
                }
                None => 0.,
            };
        }
        Ok(result)
    }
}
