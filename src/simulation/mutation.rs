//! Somatic hypermutation along a tree, one external process per region.
//!
//! The tree is rescaled separately for V, D (with both insertions) and J so
//! that each region gets its own mutation depth. Each region is then handed to
//! a `MutationProcess` in its own scratch directory and the leaf sequences are
//! stitched back together.
use crate::shared::errors::SimulationError;
use crate::shared::gene::{GermlineSet, Region};
use crate::shared::parser::read_fasta;
use crate::shared::sequence::Dna;
use crate::shared::tree::{Tree, TreeRecord};
use crate::shared::utils::normalize_rates;
use crate::simulation::event::{Boundary, EventStage, RecombinationEvent};
use crate::simulation::tables::MutationRateProfiles;
use anyhow::{anyhow, Context, Result};
use ndarray::Array1;
use rand::Rng;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Extra leaf added at the root of each tree, the mutation process would
/// otherwise ignore the root edge. Its sequence is dropped.
pub const ANCHOR_LEAF: &str = "xxx";

/// Everything an external mutation process needs for one region
#[derive(Clone, Debug)]
pub struct RegionJob {
    pub region: Region,
    pub gene: String,
    pub seq: Dna,
    pub n_leaves: usize,
    pub seed: u64,
    pub workdir: PathBuf,
    pub tree_file: PathBuf,
    pub rate_file: PathBuf,
    pub output_file: PathBuf,
}

/// Evolves `job.seq` along the tree in `job.tree_file` and writes one FASTA
/// record per leaf (anchor included) to `job.output_file`.
pub trait MutationProcess: Send + Sync {
    fn run(&self, job: &RegionJob) -> Result<()>;
}

pub struct RegionalMutationDriver {
    trees: Vec<TreeRecord>,
    profiles: MutationRateProfiles,
    process: Box<dyn MutationProcess>,
    mutation_multiplier: Option<f64>,
    mutate_from_scratch: bool,
    workdir: Option<PathBuf>,
}

impl RegionalMutationDriver {
    pub fn new(
        trees: Vec<TreeRecord>,
        profiles: MutationRateProfiles,
        process: Box<dyn MutationProcess>,
        mutation_multiplier: Option<f64>,
        mutate_from_scratch: bool,
        workdir: Option<PathBuf>,
    ) -> Result<RegionalMutationDriver> {
        if trees.is_empty() {
            return Err(anyhow!("No tree to simulate mutations with"));
        }
        Ok(RegionalMutationDriver {
            trees,
            profiles,
            process,
            mutation_multiplier,
            mutate_from_scratch,
            workdir,
        })
    }

    /// Draw a tree and mutate the naive sequence of `event` along it
    pub fn add_mutants<R: Rng>(
        &self,
        event: &mut RecombinationEvent,
        glfo: &GermlineSet,
        rng: &mut R,
    ) -> Result<()> {
        let record = &self.trees[rng.gen_range(0..self.trees.len())];
        let mut tree = record.tree.clone();
        let n_leaves = tree.n_leaves();
        let codon_positions = event
            .codon_positions
            .ok_or(anyhow!("Mutating an event without codon positions"))?;

        if self.mutation_multiplier == Some(0.) {
            event.leaf_names = tree.leaf_names();
            event.final_seqs = vec![event.naive_seq.clone(); n_leaves];
            event.final_codon_positions = vec![codon_positions; n_leaves];
            return event.advance(EventStage::Validated, EventStage::Mutated);
        }
        if let Some(m) = self.mutation_multiplier {
            tree.scale_edges(m);
        }

        let mean_total_height = tree.mean_leaf_height();
        let mut scaled_trees = HashMap::new();
        for region in Region::ALL {
            let mut t = tree.clone();
            t.rescale(mean_total_height * record.ratio(region))?;
            t.strip_internal_labels();
            scaled_trees.insert(region, t);
        }
        log::debug!(
            "chose tree with total height {} (regional heights v {:.3} d {:.3} j {:.3})",
            mean_total_height,
            scaled_trees[&Region::V].mean_leaf_height(),
            scaled_trees[&Region::D].mean_leaf_height(),
            scaled_trees[&Region::J].mean_leaf_height(),
        );

        let mut jobs = Vec::new();
        for region in Region::ALL {
            let seq = match region {
                Region::D => event.d_fragment(),
                r => event.eroded(r).clone(),
            };
            if seq.is_empty() {
                continue;
            }
            let rates = self.rates(region, &seq, event, glfo)?;
            jobs.push(self.prepare_job(region, seq, &rates, &scaled_trees[&region], event)?);
        }

        let outputs = jobs
            .into_par_iter()
            .map(|(dir, job)| self.run_job(dir, &job, n_leaves))
            .collect::<Result<Vec<_>>>()?;

        let mut leaf_names: Option<Vec<String>> = None;
        let mut mutated: HashMap<Region, Vec<Dna>> = HashMap::new();
        for (region, names, seqs) in outputs {
            match &leaf_names {
                None => leaf_names = Some(names),
                Some(n) if *n == names => {}
                Some(_) => {
                    return Err(anyhow!(
                        "Leaf names of region {} don't match the other regions",
                        region
                    ))
                }
            }
            mutated.insert(region, seqs);
        }
        let leaf_names = leaf_names.unwrap_or_else(|| tree.leaf_names());

        event.final_seqs.clear();
        event.final_codon_positions.clear();
        for ileaf in 0..n_leaves {
            let mut seq = Dna::new();
            for region in Region::ALL {
                if let Some(seqs) = mutated.get(&region) {
                    seq.extend(&seqs[ileaf]);
                }
            }
            event.revert_conserved_codons(&mut seq);
            event.final_seqs.push(seq);
            event.final_codon_positions.push(codon_positions);
        }
        event.leaf_names = leaf_names;
        event.tree = Some(tree.to_newick());
        event.scaled_trees = scaled_trees
            .iter()
            .map(|(r, t)| (*r, t.to_newick()))
            .collect();
        event.advance(EventStage::Validated, EventStage::Mutated)
    }

    /// Relative rate of each position of a regional fragment, normalized so
    /// that the mean is one. Insertions get the mean rate of the gene.
    fn rates(
        &self,
        region: Region,
        seq: &Dna,
        event: &RecombinationEvent,
        glfo: &GermlineSet,
    ) -> Result<Array1<f64>> {
        if self.mutate_from_scratch {
            return Ok(Array1::ones(seq.len()));
        }
        let gene = event.choice.gene(region);
        let profile = match self.profiles.get(gene) {
            Some(p) => p,
            // the placeholder D of light chains has no profile, its fragment
            // is made of insertions only
            None if region == Region::D && !glfo.locus.has_d() => {
                return Ok(Array1::ones(seq.len()))
            }
            None => {
                return Err(anyhow!(
                    "No mutation frequencies for gene {} (needed unless mutating from scratch)",
                    gene
                ))
            }
        };
        let left_erosion = event.choice.erosions.five_prime(region);
        let rates: Array1<f64> = match region {
            Region::D => {
                let vd = event.insertion(Boundary::Vd).len();
                let d_len = event.eroded(Region::D).len();
                (0..seq.len())
                    .map(|i| {
                        if i < vd || i >= vd + d_len {
                            profile.overall_mean
                        } else {
                            profile.rate_at(i - vd + left_erosion)
                        }
                    })
                    .collect()
            }
            _ => (0..seq.len())
                .map(|i| profile.rate_at(i + left_erosion))
                .collect(),
        };
        normalize_rates(rates).with_context(|| format!("Invalid mutation rates for gene {}", gene))
    }

    /// Create the scratch directory of a region and write the tree and the
    /// per-site state (and rate) file
    fn prepare_job(
        &self,
        region: Region,
        seq: Dna,
        rates: &Array1<f64>,
        tree: &Tree,
        event: &RecombinationEvent,
    ) -> Result<(TempDir, RegionJob)> {
        let prefix = format!("vdjsim-{}-{}-", event.seed, region);
        let dir = match &self.workdir {
            Some(w) => {
                fs::create_dir_all(w)?;
                tempfile::Builder::new().prefix(&prefix).tempdir_in(w)?
            }
            None => tempfile::Builder::new().prefix(&prefix).tempdir()?,
        };
        let job = RegionJob {
            region,
            gene: event.choice.gene(region).to_string(),
            n_leaves: tree.n_leaves(),
            seed: event.seed,
            workdir: dir.path().to_path_buf(),
            tree_file: dir.path().join("tree.tre"),
            rate_file: dir.path().join("start-seq.txt"),
            output_file: dir.path().join(format!("{}-leaf-seqs.fa", region)),
            seq,
        };

        fs::write(&job.tree_file, tree.with_anchor_leaf(ANCHOR_LEAF).to_newick())
            .with_context(|| format!("Error writing tree file {}", job.tree_file.display()))?;
        write_rate_file(&job.rate_file, &job.seq, rates, !self.mutate_from_scratch)?;
        Ok((dir, job))
    }

    /// Run the process, read its output back, remove the scratch directory
    /// (or keep it around if anything went wrong)
    fn run_job(
        &self,
        dir: TempDir,
        job: &RegionJob,
        n_leaves: usize,
    ) -> Result<(Region, Vec<String>, Vec<Dna>)> {
        log::trace!("running mutation process for region {} in {}", job.region, job.workdir.display());
        let result = self
            .process
            .run(job)
            .and_then(|_| read_leaf_seqs(&job.output_file, n_leaves, job.seq.len()));
        match result {
            Ok((names, seqs)) => {
                dir.close()?;
                Ok((job.region, names, seqs))
            }
            Err(e) => {
                let kept = dir.keep();
                log::warn!(
                    "mutation process failed for region {}, leaving scratch directory {}",
                    job.region,
                    kept.display()
                );
                Err(e)
            }
        }
    }
}

/// One line per site: the naive nucleotide, and its relative rate if `with_rates`
pub fn write_rate_file(path: &Path, seq: &Dna, rates: &Array1<f64>, with_rates: bool) -> Result<()> {
    if rates.len() != seq.len() {
        return Err(anyhow!(
            "{} rates for a sequence of length {}",
            rates.len(),
            seq.len()
        ));
    }
    let mut out = String::from(if with_rates { "state\trate\n" } else { "state\n" });
    for (nuke, rate) in seq.seq.iter().zip(rates.iter()) {
        out.push(*nuke as char);
        if with_rates {
            out.push_str(&format!("\t{}", rate));
        }
        out.push('\n');
    }
    let mut file = fs::File::create(path)
        .with_context(|| format!("Error creating rate file {}", path.display()))?;
    file.write_all(out.as_bytes())?;
    Ok(())
}

/// Read the leaf sequences written by the mutation process. Leaves must be
/// named t1..tN, the anchor leaf is dropped.
pub fn read_leaf_seqs(
    path: &Path,
    n_leaves: usize,
    seq_len: usize,
) -> Result<(Vec<String>, Vec<Dna>)> {
    if !path.exists() {
        return Err(anyhow!(
            "Mutation process output {} not found",
            path.display()
        ));
    }
    let mut mutated = HashMap::new();
    for (name, seq) in read_fasta(path)? {
        if name == ANCHOR_LEAF {
            continue;
        }
        mutated.insert(name.trim_matches('\'').to_string(), seq);
    }
    let mut names = Vec::new();
    let mut seqs = Vec::new();
    for ileaf in 1..=mutated.len() {
        let name = format!("t{}", ileaf);
        let seq = mutated.remove(&name).ok_or(SimulationError::UnexpectedLeaves {
            name: name.clone(),
            path: path.to_path_buf(),
        })?;
        if seq.len() != seq_len {
            return Err(anyhow!(
                "Leaf {} has length {} instead of {} in {}",
                name,
                seq.len(),
                seq_len,
                path.display()
            ));
        }
        names.push(name);
        seqs.push(seq);
    }
    if names.len() != n_leaves {
        return Err(anyhow!(
            "Expected {} leaves but found {} in {}",
            n_leaves,
            names.len(),
            path.display()
        ));
    }
    Ok((names, seqs))
}
