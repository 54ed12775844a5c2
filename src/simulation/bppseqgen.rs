//! `bppseqgen` (Bio++) as the mutation process
use crate::shared::errors::SimulationError;
use crate::shared::gene::Region;
use crate::shared::parameters::SimulationParameters;
use crate::simulation::mutation::{MutationProcess, RegionJob};
use anyhow::{anyhow, Context, Result};
use csv::Reader;
use itertools::Itertools;
use std::collections::HashMap;
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Substitution model parameters of one region, in file order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RegionModel {
    pub gtr: Vec<(String, String)>,
    pub gamma: Vec<(String, String)>,
}

impl RegionModel {
    pub fn gamma_alpha(&self) -> Option<&str> {
        self.gamma
            .iter()
            .find(|(k, _)| k == "alpha")
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Debug, Default)]
pub struct SubstitutionModels {
    models: HashMap<Region, RegionModel>,
}

impl SubstitutionModels {
    /// Read a csv file with columns parameter,value, where the parameters
    /// look like `IGHV.gtr.a` or `IGHD.gamma.alpha`
    pub fn read_csv(path: &Path) -> Result<SubstitutionModels> {
        let mut rdr = Reader::from_path(path)
            .with_context(|| format!("Error opening the model file {}", path.display()))?;
        let mut models: HashMap<Region, RegionModel> = HashMap::new();
        for result in rdr.records() {
            let record = result.map_err(|e| anyhow!("Error reading the record {:?}", e))?;
            let (Some(parameter), Some(value)) = (record.get(0), record.get(1)) else {
                return Err(anyhow!("Invalid row in {}", path.display()));
            };
            let fields: Vec<&str> = parameter.trim().split('.').collect();
            let letter = fields.first().and_then(|f| f.chars().nth(3));
            let (3, Some(letter)) = (fields.len(), letter) else {
                return Err(anyhow!(
                    "Invalid parameter {} in {}",
                    parameter,
                    path.display()
                ));
            };
            let region = Region::from_letter(&letter.to_string())?;
            let model = models.entry(region).or_default();
            let pair = (fields[2].to_string(), value.trim().to_string());
            match fields[1] {
                "gtr" => model.gtr.push(pair),
                "gamma" => model.gamma.push(pair),
                other => {
                    return Err(anyhow!(
                        "Unknown model {} for parameter {} in {}",
                        other,
                        parameter,
                        path.display()
                    ))
                }
            }
        }
        Ok(SubstitutionModels { models })
    }

    pub fn insert(&mut self, region: Region, model: RegionModel) {
        self.models.insert(region, model);
    }

    pub fn get(&self, region: Region) -> Result<&RegionModel> {
        self.models
            .get(&region)
            .ok_or(anyhow!("No substitution model for region {}", region))
    }
}

pub struct BppSeqGen {
    binary: PathBuf,
    lib_dir: PathBuf,
    models: SubstitutionModels,
    mutate_from_scratch: bool,
    flat_mute_freq: bool,
}

impl BppSeqGen {
    /// `bpp_dir` is the Bio++ install directory (with `bin/bppseqgen` and `lib/`)
    pub fn new(
        bpp_dir: &Path,
        models: SubstitutionModels,
        params: &SimulationParameters,
    ) -> Result<BppSeqGen> {
        let binary = bpp_dir.join("bin").join("bppseqgen");
        if !binary.exists() {
            return Err(SimulationError::MissingBinary(binary).into());
        }
        for region in Region::ALL {
            let model = models.get(region)?;
            if params.mutate_from_scratch {
                if !params.flat_mute_freq && model.gamma_alpha().is_none() {
                    return Err(anyhow!("No gamma alpha parameter for region {}", region));
                }
            } else if model.gtr.is_empty() {
                return Err(anyhow!("No GTR parameters for region {}", region));
            }
        }
        Ok(BppSeqGen {
            binary,
            lib_dir: bpp_dir.join("lib"),
            models,
            mutate_from_scratch: params.mutate_from_scratch,
            flat_mute_freq: params.flat_mute_freq,
        })
    }

    /// Command line arguments for `job`
    pub fn arguments(&self, job: &RegionJob) -> Result<Vec<String>> {
        let model = self.models.get(job.region)?;
        let mut args = vec![
            "alphabet=DNA".to_string(),
            format!("--seed={}", job.seed),
            format!("input.infos={}", job.rate_file.display()),
            "input.infos.states=state".to_string(),
            format!("input.tree.file={}", job.tree_file.display()),
            "input.tree.format=Newick".to_string(),
            format!("output.sequence.file={}", job.output_file.display()),
            "output.sequence.format=Fasta".to_string(),
        ];
        if self.mutate_from_scratch {
            args.push("model=JC69".to_string());
            args.push("input.infos.rates=none".to_string());
            if self.flat_mute_freq {
                args.push("rate_distribution=Constant".to_string());
            } else {
                let alpha = model
                    .gamma_alpha()
                    .ok_or(anyhow!("No gamma alpha parameter for region {}", job.region))?;
                args.push(format!("rate_distribution=Gamma(n=4,alpha={})", alpha));
            }
        } else {
            args.push("input.infos.rates=rate".to_string());
            let pvpairs = model
                .gtr
                .iter()
                .map(|(p, v)| format!("{}={}", p, v))
                .join(",");
            args.push(format!("model=GTR({})", pvpairs));
        }
        Ok(args)
    }

    fn library_path(&self) -> String {
        match env::var("LD_LIBRARY_PATH") {
            Ok(existing) if !existing.is_empty() => {
                format!("{}:{}", self.lib_dir.display(), existing)
            }
            _ => self.lib_dir.display().to_string(),
        }
    }
}

impl MutationProcess for BppSeqGen {
    fn run(&self, job: &RegionJob) -> Result<()> {
        let args = self.arguments(job)?;
        log::trace!("{} {}", self.binary.display(), args.join(" "));
        let output = Command::new(&self.binary)
            .args(&args)
            .current_dir(&job.workdir)
            .env("LD_LIBRARY_PATH", self.library_path())
            .output()
            .with_context(|| format!("Error launching {}", self.binary.display()))?;
        if !output.status.success() {
            return Err(SimulationError::ProcessFailed {
                region: job.region,
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }
        if !job.output_file.exists() {
            return Err(anyhow!(
                "bppseqgen didn't write its output file {}",
                job.output_file.display()
            ));
        }
        Ok(())
    }
}
