use anyhow::Result;
use std::fs::{self, File};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use vdjsim::shared::parser::write_fasta;
use vdjsim::simulation::{Erosions, RearrangementChoice, VersionFrequencyTable};
use vdjsim::{
    Dna, Gene, GermlineSet, Locus, MutationProcess, Region, RegionJob, SimulationParameters,
    TreeRecord,
};

pub const IGHV1: &str = "IGHV1-2*01";
pub const IGHV3: &str = "IGHV3-23*01";
pub const IGHD: &str = "IGHD3-10*01";
pub const IGHJ: &str = "IGHJ4*02";

#[cfg(test)]
#[allow(dead_code)]
/// Two V, one D, one J. Every gene is stop-free when read from its first
/// nucleotide, and V + D + J laid end to end is in frame.
pub fn igh_germlines() -> GermlineSet {
    let v1 = Gene::new(IGHV1, "CAGGTGCAGCTGGTGTATTACTGTGCGAGA", Some(21)).unwrap();
    let v3 = Gene::new(IGHV3, "GAGGTGCAGCTGTTGTATTACTGTGCGAAA", Some(21)).unwrap();
    let d = Gene::new(IGHD, "GGTATAGCAGCA", None).unwrap();
    let j = Gene::new(IGHJ, "TACTTTGACTACTGGGGCCAGGGAACC", Some(12)).unwrap();
    GermlineSet::new(Locus::Igh, vec![v1, v3], vec![d], vec![j]).unwrap()
}

#[cfg(test)]
#[allow(dead_code)]
/// Light chain: no D gene given, the germline set adds its placeholder
pub fn igk_germlines() -> GermlineSet {
    let v = Gene::new(
        "IGKV1-39*01",
        "GACATCCAGATGACCCAGTCTCCTTATTACTGTCAACAG",
        Some(30),
    )
    .unwrap();
    let j = Gene::new("IGKJ1*01", "ACGTTCGGCCAAGGGACCAAG", Some(3)).unwrap();
    GermlineSet::new(Locus::Igk, vec![v], vec![], vec![j]).unwrap()
}

#[cfg(test)]
#[allow(dead_code)]
pub fn choice(
    v_gene: &str,
    erosions: Erosions,
    vd_insertion: usize,
    dj_insertion: usize,
) -> RearrangementChoice {
    RearrangementChoice {
        v_gene: v_gene.to_string(),
        d_gene: IGHD.to_string(),
        j_gene: IGHJ.to_string(),
        erosions,
        vd_insertion,
        dj_insertion,
    }
}

#[cfg(test)]
#[allow(dead_code)]
/// Two in-frame rearrangements. The first one can't get a stop codon whatever
/// its insertions, the second one has no insertion at all.
pub fn in_frame_table() -> VersionFrequencyTable {
    let eroded = Erosions {
        v_3p: 3,
        d_5p: 2,
        d_3p: 1,
        j_5p: 3,
        ..Default::default()
    };
    VersionFrequencyTable::new(vec![
        (choice(IGHV1, eroded, 2, 1), 3.),
        (choice(IGHV3, Erosions::default(), 0, 0), 1.),
    ])
    .unwrap()
}

#[cfg(test)]
#[allow(dead_code)]
/// A single rearrangement, shifted out of frame by its one-nucleotide insertion
pub fn out_of_frame_table() -> VersionFrequencyTable {
    VersionFrequencyTable::new(vec![(choice(IGHV1, Erosions::default(), 1, 0), 1.)]).unwrap()
}

#[cfg(test)]
#[allow(dead_code)]
pub fn tree_records() -> Vec<TreeRecord> {
    vec![
        TreeRecord::parse_line("((t1:0.05,t2:0.1)n1:0.02,t3:0.08):0.01;v:1.0,d:1.6,j:0.8")
            .unwrap(),
    ]
}

#[cfg(test)]
#[allow(dead_code)]
pub fn zero_depth_tree_records() -> Vec<TreeRecord> {
    vec![TreeRecord::parse_line("((t1:0,t2:0):0,t3:0):0;v:1,d:1,j:1").unwrap()]
}

#[cfg(test)]
#[allow(dead_code)]
pub fn scratch_params(workdir: &Path) -> SimulationParameters {
    SimulationParameters {
        locus: Locus::Igh,
        rearrange_from_scratch: true,
        mutate_from_scratch: true,
        workdir: Some(workdir.to_path_buf()),
        ..Default::default()
    }
}

#[cfg(test)]
#[allow(dead_code)]
pub fn empirical_params(workdir: &Path) -> SimulationParameters {
    SimulationParameters {
        locus: Locus::Igh,
        rearrange_from_scratch: false,
        mutate_from_scratch: true,
        workdir: Some(workdir.to_path_buf()),
        ..Default::default()
    }
}

/// What a fake process does to the starting sequence of each leaf
pub type Transform = fn(&Dna) -> Dna;

#[derive(Clone, Debug, PartialEq)]
pub struct SeenJob {
    pub region: Region,
    pub gene: String,
    pub seq: Dna,
    pub rates: Option<Vec<f64>>,
    pub tree: String,
}

/// Stands in for bppseqgen: writes `transform(seq)` for every leaf t1..tN,
/// plus the anchor leaf, and keeps track of the jobs it was given.
pub struct FakeProcess {
    pub calls: Arc<AtomicUsize>,
    pub jobs: Arc<Mutex<Vec<SeenJob>>>,
    transform: Transform,
}

#[allow(dead_code)]
impl FakeProcess {
    pub fn new(transform: Transform) -> FakeProcess {
        FakeProcess {
            calls: Arc::new(AtomicUsize::new(0)),
            jobs: Arc::new(Mutex::new(Vec::new())),
            transform,
        }
    }

    /// Leaves identical to the starting sequence
    pub fn echo() -> FakeProcess {
        FakeProcess::new(|s| s.clone())
    }

    /// Every single position mutated (A->C->G->T->A)
    pub fn scramble() -> FakeProcess {
        FakeProcess::new(|s| Dna {
            seq: s
                .seq
                .iter()
                .map(|n| match n {
                    b'A' => b'C',
                    b'C' => b'G',
                    b'G' => b'T',
                    _ => b'A',
                })
                .collect(),
        })
    }

    /// Stop codons all along the sequence
    pub fn stops() -> FakeProcess {
        FakeProcess::new(|s| Dna {
            seq: b"TAG".iter().copied().cycle().take(s.len()).collect(),
        })
    }

    pub fn n_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MutationProcess for FakeProcess {
    fn run(&self, job: &RegionJob) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rate_file = fs::read_to_string(&job.rate_file)?;
        let mut lines = rate_file.lines();
        let rates = match lines.next() {
            Some("state\trate") => Some(
                lines
                    .map(|l| l.split('\t').nth(1).unwrap_or_default().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };
        let tree = fs::read_to_string(&job.tree_file)?;
        if let Ok(mut jobs) = self.jobs.lock() {
            jobs.push(SeenJob {
                region: job.region,
                gene: job.gene.clone(),
                seq: job.seq.clone(),
                rates,
                tree,
            });
        }

        let mut records = vec![("xxx".to_string(), job.seq.clone())];
        for ileaf in 1..=job.n_leaves {
            records.push((format!("t{}", ileaf), (self.transform)(&job.seq)));
        }
        write_fasta(File::create(&job.output_file)?, &records)
    }
}
