//! Germline genes, regions, loci and the germline set used by the simulation
use crate::shared::errors::SimulationError;
use crate::shared::sequence::Dna;
use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The three rearranging regions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    V,
    D,
    J,
}

impl Region {
    pub const ALL: [Region; 3] = [Region::V, Region::D, Region::J];

    pub fn from_letter(c: &str) -> Result<Region> {
        match c.to_ascii_lowercase().as_str() {
            "v" => Ok(Region::V),
            "d" => Ok(Region::D),
            "j" => Ok(Region::J),
            _ => Err(anyhow!("Invalid region '{}' (only v, d, j are allowed)", c)),
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            Region::V => "v",
            Region::D => "d",
            Region::J => "j",
        };
        write!(f, "{}", s)
    }
}

/// Immunoglobulin / T-cell receptor locus
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Locus {
    #[default]
    Igh,
    Igk,
    Igl,
    Tra,
    Trb,
    Trg,
    Trd,
}

impl Locus {
    pub fn from_name(name: &str) -> Result<Locus> {
        match name.to_ascii_uppercase().as_str() {
            "IGH" => Ok(Locus::Igh),
            "IGK" => Ok(Locus::Igk),
            "IGL" => Ok(Locus::Igl),
            "TRA" | "TCRA" => Ok(Locus::Tra),
            "TRB" | "TCRB" => Ok(Locus::Trb),
            "TRG" | "TCRG" => Ok(Locus::Trg),
            "TRD" | "TCRD" => Ok(Locus::Trd),
            _ => Err(anyhow!("Unknown locus {}", name)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Locus::Igh => "IGH",
            Locus::Igk => "IGK",
            Locus::Igl => "IGL",
            Locus::Tra => "TRA",
            Locus::Trb => "TRB",
            Locus::Trg => "TRG",
            Locus::Trd => "TRD",
        }
    }

    /// Light chains (and alpha/gamma TCR chains) rearrange without a D segment
    pub fn has_d(&self) -> bool {
        matches!(self, Locus::Igh | Locus::Trb | Locus::Trd)
    }

    pub fn is_tcr(&self) -> bool {
        matches!(self, Locus::Tra | Locus::Trb | Locus::Trg | Locus::Trd)
    }

    /// Conserved codon carried by `region`, if any
    pub fn conserved_codon(&self, region: Region) -> Option<ConservedCodon> {
        match (region, self) {
            (Region::V, _) => Some(ConservedCodon::Cyst),
            (Region::J, Locus::Igh) => Some(ConservedCodon::Tryp),
            (Region::J, _) => Some(ConservedCodon::Phen),
            (Region::D, _) => None,
        }
    }

    /// Name of the placeholder D gene used for loci without a D segment
    pub fn dummy_d_name(&self) -> String {
        format!("{}Dx-x*x", self.name())
    }
}

/// Conserved codons delimiting the CDR3
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConservedCodon {
    Cyst,
    Tryp,
    Phen,
}

impl ConservedCodon {
    pub fn amino_acid(&self) -> u8 {
        match self {
            ConservedCodon::Cyst => b'C',
            ConservedCodon::Tryp => b'W',
            ConservedCodon::Phen => b'F',
        }
    }

    /// True if `codon` still encodes the conserved residue (synonymous changes are fine)
    pub fn is_intact(&self, codon: Option<&[u8]>) -> bool {
        codon.and_then(crate::shared::sequence::translate_codon) == Some(self.amino_acid())
    }
}

/// Define some storage wrapper for the V/D/J genes
#[derive(Default, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gene {
    pub name: String,
    // position of the first nucleotide of the conserved codon
    // (cysteine for V genes, tryptophan/phenylalanine for J genes)
    pub cdr3_pos: Option<usize>,
    pub seq: Dna,
}

impl Gene {
    pub fn new(name: &str, seq: &str, cdr3_pos: Option<usize>) -> Result<Gene> {
        Ok(Gene {
            name: name.to_string(),
            cdr3_pos,
            seq: Dna::from_string(seq)?,
        })
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
}

static GENE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(TCRB|TCRA|TCRG|TCRD|TRB|TRA|IGH|IGK|IGL|TRG|TRD)(V|D|J)([\w/]+)?(:?-([\w/-]*))?(?:\*(\d*))?")
        .expect("static regex")
});

/// Locus and region encoded in an IMGT-like gene name (e.g. IGHV3-23*01)
///```
/// use vdjsim::shared::gene::{region_from_name, Locus, Region};
/// let (locus, region) = region_from_name("IGHV3-23*01").unwrap();
/// assert_eq!(locus, Locus::Igh);
/// assert_eq!(region, Region::V);
/// assert!(region_from_name("V1").is_err());
///```
pub fn region_from_name(name: &str) -> Result<(Locus, Region)> {
    let g = GENE_NAME.captures(name).ok_or(anyhow!(
        "Gene names must follow IMGT-like conventions, e.g. IGHV3-23*01 (error coming from the name {})",
        name
    ))?;
    let locus = Locus::from_name(g.get(1).map_or("", |m| m.as_str()))?;
    let region = Region::from_letter(g.get(2).map_or("", |m| m.as_str()))?;
    Ok((locus, region))
}

/// Germline genes available for the simulation, plus optional allele prevalences.
///
/// Genes keep their insertion order: sampling with a given seed only stays
/// reproducible if the order of the candidate genes does not change.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GermlineSet {
    pub locus: Locus,
    seg_vs: Vec<Gene>,
    seg_ds: Vec<Gene>,
    seg_js: Vec<Gene>,
    allele_prevalence: HashMap<Region, HashMap<String, f64>>,
}

impl GermlineSet {
    /// Build the germline set. For loci without a D segment an empty D list is
    /// replaced by a single one-nucleotide placeholder that is always fully eroded.
    pub fn new(locus: Locus, seg_vs: Vec<Gene>, seg_ds: Vec<Gene>, seg_js: Vec<Gene>) -> Result<GermlineSet> {
        let seg_ds = if seg_ds.is_empty() && !locus.has_d() {
            vec![Gene::new(&locus.dummy_d_name(), "A", None)?]
        } else {
            seg_ds
        };

        let glfo = GermlineSet {
            locus,
            seg_vs,
            seg_ds,
            seg_js,
            allele_prevalence: HashMap::new(),
        };
        glfo.check()?;
        if glfo.seg_vs.len() > 100 {
            log::warn!(
                "simulating with a very large number ({}) of V genes, consider using a realistic (diploid) germline set",
                glfo.seg_vs.len()
            );
        }
        Ok(glfo)
    }

    /// Dispatch the genes to their regions using their IMGT names
    pub fn from_genes(locus: Locus, genes: Vec<Gene>) -> Result<GermlineSet> {
        let (mut vs, mut ds, mut js) = (Vec::new(), Vec::new(), Vec::new());
        for g in genes {
            let (gene_locus, region) = region_from_name(&g.name)?;
            if gene_locus != locus {
                return Err(anyhow!(
                    "Gene {} belongs to locus {} but the germline set is {}",
                    g.name,
                    gene_locus.name(),
                    locus.name()
                ));
            }
            match region {
                Region::V => vs.push(g),
                Region::D => ds.push(g),
                Region::J => js.push(g),
            }
        }
        GermlineSet::new(locus, vs, ds, js)
    }

    fn check(&self) -> Result<()> {
        for region in Region::ALL {
            if self.genes(region).is_empty() {
                return Err(SimulationError::EmptyGenePool(region).into());
            }
            let codon = self.locus.conserved_codon(region);
            for g in self.genes(region) {
                if g.is_empty() {
                    return Err(anyhow!("Gene {} has an empty sequence", g.name));
                }
                if codon.is_none() {
                    continue;
                }
                match g.cdr3_pos {
                    Some(pos) if pos + 3 <= g.len() => {}
                    Some(pos) => {
                        return Err(anyhow!(
                            "Conserved codon position {} of gene {} is outside of its sequence (length {})",
                            pos,
                            g.name,
                            g.len()
                        ))
                    }
                    None => {
                        return Err(anyhow!(
                            "Gene {} has no conserved codon position",
                            g.name
                        ))
                    }
                }
            }
        }
        Ok(())
    }

    /// Set the relative prevalence of the alleles of `region`. Every gene of the
    /// region needs a weight, the weights are normalized.
    pub fn with_allele_prevalence(
        mut self,
        region: Region,
        weights: HashMap<String, f64>,
    ) -> Result<GermlineSet> {
        let mut normalized = HashMap::new();
        let total: f64 = weights.values().sum();
        if weights.values().any(|&w| w < 0.) || total <= 0. {
            return Err(anyhow!(
                "Allele prevalence weights for region {} must be non-negative and not all zero",
                region
            ));
        }
        for g in self.genes(region) {
            let w = weights.get(&g.name).ok_or(anyhow!(
                "Gene {} not found in the allele prevalence weights of region {}",
                g.name,
                region
            ))?;
            normalized.insert(g.name.clone(), w / total);
        }
        self.allele_prevalence.insert(region, normalized);
        Ok(self)
    }

    pub fn genes(&self, region: Region) -> &[Gene] {
        match region {
            Region::V => &self.seg_vs,
            Region::D => &self.seg_ds,
            Region::J => &self.seg_js,
        }
    }

    pub fn get(&self, region: Region, name: &str) -> Result<&Gene> {
        self.genes(region)
            .iter()
            .find(|g| g.name == name)
            .ok_or(anyhow!("Gene {} not found in the {} germline genes", name, region))
    }

    pub fn contains(&self, region: Region, name: &str) -> bool {
        self.genes(region).iter().any(|g| g.name == name)
    }

    /// Allele prevalence weights in gene order, if set for that region
    pub fn prevalence_weights(&self, region: Region) -> Option<Vec<f64>> {
        let freqs = self.allele_prevalence.get(&region)?;
        if freqs.is_empty() {
            return None;
        }
        Some(
            self.genes(region)
                .iter()
                .map(|g| freqs.get(&g.name).copied().unwrap_or(0.))
                .collect(),
        )
    }
}
