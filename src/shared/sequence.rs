//! Nucleotide sequences and the codon helpers used to check reading frames
use anyhow::{anyhow, Result};
use phf::phf_map;
use serde::{Deserialize, Serialize};
use std::fmt;

static DNA_TO_AMINO: phf::Map<&'static str, u8> = phf_map! {
    "TTT" => b'F', "TTC" => b'F', "TTA" => b'L', "TTG" => b'L', "TCT" => b'S', "TCC" => b'S',
    "TCA" => b'S', "TCG" => b'S', "TAT" => b'Y', "TAC" => b'Y', "TAA" => b'*', "TAG" => b'*',
    "TGT" => b'C', "TGC" => b'C', "TGA" => b'*', "TGG" => b'W', "CTT" => b'L', "CTC" => b'L',
    "CTA" => b'L', "CTG" => b'L', "CCT" => b'P', "CCC" => b'P', "CCA" => b'P', "CCG" => b'P',
    "CAT" => b'H', "CAC" => b'H', "CAA" => b'Q', "CAG" => b'Q', "CGT" => b'R', "CGC" => b'R',
    "CGA" => b'R', "CGG" => b'R', "ATT" => b'I', "ATC" => b'I', "ATA" => b'I', "ATG" => b'M',
    "ACT" => b'T', "ACC" => b'T', "ACA" => b'T', "ACG" => b'T', "AAT" => b'N', "AAC" => b'N',
    "AAA" => b'K', "AAG" => b'K', "AGT" => b'S', "AGC" => b'S', "AGA" => b'R', "AGG" => b'R',
    "GTT" => b'V', "GTC" => b'V', "GTA" => b'V', "GTG" => b'V', "GCT" => b'A', "GCC" => b'A',
    "GCA" => b'A', "GCG" => b'A', "GAT" => b'D', "GAC" => b'D', "GAA" => b'E', "GAG" => b'E',
    "GGT" => b'G', "GGC" => b'G', "GGA" => b'G', "GGG" => b'G'
};

// The four nucleotides that can be inserted or mutated to, in the order used by
// every probability vector of the crate.
pub const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];

pub static NUCLEOTIDES_INV: phf::Map<u8, usize> = phf_map! {
    b'A' => 0, b'T' => 3, b'G' => 2, b'C' => 1, b'N' => 4,
    b'R' => 5, b'Y' => 6, b'S' => 7, b'W' => 8, b'K' => 9,
    b'M' => 10, b'B' => 11, b'D' => 12, b'H' => 13, b'V' => 14,
};

/// Index of an unambiguous nucleotide in `NUCLEOTIDES`
pub fn nucleotides_inv(n: u8) -> Option<usize> {
    match n {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Translate a single codon, `None` if it contains anything but ACGT.
///```
/// use vdjsim::shared::sequence::translate_codon;
/// assert_eq!(translate_codon(b"TGT"), Some(b'C'));
/// assert_eq!(translate_codon(b"TAG"), Some(b'*'));
/// assert_eq!(translate_codon(b"TNG"), None);
///```
pub fn translate_codon(codon: &[u8]) -> Option<u8> {
    let codon_str = std::str::from_utf8(codon).ok()?;
    DNA_TO_AMINO.get(codon_str).copied()
}

#[derive(Serialize, Deserialize, Default, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Dna {
    pub seq: Vec<u8>,
}

impl fmt::Display for Dna {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.seq))
    }
}

impl Dna {
    pub fn new() -> Dna {
        Dna { seq: Vec::new() }
    }

    pub fn from_string(s: &str) -> Result<Dna> {
        let upper = s.to_ascii_uppercase();
        for &byte in upper.as_bytes() {
            if !NUCLEOTIDES_INV.contains_key(&byte) {
                return Err(anyhow!(format!(
                    "Invalid nucleotide '{}' in sequence {}",
                    byte as char, s
                )));
            }
        }

        Ok(Dna {
            seq: upper.into_bytes(),
        })
    }

    pub fn get_string(&self) -> String {
        self.to_string()
    }

    pub fn len(&self) -> usize {
        self.seq.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    pub fn extend(&mut self, dna: &Dna) {
        self.seq.extend(dna.seq.iter());
    }

    /// Return dna[start:end]
    pub fn extract_subsequence(&self, start: usize, end: usize) -> Dna {
        Dna {
            seq: self.seq[start..end].to_vec(),
        }
    }

    /// The three nucleotides starting at `pos`, if the sequence is long enough
    pub fn codon_at(&self, pos: usize) -> Option<&[u8]> {
        self.seq.get(pos..pos + 3)
    }

    /// Overwrite the codon at `pos` (no-op if it would run past the end)
    pub fn set_codon(&mut self, pos: usize, codon: &[u8]) {
        if pos + 3 <= self.seq.len() && codon.len() == 3 {
            self.seq[pos..pos + 3].copy_from_slice(codon);
        }
    }

    /// True if one of the complete codons read from `frame_start` is a stop.
    /// Codons containing ambiguous nucleotides never count as stops.
    ///```
    /// use vdjsim::Dna;
    /// let s = Dna::from_string("ACTAGCC").unwrap();
    /// assert!(s.has_stop_codon(2));
    /// assert!(!s.has_stop_codon(0));
    /// assert!(!s.has_stop_codon(1));
    ///```
    pub fn has_stop_codon(&self, frame_start: usize) -> bool {
        if frame_start >= self.seq.len() {
            return false;
        }
        self.seq[frame_start..]
            .chunks_exact(3)
            .any(|codon| translate_codon(codon) == Some(b'*'))
    }

    /// Number of positions that differ between two sequences of the same length
    pub fn count_differences(&self, other: &Dna) -> usize {
        self.seq
            .iter()
            .zip(other.seq.iter())
            .filter(|(a, b)| a != b)
            .count()
    }
}
