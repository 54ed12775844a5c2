// Readers for the germline, tree and sequence files

use crate::shared::gene::Gene;
use crate::shared::sequence::Dna;
use crate::shared::tree::TreeRecord;
use anyhow::{anyhow, Context, Result};
use bio::io::fasta;
use csv::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;
use std::str::FromStr;

/// Read every record of a (multi-)FASTA file, in file order
pub fn read_fasta(path: &Path) -> Result<Vec<(String, Dna)>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open FASTA file {}", path.display()))?;
    let reader = fasta::Reader::new(BufReader::new(file));
    let mut result = Vec::new();
    for record in reader.records() {
        let record =
            record.with_context(|| format!("Invalid FASTA record in {}", path.display()))?;
        let seq = std::str::from_utf8(record.seq())
            .with_context(|| format!("Non-utf8 sequence {} in {}", record.id(), path.display()))?;
        let dna = Dna::from_string(seq)
            .with_context(|| format!("Invalid sequence {} in {}", record.id(), path.display()))?;
        result.push((record.id().to_string(), dna));
    }
    Ok(result)
}

pub fn write_fasta<W: Write>(writer: W, records: &[(String, Dna)]) -> Result<()> {
    let mut wtr = fasta::Writer::new(writer);
    for (name, seq) in records {
        wtr.write(name, None, &seq.seq)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Read germline genes from a FASTA file and their conserved codon positions
/// from a csv file (`gene,anchor_index`, further columns are ignored). Genes
/// missing from the anchor file get no codon position (fine for D genes).
pub fn read_genes(fasta_path: &Path, anchor_path: Option<&Path>) -> Result<Vec<Gene>> {
    let mut anchors = HashMap::<String, usize>::new();
    if let Some(path) = anchor_path {
        let mut rdr = Reader::from_path(path)
            .with_context(|| format!("Error opening the anchor file {}", path.display()))?;
        rdr.headers()
            .map_err(|_e| anyhow!("Error reading the anchor file headers"))?;
        for result in rdr.records() {
            let record = result.map_err(|e| anyhow!("Error reading the record {:?}", e))?;
            let gene_name = record
                .get(0)
                .ok_or(anyhow!("Missing gene name in anchor file"))?;
            let anchor = usize::from_str(record.get(1).unwrap_or_default()).map_err(|e| {
                anyhow!("Invalid anchor for gene {} in the anchor file: {:?}", gene_name, e)
            })?;
            anchors.insert(gene_name.to_string(), anchor);
        }
    }

    let mut genes = Vec::new();
    for (name, seq) in read_fasta(fasta_path)? {
        let cdr3_pos = anchors.get(&name).copied();
        genes.push(Gene {
            name,
            cdr3_pos,
            seq,
        });
    }
    Ok(genes)
}

/// Read one tree record per non-empty line (`<newick>;v:0.98,d:1.8,j:0.87`)
pub fn read_tree_records(path: &Path) -> Result<Vec<TreeRecord>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open tree file {}", path.display()))?;
    let reader = io::BufReader::new(file);
    let mut records = Vec::new();
    for (ii, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(
            TreeRecord::parse_line(&line)
                .with_context(|| format!("line {} of {}", ii + 1, path.display()))?,
        );
    }
    if records.is_empty() {
        return Err(anyhow!("No tree found in {}", path.display()));
    }
    Ok(records)
}
