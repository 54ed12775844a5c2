//! Erosion, insertion and assembly of the germline segments into a naive sequence
use crate::shared::gene::{GermlineSet, Region};
use crate::shared::sequence::Dna;
use crate::simulation::event::{
    Boundary, CodonPositions, EventStage, RearrangementChoice, RecombinationEvent, Rejection,
};
use crate::simulation::tables::InsertionContentTable;
use anyhow::Result;
use rand::Rng;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum End {
    FivePrime,
    ThreePrime,
}

/// Remove `n` nucleotides from one end of `seq`
///```
/// use vdjsim::Dna;
/// use vdjsim::simulation::assembler::{erode, End};
/// let s = Dna::from_string("ACGTAC").unwrap();
/// assert_eq!(erode(&s, 2, End::FivePrime).get_string(), "GTAC");
/// assert_eq!(erode(&s, 2, End::ThreePrime).get_string(), "ACGT");
/// assert!(erode(&s, 10, End::ThreePrime).is_empty());
///```
pub fn erode(seq: &Dna, n: usize, end: End) -> Dna {
    let n = n.min(seq.len());
    match end {
        End::FivePrime => seq.extract_subsequence(n, seq.len()),
        End::ThreePrime => seq.extract_subsequence(0, seq.len() - n),
    }
}

/// The segments of a rearrangement laid out in a single sequence
#[derive(Clone, Debug)]
pub struct Layout {
    pub eroded: HashMap<Region, Dna>,
    pub naive: Dna,
    // position of the first complete codon of the naive sequence
    pub frame_start: usize,
    pub codon_positions: Option<CodonPositions>,
}

impl Layout {
    /// Erode the genes of `choice` and join them with the given insertions.
    /// `frame_offset` is the position of the first complete codon in the
    /// uneroded germline V genes.
    pub fn new(
        glfo: &GermlineSet,
        choice: &RearrangementChoice,
        vd_insertion: &Dna,
        dj_insertion: &Dna,
        frame_offset: usize,
    ) -> Result<Layout> {
        let mut eroded = HashMap::new();
        for region in Region::ALL {
            let gene = glfo.get(region, choice.gene(region))?;
            let seq = erode(&gene.seq, choice.erosions.five_prime(region), End::FivePrime);
            let seq = erode(&seq, choice.erosions.three_prime(region), End::ThreePrime);
            eroded.insert(region, seq);
        }

        let mut naive = eroded[&Region::V].clone();
        naive.extend(vd_insertion);
        naive.extend(&eroded[&Region::D]);
        naive.extend(dj_insertion);
        let j_start = naive.len();
        naive.extend(&eroded[&Region::J]);

        let v_5p = choice.erosions.v_5p;
        let v_cdr3 = glfo.get(Region::V, &choice.v_gene)?.cdr3_pos;
        let j_cdr3 = glfo.get(Region::J, &choice.j_gene)?.cdr3_pos;
        let codon_positions = match (v_cdr3, j_cdr3) {
            (Some(v), Some(j)) if v >= v_5p && j >= choice.erosions.j_5p => Some(CodonPositions {
                v: v - v_5p,
                j: j_start + j - choice.erosions.j_5p,
            }),
            _ => None,
        };

        Ok(Layout {
            eroded,
            naive,
            frame_start: (frame_offset % 3 + 3 - v_5p % 3) % 3,
            codon_positions,
        })
    }

    /// Both conserved codons start a codon of the reading frame
    pub fn in_frame(&self) -> bool {
        self.codon_positions
            .is_some_and(|pos| pos.in_frame(self.frame_start))
    }

    pub fn has_stop_codon(&self) -> bool {
        self.naive.has_stop_codon(self.frame_start)
    }

    pub fn cdr3_length(&self) -> Option<usize> {
        self.codon_positions.map(|p| p.cdr3_length())
    }
}

/// Applies erosions and insertions to the chosen genes
#[derive(Clone, Debug)]
pub struct GeneSegmentAssembler {
    frame_offset: usize,
    max_insertion_tries: usize,
}

impl GeneSegmentAssembler {
    pub fn new(frame_offset: usize, max_insertion_tries: usize) -> GeneSegmentAssembler {
        GeneSegmentAssembler {
            frame_offset,
            max_insertion_tries: max_insertion_tries.max(1),
        }
    }

    /// Build the naive sequence of `event`. Insertions are redrawn until they
    /// stop adding stop codons (stop codons already present in the germline
    /// parts are tolerated).
    pub fn erode_and_insert<R: Rng>(
        &self,
        event: &mut RecombinationEvent,
        glfo: &GermlineSet,
        content: &InsertionContentTable,
        rng: &mut R,
    ) -> Result<Option<Rejection>> {
        // placeholder insertions, to see if there's a stop outside of them
        let dummy = |b: Boundary| Dna {
            seq: vec![b'N'; event.choice.insertion_length(b)],
        };
        let layout = Layout::new(
            glfo,
            &event.choice,
            &dummy(Boundary::Vd),
            &dummy(Boundary::Dj),
            self.frame_offset,
        )?;
        if glfo.locus.has_d() {
            for region in Region::ALL {
                if layout.eroded[&region].is_empty() {
                    log::warn!(
                        "eroded away the entire {} gene {} (seed {})",
                        region,
                        event.choice.gene(region),
                        event.seed
                    );
                }
            }
        }
        let pre_existing_stop = layout.has_stop_codon();

        let mut itry = 0;
        let layout = loop {
            let vd = content.draw(Boundary::Vd, event.choice.vd_insertion, rng);
            let dj = content.draw(Boundary::Dj, event.choice.dj_insertion, rng);
            let layout = Layout::new(glfo, &event.choice, &vd, &dj, self.frame_offset)?;
            itry += 1;
            if pre_existing_stop || !layout.has_stop_codon() {
                event.insertions.insert(Boundary::Vd, vd);
                event.insertions.insert(Boundary::Dj, dj);
                break layout;
            }
            if itry % 50 == 0 {
                log::warn!(
                    "adding insertions is taking an oddly large number of tries ({} so far)",
                    itry
                );
            }
            if itry >= self.max_insertion_tries {
                return Ok(Some(Rejection::StopCodonInInsertions));
            }
        };

        event.eroded_seqs = layout.eroded;
        event.naive_seq = layout.naive;
        event.frame_start = layout.frame_start;
        event.codon_positions = layout.codon_positions;
        event.advance(EventStage::Chosen, EventStage::Assembled)?;
        Ok(None)
    }

    /// True if each conserved codon of the naive sequence still encodes its residue
    pub fn codons_ok(&self, event: &RecombinationEvent, glfo: &GermlineSet) -> bool {
        let Some(pos) = event.codon_positions else {
            return false;
        };
        [Region::V, Region::J].iter().all(|&region| {
            match (glfo.locus.conserved_codon(region), pos.get(region)) {
                (Some(codon), Some(p)) => {
                    let ok = codon.is_intact(event.naive_seq.codon_at(p));
                    if !ok {
                        log::debug!(
                            "{} conserved codon at {} corrupted (seed {})",
                            region,
                            p,
                            event.seed
                        );
                    }
                    ok
                }
                _ => true,
            }
        })
    }

    pub fn in_frame(&self, event: &RecombinationEvent) -> bool {
        event
            .codon_positions
            .is_some_and(|pos| pos.in_frame(event.frame_start))
    }
}
