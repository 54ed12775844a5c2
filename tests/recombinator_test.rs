mod common;
use anyhow::Result;
use common::FakeProcess;
use ndarray::Array1;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use vdjsim::shared::parameters::{RejectionPolicy, ScratchErosionMeans, ScratchInsertionMeans};
use vdjsim::simulation::event::Rejection;
use vdjsim::simulation::{
    Erosions, EventSampler, GeneSegmentAssembler, InsertionContentTable, MutationRateProfile,
    MutationRateProfiles, RecombinationEvent, VersionFrequencyTable,
};
use vdjsim::{Dna, Gene, GermlineSet, Locus, Recombinator, Region, SimulationError, SimulationTables};

fn tables_with(table: VersionFrequencyTable) -> SimulationTables {
    SimulationTables {
        version_freqs: Some(table),
        ..Default::default()
    }
}

fn germline_concat(glfo: &vdjsim::GermlineSet, v: &str, d: &str, j: &str) -> Result<Dna> {
    let mut seq = glfo.get(Region::V, v)?.seq.clone();
    seq.extend(&glfo.get(Region::D, d)?.seq);
    seq.extend(&glfo.get(Region::J, j)?.seq);
    Ok(seq)
}

#[test]
fn test_no_erosion_no_insertion_no_mutation() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let glfo = common::igh_germlines();
    let mut params = common::scratch_params(dir.path());
    params.scratch_erosion_means = ScratchErosionMeans {
        v_3p: 0.,
        d_5p: 0.,
        d_3p: 0.,
        j_5p: 0.,
    };
    params.scratch_insertion_means = Some(ScratchInsertionMeans { vd: 0., dj: 0. });

    let rec = Recombinator::new(
        glfo.clone(),
        params,
        SimulationTables::default(),
        common::zero_depth_tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    for seed in 0..5 {
        let line = rec.combine(seed)?;
        assert_eq!(line.n_attempts, 1);
        assert_eq!(line.erosions, Erosions::default());
        assert!(line.vd_insertion.is_empty() && line.dj_insertion.is_empty());
        let expected = germline_concat(&glfo, &line.v_gene, &line.d_gene, &line.j_gene)?;
        assert_eq!(line.naive_seq, expected);
        assert_eq!(line.n_leaves(), 3);
        assert!(line.seqs.iter().all(|s| *s == line.naive_seq));
        assert_eq!(line.leaf_names, vec!["t1", "t2", "t3"]);
        assert_eq!(line.unique_ids[0], format!("{}-t1", line.seed));
        // V 30 nt, cysteine at 21, D 12 nt, tryptophan at 12 in J
        assert_eq!(line.codon_positions.v, 21);
        assert_eq!(line.codon_positions.j, 54);
        assert_eq!(line.cdr3_length, 36);
    }
    Ok(())
}

#[test]
fn test_same_seed_same_line() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::scratch_params(dir.path()),
        SimulationTables::default(),
        common::tree_records(),
        Box::new(FakeProcess::scramble()),
    )?;
    for seed in [0, 17, 12345] {
        let first = rec.combine(seed)?;
        let second = rec.combine(seed)?;
        assert_eq!(first, second);
    }
    Ok(())
}

#[test]
fn test_frame_and_codons_from_scratch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let process = FakeProcess::scramble();
    let calls = process.calls.clone();
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::scratch_params(dir.path()),
        SimulationTables::default(),
        common::tree_records(),
        Box::new(process),
    )?;
    for seed in 0..30 {
        let line = rec.combine(seed)?;
        let pos = line.codon_positions;
        assert_eq!(pos.v % 3, 0);
        assert_eq!(pos.j % 3, 0);
        assert_eq!(line.cdr3_length % 3, 0);
        assert!(!line.naive_seq.has_stop_codon(0));
        assert_eq!(line.naive_seq.codon_at(pos.v), Some(&b"TGT"[..]));
        assert_eq!(line.naive_seq.codon_at(pos.j), Some(&b"TGG"[..]));
        // scratch erosions never reach the conserved codons
        assert!(line.erosions.v_3p <= 6);
        assert!(line.erosions.j_5p <= 11);
        assert_eq!(line.erosions.v_5p, 0);
        assert_eq!(line.erosions.j_3p, 0);

        for (seq, p) in line.seqs.iter().zip(line.leaf_codon_positions.iter()) {
            assert_eq!(seq.len(), line.naive_seq.len());
            assert_eq!(seq.codon_at(p.v), Some(&b"TGT"[..]));
            assert_eq!(seq.codon_at(p.j), Some(&b"TGG"[..]));
            // everything but the two codons was mutated
            assert_eq!(seq.count_differences(&line.naive_seq), seq.len() - 6);
        }
    }
    assert!(calls.load(Ordering::SeqCst) >= 30 * 2);
    Ok(())
}

#[test]
fn test_leaf_count_and_trees() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let process = FakeProcess::echo();
    let jobs = process.jobs.clone();
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::empirical_params(dir.path()),
        tables_with(common::in_frame_table()),
        common::tree_records(),
        Box::new(process),
    )?;
    let line = rec.combine(3)?;
    assert_eq!(line.n_leaves(), 3);
    assert_eq!(line.leaf_names.len(), 3);
    assert_eq!(line.unique_ids.len(), 3);
    assert_eq!(line.leaf_codon_positions.len(), 3);
    assert_eq!(line.indel_infos.len(), 3);
    assert!(line.tree.is_some());
    assert_eq!(line.scaled_trees.len(), 3);

    let jobs = jobs.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
    assert_eq!(jobs.len(), 3);
    for job in jobs.iter() {
        // the anchor leaf hangs from a new root
        assert!(job.tree.contains("xxx:"));
        assert!(job.tree.trim_end().ends_with("):0;"));
        assert!(!job.tree.contains("n1"));
        assert!(job.rates.is_none());
    }
    // the scratch directories are cleaned up
    assert_eq!(std::fs::read_dir(dir.path())?.count(), 0);
    Ok(())
}

#[test]
fn test_out_of_frame_hits_attempt_bound() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let process = FakeProcess::echo();
    let calls = process.calls.clone();
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::empirical_params(dir.path()),
        tables_with(common::out_of_frame_table()),
        common::tree_records(),
        Box::new(process),
    )?;
    assert!(rec.try_to_combine(5)?.is_none());

    let err = rec.combine(0).unwrap_err();
    match err.downcast_ref::<SimulationError>() {
        Some(SimulationError::TooManyTries(n)) => assert_eq!(*n, 9999),
        other => panic!("unexpected error {:?}", other),
    }
    // rejected before reaching the mutation step
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_nonfunctional_leaves_are_retried() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut params = common::empirical_params(dir.path());
    params.max_attempts = 20;
    params.remove_nonfunctional_seqs = true;
    let process = FakeProcess::stops();
    let calls = process.calls.clone();
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        tables_with(common::in_frame_table()),
        common::tree_records(),
        Box::new(process),
    )?;

    let err = rec.combine(0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::TooManyTries(20))
    ));
    // one call per region per attempt
    assert_eq!(calls.load(Ordering::SeqCst), 20 * 3);
    Ok(())
}

#[test]
fn test_functional_leaves_are_kept() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut params = common::empirical_params(dir.path());
    params.remove_nonfunctional_seqs = true;
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        tables_with(common::in_frame_table()),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let line = rec.combine(8)?;
    assert_eq!(line.n_attempts, 1);
    assert_eq!(line.n_leaves(), 3);
    assert!((0..3).all(|i| line.is_functional(i, Locus::Igh)));
    Ok(())
}

#[test]
fn test_fatal_policy() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut params = common::empirical_params(dir.path());
    params.rejection_policy = Some(RejectionPolicy::Fatal);
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        tables_with(common::out_of_frame_table()),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let err = rec.combine(4).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::StrictOutOfFrame { seed: 4 })
    ));
    Ok(())
}

#[test]
fn test_zero_mutation_multiplier() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut params = common::empirical_params(dir.path());
    params.mutation_multiplier = Some(0.);
    let process = FakeProcess::scramble();
    let calls = process.calls.clone();
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        tables_with(common::in_frame_table()),
        common::tree_records(),
        Box::new(process),
    )?;
    let line = rec.combine(11)?;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(line.n_leaves(), 3);
    assert_eq!(line.leaf_names, vec!["t1", "t2", "t3"]);
    assert!(line.seqs.iter().all(|s| *s == line.naive_seq));
    assert!(line.tree.is_none());
    Ok(())
}

#[test]
fn test_d_fragment_rates() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let glfo = common::igh_germlines();
    let mut params = common::empirical_params(dir.path());
    params.mutate_from_scratch = false;

    let table = VersionFrequencyTable::new(vec![(
        common::choice(
            common::IGHV1,
            Erosions {
                v_3p: 3,
                d_5p: 2,
                d_3p: 1,
                j_5p: 3,
                ..Default::default()
            },
            2,
            1,
        ),
        1.,
    )])?;
    let mut profiles = MutationRateProfiles::new();
    for region in Region::ALL {
        for gene in glfo.genes(region) {
            profiles.insert(
                &gene.name,
                MutationRateProfile {
                    freqs: (0..gene.len()).map(|i| (i, (i + 1) as f64)).collect(),
                    overall_mean: 100.,
                },
            );
        }
    }
    let process = FakeProcess::echo();
    let jobs = process.jobs.clone();
    let rec = Recombinator::new(
        glfo,
        params,
        SimulationTables {
            version_freqs: Some(table),
            insertion_content: None,
            mutation_profiles: profiles,
        },
        common::tree_records(),
        Box::new(process),
    )?;
    rec.combine(1)?;

    let jobs = jobs.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
    for job in jobs.iter() {
        let rates = Array1::from(job.rates.clone().unwrap_or_default());
        assert_eq!(rates.len(), job.seq.len());
        assert!((rates.sum() - rates.len() as f64).abs() < 1e-6);
    }
    let d_job = jobs
        .iter()
        .find(|j| j.region == Region::D)
        .ok_or(anyhow::anyhow!("no D job"))?;
    let rates = d_job.rates.clone().unwrap_or_default();
    // vd insertion (2), D from germline position 2 to 10, dj insertion (1)
    assert_eq!(rates.len(), 12);
    assert!((rates[0] / rates[2] - 100. / 3.).abs() < 1e-9);
    assert!((rates[3] / rates[2] - 4. / 3.).abs() < 1e-9);
    assert!((rates[11] - rates[0]).abs() < 1e-9);
    let v_job = jobs
        .iter()
        .find(|j| j.region == Region::V)
        .ok_or(anyhow::anyhow!("no V job"))?;
    let rates = v_job.rates.clone().unwrap_or_default();
    assert!((rates[1] / rates[0] - 2.).abs() < 1e-9);
    Ok(())
}

#[test]
fn test_light_chain_placeholder_d() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let glfo = common::igk_germlines();
    let mut params = common::scratch_params(dir.path());
    params.locus = Locus::Igk;
    params.mutate_from_scratch = false;

    // no profile for the placeholder D
    let mut profiles = MutationRateProfiles::new();
    for region in [Region::V, Region::J] {
        for gene in glfo.genes(region) {
            profiles.insert(
                &gene.name,
                MutationRateProfile {
                    freqs: Default::default(),
                    overall_mean: 0.05,
                },
            );
        }
    }
    let process = FakeProcess::echo();
    let jobs = process.jobs.clone();
    let rec = Recombinator::new(
        glfo,
        params,
        SimulationTables {
            mutation_profiles: profiles,
            ..Default::default()
        },
        common::tree_records(),
        Box::new(process),
    )?;
    for seed in 0..10 {
        let line = rec.combine(seed)?;
        assert_eq!(line.d_gene, Locus::Igk.dummy_d_name());
        assert_eq!(line.erosions.d_5p, 1);
        assert!(line.vd_insertion.is_empty());
        assert_eq!(line.codon_positions.v % 3, 0);
        assert_eq!(line.codon_positions.j % 3, 0);
        assert_eq!(line.naive_seq.codon_at(line.codon_positions.j), Some(&b"TTC"[..]));
    }
    let jobs = jobs.lock().map_err(|e| anyhow::anyhow!("{}", e))?;
    for job in jobs.iter().filter(|j| j.region == Region::D) {
        assert!(job
            .rates
            .iter()
            .flatten()
            .all(|r| (r - 1.).abs() < 1e-9));
    }
    Ok(())
}

#[test]
fn test_combine_many_keeps_seed_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::empirical_params(dir.path()),
        tables_with(common::in_frame_table()),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let seeds = vec![5, 6, 7, 8];
    let lines = rec.combine_many(&seeds)?;
    assert_eq!(lines.iter().map(|l| l.seed).collect::<Vec<_>>(), seeds);
    Ok(())
}

#[test]
fn test_locus_mismatch() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut params = common::scratch_params(dir.path());
    params.locus = Locus::Igk;
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        SimulationTables::default(),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    );
    assert!(rec.is_err());

    // an empirical run needs its table
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::empirical_params(dir.path()),
        SimulationTables::default(),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    );
    assert!(rec.is_err());
    Ok(())
}

/// IGH germline set with `v_seq` as its only V gene
fn igh_with_v(v_seq: &str) -> Result<GermlineSet> {
    let igh = common::igh_germlines();
    GermlineSet::new(
        Locus::Igh,
        vec![Gene::new(common::IGHV1, v_seq, Some(21))?],
        vec![igh.get(Region::D, common::IGHD)?.clone()],
        vec![igh.get(Region::J, common::IGHJ)?.clone()],
    )
}

#[test]
fn test_insertions_redrawn_until_stop_free() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // no C: one codon out of nine is a stop
    let content = InsertionContentTable::new([1., 0., 1., 1.], [1.; 4])?;
    // V (30) + 6 inserted nucleotides + D: the insertion is exactly two codons
    let table = || {
        VersionFrequencyTable::new(vec![(
            common::choice(common::IGHV1, Erosions::default(), 6, 0),
            1.,
        )])
    };
    let rec = Recombinator::new(
        common::igh_germlines(),
        common::empirical_params(dir.path()),
        SimulationTables {
            version_freqs: Some(table()?),
            insertion_content: Some(content.clone()),
            ..Default::default()
        },
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    for seed in 0..50 {
        let line = rec.combine(seed)?;
        assert_eq!(line.n_attempts, 1);
        assert_eq!(line.vd_insertion.len(), 6);
        assert!(!line.vd_insertion.seq.contains(&b'C'));
        assert!(!line.naive_seq.has_stop_codon(0));
    }

    // a single draw per attempt: some attempts get a stop and are thrown away
    let mut params = common::empirical_params(dir.path());
    params.max_insertion_tries = 1;
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        SimulationTables {
            version_freqs: Some(table()?),
            insertion_content: Some(content),
            ..Default::default()
        },
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let mut n_rejected = 0;
    for seed in 0..50 {
        match rec.try_to_combine(seed)? {
            Some(line) => assert!(!line.naive_seq.has_stop_codon(0)),
            None => n_rejected += 1,
        }
    }
    assert!(n_rejected > 0);
    Ok(())
}

#[test]
fn test_insertion_tries_run_out() -> Result<()> {
    let glfo = common::igh_germlines();
    // D eroded down to AGCAGCA right after a single T: TAG in every draw
    let choice = common::choice(
        common::IGHV1,
        Erosions {
            d_5p: 5,
            ..Default::default()
        },
        1,
        1,
    );
    let content = InsertionContentTable::new([0., 0., 0., 1.], [1., 0., 0., 0.])?;
    for max_tries in [1, 20] {
        let assembler = GeneSegmentAssembler::new(0, max_tries);
        let mut event = RecombinationEvent::new(0, choice.clone());
        let mut rng = SmallRng::seed_from_u64(0);
        let rejection = assembler.erode_and_insert(&mut event, &glfo, &content, &mut rng)?;
        assert_eq!(rejection, Some(Rejection::StopCodonInInsertions));
    }

    let dir = tempfile::tempdir()?;
    let mut params = common::empirical_params(dir.path());
    params.max_insertion_tries = 5;
    params.max_attempts = 3;
    let process = FakeProcess::echo();
    let calls = process.calls.clone();
    let rec = Recombinator::new(
        glfo,
        params,
        SimulationTables {
            version_freqs: Some(VersionFrequencyTable::new(vec![(choice, 1.)])?),
            insertion_content: Some(content),
            ..Default::default()
        },
        common::tree_records(),
        Box::new(process),
    )?;
    let err = rec.combine(0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::TooManyTries(3))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    Ok(())
}

#[test]
fn test_germline_stop_codon_tolerated() -> Result<()> {
    // TAG as the second codon of the V gene
    let glfo = igh_with_v("CAGTAGCAGCTGGTGTATTACTGTGCGAGA")?;
    let dir = tempfile::tempdir()?;
    let mut params = common::empirical_params(dir.path());
    params.max_insertion_tries = 1;
    params.max_attempts = 1;
    let rec = Recombinator::new(
        glfo,
        params,
        tables_with(VersionFrequencyTable::new(vec![(
            common::choice(common::IGHV1, Erosions::default(), 3, 0),
            1.,
        )])?),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    for seed in 0..20 {
        let line = rec.combine(seed)?;
        assert_eq!(line.n_attempts, 1);
        assert!(line.naive_seq.has_stop_codon(0));
        assert!(!line.is_functional(0, Locus::Igh));
    }
    Ok(())
}

#[test]
fn test_corrupted_codons_are_retried() -> Result<()> {
    let dir = tempfile::tempdir()?;
    // V eroded into its cysteine, J eroded past its tryptophan
    let table = || {
        VersionFrequencyTable::new(vec![
            (
                common::choice(
                    common::IGHV1,
                    Erosions {
                        v_3p: 9,
                        ..Default::default()
                    },
                    0,
                    0,
                ),
                1.,
            ),
            (
                common::choice(
                    common::IGHV3,
                    Erosions {
                        j_5p: 14,
                        ..Default::default()
                    },
                    0,
                    0,
                ),
                1.,
            ),
        ])
    };
    let mut params = common::empirical_params(dir.path());
    params.max_attempts = 10;
    let process = FakeProcess::echo();
    let calls = process.calls.clone();
    let rec = Recombinator::new(
        common::igh_germlines(),
        params.clone(),
        tables_with(table()?),
        common::tree_records(),
        Box::new(process),
    )?;
    for seed in 0..10 {
        assert!(rec.try_to_combine(seed)?.is_none());
    }
    let err = rec.combine(0).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::TooManyTries(10))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    params.rejection_policy = Some(RejectionPolicy::Fatal);
    let rec = Recombinator::new(
        common::igh_germlines(),
        params,
        tables_with(table()?),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let err = rec.combine(2).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::StrictCodonCorruption { seed: 2 })
    ));
    Ok(())
}

#[test]
fn test_strict_policy_with_generated_germlines() -> Result<()> {
    // GGT (glycine) where the V cysteine should be
    let v_seq = "CAGGTGCAGCTGGTGTATTACGGTGCGAGA";
    let dir = tempfile::tempdir()?;
    let mut params = common::scratch_params(dir.path());
    params.generate_germline_set = true;
    assert_eq!(params.rejection_policy(), RejectionPolicy::Fatal);
    let rec = Recombinator::new(
        igh_with_v(v_seq)?,
        params.clone(),
        SimulationTables::default(),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let err = rec.combine(7).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::StrictCodonCorruption { seed: 7 })
    ));

    // same thing without a generated germline set: retried until giving up
    params.generate_germline_set = false;
    params.max_attempts = 5;
    let rec = Recombinator::new(
        igh_with_v(v_seq)?,
        params,
        SimulationTables::default(),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    let err = rec.combine(7).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::TooManyTries(5))
    ));
    Ok(())
}

#[test]
fn test_scratch_cdr3_lengths_and_prevalence() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let glfo = common::igh_germlines().with_allele_prevalence(
        Region::V,
        HashMap::from([
            (common::IGHV1.to_string(), 1.),
            (common::IGHV3.to_string(), 0.),
        ]),
    )?;
    let mut params = common::scratch_params(dir.path());
    params.allowed_cdr3_lengths = Some(vec![30]);
    let rec = Recombinator::new(
        glfo,
        params,
        SimulationTables::default(),
        common::tree_records(),
        Box::new(FakeProcess::echo()),
    )?;
    for seed in 0..40 {
        let line = rec.combine(seed)?;
        assert_eq!(line.cdr3_length, 30);
        assert_eq!(line.codon_positions.cdr3_length(), 30);
        assert_eq!(line.v_gene, common::IGHV1);
    }
    Ok(())
}

#[test]
fn test_empty_gene_pool() -> Result<()> {
    let igh = common::igh_germlines();
    let err = GermlineSet::new(
        Locus::Igh,
        vec![],
        igh.genes(Region::D).to_vec(),
        igh.genes(Region::J).to_vec(),
    )
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::EmptyGenePool(Region::V))
    ));

    let dir = tempfile::tempdir()?;
    let err = EventSampler::from_scratch(&GermlineSet::default(), &common::scratch_params(dir.path()))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SimulationError>(),
        Some(SimulationError::EmptyGenePool(_))
    ));
    Ok(())
}
