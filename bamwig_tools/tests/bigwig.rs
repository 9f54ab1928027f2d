use bamwig_tools::bbi::{bin_max, bin_mean, BigWigParameters, BigWigReader, BigWigWriter};
use bamwig_tools::{BbiError, Error, Genome};
use std::path::Path;

fn genome(seqs: &[(&str, u64)]) -> Genome {
    seqs.iter().map(|&(name, length)| (name.to_string(), length)).collect()
}

fn signal(n: usize, phase: f64) -> Vec<f64> {
    (0..n).map(|i| ((i as f64) * 0.37 + phase).sin() * 5.0).collect()
}

fn write(path: &Path, genome: &Genome, series: &[(&str, Vec<f64>)], bin_size: u32, parameters: BigWigParameters) {
    let mut writer = BigWigWriter::create(path, genome.clone(), parameters).unwrap();
    for (seqname, values) in series {
        writer.write(seqname, values, bin_size).unwrap();
    }
    writer.close().unwrap();
}

fn assert_close(found: &[f64], expected: &[f64]) {
    assert_eq!(found.len(), expected.len());
    for (i, (f, e)) in found.iter().zip(expected).enumerate() {
        if e.is_nan() {
            assert!(f.is_nan(), "bin {}: expected NaN, found {}", i, f);
        } else {
            assert!((f - e).abs() <= 1e-4, "bin {}: expected {}, found {}", i, e, f);
        }
    }
}

#[test]
fn dense_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dense.bw");
    let g = genome(&[("chr1", 10_000), ("chr2", 5_003)]);
    let chr1 = signal(1000, 0.0);
    let chr2 = signal(501, 1.0);
    write(&path, &g, &[("chr1", chr1.clone()), ("chr2", chr2.clone())], 10, BigWigParameters::default());

    let mut reader = BigWigReader::open(&path).unwrap();
    assert_eq!(reader.genome(), &g);
    assert!(reader.header().is_compressed());
    assert_eq!(reader.zoom_levels(), vec![40]);
    assert_close(&reader.query_sequence("chr1", bin_mean, 10, 0, f64::NAN).unwrap(), &chr1);
    assert_close(&reader.query_sequence("chr2", bin_mean, 10, 0, f64::NAN).unwrap(), &chr2);

    let summary = *reader.summary().unwrap();
    assert_eq!(summary.valid, 15_003.0);
    let max = chr1.iter().chain(&chr2).copied().fold(f64::MIN, f64::max);
    assert!((summary.max - max).abs() < 1e-4);
}

#[test]
fn sparse_round_trip_keeps_missing_values() {
    let dir = tempfile::tempdir().unwrap();
    let g = genome(&[("chr1", 2_000)]);
    let mut values = signal(200, 0.5);
    for (i, v) in values.iter_mut().enumerate() {
        if i % 3 == 0 || (50..80).contains(&i) {
            *v = f64::NAN;
        }
    }
    for (name, fixed_step, compress) in [("a.bw", true, true), ("b.bw", false, false)] {
        let path = dir.path().join(name);
        let parameters = BigWigParameters {
            fixed_step,
            compress,
            items_per_slot: 16,
            ..Default::default()
        };
        write(&path, &g, &[("chr1", values.clone())], 10, parameters);
        let mut reader = BigWigReader::open(&path).unwrap();
        assert_eq!(reader.header().is_compressed(), compress);
        let found = reader.query_sequence("chr1", bin_mean, 10, 0, f64::NAN).unwrap();
        assert_close(&found, &values);
    }
}

#[test]
fn overlap_window_with_max() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("overlap.bw");
    let g = genome(&[("chr1", 1_000)]);
    let values = signal(100, 0.0);
    write(&path, &g, &[("chr1", values.clone())], 10, BigWigParameters::default());

    let overlap = 2;
    let expected: Vec<f64> = (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(overlap);
            let hi = (i + overlap).min(values.len() - 1);
            values[lo..=hi].iter().map(|&v| f64::from(v as f32)).fold(f64::MIN, f64::max)
        })
        .collect();

    let mut reader = BigWigReader::open(&path).unwrap();
    let found = reader.query_sequence("chr1", bin_max, 10, overlap as u32, f64::NAN).unwrap();
    assert_close(&found, &expected);
}

#[test]
fn coarse_bins_come_from_zoom_level() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zoom.bw");
    let g = genome(&[("chr1", 10_000)]);
    let values = signal(1000, 0.2);
    write(&path, &g, &[("chr1", values.clone())], 10, BigWigParameters::default());

    let mut reader = BigWigReader::open(&path).unwrap();
    assert!(reader.query("chr1", 0, 10_000, 40).unwrap().is_zoomed());
    assert!(!reader.query("chr1", 0, 10_000, 30).unwrap().is_zoomed());

    let expected: Vec<f64> = values.chunks(4).map(|c| c.iter().sum::<f64>() / 4.0).collect();
    let found = reader.query_slice("chr1", 0, 10_000, bin_mean, 40, 0, f64::NAN).unwrap();
    assert_close(&found, &expected);

    // Same answer from the raw data.
    let raw = reader.query_slice("chr1", 0, 10_000, bin_mean, 20, 0, f64::NAN).unwrap();
    let pairs: Vec<f64> = raw.chunks(2).map(|c| (c[0] + c[1]) / 2.0).collect();
    assert_close(&pairs, &expected);
}

#[test]
fn query_outside_all_blocks_visits_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sparse.bw");
    let g = genome(&[("chr1", 10_000), ("chr2", 10_000)]);
    write(&path, &g, &[("chr1", signal(100, 0.0))], 10, BigWigParameters::default());

    let mut reader = BigWigReader::open(&path).unwrap();
    let mut query = reader.query("chr1", 5_000, 6_000, 0).unwrap();
    assert!(query.next().is_none());
    assert_eq!(query.blocks_visited(), 0);

    let mut query = reader.query("chr2", 0, 10_000, 0).unwrap();
    assert!(query.next().is_none());
    assert_eq!(query.blocks_visited(), 0);

    let empty = reader.query_slice("chr2", 0, 100, bin_mean, 10, 0, -1.0).unwrap();
    assert_eq!(empty, vec![-1.0; 10]);
}

#[test]
fn query_across_adjacent_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocks.bw");
    let g = genome(&[("chr1", 10_000)]);
    let parameters = BigWigParameters {
        items_per_slot: 10,
        ..Default::default()
    };
    let values = signal(20, 0.0);
    write(&path, &g, &[("chr1", values.clone())], 10, parameters);

    let mut reader = BigWigReader::open(&path).unwrap();
    assert_eq!(reader.index().item_count, 2);
    let mut query = reader.query("chr1", 95, 105, 0).unwrap();
    let records: Vec<_> = query.by_ref().collect::<Result<_, _>>().unwrap();
    assert_eq!(query.blocks_visited(), 2);
    let spans: Vec<_> = records.iter().map(|r| (r.from, r.to)).collect();
    assert_eq!(spans, vec![(90, 100), (100, 110)]);
    assert!((records[1].statistics.mean() - values[10]).abs() < 1e-4);
}

#[test]
fn bin_size_is_inferred_from_data() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("infer.bw");
    let g = genome(&[("chr1", 500)]);
    let values = signal(50, 0.0);
    write(&path, &g, &[("chr1", values.clone())], 10, BigWigParameters::default());

    let mut reader = BigWigReader::open(&path).unwrap();
    let found = reader.query_slice("chr1", 100, 200, bin_mean, 0, 0, f64::NAN).unwrap();
    assert_close(&found, &values[10..20]);
}

#[test]
fn genome_follows_chromosome_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("order.bw");
    let names: Vec<(String, u64)> = (0..40).map(|i| (format!("seq{}", 39 - i), 100 + i)).collect();
    let g: Genome = names.into_iter().collect();
    let parameters = BigWigParameters {
        block_size: 4,
        ..Default::default()
    };
    write(&path, &g, &[("seq0", vec![1.0; 14])], 10, parameters);

    let reader = BigWigReader::open(&path).unwrap();
    assert_eq!(reader.genome(), &g);
    assert_eq!(reader.genome().seqname(0), Some("seq39"));
}

#[test]
fn bounds_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bounds.bw");
    let g = genome(&[("chr1", 100)]);
    write(&path, &g, &[("chr1", vec![2.0; 10])], 10, BigWigParameters::default());

    let mut reader = BigWigReader::open(&path).unwrap();
    let err = reader
        .query_slice("chr1", 50, 150, bin_mean, 10, 0, f64::NAN)
        .unwrap_err();
    match err {
        Error::File { source, .. } => assert!(matches!(*source, Error::Bbi(BbiError::QueryOutOfBounds { .. }))),
        other => panic!("unexpected error {:?}", other),
    }
    let clamped = reader
        .query_slice_clamped("chr1", 50, 150, bin_mean, 10, 0, f64::NAN)
        .unwrap();
    assert_eq!(clamped, vec![2.0; 5]);
    assert!(reader.query("chrX", 0, 10, 0).is_err());
}

#[test]
fn corrupt_file_names_the_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("garbage.bw");
    std::fs::write(&path, vec![0u8; 128]).unwrap();
    let err = BigWigReader::open(&path).err().unwrap();
    assert!(err.to_string().contains("garbage.bw"));
    match err {
        Error::File { source, .. } => assert!(matches!(*source, Error::Bbi(BbiError::InvalidMagic { .. }))),
        other => panic!("unexpected error {:?}", other),
    }
}
