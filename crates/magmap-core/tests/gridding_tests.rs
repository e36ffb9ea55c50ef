//! Gridding, masking, equalization and profile integration tests
//!
//! Enhanced with property-based testing

use magmap_core::profile::line_positions;
use magmap_core::{
    grid_survey, sample_profile, DistanceMask, EqualizationTable, Extent, GridBuilder,
    GridError, GriddingConfig, InterpolationMethod, LineSegment, ProfileOptions, ProfileSource,
    ScatterSample,
};
use proptest::prelude::*;

fn corner_samples() -> Vec<ScatterSample> {
    vec![
        ScatterSample::new(0.0, 0.0, 1.0),
        ScatterSample::new(10.0, 0.0, 2.0),
        ScatterSample::new(0.0, 10.0, 3.0),
        ScatterSample::new(10.0, 10.0, 4.0),
    ]
}

fn brute_force_distance(samples: &[ScatterSample], x: f64, y: f64) -> f64 {
    samples
        .iter()
        .map(|s| s.dist_sq(x, y).sqrt())
        .fold(f64::INFINITY, f64::min)
}

// === Grid Builder ===

#[test]
fn test_four_corner_grid() {
    let grid = GridBuilder::with_cell_size(5.0)
        .build(&corner_samples())
        .unwrap();

    assert_eq!(grid.nx(), 2);
    assert_eq!(grid.ny(), 2);
    assert_eq!((grid.origin_x, grid.origin_y), (0.0, 0.0));
    assert_eq!(grid.extent(), Extent::new(0.0, 10.0, 0.0, 10.0));
}

#[test]
fn test_grid_covers_sample_past_cell_multiple() {
    let samples = vec![
        ScatterSample::new(0.0, 0.0, 1.0),
        ScatterSample::new(2e6 + 0.0005, 1e6, 2.0),
    ];
    let grid = GridBuilder::with_cell_size(1e6).build(&samples).unwrap();

    let bounds = grid.extent();
    for s in &samples {
        assert!(s.x >= bounds.min_x && s.x <= bounds.max_x, "x {} outside {:?}", s.x, bounds);
        assert!(s.y >= bounds.min_y && s.y <= bounds.max_y, "y {} outside {:?}", s.y, bounds);
    }
}

#[test]
fn test_degenerate_extent() {
    let samples = vec![
        ScatterSample::new(3.0, 0.0, 1.0),
        ScatterSample::new(3.0, 10.0, 2.0),
    ];
    let err = GridBuilder::with_cell_size(5.0).build(&samples).unwrap_err();
    assert!(matches!(err, GridError::DegenerateExtent { .. }));
}

#[test]
fn test_unsupported_method_name() {
    let err = "kriging".parse::<InterpolationMethod>().unwrap_err();
    assert!(matches!(err, GridError::UnsupportedMethod { .. }));
}

// === Profile Line ===

#[test]
fn test_linefun_horizontal() {
    let (x, y) = line_positions(0.0, 10.0, 5.0, 5.0, 3, 1e-3);
    assert_eq!(x, vec![0.0, 5.0, 10.0]);
    assert_eq!(y, vec![5.0, 5.0, 5.0]);
}

#[test]
fn test_profile_across_gridded_survey() {
    let mut samples = Vec::new();
    for i in 0..=20 {
        for j in 0..=20 {
            let (x, y) = (i as f64 * 10.0, j as f64 * 10.0);
            samples.push(ScatterSample::new(x, y, 2.0 * x - y));
        }
    }
    let config = GriddingConfig {
        method: InterpolationMethod::Linear,
        ..Default::default()
    }
    .with_cell_size(10.0);
    let gridded = grid_survey(&samples, &config).unwrap();

    let segment = LineSegment::new([0.0, 100.0], [200.0, 100.0], 41).unwrap();
    let profile = sample_profile(
        &segment,
        &[
            ProfileSource::Scattered(&samples),
            ProfileSource::Gridded(&gridded.grid),
        ],
        &ProfileOptions::default(),
    )
    .unwrap();

    let [scattered, gridded] = profile.series.as_slice() else {
        panic!("expected two series");
    };
    assert_eq!(scattered.len(), gridded.len());
    assert!(!scattered.is_empty());
    for (a, b) in scattered.values.iter().zip(&gridded.values) {
        // Both reproduce the plane
        assert!((a - b).abs() < 1e-6, "{} vs {}", a, b);
    }
}

// === Histogram Equalizer ===

#[test]
fn test_equalizer_degenerate_distribution() {
    let table = EqualizationTable::new(&[1.0, 1.0, 1.0, 1.0, 10.0], 1.0, 10.0).unwrap();
    let mapped: Vec<f64> = (0..=18).map(|k| table.map(1.0 + k as f64 * 0.5)).collect();
    assert!(mapped.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(mapped[0], 0.0);
    assert_eq!(mapped[18], 1.0);
}

// === Property-Based Tests ===

fn scattered(n: std::ops::Range<usize>) -> impl Strategy<Value = Vec<ScatterSample>> {
    prop::collection::vec(
        (0.0..1000.0f64, 0.0..1000.0f64, -500.0..500.0f64),
        n,
    )
    .prop_map(|points| points.into_iter().map(ScatterSample::from).collect())
}

proptest! {
    #[test]
    fn test_grid_contains_all_samples(samples in scattered(2..60), cell in 1.0..200.0f64) {
        let extent = Extent::of_samples(&samples).unwrap();
        prop_assume!(extent.width() > 0.0 && extent.height() > 0.0);

        let grid = GridBuilder::with_cell_size(cell).build(&samples).unwrap();
        prop_assert!(grid.nx() >= 1 && grid.ny() >= 1);

        let bounds = grid.extent();
        for s in &samples {
            prop_assert!(s.x >= bounds.min_x && s.x <= bounds.max_x);
            prop_assert!(s.y >= bounds.min_y && s.y <= bounds.max_y);
        }
    }

    #[test]
    fn test_mask_matches_brute_force(
        samples in scattered(1..40),
        dist_max in 1.0..400.0f64,
    ) {
        let extent = Extent::of_samples(&samples).unwrap();
        prop_assume!(extent.width() > 0.0 && extent.height() > 0.0);

        let mut grid = GridBuilder::with_cell_size(50.0).build(&samples).unwrap();
        grid.values.fill(0.0);
        let masked = DistanceMask::new(dist_max).unwrap().apply(&grid, &samples).unwrap();

        for (center, v) in masked.cell_centers().iter().zip(masked.values.iter()) {
            let d = brute_force_distance(&samples, center[0], center[1]);
            prop_assume!((d - dist_max).abs() > 1e-9);
            prop_assert_eq!(v.is_nan(), d > dist_max, "distance {} vs {}", d, dist_max);
        }
    }

    #[test]
    fn test_equalizer_monotonic(
        values in prop::collection::vec(-100.0..100.0f64, 1..200),
        a in -150.0..150.0f64,
        b in -150.0..150.0f64,
    ) {
        let table = EqualizationTable::new(&values, -100.0, 100.0).unwrap();
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(table.map(lo) <= table.map(hi));
        prop_assert!((0.0..=1.0).contains(&table.map(lo)));
    }

    #[test]
    fn test_profile_idempotent(
        interior in scattered(0..30),
        ax in 0.0..1000.0f64,
        ay in 0.0..1000.0f64,
        bx in 0.0..1000.0f64,
        by in 0.0..1000.0f64,
        n in 2usize..80,
    ) {
        let mut samples = vec![
            ScatterSample::new(-1.0, -1.0, 0.0),
            ScatterSample::new(1001.0, -1.0, 10.0),
            ScatterSample::new(-1.0, 1001.0, 20.0),
            ScatterSample::new(1001.0, 1001.0, 30.0),
        ];
        samples.extend(interior);
        prop_assume!((ax - bx).hypot(ay - by) > 1.0);

        let segment = LineSegment::new([ax, ay], [bx, by], n).unwrap();
        let sources = [ProfileSource::Scattered(&samples)];
        let options = ProfileOptions::default();
        let first = sample_profile(&segment, &sources, &options).unwrap();
        let second = sample_profile(&segment, &sources, &options).unwrap();
        prop_assert_eq!(first, second);
    }
}
