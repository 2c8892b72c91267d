use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use subpixel::{
    Algorithm, BBox2i, Disparity, DisparityMap, Image, MergePolicy, NullFilter, SubpixelConfig,
    SubpixelError, SubpixelView, SubtractedMean,
};

/// Pixels closer than this to the image border see zero padding in only one
/// of the two crops and are not checked for accuracy.
const BORDER: usize = 24;

fn texture(x: f32, y: f32) -> f32 {
    100.0 + 40.0 * (0.35 * x).sin() + 30.0 * (0.27 * y).cos() + 20.0 * (0.19 * (x + y)).sin()
}

/// Stereo pair where left pixel `p` matches right pixel `p + (dx, dy)`.
fn stereo_pair(width: usize, height: usize, dx: f32, dy: f32) -> (Image<f32>, Image<f32>) {
    let left = Image::from_fn(width, height, |x, y| texture(x as f32, y as f32));
    let right = Image::from_fn(width, height, |x, y| texture(x as f32 - dx, y as f32 - dy));
    (left, right)
}

fn config(algorithm: Algorithm) -> SubpixelConfig {
    SubpixelConfig {
        algorithm,
        ..SubpixelConfig::default()
    }
}

fn assert_interior_close(map: &DisparityMap, dx: f32, dy: f32, tolerance: f32) {
    let (width, height) = map.dims();
    for y in BORDER..height - BORDER {
        for x in BORDER..width - BORDER {
            let d = map.get(x, y).unwrap();
            assert!(d.valid, "invalid at ({x}, {y})");
            assert!(
                (d.dx - dx).abs() < tolerance && (d.dy - dy).abs() < tolerance,
                "({}, {}) at ({x}, {y}), expected ({dx}, {dy})",
                d.dx,
                d.dy
            );
        }
    }
}

#[test]
fn parabola_recovers_constant_integer_shift() {
    let (left, right) = stereo_pair(96, 96, 3.0, 1.0);
    let seed = DisparityMap::filled(96, 96, Disparity::new(3.0, 1.0));
    let view = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        config(Algorithm::Parabola),
        NullFilter,
    )
    .unwrap();

    let out = view.rasterize_tiled(32, 32).unwrap();
    assert_eq!(out.dims(), (96, 96));
    assert_interior_close(&out, 3.0, 1.0, 0.15);
}

#[test]
fn affine_em_recovers_constant_integer_shift() {
    let (left, right) = stereo_pair(96, 96, 3.0, 1.0);
    let seed = DisparityMap::filled(96, 96, Disparity::new(3.0, 1.0));
    let view = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        config(Algorithm::AffineEm),
        NullFilter,
    )
    .unwrap();

    let out = view.rasterize_tiled(32, 32).unwrap();
    assert_interior_close(&out, 3.0, 1.0, 0.05);
}

#[test]
fn refinement_moves_integer_seed_towards_fractional_shift() {
    let (left, right) = stereo_pair(96, 96, 2.3, 0.0);
    let seed = DisparityMap::filled(96, 96, Disparity::new(2.0, 0.0));
    for (algorithm, tolerance) in [(Algorithm::Parabola, 0.15), (Algorithm::AffineEm, 0.1)] {
        let view = SubpixelView::new(
            seed.view(),
            left.view(),
            right.view(),
            config(algorithm),
            NullFilter,
        )
        .unwrap();
        let out = view.compute(BBox2i::new(32, 32, 32, 32)).unwrap();
        for d in out.data() {
            assert!(d.valid);
            assert!((d.dx - 2.3).abs() < tolerance, "{algorithm:?} dx {}", d.dx);
            assert!(d.dy.abs() < tolerance, "{algorithm:?} dy {}", d.dy);
        }
    }
}

#[test]
fn tile_dimensions_match_request() {
    let (left, right) = stereo_pair(40, 32, 1.0, 0.0);
    let seed = DisparityMap::filled(40, 32, Disparity::new(1.0, 0.0));
    let boxes = [
        BBox2i::new(0, 0, 40, 32),
        BBox2i::new(5, 7, 1, 1),
        BBox2i::new(-6, 20, 13, 20),
        BBox2i::new(35, -3, 9, 4),
    ];
    let kernels = [(1, 1), (3, 5), (8, 4), (7, 7)];

    for algorithm in [Algorithm::PassThrough, Algorithm::Parabola, Algorithm::AffineEm] {
        for (kernel_width, kernel_height) in kernels {
            let config = SubpixelConfig {
                kernel_width,
                kernel_height,
                ..config(algorithm)
            };
            let view =
                SubpixelView::new(seed.view(), left.view(), right.view(), config, NullFilter)
                    .unwrap();
            for bbox in boxes {
                let tile = view.compute(bbox).unwrap();
                assert_eq!(tile.dims(), bbox.dims(), "{algorithm:?} {kernel_width}x{kernel_height}");
            }
        }
    }
}

#[test]
fn pass_through_returns_seed_unchanged() {
    let mut rng = StdRng::seed_from_u64(7);
    let (left, right) = stereo_pair(48, 40, 0.0, 0.0);
    let seed = DisparityMap::from_fn(48, 40, |_, _| {
        if rng.random_bool(0.8) {
            Disparity::new(rng.random_range(-6.0..6.0), rng.random_range(-2.0..2.0))
        } else {
            Disparity::invalid()
        }
    });
    let view = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        config(Algorithm::PassThrough),
        SubtractedMean::new(2.0),
    )
    .unwrap();

    for _ in 0..20 {
        let x = rng.random_range(-8..44);
        let y = rng.random_range(-8..36);
        let bbox = BBox2i::new(x, y, rng.random_range(1..16), rng.random_range(1..16));
        let tile = view.prepare(bbox).unwrap();
        for ty in bbox.min_y..bbox.max_y {
            for tx in bbox.min_x..bbox.max_x {
                let got = tile.get(tx, ty).unwrap();
                let expected = if tx >= 0 && ty >= 0 {
                    seed.get(tx as usize, ty as usize).copied()
                } else {
                    None
                };
                match expected {
                    Some(expected) => assert_eq!(*got, expected),
                    None => assert!(!got.valid),
                }
            }
        }
    }
}

#[test]
fn unknown_selector_is_a_configuration_error() {
    for selector in [3, -1, 42] {
        assert_eq!(
            Algorithm::try_from(selector),
            Err(SubpixelError::UnsupportedAlgorithm { selector })
        );
    }
    assert_eq!(Algorithm::try_from(2), Ok(Algorithm::AffineEm));
}

#[test]
fn mismatched_inputs_fail_at_construction() {
    let left = Image::filled(20, 20, 1.0f32);
    let right = Image::filled(20, 21, 1.0f32);
    let seed = DisparityMap::new(20, 20);
    let err = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        SubpixelConfig::default(),
        NullFilter,
    )
    .unwrap_err();
    assert!(matches!(err, SubpixelError::DimensionMismatch { .. }));

    let small_seed = DisparityMap::new(19, 20);
    let err = SubpixelView::new(
        small_seed.view(),
        left.view(),
        left.view(),
        SubpixelConfig::default(),
        NullFilter,
    )
    .unwrap_err();
    assert_eq!(
        err,
        SubpixelError::DimensionMismatch {
            what: "seed disparity",
            expected: (20, 20),
            got: (19, 20),
        }
    );
}

#[test]
fn overlapping_tiles_agree() {
    let (left, right) = stereo_pair(96, 96, 2.3, 0.0);
    let seed = DisparityMap::filled(96, 96, Disparity::new(2.0, 0.0));
    let first = BBox2i::new(24, 24, 28, 28);
    let second = BBox2i::new(36, 30, 28, 28);
    let overlap = first.intersect(&second);
    assert!(!overlap.is_empty());

    for (algorithm, tolerance) in [(Algorithm::Parabola, 0.05), (Algorithm::AffineEm, 0.02)] {
        let view = SubpixelView::new(
            seed.view(),
            left.view(),
            right.view(),
            config(algorithm),
            NullFilter,
        )
        .unwrap();
        let a = view.prepare(first).unwrap();
        let b = view.prepare(second).unwrap();
        for y in overlap.min_y..overlap.max_y {
            for x in overlap.min_x..overlap.max_x {
                let (da, db) = (a.get(x, y).unwrap(), b.get(x, y).unwrap());
                assert_eq!(da.valid, db.valid, "{algorithm:?} at ({x}, {y})");
                assert!((da.dx - db.dx).abs() < tolerance, "{algorithm:?} at ({x}, {y})");
                assert!((da.dy - db.dy).abs() < tolerance, "{algorithm:?} at ({x}, {y})");
            }
        }
    }
}

#[test]
fn invalid_seed_tile_still_produces_output() {
    let (left, right) = stereo_pair(48, 48, 1.0, 0.0);
    let seed = DisparityMap::new(48, 48);
    for algorithm in [Algorithm::Parabola, Algorithm::AffineEm] {
        let view = SubpixelView::new(
            seed.view(),
            left.view(),
            right.view(),
            config(algorithm),
            NullFilter,
        )
        .unwrap();
        let bbox = BBox2i::new(8, 8, 20, 12);
        let tile = view.compute(bbox).unwrap();
        assert_eq!(tile.dims(), (20, 12));
        assert!(tile.data().iter().all(|d| !d.valid));
    }
}

#[test]
fn pyramid_fills_holes_in_sparse_seed() {
    let (left, right) = stereo_pair(96, 96, 2.0, 0.0);
    let seed = DisparityMap::from_fn(96, 96, |x, y| {
        if (x / 3 + y / 3) % 2 == 0 {
            Disparity::new(2.0, 0.0)
        } else {
            Disparity::invalid()
        }
    });
    let view = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        config(Algorithm::Parabola),
        NullFilter,
    )
    .unwrap();
    let out = view.compute(BBox2i::new(32, 32, 32, 32)).unwrap();
    for d in out.data() {
        assert!(d.valid);
        assert!((d.dx - 2.0).abs() < 0.15);
    }
}

#[test]
fn rasterize_tiled_matches_single_tile_requests() {
    let (left, right) = stereo_pair(40, 36, 1.0, 0.0);
    let seed = DisparityMap::filled(40, 36, Disparity::new(1.0, 0.0));
    let config = SubpixelConfig {
        merge_policy: MergePolicy::PreferSeed,
        ..config(Algorithm::Parabola)
    };
    let view =
        SubpixelView::new(seed.view(), left.view(), right.view(), config, NullFilter).unwrap();

    let full = view.rasterize_tiled(16, 16).unwrap();
    for bbox in view.bbox().tiles(16, 16) {
        let tile = view.prepare(bbox).unwrap();
        for y in bbox.min_y..bbox.max_y {
            for x in bbox.min_x..bbox.max_x {
                assert_eq!(full.get(x as usize, y as usize), tile.get(x, y));
            }
        }
    }
}

#[test]
fn outlier_seed_degrades_locally() {
    let (left, right) = stereo_pair(96, 96, 0.0, 0.0);
    let mut seed = DisparityMap::filled(96, 96, Disparity::new(0.0, 0.0));
    *seed.get_mut(44, 44).unwrap() = Disparity::new(3.0e9, 0.0);
    let tile = BBox2i::new(40, 40, 16, 16);

    let view = SubpixelView::new(
        seed.view(),
        left.view(),
        right.view(),
        config(Algorithm::PassThrough),
        NullFilter,
    )
    .unwrap();
    let out = view.compute(tile).unwrap();
    assert_eq!(*out.get(4, 4).unwrap(), Disparity::new(3.0e9, 0.0));

    for algorithm in [Algorithm::Parabola, Algorithm::AffineEm] {
        let view = SubpixelView::new(
            seed.view(),
            left.view(),
            right.view(),
            config(algorithm),
            NullFilter,
        )
        .unwrap();
        let out = view.compute(tile).unwrap();
        assert_eq!(out.dims(), (16, 16));
        for (x, y) in [(0, 0), (15, 0), (0, 15), (15, 15)] {
            let d = out.get(x, y).unwrap();
            assert!(d.valid, "{algorithm:?} invalid at ({x}, {y})");
            assert!(d.dx.abs() < 0.25 && d.dy.abs() < 0.25, "{algorithm:?} ({}, {})", d.dx, d.dy);
        }
    }
}
