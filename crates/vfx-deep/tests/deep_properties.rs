//! Behavioral tests for deep storage and depth algorithms.

use approx::assert_abs_diff_eq;
use half::f16;
use vfx_core::TypeDesc;
use vfx_deep::{DeepConfig, DeepData, DeepError};

/// Small deterministic generator so failures reproduce.
struct Lcg(u64);

impl Lcg {
    fn next_f32(&mut self) -> f32 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 40) as f32 / (1u64 << 24) as f32
    }

    fn below(&mut self, n: usize) -> usize {
        ((self.next_f32() * n as f32) as usize).min(n.saturating_sub(1))
    }
}

const R: usize = 0;
const G: usize = 1;
const B: usize = 2;
const A: usize = 3;
const Z: usize = 4;
const ZB: usize = 5;
const ID: usize = 6;
const ID_OFFSET: usize = 4 * 2 + 2 * 4;

fn mixed_store(npix: usize) -> DeepData {
    let types = [
        TypeDesc::HALF,
        TypeDesc::HALF,
        TypeDesc::HALF,
        TypeDesc::HALF,
        TypeDesc::FLOAT,
        TypeDesc::FLOAT,
        TypeDesc::UINT,
    ];
    DeepData::new(npix, &types, &["R", "G", "B", "A", "Z", "Zback", "id"]).unwrap()
}

fn float_store(npix: usize) -> DeepData {
    DeepData::new(npix, &[TypeDesc::FLOAT], &["R", "G", "B", "A", "Z", "Zback"]).unwrap()
}

fn push(dd: &mut DeepData, p: usize, rgb: f32, a: f32, z: f32, zb: f32) -> usize {
    let s = dd.samples(p).unwrap();
    dd.insert_samples(p, s, 1).unwrap();
    for c in [R, G, B] {
        dd.set_deep_value(p, c, s, rgb).unwrap();
    }
    dd.set_deep_value(p, A, s, a).unwrap();
    dd.set_deep_value(p, Z, s, z).unwrap();
    dd.set_deep_value(p, ZB, s, zb).unwrap();
    s
}

fn fill_random(dd: &mut DeepData, p: usize, n: usize, rng: &mut Lcg) {
    for _ in 0..n {
        let a = rng.next_f32();
        let z = rng.next_f32() * 10.0;
        let len = rng.next_f32() * 3.0;
        push(dd, p, a * rng.next_f32(), a, z, z + len);
    }
}

// ============================================================================
// Storage
// ============================================================================

#[test]
fn test_value_roundtrip_per_type() {
    let mut dd = mixed_store(3);
    dd.set_all_samples(&[2, 0, 1]).unwrap();

    dd.set_deep_value(0, R, 1, 0.1).unwrap();
    dd.set_deep_value(0, Z, 1, 0.1).unwrap();
    dd.set_deep_value_uint(0, ID, 1, 0xfeed_beef).unwrap();
    dd.set_deep_value_uint(2, ID, 0, 7).unwrap();

    assert_eq!(dd.deep_value(0, R, 1).unwrap(), f16::from_f32(0.1).to_f32());
    assert_eq!(dd.deep_value(0, Z, 1).unwrap(), 0.1);
    assert_eq!(dd.deep_value_uint(0, ID, 1).unwrap(), 0xfeed_beef);
    assert_eq!(dd.deep_value(2, ID, 0).unwrap().to_bits(), 7);
    assert_eq!(dd.deep_value(0, A, 0).unwrap(), 0.0);
    assert_eq!(dd.samplesize(), 4 * 2 + 3 * 4);
}

#[test]
fn test_integer_channels_keep_bits() {
    let mut dd = mixed_store(1);
    dd.set_samples(0, 4).unwrap();
    let id = (1u32 << 24) + 1;

    dd.set_deep_value_uint(0, ID, 0, id).unwrap();
    assert_eq!(dd.deep_value_uint(0, ID, 0).unwrap(), id);
    assert_eq!(dd.deep_value(0, ID, 0).unwrap().to_bits(), id);

    dd.set_deep_value(0, ID, 1, f32::from_bits(id)).unwrap();
    assert_eq!(dd.deep_value_uint(0, ID, 1).unwrap(), id);
    assert_eq!(dd.deep_value(0, ID, 1).unwrap().to_bits(), id);

    dd.set_deep_value(0, ID, 2, 0.5).unwrap();
    assert_eq!(dd.deep_value(0, ID, 2).unwrap(), 0.5);
    assert_eq!(dd.deep_value_uint(0, ID, 2).unwrap(), 0.5f32.to_bits());

    let at = ID_OFFSET;
    let raw = dd.data_ptr(0, ID, 0).unwrap().unwrap();
    assert_eq!(raw, id.to_ne_bytes().as_slice());
    assert_eq!(dd.pixel_data(0).unwrap()[at..at + 4], id.to_ne_bytes());
}

#[test]
fn test_bounds_are_checked() {
    let mut dd = mixed_store(4);
    assert!(matches!(dd.samples(4), Err(DeepError::PixelOutOfRange { pixel: 4, pixels: 4 })));
    assert!(dd.deep_value(4, 0, 0).unwrap_err().is_out_of_range());
    assert!(dd.deep_value(0, 0, 0).unwrap_err().is_out_of_range());
    dd.set_samples(0, 1).unwrap();
    assert!(dd.deep_value(0, 7, 0).unwrap_err().is_out_of_range());
    assert!(dd.set_deep_value_uint(0, ID, 1, 1).is_err());
    assert!(dd.capacity(4).is_err());
    assert!(dd.insert_samples(4, 0, 1).is_err());
}

#[test]
fn test_insert_then_erase_is_identity() {
    let mut rng = Lcg(7);
    let mut dd = float_store(8);
    for p in 0..8 {
        let n = rng.below(6);
        fill_random(&mut dd, p, n, &mut rng);
    }

    for p in 0..8 {
        let before = dd.all_data().into_owned();
        let n = dd.samples(p).unwrap();
        let pos = rng.below(n + 1);
        let k = 1 + rng.below(5);
        dd.insert_samples(p, pos, k).unwrap();
        for s in pos..pos + k {
            assert_eq!(dd.deep_value(p, Z, s).unwrap(), 0.0);
        }
        dd.erase_samples(p, pos, k).unwrap();
        assert_eq!(dd.samples(p).unwrap(), n);
        assert_eq!(dd.all_data().as_ref(), before.as_slice());
    }
}

#[test]
fn test_capacity_never_shrinks_implicitly() {
    let mut dd = float_store(2);
    let mut last = 0;
    for step in 0..40usize {
        let n = dd.samples(0).unwrap();
        if step % 3 == 2 {
            dd.erase_samples(0, 0, n.min(2)).unwrap();
        } else {
            dd.insert_samples(0, n / 2, 3).unwrap();
        }
        dd.set_deep_value(0, Z, 0, step as f32).ok();
        let cap = dd.capacity(0).unwrap();
        assert!(cap >= last);
        assert!(cap >= dd.samples(0).unwrap());
        last = cap;
    }

    dd.set_capacity(0, 1).unwrap();
    assert_eq!(dd.capacity(0).unwrap(), 1);
    assert_eq!(dd.samples(0).unwrap(), 1);
}

#[test]
fn test_growth_leaves_other_pixels_alone() {
    let mut dd = mixed_store(16);
    dd.set_all_samples(&[2; 16]).unwrap();
    for p in 0..16 {
        for s in 0..2 {
            dd.set_deep_value_uint(p, ID, s, (p * 10 + s) as u32).unwrap();
        }
    }
    let snapshot: Vec<Vec<u8>> = (0..16).map(|p| dd.pixel_data(p).unwrap().to_vec()).collect();

    dd.insert_samples(5, 1, 100).unwrap();
    dd.set_samples(9, 50).unwrap();

    for p in (0..16).filter(|&p| p != 5 && p != 9) {
        assert_eq!(dd.pixel_data(p).unwrap(), snapshot[p].as_slice());
    }
    assert_eq!(dd.deep_value_uint(5, ID, 0).unwrap(), 50);
    assert_eq!(dd.deep_value_uint(5, ID, 101).unwrap(), 51);
    assert_eq!(dd.deep_value_uint(9, ID, 1).unwrap(), 91);
    assert_eq!(dd.deep_value_uint(9, ID, 2).unwrap(), 0);

    dd.compact().unwrap();
    for p in (0..16).filter(|&p| p != 5 && p != 9) {
        assert_eq!(dd.pixel_data(p).unwrap(), snapshot[p].as_slice());
    }
}

#[test]
fn test_recount_allocated_store() {
    let mut dd = mixed_store(3);
    dd.set_all_samples(&[1, 2, 1]).unwrap();
    for p in 0..3 {
        for s in 0..dd.samples(p).unwrap() {
            dd.set_deep_value(p, Z, s, (p * 10 + s) as f32 + 1.0).unwrap();
            dd.set_deep_value_uint(p, ID, s, 100 + p as u32).unwrap();
        }
    }
    assert!(dd.allocated());

    dd.set_all_samples(&[3, 0, 2]).unwrap();
    assert_eq!(dd.all_samples(), &[3, 0, 2]);
    for p in 0..3 {
        assert!(dd.capacity(p).unwrap() >= dd.samples(p).unwrap());
    }
    assert_eq!(dd.capacity(1).unwrap(), 2);

    assert_eq!(dd.deep_value(0, Z, 0).unwrap(), 1.0);
    assert_eq!(dd.deep_value_uint(0, ID, 0).unwrap(), 100);
    assert_eq!(dd.deep_value(2, Z, 0).unwrap(), 21.0);
    assert_eq!(dd.deep_value_uint(2, ID, 0).unwrap(), 102);
    for (p, s) in [(0, 1), (0, 2), (2, 1)] {
        assert_eq!(dd.deep_value(p, Z, s).unwrap(), 0.0);
        assert_eq!(dd.deep_value_uint(p, ID, s).unwrap(), 0);
        assert_eq!(dd.deep_value(p, A, s).unwrap(), 0.0);
    }

    // Shrunk pixel keeps its capacity; regrowing shows zeros, not stale data.
    dd.set_all_samples(&[3, 2, 2]).unwrap();
    assert_eq!(dd.deep_value(1, Z, 0).unwrap(), 0.0);
    assert_eq!(dd.deep_value(1, Z, 1).unwrap(), 0.0);
    assert_eq!(dd.deep_value(0, Z, 0).unwrap(), 1.0);
    assert_eq!(dd.deep_value(2, Z, 0).unwrap(), 21.0);
}

#[test]
fn test_bulk_data_transfer() {
    let mut rng = Lcg(99);
    let mut src = float_store(6);
    for p in 0..6 {
        let n = rng.below(4);
        fill_random(&mut src, p, n, &mut rng);
    }

    let mut dst = float_store(6);
    dst.set_all_samples(src.all_samples()).unwrap();
    dst.set_all_data(&src.all_data()).unwrap();
    for p in 0..6 {
        assert_eq!(dst.pixel_data(p).unwrap(), src.pixel_data(p).unwrap());
    }

    assert!(matches!(
        dst.set_all_data(&[0u8; 3]),
        Err(DeepError::SizeMismatch { actual: 3, .. })
    ));
}

#[test]
fn test_copy_pixel_and_sample() {
    let mut src = mixed_store(2);
    push(&mut src, 1, 0.5, 0.5, 1.0, 2.0);
    push(&mut src, 1, 0.25, 0.25, 3.0, 4.0);
    src.set_deep_value_uint(1, ID, 1, 42).unwrap();

    let mut dst = mixed_store(3);
    dst.copy_deep_pixel(2, &src, 1).unwrap();
    assert_eq!(dst.pixel_data(2).unwrap(), src.pixel_data(1).unwrap());

    dst.set_samples(0, 1).unwrap();
    dst.copy_deep_sample(0, 0, &src, 1, 1).unwrap();
    assert_eq!(dst.deep_value_uint(0, ID, 0).unwrap(), 42);
    assert!(dst.copy_deep_sample(0, 1, &src, 1, 1).is_err());
    assert!(dst.copy_deep_sample(0, 0, &src, 0, 0).is_err());
}

// ============================================================================
// Depth algorithms
// ============================================================================

fn over_all(dd: &DeepData, p: usize) -> (f32, f32) {
    let out = dd.composite_pixel(p).unwrap();
    (out[R], out[A])
}

#[test]
fn test_split_conservation() {
    let mut rng = Lcg(3);
    for _ in 0..50 {
        let mut dd = float_store(1);
        let a = rng.next_f32().min(0.999);
        let c = a * rng.next_f32();
        let z = rng.next_f32() * 5.0;
        let zb = z + 0.1 + rng.next_f32() * 5.0;
        push(&mut dd, 0, c, a, z, zb);

        let zsplit = z + (zb - z) * (0.05 + 0.9 * rng.next_f32());
        assert!(dd.split(0, zsplit).unwrap());
        assert_eq!(dd.samples(0).unwrap(), 2);
        let (rc, ra) = over_all(&dd, 0);
        assert_abs_diff_eq!(ra, a, epsilon = 1e-5);
        assert_abs_diff_eq!(rc, c, epsilon = 1e-5);
        assert!(!dd.split(0, zsplit).unwrap());
    }
}

#[test]
fn test_split_keeps_unweighted_channels() {
    let mut dd = mixed_store(1);
    let s = push(&mut dd, 0, 0.2, 0.4, 0.0, 2.0);
    dd.set_deep_value_uint(0, ID, s, 1234).unwrap();

    assert!(dd.split(0, 1.0).unwrap());
    assert_eq!(dd.deep_value_uint(0, ID, 0).unwrap(), 1234);
    assert_eq!(dd.deep_value_uint(0, ID, 1).unwrap(), 1234);
}

#[test]
fn test_merge_over_of_identical_ranges() {
    let mut dst = float_store(1);
    push(&mut dst, 0, 0.0, 0.5, 0.0, 5.0);
    push(&mut dst, 0, 0.0, 0.0, 5.0, 5.0);
    let mut src = float_store(1);
    push(&mut src, 0, 0.0, 0.3, 0.0, 5.0);

    dst.merge_deep_pixels(0, &src, 0).unwrap();
    dst.merge_overlaps(0).unwrap();

    let spans: Vec<usize> = (0..dst.samples(0).unwrap())
        .filter(|&s| dst.deep_value(0, Z, s).unwrap() == 0.0 && dst.deep_value(0, ZB, s).unwrap() == 5.0)
        .collect();
    assert_eq!(spans.len(), 1);
    assert_abs_diff_eq!(dst.deep_value(0, A, spans[0]).unwrap(), 0.65, epsilon = 1e-6);
}

#[test]
fn test_merge_preserves_composite_of_disjoint_layers() {
    let mut a = float_store(1);
    push(&mut a, 0, 0.1, 0.3, 0.0, 1.0);
    let mut b = float_store(1);
    push(&mut b, 0, 0.2, 0.6, 2.0, 3.0);

    let expect_a = 0.3 + 0.7 * 0.6;
    a.merge_deep_pixels(0, &b, 0).unwrap();
    assert_eq!(a.samples(0).unwrap(), 2);
    let (_, alpha) = over_all(&a, 0);
    assert_abs_diff_eq!(alpha, expect_a, epsilon = 1e-6);
}

#[test]
fn test_tidy_result_is_disjoint_and_sorted() {
    let mut rng = Lcg(11);
    let mut dd = float_store(1);
    fill_random(&mut dd, 0, 12, &mut rng);
    dd.tidy(0).unwrap();

    let n = dd.samples(0).unwrap();
    let spans: Vec<(f32, f32)> = (0..n)
        .map(|s| (dd.deep_value(0, Z, s).unwrap(), dd.deep_value(0, ZB, s).unwrap()))
        .collect();
    for w in spans.windows(2) {
        assert!(w[0].0 <= w[1].0);
        assert!(w[0] != w[1]);
        assert!(w[0].1 <= w[1].0 || w[0].0 == w[1].0);
    }
}

#[test]
fn test_occlusion_cull_is_invisible() {
    let mut rng = Lcg(5);
    let mut dd = float_store(32);
    for p in 0..32 {
        let n = rng.below(10);
        fill_random(&mut dd, p, n, &mut rng);
        if p % 2 == 0 {
            push(&mut dd, p, 0.5, 1.0, rng.next_f32() * 5.0, 6.0);
        }
    }

    let mut removed = 0;
    for p in 0..32 {
        let before = dd.composite_pixel(p).unwrap();
        removed += dd.occlusion_cull(p).unwrap();
        let after = dd.composite_pixel(p).unwrap();
        for c in [R, G, B, A] {
            assert_abs_diff_eq!(before[c], after[c], epsilon = 1e-5);
        }
    }
    assert!(removed > 0);
}

#[test]
fn test_opaque_z_never_opaque_scenario() {
    let mut dd = DeepData::new(4, &[TypeDesc::FLOAT], &["A", "Z", "Zback"]).unwrap();
    dd.set_samples(1, 3).unwrap();
    for (s, a) in [0.2f32, 0.3, 0.4].into_iter().enumerate() {
        let z = s as f32 + 1.0;
        dd.set_deep_value(1, 0, s, a).unwrap();
        dd.set_deep_value(1, 1, s, z).unwrap();
        dd.set_deep_value(1, 2, s, z + 1.0).unwrap();
    }

    assert_eq!(dd.samples(0).unwrap(), 0);
    assert_eq!(dd.opaque_z_with_threshold(1, 0.99).unwrap(), f32::INFINITY);
    assert_eq!(dd.opaque_z(0).unwrap(), f32::INFINITY);
    assert_eq!(dd.occlusion_cull(1).unwrap(), 0);
    assert_eq!(dd.samples(1).unwrap(), 3);
}

#[test]
fn test_configured_threshold() {
    let config = DeepConfig {
        opacity_threshold: 0.5,
        ..DeepConfig::default()
    };
    let mut dd = DeepData::with_config(1, &[TypeDesc::FLOAT], &["R", "G", "B", "A", "Z", "Zback"], config).unwrap();
    push(&mut dd, 0, 0.1, 0.6, 1.0, 2.0);
    push(&mut dd, 0, 0.1, 0.6, 3.0, 4.0);
    assert_eq!(dd.opaque_z(0).unwrap(), 2.0);
    assert_eq!(dd.occlusion_cull(0).unwrap(), 1);
}

#[test]
fn test_no_depth_channels_is_noop() {
    let mut dd = DeepData::new(1, &[TypeDesc::FLOAT], &["R", "A"]).unwrap();
    dd.set_samples(0, 2).unwrap();
    dd.set_deep_value(0, 1, 0, 0.5).unwrap();
    assert!(!dd.split(0, 1.0).unwrap());
    dd.sort(0).unwrap();
    assert_eq!(dd.merge_overlaps(0).unwrap(), 0);
    assert_eq!(dd.occlusion_cull(0).unwrap(), 0);
    assert_eq!(dd.opaque_z(0).unwrap(), f32::INFINITY);
    assert_eq!(dd.deep_value(0, 1, 0).unwrap(), 0.5);
}
