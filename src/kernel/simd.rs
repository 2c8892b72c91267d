//! SIMD window costs using the `wide` crate.
//!
//! Row differences are accumulated eight lanes at a time; the remainder that
//! does not fill a lane group is summed in scalar code.

use wide::f32x8;

const LANES: usize = 8;

#[inline]
fn lanes(chunk: &[f32]) -> f32x8 {
    let mut buf = [0.0f32; LANES];
    buf.copy_from_slice(chunk);
    f32x8::from(buf)
}

/// Sum of squared differences of two equally long rows.
#[inline]
pub(crate) fn ssd_row(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().min(b.len());
    let (a, b) = (&a[..len], &b[..len]);

    let mut acc = f32x8::ZERO;
    let mut a_chunks = a.chunks_exact(LANES);
    let mut b_chunks = b.chunks_exact(LANES);
    for (ca, cb) in (&mut a_chunks).zip(&mut b_chunks) {
        let diff = lanes(ca) - lanes(cb);
        acc += diff * diff;
    }

    let tail: f32 = a_chunks
        .remainder()
        .iter()
        .zip(b_chunks.remainder())
        .map(|(&l, &r)| (l - r) * (l - r))
        .sum();
    acc.to_array().iter().sum::<f32>() + tail
}
