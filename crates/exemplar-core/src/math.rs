//! Vector math shared by extraction and scoring.

/// Tolerance used when checking that a vector has unit length.
pub const UNIT_TOLERANCE: f32 = 1e-4;

/// L2-normalize a vector in place so its magnitude is 1.
///
/// Zero vectors are left untouched.
pub fn l2_normalize_in_place(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Euclidean length of a vector.
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Whether `v` is a unit vector within [`UNIT_TOLERANCE`].
pub fn is_unit(v: &[f32]) -> bool {
    (l2_norm(v) - 1.0).abs() <= UNIT_TOLERANCE
}

/// Cosine similarity of two unit vectors, clamped to [-1, 1].
///
/// Both inputs must already be L2-normalized, so this is a plain dot product.
/// The clamp absorbs float drift from normalization.
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    dot.clamp(-1.0, 1.0)
}
