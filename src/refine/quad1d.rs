//! Quadratic 1D fitting for cost-profile minima.

/// Outcome of fitting a parabola through three equally spaced cost samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum VertexFit {
    /// Well-conditioned minimum at the given offset, clamped to `[-1, 1]`.
    Minimum(f32),
    /// Curvature magnitude is below the degeneracy threshold.
    Flat,
    /// The center sample sits on a cost maximum, or a sample is non-finite.
    Rejected,
}

/// Estimates the sub-sample minimum of a cost profile sampled at `x = -1, 0, +1`.
///
/// `min_curvature` is the degeneracy threshold on `cm - 2 c0 + cp`.
pub(crate) fn quad_min_offset_1d(cm: f32, c0: f32, cp: f32, min_curvature: f32) -> VertexFit {
    if !cm.is_finite() || !c0.is_finite() || !cp.is_finite() {
        return VertexFit::Rejected;
    }

    let curvature = cm - 2.0 * c0 + cp;
    if curvature.abs() <= min_curvature {
        return VertexFit::Flat;
    }
    if curvature < 0.0 {
        return VertexFit::Rejected;
    }

    let dx = 0.5 * (cm - cp) / curvature;
    if dx.is_finite() {
        VertexFit::Minimum(dx.clamp(-1.0, 1.0))
    } else {
        VertexFit::Rejected
    }
}

#[cfg(test)]
mod tests {
    use super::{quad_min_offset_1d, VertexFit};

    #[test]
    fn symmetric_profile_has_zero_offset() {
        let fit = quad_min_offset_1d(0.9, 0.1, 0.9, 1e-6);
        assert_eq!(fit, VertexFit::Minimum(0.0));
    }

    #[test]
    fn shifted_profile_recovers_vertex() {
        let f = |x: f32| 2.0 + (x - 0.25).powi(2);
        match quad_min_offset_1d(f(-1.0), f(0.0), f(1.0), 1e-6) {
            VertexFit::Minimum(dx) => assert!((dx - 0.25).abs() < 1e-5),
            other => panic!("unexpected fit {other:?}"),
        }
    }

    #[test]
    fn flat_and_concave_profiles_are_classified() {
        assert_eq!(quad_min_offset_1d(1.0, 1.0, 1.0, 1e-6), VertexFit::Flat);
        assert_eq!(quad_min_offset_1d(0.5, 1.0, 0.5, 1e-6), VertexFit::Rejected);
        assert_eq!(
            quad_min_offset_1d(f32::NAN, 1.0, 0.5, 1e-6),
            VertexFit::Rejected
        );
    }

    #[test]
    fn far_vertex_is_clamped() {
        match quad_min_offset_1d(10.0, 5.0, 0.5, 1e-6) {
            VertexFit::Minimum(dx) => assert!((dx - 1.0).abs() < 1e-6),
            other => panic!("unexpected fit {other:?}"),
        }
    }
}
