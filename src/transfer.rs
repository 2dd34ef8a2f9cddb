#![warn(missing_docs)]
//! Transfer matrices of the paraxial (ABCD) formalism.
//!
//! All matrices act on column vectors `[height, angle]` (see [`Ray`]).
use crate::{
    error::{NanomiError, NmResult},
    ray::Ray,
};
use nalgebra::Matrix2;

/// Returns the transfer matrix `[[1, d], [0, 1]]` for a free-space propagation over `distance`.
///
/// Negative distances describe a backward (virtual) propagation and are valid.
#[must_use]
pub fn free_space_transfer(distance: f64) -> Matrix2<f64> {
    Matrix2::new(1.0, distance, 0.0, 1.0)
}
/// Propagates a [`Ray`] through free space.
///
/// Returns the outgoing ray together with the travelled axial distance. The height of the outgoing ray is
/// `height + distance * angle`, its angle is unchanged.
#[must_use]
pub fn propagate_through_free_space(distance: f64, ray: Ray) -> (Ray, f64) {
    (ray.transformed(&free_space_transfer(distance)), distance)
}
/// Returns the transfer matrix `[[1, 0], [-1/f, 1]]` of a thin lens with the given focal length.
///
/// # Errors
///
/// This function returns a [`NanomiError::Domain`] if the focal length is zero or NaN.
pub fn thin_lens_transfer(focal_length: f64) -> NmResult<Matrix2<f64>> {
    if focal_length == 0.0 {
        return Err(NanomiError::Domain("zero focal length".into()));
    }
    if focal_length.is_nan() {
        return Err(NanomiError::Domain("NaN focal length".into()));
    }
    Ok(Matrix2::new(1.0, 0.0, -1.0 / focal_length, 1.0))
}
#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    #[test]
    fn free_space() {
        for distance in [257.03, 349.0, 168.0, 13.692_537_802_729_17, 0.0, -0.846] {
            assert_eq!(
                free_space_transfer(distance),
                Matrix2::new(1.0, distance, 0.0, 1.0)
            );
        }
    }
    #[test]
    fn propagate() {
        let ray = Ray::new(1.5e-2, -2.598_752_6e-5);
        let (out, distance) = propagate_through_free_space(257.03, ray);
        assert_eq!(distance, 257.03);
        assert_relative_eq!(out.height(), 8.320_426_2e-3, max_relative = 1e-5);
        assert_eq!(out.angle(), ray.angle());

        let ray = Ray::new(-0.052_933_46, 0.000_846_36);
        let (out, distance) = propagate_through_free_space(168.0, ray);
        assert_eq!(distance, 168.0);
        assert_relative_eq!(out.height(), 0.089_255_74, max_relative = 1e-5);
    }
    #[test]
    fn propagate_exact() {
        for (h, a, d) in [(0.0, 0.00112, 22.7), (0.3, -0.01, -5.5), (-1e-5, 2e-3, 1e3)] {
            let (out, _) = propagate_through_free_space(d, Ray::new(h, a));
            assert_eq!(out.height(), h + d * a);
            assert_eq!(out.angle(), a);
        }
    }
    #[test]
    fn thin_lens() {
        let m = thin_lens_transfer(67.29).unwrap();
        assert_relative_eq!(
            m,
            Matrix2::new(1.0, 0.0, -0.014_861_049_190_073, 1.0),
            epsilon = 1e-8
        );
        let m = thin_lens_transfer(-20.0).unwrap();
        assert_eq!(m[(1, 0)], 0.05);
    }
    #[test]
    fn thin_lens_invalid() {
        assert_matches!(thin_lens_transfer(0.0), Err(NanomiError::Domain(_)));
        assert_matches!(thin_lens_transfer(f64::NAN), Err(NanomiError::Domain(_)));
    }
}
