#![warn(missing_docs)]
//! Thin lenses and pass-through planes positioned along the optical axis.
//!
//! A [`Lens`] only stores its own scalar state. Everything it needs to know about the preceding element of a
//! chain is handed in as an [`UpstreamPlane`] and everything the next element needs is returned as part of the
//! [`StageTrace`]. Chaining is done by [`OpticalChain::trace`](crate::chain::OpticalChain::trace).
use crate::{
    error::{NanomiError, NmResult},
    ray::{Ray, RaySegment},
    transfer::{free_space_transfer, propagate_through_free_space, thin_lens_transfer},
};
use log::warn;
use nalgebra::Matrix2;
use serde_derive::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// The way an element of an optical chain acts on a ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum ElementKind {
    /// no lens action, the ray is only propagated through the gap to this element (source plane, screen)
    #[default]
    #[strum(serialize = "passthrough")]
    Passthrough,
    /// refraction by a thin lens without materializing the lens-to-image part of the path
    #[strum(serialize = "thin lens")]
    ThinLensOnly,
    /// refraction by a thin lens including the path from the lens to its image plane
    #[strum(serialize = "thin lens with image")]
    ThinLensWithImage,
}
impl ElementKind {
    /// Returns `true` if an element of this kind refracts rays.
    #[must_use]
    pub const fn refracts(self) -> bool {
        !matches!(self, Self::Passthrough)
    }
}
impl TryFrom<u8> for ElementKind {
    type Error = NanomiError;

    /// Converts the step level (1: propagation only, 2: + refraction, 3: + image path) into an [`ElementKind`].
    fn try_from(level: u8) -> NmResult<Self> {
        match level {
            1 => Ok(Self::Passthrough),
            2 => Ok(Self::ThinLensOnly),
            3 => Ok(Self::ThinLensWithImage),
            _ => Err(NanomiError::Configuration(format!(
                "unknown element step level {level}"
            ))),
        }
    }
}

/// Axial location and current image plane of the element preceding a [`Lens`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UpstreamPlane {
    /// position of the preceding element along the optical axis
    pub location: f64,
    /// position of the running image plane behind the preceding element
    pub output_plane: f64,
}
impl UpstreamPlane {
    /// Creates a new [`UpstreamPlane`].
    #[must_use]
    pub const fn new(location: f64, output_plane: f64) -> Self {
        Self {
            location,
            output_plane,
        }
    }
    /// Creates the [`UpstreamPlane`] of a chain origin. An origin acts as its own object plane.
    #[must_use]
    pub const fn origin(location: f64) -> Self {
        Self::new(location, location)
    }
}

/// Result of the thin-lens imaging step of a [`Lens`] (see [`Lens::image_plane_transfer`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageTransfer {
    /// ray directly behind the lens
    pub ray_at_lens: Ray,
    /// ray in the image plane
    pub ray_at_image: Ray,
    /// axial distance from the lens to its image plane (negative for a virtual image)
    pub image_distance: f64,
    /// lateral magnification image / object
    pub magnification: f64,
    /// absolute axial position of the image plane
    pub output_plane_location: f64,
}

/// Everything that happened to a single ray at a single element of a chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageTrace {
    location: f64,
    ray_after_gap: Ray,
    ray_after_lens: Option<Ray>,
    image_distance: Option<f64>,
    magnification: Option<f64>,
    output_plane_location: f64,
    gap_segment: RaySegment,
    lens_effect: Option<RaySegment>,
    lens_to_image: Option<RaySegment>,
}
impl StageTrace {
    /// Axial position of the element this stage belongs to.
    #[must_use]
    pub const fn location(&self) -> f64 {
        self.location
    }
    /// Ray just after crossing the free-space gap from the preceding element.
    #[must_use]
    pub const fn ray_after_gap(&self) -> Ray {
        self.ray_after_gap
    }
    /// Ray just after the thin-lens matrix was applied. `None` for a passthrough element.
    #[must_use]
    pub const fn ray_after_lens(&self) -> Option<Ray> {
        self.ray_after_lens
    }
    /// The ray handed over to the next element of the chain.
    #[must_use]
    pub fn outgoing_ray(&self) -> Ray {
        self.ray_after_lens.unwrap_or(self.ray_after_gap)
    }
    /// Distance between the lens and its image plane. `None` for a passthrough element.
    #[must_use]
    pub const fn image_distance(&self) -> Option<f64> {
        self.image_distance
    }
    /// Lateral magnification of this stage. `None` for a passthrough element.
    #[must_use]
    pub const fn magnification(&self) -> Option<f64> {
        self.magnification
    }
    /// Axial position of the running image plane behind this element.
    #[must_use]
    pub const fn output_plane_location(&self) -> f64 {
        self.output_plane_location
    }
    /// Path segment from the preceding element to this element.
    #[must_use]
    pub const fn gap_segment(&self) -> RaySegment {
        self.gap_segment
    }
    /// Vertical marker of the ray height in the image plane. `None` for a passthrough element.
    #[must_use]
    pub const fn lens_effect(&self) -> Option<RaySegment> {
        self.lens_effect
    }
    /// Path segment from the lens to its image plane. Only present for [`ElementKind::ThinLensWithImage`].
    #[must_use]
    pub const fn lens_to_image(&self) -> Option<RaySegment> {
        self.lens_to_image
    }
    /// The [`UpstreamPlane`] seen by the next element of the chain.
    #[must_use]
    pub const fn as_upstream(&self) -> UpstreamPlane {
        UpstreamPlane::new(self.location, self.output_plane_location)
    }
}

/// An element of an optical chain: a thin lens or a non-refracting plane at a given axial position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Lens {
    location: f64,
    focal_length: Option<f64>,
    kind: ElementKind,
}
impl Lens {
    /// Creates a new [`Lens`].
    ///
    /// A focal length given for a [`ElementKind::Passthrough`] element is ignored. A focal length of zero is
    /// accepted here but every refraction through such a lens fails.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if
    ///   - the location is not finite
    ///   - a refracting element has no focal length or a NaN focal length
    pub fn new(location: f64, focal_length: Option<f64>, kind: ElementKind) -> NmResult<Self> {
        if !location.is_finite() {
            return Err(NanomiError::Configuration(
                "element location must be finite".into(),
            ));
        }
        if !kind.refracts() {
            if let Some(f) = focal_length {
                warn!(
                    "focal length {f} of passthrough element at {location} is ignored"
                );
            }
            return Ok(Self::passthrough(location));
        }
        match focal_length {
            None => Err(NanomiError::Configuration(format!(
                "{kind} element at {location} needs a focal length"
            ))),
            Some(f) if f.is_nan() => Err(NanomiError::Configuration(format!(
                "{kind} element at {location} has a NaN focal length"
            ))),
            Some(f) => Ok(Self {
                location,
                focal_length: Some(f),
                kind,
            }),
        }
    }
    /// Creates a non-refracting plane (source plane, screen) at the given location.
    #[must_use]
    pub const fn passthrough(location: f64) -> Self {
        Self {
            location,
            focal_length: None,
            kind: ElementKind::Passthrough,
        }
    }
    /// Returns the axial position of this [`Lens`].
    #[must_use]
    pub const fn location(&self) -> f64 {
        self.location
    }
    /// Returns the focal length of this [`Lens`]. `None` for a non-refracting plane.
    #[must_use]
    pub const fn focal_length(&self) -> Option<f64> {
        self.focal_length
    }
    /// Returns the [`ElementKind`] of this [`Lens`].
    #[must_use]
    pub const fn kind(&self) -> ElementKind {
        self.kind
    }
    /// Returns the position `(location + f, 0)` of the back focal point (crossover of a parallel beam).
    #[must_use]
    pub fn crossover_point(&self) -> Option<(f64, f64)> {
        self.focal_length.map(|f| (self.location + f, 0.0))
    }
    /// Returns the thin-lens transfer matrix `[[1, 0], [-1/f, 1]]` of this [`Lens`].
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Domain`] if this element has no focal length or a focal length
    /// of zero.
    pub fn thin_lens_transfer(&self) -> NmResult<Matrix2<f64>> {
        let Some(focal_length) = self.focal_length else {
            let message = format!("element at {} has no focal length", self.location);
            return Err(NanomiError::Domain(message));
        };
        thin_lens_transfer(focal_length)
    }
    /// Refracts a ray arriving at this [`Lens`] and locates the image of the given object plane.
    ///
    /// With `T = L · F(location - object_location)` the image distance is `-T[0,1] / T[1,1]` and the
    /// magnification `1 / T[1,1]`.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Domain`] if
    ///   - the lens has no or a zero focal length
    ///   - the object lies in the front focal plane (`T[1,1] == 0`, the image is at infinity)
    ///   - the image geometry is not finite
    pub fn image_plane_transfer(
        &self,
        ray_in: Ray,
        object_location: f64,
    ) -> NmResult<ImageTransfer> {
        let lens = self.thin_lens_transfer()?;
        let temp = lens * free_space_transfer(self.location - object_location);
        let t11 = temp[(1, 1)];
        if t11 == 0.0 {
            return Err(NanomiError::Domain(format!(
                "object at {object_location} lies in the front focal plane of the lens at {}",
                self.location
            )));
        }
        let image_distance = -temp[(0, 1)] / t11;
        let magnification = 1.0 / t11;
        if !image_distance.is_finite() || !magnification.is_finite() {
            return Err(NanomiError::Domain(format!(
                "image of object at {object_location} through the lens at {} is not finite",
                self.location
            )));
        }
        let ray_at_lens = ray_in.transformed(&lens);
        let ray_at_image = ray_at_lens.transformed(&free_space_transfer(image_distance));
        Ok(ImageTransfer {
            ray_at_lens,
            ray_at_image,
            image_distance,
            magnification,
            output_plane_location: self.location + image_distance,
        })
    }
    /// Traces a ray from the preceding element through the gap and (if refracting) through this [`Lens`].
    ///
    /// The upstream output plane serves as object plane for the imaging step. A passthrough element leaves the
    /// running image plane where it was.
    ///
    /// # Errors
    ///
    /// This function returns an error if the imaging step fails (see [`Lens::image_plane_transfer`]).
    pub fn ray_path(&self, ray: Ray, upstream: UpstreamPlane) -> NmResult<StageTrace> {
        let (ray_after_gap, travelled) =
            propagate_through_free_space(self.location - upstream.location, ray);
        let arrival = (upstream.location + travelled, ray_after_gap.height());
        let gap_segment = RaySegment::new((upstream.location, ray.height()), arrival);
        if !self.kind.refracts() {
            return Ok(StageTrace {
                location: self.location,
                ray_after_gap,
                ray_after_lens: None,
                image_distance: None,
                magnification: None,
                output_plane_location: upstream.output_plane,
                gap_segment,
                lens_effect: None,
                lens_to_image: None,
            });
        }
        let image = self.image_plane_transfer(ray_after_gap, upstream.output_plane)?;
        let lens_effect = RaySegment::new(
            (image.output_plane_location, 0.0),
            (image.output_plane_location, image.ray_at_image.height()),
        );
        // the ray at the image is the post-lens ray propagated over the image distance
        let image_location = self.location + image.image_distance;
        let image_point = (image_location, image.ray_at_image.height());
        let with_image = self.kind == ElementKind::ThinLensWithImage;
        let lens_to_image = with_image.then(|| RaySegment::new(arrival, image_point));
        Ok(StageTrace {
            location: self.location,
            ray_after_gap,
            ray_after_lens: Some(image.ray_at_lens),
            image_distance: Some(image.image_distance),
            magnification: Some(image.magnification),
            output_plane_location: image.output_plane_location,
            gap_segment,
            lens_effect: Some(lens_effect),
            lens_to_image,
        })
    }
}
#[cfg(test)]
mod test {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use assert_matches::assert_matches;
    use strum::IntoEnumIterator;

    const SCATTERING_ANGLE: f64 = 0.0112e-6 / 0.00001;

    fn assert_segment(segment: RaySegment, start: (f64, f64), end: (f64, f64)) {
        assert_abs_diff_eq!(segment.start().0, start.0, epsilon = 1e-12);
        assert_abs_diff_eq!(segment.start().1, start.1, epsilon = 1e-15);
        assert_abs_diff_eq!(segment.end().0, end.0, epsilon = 1e-12);
        assert_abs_diff_eq!(segment.end().1, end.1, epsilon = 1e-14);
    }
    #[test]
    fn element_kind() {
        assert_eq!(ElementKind::default(), ElementKind::Passthrough);
        assert_eq!(ElementKind::iter().filter(|k| k.refracts()).count(), 2);
        assert_eq!(ElementKind::try_from(1).unwrap(), ElementKind::Passthrough);
        assert_eq!(ElementKind::try_from(2).unwrap(), ElementKind::ThinLensOnly);
        assert_eq!(
            ElementKind::try_from(3).unwrap(),
            ElementKind::ThinLensWithImage
        );
        assert_matches!(ElementKind::try_from(4), Err(NanomiError::Configuration(_)));
        assert_eq!(
            format!("{}", ElementKind::ThinLensWithImage),
            "thin lens with image"
        );
    }
    #[test]
    fn new() {
        let lens = Lens::new(257.03, Some(67.29), ElementKind::ThinLensWithImage).unwrap();
        assert_eq!(lens.location(), 257.03);
        assert_eq!(lens.focal_length(), Some(67.29));
        assert_eq!(lens.kind(), ElementKind::ThinLensWithImage);
        assert_eq!(lens.crossover_point(), Some((257.03 + 67.29, 0.0)));
    }
    #[test]
    fn new_wrong_params() {
        assert_matches!(
            Lens::new(f64::NAN, Some(1.0), ElementKind::ThinLensOnly),
            Err(NanomiError::Configuration(_))
        );
        assert_matches!(
            Lens::new(1.0, None, ElementKind::ThinLensOnly),
            Err(NanomiError::Configuration(_))
        );
        assert_matches!(
            Lens::new(1.0, Some(f64::NAN), ElementKind::ThinLensWithImage),
            Err(NanomiError::Configuration(_))
        );
    }
    #[test]
    fn new_passthrough_ignores_focal_length() {
        testing_logger::setup();
        let screen = Lens::new(972.7, Some(0.0), ElementKind::Passthrough).unwrap();
        assert_eq!(screen, Lens::passthrough(972.7));
        assert_eq!(screen.crossover_point(), None);
        testing_logger::validate(|captured_logs| {
            assert_eq!(captured_logs.len(), 1);
            assert_eq!(
                captured_logs[0].body,
                "focal length 0 of passthrough element at 972.7 is ignored"
            );
        });
    }
    #[test]
    fn thin_lens_transfer_condenser() {
        for (location, f, m10) in [
            (257.03, 67.29, -0.014_861_049_190_073),
            (349.0, 22.94, -0.043_591_979_075_850),
            (517.0, 39.88, -0.025_075_225_677_031),
        ] {
            let lens = Lens::new(location, Some(f), ElementKind::ThinLensWithImage).unwrap();
            assert_relative_eq!(
                lens.thin_lens_transfer().unwrap(),
                Matrix2::new(1.0, 0.0, m10, 1.0),
                epsilon = 1e-8
            );
        }
    }
    #[test]
    fn thin_lens_transfer_invalid() {
        assert_matches!(
            Lens::passthrough(1.0).thin_lens_transfer(),
            Err(NanomiError::Domain(_))
        );
        let lens = Lens::new(1.0, Some(0.0), ElementKind::ThinLensOnly).unwrap();
        assert_matches!(lens.thin_lens_transfer(), Err(NanomiError::Domain(_)));
        assert_matches!(
            lens.image_plane_transfer(Ray::new(0.0, 1.0), 0.0),
            Err(NanomiError::Domain(_))
        );
    }
    #[test]
    fn image_plane_transfer() {
        let c1 = Lens::new(257.03, Some(67.29), ElementKind::ThinLensWithImage).unwrap();
        let image = c1
            .image_plane_transfer(Ray::new(0.006_679_573_804_574, 0.000_025_987_525_988), 0.0)
            .unwrap();
        assert_abs_diff_eq!(
            image.ray_at_lens.height(),
            0.006_679_573_804_574,
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(
            image.ray_at_lens.angle(),
            -0.000_073_277_948_891,
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(image.ray_at_image.height(), 0.0, epsilon = 1e-8);
        assert_abs_diff_eq!(
            image.ray_at_image.angle(),
            -0.000_073_277_948_891,
            epsilon = 1e-8
        );
        assert_relative_eq!(
            image.image_distance,
            91.153_940_655_634_03,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            image.magnification,
            -0.354_643_195_952_355_9,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            image.output_plane_location,
            257.03 + 91.153_940_655_634_03,
            max_relative = 1e-12
        );

        let c2 = Lens::new(349.0, Some(22.94), ElementKind::ThinLensWithImage).unwrap();
        let image = c2
            .image_plane_transfer(
                Ray::new(-0.597_991_549_284_478, -0.732_779_488_909_672),
                348.183_940_655_633_99,
            )
            .unwrap();
        assert_abs_diff_eq!(
            image.ray_at_lens.angle(),
            -0.706_711_853_805_727,
            epsilon = 1e-8
        );
        assert_abs_diff_eq!(image.ray_at_image.height(), 0.0, epsilon = 1e-8);
        assert_relative_eq!(
            image.image_distance,
            -0.846_160_349_602_502_7,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            image.magnification,
            1.036_885_804_254_686_2,
            max_relative = 1e-8
        );
    }
    #[test]
    fn image_plane_transfer_front_focal_plane() {
        let lens = Lens::new(10.0, Some(4.0), ElementKind::ThinLensOnly).unwrap();
        assert_matches!(
            lens.image_plane_transfer(Ray::new(1.0, 0.0), 6.0),
            Err(NanomiError::Domain(_))
        );
    }
    #[test]
    fn ray_path_passthrough() {
        let screen = Lens::passthrough(972.7);
        let upstream = UpstreamPlane::new(826.9, 833.47);
        let stage = screen
            .ray_path(Ray::new(0.001_722_010_714_498_492, -0.00026), upstream)
            .unwrap();
        assert_eq!(stage.magnification(), None);
        assert_eq!(stage.lens_effect(), None);
        assert_eq!(stage.lens_to_image(), None);
        assert_eq!(stage.ray_after_lens(), None);
        assert_eq!(stage.image_distance(), None);
        assert_eq!(stage.outgoing_ray(), stage.ray_after_gap());
        assert_eq!(stage.output_plane_location(), 833.47);
        assert_eq!(stage.as_upstream(), UpstreamPlane::new(972.7, 833.47));
        assert_eq!(
            stage.gap_segment().start(),
            (826.9, 0.001_722_010_714_498_492)
        );
    }
    #[test]
    fn ray_path_objective() {
        let objective = Lens::new(551.6, Some(19.67), ElementKind::ThinLensWithImage).unwrap();
        let ray = Ray::new(0.0, SCATTERING_ANGLE);
        let upstream = UpstreamPlane::origin(528.9);
        let stage = objective.ray_path(ray, upstream).unwrap();
        assert_segment(stage.gap_segment(), (528.9, 0.0), (551.6, 0.025_424));
        let image_plane = 698.962_706_270_625_3;
        assert_segment(
            stage.lens_effect().unwrap(),
            (image_plane, 0.0),
            (image_plane, 0.0),
        );
        assert_segment(
            stage.lens_to_image().unwrap(),
            (551.6, 0.025_424),
            (image_plane, 0.0),
        );
        assert_relative_eq!(
            stage.magnification().unwrap(),
            -6.491_749_174_917_4,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            stage.output_plane_location(),
            image_plane,
            max_relative = 1e-12
        );
    }
    #[test]
    fn ray_path_lens_only() {
        let projective = Lens::new(826.9, Some(6.0), ElementKind::ThinLensOnly).unwrap();
        let upstream = UpstreamPlane::new(706.4, 757.850_928_652_158_2);
        let stage = projective
            .ray_path(
                Ray::new(-0.001_283_131_672_598_192_3, 0.000_024_926_657),
                upstream,
            )
            .unwrap();
        assert!(stage.lens_effect().is_some());
        assert_eq!(stage.lens_to_image(), None);
        assert_relative_eq!(
            stage.magnification().unwrap(),
            -0.095_163_971_042_459_92,
            max_relative = 1e-8
        );
        assert_relative_eq!(
            stage.output_plane_location(),
            833.470_983_826_254_7,
            max_relative = 1e-10
        );
    }
    #[test]
    fn ray_path_does_not_modify_input() {
        let lens = Lens::new(349.0, Some(22.94), ElementKind::ThinLensWithImage).unwrap();
        let ray = Ray::new(0.006_679_573_804_573_8, -0.000_073_277_948_891);
        let upstream = UpstreamPlane::new(257.03, 348.18);
        let first = lens.ray_path(ray, upstream).unwrap();
        let second = lens.ray_path(ray, upstream).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            ray,
            Ray::new(0.006_679_573_804_573_8, -0.000_073_277_948_891)
        );
    }
}
