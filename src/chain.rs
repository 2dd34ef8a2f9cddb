#![warn(missing_docs)]
//! Ordered chains of optical elements and the tracing of rays through them.
//!
//! An [`OpticalChain`] is built from a list of lens slots by a [`ChainBuilder`]. Inactive slots are filtered out
//! before the chain is assembled, so each element's predecessor is simply the previous element of the chain.
//! Tracing a ray is a fold over the elements which threads the ray and the running image plane forward and
//! collects one [`StageTrace`] per element.
use crate::{
    error::{NanomiError, NmResult},
    lens::{ElementKind, Lens, StageTrace, UpstreamPlane},
    ray::Ray,
};
use log::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
struct LensSlot {
    location: f64,
    focal_length: f64,
    kind: ElementKind,
    active: bool,
}

/// Builder assembling an [`OpticalChain`] from lens slots (source → lens → lens → ... → screen).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChainBuilder {
    origin: f64,
    slots: Vec<LensSlot>,
    terminal: Option<f64>,
}
impl ChainBuilder {
    /// Creates a new [`ChainBuilder`] for a chain starting at the given origin (source or sample plane).
    #[must_use]
    pub fn new(origin: f64) -> Self {
        Self {
            origin,
            ..Default::default()
        }
    }
    /// Appends a lens slot. Inactive slots keep their index but are not part of the built chain.
    #[must_use]
    pub fn lens(
        mut self,
        location: f64,
        focal_length: f64,
        kind: ElementKind,
        active: bool,
    ) -> Self {
        self.slots.push(LensSlot {
            location,
            focal_length,
            kind,
            active,
        });
        self
    }
    /// Terminates the chain with a non-refracting plane (screen, scintillator, sample) at the given location.
    #[must_use]
    pub fn terminal(mut self, location: f64) -> Self {
        self.terminal = Some(location);
        self
    }
    /// Creates a [`ChainBuilder`] from parallel arrays of lens properties.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the arrays differ in length.
    pub fn from_arrays(
        origin: f64,
        locations: &[f64],
        focal_lengths: &[f64],
        kinds: &[ElementKind],
        active: &[bool],
    ) -> NmResult<Self> {
        let n = locations.len();
        if focal_lengths.len() != n || kinds.len() != n || active.len() != n {
            return Err(NanomiError::Configuration(format!(
                "mismatched chain description: {n} locations, {} focal lengths, {} element kinds, {} active flags",
                focal_lengths.len(),
                kinds.len(),
                active.len()
            )));
        }
        let mut builder = Self::new(origin);
        for i in 0..n {
            builder = builder.lens(locations[i], focal_lengths[i], kinds[i], active[i]);
        }
        Ok(builder)
    }
    /// Returns the number of lens slots (active or not) of this [`ChainBuilder`].
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
    /// Assembles the [`OpticalChain`] from all active slots followed by the terminal plane (if any).
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if
    ///   - no slot is active
    ///   - a slot or the terminal plane has invalid parameters (see [`Lens::new`])
    pub fn build(&self) -> NmResult<OpticalChain> {
        if !self.origin.is_finite() {
            return Err(NanomiError::Configuration(
                "chain origin must be finite".into(),
            ));
        }
        let mut elements = Vec::with_capacity(self.slots.len() + 1);
        let mut slots = Vec::with_capacity(self.slots.len() + 1);
        for (index, slot) in self.slots.iter().enumerate().filter(|(_, s)| s.active) {
            let lens = Lens::new(slot.location, Some(slot.focal_length), slot.kind)?;
            elements.push(lens);
            slots.push(Some(index));
        }
        if elements.is_empty() {
            return Err(NanomiError::Configuration(
                "optical chain needs at least one active lens".into(),
            ));
        }
        if let Some(location) = self.terminal {
            elements.push(Lens::new(location, None, ElementKind::Passthrough)?);
            slots.push(None);
        }
        Ok(OpticalChain {
            origin: self.origin,
            elements,
            slots,
            slot_count: self.slots.len(),
        })
    }
}

/// An ordered sequence of [`Lens`] elements starting at an origin plane.
#[derive(Debug, Clone, PartialEq)]
pub struct OpticalChain {
    origin: f64,
    elements: Vec<Lens>,
    slots: Vec<Option<usize>>,
    slot_count: usize,
}
impl OpticalChain {
    /// Returns the axial position of the origin plane of this [`OpticalChain`].
    #[must_use]
    pub const fn origin(&self) -> f64 {
        self.origin
    }
    /// Returns the elements of this [`OpticalChain`] in propagation order.
    #[must_use]
    pub fn elements(&self) -> &[Lens] {
        &self.elements
    }
    /// Returns the builder slot index of the element at the given chain position.
    ///
    /// Returns `None` for the terminal plane or an invalid position.
    #[must_use]
    pub fn slot_of(&self, position: usize) -> Option<usize> {
        self.slots.get(position).copied().flatten()
    }
    /// Traces a ray from the origin plane through all elements.
    ///
    /// # Errors
    ///
    /// This function returns an error if the ray path of one of the elements cannot be calculated (see
    /// [`Lens::ray_path`]).
    pub fn trace(&self, ray: Ray) -> NmResult<ChainTrace> {
        let mut upstream = UpstreamPlane::origin(self.origin);
        let mut ray = ray;
        let mut stages = Vec::with_capacity(self.elements.len());
        for lens in &self.elements {
            let stage = lens.ray_path(ray, upstream)?;
            debug!(
                "{} at {}: ray {} -> {}, image plane at {}",
                lens.kind(),
                lens.location(),
                ray,
                stage.outgoing_ray(),
                stage.output_plane_location()
            );
            upstream = stage.as_upstream();
            ray = stage.outgoing_ray();
            stages.push(stage);
        }
        Ok(ChainTrace {
            stages,
            slots: self.slots.clone(),
            slot_count: self.slot_count,
        })
    }
}

/// The per-element results of tracing one ray through an [`OpticalChain`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChainTrace {
    stages: Vec<StageTrace>,
    slots: Vec<Option<usize>>,
    slot_count: usize,
}
impl ChainTrace {
    /// Returns the stage results in propagation order.
    #[must_use]
    pub fn stages(&self) -> &[StageTrace] {
        &self.stages
    }
    /// Returns the height of the ray arriving at the last element (the screen of a terminated chain).
    #[must_use]
    pub fn screen_height(&self) -> Option<f64> {
        self.stages.last().map(|s| s.ray_after_gap().height())
    }
    /// Returns the magnification of each stage (`None` for passthrough elements).
    #[must_use]
    pub fn magnifications(&self) -> Vec<Option<f64>> {
        self.stages.iter().map(StageTrace::magnification).collect()
    }
    /// Returns the magnification of each builder slot. Inactive slots report `0.0`.
    #[must_use]
    pub fn slot_magnifications(&self) -> Vec<f64> {
        let mut magnifications = vec![0.0; self.slot_count];
        for (stage, slot) in self.stages.iter().zip(&self.slots) {
            if let (Some(index), Some(m)) = (slot, stage.magnification()) {
                magnifications[*index] = m;
            }
        }
        magnifications
    }
}
