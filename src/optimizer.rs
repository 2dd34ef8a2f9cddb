#![warn(missing_docs)]
//! Focal-length optimization of a lens chain.
//!
//! The optimizer searches the focal length of one lens of a chain such that the ray heights on the terminal plane
//! fulfill an imaging condition (see [`OptimizationMode`]). The search runs on the `argmin` Brent solvers: a root
//! search if the residual changes sign within the focal-length range, a bounded least-squares minimum otherwise.
//! Every objective evaluation builds a fresh [`OpticalChain`](crate::chain::OpticalChain) so no state is shared
//! between trials.
use crate::{
    chain::ChainBuilder,
    error::{NanomiError, NmResult},
    lens::ElementKind,
    ray::Ray,
};
use argmin::{
    core::{CostFunction, Error, Executor, IterState, State, TerminationReason, TerminationStatus},
    solver::brent::{BrentOpt, BrentRoot},
};
use log::{debug, info, warn};
use serde_derive::{Deserialize, Serialize};
use std::cell::Cell;
use strum::{Display, EnumIter, EnumString};

/// Axial position of the sample plane, the origin of the lower (imaging) column.
pub const SAMPLE_LOCATION: f64 = 528.9;
/// Axial position of the scintillator screen, the terminal plane of the lower column.
pub const SCREEN_LOCATION: f64 = 972.7;
/// Achievable focal-length range of the NanoMi lenses.
pub const FOCAL_LENGTH_RANGE: (f64, f64) = (6.0, 300.0);

/// Imaging condition driven to zero by the optimizer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum OptimizationMode {
    /// The height of the first ray on the screen becomes zero (screen conjugate to the sample).
    #[default]
    Image,
    /// The heights of the first two rays on the screen coincide (diffraction pattern on the screen).
    Diffraction,
}
impl OptimizationMode {
    /// Returns the number of rays needed to evaluate the residual of this mode.
    #[must_use]
    pub const fn required_rays(self) -> usize {
        match self {
            Self::Image => 1,
            Self::Diffraction => 2,
        }
    }
}

/// A lens chain together with the rays whose screen heights form the residual.
#[derive(Debug, Clone, PartialEq)]
pub struct FocalLengthProblem {
    origin: f64,
    terminal: f64,
    locations: Vec<f64>,
    focal_lengths: Vec<f64>,
    kinds: Vec<ElementKind>,
    active: Vec<bool>,
    rays: Vec<Ray>,
}
impl FocalLengthProblem {
    /// Creates a new [`FocalLengthProblem`] for a chain between `origin` and the `terminal` plane.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the lens arrays differ in length.
    pub fn new(
        origin: f64,
        terminal: f64,
        locations: &[f64],
        focal_lengths: &[f64],
        kinds: &[ElementKind],
        active: &[bool],
        rays: &[Ray],
    ) -> NmResult<Self> {
        // validate the arrays the same way the chain builder does
        ChainBuilder::from_arrays(origin, locations, focal_lengths, kinds, active)?;
        Ok(Self {
            origin,
            terminal,
            locations: locations.to_vec(),
            focal_lengths: focal_lengths.to_vec(),
            kinds: kinds.to_vec(),
            active: active.to_vec(),
            rays: rays.to_vec(),
        })
    }
    /// Creates a [`FocalLengthProblem`] for the lower NanoMi column (sample to screen).
    ///
    /// All lenses except the last one project an intermediate image; the last (projective) lens is a plain thin
    /// lens.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the lens arrays differ in length.
    pub fn lower_column(
        locations: &[f64],
        focal_lengths: &[f64],
        rays: &[Ray],
        active: &[bool],
    ) -> NmResult<Self> {
        let kinds: Vec<ElementKind> = (0..locations.len())
            .map(|i| {
                if i + 1 < locations.len() {
                    ElementKind::ThinLensWithImage
                } else {
                    ElementKind::ThinLensOnly
                }
            })
            .collect();
        Self::new(
            SAMPLE_LOCATION,
            SCREEN_LOCATION,
            locations,
            focal_lengths,
            &kinds,
            active,
            rays,
        )
    }
    /// Returns the current focal lengths of all lens slots.
    #[must_use]
    pub fn focal_lengths(&self) -> &[f64] {
        &self.focal_lengths
    }
    /// Checks that the given lens can be optimized in the given mode.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if
    ///   - the lens index is out of range
    ///   - the lens is inactive
    ///   - there are not enough rays for the given mode
    pub fn validate(&self, mode: OptimizationMode, lens_index: usize) -> NmResult<()> {
        let Some(active) = self.active.get(lens_index) else {
            return Err(NanomiError::Configuration(format!(
                "lens index {lens_index} out of range (chain has {} lenses)",
                self.active.len()
            )));
        };
        if !active {
            return Err(NanomiError::Configuration(format!(
                "cannot optimize inactive lens {lens_index}"
            )));
        }
        if self.rays.len() < mode.required_rays() {
            return Err(NanomiError::Configuration(format!(
                "{mode} mode needs {} rays, got {}",
                mode.required_rays(),
                self.rays.len()
            )));
        }
        Ok(())
    }
    /// Returns the residual of the given mode if lens `lens_index` had the given focal length.
    ///
    /// The residual is the screen height of the first ray ([`OptimizationMode::Image`]) or the screen height
    /// difference of the first two rays ([`OptimizationMode::Diffraction`]).
    ///
    /// # Errors
    ///
    /// This function returns an error if
    ///   - the problem is invalid for this mode and lens (see [`FocalLengthProblem::validate`])
    ///   - the chain cannot be traced with this focal length (see [`OpticalChain::trace`](crate::chain::OpticalChain::trace))
    pub fn residual(
        &self,
        mode: OptimizationMode,
        lens_index: usize,
        focal_length: f64,
    ) -> NmResult<f64> {
        self.validate(mode, lens_index)?;
        let mut focal_lengths = self.focal_lengths.clone();
        focal_lengths[lens_index] = focal_length;
        let chain = ChainBuilder::from_arrays(
            self.origin,
            &self.locations,
            &focal_lengths,
            &self.kinds,
            &self.active,
        )?
        .terminal(self.terminal)
        .build()?;
        let heights = self.rays[..mode.required_rays()]
            .iter()
            .map(|ray| {
                chain
                    .trace(*ray)?
                    .screen_height()
                    .ok_or_else(|| NanomiError::Domain("empty chain trace".into()))
            })
            .collect::<NmResult<Vec<f64>>>()?;
        Ok(match mode {
            OptimizationMode::Image => heights[0],
            OptimizationMode::Diffraction => heights[0] - heights[1],
        })
    }
}

/// Reason for stopping a focal-length search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Termination {
    /// The residual at the initial focal length is exactly zero.
    #[strum(serialize = "zero residual")]
    ZeroResidual,
    /// The residual changes sign within the bounds and its root was located.
    #[strum(serialize = "root found")]
    RootFound,
    /// The residual keeps its sign within the bounds, the focal length minimizes its magnitude.
    #[strum(serialize = "bounded minimum")]
    BoundedMinimum,
    /// The iteration budget is used up.
    #[strum(serialize = "iteration limit")]
    IterationLimit,
}
impl Termination {
    /// Returns `true` if the search stopped because a convergence criterion was met.
    #[must_use]
    pub const fn is_converged(self) -> bool {
        !matches!(self, Self::IterationLimit)
    }
}

/// Result of a focal-length search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalLengthOptimum {
    /// focal length found
    pub focal_length: f64,
    /// residual at the found focal length
    pub residual: f64,
    /// residual at the initial focal length
    pub initial_residual: f64,
    /// number of objective evaluations
    pub evaluations: usize,
    /// reason for stopping
    pub termination: Termination,
    /// `true` if a convergence criterion was met
    pub converged: bool,
}

/// Residual of a focal-length search as seen by the `argmin` solvers.
///
/// Root finding works on the residual itself, the bounded minimum search on its square.
struct ResidualCost<'a, F> {
    objective: &'a F,
    evaluations: &'a Cell<usize>,
    squared: bool,
}
impl<'a, F> ResidualCost<'a, F>
where
    F: Fn(f64) -> NmResult<f64>,
{
    const fn new(objective: &'a F, evaluations: &'a Cell<usize>, squared: bool) -> Self {
        Self {
            objective,
            evaluations,
            squared,
        }
    }
    fn residual(&self, focal_length: f64) -> NmResult<f64> {
        self.evaluations.set(self.evaluations.get() + 1);
        let residual = (self.objective)(focal_length)?;
        if residual.is_finite() {
            Ok(residual)
        } else {
            Err(NanomiError::Domain(format!(
                "residual {residual} at focal length {focal_length}"
            )))
        }
    }
}
impl<F> CostFunction for ResidualCost<'_, F>
where
    F: Fn(f64) -> NmResult<f64>,
{
    type Param = f64;
    type Output = f64;

    fn cost(&self, focal_length: &Self::Param) -> Result<Self::Output, Error> {
        let residual = self.residual(*focal_length)?;
        Ok(if self.squared {
            residual * residual
        } else {
            residual
        })
    }
}

type SearchState = IterState<f64, (), (), (), (), f64>;

/// Bounded solver for a single focal length.
///
/// If the residual changes sign between the bounds its root is located with [`BrentRoot`]. Otherwise the
/// magnitude of the residual is minimized with [`BrentOpt`] and compared against both bounds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FocalLengthSolver {
    lower_bound: f64,
    upper_bound: f64,
    tolerance: f64,
    max_iterations: u64,
    residual_threshold: f64,
}
impl Default for FocalLengthSolver {
    /// Solver on the NanoMi focal-length range with a tolerance close to machine precision.
    fn default() -> Self {
        Self {
            lower_bound: FOCAL_LENGTH_RANGE.0,
            upper_bound: FOCAL_LENGTH_RANGE.1,
            tolerance: 1e-15,
            max_iterations: 100,
            residual_threshold: 1e-9,
        }
    }
}
impl FocalLengthSolver {
    /// Creates a new [`FocalLengthSolver`] searching in `[lower_bound, upper_bound]` with default tolerances.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the bounds are not finite or not increasing.
    pub fn new(lower_bound: f64, upper_bound: f64) -> NmResult<Self> {
        if !lower_bound.is_finite() || !upper_bound.is_finite() || lower_bound >= upper_bound {
            return Err(NanomiError::Configuration(format!(
                "invalid focal length bounds [{lower_bound}, {upper_bound}]"
            )));
        }
        Ok(Self {
            lower_bound,
            upper_bound,
            ..Self::default()
        })
    }
    /// Sets the absolute focal-length tolerance of the root search.
    #[must_use]
    pub const fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }
    /// Sets the maximum number of solver iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }
    /// Sets the residual magnitude above which a result is reported as not converged in the log.
    #[must_use]
    pub const fn with_residual_threshold(mut self, residual_threshold: f64) -> Self {
        self.residual_threshold = residual_threshold;
        self
    }
    /// Returns the search interval of this [`FocalLengthSolver`].
    #[must_use]
    pub const fn bounds(&self) -> (f64, f64) {
        (self.lower_bound, self.upper_bound)
    }
    /// Optimizes the focal length of lens `lens_index` of the given problem, starting at its current focal length.
    ///
    /// # Errors
    ///
    /// This function returns an error if the problem is invalid (see [`FocalLengthProblem::validate`]) or if
    /// the residual cannot be evaluated during the search.
    pub fn solve(
        &self,
        problem: &FocalLengthProblem,
        mode: OptimizationMode,
        lens_index: usize,
    ) -> NmResult<FocalLengthOptimum> {
        problem.validate(mode, lens_index)?;
        debug!("optimizing focal length of lens {lens_index} ({mode})");
        self.minimize(
            |focal_length| problem.residual(mode, lens_index, focal_length),
            problem.focal_lengths[lens_index],
        )
    }
    /// Drives a scalar residual function towards zero within the bounds of this solver.
    ///
    /// The initial value is clamped into the bounds and only serves as reference: the search always covers the
    /// whole interval. The returned optimum is the best point found, whether or not the residual reached zero.
    ///
    /// # Errors
    ///
    /// This function returns
    ///   - a [`NanomiError::Configuration`] if the initial value is not finite
    ///   - the error of the objective (or a [`NanomiError::Domain`] for a non-finite residual) if the residual
    ///     cannot be evaluated at the initial value or at a trial point of the search
    pub fn minimize<F>(&self, objective: F, initial: f64) -> NmResult<FocalLengthOptimum>
    where
        F: Fn(f64) -> NmResult<f64>,
    {
        if !initial.is_finite() {
            return Err(NanomiError::Configuration(format!(
                "initial focal length {initial} is not finite"
            )));
        }
        let x = initial.clamp(self.lower_bound, self.upper_bound);
        if x != initial {
            debug!("initial focal length {initial} clamped to {x}");
        }
        let evaluations = Cell::new(0);
        let cost = ResidualCost::new(&objective, &evaluations, false);
        let initial_residual = cost.residual(x)?;
        let (x, residual, termination) = if initial_residual == 0.0 {
            (x, initial_residual, Termination::ZeroResidual)
        } else {
            let (x, termination) = self.search(&objective, &evaluations, x)?;
            (x, cost.residual(x)?, termination)
        };
        if residual.abs() > self.residual_threshold {
            warn!(
                "focal length search stopped at {x} with residual {residual} above {} ({termination})",
                self.residual_threshold
            );
        } else {
            info!(
                "focal length {x} found after {} evaluations (residual {residual})",
                evaluations.get()
            );
        }
        Ok(FocalLengthOptimum {
            focal_length: x,
            residual,
            initial_residual,
            evaluations: evaluations.get(),
            termination,
            converged: termination.is_converged(),
        })
    }
    fn search<F>(
        &self,
        objective: &F,
        evaluations: &Cell<usize>,
        initial: f64,
    ) -> NmResult<(f64, Termination)>
    where
        F: Fn(f64) -> NmResult<f64>,
    {
        let cost = ResidualCost::new(objective, evaluations, false);
        let at_lower = cost.residual(self.lower_bound);
        let at_upper = cost.residual(self.upper_bound);
        if let (Ok(lower), Ok(upper)) = (&at_lower, &at_upper) {
            if lower.signum() != upper.signum() || *lower == 0.0 || *upper == 0.0 {
                debug!("residual changes sign between {lower} and {upper}");
                let solver = BrentRoot::new(self.lower_bound, self.upper_bound, self.tolerance);
                let result = Executor::new(cost, solver)
                    .configure(|state| state.param(initial).max_iters(self.max_iterations))
                    .run()?;
                let state = result.state();
                let x = *state.get_param().ok_or_else(missing_focal_length)?;
                return Ok((x, self.termination(state, Termination::RootFound)));
            }
        }
        let solver = BrentOpt::new(self.lower_bound, self.upper_bound);
        let result = Executor::new(ResidualCost::new(objective, evaluations, true), solver)
            .configure(|state| state.param(initial).max_iters(self.max_iterations))
            .run()?;
        let state = result.state();
        let x = *state.get_best_param().ok_or_else(missing_focal_length)?;
        let mut best = (x, state.get_best_cost());
        // a residual that does not change sign is usually smallest on one of the bounds
        for (bound, residual) in [(self.lower_bound, at_lower), (self.upper_bound, at_upper)] {
            if let Ok(r) = residual {
                if r * r < best.1 {
                    best = (bound, r * r);
                }
            }
        }
        let termination = self.termination(state, Termination::BoundedMinimum);
        Ok((best.0, termination))
    }
    fn termination(&self, state: &SearchState, converged: Termination) -> Termination {
        match state.get_termination_status() {
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                debug!("no convergence within {} iterations", self.max_iterations);
                Termination::IterationLimit
            }
            _ => converged,
        }
    }
}
fn missing_focal_length() -> NanomiError {
    NanomiError::Other("focal length search returned no focal length".into())
}

/// Optimizes the focal length of one lens of the lower NanoMi column.
///
/// The chain starts at the sample plane and ends on the screen (see [`FocalLengthProblem::lower_column`]). The
/// search is bounded to the achievable focal-length range and starts at the current focal length of the lens. The
/// caller's focal lengths are not modified.
///
/// # Errors
///
/// This function returns a [`NanomiError::Configuration`] if the arrays differ in length, the lens is inactive or
/// out of range or too few rays are given for the mode. Errors of the residual evaluation at the starting point are
/// returned as well.
pub fn optimize_focal_length(
    mode: OptimizationMode,
    lens_index: usize,
    lens_locations: &[f64],
    focal_lengths: &[f64],
    rays: &[Ray],
    active: &[bool],
) -> NmResult<FocalLengthOptimum> {
    let problem = FocalLengthProblem::lower_column(lens_locations, focal_lengths, rays, active)?;
    FocalLengthSolver::default().solve(&problem, mode, lens_index)
}
