#![warn(missing_docs)]
//! The NanoMi electron column.
//!
//! A [`ColumnConfig`] describes the two sections of the microscope column:
//!   - the upper (condenser) section from the cathode tip to the sample
//!   - the lower (imaging) section from the sample to the scintillator screen
//!
//! [`Column::analyze`] traces the characteristic rays of both sections and collects the results in a
//! [`ColumnReport`]. The default configuration is the NanoMi column.
use crate::{
    chain::{ChainBuilder, ChainTrace, OpticalChain},
    error::{NanomiError, NmResult},
    excitation::LensFamily,
    lens::ElementKind,
    optimizer::{
        FocalLengthOptimum, FocalLengthProblem, FocalLengthSolver, OptimizationMode,
        FOCAL_LENGTH_RANGE, SAMPLE_LOCATION, SCREEN_LOCATION,
    },
    ray::Ray,
};
use log::{debug, info};
use serde_derive::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Lens drive setting: either a focal length or an excitation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum LensSetting {
    /// focal length
    FocalLength(f64),
    /// excitation (Ur), converted by the fit of the lens family
    Excitation(f64),
}

/// Description of a single lens of the column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LensConfig {
    /// name shown in reports
    pub name: String,
    /// axial position
    pub location: f64,
    /// drive setting
    pub setting: LensSetting,
    /// switched on?
    #[serde(default = "default_active")]
    pub active: bool,
    /// lens family (needed for excitation settings and reports)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<LensFamily>,
    /// imaging behavior in the chain
    #[serde(default = "default_kind")]
    pub kind: ElementKind,
}
const fn default_active() -> bool {
    true
}
const fn default_kind() -> ElementKind {
    ElementKind::ThinLensWithImage
}
impl LensConfig {
    /// Creates an active [`LensConfig`] that projects an image, driven by a focal length.
    #[must_use]
    pub fn new(name: &str, location: f64, focal_length: f64) -> Self {
        Self {
            name: name.into(),
            location,
            setting: LensSetting::FocalLength(focal_length),
            active: true,
            family: None,
            kind: ElementKind::ThinLensWithImage,
        }
    }
    /// Sets the lens family.
    #[must_use]
    pub fn with_family(mut self, family: LensFamily) -> Self {
        self.family = Some(family);
        self
    }
    /// Sets the element kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ElementKind) -> Self {
        self.kind = kind;
        self
    }
    /// Returns the focal length of this lens.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the lens is driven by an excitation but has no
    /// lens family.
    pub fn focal_length(&self) -> NmResult<f64> {
        match self.setting {
            LensSetting::FocalLength(f) => Ok(f),
            LensSetting::Excitation(ur) => self.family.map_or_else(
                || {
                    Err(NanomiError::Configuration(format!(
                        "lens {} is driven by an excitation but has no lens family",
                        self.name
                    )))
                },
                |family| Ok(family.focal_length(ur)),
            ),
        }
    }
}

/// One section of the column: an origin plane, lenses and a terminal plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionConfig {
    /// axial position of the origin plane
    pub origin: f64,
    /// axial position of the terminal plane
    pub terminal: f64,
    /// lenses in propagation order
    pub lenses: Vec<LensConfig>,
}

/// Condenser aperture limiting the illumination angle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ApertureConfig {
    /// axial position
    pub location: f64,
    /// diameter of the opening
    pub diameter: f64,
}

/// Automatic focusing of one lower lens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoFocus {
    /// index of the lower lens to be optimized
    pub lens: usize,
    /// imaging condition
    #[serde(default)]
    pub mode: OptimizationMode,
}

/// Description of the complete column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// condenser section (cathode tip to sample)
    pub upper: SectionConfig,
    /// imaging section (sample to screen)
    pub lower: SectionConfig,
    /// condenser aperture
    pub condenser_aperture: ApertureConfig,
    /// radius of the cathode tip
    pub tip_radius: f64,
    /// distance of the off-axis sample rays from the optical axis
    pub distance_from_optical_axis: f64,
    /// electron wavelength
    pub electron_wavelength: f64,
    /// achievable focal lengths `[min, max]`
    pub focal_length_range: (f64, f64),
    /// optional automatic focusing of a lower lens
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_focus: Option<AutoFocus>,
}
impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            upper: SectionConfig {
                origin: 0.0,
                terminal: SAMPLE_LOCATION,
                lenses: vec![
                    LensConfig::new("C1", 257.03, 67.29).with_family(LensFamily::Symmetric),
                    LensConfig::new("C2", 349.0, 22.94).with_family(LensFamily::Asymmetric),
                    LensConfig::new("C3", 517.0, 39.88).with_family(LensFamily::Asymmetric),
                ],
            },
            lower: SectionConfig {
                origin: SAMPLE_LOCATION,
                terminal: SCREEN_LOCATION,
                lenses: vec![
                    LensConfig::new("Objective", 551.6, 19.67),
                    LensConfig::new("Intermediate", 706.4, 6.498),
                    LensConfig::new("Projective", 826.9, 6.0).with_kind(ElementKind::ThinLensOnly),
                ],
            },
            condenser_aperture: ApertureConfig {
                location: 192.4,
                diameter: 0.01,
            },
            tip_radius: 1.5e-2,
            distance_from_optical_axis: 1e-5,
            electron_wavelength: 0.0112e-6,
            focal_length_range: FOCAL_LENGTH_RANGE,
            auto_focus: None,
        }
    }
}
impl ColumnConfig {
    /// Reads a [`ColumnConfig`] from a YAML (`.yaml`, `.yml`) or JSON (`.json`) file.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the file cannot be read, has an unknown extension
    /// or cannot be parsed.
    pub fn from_file(path: &Path) -> NmResult<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            NanomiError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::from_yaml(&contents),
            Some("json") => Self::from_json(&contents),
            _ => Err(NanomiError::Configuration(format!(
                "unknown column description format of {}",
                path.display()
            ))),
        }
    }
    /// Parses a [`ColumnConfig`] from a YAML string. Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the string cannot be parsed.
    pub fn from_yaml(yaml: &str) -> NmResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| {
            NanomiError::Configuration(format!("parsing of column description failed: {e}"))
        })
    }
    /// Parses a [`ColumnConfig`] from a JSON string. Missing fields take their default values.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if the string cannot be parsed.
    pub fn from_json(json: &str) -> NmResult<Self> {
        serde_json::from_str(json).map_err(|e| {
            NanomiError::Configuration(format!("parsing of column description failed: {e}"))
        })
    }
    /// Returns the scattering angle `wavelength / distance` of the sample rays.
    #[must_use]
    pub fn scattering_angle(&self) -> f64 {
        self.electron_wavelength / self.distance_from_optical_axis
    }
    /// Returns the rays leaving the sample: on axis scattered, off axis scattered and off axis parallel.
    #[must_use]
    pub fn sample_rays(&self) -> Vec<Ray> {
        let d = self.distance_from_optical_axis;
        let angle = self.scattering_angle();
        vec![Ray::new(0.0, angle), Ray::new(d, angle), Ray::new(d, 0.0)]
    }
    /// Returns the rays leaving the cathode tip, limited by the condenser aperture.
    #[must_use]
    pub fn condenser_rays(&self) -> Vec<Ray> {
        let r = self.tip_radius;
        let a = self.condenser_aperture.diameter / 2.0;
        let z = self.condenser_aperture.location;
        vec![
            // tip edge to aperture edge
            Ray::new(r, (a - r) / z),
            // on axis to aperture edge
            Ray::new(0.0, a / z),
            // tip edge, parallel
            Ray::new(r, 0.0),
            // tip edge to opposite aperture edge
            Ray::new(-r, (a + r) / z),
        ]
    }
    fn validate(&self) -> NmResult<()> {
        let (lower, upper) = self.focal_length_range;
        if !(lower.is_finite() && upper.is_finite() && lower < upper) {
            return Err(NanomiError::Configuration(format!(
                "invalid focal length range [{lower}, {upper}]"
            )));
        }
        if self.distance_from_optical_axis == 0.0 || !self.distance_from_optical_axis.is_finite() {
            return Err(NanomiError::Configuration(
                "distance from optical axis must be finite and non-zero".into(),
            ));
        }
        if self.condenser_aperture.location == 0.0 {
            return Err(NanomiError::Configuration(
                "condenser aperture must not be located on the cathode tip".into(),
            ));
        }
        for lens in self.upper.lenses.iter().chain(&self.lower.lenses) {
            let f = lens.focal_length()?;
            if !(lower..=upper).contains(&f) {
                return Err(NanomiError::Configuration(format!(
                    "focal length {f} of lens {} outside of [{lower}, {upper}]",
                    lens.name
                )));
            }
        }
        if let Some(auto_focus) = self.auto_focus {
            if auto_focus.lens >= self.lower.lenses.len() {
                return Err(NanomiError::Configuration(format!(
                    "auto focus lens {} out of range (lower section has {} lenses)",
                    auto_focus.lens,
                    self.lower.lenses.len()
                )));
            }
        }
        Ok(())
    }
}

/// Analysis results of one lens.
#[derive(Debug, Clone, PartialEq)]
pub struct LensReport {
    /// lens name
    pub name: String,
    /// axial position
    pub location: f64,
    /// focal length
    pub focal_length: f64,
    /// excitation (only for lenses with a known family)
    pub excitation: Option<f64>,
    /// magnification of the first ray (`0.0` for inactive lenses)
    pub magnification: f64,
    /// switched on?
    pub active: bool,
    /// crossover point `(location + f, 0)` of active lenses
    pub crossover: Option<(f64, f64)>,
}

/// Analysis results of one column section.
#[derive(Debug, Clone, PartialEq)]
pub struct SectionReport {
    /// axial position of the origin plane
    pub origin: f64,
    /// axial position of the terminal plane
    pub terminal: f64,
    /// per-lens results
    pub lenses: Vec<LensReport>,
    /// one trace per characteristic ray (empty if no lens is active)
    pub traces: Vec<ChainTrace>,
}

/// Analysis results of the complete column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnReport {
    /// condenser section
    pub upper: SectionReport,
    /// imaging section
    pub lower: SectionReport,
    /// condenser aperture location and diameter
    pub condenser_aperture: ApertureConfig,
    /// overall magnification on the screen (`0.0` if no lower lens is active)
    pub magnification: f64,
    /// outcome of the automatic focusing, if requested
    pub auto_focus: Option<FocalLengthOptimum>,
}

/// A validated column ready for analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    config: ColumnConfig,
}
impl Column {
    /// Creates a new [`Column`] from its description.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Configuration`] if
    ///   - the focal length range is invalid
    ///   - a lens setting cannot be converted or lies outside the focal length range
    ///   - the auto focus lens does not exist
    pub fn new(config: ColumnConfig) -> NmResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }
    /// Returns the description of this [`Column`].
    #[must_use]
    pub const fn config(&self) -> &ColumnConfig {
        &self.config
    }
    /// Traces all characteristic rays through both sections of the column.
    ///
    /// If automatic focusing is configured, the focal length of the selected lower lens is optimized first (the
    /// lens is switched on for that) and the optimized value is used for the analysis.
    ///
    /// # Errors
    ///
    /// This function returns an error if the automatic focusing fails or a ray cannot be traced.
    pub fn analyze(&self) -> NmResult<ColumnReport> {
        let sample_rays = self.config.sample_rays();
        let mut lower = self.config.lower.clone();
        let auto_focus = if let Some(auto_focus) = self.config.auto_focus {
            let lens = &mut lower.lenses[auto_focus.lens];
            lens.active = true;
            let optimum = self.focus(&lower, auto_focus, &sample_rays)?;
            let lens = &mut lower.lenses[auto_focus.lens];
            info!(
                "{} focused in {} mode: focal length {} -> {}",
                lens.name,
                auto_focus.mode,
                lens.focal_length()?,
                optimum.focal_length
            );
            lens.setting = LensSetting::FocalLength(optimum.focal_length);
            Some(optimum)
        } else {
            None
        };
        let upper = analyze_section(&self.config.upper, &self.config.condenser_rays())?;
        let lower = analyze_section(&lower, &sample_rays)?;
        let magnification = lower
            .traces
            .get(1)
            .and_then(ChainTrace::screen_height)
            .map_or(0.0, |h| (h / self.config.distance_from_optical_axis).abs());
        debug!("overall magnification {magnification}");
        Ok(ColumnReport {
            upper,
            lower,
            condenser_aperture: self.config.condenser_aperture,
            magnification,
            auto_focus,
        })
    }
    fn focus(
        &self,
        section: &SectionConfig,
        auto_focus: AutoFocus,
        rays: &[Ray],
    ) -> NmResult<FocalLengthOptimum> {
        let locations: Vec<f64> = section.lenses.iter().map(|l| l.location).collect();
        let focal_lengths = section
            .lenses
            .iter()
            .map(LensConfig::focal_length)
            .collect::<NmResult<Vec<f64>>>()?;
        let kinds: Vec<ElementKind> = section.lenses.iter().map(|l| l.kind).collect();
        let active: Vec<bool> = section.lenses.iter().map(|l| l.active).collect();
        let problem = FocalLengthProblem::new(
            section.origin,
            section.terminal,
            &locations,
            &focal_lengths,
            &kinds,
            &active,
            rays,
        )?;
        let (lower, upper) = self.config.focal_length_range;
        FocalLengthSolver::new(lower, upper)?.solve(&problem, auto_focus.mode, auto_focus.lens)
    }
}

fn build_section(section: &SectionConfig) -> NmResult<Option<OpticalChain>> {
    if !section.lenses.iter().any(|l| l.active) {
        return Ok(None);
    }
    let mut builder = ChainBuilder::new(section.origin);
    for lens in &section.lenses {
        builder = builder.lens(lens.location, lens.focal_length()?, lens.kind, lens.active);
    }
    builder.terminal(section.terminal).build().map(Some)
}

fn analyze_section(section: &SectionConfig, rays: &[Ray]) -> NmResult<SectionReport> {
    let chain = build_section(section)?;
    let traces = chain.as_ref().map_or_else(
        || Ok(Vec::new()),
        |chain| {
            rays.iter()
                .map(|ray| chain.trace(*ray))
                .collect::<NmResult<Vec<ChainTrace>>>()
        },
    )?;
    let n = section.lenses.len();
    let magnifications = traces
        .first()
        .map_or_else(|| vec![0.0; n], ChainTrace::slot_magnifications);
    let mut crossovers = vec![None; n];
    if let Some(chain) = &chain {
        for (position, lens) in chain.elements().iter().enumerate() {
            if let Some(slot) = chain.slot_of(position) {
                crossovers[slot] = lens.crossover_point();
            }
        }
    }
    let lenses = section
        .lenses
        .iter()
        .zip(magnifications)
        .zip(crossovers)
        .map(|((lens, magnification), crossover)| {
            let focal_length = lens.focal_length()?;
            Ok(LensReport {
                name: lens.name.clone(),
                location: lens.location,
                focal_length,
                excitation: lens.family.map(|family| family.excitation(focal_length)),
                magnification,
                active: lens.active,
                crossover,
            })
        })
        .collect::<NmResult<Vec<LensReport>>>()?;
    Ok(SectionReport {
        origin: section.origin,
        terminal: section.terminal,
        lenses,
        traces,
    })
}
