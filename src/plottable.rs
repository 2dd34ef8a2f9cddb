#![warn(missing_docs)]
//! Ray diagrams of an analyzed column.
use crate::{
    column::{ColumnReport, LensReport, SectionReport},
    error::{NanomiError, NmResult},
    ray::RaySegment,
};
use log::info;
use plotters::{
    backend::DrawingBackend,
    chart::{ChartBuilder, ChartContext},
    coord::{cartesian::Cartesian2d, types::RangedCoordf64, Shift},
    element::Circle,
    prelude::{DrawingArea, IntoDrawingArea, SVGBackend},
    series::LineSeries,
    style::{Color, RGBColor, ShapeStyle, BLACK, WHITE},
};
use std::{error::Error, ops::Range, path::Path};

/// red, green, blue, gold
const RAY_COLORS: [RGBColor; 4] = [
    RGBColor(255, 0, 0),
    RGBColor(0, 255, 0),
    RGBColor(0, 51, 255),
    RGBColor(179, 102, 0),
];
const LENS_COLOR: RGBColor = RGBColor(77, 191, 191);
const CROSSOVER_COLOR: RGBColor = RGBColor(0, 128, 0);

type Chart<'a, DB> = ChartContext<'a, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>;

/// Trait for things which can be rendered to an image file.
pub trait Plottable {
    /// Renders this object to the given file.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Export`] if the plot cannot be drawn or written.
    fn to_plot(&self, file_path: &Path) -> NmResult<()>;
}

/// The ray diagram of both column sections: ray paths, lenses, condenser aperture and crossover points.
#[derive(Debug, Clone, Copy)]
pub struct RayDiagram<'a> {
    report: &'a ColumnReport,
    size: (u32, u32),
}
impl<'a> RayDiagram<'a> {
    /// Creates a new [`RayDiagram`] of an analyzed column with the default size of 800x600 pixels.
    #[must_use]
    pub const fn new(report: &'a ColumnReport) -> Self {
        Self {
            report,
            size: (800, 600),
        }
    }
    /// Sets the image size in pixels.
    #[must_use]
    pub const fn with_size(mut self, size: (u32, u32)) -> Self {
        self.size = size;
        self
    }
    /// Renders this [`RayDiagram`] as SVG document.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Export`] if the diagram cannot be drawn.
    pub fn to_svg_string(&self) -> NmResult<String> {
        let mut svg = String::new();
        {
            let root = SVGBackend::with_string(&mut svg, self.size).into_drawing_area();
            self.draw(&root)?;
            root.present().map_err(plot_error)?;
        }
        Ok(svg)
    }
    fn sections(&self) -> [&SectionReport; 2] {
        [&self.report.upper, &self.report.lower]
    }
    fn lenses(&self) -> impl Iterator<Item = &LensReport> + '_ {
        self.sections().into_iter().flat_map(|s| &s.lenses)
    }
    fn bounds(&self) -> (Range<f64>, Range<f64>) {
        let [upper, lower] = self.sections();
        let x_min = upper.origin.min(lower.origin);
        let x_max = upper.terminal.max(lower.terminal);
        let h_max = [upper, lower]
            .iter()
            .flat_map(|s| &s.traces)
            .flat_map(|t| t.stages())
            .flat_map(|stage| stage.gap_segment().points())
            .map(|(_, h)| h.abs())
            .filter(|h| h.is_finite())
            .fold(0.0, f64::max);
        let h_max = if h_max > 0.0 { 1.1 * h_max } else { 1e-3 };
        (x_min..x_max, -h_max..h_max)
    }
    fn draw<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> NmResult<()> {
        root.fill(&WHITE).map_err(plot_error)?;
        let (x_range, y_range) = self.bounds();
        let h_max = y_range.end;
        let mut chart = ChartBuilder::on(root)
            .margin(20)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(x_range.clone(), y_range)
            .map_err(plot_error)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("axial position")
            .y_desc("ray height")
            .draw()
            .map_err(plot_error)?;
        // optical axis
        draw_segment(
            &mut chart,
            RaySegment::new((x_range.start, 0.0), (x_range.end, 0.0)),
            BLACK.mix(0.3).stroke_width(1),
        )?;
        for lens in self.lenses().filter(|l| l.active) {
            draw_segment(
                &mut chart,
                RaySegment::new((lens.location, -h_max), (lens.location, h_max)),
                LENS_COLOR.mix(0.6).stroke_width(3),
            )?;
        }
        let aperture = self.report.condenser_aperture;
        let opening = aperture.diameter / 2.0;
        for (from, to) in [(opening, h_max), (-opening, -h_max)] {
            draw_segment(
                &mut chart,
                RaySegment::new((aperture.location, from), (aperture.location, to)),
                BLACK.stroke_width(2),
            )?;
        }
        for section in self.sections() {
            for (trace, color) in section.traces.iter().zip(RAY_COLORS.iter().cycle()) {
                for stage in trace.stages() {
                    draw_segment(&mut chart, stage.gap_segment(), color.stroke_width(1))?;
                    if let Some(segment) = stage.lens_to_image() {
                        draw_segment(&mut chart, segment, color.stroke_width(2))?;
                    }
                    if let Some(segment) = stage.lens_effect() {
                        draw_segment(&mut chart, segment, BLACK.stroke_width(1))?;
                    }
                }
            }
        }
        let crossovers: Vec<(f64, f64)> = self.lenses().filter_map(|l| l.crossover).collect();
        chart
            .draw_series(
                crossovers
                    .into_iter()
                    .map(|p| Circle::new(p, 3, CROSSOVER_COLOR.filled())),
            )
            .map_err(plot_error)?;
        Ok(())
    }
}
impl Plottable for RayDiagram<'_> {
    fn to_plot(&self, file_path: &Path) -> NmResult<()> {
        let root = SVGBackend::new(file_path, self.size).into_drawing_area();
        self.draw(&root)?;
        root.present().map_err(plot_error)?;
        info!("ray diagram saved to {}", file_path.display());
        Ok(())
    }
}
fn draw_segment<DB: DrawingBackend>(
    chart: &mut Chart<'_, DB>,
    segment: RaySegment,
    style: ShapeStyle,
) -> NmResult<()> {
    chart
        .draw_series(LineSeries::new(segment.points(), style))
        .map_err(plot_error)?;
    Ok(())
}
fn plot_error<E: Error>(e: E) -> NanomiError {
    NanomiError::Export(format!("drawing of ray diagram failed: {e}"))
}
