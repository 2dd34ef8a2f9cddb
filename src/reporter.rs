#![warn(missing_docs)]
//! Export of the column results as CSV file.
//!
//! The file consists of three blocks separated by two empty lines each:
//! ```text
//! Lenses,Focal Length,UR,Magnification,Active
//! C1,67.29,0.45159482613744803,-0.35464319595235594,True
//! ...
//!
//!
//! Lenses,Focal Length,Magnification,Active
//! Objective,19.67,-6.4917491749174,True
//! ...
//!
//!
//! Condensor Aperature,Magnification
//! 0.01,6167.458488759921
//! ```
//! Records are terminated by `\r\n`.
use crate::{
    column::ColumnReport,
    error::{NanomiError, NmResult},
};
use csv::{Terminator, WriterBuilder};
use log::info;
use std::{
    fmt::Display,
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

const UPPER_HEADER: [&str; 5] = ["Lenses", "Focal Length", "UR", "Magnification", "Active"];
const LOWER_HEADER: [&str; 4] = ["Lenses", "Focal Length", "Magnification", "Active"];
const SUMMARY_HEADER: [&str; 2] = ["Condensor Aperature", "Magnification"];

/// Result row of an upper (condenser) lens.
#[derive(Debug, Clone, PartialEq)]
pub struct UpperLensResult {
    /// lens name
    pub name: String,
    /// focal length
    pub focal_length: f64,
    /// excitation (Ur)
    pub excitation: Option<f64>,
    /// magnification
    pub magnification: f64,
    /// switched on?
    pub active: bool,
}

/// Result row of a lower (imaging) lens.
#[derive(Debug, Clone, PartialEq)]
pub struct LowerLensResult {
    /// lens name
    pub name: String,
    /// focal length
    pub focal_length: f64,
    /// magnification
    pub magnification: f64,
    /// switched on?
    pub active: bool,
}

/// Tabular results of a column analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnResults {
    upper: Vec<UpperLensResult>,
    lower: Vec<LowerLensResult>,
    condenser_aperture: f64,
    magnification: f64,
}
impl ColumnResults {
    /// Creates a new [`ColumnResults`].
    #[must_use]
    pub const fn new(
        upper: Vec<UpperLensResult>,
        lower: Vec<LowerLensResult>,
        condenser_aperture: f64,
        magnification: f64,
    ) -> Self {
        Self {
            upper,
            lower,
            condenser_aperture,
            magnification,
        }
    }
    /// Returns the upper lens rows.
    #[must_use]
    pub fn upper(&self) -> &[UpperLensResult] {
        &self.upper
    }
    /// Returns the lower lens rows.
    #[must_use]
    pub fn lower(&self) -> &[LowerLensResult] {
        &self.lower
    }
    /// Saves these [`ColumnResults`] as CSV file.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Export`] if the file cannot be created or written.
    pub fn save_results(&self, path: &Path) -> NmResult<()> {
        let file = File::create(path).map_err(|e| {
            NanomiError::Export(format!("cannot create {}: {e}", path.display()))
        })?;
        self.write_results(BufWriter::new(file))?;
        info!("results saved to {}", path.display());
        Ok(())
    }
    /// Writes these [`ColumnResults`] as CSV to the given writer.
    ///
    /// # Errors
    ///
    /// This function returns a [`NanomiError::Export`] if writing fails.
    pub fn write_results<W: Write>(&self, mut writer: W) -> NmResult<()> {
        let upper = self.upper.iter().map(|lens| {
            vec![
                lens.name.clone(),
                lens.focal_length.to_string(),
                lens.excitation.map(|ur| ur.to_string()).unwrap_or_default(),
                lens.magnification.to_string(),
                bool_field(lens.active).into(),
            ]
        });
        write_block(&mut writer, &UPPER_HEADER, upper)?;
        write_separator(&mut writer)?;
        let lower = self.lower.iter().map(|lens| {
            vec![
                lens.name.clone(),
                lens.focal_length.to_string(),
                lens.magnification.to_string(),
                bool_field(lens.active).into(),
            ]
        });
        write_block(&mut writer, &LOWER_HEADER, lower)?;
        write_separator(&mut writer)?;
        let summary = [vec![
            self.condenser_aperture.to_string(),
            self.magnification.to_string(),
        ]];
        write_block(&mut writer, &SUMMARY_HEADER, summary)?;
        writer.flush().map_err(io_error)
    }
}
impl From<&ColumnReport> for ColumnResults {
    fn from(report: &ColumnReport) -> Self {
        let upper = report
            .upper
            .lenses
            .iter()
            .map(|l| UpperLensResult {
                name: l.name.clone(),
                focal_length: l.focal_length,
                excitation: l.excitation,
                magnification: l.magnification,
                active: l.active,
            })
            .collect();
        let lower = report
            .lower
            .lenses
            .iter()
            .map(|l| LowerLensResult {
                name: l.name.clone(),
                focal_length: l.focal_length,
                magnification: l.magnification,
                active: l.active,
            })
            .collect();
        Self::new(
            upper,
            lower,
            report.condenser_aperture.diameter,
            report.magnification,
        )
    }
}
impl Display for ColumnResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:<14}{:>14}{:>12}{:>16}  active",
            "lens", "focal length", "Ur", "magnification"
        )?;
        for lens in &self.upper {
            let ur = lens
                .excitation
                .map_or_else(|| "-".to_owned(), |ur| format!("{ur:.4}"));
            writeln!(
                f,
                "{:<14}{:>14.3}{:>12}{:>16.2e}  {}",
                lens.name, lens.focal_length, ur, lens.magnification, lens.active
            )?;
        }
        for lens in &self.lower {
            writeln!(
                f,
                "{:<14}{:>14.3}{:>12}{:>16.2e}  {}",
                lens.name, lens.focal_length, "-", lens.magnification, lens.active
            )?;
        }
        writeln!(f, "condenser aperture: {}", self.condenser_aperture)?;
        write!(f, "magnification on screen: {:.4e}", self.magnification)
    }
}
const fn bool_field(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}
fn export_error(e: csv::Error) -> NanomiError {
    NanomiError::Export(e.to_string())
}
fn io_error(e: std::io::Error) -> NanomiError {
    NanomiError::Export(e.to_string())
}
/// Writes a header and its records with a CSV writer of its own, which is flushed before returning.
fn write_block<W, R>(writer: &mut W, header: &[&str], records: R) -> NmResult<()>
where
    W: Write,
    R: IntoIterator<Item = Vec<String>>,
{
    let mut block = WriterBuilder::new()
        .flexible(true)
        .terminator(Terminator::CRLF)
        .from_writer(writer);
    block.write_record(header).map_err(export_error)?;
    for record in records {
        block.write_record(&record).map_err(export_error)?;
    }
    block.flush().map_err(io_error)
}
/// Empty records would be written as `""`, so the two blank lines go directly to the output.
fn write_separator<W: Write>(writer: &mut W) -> NmResult<()> {
    writer.write_all(b"\r\n\r\n").map_err(io_error)
}
#[cfg(test)]
mod test {
    use super::*;
    use crate::column::{Column, ColumnConfig};
    use assert_matches::assert_matches;
    use std::fs;

    fn sample_results() -> ColumnResults {
        let active = [true, false, true];
        let upper = (0..3_u32)
            .map(|i| UpperLensResult {
                name: format!("C{}", i + 1),
                focal_length: f64::from(i + 1),
                excitation: Some(f64::from(i + 4)),
                magnification: f64::from(i + 7),
                active: active[i as usize],
            })
            .collect();
        let lower = ["Objective", "Intermediate", "Projective"]
            .into_iter()
            .zip(0..3_u32)
            .map(|(name, i)| LowerLensResult {
                name: name.into(),
                focal_length: f64::from(i + 1),
                magnification: f64::from(i + 4),
                active: active[i as usize],
            })
            .collect();
        ColumnResults::new(upper, lower, 1.0, 2.0)
    }
    #[test]
    fn write_golden() {
        let mut output = Vec::new();
        sample_results().write_results(&mut output).unwrap();
        let golden = fs::read("files_for_testing/CSV/column_results.csv").unwrap();
        assert_eq!(output, golden);
    }
    #[test]
    fn save_golden() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.csv");
        sample_results().save_results(&path).unwrap();
        let golden = fs::read("files_for_testing/CSV/column_results.csv").unwrap();
        assert_eq!(fs::read(&path).unwrap(), golden);
    }
    #[test]
    fn save_invalid_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("output.csv");
        assert_matches!(
            sample_results().save_results(&path),
            Err(NanomiError::Export(_))
        );
    }
    #[test]
    fn from_report() {
        let column = Column::new(ColumnConfig::default()).unwrap();
        let report = column.analyze().unwrap();
        let results = ColumnResults::from(&report);
        assert_eq!(results.upper().len(), 3);
        assert_eq!(results.lower()[2].name, "Projective");
        assert_eq!(results.lower()[0].focal_length, 19.67);
        let mut output = Vec::new();
        results.write_results(&mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.split("\r\n").collect();
        assert_eq!(lines.len(), 15);
        assert!(lines[1].starts_with("C1,67.29,0.4515948261374"));
        assert!(lines[1].ends_with(",True"));
        assert_eq!(lines[4], "");
        assert_eq!(lines[5], "");
        assert_eq!(lines[6], "Lenses,Focal Length,Magnification,Active");
        assert!(lines[9].starts_with("Projective,6,-0.0951639710424"));
        assert!(lines[13].starts_with("0.01,6167.4584887"));
        assert_eq!(lines[14], "");
    }
    #[test]
    fn blocks_separated_by_blank_lines() {
        let mut output = Vec::new();
        sample_results().write_results(&mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert!(!text.contains("\"\""));
        assert_eq!(text.matches("\r\n\r\n\r\n").count(), 2);
        assert!(text.contains("C3,3,6,9,True\r\n\r\n\r\nLenses,"));
        assert!(text.contains("Projective,3,6,True\r\n\r\n\r\nCondensor"));
        assert!(text.ends_with("1,2\r\n"));
    }
    #[test]
    fn missing_excitation() {
        let results = ColumnResults::new(
            vec![UpperLensResult {
                name: "C1".into(),
                focal_length: 10.0,
                excitation: None,
                magnification: -0.5,
                active: true,
            }],
            vec![],
            0.01,
            1.0,
        );
        let mut output = Vec::new();
        results.write_results(&mut output).unwrap();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.split("\r\n").nth(1), Some("C1,10,,-0.5,True"));
    }
    #[test]
    fn display() {
        let text = format!("{}", sample_results());
        assert!(text.starts_with("lens"));
        assert!(text.contains("Intermediate"));
        assert!(text.ends_with("magnification on screen: 2.0000e0"));
    }
}
