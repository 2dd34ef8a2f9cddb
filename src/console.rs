//! Handling the NanoMi optics CLI
//!
//! This module handles the command line parsing as well as basic information (e.g. help dialog, version information, etc.).
use crate::{
    column::AutoFocus,
    error::{NanomiError, NmResult},
    optimizer::OptimizationMode,
};
use clap::Parser;
use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

/// Command line arguments for the NanoMi optics application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    /// file path of the column description. `None` selects the NanoMi column
    pub config: Option<PathBuf>,
    /// lower lens to be focused automatically (overrides the column description)
    pub auto_focus: Option<AutoFocus>,
    /// destination of the CSV results
    pub csv_file: Option<PathBuf>,
    /// destination of the SVG ray diagram
    pub svg_file: Option<PathBuf>,
}

/// Raw command line arguments as parsed by clap, validated into [`Args`].
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct PartialArgs {
    /// column description file (.yaml, .yml or .json). if not defined, the NanoMi column is analyzed
    #[arg(short, long)]
    config: Option<String>,

    /// index of the lower lens whose focal length should be optimized
    #[arg(short, long)]
    optimize: Option<String>,

    /// optimization mode: image or diffraction (default: image)
    #[arg(short, long)]
    mode: Option<String>,

    /// file path of the CSV results
    #[arg(long)]
    csv: Option<String>,

    /// file path of the SVG ray diagram
    #[arg(long)]
    svg: Option<String>,
}

/// Checks if the passed file path points to an existing column description.
fn config_path_is_valid(path: &Path) -> bool {
    path.is_file()
        && matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml" | "yml" | "json")
        )
}

fn eval_config_input(config_input: &str) -> Option<PathBuf> {
    let path = PathBuf::from(config_input);
    config_path_is_valid(&path).then_some(path)
}

fn eval_lens_input(lens_input: &str) -> Option<usize> {
    lens_input.trim().parse().ok()
}

fn eval_mode_input(mode_input: &str) -> Option<OptimizationMode> {
    OptimizationMode::from_str(mode_input.trim()).ok()
}

/// Accepts an output file whose directory exists.
fn eval_output_input(output_input: &str) -> Option<PathBuf> {
    let path = PathBuf::from(output_input);
    if path.file_name().is_none() {
        return None;
    }
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.is_dir() => None,
        _ => Some(path),
    }
}

fn eval_optional<T>(
    input: Option<&str>,
    eval: fn(&str) -> Option<T>,
    description: &str,
) -> NmResult<Option<T>> {
    match input {
        Some(s) => match eval(s) {
            Some(value) => Ok(Some(value)),
            None => Err(NanomiError::Console(format!("invalid {description}: {s}"))),
        },
        None => Ok(None),
    }
}

impl TryFrom<PartialArgs> for Args {
    type Error = NanomiError;

    fn try_from(part_args: PartialArgs) -> NmResult<Self> {
        let config = eval_optional(
            part_args.config.as_deref(),
            eval_config_input,
            "column description file",
        )?;
        let lens = eval_optional(part_args.optimize.as_deref(), eval_lens_input, "lens index")?;
        let mode = eval_optional(
            part_args.mode.as_deref(),
            eval_mode_input,
            "optimization mode",
        )?;
        let auto_focus = match (lens, mode) {
            (Some(lens), mode) => Some(AutoFocus {
                lens,
                mode: mode.unwrap_or_default(),
            }),
            (None, Some(_)) => {
                return Err(NanomiError::Console(
                    "an optimization mode needs a lens to optimize".into(),
                ))
            }
            (None, None) => None,
        };
        let csv_file = eval_optional(part_args.csv.as_deref(), eval_output_input, "CSV file path")?;
        let svg_file = eval_optional(part_args.svg.as_deref(), eval_output_input, "SVG file path")?;
        Ok(Self {
            config,
            auto_focus,
            csv_file,
            svg_file,
        })
    }
}

/// Creates the intro banner.
#[must_use]
fn create_intro() -> String {
    let title = "NanoMi optics - paraxial ray-transfer analysis of the NanoMi electron column";
    let rule = "=".repeat(title.len());
    format!(
        "{rule}\n{title}\n{: ^width$}\n{rule}\n",
        format!("version {}", env!("CARGO_PKG_VERSION")),
        width = title.len()
    )
}

/// Prints the intro banner including the version information to the console.
pub fn show_intro() {
    println!("{}", create_intro());
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;

    const CONFIG_PATH: &str = "./files_for_testing/CLI/column.yaml";

    fn part_args(
        config: Option<&str>,
        optimize: Option<&str>,
        mode: Option<&str>,
    ) -> PartialArgs {
        PartialArgs {
            config: config.map(str::to_owned),
            optimize: optimize.map(str::to_owned),
            mode: mode.map(str::to_owned),
            csv: None,
            svg: None,
        }
    }
    #[test]
    fn config_path_is_valid_test() {
        assert!(config_path_is_valid(Path::new(CONFIG_PATH)));
        assert!(!config_path_is_valid(Path::new(
            "./files_for_testing/CSV/column_results.csv"
        )));
        assert!(!config_path_is_valid(Path::new("./files_for_testing/CLI/")));
        assert!(!config_path_is_valid(Path::new("./missing.yaml")));
    }
    #[test]
    fn eval_inputs_test() {
        assert_eq!(
            eval_config_input(CONFIG_PATH),
            Some(PathBuf::from(CONFIG_PATH))
        );
        assert_eq!(eval_lens_input(" 2 "), Some(2));
        assert_eq!(eval_lens_input("-1"), None);
        assert_eq!(eval_lens_input("objective"), None);
        assert_eq!(eval_mode_input("Image"), Some(OptimizationMode::Image));
        assert_eq!(
            eval_mode_input("diffraction"),
            Some(OptimizationMode::Diffraction)
        );
        assert_eq!(eval_mode_input("focus"), None);
        assert_eq!(
            eval_output_input("results.csv"),
            Some(PathBuf::from("results.csv"))
        );
        assert_eq!(
            eval_output_input("./files_for_testing/out.svg"),
            Some(PathBuf::from("./files_for_testing/out.svg"))
        );
        assert_eq!(eval_output_input("./missing_dir/out.svg"), None);
        assert_eq!(eval_output_input(".."), None);
    }
    #[test]
    fn try_from_args_test() {
        let args = Args::try_from(part_args(None, None, None)).unwrap();
        assert_eq!(
            args,
            Args {
                config: None,
                auto_focus: None,
                csv_file: None,
                svg_file: None
            }
        );
        let args = Args::try_from(part_args(Some(CONFIG_PATH), Some("1"), None)).unwrap();
        assert_eq!(args.config, Some(PathBuf::from(CONFIG_PATH)));
        assert_eq!(
            args.auto_focus,
            Some(AutoFocus {
                lens: 1,
                mode: OptimizationMode::Image
            })
        );
        let args = Args::try_from(part_args(None, Some("2"), Some("diffraction"))).unwrap();
        assert_eq!(args.auto_focus.unwrap().mode, OptimizationMode::Diffraction);
    }
    #[test]
    fn try_from_args_invalid() {
        assert_matches!(
            Args::try_from(part_args(Some("./missing.yaml"), None, None)),
            Err(NanomiError::Console(_))
        );
        assert_matches!(
            Args::try_from(part_args(None, Some("first"), None)),
            Err(NanomiError::Console(_))
        );
        assert_matches!(
            Args::try_from(part_args(None, Some("0"), Some("focus"))),
            Err(NanomiError::Console(_))
        );
        assert_matches!(
            Args::try_from(part_args(None, None, Some("image"))),
            Err(NanomiError::Console(_))
        );
        let mut args = part_args(None, None, None);
        args.csv = Some("./missing_dir/results.csv".into());
        assert_matches!(Args::try_from(args), Err(NanomiError::Console(_)));
    }
    #[test]
    fn intro_test() {
        let intro = create_intro();
        assert!(intro.contains("NanoMi optics"));
        assert!(
            intro.contains(&format!("version {}", env!("CARGO_PKG_VERSION")))
        );
        assert_eq!(intro.lines().count(), 4);
    }
    #[test]
    fn parser_test() {
        let arg_vec = vec![
            "nanomi-optics",
            "-c",
            CONFIG_PATH,
            "-o",
            "0",
            "-m",
            "diffraction",
            "--csv",
            "results.csv",
            "--svg",
            "diagram.svg",
        ];
        let part_args = PartialArgs::parse_from(arg_vec);
        assert_eq!(part_args.config.unwrap(), CONFIG_PATH);
        assert_eq!(part_args.optimize.unwrap(), "0");
        assert_eq!(part_args.mode.unwrap(), "diffraction");
        assert_eq!(part_args.csv.unwrap(), "results.csv");
        assert_eq!(part_args.svg.unwrap(), "diagram.svg");
    }
}
