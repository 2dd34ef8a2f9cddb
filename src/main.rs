use clap::Parser;
use env_logger::Env;
use nanomi_optics::{
    column::{Column, ColumnConfig},
    console::{show_intro, Args, PartialArgs},
    error::NmResult,
    plottable::{Plottable, RayDiagram},
    reporter::ColumnResults,
};

fn read_column(args: &Args) -> NmResult<ColumnConfig> {
    let mut config = match &args.config {
        Some(path) => {
            println!("Reading column description {}...", path.display());
            ColumnConfig::from_file(path)?
        }
        None => ColumnConfig::default(),
    };
    if args.auto_focus.is_some() {
        config.auto_focus = args.auto_focus;
    }
    Ok(config)
}

fn main() -> NmResult<()> {
    env_logger::init_from_env(Env::default().default_filter_or("info"));
    //parse CLI arguments
    let args = Args::try_from(PartialArgs::parse())?;
    show_intro();

    //trace the column
    let column = Column::new(read_column(&args)?)?;
    let report = column.analyze()?;
    let results = ColumnResults::from(&report);
    println!("{results}");

    if let Some(path) = &args.csv_file {
        results.save_results(path)?;
    }
    if let Some(path) = &args.svg_file {
        RayDiagram::new(&report).to_plot(path)?;
    }
    Ok(())
}
