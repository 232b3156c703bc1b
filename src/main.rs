use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use stride_lib::{replay, SettingsStore, TrackerSettings, Unit};

#[derive(Parser)]
#[command(name = "stride", version, about = "Replay recorded runs through the tracking engine")]
struct Cli {
    /// JSON settings file; defaults apply when absent
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a JSON-lines trace and print the finished run
    Replay {
        trace: PathBuf,

        #[arg(long, value_enum)]
        unit: Option<UnitArg>,

        /// Print the full summary as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum UnitArg {
    Km,
    Mi,
}

impl From<UnitArg> for Unit {
    fn from(value: UnitArg) -> Self {
        match value {
            UnitArg::Km => Unit::Kilometers,
            UnitArg::Mi => Unit::Miles,
        }
    }
}

fn main() -> Result<()> {
    stride_lib::init_logging();
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => SettingsStore::new(path.clone())?.current(),
        None => TrackerSettings::default(),
    };

    match cli.command {
        Command::Replay { trace, unit, json } => {
            let requested = unit.map(Unit::from);
            if let Some(unit) = requested {
                settings.unit = unit;
            }
            let report = replay::run_file(&trace, &settings)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                let summary = &report.summary;
                let unit = report.display_unit(requested);
                let secs = summary.elapsed.as_secs();
                println!("run        {}", summary.id);
                println!("distance   {:.2} {}", summary.distance(unit), unit);
                println!("elapsed    {}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60);
                println!("avg pace   {} /{}", summary.average_pace_in(unit), unit);
                println!(
                    "fixes      {} kept, {} filtered, {} dropped",
                    summary.path.len(),
                    report.rejected,
                    report.dropped
                );
            }
        }
    }

    Ok(())
}
