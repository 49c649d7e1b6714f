use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use serde::Deserialize;

use checkup_bia::{
    CoefficientDataset, CoefficientTable, CompositeReport, EquationSet, Fitness, MeasurementInput,
    Standard, build_reports,
};

/// Body composition estimates from segmental impedance measurements.
#[derive(Parser, Debug)]
#[command(name = "checkup-bia")]
#[command(about = "Body composition from bioelectrical impedance measurements")]
#[command(version)]
struct Args {
    /// JSON file with one measurement object or an array of them.
    /// Can also be set via BIA_INPUT environment variable.
    #[arg(value_name = "FILE", env = "BIA_INPUT")]
    input: PathBuf,

    /// Built-in orthostatic correction table (checkup or akern).
    #[arg(long, env = "BIA_DATASET", default_value = "checkup")]
    dataset: CoefficientDataset,

    /// Custom correction table in JSON; overrides --dataset.
    #[arg(long, value_name = "FILE", env = "BIA_COEFFICIENTS")]
    coefficients: Option<PathBuf>,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum InputDocument {
    Many(Vec<MeasurementInput>),
    One(Box<MeasurementInput>),
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let args = Args::parse();

    let table = match &args.coefficients {
        Some(path) => CoefficientTable::from_json_path(path)
            .with_context(|| format!("Failed to load coefficients from {}", path.display()))?,
        None => CoefficientTable::builtin(args.dataset),
    };
    let table = Arc::new(table);
    log::info!("Using correction table '{}'", table.name());

    let inputs = load_inputs(&args.input)?;
    let measurements = inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            input
                .into_measurement(Arc::clone(&table))
                .with_context(|| format!("Invalid measurement #{}", i + 1))
        })
        .collect::<Result<Vec<_>>>()?;

    let sets: [&dyn EquationSet; 2] = [&Fitness, &Standard];
    let reports = build_reports(&measurements, &sets)
        .into_iter()
        .enumerate()
        .map(|(i, report)| report.with_context(|| format!("Failed to evaluate measurement #{}", i + 1)))
        .collect::<Result<Vec<CompositeReport>>>()?;

    match args.format {
        OutputFormat::Json => {
            let exports: Vec<_> = reports.iter().map(CompositeReport::to_export).collect();
            let json = if exports.len() == 1 {
                serde_json::to_string_pretty(&exports[0])?
            } else {
                serde_json::to_string_pretty(&exports)?
            };
            println!("{}", json);
        }
        OutputFormat::Text => {
            for (i, report) in reports.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print!("{}", report.render_text());
            }
        }
    }

    Ok(())
}

/// Reads measurement inputs from a JSON file.
fn load_inputs(path: &Path) -> Result<Vec<MeasurementInput>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let document: InputDocument = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse measurements in {}", path.display()))?;

    let inputs = match document {
        InputDocument::Many(inputs) => inputs,
        InputDocument::One(input) => vec![*input],
    };
    if inputs.is_empty() {
        bail!("No measurements in {}", path.display());
    }
    Ok(inputs)
}
