//! # Decompression Planner Entry Point
//!
//! Command-line front end for the planning engine. It loads configuration
//! and tables, runs one command and prints either text or the JSON result
//! envelope.
//!
//! - `plan`: compute a plan from flags or a JSON parameter file
//! - `table-info`: list tabulated depths and bottom times
//! - `transition`: assess an observed SurDO₂ surface interval against a plan
//!
//! Logs go to stderr so JSON on stdout stays machine-readable.

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use deco_plan_lib::{
    calculate_dive_plan,
    config::{Config, OutputFormat},
    renderer,
    timeline::surdo2::{self, TransitionStatus},
    DivePlan, DivePlanParams, DivePlanResult, Modality, PlanError, Tables,
};
use serde::Serialize;
use std::{
    fs,
    io::{self, Read},
    path::PathBuf,
    process::ExitCode,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "deco-planner", version)]
#[command(about = "US Navy Rev.7 decompression planner")]
struct Cli {
    /// Configuration file (defaults to deco-config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print the JSON result envelope instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a decompression plan
    Plan(DiveArgs),
    /// List tabulated depths and bottom times
    TableInfo {
        /// Only rows carrying this modality's program
        #[arg(long)]
        mode: Option<Modality>,
    },
    /// Assess an observed SurDO₂ surface interval
    Transition {
        /// Seconds from leaving 12.2 m to reaching 15 m in the chamber
        #[arg(long)]
        elapsed: u32,
        /// Confirm the half-period extension of the first O₂ period
        #[arg(long)]
        extend: bool,
        #[command(flatten)]
        dive: DiveArgs,
    },
}

#[derive(Args, Debug)]
struct DiveArgs {
    /// JSON parameter file, or `-` for stdin; replaces the flags below
    #[arg(long)]
    params: Option<PathBuf>,

    /// air, water_o2 or surface_o2
    #[arg(long, default_value = "air")]
    mode: String,

    /// Real depth (m)
    #[arg(long)]
    depth: Option<f64>,

    /// Bottom time (min)
    #[arg(long)]
    bottom_time: Option<u32>,

    /// Dive site altitude (m)
    #[arg(long, default_value_t = 0.0)]
    altitude: f64,

    /// Depth gauge was zeroed at altitude
    #[arg(long)]
    recalibrated: bool,

    /// Group after the previous dive; marks this as a repetitive dive
    #[arg(long)]
    repetitive_group: Option<String>,

    /// Minutes since surfacing from the previous dive
    #[arg(long)]
    surface_interval: Option<u32>,

    /// Previous dive's bottom time (min)
    #[arg(long, default_value_t = 0)]
    previous_bottom_time: u32,

    /// Previous dive's depth (m)
    #[arg(long, default_value_t = 0.0)]
    previous_depth: f64,

    /// Arrived at altitude less than 12 hours ago
    #[arg(long)]
    altitude_less_than_12h: bool,

    /// Arrival time at altitude (RFC 3339)
    #[arg(long)]
    altitude_arrival: Option<DateTime<Utc>>,
}

impl DiveArgs {
    fn to_params(&self) -> anyhow::Result<DivePlanParams> {
        if let Some(path) = &self.params {
            let raw = if path.as_os_str() == "-" {
                let mut raw = String::new();
                io::stdin()
                    .read_to_string(&mut raw)
                    .context("reading parameters from stdin")?;
                raw
            } else {
                fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?
            };
            return serde_json::from_str(&raw).context("parsing dive parameters");
        }

        let (Some(depth), Some(bottom_time)) = (self.depth, self.bottom_time) else {
            bail!("--depth and --bottom-time are required unless --params is given");
        };
        Ok(DivePlanParams {
            mode: self.mode.clone(),
            depth,
            bottom_time,
            altitude: self.altitude,
            recalibrated: self.recalibrated,
            is_repetitive: self.repetitive_group.is_some(),
            repetitive_group: self.repetitive_group.clone(),
            surface_interval: self.surface_interval,
            is_altitude_less_than_12h: self.altitude_less_than_12h,
            altitude_arrival_time: self.altitude_arrival,
            reference_time: None,
            previous_bottom_time: self.previous_bottom_time,
            previous_depth: self.previous_depth,
        })
    }
}

#[derive(Serialize)]
struct TransitionReport {
    elapsed_secs: u32,
    status: TransitionStatus,
    #[serde(flatten)]
    result: DivePlanResult,
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print a plan outcome; the exit code reflects success.
fn report(outcome: Result<DivePlan, PlanError>, json: bool) -> anyhow::Result<ExitCode> {
    let success = outcome.is_ok();
    if json {
        print_json(&DivePlanResult::from(outcome))?;
    } else {
        match outcome {
            Ok(plan) => renderer::draw_ascii(&plan),
            Err(error) => eprint!("{}", renderer::render_failure(&error)),
        }
    }
    Ok(if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Main application entry point.
fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    };
    let json = cli.json || config.output.format == OutputFormat::Json;
    let tables =
        Tables::load(config.tables.dir.as_deref()).context("loading decompression tables")?;
    let settings = &config.engine;

    match &cli.command {
        Command::Plan(dive) => {
            let params = dive.to_params()?;
            debug!(?params, "planning dive");
            report(calculate_dive_plan(&tables, settings, &params), json)
        }

        Command::TableInfo { mode } => {
            if json {
                let depths: Vec<_> = tables
                    .available_depths(*mode)
                    .into_iter()
                    .map(|depth| {
                        serde_json::json!({
                            "depth": depth,
                            "bottom_times": tables.available_times(depth, *mode),
                        })
                    })
                    .collect();
                print_json(&depths)?;
            } else {
                print!("{}", renderer::render_table_info(&tables, *mode));
            }
            Ok(ExitCode::SUCCESS)
        }

        Command::Transition {
            elapsed,
            extend,
            dive,
        } => {
            let params = dive.to_params()?;
            let status = TransitionStatus::from_elapsed(*elapsed, settings);

            let outcome = calculate_dive_plan(&tables, settings, &params).and_then(|mut plan| {
                match surdo2::check_transition(*elapsed, settings) {
                    Err(PlanError::TransitionWarning { .. }) if *extend => {
                        plan.extend_first_period(settings)?;
                        Ok(plan)
                    }
                    Err(error @ PlanError::TransitionExceeded { .. }) => Err(error),
                    _ => Ok(plan),
                }
            });
            if json {
                let failed = outcome.is_err();
                print_json(&TransitionReport {
                    elapsed_secs: *elapsed,
                    status,
                    result: DivePlanResult::from(outcome),
                })?;
                return Ok(if failed {
                    ExitCode::FAILURE
                } else {
                    ExitCode::SUCCESS
                });
            }

            println!("{}", renderer::render_transition(*elapsed, status));
            if status == TransitionStatus::ExtendFirstPeriod && !*extend {
                println!("Re-run with --extend to apply the extension.\n");
            }
            report(outcome, false)
        }
    }
}
