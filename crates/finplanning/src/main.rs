use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::WrapErr;
use finplanning_core::export::{header_labels_for_plan, rows_for_tabular_output, write_csv};
use finplanning_core::model::{ReturnMethod, ScenarioId};
use finplanning_core::monte_carlo::{DEFAULT_ITERATIONS, DEFAULT_SEED, MonteCarloConfig};
use finplanning_core::projection::ProjectionOptions;
use finplanning_core::{PlanningService, TaxCalculator};

mod format;
mod logging;
mod report;

use logging::init_logging;

#[derive(Parser, Debug)]
#[command(name = "finplanning")]
#[command(about = "Household retirement projections, Monte Carlo runs and tax estimates")]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Plan file, scenario and year range shared by the simulation commands
#[derive(clap::Args, Debug)]
struct PlanArgs {
    /// Household plan (YAML)
    plan: PathBuf,

    /// Scenario id; defaults to the plan's base scenario
    #[arg(short, long)]
    scenario: Option<String>,

    /// First projected year; defaults to the current year
    #[arg(long)]
    start: Option<i16>,

    /// Last projected year; defaults to the longest life expectancy
    #[arg(long)]
    end: Option<i16>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Deterministic projection with mean returns
    Project {
        #[command(flatten)]
        plan: PlanArgs,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Write output here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the sustainable spending search
        #[arg(long)]
        no_solve: bool,
    },
    /// Monte Carlo simulation over randomized returns
    MonteCarlo {
        #[command(flatten)]
        plan: PlanArgs,

        #[arg(short = 'n', long, default_value_t = DEFAULT_ITERATIONS)]
        iterations: usize,

        /// RNG seed; 0 draws a fresh one
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// historical or parametric
        #[arg(short, long, default_value_t = ReturnMethod::Historical)]
        method: ReturnMethod,

        /// Keep raw net-worth paths in JSON output
        #[arg(long)]
        sample_paths: bool,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the scenarios defined in a plan
    Scenarios {
        /// Household plan (YAML)
        plan: PathBuf,
    },
    /// Income tax for one filer
    Tax {
        #[arg(short, long)]
        income: f64,

        #[arg(short, long)]
        year: i16,

        /// Two-letter province code
        #[arg(short, long, default_value = "ON")]
        province: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

fn load(path: &Path) -> color_eyre::Result<PlanningService> {
    PlanningService::from_yaml(path).wrap_err_with(|| format!("loading {}", path.display()))
}

fn resolve(service: &PlanningService, args: &PlanArgs) -> (ScenarioId, i16, i16) {
    let scenario = args
        .scenario
        .as_deref()
        .map_or_else(|| service.base_scenario(), ScenarioId::new);
    let (default_start, default_end) = service.default_year_range();
    let start = args.start.unwrap_or(default_start);
    let end = args.end.unwrap_or(default_end.max(start));
    (scenario, start, end)
}

fn output_writer(path: Option<&Path>) -> color_eyre::Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).wrap_err_with(|| format!("creating {}", path.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn project(
    args: &PlanArgs,
    format: OutputFormat,
    output: Option<&Path>,
    no_solve: bool,
) -> color_eyre::Result<()> {
    let service = load(&args.plan)?;
    let (scenario, start, end) = resolve(&service, args);
    let options = ProjectionOptions {
        solve_sustainable_spending: !no_solve,
        cancel: None,
    };
    let result = service
        .run_projection_with(&scenario, start, end, &options)
        .wrap_err_with(|| format!("projecting scenario {scenario}"))?;

    let mut out = output_writer(output)?;
    match format {
        OutputFormat::Table => out.write_all(report::projection_report(&result).as_bytes())?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut out, &result)?;
            writeln!(out)?;
        }
        OutputFormat::Csv => {
            let plan = service.plan().resolve_scenario(&scenario)?;
            write_csv(
                &mut out,
                &header_labels_for_plan(&plan),
                &rows_for_tabular_output(&result, &plan),
            )?;
        }
    }
    out.flush()?;
    Ok(())
}

fn monte_carlo(args: &PlanArgs, config: MonteCarloConfig, json: bool) -> color_eyre::Result<()> {
    let service = load(&args.plan)?;
    let (scenario, start, end) = resolve(&service, args);

    let mut show_progress = |fraction: f64| {
        eprint!("\rSimulating... {:>3.0}%", fraction * 100.0);
        if fraction >= 1.0 {
            eprintln!();
        }
    };
    let result = service
        .run_monte_carlo(&scenario, start, end, &config, Some(&mut show_progress))
        .wrap_err_with(|| format!("simulating scenario {scenario}"))?;

    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &result)?;
        writeln!(out)?;
    } else {
        out.write_all(report::monte_carlo_report(&result).as_bytes())?;
    }
    Ok(())
}

fn list_scenarios(path: &Path) -> color_eyre::Result<()> {
    let service = load(path)?;
    let base = service.base_scenario();
    for id in service.scenario_ids() {
        let marker = if id == base { " (base)" } else { "" };
        println!("{id}{marker}");
    }
    Ok(())
}

fn tax(income: f64, year: i16, province: &str) -> color_eyre::Result<()> {
    let result = TaxCalculator::default()
        .calculate_tax_for_code(income, year, province)
        .wrap_err("calculating tax")?;
    print!("{}", report::tax_report(income, year, province, &result));
    Ok(())
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    init_logging(args.log_file.as_deref(), &args.log_level)?;

    match &args.command {
        Command::Project {
            plan,
            format,
            output,
            no_solve,
        } => project(plan, *format, output.as_deref(), *no_solve),
        Command::MonteCarlo {
            plan,
            iterations,
            seed,
            method,
            sample_paths,
            json,
        } => {
            let config = MonteCarloConfig {
                n_iterations: *iterations,
                seed: Some(*seed),
                return_method: *method,
                keep_sample_paths: *sample_paths,
                cancel: None,
            };
            monte_carlo(plan, config, *json)
        }
        Command::Scenarios { plan } => list_scenarios(plan),
        Command::Tax {
            income,
            year,
            province,
        } => tax(*income, *year, province),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_monte_carlo_args() {
        let args = Args::parse_from([
            "finplanning",
            "monte-carlo",
            "plan.yaml",
            "-n",
            "250",
            "--method",
            "parametric",
            "--seed",
            "9",
            "--start",
            "2026",
        ]);
        let Command::MonteCarlo {
            plan,
            iterations,
            seed,
            method,
            ..
        } = args.command
        else {
            panic!("expected monte-carlo");
        };
        assert_eq!(plan.plan, PathBuf::from("plan.yaml"));
        assert_eq!(plan.start, Some(2026));
        assert_eq!(iterations, 250);
        assert_eq!(seed, 9);
        assert_eq!(method, ReturnMethod::Parametric);
    }

    #[test]
    fn test_parse_project_defaults() {
        let args = Args::parse_from([
            "finplanning",
            "project",
            "plan.yaml",
            "--log-level",
            "debug",
        ]);
        assert_eq!(args.log_level, "debug");
        let Command::Project { format, no_solve, .. } = args.command else {
            panic!("expected project");
        };
        assert_eq!(format, OutputFormat::Table);
        assert!(!no_solve);
    }
}
