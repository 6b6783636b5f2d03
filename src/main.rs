use clap::{Parser, Subcommand};
use series_forge::cli;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "series-forge")]
#[command(about = "Turn spreadsheet formula columns into generic, re-runnable series formulas.")]
#[command(long_about = "Series Forge - spreadsheet to series converter

Finds the tables of every sheet, slices them into series (one per header),
infers a single generic formula per series from its first two rows, and
re-evaluates those formulas in dependency order.

COMMANDS:
  convert   - Convert a workbook and write the series workbook
  inspect   - Show tables, series, generic formulas and evaluation order
  check     - Compare two workbooks cell by cell

EXAMPLES:
  series-forge convert model.xlsx -o model.series.xlsx
  series-forge convert model.xlsx --values-only --report report.json
  series-forge inspect model.xlsx -v
  series-forge check model.xlsx model.series.xlsx --tolerance 0.001

Set RUST_LOG=debug for per-series logging.")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Convert a workbook into series form.

Every series whose first two data cells carry formulas of the same shape is
replaced by one generic formula, written back as one formula per row.
Series whose sample formulas differ in shape keep their original cells.

With --reference, the header sets of both workbooks must match before any
conversion starts.")]
    /// Convert a workbook into series form
    Convert {
        /// Path to the .xlsx workbook
        input: PathBuf,

        /// Output .xlsx path (default: <input>.series.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write computed values instead of formulas
        #[arg(long)]
        values_only: bool,

        /// Workbook variant whose headers must match the input
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Skip evaluation of the generic formulas
        #[arg(long)]
        no_eval: bool,

        /// Write a JSON report of the conversion
        #[arg(long)]
        report: Option<PathBuf>,

        /// YAML conversion settings
        #[arg(short, long, env = "SERIES_FORGE_CONFIG")]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show tables, series and generic formulas of a workbook
    Inspect {
        /// Path to the .xlsx workbook
        input: PathBuf,

        /// YAML conversion settings
        #[arg(short, long, env = "SERIES_FORGE_CONFIG")]
        config: Option<PathBuf>,

        /// Also print computed values
        #[arg(short, long)]
        verbose: bool,
    },

    #[command(long_about = "Compare two workbooks cell by cell.

Numbers must agree within the tolerance, everything else exactly.
Exits with an error when any cell differs.")]
    /// Compare two workbooks cell by cell
    Check {
        /// First workbook
        left: PathBuf,

        /// Second workbook
        right: PathBuf,

        /// Numeric tolerance
        #[arg(long, default_value = "0.0001")]
        tolerance: f64,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            output,
            values_only,
            reference,
            no_eval,
            report,
            config,
            verbose,
        } => {
            init_tracing(verbose);
            cli::convert(input, output, values_only, reference, no_eval, report, config, verbose)
        }

        Commands::Inspect {
            input,
            config,
            verbose,
        } => {
            init_tracing(verbose);
            cli::inspect(input, config, verbose)
        }

        Commands::Check {
            left,
            right,
            tolerance,
        } => {
            init_tracing(false);
            cli::check(left, right, tolerance)
        }
    };

    result?;
    Ok(())
}
