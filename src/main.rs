//! Command-line front end: Banana export in, audit report PDF out.

use clap::Parser;
use ledgerdoc::{AccountingMode, FontSet, FontSource, Report, ReportError, banana};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "ledgerdoc")]
#[command(
    version,
    about = "Print journal entries next to the source documents they cite"
)]
struct Args {
    /// Banana Accounting XML export (AC2)
    #[arg(short, long)]
    input: PathBuf,

    /// Report PDF to write
    #[arg(short, long)]
    output: PathBuf,

    /// Use the income/expense column layout
    #[arg(long)]
    cash_basis: bool,

    /// Outline every table cell
    #[arg(long)]
    debug_cells: bool,

    /// Color every rule by its role
    #[arg(long)]
    debug_lines: bool,

    /// Abort on the first source document that cannot be embedded
    #[arg(long)]
    step_embed_error: bool,

    /// TrueType font for regular text
    #[arg(long, requires_all = ["font_italic", "font_bold"])]
    font_regular: Option<PathBuf>,

    /// TrueType font for italic text
    #[arg(long, requires_all = ["font_regular", "font_bold"])]
    font_italic: Option<PathBuf>,

    /// TrueType font for bold text
    #[arg(long, requires_all = ["font_regular", "font_italic"])]
    font_bold: Option<PathBuf>,
}

fn main() -> ExitCode {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "report generation failed");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<(), ReportError> {
    let fonts = match (&args.font_regular, &args.font_italic, &args.font_bold) {
        (Some(regular), Some(italic), Some(bold)) => FontSet {
            regular: FontSource::from_path(regular)?,
            italic: FontSource::from_path(italic)?,
            bold: FontSource::from_path(bold)?,
        },
        _ => FontSet::helvetica(),
    };
    let mode = if args.cash_basis {
        AccountingMode::CashBasis
    } else {
        AccountingMode::Accrual
    };

    let report = Report::builder()
        .accounting_mode(mode)
        .debug_cells(args.debug_cells)
        .debug_lines(args.debug_lines)
        .stop_on_embed_error(args.step_embed_error)
        .fonts(fonts)
        .build()?;

    let dossier = banana::dossier_from_path(&args.input)?;
    let summary = report.render_to_file(&dossier, &args.output)?;
    tracing::info!(
        output = %args.output.display(),
        pages = summary.pages,
        failures = summary.failures.len(),
        "done"
    );
    Ok(())
}
