use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use sheetpack_core::{Package, Profile, export, import};
use std::path::{Path, PathBuf};

mod formatter;
mod logger;
mod records;

#[derive(Parser)]
#[command(name = "sheetpack")]
#[command(about = "Read tables from and write records into spreadsheet templates", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the sheets declared in a workbook
    Sheets {
        /// Path to the workbook
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Read records from a worksheet using the profile's [import] section
    Import {
        /// Path to the workbook
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Path to the profile (TOML)
        #[arg(short, long, value_name = "PROFILE")]
        profile: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "human")]
        format: OutputFormat,
    },

    /// Write records into a template using the profile's [export] section
    Export {
        /// Path to the template workbook (never modified)
        #[arg(value_name = "TEMPLATE")]
        template: PathBuf,

        /// Path to the profile (TOML)
        #[arg(short, long, value_name = "PROFILE")]
        profile: PathBuf,

        /// JSON file with one record object or an array of them
        #[arg(short, long, value_name = "RECORDS")]
        records: PathBuf,

        /// Output file (required unless --dry-run)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Clone the template sheet once per record
        #[arg(long)]
        per_record_sheets: bool,

        /// Fill the template in memory and report without writing a file
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Human-readable colored output
    Human,
    /// JSON output
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logger::init(cli.verbose)?;

    match cli.command {
        Command::Sheets { file, format } => run_sheets(&file, format),
        Command::Import {
            file,
            profile,
            format,
        } => run_import(&file, &profile, format),
        Command::Export {
            template,
            profile,
            records,
            output,
            per_record_sheets,
            dry_run,
        } => run_export(
            &template,
            &profile,
            &records,
            output.as_deref(),
            per_record_sheets,
            dry_run,
        ),
    }
}

fn run_sheets(file: &Path, format: OutputFormat) -> Result<()> {
    let mut package = Package::open(file)
        .with_context(|| format!("Failed to open workbook: {}", file.display()))?;
    let sheets = package
        .sheets()
        .with_context(|| format!("Failed to list sheets of {}", file.display()))?;
    match format {
        OutputFormat::Human => formatter::print_sheets_human(file, &sheets),
        OutputFormat::Json => formatter::print_sheets_json(file, &sheets)?,
    }
    Ok(())
}

fn run_import(file: &Path, profile_path: &Path, format: OutputFormat) -> Result<()> {
    let profile = Profile::from_file(profile_path)?;
    let import_profile = profile
        .import
        .with_context(|| format!("Profile {} has no [import] section", profile_path.display()))?;

    let outcome = import::import_table(file, &import_profile)
        .with_context(|| format!("Failed to import from {}", file.display()))?;

    match format {
        OutputFormat::Human => formatter::print_import_human(file, &outcome),
        OutputFormat::Json => formatter::print_import_json(file, &outcome)?,
    }
    Ok(())
}

fn run_export(
    template: &Path,
    profile_path: &Path,
    records_path: &Path,
    output: Option<&Path>,
    per_record_sheets: bool,
    dry_run: bool,
) -> Result<()> {
    let profile = Profile::from_file(profile_path)?;
    let export_profile = profile
        .export
        .with_context(|| format!("Profile {} has no [export] section", profile_path.display()))?;
    let records = records::from_file(records_path)?;

    if !per_record_sheets && records.len() != 1 {
        anyhow::bail!(
            "Expected exactly one record without --per-record-sheets, found {}",
            records.len()
        );
    }

    let report = if dry_run {
        let mut package = Package::open(template)
            .with_context(|| format!("Failed to open template: {}", template.display()))?;
        if per_record_sheets {
            export::fill_per_record_sheets(&mut package, &records, &export_profile, None)?
        } else {
            export::fill_template(&mut package, &records[0], &export_profile)?
        }
    } else {
        // Enforce output file when writing
        let Some(output) = output else {
            anyhow::bail!("Output file is required for export. Use --output <FILE>.");
        };
        let result = if per_record_sheets {
            export::export_records(template, output, &records, &export_profile, None)
        } else {
            export::export_record(template, output, &records[0], &export_profile)
        };
        result.with_context(|| format!("Failed to export into {}", output.display()))?
    };

    formatter::print_export_human(template, if dry_run { None } else { output }, &report);
    Ok(())
}
