use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use localiser_core::{
    run_dump, run_listing_export, run_listing_patch, run_patch, BatchReport, LocaliserSettings,
};

#[derive(Debug, Parser)]
#[command(name = "silent-localiser", version, about = "Overlay text localisation tool")]
struct Args {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Load settings from a JSON file; command-line paths override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Export font widths, inventory and map messages as JSON records
    Dump {
        /// Disc image to read
        #[arg(long)]
        disc: Option<PathBuf>,

        #[arg(long, default_value = "dump")]
        dump_dir: PathBuf,
    },

    /// Apply edited JSON records and write a patched disc image
    Patch {
        /// Disc image to read
        #[arg(long)]
        disc: Option<PathBuf>,

        /// Where to write the patched image
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "dump")]
        dump_dir: PathBuf,

        /// Maximum rendered line width in pixels
        #[arg(long)]
        width_budget: Option<u32>,

        #[arg(long, default_value_t = false)]
        skip_width_check: bool,
    },

    /// Write <listing>.tr.txt for each .asciz listing
    ListingExport {
        #[arg(required = true)]
        listings: Vec<PathBuf>,
    },

    /// Patch translations from <listing>.tr.txt files into a disc image
    ListingPatch {
        /// Disc image to read
        #[arg(long)]
        disc: Option<PathBuf>,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Directory holding font_info.json for width checks
        #[arg(long, default_value = "dump")]
        dump_dir: PathBuf,

        #[arg(long, default_value_t = false)]
        skip_width_check: bool,

        #[arg(required = true)]
        listings: Vec<PathBuf>,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        _ => Level::DEBUG,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn settings_for(
    config: Option<&PathBuf>,
    disc: Option<PathBuf>,
    dump_dir: PathBuf,
) -> Result<LocaliserSettings, String> {
    let Some(path) = config else {
        let disc = disc.ok_or("a disc image path is required")?;
        return Ok(LocaliserSettings::new(disc, dump_dir));
    };

    let mut settings = LocaliserSettings::from_file(path).map_err(|e| e.to_string())?;
    if let Some(disc) = disc {
        settings.disc_path = disc;
    }
    if dump_dir != Path::new("dump") {
        settings.dump_dir = dump_dir;
    }
    Ok(settings)
}

fn print_report(report: &BatchReport) {
    println!(
        "{} succeeded, {} skipped, {} failed",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    for (name, err) in &report.failed {
        println!("  {name}: {err}");
    }
}

fn run(args: Args) -> Result<BatchReport, String> {
    let config = args.config.as_ref();
    match args.command {
        Command::Dump { disc, dump_dir } => {
            let settings = settings_for(config, disc, dump_dir)?;
            run_dump(&settings).map_err(|e| e.to_string())
        }
        Command::Patch {
            disc,
            output,
            dump_dir,
            width_budget,
            skip_width_check,
        } => {
            let mut settings = settings_for(config, disc, dump_dir)?;
            if output.is_some() {
                settings.output_path = output;
            }
            if let Some(budget) = width_budget {
                settings.screen_width_budget = budget;
            }
            settings.skip_width_check |= skip_width_check;
            run_patch(&settings).map_err(|e| e.to_string())
        }
        Command::ListingExport { listings } => {
            run_listing_export(&listings).map_err(|e| e.to_string())
        }
        Command::ListingPatch {
            disc,
            output,
            dump_dir,
            skip_width_check,
            listings,
        } => {
            let mut settings = settings_for(config, disc, dump_dir)?;
            if output.is_some() {
                settings.output_path = output;
            }
            settings.skip_width_check |= skip_width_check;
            run_listing_patch(&settings, &listings).map_err(|e| e.to_string())
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(report) => {
            print_report(&report);
            if !report.is_clean() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("Error: {err}");
            std::process::exit(1);
        }
    }
}
