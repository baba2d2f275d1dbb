use clap::{Parser, Subcommand};
use metaname::config::{self, RenameConfig};
use metaname::matching::PartialMatchSettings;
use metaname::session::Session;
use metaname::types::{ImageId, ImageRecord};
use metaname::{export, output, rules_file, scan};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "metaname")]
#[command(about = "Rename images by keywords found in their embedded metadata")]
#[command(long_about = "\
Rename images by keywords found in their embedded metadata

Generators such as Stable Diffusion, ComfyUI and NovelAI write prompts and
settings into PNG text chunks; cameras and editors write EXIF tags. metaname
reads those fields, matches them against your rules, and copies each matched
image to <rule name>.<original extension>.

Rules file (default: rules.txt in the source directory):

  #portrait
  1girl, solo, upper body

  #landscape
  scenery, no humans

Matching:
  Exact:    the whole keyword occurs in a field value (first rule wins)
  Partial:  enough comma-separated tokens occur in one field value
            (--partial, or per rule); the best score wins and
            alternatives can be picked with --pick FILE=N

Run 'metaname gen-config' to generate a documented metaname.toml.")]
#[command(version)]
struct Cli {
    /// Directory of images to rename
    #[arg(long, default_value = ".", global = true)]
    source: PathBuf,

    /// Rules file [default: <source>/rules.txt]
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Directory for intermediate files (manifest)
    #[arg(long, default_value = ".metaname", global = true)]
    temp_dir: PathBuf,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Flags overriding `[partial_match]` from metaname.toml.
#[derive(clap::Args, Clone)]
struct MatchArgs {
    /// Enable partial (token) matching for every rule
    #[arg(long)]
    partial: bool,

    /// Minimum token ratio for a partial match (0.10 - 0.99)
    #[arg(long)]
    min_ratio: Option<f64>,

    /// Token separator for partial matching
    #[arg(long)]
    separator: Option<String>,

    /// Choose candidate N (from plan output) for FILE, e.g. 00012.png=1
    #[arg(long = "pick", value_name = "FILE=N", value_parser = parse_pick)]
    picks: Vec<(String, usize)>,
}

#[derive(Subcommand)]
enum Command {
    /// Scan the source directory into a manifest
    Scan,
    /// Match images against the rules and print the rename plan
    Plan(MatchArgs),
    /// Copy matched images to the output directory under their new names
    Export {
        /// Output directory
        #[arg(long, short)]
        output: PathBuf,

        #[command(flatten)]
        matching: MatchArgs,
    },
    /// Load the rules file and print it
    Rules {
        /// Print in rules-file format instead of a listing
        #[arg(long)]
        normalize: bool,
    },
    /// Print a stock metaname.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match &cli.command {
        Command::Scan => {
            let config = config::load_config(&cli.source)?;
            init_thread_pool(&config.processing);
            let manifest = scan::scan(&cli.source, &config.limits, None)?;
            std::fs::create_dir_all(&cli.temp_dir)?;
            let manifest_path = cli.temp_dir.join("manifest.json");
            let json = serde_json::to_string_pretty(&manifest)?;
            std::fs::write(&manifest_path, json)?;
            output::print_scan_output(&manifest);
        }
        Command::Plan(matching) => {
            let (_, session) = build_session(&cli, matching)?;
            output::print_plan_output(session.images());
        }
        Command::Export {
            output: output_dir,
            matching,
        } => {
            let (config, session) = build_session(&cli, matching)?;
            let plan = export::plan_export(session.images(), config.export.batch_size);
            let summary = export::write_export(&plan, &cli.source, output_dir)?;
            output::print_export_output(&plan, &summary);
        }
        Command::Rules { normalize } => {
            let (rules, report) = rules_file::load_rules_file(&rules_path(&cli))?;
            if *normalize {
                print!("{}", rules_file::export_rules(rules.as_slice()));
            } else {
                output::print_rules_output(rules.as_slice(), &report);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Scan, load rules, match, and apply `--pick` overrides.
fn build_session(
    cli: &Cli,
    matching: &MatchArgs,
) -> Result<(RenameConfig, Session), Box<dyn std::error::Error>> {
    let mut config = config::load_config(&cli.source)?;
    apply_match_args(&mut config.partial_match, matching);
    config.validate()?;
    init_thread_pool(&config.processing);

    let (rules, report) = rules_file::load_rules_file(&rules_path(cli))?;
    if report.duplicates > 0 || report.invalid > 0 {
        log::warn!(
            "rules: {} duplicates skipped, {} invalid",
            report.duplicates,
            report.invalid
        );
    }

    let manifest = scan::scan(&cli.source, &config.limits, None)?;
    let mut session = Session::new(manifest.images, rules, config.partial_match.clone());
    for (file, index) in &matching.picks {
        let id = find_image(session.images(), file)
            .ok_or_else(|| format!("--pick: no image named {file}"))?;
        session.select_candidate(id, *index)?;
    }
    Ok((config, session))
}

fn apply_match_args(settings: &mut PartialMatchSettings, args: &MatchArgs) {
    if args.partial {
        settings.enabled = true;
    }
    if let Some(ratio) = args.min_ratio {
        settings.min_match_ratio = ratio;
    }
    if let Some(sep) = &args.separator {
        settings.token_separator = sep.clone();
    }
}

fn find_image(images: &[ImageRecord], file: &str) -> Option<ImageId> {
    images
        .iter()
        .find(|i| i.source_path == file || i.file_name == file)
        .map(|i| i.id)
}

fn rules_path(cli: &Cli) -> PathBuf {
    cli.rules
        .clone()
        .unwrap_or_else(|| cli.source.join("rules.txt"))
}

fn parse_pick(s: &str) -> Result<(String, usize), String> {
    let (file, index) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected FILE=N, got {s:?}"))?;
    let index = index
        .parse()
        .map_err(|e| format!("invalid candidate index {index:?}: {e}"))?;
    Ok((file.to_string(), index))
}

/// Verbosity flags layered over `RUST_LOG`.
fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
