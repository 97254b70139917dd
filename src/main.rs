// src/main.rs
//
// tintlog — chat-log export → colored text / web HTML / iframe fragments
//
// - Reads the HTML export as UTF-8 text and the settings directory (resources.json,
//   config.json, character.json; each optional).
// - CLI flags override config.json toggles.
// - Writes the flat log to OUTPUT (default: output/output.txt), or to stdout with --stdout.
// - With web conversion on, also writes <stem>.web.html and <stem>.iframe-NN.html next to
//   OUTPUT.
// - Unknown speakers and over-length logs are reported on stderr; they do not fail the run.
// - Invalid rule colors fail the run before anything is written.
//
// CLI flags:
//   --settings <DIR>      : settings directory (default: settings)
//   --compact             : force-enable compact mode
//   --web                 : force-enable web log + iframe fragments
//   --ignore-tabs <LIST>  : comma-separated tab names to drop (replaces config value)
//   --iframe-max <N>      : iframe fragment character budget (replaces resources value)
//   --stdout              : print the flat log instead of writing OUTPUT
//   -v, --verbose         : debug logging (RUST_LOG still wins when set)

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use std::fs;
use std::path::{Path, PathBuf};
use tintlog::{convert_log, Conversion, Settings};

/// CLI flags
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Settings directory holding resources.json, config.json and character.json
    #[arg(long, value_name = "DIR", default_value = "settings")]
    settings: PathBuf,

    /// Force-enable compact mode
    #[arg(long, action = ArgAction::SetTrue)]
    compact: bool,

    /// Force-enable web log and iframe fragment output
    #[arg(long, action = ArgAction::SetTrue)]
    web: bool,

    /// Comma-separated tab names to drop
    #[arg(long = "ignore-tabs", value_name = "LIST")]
    ignore_tabs: Option<String>,

    /// Character budget of one iframe fragment
    #[arg(long = "iframe-max", value_name = "N")]
    iframe_max: Option<usize>,

    /// Print the flat log to stdout instead of writing OUTPUT
    #[arg(long, action = ArgAction::SetTrue)]
    stdout: bool,

    /// Enable debug logging
    #[arg(short, long, action = ArgAction::SetTrue)]
    verbose: bool,

    /// Chat-log HTML export
    input: PathBuf,

    /// Output file (default: output/output.txt)
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = Settings::load(&cli.settings)
        .with_context(|| format!("Failed to load settings from {}", cli.settings.display()))?;

    // Precedence: explicit flags override config.json.
    if cli.compact {
        settings.options.compact_mode = true;
    }
    if cli.web {
        settings.options.convert_web_log = true;
    }
    if let Some(tabs) = &cli.ignore_tabs {
        settings.options.ignore_tabs = tabs.clone();
    }
    if let Some(max) = cli.iframe_max {
        settings.resources.iframe_max_character = max;
    }

    let html = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read chat log {}", cli.input.display()))?;

    let conversion = convert_log(
        &html,
        &settings.options,
        &settings.rules,
        &settings.resources,
    )
    .with_context(|| format!("Failed to convert {}", cli.input.display()))?;

    if cli.stdout {
        println!("{}", conversion.log.flat_log);
    } else {
        let out_path = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from("output").join("output.txt"));
        write_outputs(&out_path, &conversion)?;
        eprintln!(
            "Converted {} characters -> {}",
            conversion.total_length,
            out_path.display()
        );
    }

    report(&conversion, &settings);
    Ok(())
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/* ================================ Output ================================= */

fn write_outputs(out_path: &Path, conversion: &Conversion) -> Result<()> {
    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    write_file(out_path, &conversion.log.flat_log)?;

    if conversion.log.web_log.is_empty() && conversion.log.iframe_fragments.is_empty() {
        return Ok(());
    }
    write_file(&sibling(out_path, "web.html"), &conversion.log.web_log)?;
    for (i, fragment) in conversion.log.iframe_fragments.iter().enumerate() {
        write_file(&sibling(out_path, &format!("iframe-{:02}.html", i + 1)), fragment)?;
    }
    Ok(())
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), bytes = content.len(), "Wrote output");
    Ok(())
}

/// `<dir>/<stem>.<suffix>` for the flat output path.
fn sibling(out_path: &Path, suffix: &str) -> PathBuf {
    let stem = out_path
        .file_stem()
        .map_or_else(|| "output".into(), |s| s.to_string_lossy());
    out_path.with_file_name(format!("{stem}.{suffix}"))
}

/* ================================ Reports ================================ */

fn report(conversion: &Conversion, settings: &Settings) {
    if !conversion.unknown_characters.is_empty() {
        eprintln!(
            "warning: no enabled character settings for: {}",
            conversion.unknown_characters.join(", ")
        );
    }
    if conversion.over_limit {
        eprintln!(
            "warning: converted log is {} characters, over the {} character limit",
            conversion.total_length, settings.resources.max_log_character_length
        );
    }
    if !conversion.log.iframe_fragments.is_empty() {
        eprintln!(
            "Split web log into {} iframe fragment(s)",
            conversion.log.iframe_fragments.len()
        );
    }
}
