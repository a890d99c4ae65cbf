use std::collections::BTreeSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use numtag_core::config_file::{self, ConfigFile};
use numtag_core::report::{write_extraction, write_report};
use numtag_core::{
    Config, DEFAULT_BASE_URL, DEFAULT_MODEL, GroupingPolicy, ModelRegistry, OllamaLabeler,
    PromptTemplate, ProgressEvent, SemanticLabeler, label_document, load_document,
};
use numtag_pdf_mupdf::MupdfBackend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod output;

use output::ColorMode;

/// Numeric value labeler - find and semantically label the numbers in a PDF
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the PDF document
    #[arg(short, long, required_unless_present = "list_models")]
    path: Option<PathBuf>,

    /// Where to write the labeling results
    #[arg(long, default_value = "extraction_results.json")]
    output: PathBuf,

    /// Model name from the model registry (see --list-models)
    #[arg(short, long)]
    model: Option<String>,

    /// Maximum number of model calls in flight
    #[arg(long)]
    concurrency: Option<usize>,

    /// Per-page model call timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Characters of context captured on each side of a token
    #[arg(long)]
    window: Option<usize>,

    /// Send each distinct value once per page (last occurrence's context wins)
    #[arg(long)]
    dedup: bool,

    /// Write results in page order instead of completion order
    #[arg(long)]
    sort_pages: bool,

    /// Also write the extracted page texts and tokens to this file
    #[arg(long)]
    extractions: Option<PathBuf>,

    /// Dry run: extract and print tokens without calling the model
    #[arg(long)]
    dry_run: bool,

    /// Config file, overlaid on the platform and working-directory configs
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// List the available models and exit
    #[arg(long)]
    list_models: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing();

    let color = ColorMode(!cli.no_color);
    let file_config = resolve_config_file(cli.config.as_deref())?;

    // Resolve configuration: CLI flags > config file > env vars > defaults
    let base_url = std::env::var("OLLAMA_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
    let registry = ModelRegistry::from_config(&file_config, &base_url);
    let model_name = cli
        .model
        .clone()
        .or_else(|| file_config.default_model().map(str::to_string))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let mut stdout = std::io::stdout();
    if cli.list_models {
        output::print_models(&mut stdout, &registry, &model_name, color)?;
        return Ok(());
    }

    let Some(path) = cli.path.clone() else {
        anyhow::bail!("--path is required");
    };
    if !path.exists() {
        anyhow::bail!("File not found: {}", path.display());
    }

    let endpoint = registry.resolve(&model_name)?.clone();
    let config = build_config(&cli, &file_config, &endpoint.model_id);

    let backend = MupdfBackend::new()
        .with_header_exclusion(file_config.header_ratio().unwrap_or(0.0))
        .with_footer_exclusion(file_config.footer_ratio().unwrap_or(0.0));
    let extraction = load_document(&path, &backend, config.context_window)
        .with_context(|| format!("failed to read {}", path.display()))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let pages_to_label = extraction
        .records
        .iter()
        .map(|r| r.page_number)
        .collect::<BTreeSet<_>>()
        .len();

    output::print_extraction_summary(&mut stdout, &file_name, &extraction, pages_to_label, color)?;

    if let Some(extractions_path) = &cli.extractions {
        write_extraction(extractions_path, &extraction)?;
        writeln!(stdout, "Extractions written to {}", extractions_path.display())?;
    }

    if cli.dry_run {
        output::print_dry_run(&mut stdout, &file_name, &extraction, color)?;
        return Ok(());
    }

    if extraction.records.is_empty() {
        writeln!(stdout, "No numeric tokens to label.")?;
        write_report(&cli.output, &[])?;
        return Ok(());
    }

    let prompt = match file_config.prompt_path() {
        Some(p) => PromptTemplate::from_file(Path::new(p))
            .with_context(|| format!("failed to read prompt template {}", p))?,
        None => PromptTemplate::default(),
    };
    let labeler: Arc<dyn SemanticLabeler> =
        Arc::new(OllamaLabeler::from_endpoint(&endpoint).with_prompt(prompt));

    writeln!(
        stdout,
        "Labeling with {} ({}) at {}",
        model_name, endpoint.model_id, endpoint.base_url
    )?;

    let bar = progress_bar(pages_to_label as u64);
    let progress_cb = {
        let bar = bar.clone();
        move |event: ProgressEvent| {
            match &event {
                ProgressEvent::PageStarted { page_number, tokens } => {
                    bar.set_message(format!("page {} ({} tokens)", page_number, tokens));
                }
                ProgressEvent::PageCompleted { .. } => bar.inc(1),
                ProgressEvent::Reconciliation { .. } => {}
            }
            if let Some(line) = output::format_progress(&event, color) {
                bar.println(line);
            }
        }
    };

    let cancel = CancellationToken::new();

    // Set up Ctrl+C handler
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let outcomes = label_document(&extraction, labeler, &config, progress_cb, cancel).await;
    bar.finish_and_clear();

    write_report(&cli.output, &outcomes)
        .with_context(|| format!("failed to write {}", cli.output.display()))?;
    output::print_summary(&mut stdout, &outcomes, &cli.output, color)?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Platform and working-directory configs, with an explicit `--config` file
/// layered on top. Only the explicit file is allowed to fail.
fn resolve_config_file(explicit: Option<&Path>) -> anyhow::Result<ConfigFile> {
    let cascaded = config_file::load_config();
    match explicit {
        Some(path) => {
            let overlay = config_file::read_config(path)
                .with_context(|| format!("failed to load config {}", path.display()))?;
            Ok(config_file::merge(cascaded, overlay))
        }
        None => Ok(cascaded),
    }
}

fn build_config(cli: &Cli, file_config: &ConfigFile, model_id: &str) -> Config {
    let mut config = Config {
        model_id: model_id.to_string(),
        ..Config::default()
    };
    file_config.apply_to(&mut config);

    if let Some(n) = cli.concurrency {
        config.concurrency = n.max(1);
    }
    if let Some(secs) = cli.timeout {
        config.timeout_secs = secs;
    }
    if let Some(window) = cli.window {
        config.context_window = window;
    }
    if cli.dedup {
        config.grouping = GroupingPolicy::DedupLastWins;
    }
    if cli.sort_pages {
        config.sort_by_page = true;
    }
    config
}

fn progress_bar(len: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};
    use std::time::Duration;

    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner:.cyan} [{bar:40.cyan/dim}] {pos}/{len} pages {msg} ({elapsed})",
    ) {
        bar.set_style(style.progress_chars("=> "));
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}
