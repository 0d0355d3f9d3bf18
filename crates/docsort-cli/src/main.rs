use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio_util::sync::CancellationToken;

use docsort_core::llm::deepseek::DeepSeek;
use docsort_core::{
    CleaningRules, Config, DEFAULT_API_BASE, DEFAULT_MODEL, categorize_folder, config_file,
    load_api_key, parse_categories,
};
use docsort_pdf_mupdf::MupdfBackend;
use docsort_reporting::{ExportFormat, export_results};

mod output;

use output::ColorMode;

/// Categorize folders of PDF documents with a chat-completion model
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Categorize every PDF in a folder and export the results
    Run {
        /// Folder containing the PDF files
        pdf_dir: PathBuf,

        /// Path to the category instructions file (#Category lines with
        /// optional hint lines below each)
        #[arg(short, long)]
        instructions: PathBuf,

        /// Path to the cleaning rules file (one regex per line)
        #[arg(short, long)]
        rules: Option<PathBuf>,

        /// Path to write the results file to [default: results.<format ext>]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Output format: csv, pivot, or json
        #[arg(long, default_value = "csv")]
        format: String,

        /// Path to a file containing the API key
        #[arg(long)]
        api_key_file: Option<PathBuf>,

        /// Chat model name
        #[arg(long)]
        model: Option<String>,

        /// Base URL of the chat-completion API
        #[arg(long)]
        base_url: Option<String>,

        /// Number of files processed concurrently
        #[arg(long)]
        workers: Option<usize>,

        /// Per-request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,

        /// Attempt cap for transient API failures
        #[arg(long)]
        max_retries: Option<u32>,

        /// Do not ask the model for an OTHER catch-all bucket
        #[arg(long)]
        no_other: bool,

        /// Disable colored output
        #[arg(long)]
        no_color: bool,

        /// Extract and clean text without calling the API
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            pdf_dir,
            instructions,
            rules,
            output,
            format,
            api_key_file,
            model,
            base_url,
            workers,
            timeout_secs,
            max_retries,
            no_other,
            no_color,
            dry_run,
        } => {
            let color = ColorMode(!no_color);

            // Category definitions
            let instructions_text = std::fs::read_to_string(&instructions).map_err(|e| {
                anyhow::anyhow!("Failed to read instructions {}: {}", instructions.display(), e)
            })?;
            let definitions = parse_categories(&instructions_text);
            if definitions.is_empty() {
                anyhow::bail!(
                    "No category definitions found in {} (expected #Category lines)",
                    instructions.display()
                );
            }

            // Cleaning rules (optional)
            let rules_text = match &rules {
                Some(path) => std::fs::read_to_string(path).map_err(|e| {
                    anyhow::anyhow!("Failed to read rules {}: {}", path.display(), e)
                })?,
                None => String::new(),
            };
            let (cleaning, pattern_errors) = CleaningRules::compile(&rules_text);
            for err in &pattern_errors {
                if color.enabled() {
                    eprintln!("{} {}", "WARNING:".yellow(), err);
                } else {
                    eprintln!("WARNING: {}", err);
                }
            }

            if dry_run {
                return dry_run_folder(&pdf_dir, &definitions, &cleaning, color);
            }

            // Resolve configuration: CLI flags > env vars > config file > defaults
            let file_config = config_file::load_config();
            let api_config = file_config.api.unwrap_or_default();
            let run_config = file_config.run.unwrap_or_default();

            let api_key = resolve_api_key(api_key_file, api_config.key_path.as_deref())?;
            let model = model
                .or_else(|| std::env::var("DOCSORT_MODEL").ok())
                .or(api_config.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            let api_base_url = base_url
                .or_else(|| std::env::var("DEEPSEEK_BASE_URL").ok())
                .or(api_config.base_url)
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

            let defaults = Config::default();
            let config = Config {
                api_key,
                model,
                api_base_url,
                max_tokens: run_config.max_tokens.unwrap_or(defaults.max_tokens),
                temperature: run_config.temperature.unwrap_or(defaults.temperature),
                request_timeout_secs: timeout_secs
                    .or(run_config.request_timeout_secs)
                    .unwrap_or(defaults.request_timeout_secs),
                max_retries: max_retries
                    .or(run_config.max_retries)
                    .unwrap_or(defaults.max_retries),
                num_workers: workers
                    .or(run_config.num_workers)
                    .unwrap_or(defaults.num_workers),
                include_other: if no_other {
                    false
                } else {
                    run_config.include_other.unwrap_or(defaults.include_other)
                },
            };

            let format: ExportFormat = format.parse().map_err(anyhow::Error::msg)?;
            let output = output
                .unwrap_or_else(|| PathBuf::from(format!("results.{}", format.extension())));

            run(pdf_dir, definitions, cleaning, config, format, output, color).await
        }
    }
}

/// API key resolution: DEEPSEEK_API_KEY holds the key itself; the flag
/// and config file point at a key file.
fn resolve_api_key(
    key_file_flag: Option<PathBuf>,
    key_path_config: Option<&str>,
) -> anyhow::Result<String> {
    if let Ok(key) = std::env::var("DEEPSEEK_API_KEY") {
        let key = key.trim().to_string();
        if !key.is_empty() {
            return Ok(key);
        }
    }
    let key_path = key_file_flag.or_else(|| key_path_config.map(PathBuf::from));
    match key_path {
        Some(path) => Ok(load_api_key(&path)?),
        None => anyhow::bail!(
            "No API key configured. Set DEEPSEEK_API_KEY, pass --api-key-file, \
             or set api.key_path in the config file."
        ),
    }
}

async fn run(
    pdf_dir: PathBuf,
    definitions: Vec<docsort_core::CategoryDefinition>,
    cleaning: CleaningRules,
    config: Config,
    format: ExportFormat,
    output: PathBuf,
    color: ColorMode,
) -> anyhow::Result<()> {
    let pdf = Arc::new(MupdfBackend::new());
    let completion = Arc::new(DeepSeek::new(&config));

    // Progress bar; length is set from the first event once the folder
    // has been scanned.
    let bar = ProgressBar::new(0);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/dim}] {pos}/{len} {msg}")
            .expect("progress template")
            .progress_chars("=> "),
    );

    let progress_bar = bar.clone();
    let progress = move |event: docsort_core::ProgressEvent| {
        use docsort_core::ProgressEvent;
        match &event {
            ProgressEvent::Processing {
                total, file_name, ..
            } => {
                if progress_bar.length() == Some(0) {
                    progress_bar.set_length(*total as u64);
                }
                progress_bar.set_message(file_name.clone());
            }
            ProgressEvent::Result { .. } | ProgressEvent::Failed { .. } => {
                if let Some(line) = output::format_progress(&event, color) {
                    progress_bar.println(line);
                }
                progress_bar.inc(1);
            }
            ProgressEvent::Retrying { .. } => {
                if let Some(line) = output::format_progress(&event, color) {
                    progress_bar.println(line);
                }
            }
        }
    };

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel_clone.cancel();
        }
    });

    let outcome = categorize_folder(
        &pdf_dir,
        definitions,
        cleaning,
        config,
        pdf,
        completion,
        progress,
        cancel.clone(),
    )
    .await?;

    bar.finish_and_clear();

    if cancel.is_cancelled() {
        if color.enabled() {
            eprintln!("{}", "Run cancelled; exporting partial results.".yellow());
        } else {
            eprintln!("Run cancelled; exporting partial results.");
        }
    }

    export_results(&outcome, format, &output)?;

    let mut w: Box<dyn Write> = Box::new(std::io::stdout());
    output::print_failure_report(&mut w, &outcome, color)?;
    output::print_summary(&mut w, &outcome, &output, color)?;

    Ok(())
}

/// Dry run: extract and clean each PDF, printing what would be sent to
/// the model, without any API calls.
fn dry_run_folder(
    pdf_dir: &std::path::Path,
    definitions: &[docsort_core::CategoryDefinition],
    cleaning: &CleaningRules,
    color: ColorMode,
) -> anyhow::Result<()> {
    let paths = docsort_core::orchestrator::scan_folder(pdf_dir)?;
    let backend = MupdfBackend::new();
    let mut w: Box<dyn Write> = Box::new(std::io::stdout());

    let headings: Vec<String> = definitions
        .iter()
        .map(|d| format!("#{}", d.heading()))
        .collect();

    if color.enabled() {
        writeln!(
            w,
            "{} {} ({} PDFs, {} categories)\n",
            "DRY RUN:".bold().cyan(),
            pdf_dir.display().bold(),
            paths.len(),
            definitions.len()
        )?;
    } else {
        writeln!(
            w,
            "DRY RUN: {} ({} PDFs, {} categories)\n",
            pdf_dir.display(),
            paths.len(),
            definitions.len()
        )?;
    }
    writeln!(w, "Headings: {}\n", headings.join(", "))?;

    for (i, path) in paths.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        if color.enabled() {
            writeln!(w, "{}", format!("[{}] {}", i + 1, name).bold().yellow())?;
        } else {
            writeln!(w, "[{}] {}", i + 1, name)?;
        }

        match docsort_core::PdfBackend::extract_text(&backend, path) {
            Ok(raw) => {
                let cleaned = cleaning.apply(&raw);
                writeln!(
                    w,
                    "  Extracted: {} chars, {} after cleaning",
                    raw.len(),
                    cleaned.len()
                )?;
                let preview: String = cleaned.chars().take(200).collect();
                if color.enabled() {
                    writeln!(w, "  Preview:   {}", preview.dimmed())?;
                } else {
                    writeln!(w, "  Preview:   {}", preview)?;
                }
            }
            Err(e) => {
                if color.enabled() {
                    writeln!(w, "  {}", format!("FAILED: {}", e).red())?;
                } else {
                    writeln!(w, "  FAILED: {}", e)?;
                }
            }
        }
        writeln!(w)?;
    }

    writeln!(w, "Total: {} PDFs", paths.len())?;
    Ok(())
}
