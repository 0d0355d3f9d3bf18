//! Folder-level run orchestration.
//!
//! A pool of worker tasks drains a shared job queue; each worker runs
//! the whole per-file pipeline (extract, clean, complete, parse, score)
//! and reports back on a per-job oneshot channel. Results are collected
//! in folder order regardless of completion order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backend::PdfBackend;
use crate::categories::CategoryDefinition;
use crate::cleaner::CleaningRules;
use crate::llm::{CompletionBackend, complete_with_retry};
use crate::prompt::build_prompt;
use crate::response::parse_response;
use crate::scorer::score_snippet;
use crate::{
    CategorySnippet, Config, DocumentResult, FailureStage, FileFailure, FolderError,
    ProgressEvent, RunStats,
};

/// Everything a run's outcome carries: per-document rows, per-file
/// failures, and summary stats.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub documents: Vec<DocumentResult>,
    pub failures: Vec<FileFailure>,
    pub stats: RunStats,
}

type FileOutcome = Result<DocumentResult, FileFailure>;

/// A categorization job submitted to the pool.
struct FileJob {
    path: PathBuf,
    file_name: String,
    index: usize,
    total: usize,
    result_tx: oneshot::Sender<FileOutcome>,
    progress: Arc<dyn Fn(ProgressEvent) + Send + Sync>,
}

/// Shared, immutable context for all workers in a run.
struct RunContext {
    config: Config,
    definitions: Vec<CategoryDefinition>,
    rules: CleaningRules,
    system_prompt: String,
    pdf: Arc<dyn PdfBackend>,
    completion: Arc<dyn CompletionBackend>,
    client: reqwest::Client,
}

/// A pool of worker tasks that process file categorization jobs.
struct CategorizePool {
    job_tx: async_channel::Sender<FileJob>,
    pool_handle: JoinHandle<()>,
}

impl CategorizePool {
    fn new(ctx: Arc<RunContext>, cancel: CancellationToken, num_workers: usize) -> Self {
        let (job_tx, job_rx) = async_channel::unbounded::<FileJob>();

        let pool_handle = tokio::spawn(async move {
            let mut handles = Vec::with_capacity(num_workers.max(1));
            for _ in 0..num_workers.max(1) {
                handles.push(tokio::spawn(worker_loop(
                    job_rx.clone(),
                    ctx.clone(),
                    cancel.clone(),
                )));
            }
            drop(job_rx);
            for h in handles {
                let _ = h.await;
            }
        });

        Self {
            job_tx,
            pool_handle,
        }
    }

    async fn submit(&self, job: FileJob) {
        let _ = self.job_tx.send(job).await;
    }

    /// Close the queue and wait for all workers to finish.
    async fn shutdown(self) {
        self.job_tx.close();
        let _ = self.pool_handle.await;
    }
}

/// Worker loop: pull a file off the queue and run the full pipeline.
/// Exits when the queue closes or the run is cancelled.
async fn worker_loop(
    job_rx: async_channel::Receiver<FileJob>,
    ctx: Arc<RunContext>,
    cancel: CancellationToken,
) {
    while let Ok(job) = job_rx.recv().await {
        if cancel.is_cancelled() {
            // Drain without processing; dropping the job closes its
            // result channel so the collector does not wait on it.
            drop(job);
            continue;
        }

        (job.progress)(ProgressEvent::Processing {
            index: job.index,
            total: job.total,
            file_name: job.file_name.clone(),
        });

        let outcome = process_file(&ctx, &job).await;
        match &outcome {
            Ok(result) => {
                tracing::info!(
                    file = %job.file_name,
                    rows = result.snippets.len(),
                    "file categorized"
                );
                (job.progress)(ProgressEvent::Result {
                    index: job.index,
                    total: job.total,
                    result: Box::new(result.clone()),
                });
            }
            Err(failure) => {
                tracing::warn!(
                    file = %job.file_name,
                    stage = failure.stage.as_str(),
                    error = %failure.message,
                    "file skipped"
                );
                (job.progress)(ProgressEvent::Failed {
                    index: job.index,
                    total: job.total,
                    file_name: job.file_name.clone(),
                    stage: failure.stage,
                    message: failure.message.clone(),
                });
            }
        }

        let _ = job.result_tx.send(outcome);
    }
}

/// Run one file through extract, clean, complete, parse, and score.
async fn process_file(ctx: &RunContext, job: &FileJob) -> FileOutcome {
    let fail = |stage: FailureStage, message: String| FileFailure {
        file_name: job.file_name.clone(),
        stage,
        message,
    };

    // Extraction is blocking (native PDF library), so it runs off the
    // async workers.
    let pdf = Arc::clone(&ctx.pdf);
    let path = job.path.clone();
    let raw = tokio::task::spawn_blocking(move || pdf.extract_text(&path))
        .await
        .map_err(|e| fail(FailureStage::Extraction, e.to_string()))?
        .map_err(|e| fail(FailureStage::Extraction, e.to_string()))?;

    let cleaned = ctx.rules.apply(&raw);
    if cleaned.is_empty() {
        return Err(fail(
            FailureStage::Extraction,
            "document contained no extractable text".to_string(),
        ));
    }

    let progress = job.progress.clone();
    let file_name = job.file_name.clone();
    let completion = complete_with_retry(
        ctx.completion.as_ref(),
        &ctx.system_prompt,
        &cleaned,
        &ctx.client,
        Duration::from_secs(ctx.config.request_timeout_secs),
        ctx.config.max_retries,
        &move |attempt, backoff| {
            progress(ProgressEvent::Retrying {
                file_name: file_name.clone(),
                attempt,
                backoff,
            });
        },
    )
    .await
    .map_err(|e| fail(FailureStage::Completion, e.to_string()))?;

    let pairs = parse_response(&completion, &ctx.definitions)
        .map_err(|e| fail(FailureStage::Parse, e.to_string()))?;

    let snippets = pairs
        .into_iter()
        .map(|(category, snippet)| {
            let score = score_snippet(&category, &snippet);
            CategorySnippet {
                category,
                snippet,
                score,
            }
        })
        .collect();

    Ok(DocumentResult {
        file_name: job.file_name.clone(),
        snippets,
    })
}

/// List the PDF files in `folder`, sorted by file name.
pub fn scan_folder(folder: &Path) -> Result<Vec<PathBuf>, FolderError> {
    if !folder.exists() {
        return Err(FolderError::NotFound(folder.to_path_buf()));
    }
    if !folder.is_dir() {
        return Err(FolderError::NotADirectory(folder.to_path_buf()));
    }

    let entries = std::fs::read_dir(folder).map_err(|e| FolderError::Io {
        path: folder.to_path_buf(),
        source: e,
    })?;

    let mut pdfs: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FolderError::Io {
            path: folder.to_path_buf(),
            source: e,
        })?;
        let path = entry.path();
        let is_pdf = path.is_file()
            && path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            pdfs.push(path);
        }
    }

    if pdfs.is_empty() {
        return Err(FolderError::NoPdfs(folder.to_path_buf()));
    }

    pdfs.sort();
    Ok(pdfs)
}

/// Categorize every PDF in `folder`.
///
/// The system prompt is built once per run. Per-file failures are
/// recorded in the outcome; only folder-level problems abort the run.
#[allow(clippy::too_many_arguments)]
pub async fn process_folder(
    folder: &Path,
    definitions: Vec<CategoryDefinition>,
    rules: CleaningRules,
    config: Config,
    pdf: Arc<dyn PdfBackend>,
    completion: Arc<dyn CompletionBackend>,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Result<RunOutcome, FolderError> {
    let paths = scan_folder(folder)?;
    let total = paths.len();
    let num_workers = config.num_workers.max(1);
    let progress: Arc<dyn Fn(ProgressEvent) + Send + Sync> = Arc::new(progress);

    let client = reqwest::Client::builder()
        .pool_max_idle_per_host(2)
        .pool_idle_timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());

    let system_prompt = build_prompt(&definitions, config.include_other);
    tracing::debug!(
        total,
        num_workers,
        categories = definitions.len(),
        patterns = rules.len(),
        "starting folder run"
    );

    let ctx = Arc::new(RunContext {
        config,
        definitions,
        rules,
        system_prompt,
        pdf,
        completion,
        client,
    });

    let pool = CategorizePool::new(ctx, cancel.clone(), num_workers);

    let mut receivers = Vec::with_capacity(total);
    for (i, path) in paths.iter().enumerate() {
        if cancel.is_cancelled() {
            break;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let (result_tx, result_rx) = oneshot::channel();

        pool.submit(FileJob {
            path: path.clone(),
            file_name,
            index: i,
            total,
            result_tx,
            progress: progress.clone(),
        })
        .await;
        receivers.push((i, result_rx));
    }

    let mut outcomes: Vec<Option<FileOutcome>> = Vec::new();
    outcomes.resize_with(total, || None);
    for (i, rx) in receivers {
        if let Ok(outcome) = rx.await {
            outcomes[i] = Some(outcome);
        }
    }

    pool.shutdown().await;

    let mut documents = Vec::new();
    let mut failures = Vec::new();
    for outcome in outcomes.into_iter().flatten() {
        match outcome {
            Ok(result) => documents.push(result),
            Err(failure) => failures.push(failure),
        }
    }

    let stats = RunStats {
        total_files: total,
        processed: documents.len(),
        failed: failures.len(),
        rows: documents.iter().map(|d| d.snippets.len()).sum(),
    };
    tracing::info!(
        total = stats.total_files,
        processed = stats.processed,
        failed = stats.failed,
        rows = stats.rows,
        "folder run complete"
    );

    Ok(RunOutcome {
        documents,
        failures,
        stats,
    })
}
