use std::path::PathBuf;

use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub mod backend;
pub mod categories;
pub mod cleaner;
pub mod config_file;
pub mod llm;
pub mod orchestrator;
pub mod prompt;
pub mod response;
pub mod scorer;

// Re-export for convenience
pub use backend::{BackendError, PdfBackend};
pub use categories::{CategoryDefinition, parse_categories};
pub use cleaner::{CleaningRules, PatternError};
pub use llm::{CompletionBackend, CompletionError};
pub use orchestrator::{RunOutcome, process_folder};
pub use response::ParseError;

/// Default chat model sent to the completion endpoint.
pub const DEFAULT_MODEL: &str = "deepseek-chat";

/// Default base URL of the chat-completion API.
pub const DEFAULT_API_BASE: &str = "https://api.deepseek.com/v1";

/// Heading token for content the model could not place in a user category.
pub const OTHER_HEADING: &str = "OTHER";

/// One snippet of a document's text assigned to a category, with its
/// keyword-count score. Written as one output row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySnippet {
    pub category: String,
    pub snippet: String,
    pub score: usize,
}

/// The categorization result for a single PDF.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub file_name: String,
    pub snippets: Vec<CategorySnippet>,
}

/// Pipeline stage at which a per-file failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Extraction,
    Completion,
    Parse,
}

impl FailureStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureStage::Extraction => "extraction",
            FailureStage::Completion => "completion",
            FailureStage::Parse => "parse",
        }
    }
}

/// A per-file failure. The file is skipped and the run continues.
#[derive(Debug, Clone)]
pub struct FileFailure {
    pub file_name: String,
    pub stage: FailureStage,
    pub message: String,
}

/// Summary statistics for a complete run.
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub total_files: usize,
    pub processed: usize,
    pub failed: usize,
    pub rows: usize,
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    Processing {
        index: usize,
        total: usize,
        file_name: String,
    },
    Result {
        index: usize,
        total: usize,
        result: Box<DocumentResult>,
    },
    Failed {
        index: usize,
        total: usize,
        file_name: String,
        stage: FailureStage,
        message: String,
    },
    /// The completion request for a file is being retried after a
    /// transient failure.
    Retrying {
        file_name: String,
        attempt: u32,
        backoff: std::time::Duration,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("API key file not found: {0}")]
    KeyFileMissing(PathBuf),
    #[error("API key file is empty: {0}")]
    KeyFileEmpty(PathBuf),
    #[error("failed to read API key file {path}: {source}")]
    KeyFileUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum FolderError {
    #[error("input folder not found: {0}")]
    NotFound(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("no PDF files found in {0}")]
    NoPdfs(PathBuf),
    #[error("failed to read folder {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configuration for a categorization run.
///
/// The API key is an explicit value here rather than ambient state; the
/// CLI resolves it from the key file before constructing the config.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    pub model: String,
    pub api_base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    pub num_workers: usize,
    pub include_other: bool,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"***")
            .field("model", &self.model)
            .field("api_base_url", &self.api_base_url)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("num_workers", &self.num_workers)
            .field("include_other", &self.include_other)
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            request_timeout_secs: 120,
            max_retries: 3,
            num_workers: 1,
            include_other: true,
        }
    }
}

/// Load the API key from a plain-text file.
///
/// The first non-empty line, trimmed, is the key.
pub fn load_api_key(path: &std::path::Path) -> Result<String, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::KeyFileMissing(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::KeyFileUnreadable {
        path: path.to_path_buf(),
        source: e,
    })?;
    match content.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(key) => Ok(key.to_string()),
        None => Err(ConfigError::KeyFileEmpty(path.to_path_buf())),
    }
}

/// Categorize a folder of PDFs.
///
/// Processes each PDF through extract, clean, categorize, and score,
/// emitting progress events via the callback. Per-file failures are
/// recorded and skipped; the run continues. The operation can be
/// cancelled via the CancellationToken.
pub async fn categorize_folder(
    folder: &std::path::Path,
    definitions: Vec<CategoryDefinition>,
    rules: CleaningRules,
    config: Config,
    pdf: std::sync::Arc<dyn PdfBackend>,
    completion: std::sync::Arc<dyn CompletionBackend>,
    progress: impl Fn(ProgressEvent) + Send + Sync + 'static,
    cancel: CancellationToken,
) -> Result<RunOutcome, FolderError> {
    orchestrator::process_folder(
        folder,
        definitions,
        rules,
        config,
        pdf,
        completion,
        progress,
        cancel,
    )
    .await
}

#[cfg(test)]
mod api_key_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn first_nonempty_line_wins() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "\n  sk-abc123  \nignored").unwrap();
        assert_eq!(load_api_key(f.path()).unwrap(), "sk-abc123");
    }

    #[test]
    fn empty_file_is_an_error() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        writeln!(f, "\n   \n").unwrap();
        assert!(matches!(
            load_api_key(f.path()),
            Err(ConfigError::KeyFileEmpty(_))
        ));
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("docsort_no_such_key_file");
        assert!(matches!(
            load_api_key(&path),
            Err(ConfigError::KeyFileMissing(_))
        ));
    }
}
