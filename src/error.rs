use std::path::PathBuf;

/// Application-level error carrying the process exit code.
///
/// Exit codes:
/// - `2`: input, schema, or configuration problems
/// - `3`: no usable data
/// - `4`: fetch/runtime failures
#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Errors raised by the enrichment and projection engine.
///
/// A missing anchor is not represented here: it is a valid outcome
/// (`Anchor::NotFound`). Likewise, entity codes failing validation are only
/// skipped by the projector.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("CSV header differs from expected.\n  expected: {expected}\n  found:    {found}")]
    SchemaMismatch { expected: String, found: String },

    #[error("line {line}: invalid `{field}` value '{value}' (expected an integer >= 0)")]
    RowParse {
        line: u64,
        field: &'static str,
        value: String,
    },

    #[error("input has no rows for reporting date {expected}; latest is {latest}")]
    StaleData { expected: String, latest: String },

    #[error("line {line}: expected {expected} fields, found {found}")]
    RowShape { line: u64, expected: usize, found: usize },

    #[error("entity '{entity}', line {line}: invalid date '{value}' (expected DD/MM/YYYY)")]
    DateParse {
        entity: String,
        line: u64,
        value: String,
    },

    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid entity code pattern: {0}")]
    Pattern(#[from] regex::Error),
}

impl PipelineError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        PipelineError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let exit_code = match &err {
            PipelineError::SchemaMismatch { .. }
            | PipelineError::StaleData { .. }
            | PipelineError::RowParse { .. }
            | PipelineError::RowShape { .. }
            | PipelineError::DateParse { .. }
            | PipelineError::Csv(_)
            | PipelineError::Pattern(_) => 2,
            PipelineError::Io { .. } | PipelineError::Json(_) => 4,
        };
        AppError::new(exit_code, err.to_string())
    }
}
