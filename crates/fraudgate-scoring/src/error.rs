use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Failures raised by the encoding, validation and scoring pipeline.
#[derive(Debug)]
pub enum ScoringError {
    /// A required metadata/model/preprocessor/feature-list file is absent or unreadable.
    ArtifactMissing {
        artifact: &'static str,
        path: PathBuf,
        reason: String,
    },
    /// Attempt to write artifacts for a version that already exists.
    ArtifactExists { version: u32 },
    /// Encoded features disagree with the expected feature set or order.
    SchemaMismatch {
        stage: String,
        missing: Vec<String>,
        extra: Vec<String>,
        misordered: Vec<String>,
    },
    /// A value could not be cast to the numeric type the next stage requires.
    TypeCoercion {
        column: String,
        row: Option<usize>,
        detail: String,
    },
    /// API used out of order (e.g. `transform` before `fit`).
    Precondition(String),
    /// Input that is not a mapping of field names to scalar values.
    InvalidRecord(String),
    Io(std::io::Error),
    Serialization(serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScoringError>;

impl ScoringError {
    pub fn schema_mismatch(
        stage: impl Into<String>,
        missing: Vec<String>,
        extra: Vec<String>,
        misordered: Vec<String>,
    ) -> Self {
        ScoringError::SchemaMismatch {
            stage: stage.into(),
            missing,
            extra,
            misordered,
        }
    }

    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, ScoringError::SchemaMismatch { .. })
    }
}

impl fmt::Display for ScoringError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScoringError::ArtifactMissing {
                artifact,
                path,
                reason,
            } => write!(
                f,
                "Missing {} artifact at {}: {}",
                artifact,
                path.display(),
                reason
            ),
            ScoringError::ArtifactExists { version } => write!(
                f,
                "Artifacts for model version v{} already exist and are immutable",
                version
            ),
            ScoringError::SchemaMismatch {
                stage,
                missing,
                extra,
                misordered,
            } => {
                write!(
                    f,
                    "Feature schema mismatch ({}): missing_columns={:?}, extra_columns={:?}",
                    stage, missing, extra
                )?;
                if !misordered.is_empty() {
                    write!(f, ", misordered_columns={:?}", misordered)?;
                }
                Ok(())
            }
            ScoringError::TypeCoercion { column, row, detail } => match row {
                Some(row) => write!(
                    f,
                    "Failed to cast column '{}' (row {}) to numeric: {}",
                    column, row, detail
                ),
                None => write!(f, "Failed to cast column '{}' to numeric: {}", column, detail),
            },
            ScoringError::Precondition(msg) => write!(f, "Precondition violated: {}", msg),
            ScoringError::InvalidRecord(msg) => write!(f, "Invalid transaction record: {}", msg),
            ScoringError::Io(e) => write!(f, "I/O error: {}", e),
            ScoringError::Serialization(e) => write!(f, "Serialization error: {}", e),
        }
    }
}

impl Error for ScoringError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ScoringError::Io(e) => Some(e),
            ScoringError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ScoringError {
    fn from(e: std::io::Error) -> Self {
        ScoringError::Io(e)
    }
}

impl From<serde_json::Error> for ScoringError {
    fn from(e: serde_json::Error) -> Self {
        ScoringError::Serialization(e)
    }
}
