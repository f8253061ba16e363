use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum OrganizerError {
    #[error("missing config file nifti-org.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("converter failed: {0}")]
    ExternalToolFailure(String),

    #[error("subject {0} not found in ledger")]
    LedgerKeyNotFound(String),

    #[error("failed to read ledger at {path}: {message}")]
    LedgerRead { path: Utf8PathBuf, message: String },

    #[error("failed to write ledger at {path}: {message}")]
    LedgerWrite { path: Utf8PathBuf, message: String },

    #[error("invalid ledger table: {0}")]
    LedgerFormat(String),

    #[error("invalid rule table: {0}")]
    RuleTable(String),

    #[error("malformed subject folder name: {0}")]
    MalformedIdentifier(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
