use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Git command error: {0}")]
    Git(#[from] GitError),
    #[error("Extraction error: {0}")]
    Extract(#[from] ExtractError),
    #[error("I/O error while {0}: {1}")]
    IO(String, #[source] std::io::Error),
    #[error("Application error: {0}")]
    Generic(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read file '{0}': {1}")]
    FileRead(String, #[source] std::io::Error),
    #[error("Failed to parse TOML from file '{0}': {1}")]
    TomlParse(String, #[source] toml::de::Error),
    #[error("Repository path does not exist: {0}")]
    RepositoryMissing(String),
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("At least one include pattern is required")]
    NoIncludePatterns,
}

#[derive(Debug, Error)]
pub enum GitError {
    #[error("Git command failed: {command} (status {status_code:?}): {stderr}")]
    CommandFailed {
        command: String,
        status_code: Option<i32>,
        stderr: String,
    },
    #[error("Failed to spawn git: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Invalid git reference: {0}")]
    InvalidReference(String),
    #[error("Not a git repository: {0}")]
    NotARepository(String),
}

/// Raised when a revision of a source file cannot be turned into a
/// structural model. Recoverable: callers degrade to an empty model.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Syntax error in {file}")]
    Syntax { file: String },
    #[error("Parser produced no tree for {file}")]
    Parse { file: String },
    #[error("Failed to load Python grammar: {0}")]
    Language(String),
}

pub fn generic_error<S: Into<String>>(msg: S) -> AppError {
    AppError::Generic(msg.into())
}
