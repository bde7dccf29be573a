use admit_core::{
    audit::AuditError,
    quota::{QuotaError, RuleError, RuleSetError},
    store::StoreError,
};
use std::fmt;

#[derive(Debug)]
pub enum CliError {
    Config(String),
    Io(String),
    Store(String),
    General(String),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
            Self::Store(msg) => write!(f, "Store error: {msg}"),
            Self::General(msg) => write!(f, "Error: {msg}"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<std::io::Error> for CliError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(error: serde_json::Error) -> Self {
        Self::General(error.to_string())
    }
}

impl From<StoreError> for CliError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}

impl From<QuotaError> for CliError {
    fn from(error: QuotaError) -> Self {
        match error {
            QuotaError::Store(e) => e.into(),
            config @ QuotaError::Config { .. } => Self::Config(config.to_string()),
        }
    }
}

impl From<RuleSetError> for CliError {
    fn from(error: RuleSetError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<RuleError> for CliError {
    fn from(error: RuleError) -> Self {
        Self::Config(error.to_string())
    }
}

impl From<AuditError> for CliError {
    fn from(error: AuditError) -> Self {
        Self::Config(error.to_string())
    }
}

pub type CliResult<T> = Result<T, CliError>;

pub fn print_success(message: &str) {
    println!("[SUCCESS] {message}");
}

pub fn print_error(message: &str) {
    eprintln!("[ERROR] {message}");
}

pub fn print_info(message: &str) {
    println!("[INFO] {message}");
}
