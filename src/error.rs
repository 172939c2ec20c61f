//! Error types for invoice-desk.
//!
//! Every fallible library operation returns [`Result`]; the binary turns the
//! error into a one-line message.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse record: {0}")]
    TomlRead(#[from] toml::de::Error),

    #[error("Failed to write record: {0}")]
    TomlWrite(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),

    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("{kind} already exists: {id}")]
    AlreadyExists { kind: &'static str, id: String },

    #[error("Cannot {action} {kind} {id} while it is {status}")]
    InvalidTransition {
        kind: &'static str,
        id: String,
        status: String,
        action: &'static str,
    },

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Monthly invoice limit of {limit} reached")]
    LimitReached { limit: u32 },

    #[error("Prompt cancelled: {0}")]
    Prompt(#[from] inquire::InquireError),
}

impl AppError {
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound { kind, id: id.into() }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
