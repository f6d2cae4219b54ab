//! Error types for rebels-progress
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Retry classification for collaborator failures
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::types::MemberId;

/// Result type alias for progression operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // Storage errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoNotFound = 203,
    StorageCorrupt = 210,

    // Command rejections (3xx)
    PermissionDenied = 300,
    NotFound = 301,
    Conflict = 302,
    InvalidInput = 303,
    UnknownRank = 304,
    MalformedCommand = 305,

    // Collaborator errors (4xx)
    RoleCollaborator = 400,
    NotifyCollaborator = 401,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E302")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Which state-machine precondition a command violated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// A record already exists for the member
    AlreadyRegistered,
    /// `start` while a study session is already running
    SessionAlreadyActive,
    /// `complete` without a running study session
    NoActiveSession,
}

impl fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ConflictReason::AlreadyRegistered => "member is already registered",
            ConflictReason::SessionAlreadyActive => "a study session is already active",
            ConflictReason::NoActiveSession => "no study session is active",
        };
        f.write_str(text)
    }
}

/// External collaborator an error originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collaborator {
    Roles,
    Notifications,
}

impl fmt::Display for Collaborator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collaborator::Roles => f.write_str("role management"),
            Collaborator::Notifications => f.write_str("notifications"),
        }
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    // ─────────────────────────────────────────────────────────────
    // Storage Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Stored document could not be decoded
    #[error("Progression store at {path} is corrupt: {message}")]
    StorageCorrupt { path: PathBuf, message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Command Rejections
    // ─────────────────────────────────────────────────────────────

    /// Privileged operation without privilege
    #[error("Permission denied: '{operation}' requires the administrator flag")]
    PermissionDenied { operation: String },

    /// Operation requires a record that does not exist
    #[error("Member {member_id} is not registered")]
    NotFound { member_id: MemberId },

    /// State-machine precondition violated
    #[error("Conflict for member {member_id}: {reason}")]
    Conflict {
        member_id: MemberId,
        reason: ConflictReason,
    },

    /// Command argument rejected before any state change
    #[error("Invalid {field}: {message}")]
    InvalidInput { field: String, message: String },

    /// Rank name absent from the rank table
    #[error("Unknown rank: {name}")]
    UnknownRank { name: String },

    /// Command line could not be decoded
    #[error("Malformed command: {message}")]
    MalformedCommand { message: String },

    // ─────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────

    /// Role or notification call failed
    #[error("{collaborator} call failed: {message}")]
    Collaborator {
        collaborator: Collaborator,
        message: String,
        retryable: bool,
    },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::StorageCorrupt { .. } => ErrorCode::StorageCorrupt,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                _ => ErrorCode::IoRead,
            },
            Error::Json(_) => ErrorCode::StorageCorrupt,
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::PermissionDenied { .. } => ErrorCode::PermissionDenied,
            Error::NotFound { .. } => ErrorCode::NotFound,
            Error::Conflict { .. } => ErrorCode::Conflict,
            Error::InvalidInput { .. } => ErrorCode::InvalidInput,
            Error::UnknownRank { .. } => ErrorCode::UnknownRank,
            Error::MalformedCommand { .. } => ErrorCode::MalformedCommand,

            Error::Collaborator { collaborator, .. } => match collaborator {
                Collaborator::Roles => ErrorCode::RoleCollaborator,
                Collaborator::Notifications => ErrorCode::NotifyCollaborator,
            },

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Collaborator { retryable, .. } => *retryable,
            Error::Io(_) | Error::IoRead { .. } | Error::IoWrite { .. } => true,
            _ => false,
        }
    }

    /// Check if the error came from an external collaborator
    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self, Error::Collaborator { .. })
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'rebels-progress config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'rebels-progress config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Rank thresholds must start at 0 and strictly increase; names and role ids must be unique."
            ),
            Error::StorageCorrupt { .. } => Some(
                "Restore the progression store from a backup or point storage.path at a new file."
            ),
            Error::PermissionDenied { .. } => Some(
                "Ask a server administrator to run this command."
            ),
            Error::NotFound { .. } => Some(
                "The member must register (or start a study session) first."
            ),
            Error::Collaborator { .. } => Some(
                "Progress was saved. Run 'resync' for the member once the collaborator is reachable."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a config parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Error::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a permission denied error
    pub fn permission_denied(operation: impl Into<String>) -> Self {
        Error::PermissionDenied {
            operation: operation.into(),
        }
    }

    /// Create a not-found error
    pub fn not_found(member_id: &MemberId) -> Self {
        Error::NotFound {
            member_id: member_id.clone(),
        }
    }

    /// Create a conflict error
    pub fn conflict(member_id: &MemberId, reason: ConflictReason) -> Self {
        Error::Conflict {
            member_id: member_id.clone(),
            reason,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidInput {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a role collaborator failure
    pub fn roles(message: impl Into<String>, retryable: bool) -> Self {
        Error::Collaborator {
            collaborator: Collaborator::Roles,
            message: message.into(),
            retryable,
        }
    }

    /// Create a notification collaborator failure
    pub fn notify(message: impl Into<String>) -> Self {
        Error::Collaborator {
            collaborator: Collaborator::Notifications,
            message: message.into(),
            retryable: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
