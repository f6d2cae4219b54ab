//! Command and response wire types
//!
//! One JSON object per line. The command name lives in the `command` field
//! next to the envelope fields:
//!
//! ```json
//! {"request_id":"r1","caller":{"member_id":"42","display_name":"Ava"},"command":"study_start"}
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::progression::{
    LeaderboardEntry, MemberProfile, ProgressUpdate, Registered, SessionStarted,
};
use crate::roles::ReconcileReport;
use crate::types::MemberId;

// ─────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────

/// Identity already authenticated by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub member_id: MemberId,
    pub display_name: String,

    /// Platform administrator flag
    #[serde(default)]
    pub privileged: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandEnvelope {
    /// Echoed back on the response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    pub caller: Caller,

    #[serde(flatten)]
    pub command: Command,
}

/// Commands accepted by the engine.
///
/// `member_id` defaults to the caller; naming another member needs the
/// privilege flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    Register {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_id: Option<MemberId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        school: String,
        gender: String,
        age: u32,
    },
    StudyStart {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_id: Option<MemberId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
    },
    StudyComplete {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_id: Option<MemberId>,
    },
    AddPoints {
        member_id: MemberId,
        delta: u64,
    },
    Leaderboard {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        limit: Option<usize>,
    },
    Profile {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        member_id: Option<MemberId>,
    },
    Resync {
        member_id: MemberId,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Register { .. } => "register",
            Command::StudyStart { .. } => "study_start",
            Command::StudyComplete { .. } => "study_complete",
            Command::AddPoints { .. } => "add_points",
            Command::Leaderboard { .. } => "leaderboard",
            Command::Profile { .. } => "profile",
            Command::Resync { .. } => "resync",
        }
    }

    /// Always requires the privilege flag, whoever the target is
    pub fn is_privileged(&self) -> bool {
        matches!(self, Command::AddPoints { .. } | Command::Resync { .. })
    }
}

// ─────────────────────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CommandOutput {
    Registered(Registered),
    SessionStarted(SessionStarted),
    Progress(ProgressUpdate),
    Leaderboard { entries: Vec<LeaderboardEntry> },
    Profile(MemberProfile),
    Resynced(ReconcileReport),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    /// Stable code such as "E302"
    pub code: String,
    pub kind: &'static str,
    pub message: String,
}

impl From<&Error> for ErrorBody {
    fn from(error: &Error) -> Self {
        let kind = match error {
            Error::PermissionDenied { .. } => "permission_denied",
            Error::NotFound { .. } => "not_found",
            Error::Conflict { .. } => "conflict",
            Error::InvalidInput { .. } => "invalid_input",
            Error::MalformedCommand { .. } => "malformed_command",
            Error::Collaborator { .. } => "collaborator_failure",
            Error::IoRead { .. }
            | Error::IoWrite { .. }
            | Error::Io(_)
            | Error::StorageCorrupt { .. }
            | Error::Json(_) => "storage",
            _ => "internal",
        };
        Self {
            code: error.code().as_str(),
            kind,
            message: error.to_string(),
        }
    }
}

/// One response line
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<CommandOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl CommandResponse {
    pub fn success(request_id: Option<String>, output: CommandOutput) -> Self {
        Self {
            request_id,
            ok: true,
            result: Some(output),
            error: None,
        }
    }

    pub fn failure(request_id: Option<String>, error: &Error) -> Self {
        Self {
            request_id,
            ok: false,
            result: None,
            error: Some(error.into()),
        }
    }
}
