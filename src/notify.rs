//! Announcements for registrations and rank changes
//!
//! Publishing is fire-and-forget: a failed publish is logged and reported as
//! a warning, never as a command failure.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{MemberId, ProgressionRecord, RankChange};

// ─────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    RegistrationCompleted {
        event_id: Uuid,
        at: DateTime<Utc>,
        member_id: MemberId,
        display_name: String,
        school: String,
        gender: String,
        age: u32,
        rank: String,
    },
    RankChanged {
        event_id: Uuid,
        at: DateTime<Utc>,
        member_id: MemberId,
        display_name: String,
        from: String,
        to: String,
        points: u64,
    },
}

impl ProgressEvent {
    /// Announcement for a freshly registered member.
    ///
    /// Returns `None` for records without registration attributes.
    pub fn registration(record: &ProgressionRecord) -> Option<Self> {
        Some(ProgressEvent::RegistrationCompleted {
            event_id: Uuid::new_v4(),
            at: Utc::now(),
            member_id: record.member_id.clone(),
            display_name: record.display_name.clone(),
            school: record.school.clone()?,
            gender: record.gender.clone()?,
            age: record.age?,
            rank: record.rank.clone(),
        })
    }

    pub fn rank_changed(record: &ProgressionRecord, change: &RankChange) -> Self {
        ProgressEvent::RankChanged {
            event_id: Uuid::new_v4(),
            at: Utc::now(),
            member_id: record.member_id.clone(),
            display_name: record.display_name.clone(),
            from: change.from.clone(),
            to: change.to.clone(),
            points: record.points,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProgressEvent::RegistrationCompleted { .. } => "registration_completed",
            ProgressEvent::RankChanged { .. } => "rank_changed",
        }
    }

    pub fn member_id(&self) -> &MemberId {
        match self {
            ProgressEvent::RegistrationCompleted { member_id, .. }
            | ProgressEvent::RankChanged { member_id, .. } => member_id,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Notifier Trait
// ─────────────────────────────────────────────────────────────────

/// External notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn publish(&self, event: ProgressEvent) -> Result<()>;
}

/// Publish, turning a failure into a logged warning string
pub async fn publish_or_warn(notifier: &dyn Notifier, event: ProgressEvent) -> Option<String> {
    let kind = event.kind();
    let member_id = event.member_id().clone();
    match notifier.publish(event).await {
        Ok(()) => None,
        Err(e) => {
            warn!(member_id = %member_id, event = kind, error = %e, "Failed to publish event");
            Some(e.to_string())
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Implementations
// ─────────────────────────────────────────────────────────────────

/// Writes events to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn publish(&self, event: ProgressEvent) -> Result<()> {
        match &event {
            ProgressEvent::RegistrationCompleted {
                member_id,
                display_name,
                school,
                rank,
                ..
            } => {
                info!(member_id = %member_id, name = %display_name, school = %school, rank = %rank, "New student registered");
            }
            ProgressEvent::RankChanged {
                member_id,
                display_name,
                from,
                to,
                points,
                ..
            } => {
                info!(member_id = %member_id, name = %display_name, from = %from, to = %to, points, "Rank changed");
            }
        }
        Ok(())
    }
}

/// Forwards events to a bounded channel without waiting
pub struct ChannelNotifier {
    tx: mpsc::Sender<ProgressEvent>,
}

impl ChannelNotifier {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn publish(&self, event: ProgressEvent) -> Result<()> {
        self.tx
            .try_send(event)
            .map_err(|e| Error::notify(format!("event channel unavailable: {}", e)))
    }
}
