//! Command dispatch with privilege checks

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::progression::{Progression, Registration};
use crate::types::MemberId;

use super::messages::{Caller, Command, CommandEnvelope, CommandOutput, CommandResponse};

pub struct CommandHandler {
    progression: Arc<Progression>,
}

impl CommandHandler {
    pub fn new(progression: Arc<Progression>) -> Self {
        Self { progression }
    }

    /// Decode and execute one JSON line
    pub async fn handle_line(&self, line: &str) -> CommandResponse {
        match serde_json::from_str::<CommandEnvelope>(line) {
            Ok(envelope) => self.handle(envelope).await,
            Err(e) => {
                let error = Error::MalformedCommand {
                    message: e.to_string(),
                };
                debug!(error = %error, "Rejected command line");
                CommandResponse::failure(None, &error)
            }
        }
    }

    pub async fn handle(&self, envelope: CommandEnvelope) -> CommandResponse {
        let CommandEnvelope {
            request_id,
            caller,
            command,
        } = envelope;
        let name = command.name();

        match self.dispatch(&caller, command).await {
            Ok(output) => CommandResponse::success(request_id, output),
            Err(e) => {
                if e.is_collaborator_failure() {
                    warn!(command = name, caller = %caller.member_id, error = %e, "Command failed");
                } else {
                    debug!(command = name, caller = %caller.member_id, error = %e, "Command rejected");
                }
                CommandResponse::failure(request_id, &e)
            }
        }
    }

    async fn dispatch(&self, caller: &Caller, command: Command) -> Result<CommandOutput> {
        if command.is_privileged() && !caller.privileged {
            return Err(Error::permission_denied(command.name()));
        }
        let name = command.name();

        match command {
            Command::Register {
                member_id,
                display_name,
                school,
                gender,
                age,
            } => {
                let (member_id, display_name) = on_behalf(caller, member_id, display_name, name)?;
                let registered = self
                    .progression
                    .registration()
                    .register(Registration {
                        member_id,
                        display_name,
                        school,
                        gender,
                        age,
                    })
                    .await?;
                Ok(CommandOutput::Registered(registered))
            }
            Command::StudyStart {
                member_id,
                display_name,
            } => {
                let (member_id, display_name) = on_behalf(caller, member_id, display_name, name)?;
                let started = self
                    .progression
                    .sessions()
                    .start(&member_id, &display_name)
                    .await?;
                Ok(CommandOutput::SessionStarted(started))
            }
            Command::StudyComplete { member_id } => {
                let (member_id, _) = on_behalf(caller, member_id, None, name)?;
                let update = self.progression.sessions().complete(&member_id).await?;
                Ok(CommandOutput::Progress(update))
            }
            Command::AddPoints { member_id, delta } => {
                let update = self.progression.points().add_points(&member_id, delta).await?;
                Ok(CommandOutput::Progress(update))
            }
            Command::Leaderboard { limit } => {
                let leaderboard = self.progression.leaderboard();
                let entries = match limit {
                    Some(n) => leaderboard.top(n).await?,
                    None => leaderboard.top_default().await?,
                };
                Ok(CommandOutput::Leaderboard { entries })
            }
            Command::Profile { member_id } => {
                let member_id = member_id.unwrap_or_else(|| caller.member_id.clone());
                let profile = self.progression.profile(&member_id).await?;
                Ok(CommandOutput::Profile(profile))
            }
            Command::Resync { member_id } => {
                let report = self.progression.resync(&member_id).await?;
                Ok(CommandOutput::Resynced(report))
            }
        }
    }
}

/// Resolve the target member; acting for someone else needs privilege
fn on_behalf(
    caller: &Caller,
    member_id: Option<MemberId>,
    display_name: Option<String>,
    operation: &str,
) -> Result<(MemberId, String)> {
    match member_id {
        Some(target) if target != caller.member_id => {
            if !caller.privileged {
                return Err(Error::permission_denied(format!("{} for another member", operation)));
            }
            let display_name = display_name.unwrap_or_else(|| target.to_string());
            Ok((target, display_name))
        }
        _ => Ok((
            caller.member_id.clone(),
            display_name.unwrap_or_else(|| caller.display_name.clone()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::progression::harness::{harness, Harness};
    use crate::store::ProgressionStore;

    fn handler(h: Harness) -> (CommandHandler, Harness) {
        (CommandHandler::new(h.progression.clone()), h)
    }

    async fn run(handler: &CommandHandler, line: Value) -> Value {
        serde_json::to_value(handler.handle_line(&line.to_string()).await).unwrap()
    }

    fn caller(id: &str, privileged: bool) -> Value {
        json!({"member_id": id, "display_name": format!("user-{}", id), "privileged": privileged})
    }

    #[tokio::test]
    async fn test_study_cycle_through_commands() {
        let (handler, _h) = handler(harness());

        let started = run(&handler, json!({"request_id": "1", "caller": caller("42", false), "command": "study_start"})).await;
        assert_eq!(started["ok"], true);
        assert_eq!(started["request_id"], "1");
        assert_eq!(started["result"]["kind"], "session_started");
        assert_eq!(started["result"]["created"], true);

        let done = run(&handler, json!({"caller": caller("42", false), "command": "study_complete"})).await;
        assert_eq!(done["result"]["kind"], "progress");
        assert_eq!(done["result"]["points"], 10);
        assert_eq!(done["result"]["role_sync"]["status"], "unchanged");
    }

    #[tokio::test]
    async fn test_add_points_requires_privilege() {
        let (handler, h) = handler(harness());
        h.seed("7", 0).await;

        let denied = run(&handler, json!({"caller": caller("42", false), "command": "add_points", "member_id": "7", "delta": 5})).await;
        assert_eq!(denied["ok"], false);
        assert_eq!(denied["error"]["kind"], "permission_denied");

        let allowed = run(&handler, json!({"caller": caller("42", true), "command": "add_points", "member_id": "7", "delta": 5})).await;
        assert_eq!(allowed["result"]["points"], 5);
    }

    #[tokio::test]
    async fn test_acting_for_another_member_requires_privilege() {
        let (handler, h) = handler(harness());

        let denied = run(&handler, json!({"caller": caller("42", false), "command": "study_start", "member_id": "7"})).await;
        assert_eq!(denied["error"]["kind"], "permission_denied");
        assert!(h.store.get(&MemberId::new("7")).await.unwrap().is_none());

        let own = run(&handler, json!({"caller": caller("42", false), "command": "study_start", "member_id": "42"})).await;
        assert_eq!(own["ok"], true);

        let admin = run(&handler, json!({"caller": caller("1", true), "command": "study_start", "member_id": "7", "display_name": "Kai"})).await;
        assert_eq!(admin["result"]["record"]["display_name"], "Kai");
    }

    #[tokio::test]
    async fn test_register_uses_caller_identity() {
        let (handler, _h) = handler(harness());

        let registered = run(&handler, json!({"caller": caller("42", false), "command": "register", "school": "Grimward", "gender": "Non-biner", "age": 16})).await;
        assert_eq!(registered["result"]["kind"], "registered");
        assert_eq!(registered["result"]["record"]["member_id"], "42");
        assert_eq!(registered["result"]["record"]["display_name"], "user-42");

        let again = run(&handler, json!({"caller": caller("42", false), "command": "register", "school": "Grimward", "gender": "Non-biner", "age": 16})).await;
        assert_eq!(again["error"]["kind"], "conflict");
    }

    #[tokio::test]
    async fn test_malformed_lines() {
        let (handler, _h) = handler(harness());

        let garbage = serde_json::to_value(handler.handle_line("not json").await).unwrap();
        assert_eq!(garbage["error"]["kind"], "malformed_command");
        assert_eq!(garbage["error"]["code"], "E305");

        let negative = run(&handler, json!({"caller": caller("1", true), "command": "add_points", "member_id": "7", "delta": -5})).await;
        assert_eq!(negative["error"]["kind"], "malformed_command");
    }

    #[tokio::test]
    async fn test_leaderboard_and_profile() {
        let (handler, h) = handler(harness());
        h.seed("b", 30).await;
        h.seed("a", 30).await;
        h.seed("c", 60).await;

        let board = run(&handler, json!({"caller": caller("a", false), "command": "leaderboard", "limit": 2})).await;
        let entries = board["result"]["entries"].as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["member_id"], "c");
        assert_eq!(entries[1]["member_id"], "a");
        assert_eq!(entries[1]["position"], 2);

        let profile = run(&handler, json!({"caller": caller("a", false), "command": "profile"})).await;
        assert_eq!(profile["result"]["next_rank"], "Ember");
        assert_eq!(profile["result"]["points_to_next"], 20);
    }
}
