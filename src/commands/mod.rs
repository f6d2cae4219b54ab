//! Command boundary
//!
//! Decodes JSON command lines, applies privilege rules and routes each
//! command to the progression engine.

mod handler;
mod messages;

pub use handler::CommandHandler;
pub use messages::{Caller, Command, CommandEnvelope, CommandOutput, CommandResponse, ErrorBody};
