use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::PollingCache;
use crate::snapshot::{literal_matches, FieldReading};
use crate::transport::{CommandResponse, TransportError};

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command failed: {0}")]
    Transport(#[from] TransportError),
    #[error("{0} does not accept actions")]
    Unsupported(String),
}

/// How the remote's response tells whether the action took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// `response.result` is true when the action succeeded.
    ResultFlag,
    /// `response.<field>` echoes the field after the action.
    FieldEcho,
}

/// A binary field driven by one or two commands.
#[derive(Debug, Clone)]
pub struct BinaryCommand {
    pub field: String,
    pub on_literal: String,
    pub on_command: String,
    pub off_command: Option<String>,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandOutcome {
    /// The remote reports the intended state.
    Confirmed,
    /// The remote reports the opposite of the intended state.
    Contradicted,
    /// No command exists for this direction; nothing was sent.
    Skipped,
}

pub struct CommandExecutor {
    cache: Arc<PollingCache>,
    serial: Mutex<()>,
}

impl CommandExecutor {
    pub fn new(cache: Arc<PollingCache>) -> Self {
        Self {
            cache,
            serial: Mutex::new(()),
        }
    }

    pub fn cache(&self) -> &Arc<PollingCache> {
        &self.cache
    }

    /// Sends the command for `want_on` and patches the cached field with the
    /// state the response reports. Transport failures leave the cache as is.
    pub async fn execute(
        &self,
        command: &BinaryCommand,
        want_on: bool,
    ) -> Result<CommandOutcome, CommandError> {
        let name = if want_on {
            command.on_command.as_str()
        } else {
            match command.off_command.as_deref() {
                Some(name) => name,
                None => {
                    debug!(field = %command.field, "no off command configured, skipping");
                    return Ok(CommandOutcome::Skipped);
                }
            }
        };

        let _serial = self.serial.lock().await;
        debug!(command = name, "sending command");

        let response = match self.cache.transport().send_command(name).await {
            Ok(response) => response,
            Err(err) => {
                warn!(command = name, error = %err, "command failed");
                return Err(err.into());
            }
        };

        let took_effect = took_effect(command, &response, want_on);
        let now_on = took_effect == want_on;
        let on = Value::String(command.on_literal.clone());
        let reading = if now_on {
            FieldReading::Exact(on)
        } else {
            FieldReading::Not(on)
        };
        self.cache.patch(&command.field, reading);

        let outcome = if took_effect {
            CommandOutcome::Confirmed
        } else {
            CommandOutcome::Contradicted
        };
        info!(command = name, ?outcome, "command completed");
        Ok(outcome)
    }
}

fn took_effect(command: &BinaryCommand, response: &CommandResponse, want_on: bool) -> bool {
    match command.confirmation {
        Confirmation::ResultFlag => response.result_flag(),
        Confirmation::FieldEcho => {
            let reports_on = response
                .reported(&command.field)
                .is_some_and(|value| literal_matches(value, &command.on_literal));
            reports_on == want_on
        }
    }
}
