//! Control commands
//!
//! Every user or remote action enters the engine as a `Command`, whatever the
//! transport (button handler, data channel, polling relay). The remote wire format
//! is the small JSON object peers already send: `{"command": "start"}`.

use crate::core_modules::rotation::Runner;
use crate::pipeline::CrossingOutcome;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteCommand {
    Start,
    Stop,
    Reset,
}

#[derive(Deserialize)]
struct RemoteEnvelope {
    command: RemoteCommand,
}

impl RemoteCommand {
    /// Parses a remote payload. Anything malformed is `None` and must be ignored.
    pub fn parse(payload: &str) -> Option<Self> {
        match serde_json::from_str::<RemoteEnvelope>(payload) {
            Ok(envelope) => Some(envelope.command),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed remote payload");
                None
            }
        }
    }

    pub fn to_payload(self) -> String {
        let name = match self {
            RemoteCommand::Start => "start",
            RemoteCommand::Stop => "stop",
            RemoteCommand::Reset => "reset",
        };
        format!(r#"{{"command":"{name}"}}"#)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Remote(RemoteCommand),
    /// End-of-round acknowledgment.
    ConfirmRound,
    /// Manual sensitivity override; clamped to the threshold bounds.
    SetThreshold(f64),
    AddRunner(Option<String>),
    Reset,
}

impl From<RemoteCommand> for Command {
    fn from(command: RemoteCommand) -> Self {
        Command::Remote(command)
    }
}

/// What dispatching a command did.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Precondition failed; no state changed.
    Ignored,
    /// A remote start or stop reached the timer.
    Timer(CrossingOutcome),
    RoundConfirmed { round: u32 },
    ThresholdSet { applied: f64 },
    RunnerAdded(Runner),
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(RemoteCommand::parse(r#"{"command":"start"}"#), Some(RemoteCommand::Start));
        assert_eq!(RemoteCommand::parse(r#"{"command":"stop","data":null}"#), Some(RemoteCommand::Stop));
        assert_eq!(RemoteCommand::parse(r#"{ "command" : "reset" }"#), Some(RemoteCommand::Reset));
    }

    #[test]
    fn malformed_payloads_are_none() {
        assert_eq!(RemoteCommand::parse("start"), None);
        assert_eq!(RemoteCommand::parse(r#"{"command":"launch"}"#), None);
        assert_eq!(RemoteCommand::parse(r#"{"cmd":"start"}"#), None);
        assert_eq!(RemoteCommand::parse(""), None);
    }

    #[test]
    fn payload_parses_back() {
        for command in [RemoteCommand::Start, RemoteCommand::Stop, RemoteCommand::Reset] {
            assert_eq!(RemoteCommand::parse(&command.to_payload()), Some(command));
        }
    }
}
