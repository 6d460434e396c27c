//! Discrete one-shot commands with client-side debounce.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_COMMAND_DEBOUNCE: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Grab,
    Release,
    Throw,
    Start,
}

impl Command {
    pub const ALL: [Command; 4] = [Command::Grab, Command::Release, Command::Throw, Command::Start];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Grab => "grab",
            Command::Release => "release",
            Command::Throw => "throw",
            Command::Start => "start",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported command: {0}")]
pub struct UnknownCommand(pub String);

impl FromStr for Command {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Command::ALL
            .into_iter()
            .find(|command| command.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownCommand(s.to_string()))
    }
}

/// Why an invocation was not fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CommandRejection {
    #[error("no device connected")]
    NotConnected,

    #[error("debounced, last fire {elapsed:?} ago")]
    Debounced { elapsed: Duration },
}

/// Tracks the last accepted fire per command.
#[derive(Debug, Clone)]
pub struct CommandInvoker {
    window: Duration,
    last_fire: HashMap<Command, Instant>,
}

impl CommandInvoker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_fire: HashMap::new(),
        }
    }

    /// Accepts the invocation if the link is up and the command is outside its
    /// debounce window. Only accepted invocations restart the window.
    pub fn invoke(
        &mut self,
        command: Command,
        connected: bool,
        now: Instant,
    ) -> Result<(), CommandRejection> {
        if !connected {
            return Err(CommandRejection::NotConnected);
        }

        if let Some(last) = self.last_fire.get(&command) {
            let elapsed = now.saturating_duration_since(*last);
            if elapsed < self.window {
                debug!("Command {} debounced ({:?} since last fire)", command, elapsed);
                return Err(CommandRejection::Debounced { elapsed });
            }
        }

        self.last_fire.insert(command, now);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.last_fire.clear();
    }
}

impl Default for CommandInvoker {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_DEBOUNCE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_fire_inside_window_is_rejected() {
        let start = Instant::now();
        let mut invoker = CommandInvoker::default();

        assert_eq!(invoker.invoke(Command::Grab, true, start), Ok(()));
        assert!(matches!(
            invoker.invoke(Command::Grab, true, start + Duration::from_millis(119)),
            Err(CommandRejection::Debounced { .. })
        ));
        assert_eq!(
            invoker.invoke(Command::Grab, true, start + Duration::from_millis(120)),
            Ok(())
        );
    }

    #[test]
    fn rejected_fire_does_not_restart_window() {
        let start = Instant::now();
        let mut invoker = CommandInvoker::default();
        invoker.invoke(Command::Throw, true, start).unwrap();
        invoker
            .invoke(Command::Throw, true, start + Duration::from_millis(100))
            .unwrap_err();
        assert!(invoker
            .invoke(Command::Throw, true, start + Duration::from_millis(130))
            .is_ok());
    }

    #[test]
    fn controls_debounce_independently() {
        let start = Instant::now();
        let mut invoker = CommandInvoker::default();
        invoker.invoke(Command::Grab, true, start).unwrap();
        assert!(invoker.invoke(Command::Release, true, start).is_ok());
    }

    #[test]
    fn disconnected_invocations_are_rejected_without_consuming_window() {
        let start = Instant::now();
        let mut invoker = CommandInvoker::default();
        assert_eq!(
            invoker.invoke(Command::Start, false, start),
            Err(CommandRejection::NotConnected)
        );
        assert!(invoker.invoke(Command::Start, true, start).is_ok());
    }

    #[test]
    fn parses_command_names() {
        assert_eq!("grab".parse::<Command>(), Ok(Command::Grab));
        assert_eq!(" Release ".parse::<Command>(), Ok(Command::Release));
        assert_eq!(
            "lift".parse::<Command>(),
            Err(UnknownCommand("lift".to_string()))
        );
    }
}
