//! Timed throttle scripts such as `0:open,2000:close`.

use std::str::FromStr;

use tachometer_core::{Command, Timestamp};
use thiserror::Error;

/// Errors reported while parsing a throttle script.
#[derive(Clone, Debug, PartialEq, Error)]
pub(crate) enum ScriptError {
    /// An entry was not of the form `<millis>:<action>`.
    #[error("script entry '{0}' is not of the form <millis>:<action>")]
    MalformedEntry(String),
    /// The action was neither `open` nor `close`.
    #[error("unknown throttle action '{0}' (expected open or close)")]
    UnknownAction(String),
    /// The time was not a finite, non-negative number of milliseconds.
    #[error("invalid script time '{0}'")]
    InvalidTime(String),
    /// Entries must be listed in chronological order.
    #[error("script entry at {next}ms comes after an entry at {previous}ms")]
    UnorderedTimes {
        /// Time of the preceding entry.
        previous: f64,
        /// Time of the out-of-order entry.
        next: f64,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ThrottleAction {
    Open,
    Close,
}

impl ThrottleAction {
    fn command(self) -> Command {
        match self {
            Self::Open => Command::OpenThrottle,
            Self::Close => Command::CloseThrottle,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct ScriptStep {
    at_ms: f64,
    action: ThrottleAction,
}

/// Chronological list of throttle actions.
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct ThrottleScript {
    steps: Vec<ScriptStep>,
}

impl ThrottleScript {
    /// Number of scripted actions.
    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    /// Starts replaying the script from its first entry.
    pub(crate) fn into_cursor(self) -> ScriptCursor {
        ScriptCursor {
            steps: self.steps,
            next: 0,
        }
    }
}

impl FromStr for ThrottleScript {
    type Err = ScriptError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(Self::default());
        }

        let mut steps: Vec<ScriptStep> = Vec::new();
        for entry in value.split(',').map(str::trim) {
            let (time, action) = entry
                .split_once(':')
                .ok_or_else(|| ScriptError::MalformedEntry(entry.to_owned()))?;

            let at_ms = time
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|millis| millis.is_finite() && *millis >= 0.0)
                .ok_or_else(|| ScriptError::InvalidTime(time.trim().to_owned()))?;

            let action = match action.trim().to_ascii_lowercase().as_str() {
                "open" => ThrottleAction::Open,
                "close" => ThrottleAction::Close,
                other => return Err(ScriptError::UnknownAction(other.to_owned())),
            };

            if let Some(previous) = steps.last() {
                if at_ms < previous.at_ms {
                    return Err(ScriptError::UnorderedTimes {
                        previous: previous.at_ms,
                        next: at_ms,
                    });
                }
            }
            steps.push(ScriptStep { at_ms, action });
        }

        Ok(Self { steps })
    }
}

/// Replays a script against the simulation clock.
#[derive(Clone, Debug)]
pub(crate) struct ScriptCursor {
    steps: Vec<ScriptStep>,
    next: usize,
}

impl ScriptCursor {
    /// Yields every command whose time has been reached by `now`, each exactly once.
    pub(crate) fn due(&mut self, now: Timestamp) -> impl Iterator<Item = Command> + '_ {
        let start = self.next;
        while self
            .steps
            .get(self.next)
            .map_or(false, |step| step.at_ms <= now.as_millis())
        {
            self.next += 1;
        }
        self.steps[start..self.next]
            .iter()
            .map(|step| step.action.command())
    }
}
