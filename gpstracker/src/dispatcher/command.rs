//! Commands and the messages carried by the dispatcher queue.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sensor::SensorEvent;
use crate::timer::TimerExpiry;
use crate::tracking::{TimerKind, WireError};

/// A payload-free command from a client or from the service itself.
///
/// The integer codes are a wire contract shared with clients on the far
/// side of a binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    /// Stop logging and end the dispatcher. Terminal.
    StopService,
    /// Subscribe to the receiver and start logging.
    StartLogging,
    /// Unsubscribe and cancel every timer.
    StopLogging,
    /// Re-subscribe after a power-save cycle.
    TurnOnSensor,
    /// Publish the current status.
    RequestStatus,
}

impl Command {
    /// Every command, in code order.
    pub const ALL: [Command; 5] = [
        Command::StopService,
        Command::StartLogging,
        Command::StopLogging,
        Command::TurnOnSensor,
        Command::RequestStatus,
    ];

    /// Wire code.
    pub fn code(self) -> i32 {
        match self {
            Command::StopService => 1,
            Command::StartLogging => 2,
            Command::StopLogging => 3,
            Command::TurnOnSensor => 4,
            Command::RequestStatus => 5,
        }
    }

    /// Decode a wire code.
    pub fn from_code(code: i32) -> Result<Self, WireError> {
        Command::ALL
            .into_iter()
            .find(|command| command.code() == code)
            .ok_or(WireError::UnknownCommand(code))
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Command::StopService => "stop-service",
            Command::StartLogging => "start-logging",
            Command::StopLogging => "stop-logging",
            Command::TurnOnSensor => "turn-on-sensor",
            Command::RequestStatus => "request-status",
        };
        f.write_str(s)
    }
}

/// One entry in the dispatcher queue.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchMessage {
    /// A client or service command.
    Command(Command),
    /// A receiver callback.
    Sensor(SensorEvent),
    /// A tracking timer fired.
    TimerExpired { timer: TimerKind, expiry: TimerExpiry },
}

impl From<Command> for DispatchMessage {
    fn from(command: Command) -> Self {
        DispatchMessage::Command(command)
    }
}

impl From<SensorEvent> for DispatchMessage {
    fn from(event: SensorEvent) -> Self {
        DispatchMessage::Sensor(event)
    }
}
