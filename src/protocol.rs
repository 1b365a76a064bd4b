//! Line protocol spoken with the program under test.
//!
//! * Tester -> program: `E` (new round), `H` (hit), `M` (miss), `S<size>` (sunk a ship of that
//!   size), `Q` (quit), one per line.
//! * Program -> tester: one guess per line, as column letters followed by the row number
//!   (`c3`). A line starting with `-` means the program has no guess left.

use std::{fmt, io, time::Duration};

use thiserror::Error;

use crate::{
    game_state::{EndingState, GuessReport},
    layout::ShipDefinition,
    position::Position,
};

/// Message sent to the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    NewRound,
    Hit,
    Miss,
    Sunk(ShipDefinition),
    Quit,
}

impl Message {
    /// Wire form, newline included.
    pub fn to_line(self) -> String {
        format!("{self}\n")
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::NewRound => f.write_str("E"),
            Message::Hit => f.write_str("H"),
            Message::Miss => f.write_str("M"),
            Message::Sunk(ship) => write!(f, "S{}", ship.size),
            Message::Quit => f.write_str("Q"),
        }
    }
}

impl From<GuessReport> for Message {
    fn from(report: GuessReport) -> Self {
        match report {
            GuessReport::Hit(_) => Message::Hit,
            GuessReport::Miss => Message::Miss,
            GuessReport::Sink(ship) => Message::Sunk(ship),
        }
    }
}

/// Why no guess could be obtained from, or no answer delivered to, the program. Each failure
/// ends the current round only.
#[derive(Debug, Error)]
pub enum DriverFailure {
    #[error("no answer before the deadline")]
    Timeout,
    #[error("unable to read output: {0}")]
    UnableToReadOutput(String),
    #[error("program has no more guesses")]
    NoMoreGuesses,
    #[error("could not write to program: {0}")]
    ProgramError(#[source] io::Error),
    #[error("{0}")]
    Other(String),
}

impl From<&DriverFailure> for EndingState {
    fn from(failure: &DriverFailure) -> Self {
        match failure {
            DriverFailure::Timeout => EndingState::Timeout,
            DriverFailure::UnableToReadOutput(_) => EndingState::UnableToReadOutput,
            DriverFailure::NoMoreGuesses => EndingState::ProgramHasNoGuesses,
            DriverFailure::ProgramError(_) => EndingState::ProgramError,
            DriverFailure::Other(_) => EndingState::Other,
        }
    }
}

/// The program could not be started. Ends the whole session.
#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("no such program: '{0}'")]
    NotFound(String),
    #[error("could not start '{program}'")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Reads one response line of the program.
pub fn parse_response(line: &str) -> Result<Position, DriverFailure> {
    if line.starts_with('-') {
        return Err(DriverFailure::NoMoreGuesses);
    }
    Position::from_base26(line)
        .map_err(|e| DriverFailure::UnableToReadOutput(format!("'{}': {e}", line.trim_end())))
}

/// What a test runner needs from the program under test.
pub trait Candidate {
    /// Writes one message.
    fn send(&mut self, message: Message) -> Result<(), DriverFailure>;

    /// Waits up to `timeout` for the next guess.
    fn poll_guess(&mut self, timeout: Duration) -> Result<Position, DriverFailure>;

    /// Drops output produced after the previous round ended, such as a late answer.
    fn discard_pending_output(&mut self) {}

    /// Sends [`Message::Quit`] and releases the program.
    fn quit(&mut self) -> anyhow::Result<()>;
}
