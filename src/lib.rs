//! # Battleship Tester
//!
//! A black-box test harness for battleship AI programs speaking a line protocol over their
//! standard streams.
//!
//! It provides:
//! - Random fleet placement on a configurable board (`placement`)
//! - Guess classification and per-round / per-session statistics (`game_state`, `stats`)
//! - Process supervision with per-guess deadlines (`process_driver`)
//! - One session per AI, run in parallel with live progress (`Harness`)
//! - A plain-text summary of the results (`report`)
//!
//! Each AI of the program under test runs as a separate OS process, started as
//! `<program> run --ai <id>`. The number of AIs is read from `<program> ai`.
//!
//! # Documentation Overview
//!
//! - For the session lifecycle and parallelism, see the [`harness`] module.
//! - For configuring the board, the number of rounds and the time budget, see
//!   [`Configuration`](crate::configuration::Configuration).
//! - For the wire format, see the [`protocol`] module.
//!
//! # Usage Example
//!
//! ```no_run
//! use battleship_tester::prelude::*;
//! use battleship_tester::report::{write_all, Palette};
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new()
//!         .with_board(10, 10)
//!         .with_ships(2, 5)
//!         .with_iterations(100)
//!         .with_wait_upto_millis(500);
//!
//!     let reports = Harness::new(config)?.run("./my_battleship_ai")?;
//!     write_all(&mut std::io::stdout(), &reports, Palette { enabled: true })?;
//!     Ok(())
//! }
//! ```
//!
//! ## Program Requirements
//!
//! - `<program> ai` prints the number of AIs it contains, then exits
//! - `<program> run --ai <id>` plays rounds until it reads `Q`:
//!  * Tester -> Program : `E` (new round), `H`, `M`, `S<size>` (result of the last guess), `Q`
//!  * Program -> Tester : one guess per line, column letters then row number (`c3`), or `-`
//!    when it has no guess left

pub use anyhow;
pub mod configuration;
pub mod game_state;
pub mod harness;
pub mod layout;
mod logger;
pub mod placement;
pub mod position;
pub mod process_driver;
pub mod protocol;
pub mod report;
pub mod stats;
pub mod test_runner;

/// Commonly used types for quick access.
///
/// Import this prelude to get started easily:
/// ```rust
/// use battleship_tester::prelude::*;
/// ```
pub mod prelude {
    pub use crate::configuration::{AiSelection, Configuration};
    pub use crate::game_state::EndingState;
    pub use crate::harness::Harness;
    pub use crate::layout::{GameLayout, ShipDefinition};
    pub use crate::position::Position;
    pub use crate::report::SessionReport;
    pub use crate::stats::GlobalStats;
}
