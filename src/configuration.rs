//! Config for the tester behaviors
//!
//! Configuration can be created programmatically using [`Configuration::new()`] or by reading
//! environment variables using [`Configuration::from_env()`].
//!
//! # Environment Variables
//!
//! The following environment variables can be used to override configuration values. All
//! values are optional. Flags are case-insensitive; set them to `"true"` to enable them.
//!
//! - `TESTER_ROWS`: Number of rows of the board (default: `10`)
//! - `TESTER_COLS`: Number of columns of the board (default: `10`)
//! - `TESTER_SMALLEST_SHIP`: Size of the smallest ship (default: `2`)
//! - `TESTER_LARGEST_SHIP`: Size of the largest ship (default: `5`)
//! - `TESTER_ITERATIONS`: Rounds played per AI (default: `100`)
//! - `TESTER_WAIT_MS`: Time allowed for each guess, in milliseconds (default: `500`)
//! - `TESTER_AI`: Comma separated AI ids, or `all` (default: `all`)
//! - `TESTER_VERBOSE`: Print live progress (default: `true`)
//! - `TESTER_LOG`: Enable logging to a file (default: `false`)
//! - `TESTER_MAX_PARALLEL`: Sessions running at the same time (default: number of CPUs)

use std::{env, time::Duration};

use crate::layout::{GameLayout, LayoutError, ShipDefinition};

/// Which AIs of the program are tested.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AiSelection {
    /// Every AI the program reports through `<program> ai`.
    #[default]
    All,
    Ids(Vec<usize>),
}

impl AiSelection {
    /// `"all"` or a comma separated list of ids.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.eq_ignore_ascii_case("all") {
            return Some(AiSelection::All);
        }
        text.split(',')
            .map(|id| id.trim().parse().ok())
            .collect::<Option<Vec<_>>>()
            .map(AiSelection::Ids)
    }
}

/// Configuration for tester behaviors.
#[derive(Debug, Clone)]
pub struct Configuration {
    pub(crate) rows: u16,
    pub(crate) cols: u16,
    pub(crate) smallest_ship: u8,
    pub(crate) largest_ship: u8,
    pub(crate) iterations: usize,
    pub(crate) wait_upto_millis: u64,
    pub(crate) ai_selection: AiSelection,
    pub(crate) verbose: bool,
    pub(crate) log: bool,
    pub(crate) max_parallel_sessions: usize,
}

impl Configuration {
    /// Create a new configuration with default parameters.
    ///
    /// By default:
    /// - The board is 10x10 with ships of sizes 2 to 5.
    /// - Each AI plays 100 rounds, with 500 ms allowed per guess.
    /// - Every AI of the program is tested.
    /// - The tester prints progress to stdout.
    /// - Logging to file is disabled.
    /// - As many sessions as CPUs run at the same time.
    pub fn new() -> Self {
        Self {
            rows: 10,
            cols: 10,
            smallest_ship: 2,
            largest_ship: 5,
            iterations: 100,
            wait_upto_millis: 500,
            ai_selection: AiSelection::All,
            verbose: true,
            log: false,
            max_parallel_sessions: num_cpus::get().max(1),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// Any unset or unparsable variable keeps its default value. See the module documentation
    /// for the list of variables.
    pub fn from_env() -> Self {
        fn get_env_flag(var: &str, default: bool) -> bool {
            match env::var(var) {
                Ok(val) => val.eq_ignore_ascii_case("true"),
                Err(_) => default,
            }
        }

        fn get_env<T: std::str::FromStr>(var: &str, default: T) -> T {
            env::var(var)
                .ok()
                .and_then(|val| val.trim().parse().ok())
                .unwrap_or(default)
        }

        let defaults = Self::new();
        Self {
            rows: get_env("TESTER_ROWS", defaults.rows),
            cols: get_env("TESTER_COLS", defaults.cols),
            smallest_ship: get_env("TESTER_SMALLEST_SHIP", defaults.smallest_ship),
            largest_ship: get_env("TESTER_LARGEST_SHIP", defaults.largest_ship),
            iterations: get_env("TESTER_ITERATIONS", defaults.iterations),
            wait_upto_millis: get_env("TESTER_WAIT_MS", defaults.wait_upto_millis),
            ai_selection: env::var("TESTER_AI")
                .ok()
                .and_then(|val| AiSelection::parse(&val))
                .unwrap_or(defaults.ai_selection),
            verbose: get_env_flag("TESTER_VERBOSE", defaults.verbose),
            log: get_env_flag("TESTER_LOG", defaults.log),
            max_parallel_sessions: get_env("TESTER_MAX_PARALLEL", defaults.max_parallel_sessions)
                .max(1),
        }
    }

    /// Set the board size.
    pub fn with_board(mut self, rows: u16, cols: u16) -> Self {
        self.rows = rows;
        self.cols = cols;
        self
    }

    /// Set the smallest and largest ship sizes.
    pub fn with_ships(mut self, smallest: u8, largest: u8) -> Self {
        self.smallest_ship = smallest;
        self.largest_ship = largest;
        self
    }

    /// Set the number of rounds played per AI.
    pub fn with_iterations(mut self, value: usize) -> Self {
        self.iterations = value;
        self
    }

    /// Set the time allowed for each guess, in milliseconds.
    pub fn with_wait_upto_millis(mut self, value: u64) -> Self {
        self.wait_upto_millis = value;
        self
    }

    /// Select the AIs to test.
    pub fn with_ai_selection(mut self, value: AiSelection) -> Self {
        self.ai_selection = value;
        self
    }

    /// Enable or disable progress output.
    pub fn with_verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    /// Enable or disable logging to file.
    pub fn with_log(mut self, value: bool) -> Self {
        self.log = value;
        self
    }

    /// Set how many sessions may run at the same time. Zero is treated as one.
    pub fn with_max_parallel_sessions(mut self, value: usize) -> Self {
        self.max_parallel_sessions = value.max(1);
        self
    }

    /// Board and fleet described by this configuration.
    pub fn layout(&self) -> Result<GameLayout, LayoutError> {
        GameLayout::new(
            ShipDefinition::new(self.smallest_ship),
            ShipDefinition::new(self.largest_ship),
            self.rows,
            self.cols,
        )
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn wait(&self) -> Duration {
        Duration::from_millis(self.wait_upto_millis)
    }

    pub fn ai_selection(&self) -> &AiSelection {
        &self.ai_selection
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    pub fn log(&self) -> bool {
        self.log
    }

    pub fn max_parallel_sessions(&self) -> usize {
        self.max_parallel_sessions
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}
