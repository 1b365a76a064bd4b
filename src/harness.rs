//! Runs every selected AI of a program, one session per AI.
//!
//! The [`Harness`] resolves which AIs to test, starts one worker thread per AI (bounded by
//! [`Configuration::max_parallel_sessions`]), and collects a [`SessionReport`] for each of them.
//!
//! # Behavior & Configuration
//!
//! - The layout is validated before any program is started: a fleet that cannot be placed is a
//!   configuration error.
//! - With [`AiSelection::All`], the program is asked for its number of AIs by running
//!   `<program> ai`. Explicit ids are used as given, once each.
//! - When `config.verbose = true`, one progress line per AI is redrawn every 100 ms.
//! - A worker that panics only fails its own session; its report carries the panic message.
//!
//! # Example
//!
//! ```no_run
//! use battleship_tester::prelude::*;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Configuration::new().with_iterations(10);
//!     let reports = Harness::new(config)?.run("./my_battleship_ai")?;
//!     for report in &reports {
//!         println!("{}: {:?}", report.ai_id(), report.global_stats());
//!     }
//!     Ok(())
//! }
//! ```

use std::{
    any::Any,
    collections::{BTreeMap, VecDeque},
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;
use tracing::{error, info, instrument, trace, warn};

use crate::{
    configuration::{AiSelection, Configuration},
    game_state::GameSession,
    layout::GameLayout,
    logger::init_logger,
    placement::random_ships,
    process_driver::query_ai_count,
    report::SessionReport,
    test_runner::{Progress, SessionState, TestRunner},
};

const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);
const PROGRESS_BAR_WIDTH: usize = 20;
/// Lower bound of the time given to `<program> ai` to answer.
const MIN_AI_QUERY_WAIT: Duration = Duration::from_secs(1);

/// Supervisor of the test sessions of one program.
pub struct Harness {
    config: Configuration,
}

struct Worker {
    ai_id: usize,
    handle: JoinHandle<SessionReport>,
}

impl Harness {
    /// Create a [`Harness`]. Installs the file logger when `config.log` is set.
    #[instrument(skip_all)]
    pub fn new(config: Configuration) -> anyhow::Result<Harness> {
        if config.log {
            init_logger()?;
        }
        trace!(?config);
        Ok(Harness { config })
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    /// Tests every selected AI of `program` and returns their reports ordered by AI id.
    ///
    /// # Errors
    /// Returns an error if the layout is invalid, if no fleet fits on the board, or if the
    /// number of AIs cannot be read from the program.
    pub fn run(&self, program: &str) -> anyhow::Result<Vec<SessionReport>> {
        let layout = self.config.layout().context("invalid game layout")?;
        random_ships(&layout).context("invalid game layout")?;

        let ai_ids = self.resolve_ai_ids(program)?;
        info!(%program, ?ai_ids, "starting sessions");
        if ai_ids.is_empty() {
            warn!(%program, "no AI to test");
            return Ok(vec![]);
        }

        let _line_wrap = self.config.verbose.then(LineWrapGuard::disable);
        let mut reports = self.supervise(program, layout, ai_ids);
        reports.sort_by_key(SessionReport::ai_id);
        info!(sessions = reports.len(), "all sessions completed");
        Ok(reports)
    }

    fn resolve_ai_ids(&self, program: &str) -> anyhow::Result<Vec<usize>> {
        match self.config.ai_selection() {
            AiSelection::Ids(ids) => {
                let mut ids = ids.clone();
                ids.sort_unstable();
                ids.dedup();
                Ok(ids)
            }
            AiSelection::All => {
                let wait = self.config.wait().max(MIN_AI_QUERY_WAIT);
                let count = query_ai_count(program, wait)
                    .with_context(|| format!("could not get the number of AIs of '{program}'"))?;
                Ok((0..count).collect())
            }
        }
    }

    fn supervise(&self, program: &str, layout: GameLayout, ai_ids: Vec<usize>) -> Vec<SessionReport> {
        let max_parallel = self.config.max_parallel_sessions.max(1);
        let mut waiting = VecDeque::from(ai_ids.clone());
        let mut running: Vec<Worker> = vec![];
        let mut reports = Vec::with_capacity(ai_ids.len());
        let mut progress: BTreeMap<usize, Arc<Progress>> = BTreeMap::new();
        let mut board = ProgressBoard::default();

        loop {
            let mut index = 0;
            while index < running.len() {
                if running[index].handle.is_finished() {
                    reports.push(Self::join(running.swap_remove(index), program, layout));
                } else {
                    index += 1;
                }
            }

            while running.len() < max_parallel {
                let Some(ai_id) = waiting.pop_front() else {
                    break;
                };
                let runner = TestRunner::new(program, ai_id, layout, self.config.wait());
                progress.insert(ai_id, runner.progress());
                match self.launch(runner, ai_id) {
                    Ok(worker) => running.push(worker),
                    Err(e) => {
                        error!(ai = ai_id, "could not start session: {e:#}");
                        let session = GameSession::new(program, ai_id, layout);
                        reports.push(SessionReport::new(session, Some(format!("{e:#}"))));
                    }
                }
            }

            if self.config.verbose {
                board.draw(&ai_ids, &progress, self.config.iterations());
            }
            if running.is_empty() && waiting.is_empty() {
                break;
            }
            thread::sleep(PROGRESS_INTERVAL);
        }
        reports
    }

    fn launch(&self, mut runner: TestRunner, ai_id: usize) -> anyhow::Result<Worker> {
        let iterations = self.config.iterations();
        let handle = thread::Builder::new()
            .name(format!("ai-{ai_id}"))
            .spawn(move || {
                runner.start_tests(iterations);
                runner.into_report()
            })
            .context("could not spawn session thread")?;
        Ok(Worker { ai_id, handle })
    }

    fn join(worker: Worker, program: &str, layout: GameLayout) -> SessionReport {
        match worker.handle.join() {
            Ok(report) => report,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(ai = worker.ai_id, "session panicked: {message}");
                SessionReport::new(
                    GameSession::new(program, worker.ai_id, layout),
                    Some(format!("session panicked: {message}")),
                )
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

/// Progress lines, redrawn in place.
#[derive(Default)]
struct ProgressBoard {
    lines_drawn: usize,
}

impl ProgressBoard {
    fn draw(&mut self, ai_ids: &[usize], progress: &BTreeMap<usize, Arc<Progress>>, iterations: usize) {
        if self.lines_drawn > 0 {
            // cursor up
            print!("\x1b[{}A", self.lines_drawn);
        }
        for ai_id in ai_ids {
            let state = progress.get(ai_id).map(|p| p.state());
            // clear line, green id, default
            println!(
                "\x1b[2K\x1b[32m{ai_id}\x1b[39m :: {}",
                progress_line(state, iterations)
            );
        }
        let _ = std::io::Write::flush(&mut std::io::stdout());
        self.lines_drawn = ai_ids.len();
    }
}

fn progress_line(state: Option<SessionState>, iterations: usize) -> String {
    match state {
        None | Some(SessionState::NotStarted) => "waiting".to_owned(),
        Some(SessionState::Completed) => "done".to_owned(),
        Some(SessionState::Running(round)) => {
            let percent = (round * 100).checked_div(iterations).unwrap_or(100);
            let filled = (percent * PROGRESS_BAR_WIDTH / 100).min(PROGRESS_BAR_WIDTH);
            format!(
                "{round} :: {percent}% :: {}{}",
                "#".repeat(filled),
                "-".repeat(PROGRESS_BAR_WIDTH - filled)
            )
        }
    }
}

/// Keeps long progress lines from wrapping while sessions run.
struct LineWrapGuard;

impl LineWrapGuard {
    fn disable() -> Self {
        print!("\x1b[?7l");
        LineWrapGuard
    }
}

impl Drop for LineWrapGuard {
    fn drop(&mut self) {
        print!("\x1b[?7h");
        let _ = std::io::Write::flush(&mut std::io::stdout());
    }
}

#[cfg(test)]
mod harness_tests {
    use super::*;

    fn quiet() -> Configuration {
        Configuration::new()
            .with_board(5, 5)
            .with_ships(2, 3)
            .with_iterations(3)
            .with_wait_upto_millis(20)
            .with_verbose(false)
    }

    #[test]
    fn progress_lines() {
        assert_eq!(progress_line(None, 10), "waiting");
        assert_eq!(progress_line(Some(SessionState::Completed), 10), "done");
        assert_eq!(
            progress_line(Some(SessionState::Running(5)), 10),
            "5 :: 50% :: ##########----------"
        );
        assert_eq!(
            progress_line(Some(SessionState::Running(0)), 0),
            "0 :: 100% :: ####################"
        );
    }

    #[test]
    fn board_redraws_every_line() {
        let progress = BTreeMap::from([(0, Arc::new(Progress::default()))]);
        let mut board = ProgressBoard::default();
        board.draw(&[0, 4], &progress, 10);
        assert_eq!(board.lines_drawn, 2);
        board.draw(&[0], &progress, 10);
        assert_eq!(board.lines_drawn, 1);
    }

    #[test]
    fn panic_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn Any + Send> = Box::new(3);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }

    #[test]
    fn fleet_that_cannot_fit_is_rejected_before_spawning() {
        let harness = Harness::new(quiet().with_board(2, 2).with_ships(2, 4)).unwrap();
        let err = harness.run("/definitely/not/a/program").unwrap_err();
        assert!(format!("{err:#}").contains("invalid game layout"), "{err:#}");
    }

    #[test]
    fn unknown_ai_count_is_an_error() {
        let harness = Harness::new(quiet()).unwrap();
        assert!(harness.run("/definitely/not/a/program").is_err());
    }

    #[test]
    fn missing_program_fails_each_session() {
        let config = quiet()
            .with_ai_selection(AiSelection::Ids(vec![3, 1, 3, 2]))
            .with_max_parallel_sessions(2);
        let reports = Harness::new(config)
            .unwrap()
            .run("/definitely/not/a/program")
            .unwrap();
        let ids = reports.iter().map(SessionReport::ai_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 2, 3]);
        for report in &reports {
            assert!(report.rounds().is_empty());
            assert!(report.error().unwrap().contains("no such program"));
        }
    }
}
