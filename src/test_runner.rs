//! Plays every round of one AI against the program under test.
//!
//! A [`TestRunner`] is driven by a single worker thread. Other threads observe it only through
//! its shared [`Progress`], which is updated with atomics and never blocks the runner.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use anyhow::Context;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::{
    game_state::{EndingState, GameSession, Round},
    layout::GameLayout,
    process_driver::ProcessDriver,
    protocol::{Candidate, Message},
    report::SessionReport,
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NotStarted,
    /// Index of the round being played.
    Running(usize),
    Completed,
}

/// Progress of a runner, readable from any thread.
#[derive(Debug, Default)]
pub struct Progress {
    started: AtomicBool,
    current_round: AtomicUsize,
    completed: AtomicBool,
}

impl Progress {
    pub fn current_round(&self) -> usize {
        self.current_round.load(Ordering::Relaxed)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    pub fn state(&self) -> SessionState {
        if self.is_completed() {
            SessionState::Completed
        } else if self.started.load(Ordering::Relaxed) {
            SessionState::Running(self.current_round())
        } else {
            SessionState::NotStarted
        }
    }

    fn start_round(&self, round: usize) {
        self.current_round.store(round, Ordering::Relaxed);
        self.started.store(true, Ordering::Relaxed);
    }

    fn complete(&self, rounds: usize) {
        self.current_round.store(rounds, Ordering::Relaxed);
        self.started.store(true, Ordering::Relaxed);
        self.completed.store(true, Ordering::Release);
    }
}

pub struct TestRunner {
    session: GameSession,
    wait: Duration,
    progress: Arc<Progress>,
    error: Option<String>,
}

impl TestRunner {
    /// `wait` bounds the time the program may take for each guess.
    pub fn new(program: impl Into<String>, ai_id: usize, layout: GameLayout, wait: Duration) -> Self {
        Self {
            session: GameSession::new(program, ai_id, layout),
            wait,
            progress: Arc::new(Progress::default()),
            error: None,
        }
    }

    pub fn progress(&self) -> Arc<Progress> {
        self.progress.clone()
    }

    pub fn session(&self) -> &GameSession {
        &self.session
    }

    /// Why the session stopped early, if it did.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Starts the program once and plays `iterations` rounds against it.
    ///
    /// If the program cannot be started, the session is marked completed without any round.
    #[instrument(skip(self), fields(ai = self.session.ai_id()))]
    pub fn start_tests(&mut self, iterations: usize) {
        let program = self.session.program_name().to_owned();
        match ProcessDriver::initialize(&program, self.session.ai_id()) {
            Ok(mut driver) => self.run_session(&mut driver, iterations),
            Err(e) => {
                error!("could not start program: {e:#}");
                self.error = Some(format!("{:#}", anyhow::Error::from(e)));
                self.progress.complete(0);
            }
        }
    }

    /// Plays `iterations` rounds against an already running candidate, then sends it `Q`.
    pub fn run_session<C: Candidate>(&mut self, candidate: &mut C, iterations: usize) {
        info!(iterations, "session started");
        for round_index in 0..iterations {
            self.progress.start_round(round_index);
            if let Err(e) = self.run_round(candidate, round_index) {
                error!("session aborted: {e:#}");
                self.error = Some(format!("{e:#}"));
                break;
            }
        }

        if let Err(e) = candidate.quit() {
            warn!("could not stop program cleanly: {e:#}");
        }
        let played = self.session.rounds().len();
        info!(played, "session completed");
        self.progress.complete(played);
    }

    /// Errors only when no fleet can be placed; program failures end the round instead.
    #[instrument(skip(self, candidate))]
    fn run_round<C: Candidate>(
        &mut self,
        candidate: &mut C,
        round_index: usize,
    ) -> anyhow::Result<()> {
        let mut round = self
            .session
            .new_round()
            .context("could not place the fleet")?;

        candidate.discard_pending_output();
        let ending = match candidate.send(Message::NewRound) {
            Ok(()) => self.play(candidate, &mut round),
            Err(failure) => {
                debug!(%failure, "could not start round");
                EndingState::from(&failure)
            }
        };
        self.session.end_round(round, ending);
        Ok(())
    }

    fn play<C: Candidate>(&self, candidate: &mut C, round: &mut Round) -> EndingState {
        let max_guesses = round.layout().max_guesses();
        round.start_guess_timer();
        loop {
            let position = match candidate.poll_guess(self.wait) {
                Ok(position) => position,
                Err(failure) => {
                    debug!(%failure, guesses = round.guess_count(), "no guess");
                    return EndingState::from(&failure);
                }
            };

            let report = round.guess(position);
            trace!(%position, ?report);
            if let Err(failure) = candidate.send(report.into()) {
                debug!(%failure, "could not answer");
                return EndingState::from(&failure);
            }
            round.start_guess_timer();

            let ending = if round.sunk_all_ships() {
                EndingState::SunkAllShips
            } else if round.guess_count() > max_guesses {
                EndingState::TooManyGuesses
            } else {
                continue;
            };
            self.skip_owed_reply(candidate);
            return ending;
        }
    }

    /// The program answers every report with a guess, including the last report of a round.
    /// That guess is read and dropped so the next round starts from the program's own first
    /// guess.
    fn skip_owed_reply<C: Candidate>(&self, candidate: &mut C) {
        match candidate.poll_guess(self.wait) {
            Ok(position) => trace!(%position, "dropped guess sent after the round ended"),
            Err(failure) => trace!(%failure, "no guess after the round ended"),
        }
    }

    pub fn into_report(self) -> SessionReport {
        SessionReport::new(self.session, self.error)
    }
}

#[cfg(test)]
mod test_runner_tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::{
        game_state::GuessOutcome,
        layout::ShipDefinition,
        position::Position,
        protocol::DriverFailure,
    };

    /// How the scripted candidate behaves within a round.
    #[derive(Clone, Copy)]
    enum Behavior {
        /// Every cell, row by row.
        Scan,
        /// The same cell forever.
        Stubborn,
        NoGuesses,
        Silent,
        /// Unreadable answer in the first round, then scans.
        GarbledFirstRound,
    }

    struct Scripted {
        behavior: Behavior,
        rows: u16,
        cols: u16,
        queue: VecDeque<Position>,
        sent: Vec<Message>,
        rounds_started: usize,
        quit: bool,
    }

    impl Scripted {
        fn new(behavior: Behavior, layout: &GameLayout) -> Self {
            Self {
                behavior,
                rows: layout.rows(),
                cols: layout.cols(),
                queue: VecDeque::new(),
                sent: vec![],
                rounds_started: 0,
                quit: false,
            }
        }
    }

    impl Candidate for Scripted {
        fn send(&mut self, message: Message) -> Result<(), DriverFailure> {
            if message == Message::NewRound {
                self.queue = (0..self.rows)
                    .flat_map(|row| (0..self.cols).map(move |col| Position::new(row, col)))
                    .collect();
                self.rounds_started += 1;
            }
            self.sent.push(message);
            Ok(())
        }

        fn poll_guess(&mut self, _timeout: Duration) -> Result<Position, DriverFailure> {
            match self.behavior {
                Behavior::Scan => self.queue.pop_front().ok_or(DriverFailure::Timeout),
                Behavior::Stubborn => Ok(Position::new(0, 0)),
                Behavior::NoGuesses => Err(DriverFailure::NoMoreGuesses),
                Behavior::Silent => Err(DriverFailure::Timeout),
                Behavior::GarbledFirstRound if self.rounds_started == 1 => Err(
                    DriverFailure::UnableToReadOutput("'zz': missing row".to_owned()),
                ),
                Behavior::GarbledFirstRound => {
                    self.queue.pop_front().ok_or(DriverFailure::Timeout)
                }
            }
        }

        fn quit(&mut self) -> anyhow::Result<()> {
            self.quit = true;
            self.send(Message::Quit)?;
            Ok(())
        }
    }

    fn layout() -> GameLayout {
        GameLayout::new(ShipDefinition::new(2), ShipDefinition::new(3), 5, 5).unwrap()
    }

    fn run(behavior: Behavior, iterations: usize) -> (TestRunner, Scripted) {
        let mut runner = TestRunner::new("scripted", 0, layout(), Duration::from_millis(10));
        let mut candidate = Scripted::new(behavior, &layout());
        assert_eq!(runner.progress().state(), SessionState::NotStarted);
        runner.run_session(&mut candidate, iterations);
        (runner, candidate)
    }

    #[test]
    fn full_board_scan_sinks_every_ship() {
        let (runner, candidate) = run(Behavior::Scan, 3);
        let session = runner.session();
        assert_eq!(session.rounds().len(), 3);

        for round in session.rounds() {
            assert_eq!(round.ending_state(), EndingState::SunkAllShips);
            assert!(round.guess_count() <= 25);
            let sinks = round
                .guesses()
                .iter()
                .filter(|g| g.outcome == GuessOutcome::Sink)
                .count();
            assert_eq!(sinks, 2);
            assert_eq!(round.stats().total_guess_count, round.guess_count());
        }

        let sunk_messages = candidate
            .sent
            .iter()
            .filter(|m| matches!(m, Message::Sunk(_)))
            .count();
        assert_eq!(sunk_messages, 6);
        assert_eq!(candidate.sent.first(), Some(&Message::NewRound));
        assert_eq!(candidate.sent.last(), Some(&Message::Quit));
        assert_eq!(
            candidate
                .sent
                .iter()
                .filter(|m| **m == Message::NewRound)
                .count(),
            3
        );
        assert!(candidate.quit);

        let global = session.global_stats();
        assert_eq!(global.ending_state(EndingState::SunkAllShips), 3);
        assert_eq!(global.rounds_played, 3);
        assert_eq!(runner.progress().state(), SessionState::Completed);
        assert_eq!(runner.progress().current_round(), 3);
    }

    #[test]
    fn endless_guessing_is_cut_at_max_guesses() {
        let (runner, _) = run(Behavior::Stubborn, 2);
        let max = layout().max_guesses();
        for round in runner.session().rounds() {
            assert_eq!(round.ending_state(), EndingState::TooManyGuesses);
            assert_eq!(round.guess_count(), max + 1);
            assert_eq!(round.stats().repeat_guess_count, max);
        }
        assert_eq!(
            runner
                .session()
                .global_stats()
                .ending_state(EndingState::TooManyGuesses),
            2
        );
    }

    #[test]
    fn program_without_guesses() {
        let (runner, candidate) = run(Behavior::NoGuesses, 1);
        let round = &runner.session().rounds()[0];
        assert_eq!(round.ending_state(), EndingState::ProgramHasNoGuesses);
        assert_eq!(round.guess_count(), 0);
        assert_eq!(candidate.sent, vec![Message::NewRound, Message::Quit]);
    }

    #[test]
    fn silent_program_times_out_every_round() {
        let (runner, _) = run(Behavior::Silent, 4);
        let session = runner.session();
        assert!(session
            .rounds()
            .iter()
            .all(|r| r.ending_state() == EndingState::Timeout && r.guess_count() == 0));
        assert_eq!(session.global_stats().ending_state(EndingState::Timeout), 4);
        assert!(runner.error().is_none());
    }

    #[test]
    fn missing_program_completes_without_rounds() {
        let mut runner = TestRunner::new(
            "/definitely/not/a/program",
            2,
            layout(),
            Duration::from_millis(10),
        );
        runner.start_tests(5);
        assert_eq!(runner.progress().state(), SessionState::Completed);
        assert!(runner.session().rounds().is_empty());
        assert!(runner.error().unwrap().contains("no such program"));
        let report = runner.into_report();
        assert_eq!(report.ai_id(), 2);
        assert_eq!(report.global_stats().rounds_played, 0);
    }

    /// Answers each message with the next cell of a row-major scan. The answer only becomes
    /// visible when polled, like a program that takes time to think.
    struct Lagging {
        rows: u16,
        cols: u16,
        next: usize,
        answers: VecDeque<Position>,
    }

    impl Lagging {
        fn new(layout: &GameLayout) -> Self {
            Self {
                rows: layout.rows(),
                cols: layout.cols(),
                next: 0,
                answers: VecDeque::new(),
            }
        }

        fn answer(&mut self) {
            let cols = usize::from(self.cols);
            if self.next < usize::from(self.rows) * cols {
                let row = u16::try_from(self.next / cols).unwrap();
                let col = u16::try_from(self.next % cols).unwrap();
                self.answers.push_back(Position::new(row, col));
            }
            self.next += 1;
        }
    }

    impl Candidate for Lagging {
        fn send(&mut self, message: Message) -> Result<(), DriverFailure> {
            match message {
                Message::NewRound => {
                    self.next = 0;
                    self.answer();
                }
                Message::Quit => {}
                _ => self.answer(),
            }
            Ok(())
        }

        fn poll_guess(&mut self, _timeout: Duration) -> Result<Position, DriverFailure> {
            self.answers.pop_front().ok_or(DriverFailure::Timeout)
        }

        fn quit(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn late_answer_does_not_open_next_round() {
        let mut runner = TestRunner::new("lagging", 0, layout(), Duration::from_millis(10));
        let mut candidate = Lagging::new(&layout());
        runner.run_session(&mut candidate, 3);

        for round in runner.session().rounds() {
            assert_eq!(round.ending_state(), EndingState::SunkAllShips);
            assert_eq!(round.guesses()[0].position, Position::new(0, 0));
            assert_eq!(round.stats().repeat_guess_count, 0);
        }
    }

    #[test]
    fn unreadable_answer_ends_only_its_round() {
        let (runner, _) = run(Behavior::GarbledFirstRound, 3);
        let rounds = runner.session().rounds();
        assert_eq!(rounds.len(), 3);
        assert_eq!(rounds[0].ending_state(), EndingState::UnableToReadOutput);
        assert_eq!(rounds[0].guess_count(), 0);
        assert!(rounds[1..]
            .iter()
            .all(|r| r.ending_state() == EndingState::SunkAllShips));
        assert!(runner.error().is_none());
    }

    #[test]
    fn round_is_not_announced_without_a_fleet() {
        // 9 fleet cells, 8 board cells
        let crowded =
            GameLayout::new(ShipDefinition::new(2), ShipDefinition::new(4), 2, 4).unwrap();
        let mut runner = TestRunner::new("scripted", 0, crowded, Duration::from_millis(10));
        let mut candidate = Scripted::new(Behavior::Scan, &crowded);
        runner.run_session(&mut candidate, 2);

        assert_eq!(candidate.sent, vec![Message::Quit]);
        assert!(runner.session().rounds().is_empty());
        assert!(runner
            .error()
            .unwrap()
            .contains("could not place the fleet"));
        assert_eq!(runner.progress().state(), SessionState::Completed);
    }
}
