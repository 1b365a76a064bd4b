//! Round state and guess classification.
//!
//! A [`Round`] is created from a freshly placed fleet, mutated while the candidate guesses, and
//! handed back to its [`GameSession`] when it ends. From then on it is read-only history.

use std::{
    collections::HashSet,
    fmt,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{
    layout::{Fleet, GameLayout, ShipDefinition},
    placement::{random_ships, PlacementFailure},
    position::Position,
    stats::{GlobalStats, RoundStats},
};

/// How a round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EndingState {
    Timeout,
    ProgramError,
    Other,
    TooManyGuesses,
    UnableToReadOutput,
    SunkAllShips,
    ProgramHasNoGuesses,
    /// Round still running, or never finished.
    #[default]
    None,
}

impl EndingState {
    pub const COUNT: usize = 8;

    /// Every variant, in histogram order.
    pub const ALL: [EndingState; Self::COUNT] = [
        EndingState::Timeout,
        EndingState::ProgramError,
        EndingState::Other,
        EndingState::TooManyGuesses,
        EndingState::UnableToReadOutput,
        EndingState::SunkAllShips,
        EndingState::ProgramHasNoGuesses,
        EndingState::None,
    ];

    pub const fn index(self) -> usize {
        match self {
            EndingState::Timeout => 0,
            EndingState::ProgramError => 1,
            EndingState::Other => 2,
            EndingState::TooManyGuesses => 3,
            EndingState::UnableToReadOutput => 4,
            EndingState::SunkAllShips => 5,
            EndingState::ProgramHasNoGuesses => 6,
            EndingState::None => 7,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            EndingState::Timeout => "timed out",
            EndingState::ProgramError => "program_error",
            EndingState::Other => "other",
            EndingState::TooManyGuesses => "too_many_guess",
            EndingState::UnableToReadOutput => "unable_read_output",
            EndingState::SunkAllShips => "sunk_all_ships",
            EndingState::ProgramHasNoGuesses => "program_has_no_guesses",
            EndingState::None => "unknown",
        }
    }
}

impl fmt::Display for EndingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Answer owed to the candidate for its last guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuessReport {
    Hit(ShipDefinition),
    Miss,
    Sink(ShipDefinition),
}

/// Classification stored with each guess. Invalid takes precedence over Repeat, which takes
/// precedence over the hit/miss result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GuessOutcome {
    #[default]
    Unknown,
    Hit,
    Miss,
    Sink,
    Repeat,
    Invalid,
}

impl From<GuessReport> for GuessOutcome {
    fn from(report: GuessReport) -> Self {
        match report {
            GuessReport::Hit(_) => GuessOutcome::Hit,
            GuessReport::Miss => GuessOutcome::Miss,
            GuessReport::Sink(_) => GuessOutcome::Sink,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuessRecord {
    pub position: Position,
    pub elapsed_time: Duration,
    pub outcome: GuessOutcome,
}

/// Hit sections of one ship, bit `n` being the `n`-th cell from the origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShipHitRecord {
    pub id: ShipDefinition,
    pub hit_mask: u32,
}

impl ShipHitRecord {
    pub fn new(id: ShipDefinition) -> Self {
        Self { id, hit_mask: 0 }
    }

    /// Setting an already set section is a no-op.
    pub fn hit(&mut self, section: usize) {
        self.hit_mask |= 1 << section;
    }

    pub fn is_sunk(&self) -> bool {
        self.hit_mask.count_ones() == u32::from(self.id.size)
    }
}

/// One play-through against one fleet.
#[derive(Debug, Clone)]
pub struct Round {
    layout: GameLayout,
    start_time: Instant,
    fleet: Fleet,
    hits: Vec<ShipHitRecord>,
    guesses: Vec<GuessRecord>,
    guessed: HashSet<Position>,
    stats: RoundStats,
    ending_state: EndingState,
    guess_timer: Instant,
}

impl Round {
    pub fn new(layout: GameLayout, fleet: Fleet) -> Self {
        let hits = fleet.iter().map(|ship| ShipHitRecord::new(ship.id)).collect();
        let now = Instant::now();
        Self {
            layout,
            start_time: now,
            guesses: Vec::with_capacity(layout.max_guesses()),
            guessed: HashSet::new(),
            fleet,
            hits,
            stats: RoundStats::default(),
            ending_state: EndingState::None,
            guess_timer: now,
        }
    }

    /// Restarts the clock measuring the candidate's next answer.
    pub fn start_guess_timer(&mut self) {
        self.guess_timer = Instant::now();
    }

    /// Classifies a guess, timed from the last timer restart.
    pub fn guess(&mut self, position: Position) -> GuessReport {
        let elapsed = self.guess_timer.elapsed();
        self.guess_timer = Instant::now();
        self.record_guess(position, elapsed)
    }

    /// Classifies a guess with an explicit answer time.
    ///
    /// Every guess is appended to the history, including invalid and repeated ones. An
    /// out-of-bounds guess is flagged invalid and still goes through hit testing, where it
    /// resolves to a miss.
    pub fn record_guess(&mut self, position: Position, elapsed_time: Duration) -> GuessReport {
        let mut outcome = None;
        if !self.layout.contains(position) {
            self.stats.invalid_guess_count += 1;
            outcome = Some(GuessOutcome::Invalid);
        }
        if !self.guessed.insert(position) {
            self.stats.repeat_guess_count += 1;
            outcome = outcome.or(Some(GuessOutcome::Repeat));
        }

        let report = self.hit_test(position);
        self.guesses.push(GuessRecord {
            position,
            elapsed_time,
            outcome: outcome.unwrap_or(report.into()),
        });
        report
    }

    fn hit_test(&mut self, position: Position) -> GuessReport {
        let hit = self
            .fleet
            .iter()
            .enumerate()
            .find_map(|(index, ship)| ship.section_hit(position).map(|s| (index, s)));
        let Some((index, section)) = hit else {
            return GuessReport::Miss;
        };
        let record = &mut self.hits[index];
        record.hit(section);
        if record.is_sunk() {
            GuessReport::Sink(record.id)
        } else {
            GuessReport::Hit(record.id)
        }
    }

    pub fn sunk_all_ships(&self) -> bool {
        self.hits.iter().all(ShipHitRecord::is_sunk)
    }

    pub fn guess_count(&self) -> usize {
        self.guesses.len()
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    pub fn fleet(&self) -> &Fleet {
        &self.fleet
    }

    pub fn hits(&self) -> &[ShipHitRecord] {
        &self.hits
    }

    pub fn guesses(&self) -> &[GuessRecord] {
        &self.guesses
    }

    pub fn stats(&self) -> &RoundStats {
        &self.stats
    }

    pub fn ending_state(&self) -> EndingState {
        self.ending_state
    }

    fn finish(&mut self, ending: EndingState) {
        self.ending_state = ending;
        self.stats.calculate_stats(&self.guesses);
    }
}

/// Every round played by one AI against one program, with the running totals.
#[derive(Debug, Clone)]
pub struct GameSession {
    program_name: String,
    ai_id: usize,
    layout: GameLayout,
    rounds: Vec<Round>,
    global: GlobalStats,
}

impl GameSession {
    pub fn new(program_name: impl Into<String>, ai_id: usize, layout: GameLayout) -> Self {
        Self {
            program_name: program_name.into(),
            ai_id,
            layout,
            rounds: vec![],
            global: GlobalStats::new(),
        }
    }

    /// A new round against a random fleet.
    pub fn new_round(&self) -> Result<Round, PlacementFailure> {
        Ok(Round::new(self.layout, random_ships(&self.layout)?))
    }

    /// Records the end of `round` and moves it into the history.
    pub fn end_round(&mut self, mut round: Round, ending: EndingState) -> &Round {
        round.finish(ending);
        debug!(
            ai = self.ai_id,
            round = self.rounds.len(),
            %ending,
            guesses = round.guess_count(),
            "round ended"
        );
        self.global.merge_round(round.stats(), ending);
        self.rounds.push(round);
        &self.rounds[self.rounds.len() - 1]
    }

    pub fn program_name(&self) -> &str {
        &self.program_name
    }

    pub fn ai_id(&self) -> usize {
        self.ai_id
    }

    pub fn layout(&self) -> &GameLayout {
        &self.layout
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    pub fn global_stats(&self) -> &GlobalStats {
        &self.global
    }
}

#[cfg(test)]
mod game_state_tests {
    use super::*;
    use crate::layout::{Orientation, PlacedShip};

    fn ship(size: u8, row: u16, col: u16, orientation: Orientation) -> PlacedShip {
        PlacedShip::new(ShipDefinition::new(size), Position::new(row, col), orientation)
    }

    fn layout() -> GameLayout {
        GameLayout::new(ShipDefinition::new(2), ShipDefinition::new(3), 5, 5).unwrap()
    }

    fn round() -> Round {
        Round::new(
            layout(),
            vec![
                ship(2, 0, 0, Orientation::Horizontal),
                ship(3, 2, 4, Orientation::Vertical),
            ],
        )
    }

    fn play(round: &mut Round, guesses: &[(u16, u16)]) -> Vec<GuessReport> {
        guesses
            .iter()
            .map(|&(row, col)| round.record_guess(Position::new(row, col), Duration::ZERO))
            .collect()
    }

    #[test]
    fn hit_mask_sinks_once_full() {
        let mut record = ShipHitRecord::new(ShipDefinition::new(3));
        record.hit(0);
        record.hit(2);
        assert!(!record.is_sunk());
        record.hit(2);
        assert!(!record.is_sunk());
        record.hit(1);
        assert!(record.is_sunk());
        record.hit(1);
        assert!(record.is_sunk());
    }

    #[test]
    fn classification() {
        let mut r = round();
        let reports = play(&mut r, &[(0, 0), (1, 1), (0, 1), (0, 0), (9, 9), (9, 9)]);
        let two = ShipDefinition::new(2);
        assert_eq!(
            reports,
            vec![
                GuessReport::Hit(two),
                GuessReport::Miss,
                GuessReport::Sink(two),
                GuessReport::Sink(two),
                GuessReport::Miss,
                GuessReport::Miss,
            ]
        );
        let outcomes = r.guesses().iter().map(|g| g.outcome).collect::<Vec<_>>();
        assert_eq!(
            outcomes,
            vec![
                GuessOutcome::Hit,
                GuessOutcome::Miss,
                GuessOutcome::Sink,
                GuessOutcome::Repeat,
                GuessOutcome::Invalid,
                GuessOutcome::Invalid,
            ]
        );
        assert_eq!(r.guess_count(), 6);
        // the repeated out-of-bounds guess counts for both
        assert_eq!(r.stats().invalid_guess_count, 2);
        assert_eq!(r.stats().repeat_guess_count, 2);
    }

    #[test]
    fn classification_is_deterministic() {
        let sequence = [(2, 4), (0, 0), (3, 4), (2, 4), (7, 0), (0, 1), (4, 4), (1, 1)];
        let mut first = round();
        let mut second = round();
        assert_eq!(play(&mut first, &sequence), play(&mut second, &sequence));
        assert_eq!(first.guesses(), second.guesses());
    }

    #[test]
    fn sunk_all_ships_flips_on_last_section() {
        let mut r = round();
        let cells = [(0, 0), (2, 4), (0, 1), (3, 4)];
        for cell in cells {
            play(&mut r, &[cell]);
            assert!(!r.sunk_all_ships());
        }
        play(&mut r, &[(4, 4)]);
        assert!(r.sunk_all_ships());
        play(&mut r, &[(1, 1), (0, 0)]);
        assert!(r.sunk_all_ships());
    }

    #[test]
    fn session_keeps_finished_rounds() {
        let mut session = GameSession::new("prog", 3, layout());
        let mut r = session.new_round().unwrap();
        assert_eq!(r.fleet().len(), 2);
        r.record_guess(Position::new(0, 0), Duration::from_millis(4));
        r.record_guess(Position::new(0, 0), Duration::from_millis(2));

        let ended = session.end_round(r, EndingState::Timeout);
        assert_eq!(ended.ending_state(), EndingState::Timeout);
        assert_eq!(ended.stats().total_guess_count, 2);
        assert_eq!(ended.stats().longest_answer, Duration::from_millis(4));

        assert_eq!(session.rounds().len(), 1);
        assert_eq!(session.global_stats().ending_state(EndingState::Timeout), 1);
        assert_eq!(session.global_stats().repeat_guess_count, 1);
        assert_eq!(session.ai_id(), 3);
        assert_eq!(session.program_name(), "prog");
    }
}
