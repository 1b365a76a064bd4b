//! Per-round and cumulative answer statistics.
//!
//! Averages are not arithmetic means. Each new sample is folded in with
//! `avg = (avg + sample) / 2`, seeded with the first sample, so recent samples weigh more. The
//! same rule combines round averages into the cumulative average, and cumulative averages of
//! different sessions into a combined one.

use std::{ops::AddAssign, time::Duration};

use crate::game_state::{EndingState, GuessRecord};

/// Statistics of a single round. Counters are updated while guesses are classified, timings are
/// filled in when the round ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundStats {
    pub shortest_answer: Duration,
    pub longest_answer: Duration,
    pub avg_answer: Duration,
    pub total_time: Duration,

    pub repeat_guess_count: usize,
    pub invalid_guess_count: usize,
    pub total_guess_count: usize,
}

impl RoundStats {
    /// Fills the timing fields and the guess count from the round history.
    pub fn calculate_stats(&mut self, guesses: &[GuessRecord]) {
        self.total_guess_count = guesses.len();

        let mut elapsed = guesses.iter().map(|g| g.elapsed_time);
        let Some(first) = elapsed.next() else {
            self.shortest_answer = Duration::ZERO;
            self.longest_answer = Duration::ZERO;
            self.avg_answer = Duration::ZERO;
            self.total_time = Duration::ZERO;
            return;
        };

        let (shortest, longest, avg, total) = elapsed.fold(
            (first, first, first, first),
            |(shortest, longest, avg, total), time| {
                (
                    shortest.min(time),
                    longest.max(time),
                    halving_average(avg, time),
                    total + time,
                )
            },
        );
        self.shortest_answer = shortest;
        self.longest_answer = longest;
        self.avg_answer = avg;
        self.total_time = total;
    }
}

/// Cumulative statistics of every round played by one AI, or of several AIs combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GlobalStats {
    pub shortest_answer: Duration,
    pub longest_answer: Duration,
    pub avg_answer: Duration,
    pub total_time: Duration,

    pub repeat_guess_count: usize,
    pub invalid_guess_count: usize,
    pub total_guess_count: usize,
    pub rounds_played: usize,
    /// Rounds with at least one guess, the only ones that carry timings.
    pub timed_rounds: usize,

    ending_states: [usize; EndingState::COUNT],
}

impl GlobalStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a finished round into the totals.
    pub fn merge_round(&mut self, round: &RoundStats, ending: EndingState) {
        if round.total_guess_count > 0 {
            if self.timed_rounds == 0 {
                self.shortest_answer = round.shortest_answer;
                self.longest_answer = round.longest_answer;
                self.avg_answer = round.avg_answer;
            } else {
                self.shortest_answer = self.shortest_answer.min(round.shortest_answer);
                self.longest_answer = self.longest_answer.max(round.longest_answer);
                self.avg_answer = halving_average(self.avg_answer, round.avg_answer);
            }
            self.timed_rounds += 1;
        }
        self.total_time += round.total_time;
        self.repeat_guess_count += round.repeat_guess_count;
        self.invalid_guess_count += round.invalid_guess_count;
        self.total_guess_count += round.total_guess_count;
        self.rounds_played += 1;
        self.ending_states[ending.index()] += 1;
    }

    /// Number of rounds that ended with `state`.
    pub fn ending_state(&self, state: EndingState) -> usize {
        self.ending_states[state.index()]
    }

    /// Ending-state histogram, in [`EndingState::ALL`] order.
    pub fn ending_states(&self) -> &[usize; EndingState::COUNT] {
        &self.ending_states
    }

    pub fn average_guess_count(&self) -> f64 {
        if self.rounds_played == 0 {
            0.0
        } else {
            self.total_guess_count as f64 / self.rounds_played as f64
        }
    }
}

impl AddAssign<&GlobalStats> for GlobalStats {
    fn add_assign(&mut self, other: &GlobalStats) {
        if other.timed_rounds > 0 {
            if self.timed_rounds == 0 {
                self.shortest_answer = other.shortest_answer;
                self.longest_answer = other.longest_answer;
                self.avg_answer = other.avg_answer;
            } else {
                self.shortest_answer = self.shortest_answer.min(other.shortest_answer);
                self.longest_answer = self.longest_answer.max(other.longest_answer);
                self.avg_answer = halving_average(self.avg_answer, other.avg_answer);
            }
        }
        self.timed_rounds += other.timed_rounds;
        self.total_time += other.total_time;
        self.repeat_guess_count += other.repeat_guess_count;
        self.invalid_guess_count += other.invalid_guess_count;
        self.total_guess_count += other.total_guess_count;
        self.rounds_played += other.rounds_played;
        for (mine, theirs) in self.ending_states.iter_mut().zip(other.ending_states) {
            *mine += theirs;
        }
    }
}

impl AddAssign for GlobalStats {
    fn add_assign(&mut self, other: GlobalStats) {
        *self += &other;
    }
}

fn halving_average(avg: Duration, sample: Duration) -> Duration {
    (avg + sample) / 2
}
