//! Read-only results of a session and their plain-text summary.

use std::{io, time::Duration};

use crate::{
    game_state::{EndingState, GameSession, Round},
    layout::{ship_at_position, GameLayout, PlacedShip},
    position::{base26_encode, Position},
    stats::GlobalStats,
};

/// Everything a session produced, for one AI.
#[derive(Debug, Clone)]
pub struct SessionReport {
    session: GameSession,
    error: Option<String>,
}

impl SessionReport {
    pub fn new(session: GameSession, error: Option<String>) -> Self {
        Self { session, error }
    }

    pub fn program_name(&self) -> &str {
        self.session.program_name()
    }

    pub fn ai_id(&self) -> usize {
        self.session.ai_id()
    }

    pub fn layout(&self) -> &GameLayout {
        self.session.layout()
    }

    pub fn global_stats(&self) -> &GlobalStats {
        self.session.global_stats()
    }

    /// Finished rounds, in play order.
    pub fn rounds(&self) -> &[Round] {
        self.session.rounds()
    }

    /// Set when the session stopped before playing every round.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

/// ANSI coloring, off for files.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub enabled: bool,
}

impl Palette {
    fn paint(&self, code: &'static str) -> &'static str {
        if self.enabled {
            code
        } else {
            ""
        }
    }

    fn text(&self) -> &'static str {
        self.paint("\x1b[38;2;200;200;200m")
    }

    fn value(&self) -> &'static str {
        self.paint("\x1b[38;2;255;255;255m")
    }

    fn abnormal(&self) -> &'static str {
        self.paint("\x1b[38;2;220;20;20m")
    }

    fn highlight(&self) -> &'static str {
        self.paint("\x1b[38;2;0;220;0m")
    }

    fn dim(&self) -> &'static str {
        self.paint("\x1b[38;2;80;80;80m")
    }

    fn reset(&self) -> &'static str {
        self.paint("\x1b[0m")
    }
}

const HEADER: &str = "========================================";

/// Summary of every session, followed by the combined statistics when there is more than one.
pub fn write_all(w: &mut impl io::Write, reports: &[SessionReport], palette: Palette) -> io::Result<()> {
    for report in reports {
        write_summary(w, report, palette)?;
    }
    if reports.len() > 1 {
        let mut combined = GlobalStats::new();
        for report in reports {
            combined += report.global_stats();
        }
        writeln!(w, "{HEADER}")?;
        writeln!(w, "{}All {} AIs combined{}", palette.highlight(), reports.len(), palette.reset())?;
        write_global_stats(w, &combined, palette)?;
    }
    Ok(())
}

/// Statistics of one session and the board of its first round.
pub fn write_summary(w: &mut impl io::Write, report: &SessionReport, palette: Palette) -> io::Result<()> {
    writeln!(w, "{HEADER}")?;
    writeln!(
        w,
        "{}{} :: AI {}{}",
        palette.highlight(),
        report.program_name(),
        report.ai_id(),
        palette.reset()
    )?;
    if let Some(error) = report.error() {
        writeln!(w, "{}Error: {error}{}", palette.abnormal(), palette.reset())?;
    }
    write_global_stats(w, report.global_stats(), palette)?;
    if let Some(first) = report.rounds().first() {
        writeln!(w)?;
        write_board(w, report.layout(), first.fleet(), palette)?;
    }
    Ok(())
}

fn write_global_stats(w: &mut impl io::Write, stats: &GlobalStats, palette: Palette) -> io::Result<()> {
    let (t, v, r) = (palette.text(), palette.value(), palette.reset());
    writeln!(w, "{t}Rounds played: {v}{}{r}", stats.rounds_played)?;
    writeln!(w, "{t}Total time: {v}{}{r}", human_time(stats.total_time))?;
    writeln!(w, "{t}Invalid Guesses: {v}{}{r}", stats.invalid_guess_count)?;
    writeln!(w, "{t}Repeat Guesses: {v}{}{r}", stats.repeat_guess_count)?;
    writeln!(w, "{t}Average guess per game: {v}{:.1}{r}", stats.average_guess_count())?;
    writeln!(w)?;
    writeln!(w, "{t}Shortest Answer: {v}{}{r}", human_time(stats.shortest_answer))?;
    writeln!(w, "{t}Longest answer: {v}{}{r}", human_time(stats.longest_answer))?;
    writeln!(w, "{t}Average time to answer: {v}{}{r}", human_time(stats.avg_answer))?;
    for state in EndingState::ALL {
        let color = if state == EndingState::None {
            palette.abnormal()
        } else {
            v
        };
        writeln!(
            w,
            "{t}Count of games '{}': {color}{}{r}",
            state.name(),
            stats.ending_state(state)
        )?;
    }
    Ok(())
}

/// Column letters on top, row numbers on the left, ship sizes on occupied cells.
pub fn write_board(
    w: &mut impl io::Write,
    layout: &GameLayout,
    fleet: &[PlacedShip],
    palette: Palette,
) -> io::Result<()> {
    let (t, r) = (palette.text(), palette.reset());
    write!(w, "    {t}")?;
    for col in 0..layout.cols() {
        write!(w, "{} ", base26_encode(u32::from(col)))?;
    }
    writeln!(w, "{r}")?;
    writeln!(w, "{t}   ┌{}{r}", "─".repeat(usize::from(layout.cols()) * 2))?;

    for row in 0..layout.rows() {
        write!(w, "{t}{row:>3}│{r}")?;
        for col in 0..layout.cols() {
            match ship_at_position(fleet, Position::new(row, col)) {
                Some(ship) => write!(w, "{}{}{r} ", palette.highlight(), ship.id.size)?,
                None => write!(w, "{}.{r} ", palette.dim())?,
            }
        }
        writeln!(w)?;
    }
    Ok(())
}

/// Largest unit the duration exceeds, truncated.
pub fn human_time(duration: Duration) -> String {
    if duration > Duration::from_secs(60) {
        format!("{}min", duration.as_secs() / 60)
    } else if duration > Duration::from_secs(1) {
        format!("{}s", duration.as_secs())
    } else if duration > Duration::from_millis(1) {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{}µs", duration.as_micros())
    }
}
