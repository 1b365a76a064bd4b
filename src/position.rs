//! Board coordinates and their two text encodings.
//!
//! The live protocol uses the "letters + row" form (`a0`, `c3`, `ba12`), where the letters are
//! the column written as a base-26 numeral with digits `a`..`z`. This is a plain positional
//! numeral, not the bijective spreadsheet numbering: `a` is 0, `z` is 25 and `ba` is 26, so a
//! leading `a` is a zero digit and `aa` decodes to the same column as `a`.
//!
//! The comma form (`"col,row"`) is only used for logs and interop.

use std::{fmt, str::FromStr};

use thiserror::Error;

/// Error returned when a position cannot be read from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PositionParseError {
    /// No column letters in front of the row number.
    #[error("missing column letters in '{0}'")]
    MissingColumn(String),
    /// No row number after the column letters.
    #[error("missing row number in '{0}'")]
    MissingRow(String),
    /// Row part is not a valid number.
    #[error("invalid row '{0}'")]
    InvalidRow(String),
    /// Column part is not a valid number.
    #[error("invalid column '{0}'")]
    InvalidColumn(String),
    /// Comma form without a comma.
    #[error("missing ',' in '{0}'")]
    MissingComma(String),
}

/// A cell on the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Position {
    pub row: u16,
    pub col: u16,
}

impl Position {
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }

    /// `"col,row"`
    pub fn to_comma(&self) -> String {
        format!("{},{}", self.col, self.row)
    }

    /// Inverse of [`Position::to_comma`].
    pub fn from_comma(text: &str) -> Result<Self, PositionParseError> {
        let text = text.trim();
        let (col, row) = text
            .split_once(',')
            .ok_or_else(|| PositionParseError::MissingComma(text.to_owned()))?;
        let col = col
            .trim()
            .parse::<u16>()
            .map_err(|_| PositionParseError::InvalidColumn(col.to_owned()))?;
        let row = row
            .trim()
            .parse::<u16>()
            .map_err(|_| PositionParseError::InvalidRow(row.to_owned()))?;
        Ok(Self { row, col })
    }

    /// Wire form, e.g. `c3` for column 2, row 3.
    pub fn to_base26(&self) -> String {
        format!("{}{}", base26_encode(u32::from(self.col)), self.row)
    }

    /// Inverse of [`Position::to_base26`]. Surrounding whitespace is ignored.
    pub fn from_base26(text: &str) -> Result<Self, PositionParseError> {
        let text = text.trim();
        let split = text
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(text.len());
        let (letters, digits) = text.split_at(split);

        if letters.is_empty() {
            return Err(PositionParseError::MissingColumn(text.to_owned()));
        }
        if digits.is_empty() {
            return Err(PositionParseError::MissingRow(text.to_owned()));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(PositionParseError::InvalidRow(digits.to_owned()));
        }

        let col = base26_decode(letters)
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| PositionParseError::InvalidColumn(letters.to_owned()))?;
        let row = digits
            .parse::<u16>()
            .map_err(|_| PositionParseError::InvalidRow(digits.to_owned()))?;
        Ok(Self { row, col })
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_base26())
    }
}

impl FromStr for Position {
    type Err = PositionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base26(s)
    }
}

/// Column index as base-26 letters, most significant digit first.
pub fn base26_encode(mut value: u32) -> String {
    if value == 0 {
        return "a".to_owned();
    }
    let mut letters = Vec::with_capacity(4);
    while value > 0 {
        letters.push(char::from(b'a' + (value % 26) as u8));
        value /= 26;
    }
    letters.iter().rev().collect()
}

/// Returns `None` on a non-letter or on overflow.
pub fn base26_decode(letters: &str) -> Option<u32> {
    letters.chars().try_fold(0u32, |acc, c| {
        if !c.is_ascii_alphabetic() {
            return None;
        }
        let digit = u32::from(c.to_ascii_lowercase()) - u32::from('a');
        acc.checked_mul(26)?.checked_add(digit)
    })
}

#[cfg(test)]
mod position_tests {
    use rand::{rngs::StdRng, Rng, SeedableRng};

    use super::*;

    #[test]
    fn encode_known_columns() {
        assert_eq!(base26_encode(0), "a");
        assert_eq!(base26_encode(1), "b");
        assert_eq!(base26_encode(25), "z");
        assert_eq!(base26_encode(26), "ba");
        assert_eq!(base26_encode(702), "bba");
        assert_eq!(Position::new(12, 25).to_base26(), "z12");
    }

    #[test]
    fn decode_is_case_insensitive() {
        assert_eq!(Position::from_base26("C3"), Ok(Position::new(3, 2)));
        assert_eq!(Position::from_base26("c3\n"), Ok(Position::new(3, 2)));
        // leading 'a' is a zero digit
        assert_eq!(Position::from_base26("aa3"), Ok(Position::new(3, 0)));
    }

    #[test]
    fn round_trip_edge_columns() {
        for p in [
            Position::new(0, 0),
            Position::new(0, 1),
            Position::new(0, 25),
            Position::new(0, 26),
            Position::new(0, 702),
        ] {
            assert_eq!(p.to_base26().parse::<Position>(), Ok(p));
        }
    }

    #[test]
    fn round_trip_random_positions() {
        let mut rng = StdRng::seed_from_u64(26);
        for _ in 0..1000 {
            let p = Position::new(rng.random_range(0..10_000), rng.random_range(0..10_000));
            assert_eq!(Position::from_base26(&p.to_base26()), Ok(p));
            assert_eq!(Position::from_comma(&p.to_comma()), Ok(p));
        }
    }

    #[test]
    fn malformed_text() {
        assert!(matches!(
            Position::from_base26("12"),
            Err(PositionParseError::MissingColumn(_))
        ));
        assert!(matches!(
            Position::from_base26("abc"),
            Err(PositionParseError::MissingRow(_))
        ));
        assert!(matches!(
            Position::from_base26("a1b"),
            Err(PositionParseError::InvalidRow(_))
        ));
        assert!(matches!(
            Position::from_base26("a99999"),
            Err(PositionParseError::InvalidRow(_))
        ));
        assert!(matches!(
            Position::from_base26("zzzzzz1"),
            Err(PositionParseError::InvalidColumn(_))
        ));
        assert!(Position::from_base26("").is_err());
        assert!(matches!(
            Position::from_comma("3;4"),
            Err(PositionParseError::MissingComma(_))
        ));
    }

    #[test]
    fn comma_form_is_col_first() {
        assert_eq!(Position::new(7, 2).to_comma(), "2,7");
        assert_eq!(Position::from_comma(" 2, 7 "), Ok(Position::new(7, 2)));
    }
}
