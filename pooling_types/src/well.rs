use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Number of rows (A-H) on a 96-well plate.
pub const PLATE_ROWS: u8 = 8;
/// Number of columns (1-12) on a 96-well plate.
pub const PLATE_COLUMNS: u8 = 12;

/// Errors parsing a well id.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum WellPositionError {
    /// The id is shorter than a row letter plus a column number.
    #[error("Well id '{0}' is too short, expected something like 'A1'")]
    TooShort(String),
    /// The id is not a row letter followed by a number.
    #[error("Well id '{0}' is not a row letter followed by a column number")]
    Malformed(String),
    /// Row or column lies outside a 96-well plate.
    #[error("Well id '{0}' lies outside a 96-well plate (A1-H12)")]
    OutOfRange(String),
}

/// A well on a 96-well plate, 1-based row and column.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WellPosition {
    row: u8,
    column: u8,
}

impl WellPosition {
    /// Linear position in row-major order: `A1` is 1, `A12` is 12, `B1` is 13 and `H12` is 96.
    pub fn linear_index(self) -> u32 {
        u32::from(self.row - 1) * u32::from(PLATE_COLUMNS) + u32::from(self.column)
    }

    /// 1-based row number (A = 1).
    pub fn row(self) -> u8 {
        self.row
    }

    /// 1-based column number.
    pub fn column(self) -> u8 {
        self.column
    }
}

impl FromStr for WellPosition {
    type Err = WellPositionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let (Some(letter), rest) = (chars.next(), chars.as_str()) else {
            return Err(WellPositionError::TooShort(s.to_string()));
        };
        if rest.is_empty() {
            return Err(WellPositionError::TooShort(s.to_string()));
        }
        let letter = letter.to_ascii_uppercase();
        let column: u32 = rest
            .parse()
            .map_err(|_| WellPositionError::Malformed(s.to_string()))?;
        if !letter.is_ascii_uppercase() {
            return Err(WellPositionError::Malformed(s.to_string()));
        }
        let row = letter as u32 - 'A' as u32 + 1;
        if row > u32::from(PLATE_ROWS) || column == 0 || column > u32::from(PLATE_COLUMNS) {
            return Err(WellPositionError::OutOfRange(s.to_string()));
        }
        Ok(WellPosition {
            row: row as u8,
            column: column as u8,
        })
    }
}

impl fmt::Display for WellPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.row - 1) as char, self.column)
    }
}
