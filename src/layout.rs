//! Board dimensions, fleet composition and placed ships.

use std::fmt;

use thiserror::Error;

use crate::position::Position;

/// Largest ship the per-ship hit mask can track.
pub const MAX_SHIP_SIZE: u8 = 32;

/// Error returned when layout parameters are inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("board must have at least one row and one column (got {rows}x{cols})")]
    EmptyBoard { rows: u16, cols: u16 },
    #[error("ships must have a size of at least 1")]
    ZeroSizedShip,
    #[error("smallest ship ({smallest}) is larger than largest ship ({largest})")]
    InvertedShipRange { smallest: u8, largest: u8 },
    #[error("ship of size {0} exceeds the maximum of {MAX_SHIP_SIZE}")]
    ShipTooLarge(u8),
}

/// A ship class, identified only by its length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ShipDefinition {
    pub size: u8,
}

impl ShipDefinition {
    pub const fn new(size: u8) -> Self {
        Self { size }
    }
}

impl fmt::Display for ShipDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.size)
    }
}

/// Board size and fleet composition. The fleet holds one ship of every length from the smallest
/// to the largest ship, inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GameLayout {
    smallest: ShipDefinition,
    largest: ShipDefinition,
    rows: u16,
    cols: u16,
}

impl GameLayout {
    pub fn new(
        smallest: ShipDefinition,
        largest: ShipDefinition,
        rows: u16,
        cols: u16,
    ) -> Result<Self, LayoutError> {
        if rows == 0 || cols == 0 {
            return Err(LayoutError::EmptyBoard { rows, cols });
        }
        if smallest.size == 0 {
            return Err(LayoutError::ZeroSizedShip);
        }
        if smallest > largest {
            return Err(LayoutError::InvertedShipRange {
                smallest: smallest.size,
                largest: largest.size,
            });
        }
        if largest.size > MAX_SHIP_SIZE {
            return Err(LayoutError::ShipTooLarge(largest.size));
        }
        Ok(Self {
            smallest,
            largest,
            rows,
            cols,
        })
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }

    pub fn cols(&self) -> u16 {
        self.cols
    }

    pub fn smallest_ship(&self) -> ShipDefinition {
        self.smallest
    }

    pub fn largest_ship(&self) -> ShipDefinition {
        self.largest
    }

    /// Upper bound on guesses in a round before it is cut short.
    pub fn max_guesses(&self) -> usize {
        usize::from(self.rows) * usize::from(self.cols) + 10
    }

    pub fn fleet_size(&self) -> usize {
        usize::from(self.largest.size - self.smallest.size) + 1
    }

    /// Index of a ship class inside a fleet, `None` if the class is not part of it.
    pub fn fleet_index(&self, ship: ShipDefinition) -> Option<usize> {
        (self.smallest..=self.largest)
            .contains(&ship)
            .then(|| usize::from(ship.size - self.smallest.size))
    }

    /// Every ship class of the fleet, in fleet order.
    pub fn ship_definitions(&self) -> impl DoubleEndedIterator<Item = ShipDefinition> {
        (self.smallest.size..=self.largest.size).map(ShipDefinition::new)
    }

    pub fn contains(&self, pos: Position) -> bool {
        pos.row < self.rows && pos.col < self.cols
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

/// A ship on the board. Horizontal ships grow along columns, vertical ones along rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedShip {
    pub id: ShipDefinition,
    pub origin: Position,
    pub orientation: Orientation,
}

impl PlacedShip {
    pub fn new(id: ShipDefinition, origin: Position, orientation: Orientation) -> Self {
        Self {
            id,
            origin,
            orientation,
        }
    }

    /// Cells covered by the ship, from the origin outwards.
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        (0..u32::from(self.id.size)).map(move |offset| {
            // only ever called on ships that fit a u16 board
            let offset = offset as u16;
            match self.orientation {
                Orientation::Horizontal => {
                    Position::new(self.origin.row, self.origin.col.saturating_add(offset))
                }
                Orientation::Vertical => {
                    Position::new(self.origin.row.saturating_add(offset), self.origin.col)
                }
            }
        })
    }

    /// Offset of `pos` along the ship, used as the bit index of the hit mask.
    pub fn section_hit(&self, pos: Position) -> Option<usize> {
        let (along, fixed, start, fixed_start) = match self.orientation {
            Orientation::Horizontal => (pos.col, pos.row, self.origin.col, self.origin.row),
            Orientation::Vertical => (pos.row, pos.col, self.origin.row, self.origin.col),
        };
        if fixed != fixed_start || along < start {
            return None;
        }
        let offset = usize::from(along - start);
        (offset < usize::from(self.id.size)).then_some(offset)
    }

    pub fn occupies(&self, pos: Position) -> bool {
        self.section_hit(pos).is_some()
    }

    pub fn fits(&self, layout: &GameLayout) -> bool {
        let size = u32::from(self.id.size);
        let (start, limit) = match self.orientation {
            Orientation::Horizontal => (self.origin.col, layout.cols()),
            Orientation::Vertical => (self.origin.row, layout.rows()),
        };
        size > 0 && layout.contains(self.origin) && u32::from(start) + size <= u32::from(limit)
    }

    pub fn overlaps(&self, other: &PlacedShip) -> bool {
        self.cells().any(|cell| other.occupies(cell))
    }
}

/// All ships of one round, indexed by [`GameLayout::fleet_index`].
pub type Fleet = Vec<PlacedShip>;

/// The ship covering `pos`, if any. Ships never overlap, so there is at most one.
pub fn ship_at_position(fleet: &[PlacedShip], pos: Position) -> Option<&PlacedShip> {
    fleet.iter().find(|ship| ship.occupies(pos))
}
