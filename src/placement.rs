//! Random fleet generation.

use rand::Rng;
use thiserror::Error;
use tracing::trace;

use crate::{
    layout::{Fleet, GameLayout, Orientation, PlacedShip, ShipDefinition},
    position::Position,
};

const MAX_FLEET_ATTEMPTS: usize = 100;
const MAX_SHIP_ATTEMPTS: usize = 200;

/// The fleet cannot be laid out on the board.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlacementFailure {
    #[error("ship of size {ship} does not fit on a {rows}x{cols} board")]
    ShipDoesNotFit { ship: u8, rows: u16, cols: u16 },
    #[error("could not place the fleet without overlap after {attempts} attempts")]
    NoRoom { attempts: usize },
}

/// Places one ship of every size of the layout, using the thread-local generator.
pub fn random_ships(layout: &GameLayout) -> Result<Fleet, PlacementFailure> {
    random_ships_with(layout, &mut rand::rng())
}

/// Same as [`random_ships`] with a caller-provided generator.
///
/// Ships are placed largest first. Each ship gets a random orientation among those it fits in,
/// and a random origin among the in-bounds ones; an overlapping candidate is drawn again. When a
/// ship cannot be placed after a bounded number of draws, the whole fleet is started over.
pub fn random_ships_with<R: Rng>(
    layout: &GameLayout,
    rng: &mut R,
) -> Result<Fleet, PlacementFailure> {
    for def in layout.ship_definitions() {
        if orientations_that_fit(layout, def).is_empty() {
            return Err(PlacementFailure::ShipDoesNotFit {
                ship: def.size,
                rows: layout.rows(),
                cols: layout.cols(),
            });
        }
    }

    let fleet_cells: usize = layout.ship_definitions().map(|s| usize::from(s.size)).sum();
    if fleet_cells > usize::from(layout.rows()) * usize::from(layout.cols()) {
        return Err(PlacementFailure::NoRoom { attempts: 0 });
    }

    for attempt in 0..MAX_FLEET_ATTEMPTS {
        if let Some(mut fleet) = try_place_fleet(layout, rng) {
            fleet.sort_by_key(|ship| ship.id);
            return Ok(fleet);
        }
        trace!(attempt, "fleet placement restarted");
    }
    Err(PlacementFailure::NoRoom {
        attempts: MAX_FLEET_ATTEMPTS,
    })
}

fn try_place_fleet<R: Rng>(layout: &GameLayout, rng: &mut R) -> Option<Fleet> {
    let mut fleet: Fleet = Vec::with_capacity(layout.fleet_size());
    for def in layout.ship_definitions().rev() {
        let ship = (0..MAX_SHIP_ATTEMPTS)
            .map(|_| random_placement(layout, def, rng))
            .find(|candidate| fleet.iter().all(|placed| !placed.overlaps(candidate)))?;
        fleet.push(ship);
    }
    Some(fleet)
}

fn random_placement<R: Rng>(
    layout: &GameLayout,
    def: ShipDefinition,
    rng: &mut R,
) -> PlacedShip {
    let orientations = orientations_that_fit(layout, def);
    let orientation = orientations[rng.random_range(0..orientations.len())];
    let size = u16::from(def.size);
    let (max_row, max_col) = match orientation {
        Orientation::Horizontal => (layout.rows(), layout.cols() - size + 1),
        Orientation::Vertical => (layout.rows() - size + 1, layout.cols()),
    };
    let origin = Position::new(rng.random_range(0..max_row), rng.random_range(0..max_col));
    PlacedShip::new(def, origin, orientation)
}

fn orientations_that_fit(layout: &GameLayout, def: ShipDefinition) -> Vec<Orientation> {
    let size = u16::from(def.size);
    let mut fits = Vec::with_capacity(2);
    if size <= layout.cols() {
        fits.push(Orientation::Horizontal);
    }
    if size <= layout.rows() {
        fits.push(Orientation::Vertical);
    }
    fits
}

#[cfg(test)]
mod placement_tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;

    fn layout(min: u8, max: u8, rows: u16, cols: u16) -> GameLayout {
        GameLayout::new(ShipDefinition::new(min), ShipDefinition::new(max), rows, cols).unwrap()
    }

    fn assert_valid(layout: &GameLayout, fleet: &Fleet) {
        assert_eq!(fleet.len(), layout.fleet_size());
        for (index, ship) in fleet.iter().enumerate() {
            assert_eq!(layout.fleet_index(ship.id), Some(index));
            assert!(ship.fits(layout), "{ship:?} out of bounds");
            assert!(ship.cells().all(|cell| layout.contains(cell)));
            for other in &fleet[index + 1..] {
                assert!(!ship.overlaps(other), "{ship:?} overlaps {other:?}");
            }
        }
    }

    #[test]
    fn thousand_fleets_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for l in [layout(2, 5, 10, 10), layout(2, 3, 5, 5), layout(1, 4, 4, 7)] {
            for _ in 0..1000 {
                let fleet = random_ships_with(&l, &mut rng).unwrap();
                assert_valid(&l, &fleet);
            }
        }
    }

    #[test]
    fn largest_ship_is_placed_first() {
        let l = layout(2, 5, 10, 10);
        let mut rng = StdRng::seed_from_u64(3);
        let fleet = try_place_fleet(&l, &mut rng).unwrap();
        assert_eq!(
            fleet.iter().map(|ship| ship.id.size).collect::<Vec<_>>(),
            vec![5, 4, 3, 2]
        );
    }

    #[test]
    fn single_row_board_forces_horizontal() {
        let l = layout(2, 3, 1, 6);
        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            let fleet = random_ships_with(&l, &mut rng).unwrap();
            assert!(fleet
                .iter()
                .all(|ship| ship.orientation == Orientation::Horizontal));
            assert_valid(&l, &fleet);
        }
    }

    #[test]
    fn ship_longer_than_board() {
        assert_eq!(
            random_ships(&layout(2, 6, 5, 5)),
            Err(PlacementFailure::ShipDoesNotFit {
                ship: 6,
                rows: 5,
                cols: 5
            })
        );
    }

    #[test]
    fn fleet_larger_than_board() {
        // 9 fleet cells, 8 board cells
        assert!(matches!(
            random_ships(&layout(2, 4, 2, 4)),
            Err(PlacementFailure::NoRoom { .. })
        ));
    }
}
