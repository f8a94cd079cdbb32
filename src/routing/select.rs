//! Placement selection.

use crate::error::{Result, RouterError};

use super::placement::PlacementSet;
use super::table::{RoutingRow, Weight};

/// Pick a placement set from a routing row.
///
/// Unexplored placements win outright: as long as any entry is `Missing`,
/// the first one in row order is returned, so every candidate gets measured
/// at least once. With the short-running similarity band disabled the row
/// is deterministic and the single weight-100 entry is returned. Otherwise
/// the caller supplies a uniform `draw` in `1..=100` and the row is walked
/// in order, accumulating weights until the draw is covered.
///
/// A well-formed row always yields a placement; falling out of the loop
/// means the row is corrupted and surfaces as an internal error.
pub fn select_placement(
    row: &RoutingRow,
    deterministic: bool,
    draw: u32,
) -> Result<PlacementSet> {
    if let Some(placement) = row.first_missing() {
        return Ok(placement.clone());
    }

    if deterministic {
        for (placement, weight) in row.iter() {
            if weight == Weight::Share(100) {
                return Ok(placement.clone());
            }
        }
    } else {
        let mut accumulated = 0u32;
        for (placement, weight) in row.iter() {
            accumulated += weight.effective();
            if accumulated >= draw {
                return Ok(placement.clone());
            }
        }
    }

    Err(RouterError::internal(
        "selection exhausted a routing row without picking a placement",
    ))
}
