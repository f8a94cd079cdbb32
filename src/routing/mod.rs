//! Adaptive routing core.
//!
//! This module owns the learning loop of the router:
//!
//! - **Placement discovery** enumerates the adapter sets able to answer a
//!   table's queries.
//! - The **routing table** keeps, per query class, a distribution over
//!   those placement sets.
//! - The **row generator** turns observed mean execution times into percent
//!   weights.
//! - The **selection policy** picks one placement set per query, exploring
//!   unmeasured placements first.
//! - The **refresher** rewrites every row from the monitoring service's
//!   retained samples on a fixed cadence.

mod generate;
mod placement;
mod refresher;
mod select;
mod table;

pub use placement::{candidate_placements, PlacementSet};
pub use refresher::{TableRefresher, DEFAULT_REFRESH_INTERVAL};
pub use select::select_placement;
pub use table::{RoutingRow, RoutingTable, Weight};
