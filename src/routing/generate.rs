//! Routing row generation from mean execution times.
//!
//! Given the per-placement mean execution times of one query class, these
//! functions produce the percent weights the selection policy draws from.
//! The arithmetic mirrors the regime split and similarity band described in
//! [`RouterConfig`](crate::RouterConfig): short- and long-running classes
//! each have their own tolerance for "similar enough" placements.

use std::collections::BTreeMap;

use tracing::error;

use super::placement::PlacementSet;

/// Compute the weight distribution for one query class.
///
/// `mean_times` maps each placement set to its mean execution time in
/// nanoseconds. An empty map (no samples retained, or the monitoring
/// service unavailable) yields an empty distribution; the caller keeps the
/// row's previous sentinels in that case.
///
/// When the fastest mean falls under the short/long boundary and the
/// short-running similarity band is non-zero, weights spread over every
/// placement within the band; the long-running band works the same way on
/// the other side of the boundary. With no applicable band the fastest
/// placement takes the full 100, provided its mean is positive.
pub(crate) fn generate_row(
    mean_times: &BTreeMap<PlacementSet, f64>,
    short_similar: u32,
    long_similar: u32,
    short_long_threshold_nanos: u64,
) -> BTreeMap<PlacementSet, u8> {
    let Some((fastest, fastest_time)) = find_fastest(mean_times) else {
        return BTreeMap::new();
    };

    let boundary = short_long_threshold_nanos as f64;
    if fastest_time < boundary && short_similar != 0 {
        calc(mean_times, short_similar, fastest_time, &fastest)
    } else if fastest_time >= boundary && long_similar != 0 {
        calc(mean_times, long_similar, fastest_time, &fastest)
    } else {
        let mut row: BTreeMap<PlacementSet, u8> =
            mean_times.keys().map(|ps| (ps.clone(), 0)).collect();
        if fastest_time > 0.0 {
            row.insert(fastest, 100);
        }
        row
    }
}

/// The placement with the smallest mean. On exactly equal minima the last
/// placement in iteration order wins; the choice is arbitrary but
/// reproducible since iteration order is the set order.
fn find_fastest(mean_times: &BTreeMap<PlacementSet, f64>) -> Option<(PlacementSet, f64)> {
    let mut fastest = None;
    let mut fastest_time = f64::MAX;
    for (placement, &mean) in mean_times {
        if mean <= fastest_time {
            fastest = Some(placement.clone());
            fastest_time = mean;
        }
    }
    fastest.map(|placement| (placement, fastest_time))
}

/// Distribute weights over the placements within the similarity band.
///
/// A placement is included while its mean does not exceed
/// `fastest × (1 + similar_pct/100)`. The denominator of the raw shares is
/// the *sum of the included mean times*, not of their inverses, so slower
/// included placements draw the larger raw shares; the reassignment below
/// then hands the largest share to the fastest placement and so on down.
/// The spread over the band therefore follows the shape of the time
/// distribution itself.
fn calc(
    mean_times: &BTreeMap<PlacementSet, f64>,
    similar_pct: u32,
    fastest_time: f64,
    fastest: &PlacementSet,
) -> BTreeMap<PlacementSet, u8> {
    let mut row: BTreeMap<PlacementSet, u8> =
        mean_times.keys().map(|ps| (ps.clone(), 0)).collect();

    let threshold = fastest_time + fastest_time * (similar_pct as f64 / 100.0);
    let mut included: Vec<(&PlacementSet, f64)> = mean_times
        .iter()
        .filter(|(_, &mean)| mean <= threshold)
        .map(|(placement, &mean)| (placement, mean))
        .collect();

    let total: f64 = included.iter().map(|(_, mean)| mean).sum();
    let one_percent = total / 100.0;

    let mut shares: Vec<u8> = included
        .iter()
        .map(|(_, mean)| ((mean / one_percent) as i64).clamp(0, 100) as u8)
        .collect();

    // Largest share to the fastest placement, second largest to the second
    // fastest, and so on. Equal means keep their set order.
    shares.sort_unstable_by(|a, b| b.cmp(a));
    included.sort_by(|a, b| a.1.total_cmp(&b.1));
    for ((placement, _), share) in included.iter().zip(shares) {
        row.insert((*placement).clone(), share);
    }

    let sum: u32 = row.values().map(|&w| w as u32).sum();
    if sum == 0 {
        error!("routing table row is empty after weight calculation");
    } else if sum > 100 {
        error!(sum, "routing table row sums to more than 100");
    } else if sum < 100 {
        match row.get_mut(fastest) {
            Some(weight) => *weight += (100 - sum) as u8,
            None => error!(
                placement = %fastest,
                "routing table row does not contain the fastest placement"
            ),
        }
    }
    row
}
