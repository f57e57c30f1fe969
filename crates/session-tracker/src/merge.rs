//! Split-flight merge heuristic
//!
//! Some servers restart a flight's report stream mid-air, which leaves two
//! adjacent sessions for what is one continuous flight. Right after a new
//! flight records its second waypoint, the tracker compares its last two
//! waypoints with those of the most recently closed flight of the same
//! callsign and model. The new flight is folded into the earlier one when
//! both were moving faster than taxi speed and the gap between them could
//! have been covered at high subsonic speed.
//!
//! Checks short-circuit in order; the first failure is returned as a
//! [`MergeRejection`].

use fgtracker_core::TrackPoint;
use fgtracker_core::geo::{distance_between, speed_kmh};

/// Ground speed both flights must exceed to count as airborne
pub const MIN_SPEED_KMH: f64 = 60.0;

/// Highest plausible average speed across the gap between the two flights
pub const MAX_GAP_SPEED_MS: f64 = 408.0;

/// Figures behind a passing merge decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeCheck {
    pub new_speed_kmh: f64,
    pub candidate_speed_kmh: f64,
    /// Distance from the candidate's last waypoint to the new flight's first
    pub gap_m: f64,
    /// Largest gap accepted for the elapsed time
    pub max_gap_m: f64,
}

/// Why two flights were not merged
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MergeRejection {
    /// No recently closed flight with the same callsign and model
    NoCandidate,
    /// Fewer than two waypoints on either side
    InsufficientWaypoints { new: usize, candidate: usize },
    /// Two waypoints of one flight share a timestamp
    DegenerateTimestamps,
    NewFlightTooSlow { kmh: f64 },
    CandidateTooSlow { kmh: f64 },
    GapTooWide { distance_m: f64, max_m: f64 },
}

impl std::fmt::Display for MergeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeRejection::NoCandidate => write!(f, "no candidate flight"),
            MergeRejection::InsufficientWaypoints { new, candidate } => write!(
                f,
                "insufficient waypoints (new {new}, candidate {candidate})"
            ),
            MergeRejection::DegenerateTimestamps => write!(f, "waypoints share a timestamp"),
            MergeRejection::NewFlightTooSlow { kmh } => {
                write!(f, "new flight too slow ({kmh:.1} km/h)")
            }
            MergeRejection::CandidateTooSlow { kmh } => {
                write!(f, "candidate flight too slow ({kmh:.1} km/h)")
            }
            MergeRejection::GapTooWide { distance_m, max_m } => {
                write!(f, "gap too wide ({distance_m:.0} m > {max_m:.0} m)")
            }
        }
    }
}

/// Decide whether a new flight continues a candidate flight
///
/// Both slices hold the flight's most recent waypoints, newest first, as
/// returned by [`FlightStore::last_waypoints`](fgtracker_ports::FlightStore::last_waypoints).
/// Only the first two entries of each are used.
pub fn evaluate(
    new: &[TrackPoint],
    candidate: &[TrackPoint],
) -> Result<MergeCheck, MergeRejection> {
    let (Some(new_pair), Some(cand_pair)) = (pair(new), pair(candidate)) else {
        return Err(MergeRejection::InsufficientWaypoints {
            new: new.len(),
            candidate: candidate.len(),
        });
    };

    if new_pair.0.time == new_pair.1.time || cand_pair.0.time == cand_pair.1.time {
        return Err(MergeRejection::DegenerateTimestamps);
    }

    let new_speed_kmh = pair_speed(new_pair);
    if new_speed_kmh <= MIN_SPEED_KMH {
        return Err(MergeRejection::NewFlightTooSlow { kmh: new_speed_kmh });
    }

    let candidate_speed_kmh = pair_speed(cand_pair);
    if candidate_speed_kmh <= MIN_SPEED_KMH {
        return Err(MergeRejection::CandidateTooSlow {
            kmh: candidate_speed_kmh,
        });
    }

    // Candidate's latest waypoint to the new flight's earliest
    let (cand_last, new_first) = (cand_pair.0, new_pair.1);
    let gap_m = distance_between(cand_last, new_first);
    let max_gap_m = MAX_GAP_SPEED_MS * seconds_between(cand_last, new_first);
    if gap_m > max_gap_m {
        return Err(MergeRejection::GapTooWide {
            distance_m: gap_m,
            max_m: max_gap_m,
        });
    }

    Ok(MergeCheck {
        new_speed_kmh,
        candidate_speed_kmh,
        gap_m,
        max_gap_m,
    })
}

fn pair(points: &[TrackPoint]) -> Option<(&TrackPoint, &TrackPoint)> {
    match points {
        [latest, earlier, ..] => Some((latest, earlier)),
        _ => None,
    }
}

fn pair_speed((latest, earlier): (&TrackPoint, &TrackPoint)) -> f64 {
    speed_kmh(
        distance_between(latest, earlier),
        seconds_between(earlier, latest).abs(),
    )
}

/// Signed seconds from `from` to `to`
fn seconds_between(from: &TrackPoint, to: &TrackPoint) -> f64 {
    (to.time - from.time).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use fgtracker_core::Timestamp;

    fn t() -> Timestamp {
        Utc.with_ymd_and_hms(2015, 12, 7, 12, 0, 0).unwrap()
    }

    fn at(offset_secs: i64, lat: f64) -> TrackPoint {
        TrackPoint::new(t() + Duration::seconds(offset_secs), lat, 5.0)
    }

    /// Flight A: two waypoints ~1.1 km apart in 10 s, ending at T
    fn candidate() -> Vec<TrackPoint> {
        vec![at(0, 45.010), at(-10, 45.000)]
    }

    #[test]
    fn test_continuous_flight_passes() {
        let new = vec![at(70, 45.020), at(60, 45.011)];

        let check = evaluate(&new, &candidate()).unwrap();
        assert!(check.new_speed_kmh > 300.0 && check.new_speed_kmh < 400.0);
        assert!(check.candidate_speed_kmh > 390.0 && check.candidate_speed_kmh < 410.0);
        assert!(check.gap_m > 100.0 && check.gap_m < 120.0);
        assert_eq!(check.max_gap_m, 408.0 * 60.0);
    }

    #[test]
    fn test_taxiing_new_flight_fails_speed_check() {
        // ~5.6 m in 10 s
        let new = vec![at(70, 45.01105), at(60, 45.011)];

        match evaluate(&new, &candidate()) {
            Err(MergeRejection::NewFlightTooSlow { kmh }) => assert!(kmh < MIN_SPEED_KMH),
            other => panic!("expected NewFlightTooSlow, got {:?}", other),
        }
    }

    #[test]
    fn test_slow_candidate_fails() {
        let new = vec![at(70, 45.020), at(60, 45.011)];
        let candidate = vec![at(0, 45.01001), at(-10, 45.010)];

        assert!(matches!(
            evaluate(&new, &candidate),
            Err(MergeRejection::CandidateTooSlow { .. })
        ));
    }

    #[test]
    fn test_new_flight_checked_before_candidate() {
        let new = vec![at(70, 45.011), at(60, 45.011)];
        let candidate = vec![at(0, 45.010), at(-10, 45.010)];

        assert!(matches!(
            evaluate(&new, &candidate),
            Err(MergeRejection::NewFlightTooSlow { .. })
        ));
    }

    #[test]
    fn test_far_gap_fails() {
        // One degree of latitude (~111 km) in 60 s
        let new = vec![at(70, 46.020), at(60, 46.011)];

        match evaluate(&new, &candidate()) {
            Err(MergeRejection::GapTooWide { distance_m, max_m }) => {
                assert!(distance_m > max_m);
                assert_eq!(max_m, 408.0 * 60.0);
            }
            other => panic!("expected GapTooWide, got {:?}", other),
        }
    }

    #[test]
    fn test_equal_timestamps_are_degenerate() {
        let new = vec![at(60, 45.020), at(60, 45.011)];
        assert_eq!(
            evaluate(&new, &candidate()),
            Err(MergeRejection::DegenerateTimestamps)
        );

        let new = vec![at(70, 45.020), at(60, 45.011)];
        let candidate = vec![at(0, 45.010), at(0, 45.000)];
        assert_eq!(
            evaluate(&new, &candidate),
            Err(MergeRejection::DegenerateTimestamps)
        );
    }

    #[test]
    fn test_needs_two_waypoints_each() {
        let new = vec![at(70, 45.020)];
        assert_eq!(
            evaluate(&new, &candidate()),
            Err(MergeRejection::InsufficientWaypoints { new: 1, candidate: 2 })
        );
        assert_eq!(
            evaluate(&[], &[]),
            Err(MergeRejection::InsufficientWaypoints { new: 0, candidate: 0 })
        );
    }

    #[test]
    fn test_rejection_display() {
        let rejection = MergeRejection::NewFlightTooSlow { kmh: 2.04 };
        assert_eq!(rejection.to_string(), "new flight too slow (2.0 km/h)");
    }
}
