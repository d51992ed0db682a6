//! Break budget calculation.
//!
//! Longer sessions earn more pause time, but the allowance grows slower than
//! the session itself:
//!
//! | duration        | total break             | single break cap       |
//! |-----------------|-------------------------|------------------------|
//! | `>= 8h`         | 3600s                   | 1200s                  |
//! | `4h ..< 8h`     | 1800s → 3600s (linear)  | 900s → 1200s (linear)  |
//! | `2h ..< 4h`     | 900s → 1800s (linear)   | 900s                   |
//! | `< 2h`          | 600s                    | 600s                   |

use serde::{Deserialize, Serialize};

/// Break allowance derived from a session's duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakBudget {
    /// Total seconds of pause time for the whole session.
    pub total_seconds: u64,
    /// Advisory cap for any one break.
    pub max_single_seconds: u64,
}

/// Compute the break budget for a session lasting `duration_hours`.
///
/// NaN and negative durations fall into the shortest tier; an infinite one
/// into the longest.
pub fn break_budget(duration_hours: f64) -> BreakBudget {
    let hours = if duration_hours.is_nan() {
        0.0
    } else {
        duration_hours
    };

    if hours >= 8.0 {
        BreakBudget {
            total_seconds: 3600,
            max_single_seconds: 1200,
        }
    } else if hours >= 4.0 {
        let t = (hours - 4.0) / 4.0;
        BreakBudget {
            total_seconds: lerp(1800.0, 3600.0, t),
            max_single_seconds: lerp(900.0, 1200.0, t),
        }
    } else if hours >= 2.0 {
        let t = (hours - 2.0) / 2.0;
        BreakBudget {
            total_seconds: lerp(900.0, 1800.0, t),
            max_single_seconds: 900,
        }
    } else {
        BreakBudget {
            total_seconds: 600,
            max_single_seconds: 600,
        }
    }
}

fn lerp(from: f64, to: f64, t: f64) -> u64 {
    (from + (to - from) * t).round() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchors_match_exactly() {
        assert_eq!(
            break_budget(4.0),
            BreakBudget {
                total_seconds: 1800,
                max_single_seconds: 900
            }
        );
        assert_eq!(
            break_budget(8.0),
            BreakBudget {
                total_seconds: 3600,
                max_single_seconds: 1200
            }
        );
        assert_eq!(break_budget(2.0).total_seconds, 900);
        assert_eq!(break_budget(12.0).total_seconds, 3600);
    }

    #[test]
    fn short_sessions_get_fixed_allowance() {
        for hours in [0.0, 0.5, 1.0, 1.99] {
            assert_eq!(
                break_budget(hours),
                BreakBudget {
                    total_seconds: 600,
                    max_single_seconds: 600
                },
                "hours = {hours}"
            );
        }
    }

    #[test]
    fn interpolates_between_anchors() {
        let six = break_budget(6.0);
        assert_eq!(six.total_seconds, 2700);
        assert_eq!(six.max_single_seconds, 1050);

        let three = break_budget(3.0);
        assert_eq!(three.total_seconds, 1350);
        assert_eq!(three.max_single_seconds, 900);
    }

    #[test]
    fn monotonically_non_decreasing() {
        let mut previous = break_budget(0.0);
        let mut hours = 0.0;
        while hours <= 12.0 {
            let current = break_budget(hours);
            assert!(
                current.total_seconds >= previous.total_seconds,
                "total decreased at {hours}h"
            );
            assert!(
                current.max_single_seconds >= previous.max_single_seconds,
                "single cap decreased at {hours}h"
            );
            previous = current;
            hours += 0.05;
        }
    }

    #[test]
    fn nan_and_negative_use_shortest_tier() {
        assert_eq!(break_budget(f64::NAN).total_seconds, 600);
        assert_eq!(break_budget(-3.0).total_seconds, 600);
        assert_eq!(break_budget(f64::NEG_INFINITY).total_seconds, 600);
    }

    #[test]
    fn unbounded_duration_uses_longest_tier() {
        let longest = BreakBudget {
            total_seconds: 3600,
            max_single_seconds: 1200,
        };
        assert_eq!(break_budget(f64::INFINITY), longest);
        assert_eq!(break_budget(f64::MAX), longest);
        assert_eq!(break_budget(f64::from(u32::MAX)), longest);
    }
}
