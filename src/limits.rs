//! Search limit overrides, read from the adapter's settings and rewritten into the backend's
//! `go` vocabulary.
//
//  Copyright 2020 Michael Leany
//
//  This Source Code Form is subject to the terms of the Mozilla Public
//  License, v. 2.0. If a copy of the MPL was not distributed with this
//  file, You can obtain one at http://mozilla.org/MPL/2.0/.
//
////////////////////////////////////////////////////////////////////////////////////////////////////
use std::fmt;
use crate::options::{leading_number, Options, UNSET};

////////////////////////////////////////////////////////////////////////////////////////////////////
/// A single search limit clause in the backend's vocabulary. When a limit override is in
/// effect it replaces the limit clause of the controller's `go` command wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Limit {
    /// A node-count budget, kept as the configured text.
    Nodes(String),
    /// A depth budget, kept as the configured text.
    Depth(String),
    /// A fixed time budget for this move, in milliseconds.
    MoveTime(i64),
    /// A time allotment put on both clocks, to be spent over a fixed number of moves.
    TimePool {
        /// The time to put on each side's clock, in milliseconds.
        both_ms: i64,
        /// The number of moves the allotment must last for.
        moves_to_go: i64,
    },
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Nodes(nodes) => write!(f, "nodes {}", nodes),
            Limit::Depth(depth) => write!(f, "depth {}", depth),
            Limit::MoveTime(ms) => write!(f, "movetime {}", ms),
            Limit::TimePool { both_ms, moves_to_go } => {
                write!(f, "wtime {} btime {} movestogo {}", both_ms, both_ms, moves_to_go)
            },
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
/// The configured limit overrides, captured from the option registry at the moment a `go`
/// command arrives.
///
/// Each of the four budgets is independent and optional. When more than one is configured
/// they are ranked rather than combined: an average-time budget beats a fixed time budget,
/// which beats a depth budget, which beats a node budget.
#[derive(Debug, Clone, PartialEq)]
pub struct Overrides {
    nodes: Option<String>,
    depth: Option<String>,
    movetime: Option<String>,
    average: Option<String>,
    perf: f64,
    window: i64,
}

impl Overrides {
    /// Captures the current override settings from `options`.
    pub fn from_options(options: &Options) -> Overrides {
        Overrides {
            nodes: Overrides::setting(options, "NodesLimit"),
            depth: Overrides::setting(options, "DepthLimit"),
            movetime: Overrides::setting(options, "Movetime"),
            average: Overrides::setting(options, "AverageMovetime"),
            perf: options.get_float("HostPerformanceFactor"),
            window: options.get_int("AverageMovetimeWindow"),
        }
    }

    /// Returns true if at least one override is configured.
    pub fn any(&self) -> bool {
        self.nodes.is_some() || self.depth.is_some()
            || self.movetime.is_some() || self.average.is_some()
    }

    /// Returns the highest-ranked configured limit, or `None` if no override is configured.
    ///
    /// Time budgets are scaled by the host performance factor and truncated to whole
    /// milliseconds. The average-time budget is truncated per move before being multiplied
    /// out to the full window.
    pub fn winning_limit(&self) -> Option<Limit> {
        if let Some(average) = &self.average {
            let per_move = self.scaled_ms(average);
            return Some(Limit::TimePool {
                both_ms: per_move.saturating_mul(self.window),
                moves_to_go: self.window,
            });
        }
        if let Some(movetime) = &self.movetime {
            return Some(Limit::MoveTime(self.scaled_ms(movetime)));
        }
        if let Some(depth) = &self.depth {
            return Some(Limit::Depth(depth.clone()));
        }
        if let Some(nodes) = &self.nodes {
            return Some(Limit::Nodes(nodes.clone()));
        }

        None
    }

    fn setting(options: &Options, name: &str) -> Option<String> {
        match options.get(name) {
            Some(value) if value != UNSET => Some(value.to_string()),
            _ => None,
        }
    }

    fn scaled_ms(&self, value: &str) -> i64 {
        let value: f64 = leading_number(value);

        (value * self.perf) as i64
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////
// ***************************************** UNIT TESTS ***************************************** //
////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_leave_the_command_alone() {
        let overrides = Overrides::from_options(&Options::new());
        assert!(!overrides.any());
        assert_eq!(overrides.winning_limit(), None);
    }

    #[test]
    fn node_and_depth_budgets_are_kept_as_text() {
        let mut options = Options::new();
        options.set("NodesLimit", "500000").unwrap();
        let overrides = Overrides::from_options(&options);
        assert!(overrides.any());
        assert_eq!(overrides.winning_limit().unwrap().to_string(), "nodes 500000");

        options.set("NodesLimit", UNSET).unwrap();
        options.set("DepthLimit", "12").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit().unwrap().to_string(), "depth 12");
    }

    #[test]
    fn fixed_time_is_scaled_and_truncated() {
        let mut options = Options::new();
        options.set("Movetime", "1001").unwrap();
        options.set("HostPerformanceFactor", "0.5").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(), Some(Limit::MoveTime(500)));
    }

    #[test]
    fn average_time_is_truncated_before_the_window_is_applied() {
        let mut options = Options::new();
        options.set("AverageMovetime", "999").unwrap();
        options.set("HostPerformanceFactor", "0.5").unwrap();
        let overrides = Overrides::from_options(&options);

        // 999 * 0.5 truncates to 499 per move, then spreads over the ten-move window
        assert_eq!(overrides.winning_limit(),
            Some(Limit::TimePool { both_ms: 4990, moves_to_go: 10 }));
        assert_eq!(overrides.winning_limit().unwrap().to_string(),
            "wtime 4990 btime 4990 movestogo 10");
    }

    #[test]
    fn the_window_setting_is_honored() {
        let mut options = Options::new();
        options.set("AverageMovetime", "3000").unwrap();
        options.set("AverageMovetimeWindow", "40").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(),
            Some(Limit::TimePool { both_ms: 120_000, moves_to_go: 40 }));
    }

    #[test]
    fn higher_ranked_budgets_win() {
        let mut options = Options::new();
        options.set("NodesLimit", "1000").unwrap();
        options.set("DepthLimit", "8").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit().unwrap().to_string(), "depth 8");

        options.set("Movetime", "2500").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(), Some(Limit::MoveTime(2500)));

        options.set("AverageMovetime", "1000").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(),
            Some(Limit::TimePool { both_ms: 10_000, moves_to_go: 10 }));
    }

    #[test]
    fn garbage_time_settings_scale_to_zero() {
        let mut options = Options::new();
        options.set("Movetime", "soon").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(), Some(Limit::MoveTime(0)));
    }

    #[test]
    fn sloppy_time_settings_read_their_numeric_prefix() {
        let mut options = Options::new();
        options.set("Movetime", "1500ms").unwrap();
        options.set("HostPerformanceFactor", "1.5x").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(), Some(Limit::MoveTime(2250)));
    }

    #[test]
    fn absurd_time_budgets_saturate() {
        let mut options = Options::new();
        options.set("AverageMovetime", "10000000000000000000").unwrap();
        let overrides = Overrides::from_options(&options);
        assert_eq!(overrides.winning_limit(),
            Some(Limit::TimePool { both_ms: i64::MAX, moves_to_go: 10 }));
    }
}
