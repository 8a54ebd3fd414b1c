//! Folding the point log into the scoreboard.
//!
//! The scoreboard is never stored on its own: it is recomputed from the full
//! log after every mutation, so it cannot drift from the log.

use courtside_api::{Point, Side};
use log::debug;

/// A set ends once either side has this many points...
pub const SET_POINT_TARGET: u32 = 25;
/// ...and leads by at least this much.
pub const SET_WIN_MARGIN: u32 = 2;

/// Derived scoreboard for the set in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreState {
    pub left_score: u32,
    pub right_score: u32,
    pub left_wins: u32,
    pub right_wins: u32,
    /// 1-based.
    pub current_set_number: u32,
}

impl Default for ScoreState {
    fn default() -> Self {
        Self {
            left_score: 0,
            right_score: 0,
            left_wins: 0,
            right_wins: 0,
            current_set_number: 1,
        }
    }
}

impl ScoreState {
    pub fn score(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_score,
            Side::Right => self.right_score,
        }
    }

    pub fn wins(&self, side: Side) -> u32 {
        match side {
            Side::Left => self.left_wins,
            Side::Right => self.right_wins,
        }
    }

    /// Side currently ahead in the running set, `None` on a tie.
    pub fn leader(&self) -> Option<Side> {
        match self.left_score.cmp(&self.right_score) {
            std::cmp::Ordering::Greater => Some(Side::Left),
            std::cmp::Ordering::Less => Some(Side::Right),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Count one rally and close the set if it is now decided.
    /// Returns the set winner when the point ended a set.
    fn record(&mut self, winner: Side) -> Option<Side> {
        match winner {
            Side::Left => self.left_score += 1,
            Side::Right => self.right_score += 1,
        }
        if !is_set_complete(self.left_score, self.right_score) {
            return None;
        }

        // The margin guard rules out a tie here.
        let set_winner = if self.left_score > self.right_score {
            self.left_wins += 1;
            Side::Left
        } else {
            self.right_wins += 1;
            Side::Right
        };
        debug!(
            "set {} completed: {set_winner} won {}-{}",
            self.current_set_number, self.left_score, self.right_score
        );
        self.current_set_number += 1;
        self.left_score = 0;
        self.right_score = 0;
        Some(set_winner)
    }
}

pub fn is_set_complete(left: u32, right: u32) -> bool {
    (left >= SET_POINT_TARGET || right >= SET_POINT_TARGET) && left.abs_diff(right) >= SET_WIN_MARGIN
}

/// Replay `points` in the order given.
pub fn project<'a, I>(points: I) -> ScoreState
where
    I: IntoIterator<Item = &'a Point>,
{
    let mut state = ScoreState::default();
    for point in points {
        state.record(point.winner);
    }
    state
}

/// Set score immediately after a point, as shown in the point history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningScore {
    pub set_number: u32,
    pub left: u32,
    pub right: u32,
    /// This point decided the set.
    pub set_point: bool,
}

/// Score line after each point; the running score resets once a set closes.
pub fn running_scores<'a, I>(points: I) -> Vec<(&'a Point, RunningScore)>
where
    I: IntoIterator<Item = &'a Point>,
{
    let mut state = ScoreState::default();
    points
        .into_iter()
        .map(|point| {
            let set_number = state.current_set_number;
            let (left, right) = match point.winner {
                Side::Left => (state.left_score + 1, state.right_score),
                Side::Right => (state.left_score, state.right_score + 1),
            };
            let set_point = state.record(point.winner).is_some();
            (
                point,
                RunningScore {
                    set_number,
                    left,
                    right,
                    set_point,
                },
            )
        })
        .collect()
}
