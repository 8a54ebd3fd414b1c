//! Attribution flow for a scored point: pick a point type, then (for aces,
//! attacks and blocks) the player who earned it.
//!
//! ```text
//! Idle --request--> AwaitingPointType --ace/attack/block--> AwaitingPlayer
//!                          |  ^                                  |
//!                error/other  +------------- back ---------------+
//!                          v                                     v
//!                        commit                          player or skip: commit
//! ```
//! `cancel` returns to Idle from anywhere without touching the log.

use courtside_api::{PointType, Side};
use std::fmt;

/// A point-scoring gesture waiting to be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingAdjustment {
    pub side: Side,
    /// Player suggested by the gesture itself, if any.
    pub player_id: Option<i64>,
}

/// Everything needed to build the point once the flow completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribution {
    pub side: Side,
    pub point_type: PointType,
    pub player_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributionState {
    #[default]
    Idle,
    AwaitingPointType(PendingAdjustment),
    AwaitingPlayer {
        pending: PendingAdjustment,
        point_type: PointType,
    },
}

/// Outcome of choosing a point type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeSelection {
    NeedsPlayer,
    Complete(Attribution),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributionError {
    /// A point is already being attributed.
    Busy,
    /// The step does not apply in the current state.
    OutOfOrder,
}

impl fmt::Display for AttributionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributionError::Busy => write!(f, "another point is still being attributed"),
            AttributionError::OutOfOrder => write!(f, "that choice is not available right now"),
        }
    }
}

impl std::error::Error for AttributionError {}

impl AttributionState {
    pub fn is_idle(&self) -> bool {
        matches!(self, AttributionState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingAdjustment> {
        match self {
            AttributionState::Idle => None,
            AttributionState::AwaitingPointType(pending)
            | AttributionState::AwaitingPlayer { pending, .. } => Some(pending),
        }
    }

    /// Stage a new adjustment. Only one may be in flight at a time.
    pub fn begin(&mut self, pending: PendingAdjustment) -> Result<(), AttributionError> {
        if !self.is_idle() {
            return Err(AttributionError::Busy);
        }
        *self = AttributionState::AwaitingPointType(pending);
        Ok(())
    }

    pub fn select_point_type(
        &mut self,
        point_type: PointType,
    ) -> Result<TypeSelection, AttributionError> {
        let AttributionState::AwaitingPointType(pending) = *self else {
            return Err(AttributionError::OutOfOrder);
        };
        if point_type.requires_player() {
            *self = AttributionState::AwaitingPlayer {
                pending,
                point_type,
            };
            return Ok(TypeSelection::NeedsPlayer);
        }
        *self = AttributionState::Idle;
        Ok(TypeSelection::Complete(Attribution {
            side: pending.side,
            point_type,
            player_id: pending.player_id,
        }))
    }

    /// `None` skips attribution and commits without a player.
    pub fn select_player(
        &mut self,
        player_id: Option<i64>,
    ) -> Result<Attribution, AttributionError> {
        let AttributionState::AwaitingPlayer {
            pending,
            point_type,
        } = *self
        else {
            return Err(AttributionError::OutOfOrder);
        };
        *self = AttributionState::Idle;
        Ok(Attribution {
            side: pending.side,
            point_type,
            player_id,
        })
    }

    /// Leave player selection for type selection, keeping the staged point.
    pub fn back(&mut self) -> Result<(), AttributionError> {
        let AttributionState::AwaitingPlayer { pending, .. } = *self else {
            return Err(AttributionError::OutOfOrder);
        };
        *self = AttributionState::AwaitingPointType(pending);
        Ok(())
    }

    /// Drop whatever is staged. Returns it, if there was anything.
    pub fn cancel(&mut self) -> Option<PendingAdjustment> {
        let pending = self.pending().copied();
        *self = AttributionState::Idle;
        pending
    }
}
