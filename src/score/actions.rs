//! Score-changing intents against the point log.
//!
//! Every operation mutates the log synchronously, recomputes the scoreboard,
//! and hands back the `SyncRequest` the caller should run remotely. When the
//! outcome arrives, `handle_response` reconciles the log with it: a failed
//! append is rolled back, a failed delete is restored. `reset_all` is the one
//! exception and is never reverted.
//!
//! Deletes always name their point. A point whose append is still in flight
//! has no server id yet, so its delete is held back and issued from the
//! append's acknowledgement.

use crate::score::attribution::{
    Attribution, AttributionError, AttributionState, PendingAdjustment, TypeSelection,
};
use crate::score::point_log::PointLog;
use crate::score::projection::{ScoreState, project};
use crate::state::messages::{SyncRequest, SyncResponse};
use courtside_api::{Point, PointType, Side};
use log::{debug, error, info, warn};
use std::collections::{HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

/// The single most recent action, for one level of undo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastAction {
    pub side: Side,
    pub was_increment: bool,
    /// The point that was appended or removed.
    pub local_id: Uuid,
}

/// Connection indicator shown next to the scoreboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// Initial load still in flight.
    Connecting,
    /// Loaded, and the latest remote call succeeded.
    Synced,
    /// Loaded, but the latest remote call failed.
    Degraded,
    /// Initial load failed: local state has never been synced.
    Offline,
}

impl SyncStatus {
    pub fn label(&self) -> &'static str {
        match self {
            SyncStatus::Connecting => "Connecting...",
            SyncStatus::Synced => "OK",
            SyncStatus::Degraded => "Sync error",
            SyncStatus::Offline => "Not synced",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionError {
    /// An increment is already waiting for attribution.
    AdjustmentPending,
    NoPendingAdjustment,
    /// The choice does not fit the current attribution step.
    OutOfOrder,
}

impl fmt::Display for ActionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionError::AdjustmentPending => {
                write!(f, "finish or cancel the point being attributed first")
            }
            ActionError::NoPendingAdjustment => write!(f, "no point is waiting for attribution"),
            ActionError::OutOfOrder => write!(f, "that choice is not available right now"),
        }
    }
}

impl std::error::Error for ActionError {}

#[derive(Debug, Default)]
pub struct ActionService {
    log: PointLog,
    score: ScoreState,
    attribution: AttributionState,
    last_action: Option<LastAction>,
    /// Appends sent but not yet answered.
    in_flight: HashSet<Uuid>,
    /// Points removed locally while their append was in flight, waiting for
    /// a server id to delete by.
    deferred_deletes: HashMap<Uuid, Point>,
    /// `None` until the initial fetch completes.
    loaded: Option<bool>,
    last_remote_failed: bool,
}

impl ActionService {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Read side
    // -----------------------------------------------------------------------

    pub fn score(&self) -> ScoreState {
        self.score
    }

    pub fn points(&self) -> &[Point] {
        self.log.points()
    }

    pub fn attribution(&self) -> &AttributionState {
        &self.attribution
    }

    pub fn last_action(&self) -> Option<LastAction> {
        self.last_action
    }

    pub fn status(&self) -> SyncStatus {
        match (self.loaded, self.last_remote_failed) {
            (None, _) => SyncStatus::Connecting,
            (Some(false), _) => SyncStatus::Offline,
            (Some(true), false) => SyncStatus::Synced,
            (Some(true), true) => SyncStatus::Degraded,
        }
    }

    // -----------------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------------

    /// A positive `delta` stages the point for attribution; anything else
    /// removes the newest point right away.
    pub fn request_adjustment(
        &mut self,
        side: Side,
        delta: i32,
        player_id: Option<i64>,
    ) -> Result<Option<SyncRequest>, ActionError> {
        if delta <= 0 {
            let Some(removed) = self.remove_newest() else {
                return Ok(None);
            };
            self.last_action = Some(LastAction {
                side,
                was_increment: false,
                local_id: removed.local_id,
            });
            return Ok(self.remote_delete(removed, true));
        }

        self.attribution
            .begin(PendingAdjustment { side, player_id })
            .map_err(|_| {
                warn!("adjustment for {side} rejected: another point is pending");
                ActionError::AdjustmentPending
            })?;
        debug!("{side} point staged, awaiting point type");
        Ok(None)
    }

    /// Returns a request when the choice completes the attribution.
    pub fn select_point_type(
        &mut self,
        point_type: PointType,
    ) -> Result<Option<SyncRequest>, ActionError> {
        match self
            .attribution
            .select_point_type(point_type)
            .map_err(|e| self.attribution_error(e))?
        {
            TypeSelection::NeedsPlayer => Ok(None),
            TypeSelection::Complete(attribution) => Ok(Some(self.commit(attribution))),
        }
    }

    /// `None` skips crediting a player.
    pub fn select_player(&mut self, player_id: Option<i64>) -> Result<SyncRequest, ActionError> {
        let attribution = self
            .attribution
            .select_player(player_id)
            .map_err(|e| self.attribution_error(e))?;
        Ok(self.commit(attribution))
    }

    pub fn back_to_point_type(&mut self) -> Result<(), ActionError> {
        self.attribution
            .back()
            .map_err(|e| self.attribution_error(e))
    }

    pub fn cancel_adjustment(&mut self) -> Option<PendingAdjustment> {
        let pending = self.attribution.cancel();
        if let Some(p) = &pending {
            debug!("discarded staged {} point", p.side);
        }
        pending
    }

    /// Commit the staged adjustment with an explicit classification,
    /// whatever step the attribution flow is on.
    pub fn confirm_adjustment(
        &mut self,
        point_type: PointType,
        player_id: Option<i64>,
    ) -> Result<SyncRequest, ActionError> {
        let pending = self
            .attribution
            .cancel()
            .ok_or(ActionError::NoPendingAdjustment)?;
        Ok(self.commit(Attribution {
            side: pending.side,
            point_type,
            player_id,
        }))
    }

    /// Drop the newest point locally and ask the server to do the same.
    /// Returns `None` when the log is empty or the delete has to wait for
    /// the point's append to be acknowledged.
    pub fn delete_last_point(&mut self) -> Option<SyncRequest> {
        let removed = self.remove_newest()?;
        self.remote_delete(removed, true)
    }

    pub fn delete_specific_point(&mut self, local_id: Uuid) -> Option<SyncRequest> {
        let Some(point) = self.log.get(local_id) else {
            warn!("point {local_id} is not in the local history; nothing to delete");
            return None;
        };
        if !point.is_persisted() && !self.in_flight.contains(&local_id) {
            warn!("point {local_id} was saved without an id and cannot be deleted by id");
            return None;
        }
        let point = self.log.remove(local_id)?;
        self.recompute();
        self.remote_delete(point, false)
    }

    /// Clear everything locally. Unlike the other operations this is not
    /// reverted if the remote cleanup fails.
    pub fn reset_all(&mut self) -> SyncRequest {
        self.log.clear();
        self.last_action = None;
        self.deferred_deletes.clear();
        self.recompute();
        info!("scoreboard reset");
        SyncRequest::DeleteAllForToday
    }

    /// Revert the most recent action. Only one level is kept: the slot is
    /// emptied, so a second undo does nothing.
    pub fn undo_last_action(&mut self) -> Option<SyncRequest> {
        let Some(action) = self.last_action.take() else {
            debug!("nothing to undo");
            return None;
        };
        if action.was_increment {
            let newest = self.log.points().last().map(|p| p.local_id) == Some(action.local_id);
            let Some(point) = self.log.remove(action.local_id) else {
                debug!("point {} already left the log; nothing to undo", action.local_id);
                return None;
            };
            self.recompute();
            return self.remote_delete(point, newest);
        }

        // Put the point back without asking for its type again.
        Some(self.append(Point::new(action.side, None, None)))
    }

    // -----------------------------------------------------------------------
    // Reconciliation
    // -----------------------------------------------------------------------

    /// Apply a remote outcome. Returns the follow-up call it makes
    /// necessary, if any.
    pub fn handle_response(&mut self, response: SyncResponse) -> Option<SyncRequest> {
        match response {
            SyncResponse::PointsLoaded(Ok(points)) => {
                info!("loaded {} points for today", points.len());
                self.log.seed(points);
                self.loaded = Some(true);
                self.last_remote_failed = false;
                self.recompute();
            }
            SyncResponse::PointsLoaded(Err(message)) => {
                error!("failed to load today's points: {message}");
                self.loaded = Some(false);
            }
            SyncResponse::RosterLoaded(_) => {
                debug!("roster responses are not handled by the action service");
            }
            SyncResponse::PointAppended { point, result } => {
                self.in_flight.remove(&point.local_id);
                let deferred = self.deferred_deletes.remove(&point.local_id);
                match result {
                    Ok(remote_id) => {
                        self.remote_ok();
                        if let Some(removed) = deferred {
                            debug!("point {} acknowledged; issuing its held delete", point.local_id);
                            return Some(match remote_id {
                                Some(id) => SyncRequest::DeletePoint {
                                    point: removed.with_id(id),
                                },
                                None => SyncRequest::DeleteLastPoint { removed },
                            });
                        }
                        if let Some(id) = remote_id
                            && !self.log.acknowledge(point.local_id, id)
                        {
                            debug!("acknowledged point {} already left the log", point.local_id);
                        }
                    }
                    Err(message) => {
                        self.remote_failed();
                        error!("failed to track point: {message}");
                        if self
                            .last_action
                            .is_some_and(|a| a.was_increment && a.local_id == point.local_id)
                        {
                            self.last_action = None;
                        }
                        if deferred.is_some() {
                            debug!("held delete of {} dropped: the point was never saved", point.local_id);
                        } else if self.log.remove(point.local_id).is_some() {
                            warn!("rolled back {} point {}", point.winner, point.local_id);
                            self.recompute();
                        } else {
                            warn!("failed point {} no longer in the log", point.local_id);
                        }
                    }
                }
            }
            SyncResponse::LastPointDeleted { removed, result } => match result {
                Ok(Some(deleted)) if same_point(&removed, &deleted) => self.remote_ok(),
                Ok(Some(deleted)) => {
                    // The server dropped a different point: mirror it, and
                    // keep the one it still holds.
                    warn!(
                        "server deleted point {:?} instead of {}; following the server",
                        deleted.id, removed.local_id
                    );
                    if let Some(id) = deleted.id.as_deref()
                        && self.log.remove_by_id(id).is_some()
                    {
                        self.recompute();
                    }
                    self.restore(removed);
                    self.remote_failed();
                }
                Ok(None) => {
                    self.remote_ok();
                    warn!("no point found to delete on the server; restoring locally");
                    self.restore(removed);
                }
                Err(message) => {
                    self.remote_failed();
                    error!("failed to delete last point: {message}");
                    self.restore(removed);
                }
            },
            SyncResponse::PointDeleted { point, result } => match result {
                Ok(()) => self.remote_ok(),
                Err(message) if point.id.is_none() => {
                    warn!("point {} has no server id, keeping it: {message}", point.local_id);
                    self.restore(point);
                }
                Err(message) => {
                    self.remote_failed();
                    error!("failed to delete point {:?}: {message}", point.id);
                    self.restore(point);
                }
            },
            SyncResponse::AllPointsDeleted { result } => match result {
                Ok(()) => {
                    self.remote_ok();
                    info!("reset completed: all of today's points cleared");
                }
                Err(message) => {
                    self.remote_failed();
                    error!("failed to clear today's points, keeping local reset: {message}");
                }
            },
        }
        None
    }

    fn commit(&mut self, attribution: Attribution) -> SyncRequest {
        let point = Point::new(
            attribution.side,
            Some(attribution.point_type),
            attribution.player_id,
        );
        self.last_action = Some(LastAction {
            side: attribution.side,
            was_increment: true,
            local_id: point.local_id,
        });
        debug!(
            "{} point committed as {} (player {:?})",
            attribution.side, attribution.point_type, attribution.player_id
        );
        self.append(point)
    }

    fn append(&mut self, point: Point) -> SyncRequest {
        self.in_flight.insert(point.local_id);
        self.log.append(point.clone());
        self.recompute();
        SyncRequest::AppendPoint { point }
    }

    fn remove_newest(&mut self) -> Option<Point> {
        let Some(removed) = self.log.pop() else {
            warn!("no points in local history to delete");
            return None;
        };
        self.recompute();
        Some(removed)
    }

    /// The remote side of a local removal. `newest` says whether the point
    /// was the newest in the log, so the server's newest point can stand in
    /// for one that was saved without an id.
    fn remote_delete(&mut self, point: Point, newest: bool) -> Option<SyncRequest> {
        if point.is_persisted() {
            return Some(SyncRequest::DeletePoint { point });
        }
        if self.in_flight.contains(&point.local_id) {
            debug!("point {} is still being saved; delete held", point.local_id);
            self.deferred_deletes.insert(point.local_id, point);
            return None;
        }
        if newest {
            return Some(SyncRequest::DeleteLastPoint { removed: point });
        }
        warn!("point {} has no server id; keeping it", point.local_id);
        self.restore(point);
        None
    }

    fn restore(&mut self, point: Point) {
        let local_id = point.local_id;
        if self.log.restore(point) {
            warn!("restored point {local_id}");
            self.recompute();
        }
    }

    fn recompute(&mut self) {
        self.score = project(&self.log);
    }

    fn remote_ok(&mut self) {
        self.last_remote_failed = false;
    }

    fn remote_failed(&mut self) {
        self.last_remote_failed = true;
    }

    fn attribution_error(&self, err: AttributionError) -> ActionError {
        match err {
            AttributionError::Busy => ActionError::AdjustmentPending,
            AttributionError::OutOfOrder if self.attribution.is_idle() => {
                ActionError::NoPendingAdjustment
            }
            AttributionError::OutOfOrder => ActionError::OutOfOrder,
        }
    }
}

/// Server ids when both sides have one; otherwise the stored timestamp
/// (microsecond precision) and winner.
fn same_point(a: &Point, b: &Point) -> bool {
    match (a.id.as_deref(), b.id.as_deref()) {
        (Some(x), Some(y)) => x == y,
        _ => {
            a.winner == b.winner
                && a.created_at.timestamp_micros() == b.created_at.timestamp_micros()
        }
    }
}
