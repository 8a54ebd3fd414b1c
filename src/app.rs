use crate::score::actions::{ActionService, SyncStatus};
use crate::score::attribution::AttributionState;
use crate::score::projection::running_scores;
use crate::state::app_settings::AppSettings;
use crate::state::messages::{SyncRequest, SyncResponse};
use crate::state::roster::{Lineup, PlayerRoster, POSITIONS_PER_TEAM};
use chrono::Local;
use courtside_api::{PointType, Side};
use log::{error, info};
use std::fmt::Write;
use std::time::Instant;
use uuid::Uuid;

/// What a sync response did to the session.
#[derive(Debug, Default)]
pub struct SyncOutcome {
    /// The visible score, history or sync status changed.
    pub changed: bool,
    /// A call the response made necessary, such as a delete that was
    /// waiting for its point's server id.
    pub follow_up: Option<SyncRequest>,
}

/// Sole owner of session state. Everything that mutates the log, the roster
/// or the lineup goes through here on the owner loop.
pub struct App {
    pub settings: AppSettings,
    pub session: ActionService,
    pub roster: PlayerRoster,
    pub lineup: Lineup,
    pub last_error: Option<String>,
}

impl App {
    pub fn new(settings: AppSettings) -> Self {
        let roster = PlayerRoster::new(settings.roster_ttl);
        Self {
            settings,
            session: ActionService::new(),
            roster,
            lineup: Lineup::default(),
            last_error: None,
        }
    }

    // -----------------------------------------------------------------------
    // Sync response handlers, called from the owner loop
    // -----------------------------------------------------------------------

    /// Apply a completed remote call.
    pub fn on_sync_response(&mut self, response: SyncResponse) -> SyncOutcome {
        match response {
            SyncResponse::RosterLoaded(Ok(players)) => {
                info!("roster loaded: {} players", players.len());
                self.roster.finish_refresh(players, Instant::now());
                SyncOutcome::default()
            }
            SyncResponse::RosterLoaded(Err(message)) => {
                error!("failed to load roster: {message}");
                self.roster.fail_refresh();
                self.last_error = Some(message);
                SyncOutcome::default()
            }
            response => {
                let before = (self.session.score(), self.session.points().len(), self.session.status());
                if let Some(message) = failure_message(&response) {
                    self.last_error = Some(message);
                }
                let follow_up = self.session.handle_response(response);
                SyncOutcome {
                    changed: before
                        != (self.session.score(), self.session.points().len(), self.session.status()),
                    follow_up,
                }
            }
        }
    }

    /// A roster fetch, if the cached one is missing or stale.
    pub fn roster_refresh(&mut self, now: Instant) -> Option<SyncRequest> {
        self.roster
            .begin_refresh(now)
            .then_some(SyncRequest::LoadRoster)
    }

    /// Local id of the `n`th history entry, counting from the newest.
    pub fn history_entry(&self, n: usize) -> Option<Uuid> {
        let points = self.session.points();
        n.checked_sub(1)
            .and_then(|back| points.len().checked_sub(back + 1))
            .map(|i| points[i].local_id)
    }

    // -----------------------------------------------------------------------
    // Rendering
    // -----------------------------------------------------------------------

    /// Scoreboard, plus the question the attribution flow is waiting on.
    pub fn status_line(&self) -> String {
        let score = self.session.score();
        let status = self.session.status();
        let mut out = format!(
            "{} {} - {} {}   sets {}-{}   set {}   [{}]",
            Side::Left.team_name(),
            score.score(Side::Left),
            score.score(Side::Right),
            Side::Right.team_name(),
            score.wins(Side::Left),
            score.wins(Side::Right),
            score.current_set_number,
            status.label(),
        );
        if let Some(leader) = score.leader() {
            let _ = write!(out, "   {} leads", leader.team_name());
        }
        if self.settings.remote.is_none() {
            out.push_str("   (memory only)");
        }
        if matches!(status, SyncStatus::Degraded | SyncStatus::Offline)
            && let Some(error) = &self.last_error
        {
            let _ = write!(out, "\n  last sync error: {error}");
        }
        if let Some(prompt) = self.prompt() {
            out.push('\n');
            out.push_str(&prompt);
        }
        out
    }

    fn prompt(&self) -> Option<String> {
        match self.session.attribution() {
            AttributionState::Idle => None,
            AttributionState::AwaitingPointType(pending) => {
                let kinds: Vec<&str> = PointType::ALL.iter().map(|t| t.label()).collect();
                Some(format!(
                    "{} point: how was it won? type <{}> (or cancel)",
                    pending.side.team_name(),
                    kinds.join("|").to_lowercase()
                ))
            }
            AttributionState::AwaitingPlayer {
                pending,
                point_type,
            } => {
                let mut out = format!(
                    "{} {}: who earned it? player <id>, skip or back",
                    pending.side.team_name(),
                    point_type
                );
                for player in self.roster.for_attribution(&self.lineup, pending.side) {
                    let _ = write!(out, "\n  {:>4}  {}", player.id, player.display_name());
                }
                Some(out)
            }
        }
    }

    /// Today's points, newest first, with the set score after each.
    pub fn history(&self) -> String {
        let rows = running_scores(self.session.points());
        if rows.is_empty() {
            return "No points yet today".to_string();
        }

        let mut out = String::new();
        for (n, (point, running)) in rows.iter().rev().enumerate() {
            let kind = point.point_type.map_or("-", |t| t.label());
            let player = point
                .player_id
                .map(|id| self.player_name(id))
                .unwrap_or_default();
            let _ = write!(
                out,
                "{:>3}. {}  {:<9} {:<7} {:>2}-{:<2} set {}{}  {}",
                n + 1,
                point.created_at.with_timezone(&Local).format("%H:%M:%S"),
                point.winner.team_name(),
                kind,
                running.left,
                running.right,
                running.set_number,
                if running.set_point { " *" } else { "  " },
                player,
            );
            if !point.is_persisted() {
                out.push_str("  (unsynced)");
            }
            out.push('\n');
        }
        out.truncate(out.trim_end().len());
        out
    }

    pub fn roster_listing(&self) -> String {
        let mut out = String::new();
        for side in Side::BOTH {
            let _ = write!(out, "{} court:", side.team_name());
            let on_court: Vec<String> = self
                .lineup
                .players(side)
                .map(|id| self.player_name(id))
                .collect();
            if on_court.is_empty() {
                out.push_str(" (empty)");
            } else {
                let _ = write!(out, " {}", on_court.join(", "));
            }
            out.push('\n');
        }

        if !self.roster.is_loaded() {
            out.push_str("Roster not loaded");
            return out;
        }
        for player in self.roster.sorted_by_name() {
            let side = self
                .lineup
                .side_of(player.id)
                .map_or(String::new(), |s| format!("  ({})", s.team_name()));
            let _ = writeln!(out, "{:>4}  {}{}", player.id, player.display_name(), side);
        }
        let _ = write!(out, "Positions per side: {POSITIONS_PER_TEAM}");
        out
    }

    fn player_name(&self, id: i64) -> String {
        self.roster
            .find(id)
            .map_or_else(|| format!("#{id}"), |p| p.display_name())
    }
}

fn failure_message(response: &SyncResponse) -> Option<String> {
    match response {
        SyncResponse::PointsLoaded(Err(m))
        | SyncResponse::RosterLoaded(Err(m))
        | SyncResponse::PointAppended { result: Err(m), .. }
        | SyncResponse::LastPointDeleted { result: Err(m), .. }
        | SyncResponse::PointDeleted { result: Err(m), .. }
        | SyncResponse::AllPointsDeleted { result: Err(m) } => Some(m.clone()),
        _ => None,
    }
}
