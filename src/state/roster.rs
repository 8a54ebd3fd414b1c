use courtside_api::{Player, Side};
use std::collections::HashSet;
use std::time::{Duration, Instant};

pub const DEFAULT_ROSTER_TTL: Duration = Duration::from_secs(300);
pub const POSITIONS_PER_TEAM: usize = 7;

/// Cached player list for the attribution picker.
#[derive(Debug)]
pub struct PlayerRoster {
    players: Vec<Player>,
    loaded_at: Option<Instant>,
    loading: bool,
    ttl: Duration,
}

impl Default for PlayerRoster {
    fn default() -> Self {
        Self::new(DEFAULT_ROSTER_TTL)
    }
}

impl PlayerRoster {
    pub fn new(ttl: Duration) -> Self {
        Self {
            players: Vec::new(),
            loaded_at: None,
            loading: false,
            ttl,
        }
    }

    pub fn is_loaded(&self) -> bool {
        !self.players.is_empty()
    }

    /// Whether a fetch should be issued now. Marks the roster as loading when
    /// it returns true, so overlapping refreshes collapse into one.
    pub fn begin_refresh(&mut self, now: Instant) -> bool {
        if self.loading {
            return false;
        }
        let fresh = self
            .loaded_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.ttl);
        if fresh && self.is_loaded() {
            return false;
        }
        self.loading = true;
        true
    }

    pub fn finish_refresh(&mut self, players: Vec<Player>, now: Instant) {
        self.players = players;
        self.loaded_at = Some(now);
        self.loading = false;
    }

    /// Keep whatever was cached; the next refresh tick retries.
    pub fn fail_refresh(&mut self) {
        self.loading = false;
    }

    /// Forget the load time so the next refresh always fetches.
    pub fn invalidate(&mut self) {
        self.loaded_at = None;
    }

    pub fn find(&self, id: i64) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn sorted_by_name(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.iter().collect();
        players.sort_by_cached_key(|p| p.display_name());
        players
    }

    /// The scoring side's lineup first, in roster order, then everyone else.
    pub fn for_attribution(&self, lineup: &Lineup, side: Side) -> Vec<&Player> {
        let on_team: HashSet<i64> = lineup.players(side).collect();
        let (mut team, others): (Vec<&Player>, Vec<&Player>) =
            self.players.iter().partition(|p| on_team.contains(&p.id));
        team.extend(others);
        team
    }
}

/// Who stands on each side, by court position (1-based on the way in).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Lineup {
    left: [Option<i64>; POSITIONS_PER_TEAM],
    right: [Option<i64>; POSITIONS_PER_TEAM],
}

impl Lineup {
    /// Put `player_id` (or nobody) at `position`. Returns false for a
    /// position outside 1..=7.
    pub fn assign(&mut self, side: Side, position: usize, player_id: Option<i64>) -> bool {
        if !(1..=POSITIONS_PER_TEAM).contains(&position) {
            return false;
        }
        self.slots_mut(side)[position - 1] = player_id;
        true
    }

    pub fn players(&self, side: Side) -> impl Iterator<Item = i64> + '_ {
        self.slots(side).iter().flatten().copied()
    }

    pub fn side_of(&self, player_id: i64) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.players(side).any(|id| id == player_id))
    }

    fn slots(&self, side: Side) -> &[Option<i64>; POSITIONS_PER_TEAM] {
        match side {
            Side::Left => &self.left,
            Side::Right => &self.right,
        }
    }

    fn slots_mut(&mut self, side: Side) -> &mut [Option<i64>; POSITIONS_PER_TEAM] {
        match side {
            Side::Left => &mut self.left,
            Side::Right => &mut self.right,
        }
    }
}
