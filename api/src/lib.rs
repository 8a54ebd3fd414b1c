pub mod client;
pub mod store;
pub mod supabase;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Domain types: clean model, independent of the PostgREST wire format
// ---------------------------------------------------------------------------

/// Which half of the court won a rally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn label(&self) -> &'static str {
        match self {
            Side::Left => "left",
            Side::Right => "right",
        }
    }

    /// Display name used by the scoreboard ("Blue Team" plays on the left).
    pub fn team_name(&self) -> &'static str {
        match self {
            Side::Left => "Blue Team",
            Side::Right => "Red Team",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" | "l" | "blue" => Some(Side::Left),
            "right" | "r" | "red" => Some(Side::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// How a point was won. Serialized with the column values the `points` table uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointType {
    Ace,
    Attack,
    Block,
    Error,
    Unspecified,
}

impl PointType {
    pub const ALL: [PointType; 5] = [
        PointType::Ace,
        PointType::Attack,
        PointType::Block,
        PointType::Error,
        PointType::Unspecified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PointType::Ace => "Ace",
            PointType::Attack => "Attack",
            PointType::Block => "Block",
            PointType::Error => "Error",
            PointType::Unspecified => "Other",
        }
    }

    /// Aces, attacks and blocks are credited to a player; errors and
    /// unclassified points are not.
    pub fn requires_player(&self) -> bool {
        matches!(self, PointType::Ace | PointType::Attack | PointType::Block)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ace" => Some(PointType::Ace),
            "attack" | "kill" => Some(PointType::Attack),
            "block" => Some(PointType::Block),
            "error" => Some(PointType::Error),
            "other" | "unspecified" => Some(PointType::Unspecified),
            _ => None,
        }
    }
}

impl fmt::Display for PointType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One scored rally. Never edited in place: a correction is a deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    /// Server-assigned identifier; `None` until the insert is acknowledged.
    pub id: Option<String>,
    /// Client-side identity, stable from creation. Used to match remote
    /// completions back to log entries.
    pub local_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub winner: Side,
    pub point_type: Option<PointType>,
    pub player_id: Option<i64>,
}

impl Point {
    /// A fresh, not yet persisted point stamped with the current time.
    pub fn new(winner: Side, point_type: Option<PointType>, player_id: Option<i64>) -> Self {
        Self::at(Utc::now(), winner, point_type, player_id)
    }

    pub fn at(
        created_at: DateTime<Utc>,
        winner: Side,
        point_type: Option<PointType>,
        player_id: Option<i64>,
    ) -> Self {
        Self {
            id: None,
            local_id: Uuid::new_v4(),
            created_at,
            winner,
            point_type,
            player_id,
        }
    }

    pub fn with_id(self, id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..self
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

/// A roster entry that points can be attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Player {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl Player {
    pub fn display_name(&self) -> String {
        if let Some(username) = self.username.as_deref()
            && !username.is_empty()
        {
            return format!("@{username}");
        }
        match self.last_name.as_deref() {
            Some(last) if !last.is_empty() => format!("{} {last}", self.first_name),
            _ => self.first_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_display_name_prefers_username() {
        let p = Player {
            id: 1,
            first_name: "Ana".into(),
            last_name: Some("Silva".into()),
            username: Some("anas".into()),
        };
        assert_eq!(p.display_name(), "@anas");
    }

    #[test]
    fn player_display_name_falls_back_to_full_then_first_name() {
        let mut p = Player {
            id: 2,
            first_name: "Ana".into(),
            last_name: Some("Silva".into()),
            username: Some(String::new()),
        };
        assert_eq!(p.display_name(), "Ana Silva");
        p.last_name = None;
        assert_eq!(p.display_name(), "Ana");
    }

    #[test]
    fn only_ace_attack_block_need_a_player() {
        let needing: Vec<_> = PointType::ALL
            .into_iter()
            .filter(PointType::requires_player)
            .collect();
        assert_eq!(needing, vec![PointType::Ace, PointType::Attack, PointType::Block]);
    }

    #[test]
    fn point_type_uses_table_column_values() {
        assert_eq!(serde_json::to_string(&PointType::Unspecified).unwrap(), "\"unspecified\"");
        assert_eq!(serde_json::to_string(&Side::Left).unwrap(), "\"left\"");
        assert_eq!(PointType::parse("other"), Some(PointType::Unspecified));
    }

    #[test]
    fn new_points_get_distinct_local_ids() {
        let a = Point::new(Side::Left, None, None);
        let b = Point::new(Side::Left, None, None);
        assert_ne!(a.local_id, b.local_id);
        assert!(!a.is_persisted());
        assert!(a.with_id("7").is_persisted());
    }
}
