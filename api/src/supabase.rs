//! PostgREST wire types for the `points` and `users` tables.
//! These map to the clean domain types in lib.rs via the From impls below.
use crate::{Player, Point, PointType, Side};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// points
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct PointRow {
    #[serde(default, deserialize_with = "de_row_id")]
    pub id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub winner: Side,
    #[serde(rename = "type")]
    pub point_type: Option<PointType>,
    pub player_id: Option<i64>,
}

/// Insert payload. `id` is omitted so the database assigns it.
#[derive(Debug, Serialize)]
pub struct NewPointRow {
    pub created_at: DateTime<Utc>,
    pub winner: Side,
    #[serde(rename = "type")]
    pub point_type: Option<PointType>,
    pub player_id: Option<i64>,
}

impl From<PointRow> for Point {
    fn from(row: PointRow) -> Self {
        Point {
            id: row.id,
            // Rows fetched from the server get a fresh client identity.
            local_id: Uuid::new_v4(),
            created_at: row.created_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            winner: row.winner,
            point_type: row.point_type,
            player_id: row.player_id,
        }
    }
}

impl From<&Point> for NewPointRow {
    fn from(point: &Point) -> Self {
        NewPointRow {
            created_at: point.created_at,
            winner: point.winner,
            point_type: point.point_type,
            player_id: point.player_id,
        }
    }
}

/// Row ids are uuids on some deployments and bigints on others.
fn de_row_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// users
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Clone)]
pub struct UserRow {
    pub id: Option<i64>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl UserRow {
    /// Users without an id cannot be credited with points.
    pub fn into_player(self) -> Option<Player> {
        Some(Player {
            id: self.id?,
            first_name: self.first_name,
            last_name: self.last_name,
            username: self.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_row_accepts_numeric_and_string_ids() {
        let numeric: PointRow = serde_json::from_str(
            r#"{"id": 42, "created_at": "2026-10-18T09:15:00.123456+00:00", "winner": "left", "type": "ace", "player_id": 3}"#,
        )
        .unwrap();
        assert_eq!(numeric.id.as_deref(), Some("42"));
        assert_eq!(numeric.point_type, Some(PointType::Ace));

        let text: PointRow = serde_json::from_str(
            r#"{"id": "b1f0", "created_at": "2026-10-18T09:15:00Z", "winner": "right", "type": null, "player_id": null}"#,
        )
        .unwrap();
        assert_eq!(text.id.as_deref(), Some("b1f0"));
        assert_eq!(text.winner, Side::Right);
    }

    #[test]
    fn new_point_row_serializes_type_column() {
        let point = Point::new(Side::Right, Some(PointType::Block), Some(9));
        let json = serde_json::to_value(NewPointRow::from(&point)).unwrap();
        assert_eq!(json["type"], "block");
        assert_eq!(json["winner"], "right");
        assert_eq!(json["player_id"], 9);
        assert!(json.get("id").is_none());
    }

    #[test]
    fn user_without_id_is_dropped() {
        let row: UserRow = serde_json::from_str(r#"{"id": null, "first_name": "Kim"}"#).unwrap();
        assert!(row.into_player().is_none());
    }
}
