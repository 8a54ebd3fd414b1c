use crate::client::{ApiError, ApiResult};
use crate::{Player, Point};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

/// Remote persistence for the point log and the player roster.
///
/// Every call may fail independently; nothing here is transactional across
/// calls. "Today" is the current UTC calendar day.
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Today's points, oldest first.
    async fn fetch_todays_points(&self) -> ApiResult<Vec<Point>>;

    /// Persist one point. Returns the server-assigned id when the server
    /// reports one.
    async fn append_point(&self, point: &Point) -> ApiResult<Option<String>>;

    /// Delete the newest point by creation time and return it, or `None`
    /// when there was nothing to delete.
    async fn delete_most_recent_point(&self) -> ApiResult<Option<Point>>;

    async fn delete_point(&self, id: &str) -> ApiResult<()>;

    async fn delete_all_points_for_today(&self) -> ApiResult<()>;

    async fn fetch_player_roster(&self) -> ApiResult<Vec<Player>>;
}

/// In-process store used when no remote is configured, and by tests.
/// `set_failing(true)` makes every call fail with a network-style error.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    failing: AtomicBool,
}

#[derive(Debug, Default)]
struct MemoryInner {
    points: Vec<Point>,
    players: Vec<Player>,
    next_id: u64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_players(players: Vec<Player>) -> Self {
        let store = Self::default();
        store.lock().players = players;
        store
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Snapshot of everything stored, regardless of day.
    pub fn points(&self) -> Vec<Point> {
        self.lock().points.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryInner> {
        // A poisoned lock only means another test thread panicked mid-call.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check(&self, op: &str) -> ApiResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(ApiError::Other(format!("memory store unavailable during {op}")))
        } else {
            Ok(())
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

#[async_trait]
impl PointStore for MemoryStore {
    async fn fetch_todays_points(&self) -> ApiResult<Vec<Point>> {
        self.check("fetch")?;
        let day = today();
        let mut points: Vec<Point> = self
            .lock()
            .points
            .iter()
            .filter(|p| p.created_at.date_naive() == day)
            .cloned()
            .collect();
        points.sort_by_key(|p| p.created_at);
        Ok(points)
    }

    async fn append_point(&self, point: &Point) -> ApiResult<Option<String>> {
        self.check("append")?;
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = inner.next_id.to_string();
        inner.points.push(point.clone().with_id(id.clone()));
        Ok(Some(id))
    }

    async fn delete_most_recent_point(&self) -> ApiResult<Option<Point>> {
        self.check("delete last")?;
        let mut inner = self.lock();
        let newest = inner
            .points
            .iter()
            .enumerate()
            .max_by_key(|(_, p)| p.created_at)
            .map(|(i, _)| i);
        Ok(newest.map(|i| inner.points.remove(i)))
    }

    async fn delete_point(&self, id: &str) -> ApiResult<()> {
        self.check("delete")?;
        let mut inner = self.lock();
        let before = inner.points.len();
        inner.points.retain(|p| p.id.as_deref() != Some(id));
        if inner.points.len() == before {
            return Err(ApiError::NotFound(format!("point {id}")));
        }
        Ok(())
    }

    async fn delete_all_points_for_today(&self) -> ApiResult<()> {
        self.check("delete all")?;
        let day = today();
        self.lock().points.retain(|p| p.created_at.date_naive() != day);
        Ok(())
    }

    async fn fetch_player_roster(&self) -> ApiResult<Vec<Player>> {
        self.check("roster")?;
        Ok(self.lock().players.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Side;

    #[tokio::test]
    async fn memory_store_assigns_ids_and_deletes_newest() {
        let store = MemoryStore::new();
        let first = Point::new(Side::Left, None, None);
        let second = Point::at(first.created_at + chrono::Duration::seconds(1), Side::Right, None, None);

        assert_eq!(store.append_point(&first).await.unwrap().as_deref(), Some("1"));
        assert_eq!(store.append_point(&second).await.unwrap().as_deref(), Some("2"));

        let deleted = store.delete_most_recent_point().await.unwrap().unwrap();
        assert_eq!(deleted.local_id, second.local_id);
        assert_eq!(store.fetch_todays_points().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failing_store_rejects_every_call() {
        let store = MemoryStore::new();
        store.set_failing(true);
        assert!(store.append_point(&Point::new(Side::Left, None, None)).await.is_err());
        assert!(store.delete_all_points_for_today().await.is_err());
        store.set_failing(false);
        assert!(store.fetch_todays_points().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn deleting_unknown_id_is_not_found() {
        let store = MemoryStore::new();
        assert!(matches!(store.delete_point("99").await, Err(ApiError::NotFound(_))));
    }
}
