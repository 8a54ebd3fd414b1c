use courtside_api::Point;
use uuid::Uuid;

/// Today's points, oldest first. The only source of truth for the score.
#[derive(Debug, Clone, Default)]
pub struct PointLog {
    points: Vec<Point>,
}

impl PointLog {
    pub fn from_points(mut points: Vec<Point>) -> Self {
        points.sort_by_key(|p| p.created_at);
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn get(&self, local_id: Uuid) -> Option<&Point> {
        self.points.iter().find(|p| p.local_id == local_id)
    }

    pub fn contains(&self, local_id: Uuid) -> bool {
        self.position(local_id).is_some()
    }

    /// Append in call order. New points are stamped "now", so this keeps the
    /// log chronological without searching.
    pub fn append(&mut self, point: Point) {
        self.points.push(point);
    }

    pub fn pop(&mut self) -> Option<Point> {
        self.points.pop()
    }

    /// Remove by client identity, wherever the point currently sits.
    pub fn remove(&mut self, local_id: Uuid) -> Option<Point> {
        let index = self.position(local_id)?;
        Some(self.points.remove(index))
    }

    /// Remove the point the server knows as `id`.
    pub fn remove_by_id(&mut self, id: &str) -> Option<Point> {
        let index = self.points.iter().position(|p| p.id.as_deref() == Some(id))?;
        Some(self.points.remove(index))
    }

    /// Put a previously removed point back where its timestamp belongs.
    /// Points with an equal timestamp stay ahead of it. Restoring a point
    /// that is already present is a no-op.
    pub fn restore(&mut self, point: Point) -> bool {
        if self.contains(point.local_id) {
            return false;
        }
        let index = self
            .points
            .partition_point(|p| p.created_at <= point.created_at);
        self.points.insert(index, point);
        true
    }

    /// Record the server id for a point once its insert is acknowledged.
    /// Returns false when the point has since left the log.
    pub fn acknowledge(&mut self, local_id: Uuid, remote_id: String) -> bool {
        let Some(index) = self.position(local_id) else {
            return false;
        };
        let acknowledged = self.points[index].clone().with_id(remote_id);
        self.points[index] = acknowledged;
        true
    }

    /// Replace the log with the server's view of today, keeping local points
    /// the server has not acknowledged yet.
    pub fn seed(&mut self, remote: Vec<Point>) {
        let pending: Vec<Point> = self
            .points
            .drain(..)
            .filter(|p| !p.is_persisted())
            .collect();
        *self = Self::from_points(remote);
        for point in pending {
            self.restore(point);
        }
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    fn position(&self, local_id: Uuid) -> Option<usize> {
        self.points.iter().position(|p| p.local_id == local_id)
    }
}

impl<'a> IntoIterator for &'a PointLog {
    type Item = &'a Point;
    type IntoIter = std::slice::Iter<'a, Point>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use courtside_api::Side;

    fn at(second: u32, winner: Side) -> Point {
        Point::at(
            Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, second).unwrap(),
            winner,
            None,
            None,
        )
    }

    #[test]
    fn restore_reinserts_at_timestamp_position() {
        let (a, b, c) = (at(1, Side::Left), at(2, Side::Right), at(3, Side::Left));
        let mut log = PointLog::from_points(vec![a.clone(), b.clone(), c.clone()]);

        let removed = log.remove(b.local_id).unwrap();
        assert_eq!(log.points().len(), 2);

        assert!(log.restore(removed));
        let order: Vec<Uuid> = log.points().iter().map(|p| p.local_id).collect();
        assert_eq!(order, vec![a.local_id, b.local_id, c.local_id]);
    }

    #[test]
    fn restore_does_not_duplicate() {
        let a = at(1, Side::Left);
        let mut log = PointLog::from_points(vec![a.clone()]);
        assert!(!log.restore(a));
        assert_eq!(log.points().len(), 1);
    }

    #[test]
    fn remove_unknown_point_is_none() {
        let mut log = PointLog::from_points(vec![at(1, Side::Left)]);
        assert!(log.remove(Uuid::new_v4()).is_none());
        assert_eq!(log.points().len(), 1);
    }

    #[test]
    fn remove_by_id_ignores_unsaved_points() {
        let saved = at(1, Side::Left).with_id("4");
        let unsaved = at(2, Side::Right);
        let mut log = PointLog::from_points(vec![saved.clone(), unsaved.clone()]);
        assert!(log.remove_by_id("5").is_none());
        assert_eq!(log.remove_by_id("4").map(|p| p.local_id), Some(saved.local_id));
        assert_eq!(log.get(unsaved.local_id).map(|p| p.winner), Some(Side::Right));
    }

    #[test]
    fn acknowledge_sets_remote_id_in_place() {
        let (a, b) = (at(1, Side::Left), at(2, Side::Right));
        let mut log = PointLog::from_points(vec![a.clone(), b.clone()]);
        assert!(log.acknowledge(a.local_id, "11".into()));
        assert_eq!(log.points()[0].id.as_deref(), Some("11"));
        assert_eq!(log.points()[0].local_id, a.local_id);
        assert!(!log.acknowledge(Uuid::new_v4(), "12".into()));
    }

    #[test]
    fn seed_keeps_unacknowledged_local_points() {
        let local = at(5, Side::Right);
        let stale = at(2, Side::Left).with_id("1");
        let mut log = PointLog::from_points(vec![stale, local.clone()]);

        let remote = vec![at(1, Side::Left).with_id("1"), at(3, Side::Left).with_id("2")];
        log.seed(remote);

        assert_eq!(log.points().len(), 3);
        assert_eq!(log.points().last().map(|p| p.local_id), Some(local.local_id));
        assert_eq!(log.points()[0].id.as_deref(), Some("1"));
    }
}
