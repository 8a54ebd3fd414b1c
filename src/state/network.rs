use crate::state::messages::{SyncRequest, SyncResponse};
use courtside_api::client::ApiError;
use courtside_api::store::PointStore;
use log::{debug, error};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Runs remote calls off the owner loop. Each request becomes its own task,
/// so a slow call never holds up the ones behind it; completions may
/// therefore arrive in any order.
pub struct SyncWorker {
    store: Arc<dyn PointStore>,
    requests: mpsc::Receiver<SyncRequest>,
    responses: mpsc::Sender<SyncResponse>,
}

impl SyncWorker {
    pub fn new(
        store: Arc<dyn PointStore>,
        requests: mpsc::Receiver<SyncRequest>,
        responses: mpsc::Sender<SyncResponse>,
    ) -> Self {
        Self {
            store,
            requests,
            responses,
        }
    }

    pub async fn run(mut self) {
        while let Some(request) = self.requests.recv().await {
            debug!("sync request: {}", describe(&request));
            let store = Arc::clone(&self.store);
            let responses = self.responses.clone();
            tokio::spawn(async move {
                let response = execute(store.as_ref(), request).await;
                if let Err(e) = responses.send(response).await {
                    error!("Failed to send sync response: {e}");
                }
            });
        }
        debug!("sync request channel closed");
    }
}

/// Perform one request against the store. Errors are flattened to strings:
/// past this point they only drive reconciliation and logging.
pub async fn execute(store: &dyn PointStore, request: SyncRequest) -> SyncResponse {
    match request {
        SyncRequest::LoadPoints => {
            SyncResponse::PointsLoaded(store.fetch_todays_points().await.map_err(|e| e.to_string()))
        }
        SyncRequest::LoadRoster => {
            SyncResponse::RosterLoaded(store.fetch_player_roster().await.map_err(|e| e.to_string()))
        }
        SyncRequest::AppendPoint { point } => {
            let result = store.append_point(&point).await.map_err(|e| e.to_string());
            SyncResponse::PointAppended { point, result }
        }
        SyncRequest::DeleteLastPoint { removed } => {
            let result = store
                .delete_most_recent_point()
                .await
                .map_err(|e| e.to_string());
            SyncResponse::LastPointDeleted { removed, result }
        }
        SyncRequest::DeletePoint { point } => {
            let result = match point.id.as_deref() {
                Some(id) => store.delete_point(id).await.map_err(|e| e.to_string()),
                None => Err(ApiError::MissingId.to_string()),
            };
            SyncResponse::PointDeleted { point, result }
        }
        SyncRequest::DeleteAllForToday => SyncResponse::AllPointsDeleted {
            result: store
                .delete_all_points_for_today()
                .await
                .map_err(|e| e.to_string()),
        },
    }
}

fn describe(request: &SyncRequest) -> String {
    match request {
        SyncRequest::LoadPoints => "load points".to_string(),
        SyncRequest::LoadRoster => "load roster".to_string(),
        SyncRequest::AppendPoint { point } => format!("append {} point", point.winner),
        SyncRequest::DeleteLastPoint { .. } => "delete last point".to_string(),
        SyncRequest::DeletePoint { point } => format!("delete point {:?}", point.id),
        SyncRequest::DeleteAllForToday => "delete all of today's points".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::actions::{ActionService, SyncStatus};
    use async_trait::async_trait;
    use courtside_api::client::ApiResult;
    use courtside_api::store::MemoryStore;
    use courtside_api::{Player, Point, PointType, Side};
    use std::time::Duration;
    use uuid::Uuid;

    /// Run `request` and any follow-up calls it leads to.
    async fn sync(service: &mut ActionService, store: &MemoryStore, request: Option<SyncRequest>) {
        let mut request = request;
        while let Some(next) = request {
            let response = execute(store, next).await;
            request = service.handle_response(response);
        }
    }

    async fn score(service: &mut ActionService, store: &MemoryStore, side: Side) {
        service.request_adjustment(side, 1, None).unwrap();
        let request = service.select_point_type(PointType::Unspecified).unwrap();
        sync(service, store, request).await;
    }

    #[tokio::test]
    async fn appended_points_reach_the_store_with_ids() {
        let store = MemoryStore::new();
        let mut service = ActionService::new();
        sync(&mut service, &store, Some(SyncRequest::LoadPoints)).await;

        score(&mut service, &store, Side::Left).await;
        score(&mut service, &store, Side::Right).await;

        assert_eq!(store.points().len(), 2);
        assert!(service.points().iter().all(|p| p.id.is_some()));
        assert_eq!(service.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn store_outage_rolls_back_the_optimistic_append() {
        let store = MemoryStore::new();
        let mut service = ActionService::new();
        sync(&mut service, &store, Some(SyncRequest::LoadPoints)).await;
        score(&mut service, &store, Side::Left).await;
        let before = service.score();

        store.set_failing(true);
        score(&mut service, &store, Side::Right).await;

        assert_eq!(service.points().len(), 1);
        assert_eq!(service.score(), before);
        assert_eq!(service.status(), SyncStatus::Degraded);
    }

    #[tokio::test]
    async fn specific_delete_uses_the_acknowledged_id() {
        let store = MemoryStore::new();
        let mut service = ActionService::new();
        sync(&mut service, &store, Some(SyncRequest::LoadPoints)).await;
        score(&mut service, &store, Side::Left).await;
        score(&mut service, &store, Side::Left).await;

        let first = service.points()[0].local_id;
        let request = service.delete_specific_point(first);
        sync(&mut service, &store, request).await;

        assert_eq!(service.points().len(), 1);
        assert_eq!(store.points().len(), 1);
    }

    #[tokio::test]
    async fn deleting_an_unacknowledged_point_waits_for_its_id() {
        let store = MemoryStore::new();
        let mut service = ActionService::new();
        sync(&mut service, &store, Some(SyncRequest::LoadPoints)).await;

        // Stage and commit without letting the append complete.
        service.request_adjustment(Side::Right, 1, None).unwrap();
        let pending_append = service.select_point_type(PointType::Error).unwrap();
        let local_id = service.points()[0].local_id;

        assert!(service.delete_specific_point(local_id).is_none());
        assert!(service.points().is_empty());

        sync(&mut service, &store, pending_append).await;
        assert!(store.points().is_empty());
        assert_eq!(service.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn reset_survives_a_failed_remote_cleanup() {
        let store = MemoryStore::new();
        let mut service = ActionService::new();
        sync(&mut service, &store, Some(SyncRequest::LoadPoints)).await;
        score(&mut service, &store, Side::Left).await;

        store.set_failing(true);
        let request = service.reset_all();
        sync(&mut service, &store, Some(request)).await;

        assert!(service.points().is_empty());
        assert_eq!(store.points().len(), 1, "remote still holds the point");
    }

    #[tokio::test]
    async fn worker_answers_every_request() {
        let store = Arc::new(MemoryStore::with_players(vec![Player {
            id: 1,
            first_name: "Ana".into(),
            ..Default::default()
        }]));
        let (req_tx, req_rx) = mpsc::channel(8);
        let (resp_tx, mut resp_rx) = mpsc::channel(8);
        let worker = tokio::spawn(SyncWorker::new(store, req_rx, resp_tx).run());

        req_tx.send(SyncRequest::LoadRoster).await.unwrap();
        req_tx.send(SyncRequest::LoadPoints).await.unwrap();

        let mut roster_loaded = false;
        let mut points_loaded = false;
        for _ in 0..2 {
            let response = tokio::time::timeout(Duration::from_secs(2), resp_rx.recv())
                .await
                .expect("worker should respond")
                .expect("channel open");
            match response {
                SyncResponse::RosterLoaded(Ok(players)) => {
                    roster_loaded = players.len() == 1;
                }
                SyncResponse::PointsLoaded(Ok(points)) => points_loaded = points.is_empty(),
                other => panic!("unexpected response {other:?}"),
            }
        }
        assert!(roster_loaded && points_loaded);

        drop(req_tx);
        worker.await.unwrap();
    }

    /// Delays every append so that later requests overtake it.
    struct SlowAppendStore {
        inner: Arc<MemoryStore>,
        delay: Duration,
    }

    #[async_trait]
    impl PointStore for SlowAppendStore {
        async fn fetch_todays_points(&self) -> ApiResult<Vec<Point>> {
            self.inner.fetch_todays_points().await
        }

        async fn append_point(&self, point: &Point) -> ApiResult<Option<String>> {
            tokio::time::sleep(self.delay).await;
            self.inner.append_point(point).await
        }

        async fn delete_most_recent_point(&self) -> ApiResult<Option<Point>> {
            self.inner.delete_most_recent_point().await
        }

        async fn delete_point(&self, id: &str) -> ApiResult<()> {
            self.inner.delete_point(id).await
        }

        async fn delete_all_points_for_today(&self) -> ApiResult<()> {
            self.inner.delete_all_points_for_today().await
        }

        async fn fetch_player_roster(&self) -> ApiResult<Vec<Player>> {
            self.inner.fetch_player_roster().await
        }
    }

    /// A service wired to a real `SyncWorker`, the way `main` runs it.
    struct Harness {
        service: ActionService,
        store: Arc<MemoryStore>,
        requests: mpsc::Sender<SyncRequest>,
        responses: mpsc::Receiver<SyncResponse>,
        outstanding: usize,
    }

    impl Harness {
        async fn start() -> Self {
            let store = Arc::new(MemoryStore::new());
            let slow = Arc::new(SlowAppendStore {
                inner: Arc::clone(&store),
                delay: Duration::from_millis(50),
            });
            let (requests, req_rx) = mpsc::channel(16);
            let (resp_tx, responses) = mpsc::channel(16);
            tokio::spawn(SyncWorker::new(slow, req_rx, resp_tx).run());

            let mut harness = Self {
                service: ActionService::new(),
                store,
                requests,
                responses,
                outstanding: 0,
            };
            harness.send(Some(SyncRequest::LoadPoints)).await;
            harness.settle().await;
            harness
        }

        async fn send(&mut self, request: Option<SyncRequest>) {
            if let Some(request) = request {
                self.requests.send(request).await.unwrap();
                self.outstanding += 1;
            }
        }

        async fn score(&mut self, side: Side) {
            self.service.request_adjustment(side, 1, None).unwrap();
            let request = self.service.select_point_type(PointType::Error).unwrap();
            self.send(request).await;
        }

        /// Feed responses back in arrival order until nothing is outstanding.
        async fn settle(&mut self) {
            while self.outstanding > 0 {
                let response = tokio::time::timeout(Duration::from_secs(2), self.responses.recv())
                    .await
                    .expect("worker should respond")
                    .expect("channel open");
                self.outstanding -= 1;
                let follow_up = self.service.handle_response(response);
                self.send(follow_up).await;
            }
        }

        fn assert_converged(&self) {
            let local: Vec<(Uuid, Option<String>)> = self
                .service
                .points()
                .iter()
                .map(|p| (p.local_id, p.id.clone()))
                .collect();
            let mut remote = self.store.points();
            remote.sort_by_key(|p| p.created_at);
            let remote: Vec<(Uuid, Option<String>)> =
                remote.into_iter().map(|p| (p.local_id, p.id)).collect();
            assert_eq!(local, remote);
        }
    }

    #[tokio::test]
    async fn undo_racing_a_slow_append_deletes_the_right_point() {
        let mut h = Harness::start().await;
        h.score(Side::Left).await;
        h.settle().await;

        h.score(Side::Right).await;
        let request = h.service.undo_last_action();
        h.send(request).await;
        h.settle().await;

        h.assert_converged();
        assert_eq!(h.store.points().len(), 1);
        assert_eq!(h.store.points()[0].winner, Side::Left);
        assert_eq!(h.service.status(), SyncStatus::Synced);
    }

    #[tokio::test]
    async fn delete_overtaking_a_slow_append_keeps_both_sides_equal() {
        let mut h = Harness::start().await;
        h.score(Side::Left).await;
        h.score(Side::Right).await;
        h.settle().await;

        h.score(Side::Left).await;
        let oldest = h.service.points()[0].local_id;
        let request = h.service.delete_specific_point(oldest);
        h.send(request).await;
        let request = h.service.request_adjustment(Side::Right, -1, None).unwrap();
        h.send(request).await;
        h.settle().await;

        h.assert_converged();
        assert_eq!(h.service.points().len(), 1);
        assert_eq!(h.service.points()[0].winner, Side::Right);
        assert_eq!(h.service.status(), SyncStatus::Synced);
    }
}
