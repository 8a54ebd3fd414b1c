use crate::state::messages::UiEvent;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};

/// Nudges the owner loop once per roster freshness window. The owner decides
/// whether a fetch is actually due, so ticks during a load are harmless.
pub struct RosterRefresher {
    ui_events: mpsc::Sender<UiEvent>,
    period: Duration,
}

impl RosterRefresher {
    pub fn new(ui_events: mpsc::Sender<UiEvent>, period: Duration) -> Self {
        Self { ui_events, period }
    }

    pub async fn run(self) {
        // A zero period would make tokio's interval panic.
        let mut ticks = interval(self.period.max(Duration::from_secs(1)));
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the immediate first tick; startup already requests the roster.
        ticks.tick().await;

        loop {
            ticks.tick().await;
            if self.ui_events.send(UiEvent::RosterTick).await.is_err() {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_and_stops_when_owner_is_gone() {
        let (tx, mut rx) = mpsc::channel(4);
        let task = tokio::spawn(RosterRefresher::new(tx, Duration::from_secs(300)).run());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(rx.try_recv().is_err());

        let event = rx.recv().await;
        assert!(matches!(event, Some(UiEvent::RosterTick)));

        drop(rx);
        task.await.unwrap();
    }
}
