mod app;
mod commands;
mod score;
mod state;

use crate::app::App;
use crate::state::app_settings::AppSettings;
use crate::state::messages::{SyncRequest, SyncResponse, UiEvent};
use crate::state::network::SyncWorker;
use crate::state::refresher::RosterRefresher;
use courtside_api::client::SupabaseApi;
use courtside_api::store::{MemoryStore, PointStore};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if handle_cli_args() {
        return Ok(());
    }

    better_panic::install();

    let settings = AppSettings::load();
    init_logger(&settings);

    let store: Arc<dyn PointStore> = match &settings.remote {
        Some(remote) => {
            info!("syncing points with {}", remote.url);
            Arc::new(SupabaseApi::new(&remote.url, &remote.api_key))
        }
        None => {
            warn!("COURTSIDE_SUPABASE_URL is not set; points are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let (ui_event_tx, ui_event_rx) = mpsc::channel::<UiEvent>(100);
    let (sync_req_tx, sync_req_rx) = mpsc::channel::<SyncRequest>(100);
    let (sync_resp_tx, sync_resp_rx) = mpsc::channel::<SyncResponse>(100);

    // Console input
    let input_task = tokio::spawn(input_handler_task(ui_event_tx.clone()));

    // Remote calls
    let sync_worker = SyncWorker::new(store, sync_req_rx, sync_resp_tx);
    let sync_task = tokio::spawn(sync_worker.run());

    // Roster freshness tick
    let refresher = RosterRefresher::new(ui_event_tx.clone(), settings.roster_ttl);
    let refresh_task = tokio::spawn(refresher.run());

    let _ = ui_event_tx.send(UiEvent::AppStarted).await;

    let app = App::new(settings);
    main_loop(app, ui_event_rx, sync_req_tx, sync_resp_rx).await;

    input_task.abort();
    refresh_task.abort();
    sync_task.abort();

    Ok(())
}

fn init_logger(settings: &AppSettings) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(filter) = &settings.log_filter {
        builder.parse_filters(filter);
    }
    builder.init();
}

fn handle_cli_args() -> bool {
    let mut args = std::env::args().skip(1);
    let Some(arg) = args.next() else {
        return false;
    };

    match arg.as_str() {
        "-h" | "--help" => {
            println!("{}", usage_text());
            true
        }
        "-V" | "--version" => {
            println!("courtside {}", env!("CARGO_PKG_VERSION"));
            true
        }
        _ => {
            eprintln!("Unknown argument: {arg}\n\n{}", usage_text());
            std::process::exit(2);
        }
    }
}

fn usage_text() -> &'static str {
    "courtside - volleyball score tracking console

Usage:
  courtside
  courtside --help
  courtside --version

Type `help` at the prompt for the list of commands.

Environment:
  COURTSIDE_SUPABASE_URL      PostgREST base URL (unset: keep points in memory)
  COURTSIDE_SUPABASE_KEY      API key sent with every request
  COURTSIDE_LOG               Log filter, e.g. debug (default info, or RUST_LOG)
  COURTSIDE_ROSTER_TTL_SECS   Seconds before the player roster is refetched (default 300)"
}

async fn main_loop(
    mut app: App,
    mut ui_events: mpsc::Receiver<UiEvent>,
    sync_requests: mpsc::Sender<SyncRequest>,
    mut sync_responses: mpsc::Receiver<SyncResponse>,
) {
    loop {
        tokio::select! {
            Some(ui_event) = ui_events.recv() => {
                if !handle_ui_event(ui_event, &mut app, &sync_requests).await {
                    break;
                }
            }

            Some(response) = sync_responses.recv() => {
                let outcome = app.on_sync_response(response);
                if outcome.changed {
                    println!("{}", app.status_line());
                }
                send_all(&sync_requests, [outcome.follow_up]).await;
            }

            else => break,
        }
    }
}

/// Returns false once the session should end.
async fn handle_ui_event(
    ui_event: UiEvent,
    app: &mut App,
    sync_requests: &mpsc::Sender<SyncRequest>,
) -> bool {
    match ui_event {
        UiEvent::AppStarted => {
            send_all(sync_requests, [Some(SyncRequest::LoadPoints)]).await;
            send_all(sync_requests, [app.roster_refresh(Instant::now())]).await;
            println!("{}", app.status_line());
            true
        }
        UiEvent::Input(line) => {
            let outcome = commands::handle_input(app, &line);
            for line in &outcome.output {
                println!("{line}");
            }
            send_all(sync_requests, outcome.requests.into_iter().map(Some)).await;
            !outcome.quit
        }
        UiEvent::InputClosed => {
            info!("console closed");
            false
        }
        UiEvent::RosterTick => {
            send_all(sync_requests, [app.roster_refresh(Instant::now())]).await;
            true
        }
    }
}

async fn send_all(
    sync_requests: &mpsc::Sender<SyncRequest>,
    requests: impl IntoIterator<Item = Option<SyncRequest>>,
) {
    for request in requests.into_iter().flatten() {
        if let Err(e) = sync_requests.send(request).await {
            error!("Failed to queue sync request: {e}");
        }
    }
}

async fn input_handler_task(ui_events: mpsc::Sender<UiEvent>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let event = match lines.next_line().await {
            Ok(Some(line)) => UiEvent::Input(line),
            Ok(None) => UiEvent::InputClosed,
            Err(e) => {
                error!("Failed to read console input: {e}");
                UiEvent::InputClosed
            }
        };
        let closed = matches!(event, UiEvent::InputClosed);
        if ui_events.send(event).await.is_err() || closed {
            break;
        }
    }
}
