use courtside_api::{Player, Point};

/// Remote work issued by the session after it has already updated local state.
#[derive(Debug, Clone)]
pub enum SyncRequest {
    LoadPoints,
    LoadRoster,
    AppendPoint { point: Point },
    /// `removed` is the local point dropped optimistically; it is restored if
    /// the server cannot delete its newest point.
    DeleteLastPoint { removed: Point },
    DeletePoint { point: Point },
    DeleteAllForToday,
}

/// Completion of a `SyncRequest`, marshalled back to the owner loop.
/// Each variant carries enough of its request to locate the point
/// it concerns without relying on log positions.
#[derive(Debug)]
pub enum SyncResponse {
    PointsLoaded(Result<Vec<Point>, String>),
    RosterLoaded(Result<Vec<Player>, String>),
    PointAppended {
        point: Point,
        result: Result<Option<String>, String>,
    },
    LastPointDeleted {
        removed: Point,
        result: Result<Option<Point>, String>,
    },
    PointDeleted {
        point: Point,
        result: Result<(), String>,
    },
    AllPointsDeleted {
        result: Result<(), String>,
    },
}

/// Everything the owner loop reacts to besides sync completions.
#[derive(Debug, Clone)]
pub enum UiEvent {
    AppStarted,
    /// One line typed on the console.
    Input(String),
    InputClosed,
    RosterTick,
}
