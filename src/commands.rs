use crate::app::App;
use crate::state::messages::SyncRequest;
use courtside_api::{PointType, Side};
use log::{debug, warn};
use std::fmt;
use std::time::Instant;

/// What a free-form transcript asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceCommand {
    Left,
    Right,
    Cancel,
}

/// Map a transcript to a command. Whole words win over fragments; "no" is
/// a frequent mishearing of "left" and counts as one.
pub fn detect_command(transcript: &str) -> Option<VoiceCommand> {
    let transcript = transcript.to_lowercase();
    let exact = transcript
        .split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()))
        .find_map(|word| match word {
            "left" | "no" => Some(VoiceCommand::Left),
            "right" => Some(VoiceCommand::Right),
            "cancel" | "undo" => Some(VoiceCommand::Cancel),
            _ => None,
        });
    if exact.is_some() {
        return exact;
    }

    if transcript.contains("left") {
        Some(VoiceCommand::Left)
    } else if transcript.contains("right") {
        Some(VoiceCommand::Right)
    } else if transcript.contains("cancel") || transcript.contains("undo") {
        Some(VoiceCommand::Cancel)
    } else if transcript.contains("no") {
        Some(VoiceCommand::Left)
    } else {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Adjust { side: Side, delta: i32 },
    PointType(PointType),
    Player(i64),
    Skip,
    Back,
    Cancel,
    Undo,
    /// 1-based position in the history listing, newest first.
    Delete(usize),
    Reset,
    History,
    Roster,
    ReloadRoster,
    Assign {
        side: Side,
        position: usize,
        player_id: Option<i64>,
    },
    Score,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    Unknown(String),
    Usage(&'static str),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Unknown(input) => {
                write!(f, "unrecognised command {input:?}; type `help` for the list")
            }
            CommandError::Usage(usage) => write!(f, "usage: {usage}"),
        }
    }
}

impl std::error::Error for CommandError {}

pub const HELP: &str = "Commands:
  left | right                 score a point for that side
  minus <side>                 remove the newest point
  type <ace|attack|block|error|other>
  player <id> | skip | back    credit a player, skip crediting, or re-pick the type
  cancel                       drop the point being attributed
  undo                         revert the last action
  delete <n>                   delete entry n of the history listing
  reset                        clear today's points
  history | roster | score
  roster reload                fetch the player list again
  assign <side> <pos> <id|->   place a player on court (positions 1-7)
  quit
Anything else is treated as a transcript (\"left\", \"right\", \"undo\").";

/// Parse one console line. Blank lines yield `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let args: Vec<&str> = words.collect();

    let command = match (head.to_ascii_lowercase().as_str(), args.as_slice()) {
        ("left" | "l", []) => Command::Adjust {
            side: Side::Left,
            delta: 1,
        },
        ("right" | "r", []) => Command::Adjust {
            side: Side::Right,
            delta: 1,
        },
        ("minus" | "-", [side]) => Command::Adjust {
            side: Side::parse(side).ok_or(CommandError::Usage("minus <left|right>"))?,
            delta: -1,
        },
        ("type" | "t", [kind]) => Command::PointType(
            PointType::parse(kind).ok_or(CommandError::Usage("type <ace|attack|block|error|other>"))?,
        ),
        ("player" | "p", [id]) => {
            Command::Player(id.parse().map_err(|_| CommandError::Usage("player <id>"))?)
        }
        ("skip", []) => Command::Skip,
        ("back", []) => Command::Back,
        ("cancel", []) => Command::Cancel,
        ("undo", []) => Command::Undo,
        ("delete", [n]) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Command::Delete(n),
            _ => return Err(CommandError::Usage("delete <n>, n as shown by `history`")),
        },
        ("reset", []) => Command::Reset,
        ("history" | "h", []) => Command::History,
        ("roster", []) => Command::Roster,
        ("roster", ["reload"]) => Command::ReloadRoster,
        ("assign", [side, position, player]) => {
            const USAGE: &str = "assign <left|right> <1-7> <player id|->";
            let side = Side::parse(side).ok_or(CommandError::Usage(USAGE))?;
            let position = position.parse().map_err(|_| CommandError::Usage(USAGE))?;
            let player_id = match *player {
                "-" => None,
                id => Some(id.parse().map_err(|_| CommandError::Usage(USAGE))?),
            };
            Command::Assign {
                side,
                position,
                player_id,
            }
        }
        ("score" | "s", []) => Command::Score,
        ("help" | "?", []) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        (word, []) => match PointType::parse(word) {
            Some(point_type) => Command::PointType(point_type),
            None => transcript_command(line)?,
        },
        _ => transcript_command(line)?,
    };
    Ok(Some(command))
}

fn transcript_command(line: &str) -> Result<Command, CommandError> {
    match detect_command(line) {
        Some(VoiceCommand::Left) => Ok(Command::Adjust {
            side: Side::Left,
            delta: 1,
        }),
        Some(VoiceCommand::Right) => Ok(Command::Adjust {
            side: Side::Right,
            delta: 1,
        }),
        Some(VoiceCommand::Cancel) => Ok(Command::Undo),
        None => Err(CommandError::Unknown(line.to_string())),
    }
}

/// Result of one command: remote work to issue and lines to show.
#[derive(Debug, Default)]
pub struct CommandOutcome {
    pub requests: Vec<SyncRequest>,
    pub output: Vec<String>,
    pub quit: bool,
}

impl CommandOutcome {
    fn say(mut self, line: impl Into<String>) -> Self {
        self.output.push(line.into());
        self
    }

    fn request(mut self, request: Option<SyncRequest>) -> Self {
        self.requests.extend(request);
        self
    }
}

pub fn handle_command(app: &mut App, command: Command) -> CommandOutcome {
    debug!("command: {command:?}");
    let outcome = CommandOutcome::default();

    match command {
        Command::Adjust { side, delta } => {
            match app.session.request_adjustment(side, delta, None) {
                Ok(request) => outcome.request(request).say(app.status_line()),
                Err(e) => outcome.say(e.to_string()),
            }
        }
        Command::PointType(point_type) => match app.session.select_point_type(point_type) {
            Ok(request) => outcome.request(request).say(app.status_line()),
            Err(e) => outcome.say(e.to_string()),
        },
        Command::Player(id) => {
            if app.roster.is_loaded() && app.roster.find(id).is_none() {
                warn!("player {id} is not on the roster");
            }
            match app.session.select_player(Some(id)) {
                Ok(request) => outcome.request(Some(request)).say(app.status_line()),
                Err(e) => outcome.say(e.to_string()),
            }
        }
        Command::Skip => match app.session.select_player(None) {
            Ok(request) => outcome.request(Some(request)).say(app.status_line()),
            Err(e) => outcome.say(e.to_string()),
        },
        Command::Back => match app.session.back_to_point_type() {
            Ok(()) => outcome.say(app.status_line()),
            Err(e) => outcome.say(e.to_string()),
        },
        Command::Cancel => match app.session.cancel_adjustment() {
            Some(pending) => outcome.say(format!("Discarded {} point", pending.side.team_name())),
            None => outcome.say("Nothing to cancel"),
        },
        Command::Undo => {
            let Some(action) = app.session.last_action() else {
                return outcome.say("Nothing to undo");
            };
            let request = app.session.undo_last_action();
            let verb = if action.was_increment { "Removed" } else { "Restored" };
            outcome
                .request(request)
                .say(format!("{verb} {} point", action.side.team_name()))
                .say(app.status_line())
        }
        Command::Delete(n) => {
            let Some(local_id) = app.history_entry(n) else {
                return outcome.say(format!("No history entry {n}"));
            };
            let request = app.session.delete_specific_point(local_id);
            outcome.request(request).say(app.status_line())
        }
        Command::Reset => {
            let request = app.session.reset_all();
            outcome.request(Some(request)).say(app.status_line())
        }
        Command::History => outcome.say(app.history()),
        Command::Roster => outcome.say(app.roster_listing()),
        Command::ReloadRoster => {
            app.roster.invalidate();
            match app.roster_refresh(Instant::now()) {
                Some(request) => outcome.request(Some(request)).say("Reloading roster"),
                None => outcome.say("Roster is already loading"),
            }
        }
        Command::Assign {
            side,
            position,
            player_id,
        } => {
            if app.lineup.assign(side, position, player_id) {
                outcome.say(app.roster_listing())
            } else {
                outcome.say("Court positions run from 1 to 7")
            }
        }
        Command::Score => outcome.say(app.status_line()),
        Command::Help => outcome.say(HELP),
        Command::Quit => CommandOutcome {
            quit: true,
            ..outcome
        },
    }
}

/// Parse and run one console line.
pub fn handle_input(app: &mut App, line: &str) -> CommandOutcome {
    match parse_command(line) {
        Ok(Some(command)) => handle_command(app, command),
        Ok(None) => CommandOutcome::default(),
        Err(e) => CommandOutcome::default().say(e.to_string()),
    }
}
