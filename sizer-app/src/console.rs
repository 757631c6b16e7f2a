//! Terminal front end.
//!
//! One command per line. The session loop is generic over its reader and
//! writer; the binary plugs in stdin and stdout.

use std::fmt::Write as _;
use std::future::ready;
use std::io;
use std::str::FromStr;
use std::time::Duration;

use sizer_domain::{format_display, registry, FieldId};
use sizer_engine::{DerivedNode, DerivedSnapshot};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::app::App;
use crate::debounce::spawn_debounced;
use crate::error::{AppError, AppResult};

/// Usage text printed by `help`
pub const HELP: &str = "\
Commands:
  show                 Print derived values
  json                 Print derived values as JSON
  fields               Print field values and locks
  set <field> <value>  Write a field (omit value to clear it)
  lock <field>         Toggle a field's lock
  reset                Reset every unlocked field to its default
  help                 Print this help
  quit                 Flush pending writes and exit";

// =============================================================================
// Commands
// =============================================================================

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Show,
    Json,
    Fields,
    Set { field: FieldId, value: String },
    Lock(FieldId),
    Reset,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = AppError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim_start();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));

        let command = match verb.to_lowercase().as_str() {
            "show" => Command::Show,
            "json" => Command::Json,
            "fields" => Command::Fields,
            "reset" => Command::Reset,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "set" => {
                // The value is stored verbatim, inner whitespace included
                let rest = rest.trim_start();
                let (name, value) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                if name.is_empty() {
                    return Err(AppError::Command("usage: set <field> <value>".to_string()));
                }
                Command::Set {
                    field: FieldId::from_name(name)?,
                    value: value.to_string(),
                }
            },
            "lock" => {
                let name = rest.trim();
                if name.is_empty() {
                    return Err(AppError::Command("usage: lock <field>".to_string()));
                }
                Command::Lock(FieldId::from_name(name)?)
            },
            "" => return Err(AppError::Command("empty input".to_string())),
            other => return Err(AppError::Command(format!("unknown command '{}'", other))),
        };

        Ok(command)
    }
}

/// Run a command against the app and return the text to print.
///
/// `Quit` is handled by the caller; here it only yields a farewell.
pub fn execute(app: &App, command: &Command) -> AppResult<String> {
    debug!(?command, "Executing command");

    match command {
        Command::Show => Ok(render_derived(&app.derived())),
        Command::Json => serde_json::to_string_pretty(&app.derived())
            .map_err(|e| AppError::Serialization(e.to_string())),
        Command::Fields => Ok(render_fields(app)),
        Command::Set { field, value } => {
            app.fields().write(*field, value.as_str());
            Ok(format!("{} = {}", field, value))
        },
        Command::Lock(field) => {
            let locked = app.locks().toggle(*field)?;
            Ok(format!("{} {}", field, if locked { "locked" } else { "unlocked" }))
        },
        Command::Reset => {
            let reset = app.reset_all();
            Ok(format!("{} field(s) reset", reset.len()))
        },
        Command::Help => Ok(HELP.to_string()),
        Command::Quit => Ok("bye".to_string()),
    }
}

// =============================================================================
// Session
// =============================================================================

/// Quiet period before settled derived values are rendered
pub const RENDER_QUIET: Duration = Duration::from_millis(50);

/// Read commands from `input` until end of input, `quit` or a read error,
/// writing each reply to `out`.
///
/// Lines are decoded lossily, so malformed bytes show up as an unknown
/// command instead of ending the session. The caller still owns the app and
/// must shut it down afterwards to flush pending writes.
pub async fn run_session<R, W>(app: &App, mut input: R, out: &mut W)
where
    R: AsyncBufRead + Unpin,
    W: io::Write,
{
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match input.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {},
            Err(e) => {
                warn!(error = %e, "Failed to read input, ending session");
                break;
            },
        }

        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(|c: char| c == '\n' || c == '\r');
        if line.trim().is_empty() {
            continue;
        }

        let reply = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(command) => execute(app, &command),
            Err(e) => Err(e),
        };
        let _ = match reply {
            Ok(text) => writeln!(out, "{}", text),
            Err(e) => writeln!(out, "error: {}", e),
        };
    }

    debug!("Console session ended");
}

/// Render the derived values once they stop changing for `quiet`.
///
/// A burst of propagations (a reset touches most fields) yields one
/// rendering of the final state. The task ends when the app shuts down.
pub fn spawn_renderer<F>(app: &App, quiet: Duration, mut emit: F) -> JoinHandle<()>
where
    F: FnMut(String) + Send + 'static,
{
    spawn_debounced(app.subscribe_derived(), quiet, move |snapshot: DerivedSnapshot| {
        emit(render_derived(&snapshot));
        ready(())
    })
}

// =============================================================================
// Rendering
// =============================================================================

/// Render a snapshot: trend headline, then one labelled line per number.
pub fn render_derived(snapshot: &DerivedSnapshot) -> String {
    let mut out = String::new();

    match snapshot.get(DerivedNode::Trend).as_trend() {
        Some(trend) => {
            let _ = writeln!(out, "You are {}!", trend);
        },
        None => {
            let _ = writeln!(out, "Trend: -");
        },
    }

    for (node, value) in snapshot.iter() {
        if node == DerivedNode::Trend {
            continue;
        }
        let _ = writeln!(out, "  {:<28} {}", node.title(), format_display(&value));
    }

    out.trim_end().to_string()
}

/// Render every field with its raw value and lock marker.
pub fn render_fields(app: &App) -> String {
    let mut out = String::new();

    for spec in registry() {
        let marker = match app.locks().read(spec.id) {
            Ok(true) => "[locked]",
            Ok(false) => "[      ]",
            Err(_) => "",
        };
        let required = if spec.required { "*" } else { " " };
        let _ = writeln!(
            out,
            "{}{:<16} {:<22} {:<12} {}",
            required,
            spec.name,
            spec.title,
            app.fields().read(spec.id).as_str(),
            marker
        );
    }

    out.trim_end().to_string()
}

// =============================================================================
// Tests
// =============================================================================
