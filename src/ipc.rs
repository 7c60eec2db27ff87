use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::catalog::SearchResult;
use crate::window_manager::WindowId;

/// Requests sent from the view to the session, one per line.
///
/// Workspaces are 1-based here, as shown to the user.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewRequest {
    /// Focus a window and end the session
    WindowClicked(WindowId),
    /// Close a window, keep the overview open
    WindowClickedMidbutton(WindowId),
    IsMidbuttonEnabled,
    /// Launch an application by entry name and end the session
    AppClicked(String),
    /// Dismiss the overview
    BackgroundClicked,
    Search(String),
    BackgroundOverlayColor,
    Background,
    DockItems,
    Windows(usize),
    Workspaces,
    /// Switch workspace and refresh the overview
    WorkspaceClicked(usize),
    /// Move a window onto a workspace
    DroppedOnWorkspace { workspace: usize, window: WindowId },
    CurrentWorkspace,
    IsWorkspacesEnabled,
    IsDockEnabled,
}

/// Response from the session to the view, serialized as one JSON line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewResponse {
    /// Action performed
    Ok,
    /// Error occurred
    Error(String),
    Flag(bool),
    Text(String),
    Color([f64; 4]),
    Apps(Vec<SearchResult>),
    Windows(Vec<WindowTile>),
    Workspaces(Vec<String>),
}

/// One window as drawn in the overview grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowTile {
    pub name: String,
    pub screenshot: PathBuf,
    pub id: WindowId,
}

/// Directory holding the session socket, pidfile and screenshots
pub fn runtime_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("qoverview")
}

/// Create the runtime directory if needed
pub fn ensure_runtime_dir() -> Result<PathBuf> {
    let dir = runtime_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create runtime directory {}", dir.display()))?;
    Ok(dir)
}

/// Get the path to the Unix socket
pub fn get_socket_path() -> PathBuf {
    runtime_dir().join("sock")
}

/// Get the path to the pidfile
pub fn get_pidfile_path() -> PathBuf {
    runtime_dir().join("server.pid")
}

/// Error returned when parsing an invalid request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseViewRequestError(String);

impl fmt::Display for ParseViewRequestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid request: {}", self.0)
    }
}

impl std::error::Error for ParseViewRequestError {}

fn parse_arg<T: FromStr>(verb: &str, arg: Option<&str>) -> Result<T, ParseViewRequestError> {
    let arg = arg
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ParseViewRequestError(format!("{} needs an argument", verb)))?;
    arg.parse()
        .map_err(|_| ParseViewRequestError(format!("bad argument for {}: {}", verb, arg)))
}

fn parse_workspace(verb: &str, arg: Option<&str>) -> Result<usize, ParseViewRequestError> {
    let workspace: usize = parse_arg(verb, arg)?;
    if workspace == 0 {
        return Err(ParseViewRequestError(format!(
            "{}: workspaces are numbered from 1",
            verb
        )));
    }
    Ok(workspace)
}

impl FromStr for ViewRequest {
    type Err = ParseViewRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(['\r', '\n']).trim_start();
        let (verb, rest) = match line.split_once(' ') {
            Some((verb, rest)) => (verb, Some(rest)),
            None => (line, None),
        };
        let verb = verb.to_lowercase();

        match verb.as_str() {
            "window-clicked" => Ok(ViewRequest::WindowClicked(parse_arg(&verb, rest)?)),
            "window-clicked-midbutton" => {
                Ok(ViewRequest::WindowClickedMidbutton(parse_arg(&verb, rest)?))
            }
            "is-midbutton-enabled" => Ok(ViewRequest::IsMidbuttonEnabled),
            "app-clicked" => Ok(ViewRequest::AppClicked(parse_arg(&verb, rest)?)),
            "background-clicked" => Ok(ViewRequest::BackgroundClicked),
            // Everything after the verb is the query, spaces included
            "search" => Ok(ViewRequest::Search(rest.unwrap_or_default().to_string())),
            "background-overlay-color" => Ok(ViewRequest::BackgroundOverlayColor),
            "background" => Ok(ViewRequest::Background),
            "dock-items" => Ok(ViewRequest::DockItems),
            "windows" => Ok(ViewRequest::Windows(parse_workspace(&verb, rest)?)),
            "workspaces" => Ok(ViewRequest::Workspaces),
            "workspace-clicked" => Ok(ViewRequest::WorkspaceClicked(parse_workspace(&verb, rest)?)),
            "dropped-on-workspace" => {
                let mut args = rest.unwrap_or_default().split_whitespace();
                let workspace = parse_workspace(&verb, args.next())?;
                let window = parse_arg(&verb, args.next())?;
                Ok(ViewRequest::DroppedOnWorkspace { workspace, window })
            }
            "current-workspace" => Ok(ViewRequest::CurrentWorkspace),
            "is-workspaces-enabled" => Ok(ViewRequest::IsWorkspacesEnabled),
            "is-dock-enabled" => Ok(ViewRequest::IsDockEnabled),
            "" => Err(ParseViewRequestError("empty request".to_string())),
            other => Err(ParseViewRequestError(format!("unknown verb {}", other))),
        }
    }
}

impl fmt::Display for ViewRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewRequest::WindowClicked(id) => write!(f, "window-clicked {}", id),
            ViewRequest::WindowClickedMidbutton(id) => write!(f, "window-clicked-midbutton {}", id),
            ViewRequest::IsMidbuttonEnabled => write!(f, "is-midbutton-enabled"),
            ViewRequest::AppClicked(entry) => write!(f, "app-clicked {}", entry),
            ViewRequest::BackgroundClicked => write!(f, "background-clicked"),
            ViewRequest::Search(query) => write!(f, "search {}", query),
            ViewRequest::BackgroundOverlayColor => write!(f, "background-overlay-color"),
            ViewRequest::Background => write!(f, "background"),
            ViewRequest::DockItems => write!(f, "dock-items"),
            ViewRequest::Windows(ws) => write!(f, "windows {}", ws),
            ViewRequest::Workspaces => write!(f, "workspaces"),
            ViewRequest::WorkspaceClicked(ws) => write!(f, "workspace-clicked {}", ws),
            ViewRequest::DroppedOnWorkspace { workspace, window } => {
                write!(f, "dropped-on-workspace {} {}", workspace, window)
            }
            ViewRequest::CurrentWorkspace => write!(f, "current-workspace"),
            ViewRequest::IsWorkspacesEnabled => write!(f, "is-workspaces-enabled"),
            ViewRequest::IsDockEnabled => write!(f, "is-dock-enabled"),
        }
    }
}
