//! Binds view requests to the config daemon and the window manager.
//!
//! Each overview is a short-lived session: any action that leaves the
//! overview (activating a window, launching an app, dismissing) ends it.
//! Switching workspace asks the caller to refresh instead.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::catalog::{self, AppCatalog, SearchResult};
use crate::config::Options;
use crate::config_client::ConfigClient;
use crate::ipc::{ViewRequest, ViewResponse, WindowTile};
use crate::window_manager::{WindowAdapter, WindowId};

/// Window titles belonging to the overview itself or the desktop shell
const HIDDEN_WINDOW_TITLES: &[&str] = &["qoverview", "Desktop — Plasma"];

/// What the caller should do after a request has been handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Keep serving the view
    Continue,
    /// The user left the overview
    Exit,
    /// Workspace changed; rebuild state before serving again
    Refresh,
}

pub struct Session<C: ConfigClient, W: WindowAdapter> {
    config: C,
    wm: W,
    options: Options,
    catalog: AppCatalog,
}

impl<C: ConfigClient, W: WindowAdapter> Session<C, W> {
    /// Load options and the application catalog from the config daemon
    pub fn new(config: C, wm: W) -> Result<Self> {
        let options = Options::from_json(&config.get_config()?);
        let catalog = AppCatalog::from_json(&config.get_apps_list()?)?;
        info!("Session ready with {} applications", catalog.len());

        Ok(Session {
            config,
            wm,
            options,
            catalog,
        })
    }

    /// Reload options and the catalog in place
    pub fn refresh(&mut self) -> Result<()> {
        self.options = Options::from_json(&self.config.get_config()?);
        self.catalog = AppCatalog::from_json(&self.config.get_apps_list()?)?;
        debug!("Session refreshed ({} applications)", self.catalog.len());
        Ok(())
    }

    /// Handle one view request.
    ///
    /// Collaborator failures are reported to the view and never end the
    /// session, so the user can retry or dismiss.
    pub fn handle(&mut self, request: ViewRequest) -> (ViewResponse, Outcome) {
        debug!("Handling request: {}", request);

        match self.dispatch(request) {
            Ok(result) => result,
            Err(e) => {
                warn!("Request failed: {:#}", e);
                (ViewResponse::Error(format!("{:#}", e)), Outcome::Continue)
            }
        }
    }

    fn dispatch(&mut self, request: ViewRequest) -> Result<(ViewResponse, Outcome)> {
        use Outcome::*;

        Ok(match request {
            ViewRequest::WindowClicked(id) => (ViewResponse::Ok, self.window_clicked(id)?),
            ViewRequest::WindowClickedMidbutton(id) => {
                (ViewResponse::Ok, self.window_clicked_midbutton(id)?)
            }
            ViewRequest::IsMidbuttonEnabled => {
                (ViewResponse::Flag(self.is_midbutton_enabled()), Continue)
            }
            ViewRequest::AppClicked(entry) => (ViewResponse::Ok, self.app_clicked(&entry)?),
            ViewRequest::BackgroundClicked => (ViewResponse::Ok, self.background_clicked()),
            ViewRequest::Search(query) => (ViewResponse::Apps(self.search(&query)), Continue),
            ViewRequest::BackgroundOverlayColor => {
                (ViewResponse::Color(self.background_overlay_color()), Continue)
            }
            ViewRequest::Background => (ViewResponse::Text(self.background()?), Continue),
            ViewRequest::DockItems => (ViewResponse::Apps(self.dock_items()?), Continue),
            ViewRequest::Windows(ws) => (ViewResponse::Windows(self.windows(ws)?), Continue),
            ViewRequest::Workspaces => (ViewResponse::Workspaces(self.workspaces()?), Continue),
            ViewRequest::WorkspaceClicked(ws) => (ViewResponse::Ok, self.workspace_clicked(ws)?),
            ViewRequest::DroppedOnWorkspace { workspace, window } => (
                ViewResponse::Ok,
                self.dropped_on_workspace(workspace, window)?,
            ),
            ViewRequest::CurrentWorkspace => {
                (ViewResponse::Text(self.current_workspace()?), Continue)
            }
            ViewRequest::IsWorkspacesEnabled => {
                (ViewResponse::Flag(self.is_workspaces_enabled()), Continue)
            }
            ViewRequest::IsDockEnabled => (ViewResponse::Flag(self.is_dock_enabled()?), Continue),
        })
    }

    pub fn window_clicked(&mut self, id: WindowId) -> Result<Outcome> {
        info!("Activating window {}", id);
        self.wm.activate(id)?;
        Ok(Outcome::Exit)
    }

    pub fn window_clicked_midbutton(&mut self, id: WindowId) -> Result<Outcome> {
        info!("Closing window {}", id);
        self.wm.close(id)?;
        Ok(Outcome::Continue)
    }

    pub fn is_midbutton_enabled(&self) -> bool {
        self.options.middle_mouse_close
    }

    pub fn app_clicked(&mut self, entry_name: &str) -> Result<Outcome> {
        info!("Launching {}", entry_name);
        let path = self.config.desktop_entry_locate(entry_name)?;
        self.config.desktop_entry_execute(&path)?;
        Ok(Outcome::Exit)
    }

    pub fn background_clicked(&self) -> Outcome {
        info!("Background clicked, leaving overview");
        Outcome::Exit
    }

    pub fn search(&self, query: &str) -> Vec<SearchResult> {
        self.catalog.search(query)
    }

    pub fn background_overlay_color(&self) -> [f64; 4] {
        self.options.background_color_overlay
    }

    pub fn background(&self) -> Result<String> {
        self.config.get_background()
    }

    /// Dock pins are re-read from the daemon on every call.
    // TODO: cache membership for the session once the daemon signals dock changes
    pub fn dock_items(&self) -> Result<Vec<SearchResult>> {
        let membership = catalog::parse_membership(&self.config.get_dock_items()?)?;
        Ok(self.catalog.dock_items(&membership))
    }

    /// Windows on a 1-based workspace, with a fresh screenshot of each
    pub fn windows(&mut self, workspace: usize) -> Result<Vec<WindowTile>> {
        let index = to_index(workspace)?;
        let ids = self.wm.window_ids(index)?;
        let mut tiles = Vec::with_capacity(ids.len());

        for (position, id) in ids.into_iter().enumerate() {
            let name = self.wm.window_name(id)?;
            if HIDDEN_WINDOW_TITLES.contains(&name.as_str()) {
                continue;
            }
            let screenshot = self.wm.window_screenshot(id, &position.to_string())?;
            tiles.push(WindowTile {
                name,
                screenshot,
                id,
            });
        }

        Ok(tiles)
    }

    pub fn workspaces(&mut self) -> Result<Vec<String>> {
        let count = self.wm.num_workspaces()?;
        Ok((1..=count).map(|n| n.to_string()).collect())
    }

    pub fn workspace_clicked(&mut self, workspace: usize) -> Result<Outcome> {
        info!("Switching to workspace {}", workspace);
        self.wm.switch_workspace(to_index(workspace)?)?;
        Ok(Outcome::Refresh)
    }

    pub fn dropped_on_workspace(&mut self, workspace: usize, id: WindowId) -> Result<Outcome> {
        info!("Moving window {} to workspace {}", id, workspace);
        self.wm.move_to_workspace(id, to_index(workspace)?)?;
        Ok(Outcome::Continue)
    }

    pub fn current_workspace(&mut self) -> Result<String> {
        Ok((self.wm.current_workspace()? + 1).to_string())
    }

    pub fn is_workspaces_enabled(&self) -> bool {
        self.options.workspaces_sidebar
    }

    /// The dock is shown only when something is pinned to it
    pub fn is_dock_enabled(&self) -> Result<bool> {
        let membership = catalog::parse_membership(&self.config.get_dock_items()?)?;
        Ok(!membership.is_empty())
    }
}

/// Convert a 1-based workspace number to the adapter's 0-based index
fn to_index(workspace: usize) -> Result<usize> {
    workspace
        .checked_sub(1)
        .context("Workspaces are numbered from 1")
}
