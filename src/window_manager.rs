use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::sway_client::{RealSwayClient, SwayClient};

pub type WindowId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone)]
pub struct WindowInfo {
    pub id: WindowId,
    pub title: String,
    pub workspace: String,
    pub geometry: Geometry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceInfo {
    pub num: i32,
    pub name: String,
    pub focused: bool,
}

/// Window-manager operations used by the overview.
///
/// Workspaces are addressed by 0-based index into the ordered workspace list.
pub trait WindowAdapter {
    /// IDs of the windows on a workspace
    fn window_ids(&mut self, workspace: usize) -> Result<Vec<WindowId>>;

    fn window_name(&mut self, id: WindowId) -> Result<String>;

    /// Capture a window into an image file and return its path.
    /// `tag` distinguishes captures taken in the same session.
    fn window_screenshot(&mut self, id: WindowId, tag: &str) -> Result<PathBuf>;

    fn activate(&mut self, id: WindowId) -> Result<()>;

    fn close(&mut self, id: WindowId) -> Result<()>;

    fn num_workspaces(&mut self) -> Result<usize>;

    fn current_workspace(&mut self) -> Result<usize>;

    fn switch_workspace(&mut self, workspace: usize) -> Result<()>;

    fn move_to_workspace(&mut self, id: WindowId, workspace: usize) -> Result<()>;
}

/// Window adapter backed by Sway IPC.
///
/// Keeps a snapshot of the window list from the last enumeration so that
/// per-window lookups don't re-read the whole tree.
pub struct WindowManager<C: SwayClient = RealSwayClient> {
    client: C,
    windows: Vec<WindowInfo>,
    screenshot_dir: PathBuf,
}

impl WindowManager<RealSwayClient> {
    /// Create a new WindowManager with a real Sway connection
    pub fn new(screenshot_dir: &Path) -> Result<Self> {
        let client = RealSwayClient::new()?;
        Ok(Self::with_client(client, screenshot_dir))
    }
}

impl<C: SwayClient> WindowManager<C> {
    /// Create a WindowManager with a custom SwayClient (for testing)
    pub fn with_client(client: C, screenshot_dir: &Path) -> Self {
        WindowManager {
            client,
            windows: Vec::new(),
            screenshot_dir: screenshot_dir.to_path_buf(),
        }
    }

    /// Re-read the window list from Sway
    pub fn refresh(&mut self) -> Result<()> {
        self.windows = self.client.get_windows()?;
        debug!("Refreshed to {} windows", self.windows.len());
        Ok(())
    }

    fn workspaces(&mut self) -> Result<Vec<WorkspaceInfo>> {
        Ok(ordered_workspaces(self.client.get_workspaces()?))
    }

    fn workspace_at(&mut self, index: usize) -> Result<WorkspaceInfo> {
        let mut workspaces = self.workspaces()?;
        if index >= workspaces.len() {
            anyhow::bail!(
                "Workspace index {} out of range ({} workspaces)",
                index,
                workspaces.len()
            );
        }
        Ok(workspaces.swap_remove(index))
    }

    fn find_window(&mut self, id: WindowId) -> Result<WindowInfo> {
        if let Some(window) = self.windows.iter().find(|w| w.id == id) {
            return Ok(window.clone());
        }

        // Not in the snapshot: the window may be newer than the last enumeration
        self.refresh()?;
        self.windows
            .iter()
            .find(|w| w.id == id)
            .cloned()
            .with_context(|| format!("No window with id {}", id))
    }
}

impl<C: SwayClient> WindowAdapter for WindowManager<C> {
    fn window_ids(&mut self, workspace: usize) -> Result<Vec<WindowId>> {
        let workspace = self.workspace_at(workspace)?;
        self.refresh()?;
        Ok(self
            .windows
            .iter()
            .filter(|w| w.workspace == workspace.name)
            .map(|w| w.id)
            .collect())
    }

    fn window_name(&mut self, id: WindowId) -> Result<String> {
        Ok(self.find_window(id)?.title)
    }

    fn window_screenshot(&mut self, id: WindowId, tag: &str) -> Result<PathBuf> {
        let window = self.find_window(id)?;
        let path = self.screenshot_dir.join(format!("window-{}.png", tag));

        let status = Command::new("grim")
            .arg("-g")
            .arg(grim_region(&window.geometry))
            .arg(&path)
            .status()
            .context("Failed to run grim")?;
        if !status.success() {
            anyhow::bail!("grim exited with {} capturing window {}", status, id);
        }

        Ok(path)
    }

    fn activate(&mut self, id: WindowId) -> Result<()> {
        self.client.run_command(&format!("[con_id={}] focus", id))
    }

    fn close(&mut self, id: WindowId) -> Result<()> {
        self.client.run_command(&format!("[con_id={}] kill", id))
    }

    fn num_workspaces(&mut self) -> Result<usize> {
        Ok(self.workspaces()?.len())
    }

    fn current_workspace(&mut self) -> Result<usize> {
        self.workspaces()?
            .iter()
            .position(|w| w.focused)
            .context("Sway reports no focused workspace")
    }

    fn switch_workspace(&mut self, workspace: usize) -> Result<()> {
        let workspace = self.workspace_at(workspace)?;
        self.client
            .run_command(&format!("workspace {}", workspace_target(&workspace)))
    }

    fn move_to_workspace(&mut self, id: WindowId, workspace: usize) -> Result<()> {
        let workspace = self.workspace_at(workspace)?;
        self.client.run_command(&format!(
            "[con_id={}] move container to workspace {}",
            id,
            workspace_target(&workspace)
        ))
    }
}

/// Order workspaces the way sway's bar does: by number, unnumbered (-1) last,
/// then by name.
#[must_use]
fn ordered_workspaces(mut workspaces: Vec<WorkspaceInfo>) -> Vec<WorkspaceInfo> {
    workspaces.sort_by(|a, b| {
        let key = |w: &WorkspaceInfo| (w.num < 0, w.num);
        key(a).cmp(&key(b)).then_with(|| a.name.cmp(&b.name))
    });
    workspaces
}

/// Argument for sway's `workspace` command addressing this workspace
fn workspace_target(workspace: &WorkspaceInfo) -> String {
    if workspace.num >= 0 && workspace.name.starts_with(&workspace.num.to_string()) {
        format!("number {}", workspace.num)
    } else {
        format!("\"{}\"", workspace.name.replace('"', "\\\""))
    }
}

/// Region string in grim's `-g` format
fn grim_region(geometry: &Geometry) -> String {
    format!(
        "{},{} {}x{}",
        geometry.x, geometry.y, geometry.width, geometry.height
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct MockSwayClient {
        windows: Vec<WindowInfo>,
        workspaces: Vec<WorkspaceInfo>,
        commands: Vec<String>,
        tree_reads: usize,
    }

    impl SwayClient for MockSwayClient {
        fn get_windows(&mut self) -> Result<Vec<WindowInfo>> {
            self.tree_reads += 1;
            Ok(self.windows.clone())
        }

        fn get_workspaces(&mut self) -> Result<Vec<WorkspaceInfo>> {
            Ok(self.workspaces.clone())
        }

        fn run_command(&mut self, command: &str) -> Result<()> {
            self.commands.push(command.to_string());
            Ok(())
        }
    }

    fn make_window(id: WindowId, title: &str, workspace: &str) -> WindowInfo {
        WindowInfo {
            id,
            title: title.to_string(),
            workspace: workspace.to_string(),
            geometry: Geometry {
                x: 10,
                y: 20,
                width: 800,
                height: 600,
            },
        }
    }

    fn make_workspace(num: i32, name: &str, focused: bool) -> WorkspaceInfo {
        WorkspaceInfo {
            num,
            name: name.to_string(),
            focused,
        }
    }

    fn manager() -> WindowManager<MockSwayClient> {
        let client = MockSwayClient {
            windows: vec![
                make_window(1, "Terminal", "1"),
                make_window(2, "Browser", "2: web"),
                make_window(3, "Editor", "1"),
            ],
            // Sway reports workspaces in creation order
            workspaces: vec![
                make_workspace(2, "2: web", true),
                make_workspace(1, "1", false),
            ],
            ..Default::default()
        };
        WindowManager::with_client(client, Path::new("/tmp/qoverview-test"))
    }

    // ==================== workspace ordering tests ====================

    #[test]
    fn test_ordered_workspaces_by_number() {
        let ordered = ordered_workspaces(vec![
            make_workspace(3, "3", false),
            make_workspace(-1, "mail", false),
            make_workspace(1, "1", true),
            make_workspace(-1, "chat", false),
        ]);

        let names: Vec<_> = ordered.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["1", "3", "chat", "mail"]);
    }

    #[test]
    fn test_workspace_target() {
        assert_eq!(workspace_target(&make_workspace(2, "2: web", false)), "number 2");
        assert_eq!(workspace_target(&make_workspace(-1, "mail", false)), "\"mail\"");
    }

    #[test]
    fn test_grim_region() {
        let geometry = Geometry {
            x: 5,
            y: 0,
            width: 1920,
            height: 1080,
        };
        assert_eq!(grim_region(&geometry), "5,0 1920x1080");
    }

    // ==================== WindowAdapter tests ====================

    #[test]
    fn test_window_ids_by_index() {
        let mut wm = manager();

        assert_eq!(wm.window_ids(0).unwrap(), vec![1, 3]);
        assert_eq!(wm.window_ids(1).unwrap(), vec![2]);
        assert!(wm.window_ids(2).is_err());
    }

    #[test]
    fn test_window_name_uses_snapshot() {
        let mut wm = manager();
        wm.window_ids(0).unwrap();
        let reads = wm.client.tree_reads;

        assert_eq!(wm.window_name(3).unwrap(), "Editor");
        assert_eq!(wm.client.tree_reads, reads);
    }

    #[test]
    fn test_window_name_refreshes_on_miss() {
        let mut wm = manager();

        assert_eq!(wm.window_name(2).unwrap(), "Browser");
        assert_eq!(wm.client.tree_reads, 1);
        assert!(wm.window_name(99).is_err());
    }

    #[test]
    fn test_workspace_count_and_current() {
        let mut wm = manager();

        assert_eq!(wm.num_workspaces().unwrap(), 2);
        assert_eq!(wm.current_workspace().unwrap(), 1);
    }

    #[test]
    fn test_current_workspace_none_focused() {
        let mut wm = manager();
        wm.client.workspaces.iter_mut().for_each(|w| w.focused = false);

        assert!(wm.current_workspace().is_err());
    }

    #[test]
    fn test_commands_sent_to_sway() {
        let mut wm = manager();

        wm.activate(3).unwrap();
        wm.close(1).unwrap();
        wm.switch_workspace(1).unwrap();
        wm.move_to_workspace(3, 1).unwrap();

        assert_eq!(
            wm.client.commands,
            vec![
                "[con_id=3] focus",
                "[con_id=1] kill",
                "workspace number 2",
                "[con_id=3] move container to workspace number 2",
            ]
        );
    }

    #[test]
    fn test_switch_workspace_out_of_range() {
        let mut wm = manager();

        assert!(wm.switch_workspace(5).is_err());
        assert!(wm.client.commands.is_empty());
    }
}
