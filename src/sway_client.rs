//! Sway IPC abstraction for testability.
//!
//! The trait returns plain crate types instead of `swayipc` nodes, which are
//! `#[non_exhaustive]` and cannot be built in tests.

use anyhow::{Context, Result};
use std::borrow::Cow;
use swayipc::{Connection, Node, NodeType};
use tracing::debug;

use crate::window_manager::{Geometry, WindowInfo, WorkspaceInfo};

/// Trait for Sway IPC operations.
pub trait SwayClient {
    /// Get every window in the tree, with the workspace it lives on
    fn get_windows(&mut self) -> Result<Vec<WindowInfo>>;

    /// Get the list of workspaces
    fn get_workspaces(&mut self) -> Result<Vec<WorkspaceInfo>>;

    /// Run a sway command, failing if any part of it fails
    fn run_command(&mut self, command: &str) -> Result<()>;
}

/// Real implementation using swayipc
pub struct RealSwayClient {
    connection: Connection,
}

impl RealSwayClient {
    /// Create a new connection to Sway
    pub fn new() -> Result<Self> {
        let connection = Connection::new().context("Failed to connect to Sway IPC")?;
        Ok(RealSwayClient { connection })
    }
}

impl SwayClient for RealSwayClient {
    fn get_windows(&mut self) -> Result<Vec<WindowInfo>> {
        let tree = self.connection.get_tree()?;
        Ok(collect_windows(&tree, Cow::Borrowed("")))
    }

    fn get_workspaces(&mut self) -> Result<Vec<WorkspaceInfo>> {
        let workspaces = self.connection.get_workspaces()?;
        Ok(workspaces
            .into_iter()
            .map(|w| WorkspaceInfo {
                num: w.num,
                name: w.name,
                focused: w.focused,
            })
            .collect())
    }

    fn run_command(&mut self, command: &str) -> Result<()> {
        debug!("sway: {}", command);
        for outcome in self.connection.run_command(command)? {
            outcome.with_context(|| format!("Sway rejected command: {}", command))?;
        }
        Ok(())
    }
}

fn window_from_node(node: &Node, workspace: String) -> Option<WindowInfo> {
    // Windows have a pid, containers don't
    if node.node_type == NodeType::Con || node.node_type == NodeType::FloatingCon {
        node.pid?;
        Some(WindowInfo {
            id: node.id,
            title: node.name.clone().unwrap_or_default(),
            workspace,
            geometry: Geometry {
                x: node.rect.x,
                y: node.rect.y,
                width: node.rect.width,
                height: node.rect.height,
            },
        })
    } else {
        None
    }
}

/// Recursively collect all windows from a Sway node tree.
///
/// Uses `Cow<str>` to avoid cloning workspace names during traversal.
#[must_use]
fn collect_windows<'a>(node: &'a Node, current_workspace: Cow<'a, str>) -> Vec<WindowInfo> {
    let mut windows = Vec::new();

    let workspace: Cow<'a, str> = if node.node_type == NodeType::Workspace {
        node.name
            .as_deref()
            .map(Cow::Borrowed)
            .unwrap_or(current_workspace)
    } else {
        current_workspace
    };

    if let Some(window) = window_from_node(node, workspace.clone().into_owned()) {
        windows.push(window);
    }

    for child in &node.nodes {
        windows.extend(collect_windows(child, Cow::Borrowed(&workspace)));
    }
    for child in &node.floating_nodes {
        windows.extend(collect_windows(child, Cow::Borrowed(&workspace)));
    }

    windows
}
