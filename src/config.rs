use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum RestartStrategy {
    /// Reload state in place and keep serving
    Refresh,
    /// Start a fresh detached process and exit
    Respawn,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Serve view requests on the session socket (default if no command specified)
    Serve,
    /// Send one request to a running session and print the response
    Send {
        /// Request line, e.g. `search fire` or `windows 1`
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        request: Vec<String>,
    },
    /// Handle one request in-process and print the response
    Run {
        /// Request line, e.g. `workspaces` or `app-clicked firefox.desktop`
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        request: Vec<String>,
    },
}

#[derive(Debug, Clone, Parser)]
#[command(name = "qoverview")]
#[command(about = "Full-screen overview of windows, workspaces and applications", long_about = None)]
pub struct Config {
    /// What to do after switching workspace
    #[arg(short, long, value_enum, default_value = "refresh")]
    pub restart: RestartStrategy,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    pub fn parse() -> Self {
        <Config as Parser>::parse()
    }

    /// Get the command, defaulting to Serve if none specified
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}

/// User options served by the config daemon's `get_config`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Options {
    /// Close windows with a middle click
    pub middle_mouse_close: bool,
    /// Show the workspace sidebar
    pub workspaces_sidebar: bool,
    /// RGBA tint drawn over the background
    pub background_color_overlay: [f64; 4],
}

impl Default for Options {
    fn default() -> Self {
        Options {
            middle_mouse_close: true,
            workspaces_sidebar: true,
            background_color_overlay: [0.0, 0.0, 0.0, 0.0],
        }
    }
}

impl Options {
    /// Parse options, falling back to defaults when the payload is unusable.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(options) => options,
            Err(e) => {
                warn!("Invalid options from config daemon, using defaults: {}", e);
                Options::default()
            }
        }
    }
}
