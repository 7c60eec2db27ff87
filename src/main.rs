mod catalog;
mod config;
mod config_client;
mod ipc;
mod pidfile;
mod session;
mod socket_client;
mod socket_server;
mod sway_client;
mod window_manager;

use anyhow::{Context, Result};
use config::{Command, Config};
use config_client::DbusConfigClient;
use ipc::ViewRequest;
use session::{Outcome, Session};
use pidfile::SessionPidfile;
use socket_server::ServeExit;
use std::path::Path;
use std::process::Stdio;
use tracing::{error, info};
use window_manager::WindowManager;

/// Start a detached copy of this process with the same arguments.
///
/// Fire and forget: the child is not waited on or checked.
fn respawn() {
    use std::os::unix::process::CommandExt;

    let exe = match std::env::current_exe() {
        Ok(exe) => exe,
        Err(e) => {
            error!("Cannot locate own executable to respawn: {}", e);
            return;
        }
    };

    let mut command = std::process::Command::new(&exe);
    command
        .args(std::env::args_os().skip(1))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    // New process group so the child outlives whatever launched us
    unsafe {
        command.pre_exec(|| {
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    match command.spawn() {
        Ok(child) => info!("Respawned as PID {}", child.id()),
        Err(e) => error!("Failed to respawn {}: {}", exe.display(), e),
    }
}

/// Connect to both collaborators and load the session.
///
/// An unreachable config daemon is fatal with the startup hint and status 1.
fn open_session(runtime_dir: &Path) -> Result<Session<DbusConfigClient, WindowManager>> {
    let config = match DbusConfigClient::connect() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to reach config daemon: {:#}", e);
            config_client::print_daemon_hint();
            std::process::exit(1);
        }
    };

    let wm = WindowManager::new(runtime_dir)?;
    Session::new(config, wm)
}

fn parse_request(words: &[String]) -> ViewRequest {
    match words.join(" ").parse() {
        Ok(request) => request,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let config = Config::parse();

    // Initialize logging; stdout is reserved for responses
    let log_level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let runtime_dir = ipc::ensure_runtime_dir()?;

    match config.command() {
        Command::Send { request } => {
            let request = parse_request(&request);
            socket_client::send_request_and_exit(&ipc::get_socket_path(), &request);
        }
        Command::Run { request } => {
            let request = parse_request(&request);
            let mut session = open_session(&runtime_dir)?;
            let (response, outcome) = session.handle(request);
            // A one-shot process has nothing to refresh; the next invocation
            // already sees the new workspace
            if outcome != Outcome::Continue {
                info!("Request finished with {:?}", outcome);
            }
            socket_client::print_response_and_exit(&response);
        }
        Command::Serve => run_server(&config, &runtime_dir),
    }
}

fn run_server(config: &Config, runtime_dir: &Path) -> Result<()> {
    info!("Starting qoverview session");

    let exit = {
        // Pidfile and socket must both be released before a respawned
        // overview starts up
        let _pidfile = SessionPidfile::acquire(&ipc::get_pidfile_path())?;
        let mut session = open_session(runtime_dir)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create Tokio runtime")?;

        runtime.block_on(async {
            let (listener, _socket) = socket_server::bind(&ipc::get_socket_path())?;
            socket_server::serve(listener, &mut session, config.restart).await
        })?
    };

    match exit {
        ServeExit::Done => info!("Session ended"),
        ServeExit::Respawn => respawn(),
    }

    Ok(())
}
