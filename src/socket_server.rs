use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, error, info, warn};

use crate::config::RestartStrategy;
use crate::config_client::ConfigClient;
use crate::ipc::{ViewRequest, ViewResponse};
use crate::session::{Outcome, Session};
use crate::window_manager::WindowAdapter;

/// Why the server stopped serving
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeExit {
    /// The user left the overview or interrupted the process
    Done,
    /// A fresh process should take over
    Respawn,
}

/// Socket path owned by this session; unlinked when the session ends so the
/// next overview (or a respawned one) can bind it
pub struct SessionSocket {
    path: PathBuf,
}

impl Drop for SessionSocket {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Session socket {} released", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => error!("Session socket {} left behind: {}", self.path.display(), e),
        }
    }
}

/// Bind the session socket. A leftover socket from a session that died
/// without cleaning up is replaced.
pub fn bind(socket_path: &Path) -> Result<(UnixListener, SessionSocket)> {
    if socket_path.exists() {
        warn!("Replacing leftover session socket {}", socket_path.display());
        fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind session socket {}", socket_path.display()))?;

    info!("Overview waiting for view requests on {}", socket_path.display());

    Ok((
        listener,
        SessionSocket {
            path: socket_path.to_path_buf(),
        },
    ))
}

/// Serve view requests until an action ends the session.
///
/// Clients are handled one at a time so requests run to completion in
/// arrival order.
pub async fn serve<C: ConfigClient, W: WindowAdapter>(
    listener: UnixListener,
    session: &mut Session<C, W>,
    restart: RestartStrategy,
) -> Result<ServeExit> {
    // One signal future for the whole session so a Ctrl-C during a slow
    // request is still seen at the next accept
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        let stream = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, _)) => stream,
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                    continue;
                }
            },
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                return Ok(ServeExit::Done);
            }
        };

        let outcome = match handle_client(stream, session).await {
            Ok(outcome) => outcome,
            Err(e) => {
                debug!("Client connection error: {}", e);
                continue;
            }
        };

        match outcome {
            Outcome::Continue => {}
            Outcome::Exit => return Ok(ServeExit::Done),
            Outcome::Refresh => match restart {
                RestartStrategy::Refresh => {
                    if let Err(e) = session.refresh() {
                        warn!("Refresh failed, respawning instead: {:#}", e);
                        return Ok(ServeExit::Respawn);
                    }
                }
                RestartStrategy::Respawn => return Ok(ServeExit::Respawn),
            },
        }
    }
}

/// Handle a single client connection
async fn handle_client<C: ConfigClient, W: WindowAdapter>(
    stream: UnixStream,
    session: &mut Session<C, W>,
) -> Result<Outcome> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Read one request per connection
    reader.read_line(&mut line).await?;

    let (response, outcome) = match line.parse::<ViewRequest>() {
        Ok(request) => session.handle(request),
        Err(e) => {
            warn!("Rejected request {:?}: {}", line.trim(), e);
            (ViewResponse::Error(e.to_string()), Outcome::Continue)
        }
    };

    // The action already happened; a view that hung up must not cancel it
    if let Err(e) = write_response(&mut writer, &response).await {
        warn!("Could not deliver response ({:?}): {}", outcome, e);
    }

    Ok(outcome)
}

async fn write_response<S: AsyncWrite + Unpin>(
    writer: &mut S,
    response: &ViewResponse,
) -> Result<()> {
    let response_json = serde_json::to_string(response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}
