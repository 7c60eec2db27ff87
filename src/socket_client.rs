use crate::ipc::{ViewRequest, ViewResponse};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

/// Time to wait for the session to answer.
///
/// Listing windows takes one `grim` capture per window, so it gets far more
/// room than the other requests.
fn response_timeout(request: &ViewRequest) -> Duration {
    match request {
        ViewRequest::Windows(_) => Duration::from_secs(60),
        _ => Duration::from_secs(5),
    }
}

/// Send a request to the session listening at `socket_path`
pub fn send_request(socket_path: &Path, request: &ViewRequest) -> Result<ViewResponse> {
    let mut stream = UnixStream::connect(socket_path).with_context(|| {
        format!(
            "Failed to connect to session at {}. Is the overview running?",
            socket_path.display()
        )
    })?;

    stream.set_read_timeout(Some(response_timeout(request)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    writeln!(stream, "{}", request)?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: ViewResponse =
        serde_json::from_str(&response_line).context("Failed to parse session response")?;

    Ok(response)
}

/// Print a response as one JSON line and exit with the matching code
pub fn print_response_and_exit(response: &ViewResponse) -> ! {
    match serde_json::to_string(response) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }

    if let ViewResponse::Error(e) = response {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    std::process::exit(0);
}

/// Send request and print result, exit with appropriate code
pub fn send_request_and_exit(socket_path: &Path, request: &ViewRequest) -> ! {
    match send_request(socket_path, request) {
        Ok(response) => print_response_and_exit(&response),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RestartStrategy;
    use crate::config_client::ConfigClient;
    use crate::session::Session;
    use crate::socket_server::{self, ServeExit};
    use crate::window_manager::{WindowAdapter, WindowId};
    use std::cell::Cell;
    use std::path::PathBuf;
    use std::rc::Rc;

    struct StaticConfig;

    /// Serves the same catalog as `StaticConfig`, counting catalog loads and
    /// failing every load after the first `healthy_loads`
    struct CountingConfig {
        app_loads: Rc<Cell<usize>>,
        healthy_loads: usize,
    }

    impl ConfigClient for CountingConfig {
        fn get_config(&self) -> Result<String> {
            StaticConfig.get_config()
        }

        fn get_apps_list(&self) -> Result<String> {
            let loads = self.app_loads.get() + 1;
            self.app_loads.set(loads);
            if loads > self.healthy_loads {
                anyhow::bail!("config daemon went away");
            }
            StaticConfig.get_apps_list()
        }

        fn get_dock_items(&self) -> Result<String> {
            StaticConfig.get_dock_items()
        }

        fn get_background(&self) -> Result<String> {
            StaticConfig.get_background()
        }

        fn desktop_entry_locate(&self, entry_name: &str) -> Result<String> {
            StaticConfig.desktop_entry_locate(entry_name)
        }

        fn desktop_entry_execute(&self, path: &str) -> Result<()> {
            StaticConfig.desktop_entry_execute(path)
        }
    }

    impl ConfigClient for StaticConfig {
        fn get_config(&self) -> Result<String> {
            Ok("{}".to_string())
        }

        fn get_apps_list(&self) -> Result<String> {
            Ok(r#"[{"Name": "Files", "EntryName": "files.desktop", "IconPath": "/f.png"}]"#
                .to_string())
        }

        fn get_dock_items(&self) -> Result<String> {
            Ok("[]".to_string())
        }

        fn get_background(&self) -> Result<String> {
            Ok(String::new())
        }

        fn desktop_entry_locate(&self, entry_name: &str) -> Result<String> {
            Ok(entry_name.to_string())
        }

        fn desktop_entry_execute(&self, _path: &str) -> Result<()> {
            Ok(())
        }
    }

    struct NoWindows;

    impl WindowAdapter for NoWindows {
        fn window_ids(&mut self, _workspace: usize) -> Result<Vec<WindowId>> {
            Ok(Vec::new())
        }

        fn window_name(&mut self, _id: WindowId) -> Result<String> {
            anyhow::bail!("no windows")
        }

        fn window_screenshot(&mut self, _id: WindowId, _tag: &str) -> Result<PathBuf> {
            anyhow::bail!("no windows")
        }

        fn activate(&mut self, _id: WindowId) -> Result<()> {
            Ok(())
        }

        fn close(&mut self, _id: WindowId) -> Result<()> {
            Ok(())
        }

        fn num_workspaces(&mut self) -> Result<usize> {
            Ok(1)
        }

        fn current_workspace(&mut self) -> Result<usize> {
            Ok(0)
        }

        fn switch_workspace(&mut self, _workspace: usize) -> Result<()> {
            Ok(())
        }

        fn move_to_workspace(&mut self, _id: WindowId, _workspace: usize) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_session_over_socket() {
        let socket_path = std::env::temp_dir().join(format!("qoverview-test-{}.sock", std::process::id()));
        let (listener, _socket) = socket_server::bind(&socket_path).unwrap();
        let mut session = Session::new(StaticConfig, NoWindows).unwrap();

        let client_path = socket_path.clone();
        let client = tokio::task::spawn_blocking(move || {
            let search = send_request(&client_path, &ViewRequest::Search("fi".to_string())).unwrap();
            let workspaces = send_request(&client_path, &ViewRequest::Workspaces).unwrap();
            let dismissed = send_request(&client_path, &ViewRequest::BackgroundClicked).unwrap();
            (search, workspaces, dismissed)
        });

        let exit = socket_server::serve(listener, &mut session, RestartStrategy::Refresh)
            .await
            .unwrap();
        let (search, workspaces, dismissed) = client.await.unwrap();

        assert_eq!(exit, ServeExit::Done);
        match search {
            ViewResponse::Apps(apps) => assert_eq!(apps[0].entry_name, "files.desktop"),
            other => panic!("unexpected response: {:?}", other),
        }
        assert_eq!(workspaces, ViewResponse::Workspaces(vec!["1".to_string()]));
        assert_eq!(dismissed, ViewResponse::Ok);
    }

    #[tokio::test]
    async fn test_workspace_click_with_respawn_strategy_stops_server() {
        let socket_path = std::env::temp_dir().join(format!("qoverview-respawn-{}.sock", std::process::id()));
        let (listener, _socket) = socket_server::bind(&socket_path).unwrap();
        let mut session = Session::new(StaticConfig, NoWindows).unwrap();

        let client_path = socket_path.clone();
        let client = tokio::task::spawn_blocking(move || {
            send_request(&client_path, &ViewRequest::WorkspaceClicked(1)).unwrap()
        });

        let exit = socket_server::serve(listener, &mut session, RestartStrategy::Respawn)
            .await
            .unwrap();

        assert_eq!(exit, ServeExit::Respawn);
        assert_eq!(client.await.unwrap(), ViewResponse::Ok);
    }

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("qoverview-{}-{}.sock", name, std::process::id()))
    }

    /// Write a request line and disconnect without waiting for the answer
    fn send_and_hang_up(path: &Path, line: &str) {
        let mut stream = UnixStream::connect(path).unwrap();
        stream.write_all(line.as_bytes()).unwrap();
    }

    #[tokio::test]
    async fn test_exit_action_ends_session_when_view_hangs_up() {
        let socket_path = socket_path("hangup");
        let (listener, _socket) = socket_server::bind(&socket_path).unwrap();
        let mut session = Session::new(StaticConfig, NoWindows).unwrap();

        let client_path = socket_path.clone();
        let client = tokio::task::spawn_blocking(move || {
            send_and_hang_up(&client_path, "background-clicked\n");
        });

        let exit = tokio::time::timeout(
            Duration::from_secs(3),
            socket_server::serve(listener, &mut session, RestartStrategy::Refresh),
        )
        .await
        .expect("session kept serving after the overview was dismissed")
        .unwrap();

        client.await.unwrap();
        assert_eq!(exit, ServeExit::Done);
    }

    #[tokio::test]
    async fn test_respawn_happens_when_view_hangs_up() {
        let socket_path = socket_path("hangup-respawn");
        let (listener, _socket) = socket_server::bind(&socket_path).unwrap();
        let mut session = Session::new(StaticConfig, NoWindows).unwrap();

        let client_path = socket_path.clone();
        let client = tokio::task::spawn_blocking(move || {
            send_and_hang_up(&client_path, "workspace-clicked 1\n");
        });

        let exit = tokio::time::timeout(
            Duration::from_secs(3),
            socket_server::serve(listener, &mut session, RestartStrategy::Respawn),
        )
        .await
        .expect("workspace switch did not end the session")
        .unwrap();

        client.await.unwrap();
        assert_eq!(exit, ServeExit::Respawn);
    }

    #[tokio::test]
    async fn test_workspace_click_refreshes_and_keeps_serving() {
        let socket_path = socket_path("refresh");
        let (listener, _socket) = socket_server::bind(&socket_path).unwrap();
        let app_loads = Rc::new(Cell::new(0));
        let config = CountingConfig {
            app_loads: app_loads.clone(),
            healthy_loads: usize::MAX,
        };
        let mut session = Session::new(config, NoWindows).unwrap();

        let client_path = socket_path.clone();
        let client = tokio::task::spawn_blocking(move || {
            let switched = send_request(&client_path, &ViewRequest::WorkspaceClicked(1)).unwrap();
            let search = send_request(&client_path, &ViewRequest::Search("fi".to_string())).unwrap();
            send_request(&client_path, &ViewRequest::BackgroundClicked).unwrap();
            (switched, search)
        });

        let exit = socket_server::serve(listener, &mut session, RestartStrategy::Refresh)
            .await
            .unwrap();
        let (switched, search) = client.await.unwrap();

        assert_eq!(exit, ServeExit::Done);
        assert_eq!(switched, ViewResponse::Ok);
        assert!(matches!(search, ViewResponse::Apps(ref apps) if apps.len() == 1));
        // Initial load plus one reload after the switch
        assert_eq!(app_loads.get(), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_respawn() {
        let socket_path = socket_path("refresh-fails");
        let (listener, _socket) = socket_server::bind(&socket_path).unwrap();
        let app_loads = Rc::new(Cell::new(0));
        let config = CountingConfig {
            app_loads: app_loads.clone(),
            healthy_loads: 1,
        };
        let mut session = Session::new(config, NoWindows).unwrap();

        let client_path = socket_path.clone();
        let client = tokio::task::spawn_blocking(move || {
            send_request(&client_path, &ViewRequest::WorkspaceClicked(1)).unwrap()
        });

        let exit = socket_server::serve(listener, &mut session, RestartStrategy::Refresh)
            .await
            .unwrap();

        assert_eq!(exit, ServeExit::Respawn);
        assert_eq!(client.await.unwrap(), ViewResponse::Ok);
        assert_eq!(app_loads.get(), 2);
    }

    #[test]
    fn test_window_listing_gets_longer_timeout() {
        assert_eq!(
            response_timeout(&ViewRequest::Windows(1)),
            Duration::from_secs(60)
        );
        assert_eq!(
            response_timeout(&ViewRequest::Search("fi".to_string())),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_send_request_without_session() {
        let missing = std::env::temp_dir().join("qoverview-no-such-session.sock");
        let err = send_request(&missing, &ViewRequest::Workspaces).unwrap_err();
        assert!(err.to_string().contains("Is the overview running?"));
    }
}
