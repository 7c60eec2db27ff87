//! Client side of the qoverview config daemon.
//!
//! The daemon owns user options, the application catalog and dock pins, and
//! resolves/launches desktop entries. It is reached over the D-Bus session
//! bus; the [`ConfigClient`] trait lets the session run against a mock.

use anyhow::{Context, Result};
use tracing::debug;
use zbus::blocking::Connection;
use zbus::proxy;

const SERVICE: &str = "org.qoverview.config";

/// Calls exposed by the config daemon. Payloads are JSON strings.
pub trait ConfigClient {
    fn get_config(&self) -> Result<String>;

    fn get_apps_list(&self) -> Result<String>;

    fn get_dock_items(&self) -> Result<String>;

    fn get_background(&self) -> Result<String>;

    /// Resolve an entry name (e.g. `firefox.desktop`) to its file path
    fn desktop_entry_locate(&self, entry_name: &str) -> Result<String>;

    /// Launch the application behind a desktop entry path
    fn desktop_entry_execute(&self, path: &str) -> Result<()>;
}

#[proxy(
    interface = "org.qoverview.config.iface",
    default_service = "org.qoverview.config",
    default_path = "/org/qoverview/config"
)]
trait ConfigDaemon {
    #[zbus(name = "get_config")]
    fn get_config(&self) -> zbus::Result<String>;

    #[zbus(name = "get_apps_list")]
    fn get_apps_list(&self) -> zbus::Result<String>;

    #[zbus(name = "get_dock_items")]
    fn get_dock_items(&self) -> zbus::Result<String>;

    #[zbus(name = "get_background")]
    fn get_background(&self) -> zbus::Result<String>;

    #[zbus(name = "desktop_entry_locate")]
    fn desktop_entry_locate(&self, name: &str) -> zbus::Result<String>;

    #[zbus(name = "desktop_entry_execute")]
    fn desktop_entry_execute(&self, path: &str) -> zbus::Result<()>;
}

/// Real implementation over the D-Bus session bus
pub struct DbusConfigClient {
    proxy: ConfigDaemonProxyBlocking<'static>,
}

impl DbusConfigClient {
    /// Connect to the session bus and check that the daemon owns its name
    pub fn connect() -> Result<Self> {
        let connection = Connection::session().context("Failed to connect to the session bus")?;

        let dbus = zbus::blocking::fdo::DBusProxy::new(&connection)?;
        let name = zbus::names::BusName::try_from(SERVICE)?;
        if !dbus.name_has_owner(name)? {
            anyhow::bail!("{} is not registered on the session bus", SERVICE);
        }

        let proxy = ConfigDaemonProxyBlocking::new(&connection)
            .context("Failed to create config daemon proxy")?;
        debug!("Connected to {}", SERVICE);

        Ok(DbusConfigClient { proxy })
    }
}

impl ConfigClient for DbusConfigClient {
    fn get_config(&self) -> Result<String> {
        Ok(self.proxy.get_config()?)
    }

    fn get_apps_list(&self) -> Result<String> {
        Ok(self.proxy.get_apps_list()?)
    }

    fn get_dock_items(&self) -> Result<String> {
        Ok(self.proxy.get_dock_items()?)
    }

    fn get_background(&self) -> Result<String> {
        Ok(self.proxy.get_background()?)
    }

    fn desktop_entry_locate(&self, entry_name: &str) -> Result<String> {
        self.proxy
            .desktop_entry_locate(entry_name)
            .with_context(|| format!("Failed to locate desktop entry {}", entry_name))
    }

    fn desktop_entry_execute(&self, path: &str) -> Result<()> {
        self.proxy
            .desktop_entry_execute(path)
            .with_context(|| format!("Failed to execute desktop entry {}", path))
    }
}

/// Print the startup hint shown when the daemon cannot be reached
pub fn print_daemon_hint() {
    eprintln!("config-server is (probably) not running! (Unable to connect to it via DBUS)");
    eprintln!("Start it and try again. The command is \"qoverview-config-server\"");
}
