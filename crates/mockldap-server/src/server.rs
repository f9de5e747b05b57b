//! Server startup and shutdown.

use std::net::SocketAddr;
use std::sync::Arc;

use mockldap_core::config::ServerConfig;
use mockldap_core::{Error, Result};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::info;

use crate::directory::Directory;
use crate::listener::{LdapListener, ServerAction};

/// A listener running on a background task.
#[derive(Debug)]
pub struct RunningServer {
    address: SocketAddr,
    directory: Arc<Directory>,
    shutdown: broadcast::Sender<ServerAction>,
    task: JoinHandle<()>,
}

impl RunningServer {
    /// Validates `config`, binds the listener and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ValidationError`] for an invalid configuration and
    /// [`Error::ConfigError`] for an address that cannot be bound.
    pub async fn start(config: &ServerConfig) -> Result<Self> {
        config.check()?;
        let directory = Arc::new(Directory::new(config)?);

        let bind_address = config.bind_address();
        let listener = LdapListener::bind(&bind_address, Arc::clone(&directory))
            .await
            .map_err(|err| Error::ConfigError(format!("could not bind {bind_address}: {err}")))?;
        let address = listener
            .local_addr()
            .map_err(|err| Error::InternalError(err.to_string()))?;

        let (shutdown, rx) = broadcast::channel(1);
        let task = listener.spawn(rx);
        info!("LDAP server up at: ldap://{address}");

        Ok(Self {
            address,
            directory,
            shutdown,
            task,
        })
    }

    /// Address the listener is bound to.
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.address
    }

    /// `ldap://` URL clients can connect to.
    #[must_use]
    pub fn url(&self) -> String {
        format!("ldap://{}", self.address)
    }

    /// The directory being served.
    #[must_use]
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Stops accepting connections and waits for the accept loop to exit.
    pub async fn shutdown(self) {
        // A send error means the loop already exited.
        let _ = self.shutdown.send(ServerAction::Shutdown);
        let _ = self.task.await;
    }
}
