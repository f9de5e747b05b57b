//! TCP listener and connection loop.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use ldap3_proto::LdapCodec;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, error, info, warn};

use crate::directory::Directory;
use crate::session::{LdapResponseState, LdapSession};

/// Signals broadcast to the accept loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerAction {
    /// Stop accepting connections.
    Shutdown,
}

/// A bound LDAP listener serving one [`Directory`].
#[derive(Debug)]
pub struct LdapListener {
    listener: TcpListener,
    directory: Arc<Directory>,
}

impl LdapListener {
    /// Binds `address` (`host:port`; port 0 picks a free port).
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the address cannot be bound.
    pub async fn bind(address: &str, directory: Arc<Directory>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            directory,
        })
    }

    /// Address actually bound.
    ///
    /// # Errors
    ///
    /// Returns the I/O error reported by the socket.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accepts connections until a shutdown is received or the channel closes.
    ///
    /// Each connection runs on its own task. Connections already open are left to finish.
    pub async fn serve(self, mut rx: broadcast::Receiver<ServerAction>) {
        loop {
            tokio::select! {
                action = rx.recv() => {
                    match action {
                        Ok(ServerAction::Shutdown) | Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
                accept = self.listener.accept() => {
                    match accept {
                        Ok((tcpstream, client_address)) => {
                            debug!(%client_address, "accepted connection");
                            tokio::spawn(client_process(
                                tcpstream,
                                client_address,
                                Arc::clone(&self.directory),
                            ));
                        }
                        Err(err) => {
                            error!(?err, "LDAP acceptor error, continuing");
                        }
                    }
                }
            }
        }
        info!("Stopped LDAP listener");
    }

    /// Runs [`LdapListener::serve`] on a new task.
    #[must_use]
    pub fn spawn(self, rx: broadcast::Receiver<ServerAction>) -> JoinHandle<()> {
        tokio::spawn(self.serve(rx))
    }
}

async fn client_process<STREAM>(
    stream: STREAM,
    client_address: SocketAddr,
    directory: Arc<Directory>,
) where
    STREAM: AsyncRead + AsyncWrite,
{
    let (r, w) = tokio::io::split(stream);
    let mut r = FramedRead::new(r, LdapCodec::default());
    let mut w = FramedWrite::new(w, LdapCodec::default());

    let mut session = LdapSession::new();
    while let Some(frame) = r.next().await {
        let protomsg = match frame {
            Ok(protomsg) => protomsg,
            Err(err) => {
                warn!(%client_address, ?err, "undecodable LDAP message, closing");
                break;
            }
        };

        match session.process(&directory, protomsg).await {
            LdapResponseState::Unbind | LdapResponseState::Disconnect => break,
            LdapResponseState::NoResponse => {}
            LdapResponseState::Respond(msgs) => {
                for rmsg in msgs {
                    if w.send(rmsg).await.is_err() {
                        debug!(%client_address, "client went away mid-response");
                        return;
                    }
                }
            }
        }
    }
    debug!(%client_address, "connection closed");
}
