//! WebSocket Game Server
//!
//! Binds the listen socket, performs the (optionally TLS-wrapped)
//! WebSocket handshake and spawns one session task per connection. The
//! matchmaker and judge are started once, before the accept loop.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio_native_tls::native_tls::{self, Identity, Protocol};
use tokio_native_tls::TlsAcceptor;
use tokio_tungstenite::accept_async;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::coord::{self, Coordinators};
use crate::network::session;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// TLS material, when termination is enabled.
    pub tls: Option<TlsConfig>,
}

/// Certificate material for TLS termination.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// PEM certificate chain path.
    pub certfile: String,
    /// PEM private key path.
    pub keyfile: String,
}

impl ServerConfig {
    /// Derive a server configuration from parsed settings.
    pub fn from_settings(settings: &Settings) -> Result<Self, ServerError> {
        let tls = if settings.ssl.enable_ssl {
            if settings.ssl.certfile.is_empty() || settings.ssl.keyfile.is_empty() {
                return Err(ServerError::IncompleteTls);
            }
            Some(TlsConfig {
                certfile: settings.ssl.certfile.clone(),
                keyfile: settings.ssl.keyfile.clone(),
            })
        } else {
            None
        };

        Ok(Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], settings.port())),
            tls,
        })
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Bind or certificate file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS setup failed.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// `enable_ssl` without certificate material.
    #[error("enable_ssl requires both certfile and keyfile")]
    IncompleteTls,
}

/// The game server.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    /// Create a new server.
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Run the accept loop forever.
    pub async fn run(&self) -> Result<(), ServerError> {
        let acceptor = match &self.config.tls {
            Some(tls) => Some(Arc::new(build_acceptor(tls)?)),
            None => None,
        };

        let coord = coord::spawn();

        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        info!(
            "listening on {}{}",
            self.config.bind_addr,
            if acceptor.is_some() { " (TLS)" } else { "" }
        );

        loop {
            match listener.accept().await {
                Ok((stream, addr)) => {
                    debug!("new connection from {}", addr);
                    let coord = coord.clone();
                    let acceptor = acceptor.clone();
                    tokio::spawn(handle_connection(stream, addr, acceptor, coord));
                }
                Err(e) => error!("accept error: {}", e),
            }
        }
    }
}

/// Build a TLS acceptor pinned to TLS 1.2 and newer.
fn build_acceptor(tls: &TlsConfig) -> Result<TlsAcceptor, ServerError> {
    let cert = std::fs::read(&tls.certfile)?;
    let key = std::fs::read(&tls.keyfile)?;
    let identity = Identity::from_pkcs8(&cert, &key)?;
    let acceptor = native_tls::TlsAcceptor::builder(identity)
        .min_protocol_version(Some(Protocol::Tlsv12))
        .build()?;
    Ok(acceptor.into())
}

/// Handshake one connection and hand it to a session.
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    acceptor: Option<Arc<TlsAcceptor>>,
    coord: Coordinators,
) {
    match acceptor {
        Some(acceptor) => {
            let tls_stream = match acceptor.accept(stream).await {
                Ok(s) => s,
                Err(e) => {
                    warn!("TLS handshake failed for {}: {}", addr, e);
                    return;
                }
            };
            match accept_async(tls_stream).await {
                Ok(ws) => session::run(ws, coord).await,
                Err(e) => warn!("WebSocket handshake failed for {}: {}", addr, e),
            }
        }
        None => match accept_async(stream).await {
            Ok(ws) => session::run(ws, coord).await,
            Err(e) => warn!("WebSocket handshake failed for {}: {}", addr, e),
        },
    }
    debug!("connection from {} finished", addr);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(source: &str) -> Settings {
        use ::config::{Config, File, FileFormat};
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Ini))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_plaintext_config() {
        let config = ServerConfig::from_settings(&Settings::default()).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.tls.is_none());
    }

    #[test]
    fn test_tls_config() {
        let config = ServerConfig::from_settings(&settings(
            "[ssl]\nenable_ssl = true\ncertfile = cert.pem\nkeyfile = key.pem\n",
        ))
        .unwrap();
        assert_eq!(config.bind_addr.port(), 8443);
        let tls = config.tls.expect("tls enabled");
        assert_eq!(tls.certfile, "cert.pem");
        assert_eq!(tls.keyfile, "key.pem");
    }

    #[test]
    fn test_tls_without_material_is_rejected() {
        let result = ServerConfig::from_settings(&settings("[ssl]\nenable_ssl = true\n"));
        assert!(matches!(result, Err(ServerError::IncompleteTls)));
    }

    #[tokio::test]
    async fn test_server_binds() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            tls: None,
        };
        let server = Server::new(config);
        // The accept loop runs forever; give it a moment to bind cleanly.
        let run = tokio::time::timeout(std::time::Duration::from_millis(50), server.run());
        assert!(run.await.is_err(), "accept loop should still be running");
    }
}
