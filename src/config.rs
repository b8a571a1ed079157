//! Server Configuration
//!
//! Settings come from a plain INI file (`conf.ini` next to the working
//! directory by default). Everything has a fallback, so a missing file
//! yields a plaintext server on the default port.

use ::config::{Config, ConfigError, File, FileFormat};
use serde::Deserialize;

/// Default port for plaintext WebSocket.
pub const DEFAULT_PORT: u16 = 8080;

/// Default port when TLS is enabled.
pub const DEFAULT_TLS_PORT: u16 = 8443;

/// Parsed server settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `[ssl]` section.
    pub ssl: SslSettings,
    /// `[server]` section.
    pub server: ServerSettings,
}

/// The `[ssl]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SslSettings {
    /// Terminate TLS in-process.
    pub enable_ssl: bool,
    /// PEM certificate chain path.
    pub certfile: String,
    /// PEM private key path.
    pub keyfile: String,
}

/// The `[server]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen port; defaults by TLS mode when absent.
    pub port: Option<u16>,
}

impl Settings {
    /// Load settings from an INI file. A missing file is not an error:
    /// every setting falls back to its default.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::new(path, FileFormat::Ini).required(false))
            .build()?
            .try_deserialize()
    }

    /// The effective listen port: the configured one, else 8443 with TLS
    /// enabled, else 8080.
    pub fn port(&self) -> u16 {
        self.server.port.unwrap_or(if self.ssl.enable_ssl {
            DEFAULT_TLS_PORT
        } else {
            DEFAULT_PORT
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_ini(source: &str) -> Settings {
        Config::builder()
            .add_source(File::from_str(source, FileFormat::Ini))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_without_file() {
        let settings = Settings::load("does-not-exist.ini").unwrap();
        assert!(!settings.ssl.enable_ssl);
        assert_eq!(settings.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_full_file() {
        let settings = from_ini(
            "[ssl]\n\
             enable_ssl = true\n\
             certfile = /etc/rps/cert.pem\n\
             keyfile = /etc/rps/key.pem\n\
             [server]\n\
             port = 9000\n",
        );
        assert!(settings.ssl.enable_ssl);
        assert_eq!(settings.ssl.certfile, "/etc/rps/cert.pem");
        assert_eq!(settings.ssl.keyfile, "/etc/rps/key.pem");
        assert_eq!(settings.port(), 9000);
    }

    #[test]
    fn test_tls_changes_default_port() {
        let settings = from_ini("[ssl]\nenable_ssl = true\n");
        assert_eq!(settings.port(), DEFAULT_TLS_PORT);

        let settings = from_ini("[ssl]\nenable_ssl = false\n");
        assert_eq!(settings.port(), DEFAULT_PORT);
    }

    #[test]
    fn test_explicit_port_wins() {
        let settings = from_ini("[ssl]\nenable_ssl = true\n[server]\nport = 8080\n");
        assert_eq!(settings.port(), 8080);
    }
}
