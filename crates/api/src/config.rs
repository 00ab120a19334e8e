use std::path::PathBuf;

use romshelf_core::delivery::DeliveryMode;
use romshelf_core::layout::{LibraryLayout, LibraryStructure};

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// All fields except the JWT secret have defaults suitable for a container
/// deployment behind nginx. Override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `600`). Uploads and local
    /// archive downloads run inside this window.
    pub request_timeout_secs: u64,
    /// Graceful shutdown timeout in seconds (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// JWT token configuration (secret, expiry).
    pub jwt: JwtConfig,
    /// Root of the rom library (default: `/romm/library`).
    pub library_base_path: PathBuf,
    /// Root of per-rom resources such as manuals (default: `/romm/resources`).
    pub resources_base_path: PathBuf,
    /// Platform folder convention inside the library.
    pub library_structure: LibraryStructure,
    /// Whether downloads are served in-process or handed to the proxy.
    pub delivery_mode: DeliveryMode,
    /// Serve download endpoints without a token.
    pub disable_download_auth: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                          | Default                    |
    /// |----------------------------------|----------------------------|
    /// | `HOST`                           | `0.0.0.0`                  |
    /// | `PORT`                           | `3000`                     |
    /// | `CORS_ORIGINS`                   | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`           | `600`                      |
    /// | `SHUTDOWN_TIMEOUT_SECS`          | `30`                       |
    /// | `LIBRARY_BASE_PATH`              | `/romm/library`            |
    /// | `RESOURCES_BASE_PATH`            | `/romm/resources`          |
    /// | `LIBRARY_STRUCTURE`              | `a`                        |
    /// | `DELIVERY_MODE`                  | `proxied` (`local` if `DEV_MODE=true`) |
    /// | `DISABLE_DOWNLOAD_ENDPOINT_AUTH` | `false`                    |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let library_base_path = std::env::var("LIBRARY_BASE_PATH")
            .unwrap_or_else(|_| "/romm/library".into())
            .into();

        let resources_base_path = std::env::var("RESOURCES_BASE_PATH")
            .unwrap_or_else(|_| "/romm/resources".into())
            .into();

        let library_structure: LibraryStructure = std::env::var("LIBRARY_STRUCTURE")
            .unwrap_or_else(|_| "a".into())
            .parse()
            .expect("LIBRARY_STRUCTURE must be 'a' or 'b'");

        let dev_mode = env_flag("DEV_MODE");
        let delivery_mode: DeliveryMode = match std::env::var("DELIVERY_MODE") {
            Ok(value) => value
                .parse()
                .expect("DELIVERY_MODE must be 'local' or 'proxied'"),
            Err(_) if dev_mode => DeliveryMode::Local,
            Err(_) => DeliveryMode::Proxied,
        };

        let disable_download_auth = env_flag("DISABLE_DOWNLOAD_ENDPOINT_AUTH");

        let jwt = JwtConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            jwt,
            library_base_path,
            resources_base_path,
            library_structure,
            delivery_mode,
            disable_download_auth,
        }
    }

    /// Filesystem layout described by this configuration.
    pub fn layout(&self) -> LibraryLayout {
        LibraryLayout::new(
            &self.library_base_path,
            &self.resources_base_path,
            self.library_structure,
        )
    }
}

/// `true` for `1`, `true` or `yes` (any case).
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
