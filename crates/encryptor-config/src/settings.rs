//! Process-wide settings, loaded once from the environment at startup.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, ConfigResult};

const PREFIX: &str = "APP_";

/// Immutable settings resolved from the environment at process entry.
///
/// Built once in `main` before any socket is opened and passed by reference
/// (or behind an `Arc`) to every component that needs it; nothing in the
/// daemon or API re-reads the environment after startup.
#[derive(Clone)]
pub struct Settings {
    /// Raw PSK encryption key material (hex or base64), consumed once to
    /// build a `PskVault` and otherwise never touched again.
    pub psk_encryption_key: String,
    /// Raw HMAC token signing key.
    pub token_signing_key: String,

    /// Config Store connection string.
    pub database_url: String,
    /// UNIX domain socket path the daemon listens on and the API connects to.
    pub daemon_socket_path: PathBuf,
    /// TLS certificate path (consumed by the external HTTP collaborator).
    pub tls_cert_path: PathBuf,
    /// TLS private key path (consumed by the external HTTP collaborator).
    pub tls_key_path: PathBuf,
    /// Directory holding `boot-start`/`boot-complete` timing files.
    pub boot_timing_dir: PathBuf,
    /// Directory strongSwan connection/secret files are written to.
    pub swanctl_conf_dir: PathBuf,
    /// Root directory for persisted per-namespace network config stanzas
    /// (`<dir>/<namespace>/network/<device>`), replayed at daemon startup.
    pub netns_config_dir: PathBuf,
    /// Path to the persistent `mode=static`/`mode=dhcp` network mode flag file.
    pub network_mode_flag_path: PathBuf,

    /// Tunnel telemetry poll interval.
    pub tunnel_poll_interval: Duration,
    /// Interface telemetry poll interval.
    pub interface_poll_interval: Duration,

    /// Access token lifetime, seconds.
    pub access_token_ttl_secs: i64,
    /// Refresh token lifetime, seconds.
    pub refresh_token_ttl_secs: i64,

    /// `RUST_LOG`-style logging directive string (§10).
    pub log_directive: String,
}

impl Settings {
    /// Resolve settings from `APP_`-prefixed environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingRequired`] if either secret key is
    /// absent, or [`ConfigError::InvalidValue`] if an optional numeric
    /// value is set but does not parse.
    pub fn from_env() -> ConfigResult<Self> {
        Ok(Self {
            psk_encryption_key: require_string("PSK_ENCRYPTION_KEY")?,
            token_signing_key: require_string("TOKEN_SIGNING_KEY")?,

            database_url: optional_string(
                "DATABASE_URL",
                "surrealkv:///var/lib/encryptor-sim/config.kv",
            ),
            daemon_socket_path: optional_path(
                "DAEMON_SOCKET_PATH",
                "/run/encryptor-sim/daemon.sock",
            ),
            tls_cert_path: optional_path(
                "TLS_CERT_PATH",
                "/etc/encryptor-sim/tls/cert.pem",
            ),
            tls_key_path: optional_path("TLS_KEY_PATH", "/etc/encryptor-sim/tls/key.pem"),
            boot_timing_dir: optional_path("BOOT_TIMING_DIR", "/run/encryptor-sim"),
            swanctl_conf_dir: optional_path("SWANCTL_CONF_DIR", "/etc/swanctl/conf.d"),
            netns_config_dir: optional_path("NETNS_CONFIG_DIR", "/etc/netns"),
            network_mode_flag_path: optional_path(
                "NETWORK_MODE_FLAG_PATH",
                "/etc/encryptor-sim/network-config",
            ),

            tunnel_poll_interval: Duration::from_millis(optional_u64(
                "TUNNEL_POLL_INTERVAL_MS",
                500,
            )?),
            interface_poll_interval: Duration::from_millis(optional_u64(
                "INTERFACE_POLL_INTERVAL_MS",
                2000,
            )?),

            access_token_ttl_secs: optional_i64("ACCESS_TOKEN_TTL_SECS", 900)?,
            refresh_token_ttl_secs: optional_i64("REFRESH_TOKEN_TTL_SECS", 86_400)?,

            log_directive: optional_string("LOG", "info"),
        })
    }
}

impl fmt::Debug for Settings {
    /// Every secret field is redacted; nothing derived from `psk_encryption_key`
    /// or `token_signing_key` should ever reach a log line (§10).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("psk_encryption_key", &"<redacted>")
            .field("token_signing_key", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("daemon_socket_path", &self.daemon_socket_path)
            .field("tls_cert_path", &self.tls_cert_path)
            .field("tls_key_path", &self.tls_key_path)
            .field("boot_timing_dir", &self.boot_timing_dir)
            .field("swanctl_conf_dir", &self.swanctl_conf_dir)
            .field("netns_config_dir", &self.netns_config_dir)
            .field("network_mode_flag_path", &self.network_mode_flag_path)
            .field("tunnel_poll_interval", &self.tunnel_poll_interval)
            .field("interface_poll_interval", &self.interface_poll_interval)
            .field("access_token_ttl_secs", &self.access_token_ttl_secs)
            .field("refresh_token_ttl_secs", &self.refresh_token_ttl_secs)
            .field("log_directive", &self.log_directive)
            .finish()
    }
}

fn var_name(suffix: &'static str) -> String {
    format!("{PREFIX}{suffix}")
}

fn require_string(suffix: &'static str) -> ConfigResult<String> {
    std::env::var(var_name(suffix)).map_err(|_| ConfigError::MissingRequired(suffix))
}

fn optional_string(suffix: &'static str, default: &str) -> String {
    std::env::var(var_name(suffix)).unwrap_or_else(|_| default.to_string())
}

fn optional_path(suffix: &'static str, default: &str) -> PathBuf {
    PathBuf::from(optional_string(suffix, default))
}

fn optional_u64(suffix: &'static str, default: u64) -> ConfigResult<u64> {
    match std::env::var(var_name(suffix)) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: suffix,
            reason: format!("expected a non-negative integer, got {raw:?}"),
        }),
    }
}

fn optional_i64(suffix: &'static str, default: i64) -> ConfigResult<i64> {
    match std::env::var(var_name(suffix)) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: suffix,
            reason: format!("expected an integer, got {raw:?}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_app_env() {
        for (key, _) in std::env::vars() {
            if key.starts_with(PREFIX) {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_app_env();
        assert!(matches!(
            Settings::from_env(),
            Err(ConfigError::MissingRequired("PSK_ENCRYPTION_KEY"))
        ));
    }

    #[test]
    fn optional_values_default_when_unset() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_app_env();
        std::env::set_var("APP_PSK_ENCRYPTION_KEY", "k".repeat(64));
        std::env::set_var("APP_TOKEN_SIGNING_KEY", "signing-key");

        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.access_token_ttl_secs, 900);
        assert_eq!(settings.tunnel_poll_interval, Duration::from_millis(500));
        assert_eq!(
            settings.daemon_socket_path,
            PathBuf::from("/run/encryptor-sim/daemon.sock")
        );
        clear_app_env();
    }

    #[test]
    fn debug_impl_redacts_secrets() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_app_env();
        std::env::set_var("APP_PSK_ENCRYPTION_KEY", "super-secret-key-material");
        std::env::set_var("APP_TOKEN_SIGNING_KEY", "another-secret");

        let settings = Settings::from_env().unwrap();
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("super-secret-key-material"));
        assert!(!rendered.contains("another-secret"));
        assert!(rendered.contains("<redacted>"));
        clear_app_env();
    }

    #[test]
    fn invalid_numeric_override_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_app_env();
        std::env::set_var("APP_PSK_ENCRYPTION_KEY", "k".repeat(64));
        std::env::set_var("APP_TOKEN_SIGNING_KEY", "signing-key");
        std::env::set_var("APP_TUNNEL_POLL_INTERVAL_MS", "not-a-number");

        assert!(matches!(
            Settings::from_env(),
            Err(ConfigError::InvalidValue {
                name: "TUNNEL_POLL_INTERVAL_MS",
                ..
            })
        ));
        clear_app_env();
    }
}
