use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

const ENV_PREFIX: &str = "SERVITOR_";
const DEFAULT_BIND: &str = "0.0.0.0:5000";

/// Typed configuration, read from `SERVITOR_*` environment variables.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_bot_token: String,

    /// Public base URL of the HTTP endpoint, always ending in `/`.
    pub public_host: String,
    pub http_bind: SocketAddr,

    /// Google client-secret JSON downloaded from the cloud console.
    pub client_secret_path: PathBuf,

    /// Snapshot file for the session store. In-memory when unset.
    pub store_path: Option<PathBuf>,
    pub tx_max_attempts: u32,
    pub exchange_timeout: Duration,

    pub log_json: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (keys are passed without the
    /// `SERVITOR_` prefix).
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let telegram_bot_token = vars.required("TOKEN")?;
        let public_host = normalize_host(&vars.required("HOST")?)?;

        let client_secret_path = PathBuf::from(vars.required("CLIENT_SECRET")?);
        if !client_secret_path.is_file() {
            return Err(Error::InvalidPath {
                path: client_secret_path,
                reason: "client secret file does not exist".to_string(),
            });
        }

        let bind = vars.str("BIND").and_then(non_empty);
        let http_bind = bind
            .as_deref()
            .unwrap_or(DEFAULT_BIND)
            .parse::<SocketAddr>()
            .map_err(|e| Error::Config(format!("{ENV_PREFIX}BIND is not a socket address: {e}")))?;

        let store_path = vars.str("STORE_PATH").and_then(non_empty).map(PathBuf::from);
        let tx_max_attempts = vars.u32("TX_MAX_ATTEMPTS").unwrap_or(5).max(1);
        let exchange_timeout =
            Duration::from_millis(vars.u64("EXCHANGE_TIMEOUT_MS").unwrap_or(10_000).max(1));
        let log_json = vars.bool("LOG_JSON").unwrap_or(false);

        Ok(Self {
            telegram_bot_token,
            public_host,
            http_bind,
            client_secret_path,
            store_path,
            tx_max_attempts,
            exchange_timeout,
            log_json,
        })
    }

    /// Callback route as seen from the outside.
    pub fn callback_url(&self) -> String {
        format!("{}auth/google", self.public_host)
    }

    /// Push-notification route as seen from the outside.
    pub fn notification_url(&self) -> String {
        format!("{}notification", self.public_host)
    }
}

struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn str(&self, key: &str) -> Option<String> {
        (self.0)(&format!("{ENV_PREFIX}{key}"))
    }

    fn required(&self, key: &str) -> Result<String> {
        self.str(key).and_then(non_empty).ok_or_else(|| {
            Error::Config(format!(
                "{ENV_PREFIX}{key} environment variable is required"
            ))
        })
    }

    fn bool(&self, key: &str) -> Option<bool> {
        self.str(key).map(|s| {
            matches!(
                s.trim().to_lowercase().as_str(),
                "1" | "true" | "yes" | "on"
            )
        })
    }

    fn u64(&self, key: &str) -> Option<u64> {
        self.str(key).and_then(|s| s.trim().parse::<u64>().ok())
    }

    fn u32(&self, key: &str) -> Option<u32> {
        self.str(key).and_then(|s| s.trim().parse::<u32>().ok())
    }
}

fn normalize_host(raw: &str) -> Result<String> {
    let host = raw.trim();
    if !(host.starts_with("https://") || host.starts_with("http://")) {
        return Err(Error::Config(format!(
            "{ENV_PREFIX}HOST must be an http(s) URL, got {host:?}"
        )));
    }
    if host.ends_with('/') {
        Ok(host.to_string())
    } else {
        Ok(format!("{host}/"))
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn secret_file() -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "servitor-config-{}-{ts}.json",
            std::process::id()
        ));
        fs::write(&path, "{}").unwrap();
        path
    }

    fn load(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply_and_host_gets_trailing_slash() {
        let secret = secret_file();
        let cfg = load(&[
            ("TOKEN", "123:abc"),
            ("HOST", "https://bot.example.com"),
            ("CLIENT_SECRET", secret.to_str().unwrap()),
        ])
        .unwrap();

        assert_eq!(cfg.public_host, "https://bot.example.com/");
        assert_eq!(cfg.callback_url(), "https://bot.example.com/auth/google");
        assert_eq!(cfg.notification_url(), "https://bot.example.com/notification");
        assert_eq!(cfg.http_bind.port(), 5000);
        assert_eq!(cfg.tx_max_attempts, 5);
        assert_eq!(cfg.exchange_timeout, Duration::from_secs(10));
        assert!(cfg.store_path.is_none());
        assert!(!cfg.log_json);
        let _ = fs::remove_file(secret);
    }

    #[test]
    fn overrides_are_parsed() {
        let secret = secret_file();
        let cfg = load(&[
            ("TOKEN", "123:abc"),
            ("HOST", "http://localhost:8080/"),
            ("CLIENT_SECRET", secret.to_str().unwrap()),
            ("BIND", "127.0.0.1:9000"),
            ("STORE_PATH", "/var/lib/servitor/sessions.json"),
            ("TX_MAX_ATTEMPTS", "0"),
            ("EXCHANGE_TIMEOUT_MS", "2500"),
            ("LOG_JSON", "yes"),
        ])
        .unwrap();

        assert_eq!(cfg.public_host, "http://localhost:8080/");
        assert_eq!(cfg.http_bind.to_string(), "127.0.0.1:9000");
        assert_eq!(
            cfg.store_path.as_deref(),
            Some(Path::new("/var/lib/servitor/sessions.json"))
        );
        assert_eq!(cfg.tx_max_attempts, 1);
        assert_eq!(cfg.exchange_timeout, Duration::from_millis(2500));
        assert!(cfg.log_json);
        let _ = fs::remove_file(secret);
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = load(&[("HOST", "https://x.test")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("SERVITOR_TOKEN")));
    }

    #[test]
    fn host_without_scheme_is_rejected() {
        let err = load(&[("TOKEN", "t"), ("HOST", "bot.example.com")]).unwrap_err();
        assert!(matches!(err, Error::Config(ref m) if m.contains("SERVITOR_HOST")));
    }

    #[test]
    fn missing_client_secret_file_is_invalid_path() {
        let err = load(&[
            ("TOKEN", "t"),
            ("HOST", "https://x.test"),
            ("CLIENT_SECRET", "/nonexistent/servitor/client_secret.json"),
        ])
        .unwrap_err();
        assert!(matches!(err, Error::InvalidPath { .. }));
    }
}
