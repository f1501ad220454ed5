use std::fs::File;
use std::io::{self, BufReader, ErrorKind};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chrono::FixedOffset;
use pgwire::tokio::tokio_rustls::rustls::ServerConfig;
use pgwire::tokio::TlsAcceptor;

use crate::engine::{Clock, EngineSettings};

/// Server settings, read from `STAYDESK_*` environment variables
/// (and a `.env` file when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub password: String,
    pub max_connections: usize,
    pub compact_threshold: u64,
    pub tls_cert: Option<String>,
    pub tls_key: Option<String>,
    pub metrics_port: Option<u16>,
    /// Login names granted the admin role.
    pub admins: Vec<String>,
    /// Calling code assumed for phone numbers typed without one.
    pub country_code: String,
    /// The villa's offset from UTC, for deciding what "today" is.
    pub utc_offset_minutes: i32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5433,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            password: "staydesk".into(),
            max_connections: 256,
            compact_threshold: 10_000,
            tls_cert: None,
            tls_key: None,
            metrics_port: None,
            admins: vec!["admin".into()],
            country_code: "91".into(),
            utc_offset_minutes: 330,
        }
    }
}

fn parse_env<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    get(key).and_then(|s| s.trim().parse().ok())
}

impl Config {
    pub fn from_env() -> io::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparseable numbers keep their default.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> io::Result<Self> {
        let defaults = Self::default();

        let admins = match get("STAYDESK_ADMINS") {
            Some(list) => list
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect(),
            None => defaults.admins,
        };

        let config = Self {
            port: parse_env(&get, "STAYDESK_PORT").unwrap_or(defaults.port),
            bind: get("STAYDESK_BIND").unwrap_or(defaults.bind),
            data_dir: get("STAYDESK_DATA_DIR").map(PathBuf::from).unwrap_or(defaults.data_dir),
            password: get("STAYDESK_PASSWORD").unwrap_or(defaults.password),
            max_connections: parse_env(&get, "STAYDESK_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            compact_threshold: parse_env(&get, "STAYDESK_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            tls_cert: get("STAYDESK_TLS_CERT"),
            tls_key: get("STAYDESK_TLS_KEY"),
            metrics_port: parse_env(&get, "STAYDESK_METRICS_PORT"),
            admins,
            country_code: get("STAYDESK_COUNTRY_CODE")
                .map(|c| c.trim().trim_start_matches('+').to_string())
                .unwrap_or(defaults.country_code),
            utc_offset_minutes: parse_env(&get, "STAYDESK_UTC_OFFSET_MINUTES")
                .unwrap_or(defaults.utc_offset_minutes),
        };

        if config.country_code.is_empty() || !config.country_code.chars().all(|c| c.is_ascii_digit()) {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                format!("STAYDESK_COUNTRY_CODE must be digits, got {:?}", config.country_code),
            ));
        }
        config.utc_offset()?;
        Ok(config)
    }

    pub fn utc_offset(&self) -> io::Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            io::Error::new(
                ErrorKind::InvalidInput,
                format!("STAYDESK_UTC_OFFSET_MINUTES out of range: {}", self.utc_offset_minutes),
            )
        })
    }

    pub fn engine_settings(&self) -> io::Result<EngineSettings> {
        Ok(EngineSettings {
            country_code: self.country_code.clone(),
            clock: Clock::System {
                offset: self.utc_offset()?,
            },
            compact_threshold: self.compact_threshold,
        })
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// `None` when neither cert nor key is configured.
    pub fn tls_acceptor(&self) -> io::Result<Option<TlsAcceptor>> {
        let (cert_path, key_path) = match (self.tls_cert.as_deref(), self.tls_key.as_deref()) {
            (None, None) => return Ok(None),
            (Some(c), Some(k)) => (c, k),
            _ => {
                return Err(io::Error::new(
                    ErrorKind::InvalidInput,
                    "both STAYDESK_TLS_CERT and STAYDESK_TLS_KEY must be set, or neither",
                ));
            }
        };

        let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(File::open(cert_path)?))
            .collect::<Result<_, _>>()?;

        let key = rustls_pemfile::private_key(&mut BufReader::new(File::open(key_path)?))?
            .ok_or_else(|| io::Error::new(ErrorKind::InvalidInput, "no private key found in key file"))?;

        let mut config = ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;

        config.alpn_protocols = vec![b"postgresql".to_vec()];

        Ok(Some(TlsAcceptor::from(Arc::new(config))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_unset() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 5433);
        assert_eq!(config.listen_addr(), "0.0.0.0:5433");
        assert_eq!(config.admins, vec!["admin".to_string()]);
        assert_eq!(config.country_code, "91");
        assert!(config.metrics_port.is_none());
        assert!(config.tls_acceptor().unwrap().is_none());
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("STAYDESK_PORT", "6543"),
            ("STAYDESK_ADMINS", "owner, manager ,"),
            ("STAYDESK_COUNTRY_CODE", "+44"),
            ("STAYDESK_UTC_OFFSET_MINUTES", "-300"),
            ("STAYDESK_METRICS_PORT", "9100"),
            ("STAYDESK_MAX_CONNECTIONS", "not-a-number"),
        ]))
        .unwrap();
        assert_eq!(config.port, 6543);
        assert_eq!(config.admins, vec!["owner".to_string(), "manager".to_string()]);
        assert_eq!(config.country_code, "44");
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -300 * 60);
        assert_eq!(config.metrics_port, Some(9100));
        assert_eq!(config.max_connections, 256);
        assert_eq!(config.compact_threshold, 10_000);

        let settings = config.engine_settings().unwrap();
        assert_eq!(settings.country_code, "44");
    }

    #[test]
    fn parses_each_numeric_width() {
        let config = Config::from_lookup(lookup(&[
            ("STAYDESK_PORT", "7000"),
            ("STAYDESK_MAX_CONNECTIONS", " 32 "),
            ("STAYDESK_COMPACT_THRESHOLD", "50000"),
            ("STAYDESK_UTC_OFFSET_MINUTES", "60"),
        ]))
        .unwrap();
        assert_eq!(config.port, 7000);
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.compact_threshold, 50_000);
        assert_eq!(config.utc_offset_minutes, 60);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::from_lookup(lookup(&[("STAYDESK_COUNTRY_CODE", "IN")])).is_err());
        assert!(Config::from_lookup(lookup(&[("STAYDESK_UTC_OFFSET_MINUTES", "100000")])).is_err());
    }

    #[test]
    fn tls_needs_both_files() {
        let config = Config::from_lookup(lookup(&[("STAYDESK_TLS_CERT", "/tmp/cert.pem")])).unwrap();
        let err = config.tls_acceptor().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }
}
