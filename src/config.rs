use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("read config file {path:?} failed, {err}")]
    Read { path: PathBuf, err: std::io::Error },
    #[error("parse config file {path:?} failed, {err}")]
    Parse {
        path: PathBuf,
        err: serde_yaml::Error,
    },
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("refresh_interval must be greater than 0")]
    ZeroRefreshInterval,
    #[error("serf.timeout must be greater than 0")]
    ZeroTimeout,
    #[error("output must not be empty")]
    EmptyOutput,
}

/// How to reach the Serf agent.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SerfConfig {
    /// Path or name of the `serf` executable.
    pub binary: PathBuf,

    /// RPC auth token, passed as `-rpc-auth` when set.
    pub rpc_auth: Option<String>,

    /// Seconds to wait for the RPC port to accept a connection, and for
    /// `serf members` to finish.
    pub timeout: u64,
}

impl Default for SerfConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("serf"),
            rpc_auth: None,
            timeout: 10,
        }
    }
}

/// Configuration of the whole process, loaded once at startup.
///
/// ```yaml
/// address: localhost:7373
/// refresh_interval: 30
/// output: /etc/prometheus/serf_sd.json
/// serf:
///   binary: /usr/local/bin/serf
///   rpc_auth: secret
/// ```
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// The address that Serf is listening on for RPC requests.
    pub address: String,

    /// Seconds between two polls.
    pub refresh_interval: u64,

    pub tag_separator: String,

    /// The file_sd compatible file to write.
    pub output: PathBuf,

    /// Prefix of the group keys in the output file.
    pub name: String,

    pub serf: SerfConfig,
}

impl Default for Config {
    fn default() -> Self {
        let discovery = discovery::Config::default();

        Self {
            address: discovery.address,
            refresh_interval: discovery.refresh_interval.as_secs(),
            tag_separator: discovery.tag_separator,
            output: PathBuf::from("custom_sd.json"),
            name: "serfSD".to_string(),
            serf: SerfConfig::default(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, Error> {
        let content = std::fs::read_to_string(path).map_err(|err| Error::Read {
            path: path.to_path_buf(),
            err,
        })?;

        serde_yaml::from_str(&content).map_err(|err| Error::Parse {
            path: path.to_path_buf(),
            err,
        })
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.address.is_empty() {
            return Err(Error::EmptyAddress);
        }
        if self.refresh_interval == 0 {
            return Err(Error::ZeroRefreshInterval);
        }
        if self.serf.timeout == 0 {
            return Err(Error::ZeroTimeout);
        }
        if self.output.as_os_str().is_empty() {
            return Err(Error::EmptyOutput);
        }

        Ok(())
    }

    pub fn discovery(&self) -> discovery::Config {
        discovery::Config {
            address: self.address.clone(),
            refresh_interval: Duration::from_secs(self.refresh_interval),
            tag_separator: self.tag_separator.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = serde_yaml::from_str::<Config>("{}").unwrap();

        assert_eq!(config, Config::default());
        assert_eq!(config.address, "localhost:7373");
        assert_eq!(config.refresh_interval, 30);
        assert_eq!(config.tag_separator, ",");
        assert_eq!(config.output, PathBuf::from("custom_sd.json"));
        assert_eq!(config.serf.binary, PathBuf::from("serf"));
        config.validate().unwrap();
    }

    #[test]
    fn deserialize() {
        let input = r#"
address: 10.0.0.1:7373
refresh_interval: 5
output: /tmp/serf.json
serf:
  rpc_auth: secret
"#;
        let config = serde_yaml::from_str::<Config>(input).unwrap();

        assert_eq!(config.address, "10.0.0.1:7373");
        assert_eq!(config.output, PathBuf::from("/tmp/serf.json"));
        assert_eq!(config.serf.rpc_auth.as_deref(), Some("secret"));
        assert_eq!(config.serf.timeout, 10);

        let discovery = config.discovery();
        assert_eq!(discovery.refresh_interval, Duration::from_secs(5));
        assert_eq!(discovery.tag_separator, ",");
    }

    #[test]
    fn unknown_field() {
        assert!(serde_yaml::from_str::<Config>("listen_address: localhost:7373").is_err());
        assert!(serde_yaml::from_str::<Config>("serf:\n  auth: x").is_err());
    }

    #[test]
    fn validate() {
        for (config, want) in [
            (
                Config {
                    address: String::new(),
                    ..Default::default()
                },
                "address must not be empty",
            ),
            (
                Config {
                    refresh_interval: 0,
                    ..Default::default()
                },
                "refresh_interval must be greater than 0",
            ),
            (
                Config {
                    serf: SerfConfig {
                        timeout: 0,
                        ..Default::default()
                    },
                    ..Default::default()
                },
                "serf.timeout must be greater than 0",
            ),
            (
                Config {
                    output: PathBuf::new(),
                    ..Default::default()
                },
                "output must not be empty",
            ),
        ] {
            assert_eq!(config.validate().unwrap_err().to_string(), want);
        }
    }

    #[test]
    fn load_missing_file() {
        let path = testify::temp::temp_file();
        let err = Config::load(&path).unwrap_err();

        assert!(matches!(err, Error::Read { .. }));
    }

    #[test]
    fn load() {
        let path = testify::temp::temp_file();
        std::fs::write(&path, "refresh_interval: 60\nname: serf\n").unwrap();

        let config = Config::load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.refresh_interval, 60);
        assert_eq!(config.name, "serf");
    }
}
