//! Membership of a Serf cluster, listed with the `serf` command line tool.
//!
//! The RPC protocol itself is left to `serf`, this module only checks that
//! the agent is reachable and decodes the output of
//! `serf members -format=json`.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use discovery::{Connector, Member, MembershipClient};
use serde::Deserialize;
use tokio::net::TcpStream;

use crate::config::SerfConfig;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("serf exited with {status}, {stderr}")]
    Exit { status: ExitStatus, stderr: String },
    #[error("serf members did not finish within {0:?}")]
    Timeout(Duration),
    #[error("decode members failed, {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct SerfMember {
    name: String,
    /// `ip:port`, brackets around IPv6 addresses
    addr: String,
    port: u16,
    tags: Option<BTreeMap<String, String>>,
    #[serde(default)]
    status: String,
}

#[derive(Deserialize)]
struct MemberList {
    members: Option<Vec<SerfMember>>,
}

/// Host part of `addr`. Whatever cannot be split is taken as the host.
fn split_host(addr: &str) -> String {
    if let Ok(addr) = addr.parse::<SocketAddr>() {
        return addr.ip().to_string();
    }

    match addr.rsplit_once(':') {
        Some((host, port)) if port.parse::<u16>().is_ok() => host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string(),
        _ => addr.to_string(),
    }
}

fn decode_members(data: &[u8]) -> Result<Vec<Member>, Error> {
    let list = serde_json::from_slice::<MemberList>(data)?;

    Ok(list
        .members
        .unwrap_or_default()
        .into_iter()
        .map(|member| Member {
            name: member.name,
            address: split_host(&member.addr),
            port: member.port,
            tags: member.tags.unwrap_or_default(),
            status: member.status,
        })
        .collect())
}

#[derive(Clone, Debug)]
pub struct SerfConnector {
    binary: PathBuf,
    rpc_auth: Option<String>,
    timeout: Duration,
}

impl SerfConnector {
    pub fn new(config: &SerfConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            rpc_auth: config.rpc_auth.clone(),
            timeout: Duration::from_secs(config.timeout),
        }
    }
}

#[async_trait::async_trait]
impl Connector for SerfConnector {
    type Client = SerfClient;

    async fn connect(&self, address: &str) -> discovery::Result<SerfClient> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(address)).await {
            Ok(Ok(_conn)) => {}
            Ok(Err(err)) => return Err(Error::Io(err).into()),
            Err(_) => return Err(Error::ConnectTimeout(self.timeout).into()),
        }

        Ok(SerfClient {
            binary: self.binary.clone(),
            address: address.to_string(),
            rpc_auth: self.rpc_auth.clone(),
            timeout: self.timeout,
        })
    }
}

pub struct SerfClient {
    binary: PathBuf,
    address: String,
    rpc_auth: Option<String>,
    timeout: Duration,
}

impl SerfClient {
    fn args(&self) -> Vec<String> {
        let mut args = vec![
            "members".to_string(),
            "-format=json".to_string(),
            format!("-rpc-addr={}", self.address),
        ];

        if let Some(token) = &self.rpc_auth {
            args.push(format!("-rpc-auth={token}"));
        }

        args
    }

    async fn list(&self) -> Result<Vec<Member>, Error> {
        let child = tokio::process::Command::new(&self.binary)
            .args(self.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::Timeout(self.timeout))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

            warn!(
                message = "serf exited with non-zero exit code",
                binary = ?self.binary,
                status = ?output.status,
                stderr,
            );

            return Err(Error::Exit {
                status: output.status,
                stderr,
            });
        }

        decode_members(&output.stdout)
    }
}

#[async_trait::async_trait]
impl MembershipClient for SerfClient {
    async fn members(&self) -> discovery::Result<Vec<Member>> {
        self.list().await.map_err(Into::into)
    }
}
