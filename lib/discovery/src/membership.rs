use std::collections::BTreeMap;

use crate::join_host_port;

/// Member is one participant of the cluster, as reported by the membership
/// service for a single poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    /// Host part of the member's address, usually an IP.
    pub address: String,
    pub port: u16,
    pub tags: BTreeMap<String, String>,
    /// Liveness as reported by the service, e.g. `alive`, `failed` or `left`.
    pub status: String,
}

impl Member {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
            ..Default::default()
        }
    }

    /// The `host:port` this member is reachable on.
    #[inline]
    pub fn target(&self) -> String {
        join_host_port(&self.address, self.port)
    }
}

/// Connector establishes a fresh client to the membership service. It is
/// called once per poll, clients are never reused across polls.
#[async_trait::async_trait]
pub trait Connector: Send + Sync {
    type Client: MembershipClient;

    async fn connect(&self, address: &str) -> crate::Result<Self::Client>;
}

#[async_trait::async_trait]
pub trait MembershipClient: Send + Sync {
    /// Lists all members currently known to the service.
    async fn members(&self) -> crate::Result<Vec<Member>>;
}
