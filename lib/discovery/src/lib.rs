//! Periodic discovery of monitoring targets from a cluster membership service.
//!
//! A [`Discovery`] polls the membership service on a fixed cadence, turns every
//! member into a [`TargetGroup`] and emits the whole set as one batch. Sources
//! that disappeared since the previous successful poll are announced with a
//! tombstone, a group that has a `source` but no targets.

#[macro_use]
extern crate tracing;

mod handoff;
mod membership;
mod reconcile;
mod sink;
mod target_group;

use std::time::Duration;

pub use handoff::{Batches, Closed, Emitter, handoff};
pub use membership::{Connector, Member, MembershipClient};
pub use reconcile::{Discovery, PollError, SourceSet, start};
pub use sink::{Sink, forward};
pub use target_group::{ADDRESS_LABEL, LabelSet, TargetGroup, join_host_port};
pub use tripwire::{Trigger, Tripwire};

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, Error>;

const fn default_refresh_interval() -> Duration {
    Duration::from_secs(30)
}

/// Settings of one discovery instance, fixed for its lifetime.
#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    /// Address of the membership service, `host:port`.
    pub address: String,

    /// How long to wait between two polls, and after a failed poll.
    pub refresh_interval: Duration,

    /// Reserved for expanding member tags into labels, the builder does
    /// not use it yet.
    pub tag_separator: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "localhost:7373".to_string(),
            refresh_interval: default_refresh_interval(),
            tag_separator: ",".to_string(),
        }
    }
}
