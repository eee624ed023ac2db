use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::Member;

/// The label holding the `host:port` a target is scraped on.
pub const ADDRESS_LABEL: &str = "__address__";

pub type LabelSet = BTreeMap<String, String>;

/// TargetGroup is a set of targets with common labels
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Eq, Serialize)]
pub struct TargetGroup {
    /// An identifier that describes a group of targets, consumers merge
    /// updates by it.
    pub source: String,

    /// `labels` is a set of labels that is common across all targets in the group
    #[serde(default)]
    pub labels: LabelSet,

    /// `targets` is a list of targets identified by a label set. Each target
    /// is uniquely identifiable in the group by its `__address__` label
    #[serde(default)]
    pub targets: Vec<LabelSet>,
}

impl TargetGroup {
    /// A group announcing that `source` is gone.
    pub fn tombstone(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            labels: LabelSet::new(),
            targets: Vec::new(),
        }
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.targets.is_empty()
    }

    /// Address label of every target, targets without one are skipped.
    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.targets
            .iter()
            .filter_map(|target| target.get(ADDRESS_LABEL).map(String::as_str))
    }
}

impl From<&Member> for TargetGroup {
    /// One member is one group with a single target. Group labels stay empty
    /// until tags get expanded into labels.
    ///
    /// Neither the host nor the port is validated, the membership service is
    /// trusted to report reachable addresses.
    fn from(member: &Member) -> Self {
        let address = member.target();

        let mut target = LabelSet::new();
        target.insert(ADDRESS_LABEL.to_string(), address.clone());

        Self {
            source: address,
            labels: LabelSet::new(),
            targets: vec![target],
        }
    }
}

/// Combines host and port into `host:port`, IPv6 hosts are wrapped in
/// brackets, e.g. `[::1]:7946`.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
