use std::collections::BTreeSet;
use std::time::Duration;

use tokio::time::{Instant, sleep, sleep_until};
use tripwire::{Trigger, Tripwire};

use crate::handoff::{Batches, Emitter, handoff};
use crate::{Config, Connector, MembershipClient, TargetGroup};

// roughly 30 years, the same far future tokio's `sleep` falls back to
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Why a poll produced no batch.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("connect to membership service {address} failed, {source}")]
    Connect {
        address: String,
        source: crate::Error,
    },
    #[error("list members failed, {0}")]
    Query(crate::Error),
}

/// The sources announced by the last successful poll.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSet(BTreeSet<String>);

impl SourceSet {
    pub fn contains(&self, source: &str) -> bool {
        self.0.contains(source)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// A tombstone for every known source which is missing in `current`.
    fn vanished(&self, current: &SourceSet) -> Vec<TargetGroup> {
        self.0
            .difference(&current.0)
            .map(TargetGroup::tombstone)
            .collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SourceSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Deadlines of the polling cadence. Deadlines missed by a slow cycle are
/// skipped instead of fired back to back. A period too large to add to an
/// `Instant` never fires.
struct Cadence {
    period: Duration,
    next: Instant,
}

impl Cadence {
    fn new(period: Duration, start: Instant) -> Self {
        Self {
            period,
            next: start
                .checked_add(period)
                .unwrap_or_else(|| start + FAR_FUTURE),
        }
    }

    fn next_deadline(&mut self, now: Instant) -> Instant {
        while self.next <= now {
            match self.next.checked_add(self.period) {
                Some(next) => self.next = next,
                None => {
                    self.next = now + FAR_FUTURE;
                    break;
                }
            }
        }

        self.next
    }
}

/// Discovery turns the members of a cluster into target groups, see
/// [`Discovery::run`] for the polling policy.
pub struct Discovery<C> {
    config: Config,
    connector: C,
    sources: SourceSet,
}

impl<C: Connector> Discovery<C> {
    pub fn new(config: Config, connector: C) -> crate::Result<Self> {
        if config.refresh_interval.is_zero() {
            return Err("refresh interval must be greater than zero".into());
        }

        Ok(Self {
            config,
            connector,
            sources: SourceSet::default(),
        })
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Connects, lists members and builds the batch for them. The batch holds
    /// one group per member, duplicated members included, followed by the
    /// tombstones of vanished sources.
    pub async fn poll(&self) -> Result<(Vec<TargetGroup>, SourceSet), PollError> {
        let address = self.config.address.as_str();

        // a new client for every poll, the connection is not trusted to
        // recover by itself
        let client = self
            .connector
            .connect(address)
            .await
            .map_err(|source| PollError::Connect {
                address: address.to_string(),
                source,
            })?;

        let members = client.members().await.map_err(PollError::Query)?;

        let mut batch = members.iter().map(TargetGroup::from).collect::<Vec<_>>();
        let current = batch
            .iter()
            .map(|group| group.source.clone())
            .collect::<SourceSet>();

        batch.extend(self.sources.vanished(&current));

        Ok((batch, current))
    }

    /// Polls immediately and then once per refresh interval, handing each
    /// batch to `output`. The next cycle does not start before the consumer
    /// has taken the batch, and the known sources are replaced only then.
    ///
    /// A failed poll emits nothing and keeps the known sources, the loop
    /// sleeps a full interval and then polls again. `shutdown` is checked
    /// between cycles and during that sleep, an in-flight poll or handoff is
    /// never interrupted. The loop also ends once the consumer is gone.
    pub async fn run(mut self, output: Emitter, mut shutdown: Tripwire) {
        let interval = self.config.refresh_interval;
        let mut cadence = Cadence::new(interval, Instant::now());

        loop {
            match self.poll().await {
                Ok((batch, current)) => {
                    debug!(
                        message = "membership polled",
                        groups = batch.len(),
                        sources = current.len(),
                    );

                    if output.emit(batch).await.is_err() {
                        warn!(message = "target group receiver closed, stop discovery");
                        break;
                    }

                    self.sources = current;
                }
                Err(err) => {
                    error!(message = "poll membership failed", %err, ?interval);

                    tokio::select! {
                        biased;

                        _ = &mut shutdown => break,
                        _ = sleep(interval) => continue,
                    }
                }
            }

            let deadline = cadence.next_deadline(Instant::now());
            tokio::select! {
                biased;

                _ = &mut shutdown => break,
                _ = sleep_until(deadline) => {}
            }
        }

        info!(message = "discovery stopped", address = self.config.address);
    }
}

/// Spawns a discovery on the current runtime.
///
/// Dropping the returned [`Trigger`] stops the discovery just like calling
/// `cancel` does, use `Trigger::disable` to let it run until the stream is
/// dropped.
pub fn start<C>(
    config: Config,
    connector: C,
) -> crate::Result<(Batches, Trigger)>
where
    C: Connector + 'static,
{
    let discovery = Discovery::new(config, connector)?;
    let (trigger, tripwire) = Tripwire::new();
    let (emitter, batches) = handoff();

    tokio::spawn(discovery.run(emitter, tripwire));

    Ok((batches, trigger))
}
