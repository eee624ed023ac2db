use futures::{Stream, StreamExt};

use crate::TargetGroup;

/// Sink persists or publishes batches emitted by a discovery.
///
/// Every batch holds the full live set of groups plus tombstones. An
/// implementation should merge groups by `source` and drop the source when
/// the group has no targets.
pub trait Sink {
    fn emit(&mut self, batch: Vec<TargetGroup>) -> crate::Result<()>;
}

/// Hands every batch of `batches` to `sink` until the stream ends. Errors of
/// the sink are logged, they do not stop forwarding.
pub async fn forward<S, K>(mut batches: S, mut sink: K) -> K
where
    S: Stream<Item = Vec<TargetGroup>> + Unpin,
    K: Sink,
{
    while let Some(batch) = batches.next().await {
        let groups = batch.len();

        if let Err(err) = sink.emit(batch) {
            error!(message = "emit target groups failed", groups, %err);
        }
    }

    sink
}
