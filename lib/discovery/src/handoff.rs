use std::pin::Pin;
use std::task::{Context, Poll, ready};

use futures::Stream;
use tokio::sync::{mpsc, oneshot};

use crate::TargetGroup;

type Handoff = (Vec<TargetGroup>, oneshot::Sender<()>);

/// The consumer is gone, nobody will take batches anymore.
#[derive(Debug)]
pub struct Closed;

/// Sending half of a batch handoff.
pub struct Emitter {
    tx: mpsc::Sender<Handoff>,
}

impl Emitter {
    /// Resolves once the consumer has taken `batch` from the [`Batches`]
    /// stream, not when it was queued.
    pub async fn emit(&self, batch: Vec<TargetGroup>) -> Result<(), Closed> {
        let (ack, taken) = oneshot::channel();

        self.tx.send((batch, ack)).await.map_err(|_| Closed)?;

        // a receiver dropped with the batch still queued drops the ack too
        taken.await.map_err(|_| Closed)
    }
}

/// Stream of emitted batches, every batch is acknowledged to the
/// [`Emitter`] the moment it is yielded.
pub struct Batches {
    rx: mpsc::Receiver<Handoff>,
}

impl Stream for Batches {
    type Item = Vec<TargetGroup>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match ready!(self.rx.poll_recv(cx)) {
            Some((batch, ack)) => {
                // the emitter may have stopped waiting already
                let _ = ack.send(());
                Poll::Ready(Some(batch))
            }
            None => Poll::Ready(None),
        }
    }
}

/// Creates a handoff pair, the emitter waits for the stream to take each
/// batch before it can emit the next one.
pub fn handoff() -> (Emitter, Batches) {
    let (tx, rx) = mpsc::channel(1);

    (Emitter { tx }, Batches { rx })
}
