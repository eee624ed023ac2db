//! A one-shot cancellation signal.
//!
//! [`Tripwire::new`] returns a [`Trigger`] and a [`Tripwire`]. The tripwire, and
//! every clone of it, is a future that resolves once the trigger is cancelled
//! or dropped. [`Trigger::disable`] detaches the trigger instead, the tripwires
//! will then never resolve.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use tracing::debug;

#[derive(Default)]
struct Shared {
    fired: AtomicBool,

    next_id: AtomicU64,
    wakers: Mutex<HashMap<u64, Waker>>,
}

impl Shared {
    #[inline]
    fn fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn fire(&self) {
        self.fired.store(true, Ordering::Release);

        let wakers = std::mem::take(&mut *self.wakers.lock().expect("lock waker map"));
        wakers.into_values().for_each(Waker::wake);
    }
}

pub struct Trigger {
    shared: Arc<Shared>,
    armed: bool,
}

impl Trigger {
    /// Resolve all associated tripwires.
    pub fn cancel(mut self) {
        debug!(message = "trigger cancelled");

        self.armed = false;
        self.shared.fire();
    }

    /// Drop the trigger without resolving the tripwires.
    pub fn disable(mut self) {
        self.armed = false;
    }
}

impl Drop for Trigger {
    fn drop(&mut self) {
        if self.armed {
            debug!(message = "trigger dropped");

            self.shared.fire();
        }
    }
}

pub struct Tripwire {
    shared: Arc<Shared>,
    id: u64,
}

impl Tripwire {
    pub fn new() -> (Trigger, Tripwire) {
        let shared = Arc::new(Shared::default());
        let tripwire = Tripwire {
            id: shared.next_id(),
            shared: Arc::clone(&shared),
        };

        (
            Trigger {
                shared,
                armed: true,
            },
            tripwire,
        )
    }

    /// Whether the trigger was cancelled or dropped.
    #[inline]
    pub fn is_fired(&self) -> bool {
        self.shared.fired()
    }
}

impl Clone for Tripwire {
    fn clone(&self) -> Self {
        Self {
            id: self.shared.next_id(),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl Drop for Tripwire {
    fn drop(&mut self) {
        if let Ok(mut wakers) = self.shared.wakers.lock() {
            wakers.remove(&self.id);
        }
    }
}

impl Future for Tripwire {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if self.shared.fired() {
            return Poll::Ready(());
        }

        self.shared
            .wakers
            .lock()
            .expect("lock waker map")
            .insert(self.id, cx.waker().clone());

        // the trigger might fire between the first check and the insert
        if self.shared.fired() {
            return Poll::Ready(());
        }

        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::StreamExt;
    use tokio_stream::wrappers::ReceiverStream;

    use super::*;

    macro_rules! assert_pending {
        ($var:expr) => {
            assert!(futures::poll!(&mut $var).is_pending());
        };
    }

    macro_rules! assert_ready {
        ($var:expr) => {
            assert!(futures::poll!(&mut $var).is_ready());
        };
    }

    #[tokio::test]
    async fn drop_trigger() {
        let (trigger, mut tripwire) = Tripwire::new();
        assert_pending!(tripwire);
        drop(trigger);
        assert_ready!(tripwire);
        assert!(tripwire.is_fired());
    }

    #[tokio::test]
    async fn disable_trigger() {
        let (trigger, mut tripwire) = Tripwire::new();
        trigger.disable();
        assert_pending!(tripwire);
        assert!(!tripwire.is_fired());
    }

    #[tokio::test]
    async fn cancel_resolves_every_poll() {
        let (trigger, mut tripwire) = Tripwire::new();
        assert_pending!(tripwire);
        trigger.cancel();
        assert_ready!(tripwire);
        assert_ready!(tripwire);
    }

    #[tokio::test]
    async fn cloned_tripwire() {
        let (trigger, mut tw1) = Tripwire::new();
        assert_pending!(tw1);
        let mut tw2 = tw1.clone();
        assert_pending!(tw2);

        trigger.cancel();

        assert!(tw1.shared.wakers.lock().unwrap().is_empty());
        assert_ready!(tw1);
        assert_ready!(tw2);
    }

    #[tokio::test]
    async fn dropped_tripwire_removes_waker() {
        let (_trigger, mut tw1) = Tripwire::new();
        let mut tw2 = tw1.clone();
        assert_pending!(tw1);
        assert_pending!(tw2);

        drop(tw2);

        assert_eq!(tw1.shared.wakers.lock().unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn take_until_cancel() {
        let (trigger, tripwire) = Tripwire::new();

        let (tx, rx) = tokio::sync::mpsc::channel::<i32>(1);
        let mut stream = ReceiverStream::new(rx).take_until(tripwire);

        tx.send(1).await.expect("send success");
        assert_eq!(stream.next().await, Some(1));
        assert_pending!(stream.next());

        trigger.cancel();
        assert!(tx.send(2).await.is_ok());
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_from_another_task() {
        let (trigger, tripwire) = Tripwire::new();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        tokio::time::timeout(Duration::from_secs(2), tripwire)
            .await
            .expect("tripwire resolved before timeout");
    }
}
