//! The three-layer query state machine: [`single`] → [`series`] →
//! [`named`].
//!
//! Each layer is a plain `async fn` rather than a heap-allocated
//! object with a posted callback: the returned `Future`'s single
//! resolution *is* the one-shot callback the design notes describe,
//! and dropping a `Future` that loses a `select!` race is exactly the
//! "closes the socket, which aborts pending I/O" cancellation the
//! per-query algorithms call for. `SingleQuery` and `SeriesQuery`
//! share one execution context for the lifetime of their owning
//! `NamedQuery` (§5): they are nested calls within one spawned task,
//! not separate tasks of their own. Only `NamedQuery` gets a pool
//! worker to itself, which is what lets `Client` run many of them
//! concurrently.

pub mod named;
pub mod series;
pub mod single;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

/// A cooperative, level-triggered cancellation signal shared down
/// through all three query layers.
///
/// A bare [`Notify`] only wakes whoever is *currently* waiting;
/// calling `cancel()` before a layer starts waiting would otherwise be
/// lost. Pairing it with a flag, and re-checking the flag after every
/// wake, gives the documented remedy for the "waiting for a
/// condition" race in `tokio::sync::Notify`'s own docs, and makes
/// `cancelled()` safe to await from any number of nested layers at
/// once.
#[derive(Default)]
pub(crate) struct Cancel {
    flag: AtomicBool,
    notify: Notify,
}

impl Cancel {
    pub(crate) fn new() -> Self {
        Cancel::default()
    }

    /// Marks this token cancelled and wakes every current waiter.
    /// Idempotent and safe to call from any thread, any number of
    /// times.
    pub(crate) fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Resolves once this token has been cancelled, whether that
    /// happened before or after this call started.
    pub(crate) async fn cancelled(&self) {
        loop {
            if self.is_cancelled() {
                return;
            }
            let notified = self.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_before_wait_is_not_lost() {
        let token = Cancel::new();
        token.cancel();
        tokio::time::timeout(Duration::from_millis(50), token.cancelled())
            .await
            .expect("cancelled() must resolve immediately when already cancelled");
    }

    #[tokio::test]
    async fn cancel_wakes_concurrent_waiters() {
        let token = Arc::new(Cancel::new());
        let a = Arc::clone(&token);
        let b = Arc::clone(&token);

        let h1 = tokio::spawn(async move { a.cancelled().await });
        let h2 = tokio::spawn(async move { b.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        token.cancel();

        h1.await.unwrap();
        h2.await.unwrap();
    }
}
