//! Thread-safe facade that owns a worker pool and multiplexes many
//! concurrent [`NamedQuery`](crate::query::named) instances.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::query::named::{self, Handle, NamedOutcome};

#[cfg(feature = "log")]
use log::debug;

/// The number of pool worker threads a [`Client`] starts. Small and
/// fixed, matching §5's "small fixed-size thread pool runs I/O
/// reactors".
const WORKER_THREADS: usize = 4;

type Callback = Arc<dyn Fn(NamedOutcome) + Send + Sync>;

/// Owns a dedicated multi-threaded runtime, a mutex-guarded registry
/// of weak handles to in-flight queries, and the callback used for
/// queries started from now on.
///
/// Dropping a `Client` drops its `Runtime`, whose own `Drop`
/// implementation blocks the calling thread until every spawned task
/// — including every NamedQuery still in flight — has run to
/// completion. That is the "destructor joins the pool" guarantee
/// (§4.7) realized without a hand-written join loop: the runtime
/// already gives the happens-before the design notes ask for.
pub struct Client {
    runtime: Runtime,
    callback: Mutex<Callback>,
    handles: Mutex<Vec<Handle>>,
}

impl Client {
    /// Builds a `Client` with a fixed-size worker pool, invoking
    /// `callback` once per query unless overridden by
    /// [`Client::set_callback`] before that query starts.
    pub fn new<F>(callback: F) -> std::io::Result<Self>
    where
        F: Fn(NamedOutcome) + Send + Sync + 'static,
    {
        let runtime = Builder::new_multi_thread()
            .worker_threads(WORKER_THREADS)
            .enable_all()
            .build()?;

        Ok(Client {
            runtime,
            callback: Mutex::new(Arc::new(callback)),
            handles: Mutex::new(Vec::new()),
        })
    }

    /// Replaces the callback used for queries started after this
    /// call. Queries already in flight keep using the callback that
    /// was active when they were started.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: Fn(NamedOutcome) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Arc::new(callback);
    }

    /// Starts a new NamedQuery against `server` and registers its weak
    /// handle. `timeout` defaults to
    /// [`crate::query::named::DEFAULT_TIMEOUT`].
    pub fn query(&self, server: impl Into<String>, timeout: Option<Duration>) {
        let server = server.into();
        let callback = Arc::clone(&self.callback.lock().unwrap());
        let timeout = timeout.unwrap_or(named::DEFAULT_TIMEOUT);

        #[cfg(feature = "log")]
        debug!(target: "tempus::client", "queuing query for {server}");

        let handle = named::spawn(self.runtime.handle(), server, timeout, move |outcome| {
            callback(outcome);
        });

        let mut handles = self.handles.lock().unwrap();
        handles.retain(Handle::is_alive);
        handles.push(handle);
    }

    /// Cancels every currently registered query. Each delivers
    /// `Status::Cancelled` exactly once; queries started afterward are
    /// unaffected.
    pub fn cancel(&self) {
        let mut handles = self.handles.lock().unwrap();
        handles.retain(Handle::is_alive);

        #[cfg(feature = "log")]
        debug!(target: "tempus::client", "cancelling {} in-flight queries", handles.len());

        for handle in handles.iter() {
            handle.cancel();
        }
    }
}
