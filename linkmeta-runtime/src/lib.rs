//! Tokio runtime wrapper shared by linkmeta binaries.
//!
//! A [`LinkmetaRuntime`] owns one cancellation token. Every handle hands out
//! the same token, so a Ctrl-C watcher and the batch extractor agree on when
//! in-flight fetches should stop.
use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
pub struct LinkmetaHandle {
    inner: Handle,
    cancel: CancellationToken,
}

pub struct LinkmetaRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl LinkmetaRuntime {
    /// Multi-threaded runtime with IO and timers enabled. `worker_threads`
    /// defaults to one per core.
    ///
    /// ```
    /// use linkmeta_runtime::LinkmetaRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = LinkmetaRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        Ok(Self {
            runtime: builder.build()?,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> LinkmetaHandle {
        LinkmetaHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Run a future to completion on the runtime.
    ///
    /// ```
    /// use linkmeta_runtime::LinkmetaRuntime;
    ///
    /// let runtime = LinkmetaRuntime::build("block-on-example", Some(1)).unwrap();
    /// assert_eq!(runtime.block_on(async { "done" }), "done");
    /// ```
    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work, then give tasks `graceful` to wind down.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl LinkmetaHandle {
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    /// Shared token; cancelling it aborts every fetch that was handed a clone.
    ///
    /// ```
    /// use linkmeta_runtime::LinkmetaRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = LinkmetaRuntime::build("cancel-example", Some(1)).unwrap();
    /// let cancel = runtime.handle().cancellation();
    /// assert!(!cancel.is_cancelled());
    /// runtime.shutdown(Duration::from_millis(5));
    /// assert!(cancel.is_cancelled());
    /// ```
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancel the shared token when the process receives Ctrl-C.
    ///
    /// The watcher exits quietly if the token is cancelled first.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                res = tokio::signal::ctrl_c() => {
                    if res.is_ok() {
                        cancel.cancel();
                    }
                }
            }
        })
    }
}
