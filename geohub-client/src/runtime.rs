//! Blocking bridge onto Tokio for the synchronous client API.

use std::fmt;
use std::future::Future;
use std::panic;
use std::thread;
use std::time::Duration;

use geohub_core::{CancellationToken, Interrupted, Sleeper};
use tokio::runtime::{Handle, Runtime, RuntimeFlavor};

use crate::ClientBuildError;

/// Owns a `current_thread` runtime reused across requests and backoff waits.
///
/// When called from inside a multi-threaded Tokio runtime, futures run on
/// that runtime through [`tokio::task::block_in_place`]. Outside any runtime
/// the owned runtime drives them on the calling thread. Inside a
/// `current_thread` runtime, where neither is allowed, the owned runtime
/// drives them on a scoped helper thread while the caller's runtime stays
/// blocked for the duration of the call.
///
/// Like any Tokio runtime it must be dropped outside async code, for example
/// through [`tokio::task::spawn_blocking`].
pub struct BlockingRuntime {
    runtime: Runtime,
}

impl fmt::Debug for BlockingRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingRuntime")
            .field("runtime", &"<tokio::runtime::Runtime>")
            .finish()
    }
}

impl BlockingRuntime {
    /// Build the owned runtime with IO and timers enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ClientBuildError::Runtime`] when Tokio cannot start.
    pub fn new() -> Result<Self, ClientBuildError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(ClientBuildError::Runtime)?;
        Ok(Self { runtime })
    }

    /// Drive `future` to completion, blocking the calling thread.
    ///
    /// A panic inside `future` is resumed on the calling thread.
    pub fn block_on<F>(&self, future: F) -> F::Output
    where
        F: Future + Send,
        F::Output: Send,
    {
        match Handle::try_current() {
            Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
                tokio::task::block_in_place(|| handle.block_on(future))
            }
            Ok(_) => thread::scope(|scope| {
                scope
                    .spawn(|| self.runtime.block_on(future))
                    .join()
                    .unwrap_or_else(|payload| panic::resume_unwind(payload))
            }),
            Err(_) => self.runtime.block_on(future),
        }
    }
}

impl Sleeper for BlockingRuntime {
    fn sleep(&self, duration: Duration, cancel: &CancellationToken) -> Result<(), Interrupted> {
        if cancel.is_cancelled() {
            return Err(Interrupted);
        }
        self.block_on(async {
            tokio::select! {
                () = cancel.cancelled() => Err(Interrupted),
                () = tokio::time::sleep(duration) => Ok(()),
            }
        })
    }
}
