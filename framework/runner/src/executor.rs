use std::future::Future;

use surge_core::prelude::{ShutdownHandle, ShutdownSignalError};

/// Drives async work on behalf of virtual user threads.
///
/// Every virtual user shares the same runtime, but a call to [Executor::execute_in_place] only
/// blocks the calling thread.
#[derive(Debug)]
pub struct Executor {
    runtime: tokio::runtime::Runtime,
    shutdown_handle: ShutdownHandle,
}

impl Executor {
    pub(crate) fn new(runtime: tokio::runtime::Runtime, shutdown_handle: ShutdownHandle) -> Self {
        Self {
            runtime,
            shutdown_handle,
        }
    }

    /// Run async code in place, blocking until it completes.
    ///
    /// Note that the future will be cancelled if the run is shut down, in which case a
    /// [ShutdownSignalError] is returned. Submitting a future which does not support cancelling may
    /// prevent the run from shutting down.
    pub fn execute_in_place<T>(
        &self,
        fut: impl Future<Output = anyhow::Result<T>>,
    ) -> anyhow::Result<T> {
        let mut shutdown_listener = self.shutdown_handle.new_listener();
        self.runtime.block_on(async move {
            tokio::select! {
                result = fut => result,
                _ = shutdown_listener.wait_for_shutdown() => {
                    Err(anyhow::anyhow!(ShutdownSignalError::default()))
                },
            }
        })
    }

    /// Submit async code to be run in the background.
    ///
    /// Note that the future will not be cancelled if the run is shut down. It is also not guaranteed
    /// that the runner will wait for the future to complete before finishing.
    ///
    /// In iterations, you should use [Executor::execute_in_place] instead so that the work is part
    /// of the iteration that started it.
    pub fn spawn(&self, fut: impl Future<Output = ()> + Send + 'static) {
        self.runtime.spawn(fut);
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;

    fn executor() -> (Executor, ShutdownHandle) {
        let shutdown_handle = ShutdownHandle::new();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        (Executor::new(runtime, shutdown_handle.clone()), shutdown_handle)
    }

    #[test]
    fn returns_the_future_result() {
        let (executor, _) = executor();

        let value = executor.execute_in_place(async { Ok(7) }).unwrap();

        assert_eq!(7, value);
    }

    #[test]
    fn shutdown_cancels_work_in_place() {
        let (executor, shutdown_handle) = executor();
        executor.spawn({
            let shutdown_handle = shutdown_handle.clone();
            async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                shutdown_handle.shutdown();
            }
        });

        let start = Instant::now();
        let result = executor.execute_in_place(async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(result.unwrap_err().is::<ShutdownSignalError>());
    }

    #[test]
    fn blocks_only_the_calling_thread() {
        let (executor, _) = executor();
        let executor = std::sync::Arc::new(executor);

        let slow = {
            let executor = executor.clone();
            std::thread::spawn(move || {
                executor.execute_in_place(async {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(())
                })
            })
        };

        let start = Instant::now();
        executor.execute_in_place(async { Ok(()) }).unwrap();
        assert!(start.elapsed() < Duration::from_millis(400));

        slow.join().unwrap().unwrap();
    }
}
