use tokio::signal;

pub(crate) use surge_core::prelude::{DelegatedShutdownListener, ShutdownHandle, ShutdownSignalError};

/// Raise the shutdown signal when the process receives Ctrl-C.
pub(crate) fn start_shutdown_listener(runtime: &tokio::runtime::Runtime) -> ShutdownHandle {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl-C, the run can only stop on its own: {e:?}");
            return;
        }
        log::warn!("Received shutdown signal, shutting down...");
        listener_handle.shutdown();
    });

    handle
}
