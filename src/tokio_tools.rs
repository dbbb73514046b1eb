use std::future::Future;

use tokio::task::JoinHandle;

/// Spawns a client or worker task under `name`.
///
/// With `tokio_unstable` the name is attached to the task itself; otherwise
/// the future runs inside a `task` span carrying the name.
pub fn spawn_named_task<F, S>(name: S, future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
    S: Into<String>,
{
    let name = name.into();
    #[cfg(tokio_unstable)]
    {
        tokio::task::Builder::new()
            .name(&name)
            .spawn(future)
            .unwrap_or_else(|err| panic!("failed to spawn task {name}: {err}"))
    }
    #[cfg(not(tokio_unstable))]
    {
        use tracing::Instrument;
        let span = tracing::info_span!("task", task_name = %name);
        tokio::spawn(future.instrument(span))
    }
}
