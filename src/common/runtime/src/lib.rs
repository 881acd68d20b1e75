use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        Arc, LazyLock, OnceLock,
        atomic::{AtomicUsize, Ordering},
    },
};

use common_error::{LocatorError, LocatorResult};
use futures::FutureExt;
use tokio::{runtime::Handle, task::JoinHandle};

static NUM_CPUS: LazyLock<usize> =
    LazyLock::new(|| std::thread::available_parallelism().map_or(1, std::num::NonZero::get));
static IO_RUNTIME_NUM_WORKER_THREADS: LazyLock<usize> = LazyLock::new(|| 4.min(*NUM_CPUS));

static IO_RUNTIME: OnceLock<RuntimeRef> = OnceLock::new();

pub type RuntimeRef = Arc<Runtime>;

/// A tokio runtime shared by every lookup issued from the host's worker threads.
#[derive(Debug)]
pub struct Runtime {
    pub runtime: tokio::runtime::Runtime,
}

impl Runtime {
    fn new(runtime: tokio::runtime::Runtime) -> RuntimeRef {
        Arc::new(Self { runtime })
    }

    async fn execute_task<F>(future: F) -> LocatorResult<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        AssertUnwindSafe(future).catch_unwind().await.map_err(|e| {
            let s = if let Some(s) = e.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = e.downcast_ref::<&str>() {
                (*s).to_string()
            } else {
                "unknown internal error".to_string()
            };
            LocatorError::InternalError(format!("Caught panic in the IO runtime: {s}"))
        })
    }

    /// Runs `future` to completion from synchronous code.
    ///
    /// Host threads are usually plain OS threads, in which case the future is
    /// driven with `block_on`. When the caller already sits inside a tokio
    /// runtime the future is spawned onto this runtime instead and the calling
    /// thread parks until the result arrives, since nesting `block_on` panics.
    pub fn block_on<F>(&self, future: F) -> LocatorResult<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if Handle::try_current().is_ok() {
            self.block_within_async_context(future)
        } else {
            self.runtime.block_on(Self::execute_task(future))
        }
    }

    /// Spawns a task on the runtime and blocks the current thread until the task is completed.
    ///
    /// The calling runtime thread will not do any other work until this call returns.
    pub fn block_within_async_context<F>(&self, future: F) -> LocatorResult<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let _join_handle = self.spawn(async move {
            let task_output = Self::execute_task(future).await;
            if tx.send(task_output).is_err() {
                log::warn!("Spawned task output ignored: receiver dropped");
            }
        });
        rx.recv().map_err(|_| {
            LocatorError::InternalError("Spawned task transmitter dropped".to_string())
        })?
    }

    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.runtime.spawn(future)
    }
}

fn init_io_runtime() -> LocatorResult<RuntimeRef> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(*IO_RUNTIME_NUM_WORKER_THREADS)
        .enable_all()
        .thread_name_fn(|| {
            static IO_THREAD_ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
            let id = IO_THREAD_ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
            format!("GLUEIO-{id}")
        })
        .build()?;
    Ok(Runtime::new(runtime))
}

/// Returns the process-wide IO runtime, creating it on first use.
pub fn get_io_runtime() -> LocatorResult<RuntimeRef> {
    if let Some(runtime) = IO_RUNTIME.get() {
        return Ok(runtime.clone());
    }
    let runtime = init_io_runtime()?;
    if let Err(lost) = IO_RUNTIME.set(runtime) {
        // another thread won the race; tear ours down without blocking
        if let Ok(lost) = Arc::try_unwrap(lost) {
            lost.runtime.shutdown_background();
        }
    }
    IO_RUNTIME
        .get()
        .cloned()
        .ok_or_else(|| LocatorError::InternalError("IO runtime was not initialised".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_is_shared() {
        let a = get_io_runtime().unwrap();
        let b = get_io_runtime().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn block_on_from_plain_thread() {
        let runtime = get_io_runtime().unwrap();
        let value = runtime
            .block_on(async {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                41 + 1
            })
            .unwrap();
        assert_eq!(value, 42);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn block_on_from_inside_a_runtime() {
        let runtime = get_io_runtime().unwrap();
        let value = tokio::task::spawn_blocking(move || runtime.block_on(async { "done" }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, "done");
    }

    #[test]
    fn panics_become_internal_errors() {
        let runtime = get_io_runtime().unwrap();
        let err = runtime
            .block_on(async {
                if true {
                    panic!("boom");
                }
                1u8
            })
            .unwrap_err();
        assert!(err.to_string().contains("boom"), "{err}");
    }
}
