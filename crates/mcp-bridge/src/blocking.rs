//! Sync/Async Bridge
//!
//! Every [`crate::SessionHandle`] owns a [`SessionRuntime`]: a one-worker
//! tokio scheduler on its own thread. The transport is opened there and every
//! exchange runs there, so the I/O driver a session depends on is never the
//! caller's. Callers only wait for replies, which works the same from a plain
//! thread and from inside either kind of tokio scheduler.

use std::future::Future;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tracing::error;

/// Scheduler a session performs all of its I/O on
pub(crate) struct SessionRuntime {
    runtime: Option<Runtime>,
}

impl SessionRuntime {
    /// Start the scheduler thread; a failure is logged and leaves the
    /// runtime stopped, so every request answers with a runtime error
    pub(crate) fn start() -> Self {
        let runtime = Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mcp-session")
            .enable_all()
            .build();
        match runtime {
            Ok(runtime) => Self {
                runtime: Some(runtime),
            },
            Err(e) => {
                error!(error = %e, "Failed to start MCP session runtime");
                Self { runtime: None }
            }
        }
    }

    pub(crate) fn is_running(&self) -> bool {
        self.runtime.is_some()
    }

    /// Run `task` on the session scheduler. `false` if the runtime is stopped,
    /// in which case `task` is dropped unpolled.
    pub(crate) fn spawn<F>(&self, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        match &self.runtime {
            Some(runtime) => {
                runtime.spawn(task);
                true
            }
            None => false,
        }
    }
}

impl Drop for SessionRuntime {
    fn drop(&mut self) {
        // A plain drop blocks on the worker thread, which panics inside async code
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Block the calling thread until `future` completes
///
/// Only for futures that wait on work done elsewhere, such as replies from a
/// session runtime. A future that needs the caller's own tokio driver would
/// never wake. Inside a multi-thread scheduler the worker is handed off
/// through `block_in_place` first.
pub(crate) fn block_on<F: Future>(future: F) -> F::Output {
    // Replies must not be held back by the caller's cooperative budget
    let future = tokio::task::unconstrained(future);
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| futures::executor::block_on(future))
        }
        _ => futures::executor::block_on(future),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::oneshot;

    /// Round-trip a line through a TCP echo served and dialed on `runtime`
    fn echo_on(runtime: &SessionRuntime, line: &'static str) -> oneshot::Receiver<String> {
        let (reply, answer) = oneshot::channel();
        let started = runtime.spawn(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let address = listener.local_addr().unwrap();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; line.len()];
                socket.read_exact(&mut buf).await.unwrap();
                socket.write_all(&buf).await.unwrap();
            });

            let mut stream = TcpStream::connect(address).await.unwrap();
            stream.write_all(line.as_bytes()).await.unwrap();
            let mut buf = vec![0u8; line.len()];
            stream.read_exact(&mut buf).await.unwrap();
            let _ = reply.send(String::from_utf8(buf).unwrap());
        });
        assert!(started);
        answer
    }

    #[test]
    fn test_wait_from_plain_thread() {
        let runtime = SessionRuntime::start();
        let echoed = block_on(echo_on(&runtime, "London")).unwrap();
        assert_eq!(echoed, "London");
    }

    #[tokio::test]
    async fn test_wait_inside_current_thread_scheduler() {
        let runtime = SessionRuntime::start();
        let echoed = block_on(echo_on(&runtime, "Paris")).unwrap();
        assert_eq!(echoed, "Paris");
        // Dropping inside async code must not panic
        drop(runtime);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_wait_inside_multi_thread_scheduler() {
        let runtime = SessionRuntime::start();
        let echoed = block_on(echo_on(&runtime, "Tokyo")).unwrap();
        assert_eq!(echoed, "Tokyo");
    }

    #[tokio::test]
    async fn test_many_waits_in_one_task() {
        let runtime = SessionRuntime::start();
        for _ in 0..300 {
            let (reply, answer) = oneshot::channel();
            runtime.spawn(async move {
                let _ = reply.send(7);
            });
            assert_eq!(block_on(answer).unwrap(), 7);
        }
    }

    #[test]
    fn test_borrowed_state() {
        let words = vec!["sunny".to_string(), "mild".to_string()];
        let joined = block_on(async { words.join(" ") });
        assert_eq!(joined, "sunny mild");
    }
}
