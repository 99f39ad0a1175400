//! Serialized task execution
//!
//! A [`Dispatcher`] owns one worker thread and one FIFO queue. Tasks enqueued
//! from any thread run on the worker in arrival order and never concurrently
//! with each other, so state touched only from tasks needs no further
//! coordination.
//!
//! A [`DispatcherClient`] is one owner's view of a shared dispatcher. Tasks
//! it enqueues are skipped once the client has been detached, which lets an
//! owner tear itself down while tasks referring to it are still queued.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc;

type Task = Box<dyn FnOnce() + Send + 'static>;

enum Job {
    Run(Task),
    Terminate,
}

struct Shared {
    name: String,
    tx: mpsc::UnboundedSender<Job>,
    worker_id: ThreadId,
    worker: Mutex<Option<JoinHandle<()>>>,
}

/// Single-worker, single-queue task runner
#[derive(Clone)]
pub struct Dispatcher {
    shared: Arc<Shared>,
}

impl Dispatcher {
    /// Spawn the worker thread
    pub fn new(name: impl Into<String>) -> std::io::Result<Self> {
        let name = name.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let worker_name = name.clone();
        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_worker(&worker_name, rx))?;

        Ok(Self {
            shared: Arc::new(Shared {
                name,
                tx,
                worker_id: handle.thread().id(),
                worker: Mutex::new(Some(handle)),
            }),
        })
    }

    /// Worker thread name
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Queue a task. Returns false if the worker has exited.
    pub fn enqueue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared.tx.send(Job::Run(Box::new(task))).is_ok()
    }

    /// Queue a task and block until it has run.
    ///
    /// Runs the task inline when called from the worker itself. Returns
    /// `None` if the worker exited before running it or the task panicked.
    pub fn enqueue_and_wait<F, R>(&self, task: F) -> Option<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_dispatcher_thread() {
            return Some(task());
        }

        let (done_tx, done_rx) = std_mpsc::sync_channel(1);
        let queued = self.enqueue(move || {
            let _ = done_tx.send(task());
        });
        if !queued {
            return None;
        }

        done_rx.recv().ok()
    }

    /// True when called from the worker thread
    pub fn is_dispatcher_thread(&self) -> bool {
        thread::current().id() == self.shared.worker_id
    }

    /// Stop the worker after the tasks already queued have run.
    ///
    /// Blocks until the worker exits unless called from the worker itself.
    /// Tasks queued after this call are dropped without running.
    pub fn terminate(&self) {
        let _ = self.shared.tx.send(Job::Terminate);

        if self.is_dispatcher_thread() {
            return;
        }

        let handle = self
            .shared
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(dispatcher = %self.shared.name, "Dispatcher worker panicked");
            }
        }
    }
}

fn run_worker(name: &str, mut rx: mpsc::UnboundedReceiver<Job>) {
    tracing::debug!(dispatcher = %name, "Dispatcher worker started");

    while let Some(job) = rx.blocking_recv() {
        match job {
            Job::Run(task) => {
                if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                    tracing::error!(dispatcher = %name, "Dispatcher task panicked");
                }
            }
            Job::Terminate => break,
        }
    }

    tracing::debug!(dispatcher = %name, "Dispatcher worker exiting");
}

/// One owner's handle onto a shared dispatcher
///
/// Clones share the same attachment, so a task queued through any clone is
/// skipped after [`DispatcherClient::detach`].
#[derive(Clone)]
pub struct DispatcherClient {
    dispatcher: Dispatcher,
    attached: Arc<AtomicBool>,
}

impl DispatcherClient {
    /// Attach a new client to the dispatcher
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            attached: Arc::new(AtomicBool::new(true)),
        }
    }

    /// The underlying dispatcher
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Whether tasks from this client still run
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Queue a task that runs only while the client is attached
    pub fn enqueue<F>(&self, task: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        let attached = Arc::clone(&self.attached);
        self.dispatcher.enqueue(move || {
            if attached.load(Ordering::Acquire) {
                task();
            }
        })
    }

    /// Run `teardown` on the worker, detach, and wait for it to finish.
    ///
    /// Once this returns no task queued through this client will run.
    /// Detaching twice runs only the first teardown.
    pub fn detach<F>(&self, teardown: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let attached = Arc::clone(&self.attached);
        let ran = self.dispatcher.enqueue_and_wait(move || {
            if attached.swap(false, Ordering::AcqRel) {
                teardown();
            }
        });

        if ran.is_none() {
            tracing::warn!(
                dispatcher = %self.dispatcher.name(),
                "Dispatcher gone before detach; skipping teardown task"
            );
            self.attached.store(false, Ordering::Release);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[test]
    fn test_tasks_run_in_fifo_order() {
        let dispatcher = Dispatcher::new("test-fifo").unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for i in 0..100 {
            let seen = Arc::clone(&seen);
            dispatcher.enqueue(move || seen.lock().unwrap().push(i));
        }
        dispatcher.enqueue_and_wait(|| ()).unwrap();

        assert_eq!(*seen.lock().unwrap(), (0..100).collect::<Vec<_>>());
        dispatcher.terminate();
    }

    #[test]
    fn test_tasks_from_many_threads_never_overlap() {
        let dispatcher = Dispatcher::new("test-overlap").unwrap();
        let running = Arc::new(AtomicUsize::new(0));
        let overlaps = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..4)
            .map(|_| {
                let dispatcher = dispatcher.clone();
                let running = Arc::clone(&running);
                let overlaps = Arc::clone(&overlaps);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let running = Arc::clone(&running);
                        let overlaps = Arc::clone(&overlaps);
                        dispatcher.enqueue(move || {
                            if running.fetch_add(1, Ordering::SeqCst) != 0 {
                                overlaps.fetch_add(1, Ordering::SeqCst);
                            }
                            thread::sleep(Duration::from_micros(50));
                            running.fetch_sub(1, Ordering::SeqCst);
                        });
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        dispatcher.enqueue_and_wait(|| ()).unwrap();

        assert_eq!(overlaps.load(Ordering::SeqCst), 0);
        dispatcher.terminate();
    }

    #[test]
    fn test_enqueue_and_wait_returns_value() {
        let dispatcher = Dispatcher::new("test-wait").unwrap();
        let on_worker = dispatcher.clone();

        let result = dispatcher.enqueue_and_wait(move || on_worker.is_dispatcher_thread());

        assert_eq!(result, Some(true));
        assert!(!dispatcher.is_dispatcher_thread());
        dispatcher.terminate();
    }

    #[test]
    fn test_enqueue_and_wait_inline_on_worker() {
        let dispatcher = Dispatcher::new("test-inline").unwrap();
        let inner = dispatcher.clone();

        // Would deadlock if the nested call queued instead of running inline
        let result = dispatcher.enqueue_and_wait(move || inner.enqueue_and_wait(|| 7));

        assert_eq!(result, Some(Some(7)));
        dispatcher.terminate();
    }

    #[test]
    fn test_terminate_drops_later_tasks() {
        let dispatcher = Dispatcher::new("test-terminate").unwrap();
        dispatcher.terminate();

        assert!(!dispatcher.enqueue(|| ()));
        assert_eq!(dispatcher.enqueue_and_wait(|| 1), None);
    }

    #[test]
    fn test_worker_survives_panicking_task() {
        let dispatcher = Dispatcher::new("test-panic").unwrap();

        assert_eq!(dispatcher.enqueue_and_wait(|| -> u32 { panic!("boom") }), None);
        assert_eq!(dispatcher.enqueue_and_wait(|| 5), Some(5));
        dispatcher.terminate();
    }

    #[test]
    fn test_detached_client_skips_queued_tasks() {
        let dispatcher = Dispatcher::new("test-detach").unwrap();
        let client = DispatcherClient::new(dispatcher.clone());
        let count = Arc::new(AtomicUsize::new(0));

        // Hold the worker so the tasks below are still queued at detach time
        let (release_tx, release_rx) = std_mpsc::channel::<()>();
        dispatcher.enqueue(move || {
            let _ = release_rx.recv();
        });

        for _ in 0..3 {
            let count = Arc::clone(&count);
            client.enqueue(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        let detacher = {
            let client = client.clone();
            let count = Arc::clone(&count);
            thread::spawn(move || {
                client.detach(move || {
                    count.fetch_add(100, Ordering::SeqCst);
                })
            })
        };
        release_tx.send(()).unwrap();
        detacher.join().unwrap();

        // Queued tasks ran before the teardown; nothing after it
        assert_eq!(count.load(Ordering::SeqCst), 103);
        assert!(!client.is_attached());

        let late = Arc::clone(&count);
        client.enqueue(move || {
            late.fetch_add(1000, Ordering::SeqCst);
        });
        dispatcher.enqueue_and_wait(|| ()).unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 103);

        dispatcher.terminate();
    }

    #[test]
    fn test_detach_twice_runs_teardown_once() {
        let dispatcher = Dispatcher::new("test-detach-twice").unwrap();
        let client = DispatcherClient::new(dispatcher.clone());
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let count = Arc::clone(&count);
            client.detach(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(count.load(Ordering::SeqCst), 1);
        dispatcher.terminate();
    }
}
