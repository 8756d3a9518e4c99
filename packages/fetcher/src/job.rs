use std::collections::VecDeque;
use std::net::SocketAddrV4;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;

use crate::config::PEER_QUEUE_CAPACITY;

/// Per-infohash state: the candidate peers not yet attempted, how many
/// sessions are currently running, and the handles needed to cancel
/// siblings the moment one session succeeds.
pub(crate) struct Job {
    pub(crate) queue: Mutex<VecDeque<SocketAddrV4>>,
    pub(crate) in_flight: AtomicUsize,
    pub(crate) notify: Notify,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Job {
    pub(crate) fn new() -> Job {
        Job {
            queue: Mutex::new(VecDeque::new()),
            in_flight: AtomicUsize::new(0),
            notify: Notify::new(),
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Enqueues a candidate peer, dropping the oldest if the queue is at
    /// capacity, and wakes the job's supervisor so it can pull it
    /// immediately if a slot is free.
    pub(crate) async fn push_peer(&self, peer: SocketAddrV4) {
        {
            let mut queue = self.queue.lock().await;
            if queue.len() >= PEER_QUEUE_CAPACITY {
                queue.pop_front();
            }
            queue.push_back(peer);
        }
        self.notify.notify_one();
    }

    pub(crate) async fn pop_peer(&self) -> Option<SocketAddrV4> {
        self.queue.lock().await.pop_front()
    }

    pub(crate) async fn track_session(&self, handle: JoinHandle<()>) {
        self.handles.lock().await.push(handle);
    }

    pub(crate) fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Aborts every session spawned for this job. Safe to call on
    /// already-finished handles; `abort` on a completed task is a no-op.
    pub(crate) async fn cancel_all(&self) {
        for handle in self.handles.lock().await.drain(..) {
            handle.abort();
        }
    }
}
