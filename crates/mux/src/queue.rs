//! Bounded per-track sample queues and the shared buffer-available signal.
//!
//! Every track owns one [`SampleQueue`]. Producers push from any thread; the
//! scheduler thread is the only consumer. While a session is started each
//! queue carries a reference to the session's [`BufferSignal`] and bumps its
//! generation on every successful push, which is how the scheduler learns
//! that new data may be available without polling.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use mm_common::{PushPolicy, Sample};
use parking_lot::{Condvar, Mutex};

use crate::error::{MuxError, MuxResult};

#[derive(Debug, Default)]
struct SignalState {
    generation: u64,
    shutdown: bool,
}

/// Generation counter plus condvar shared by all queues of a session.
#[derive(Debug, Default)]
pub struct BufferSignal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

impl BufferSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that some queue gained a sample.
    pub fn notify(&self) {
        let mut state = self.state.lock();
        state.generation = state.generation.wrapping_add(1);
        self.cond.notify_all();
    }

    pub fn generation(&self) -> u64 {
        self.state.lock().generation
    }

    pub fn request_shutdown(&self) {
        let mut state = self.state.lock();
        state.shutdown = true;
        self.cond.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.state.lock().shutdown
    }

    /// Block until the generation moves past `seen`, shutdown is requested, or
    /// `timeout` elapses. Returns `true` unless the wait timed out.
    pub fn wait_for_change(&self, seen: u64, timeout: Duration) -> bool {
        let mut state = self.state.lock();
        let result = self.cond.wait_while_for(
            &mut state,
            |s| s.generation == seen && !s.shutdown,
            timeout,
        );
        !result.timed_out()
    }
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<Sample>,
    closed: bool,
    listener: Option<Arc<BufferSignal>>,
}

/// Bounded FIFO of samples for one track.
#[derive(Debug)]
pub struct SampleQueue {
    track_index: usize,
    capacity: usize,
    policy: PushPolicy,
    state: Mutex<QueueState>,
    not_full: Condvar,
}

impl SampleQueue {
    pub fn new(track_index: usize, capacity: usize, policy: PushPolicy) -> Self {
        Self {
            track_index,
            capacity: capacity.max(1),
            policy,
            state: Mutex::new(QueueState::default()),
            not_full: Condvar::new(),
        }
    }

    /// Append a sample, honouring the queue's push policy when full.
    pub fn push(&self, sample: Sample) -> MuxResult<()> {
        let mut state = self.state.lock();
        loop {
            if state.closed {
                return Err(MuxError::InvalidOperation(format!(
                    "Track {} queue is closed",
                    self.track_index
                )));
            }
            if state.items.len() < self.capacity {
                break;
            }
            match self.policy {
                PushPolicy::Fail => {
                    return Err(MuxError::BufferFull(format!(
                        "Track {} queue holds {} samples",
                        self.track_index, self.capacity
                    )));
                }
                PushPolicy::Block => self.not_full.wait(&mut state),
            }
        }

        state.items.push_back(sample);
        let listener = state.listener.clone();
        drop(state);

        if let Some(signal) = listener {
            signal.notify();
        }
        Ok(())
    }

    /// Presentation time of the head sample.
    pub fn peek_pts(&self) -> Option<i64> {
        self.state.lock().items.front().map(|s| s.pts)
    }

    pub fn pop(&self) -> Option<Sample> {
        let sample = self.state.lock().items.pop_front();
        if sample.is_some() {
            self.not_full.notify_one();
        }
        sample
    }

    /// Refuse further pushes and wake blocked producers.
    pub fn close(&self) {
        self.state.lock().closed = true;
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Start notifying `signal` on push. Samples queued before attaching are
    /// announced immediately.
    pub fn attach(&self, signal: Arc<BufferSignal>) {
        let mut state = self.state.lock();
        let pending = !state.items.is_empty();
        state.listener = Some(Arc::clone(&signal));
        drop(state);
        if pending {
            signal.notify();
        }
    }

    pub fn detach(&self) {
        self.state.lock().listener = None;
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn track_index(&self) -> usize {
        self.track_index
    }
}
