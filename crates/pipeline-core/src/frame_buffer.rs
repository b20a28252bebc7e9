//! Bounded frame hand-off between an external producer and the pipeline
//!
//! ```text
//! [Producer Thread]  --push(Frame)-->  [FrameBuffer]  --pop-->  [Pipeline::run]
//! ```
//!
//! The buffer is a bounded crossbeam channel. When it is full, `push` evicts
//! the oldest unread frame so the producer never blocks; evictions are
//! counted and logged. Frames come out in the order they were pushed.
//!
//! Pushes are serialised, and a push only evicts while the channel holds
//! `capacity` frames, so a frame popped concurrently frees the slot instead.

use crate::Frame;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::warn;

/// Cloneable handle to a bounded FIFO of frames
///
/// Clones share the same queue; the producer keeps one handle and registers
/// another with the pipeline.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    sender: Sender<Frame>,
    receiver: Receiver<Frame>,
    dropped: Arc<AtomicU64>,
    push_lock: Arc<Mutex<()>>,
    capacity: usize,
}

impl FrameBuffer {
    /// Create a buffer holding at most `capacity` frames (at least one)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            dropped: Arc::new(AtomicU64::new(0)),
            push_lock: Arc::new(Mutex::new(())),
            capacity,
        }
    }

    /// Append a frame, evicting the oldest unread frame when full
    ///
    /// Returns true when a frame was evicted.
    pub fn push(&self, frame: Frame) -> bool {
        let _guard = self.push_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut frame = frame;
        let mut evicted = false;

        loop {
            match self.sender.try_send(frame) {
                Ok(()) => return evicted,
                Err(TrySendError::Full(returned)) => {
                    frame = returned;
                    if self.receiver.len() < self.capacity {
                        continue;
                    }
                    if let Ok(oldest) = self.receiver.try_recv() {
                        let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                        warn!(
                            "Frame buffer full, dropped frame {} ({} dropped so far)",
                            oldest.number, total
                        );
                        evicted = true;
                    }
                }
                // Unreachable while this handle holds a receiver
                Err(TrySendError::Disconnected(_)) => return evicted,
            }
        }
    }

    /// Take the oldest frame without waiting
    pub fn pop(&self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }

    /// Take the oldest frame, waiting up to `timeout` for one to arrive
    pub fn pop_timeout(&self, timeout: Duration) -> Option<Frame> {
        match self.receiver.recv_timeout(timeout) {
            Ok(frame) => Some(frame),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames evicted because the consumer fell behind
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Shared termination request, asserted by the producer or a controller
#[derive(Debug, Clone, Default)]
pub struct TerminateFlag(Arc<AtomicBool>);

impl TerminateFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the consumer to stop once the buffer is drained
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
