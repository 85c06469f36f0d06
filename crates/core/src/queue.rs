//! Streaming input queue: the FIFO of tagged messages a session streamer
//! consumes from its producer (`spec.md` §3, §4.2, §6 "Downward API").
//!
//! Ownership follows `spec.md` §9 ("Cyclic pointer: session ↔ queue"): the
//! producer owns the [`StreamingQueue`]; a [`Session`](crate::session::Session)
//! holds a (shared) reference to the same queue and observes shutdown via
//! its `closed` flag rather than a nulled pointer. The flag lives under the
//! same lock as the condition variable it is checked alongside, so a
//! `close()` can never race a streamer that is about to park on `wait()` —
//! see `close`/`wait` below.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

use crate::batch::TS_PACKET_LEN;
use crate::error::{Result, SatipError};
use crate::signal::SignalStatus;

/// One tagged message flowing from the producer into a session's streamer.
///
/// `spec.md` §4.2 lists every kind this crate must recognize; everything
/// other than `MpegTs`, `SignalStatus`, `NoStart` and `Exit` is accepted for
/// completeness with the producer's message set but ignored by the streamer.
#[derive(Debug, Clone)]
pub enum StreamingMessage {
    /// A chunk of MPEG-TS payload, length always a multiple of 188 bytes.
    MpegTs(Vec<u8>),
    /// Overwrite the session's cached signal/SNR status.
    SignalStatus(SignalStatus),
    /// Producer could not start the stream; treated like `Exit`.
    NoStart,
    /// Producer is terminating the stream; streamer should exit cleanly.
    Exit,
    Start,
    Stop,
    Packet,
    Grace,
    Skip,
    Speed,
    ServiceStatus,
    TimeshiftStatus,
}

impl StreamingMessage {
    /// Build an `MpegTs` message, checking the payload length is a multiple
    /// of 188 bytes first. The streamer's hot path only `debug_assert!`s
    /// this (`spec.md` §7: "non-aligned TS input ... is a programming
    /// invariant violation and must abort in debug builds"); this
    /// constructor is for callers that want to validate untrusted input
    /// explicitly and get a typed error back in release builds too.
    pub fn mpeg_ts_checked(payload: Vec<u8>) -> Result<Self> {
        if payload.len() % TS_PACKET_LEN != 0 {
            return Err(SatipError::NonAligned { len: payload.len() });
        }
        Ok(StreamingMessage::MpegTs(payload))
    }
}

struct Inner {
    messages: VecDeque<StreamingMessage>,
    closed: bool,
}

/// Mutex + condvar FIFO, matching `spec.md` §6's "Downward API" description
/// of the streaming queue ("mutex, condition variable, FIFO of typed
/// messages"). `closed` is this queue's own shutdown flag rather than a
/// second, independent one on the session: checking it and waiting on the
/// condvar happen under the same lock (see `wait`), so a `close()` call can
/// never land in the gap between a streamer observing "not closed yet" and
/// actually parking on the condition variable.
pub struct StreamingQueue {
    inner: Mutex<Inner>,
    condvar: Condvar,
}

impl Default for StreamingQueue {
    fn default() -> Self {
        StreamingQueue {
            inner: Mutex::new(Inner { messages: VecDeque::new(), closed: false }),
            condvar: Condvar::new(),
        }
    }
}

impl StreamingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a message and wake one waiter.
    pub fn push(&self, msg: StreamingMessage) {
        self.inner.lock().messages.push_back(msg);
        self.condvar.notify_one();
    }

    /// Pop the head if present, without blocking.
    pub fn try_pop(&self) -> Option<StreamingMessage> {
        self.inner.lock().messages.pop_front()
    }

    /// Whether `close()` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Block until a message arrives, the queue is closed, or `timeout`
    /// elapses — whichever happens first (`spec.md` §4.2 main loop: "wait on
    /// the queue condition under the mutex"). Returns `false` only if the
    /// queue was already closed when called; otherwise `true`, regardless of
    /// whether anything was actually enqueued (the timeout is a safety net
    /// against a missed notification, so callers always re-check via
    /// `try_pop`/`is_closed` on return).
    ///
    /// The closed-check and the wait happen under one lock, so there is no
    /// window in which a concurrent `close()` can notify before this call
    /// has parked on the condvar: either `close()` sets the flag first (and
    /// this call observes it immediately, without blocking), or this call
    /// parks first (releasing the lock as part of `wait_for`), in which case
    /// `close()` cannot proceed past acquiring the lock until this call is
    /// parked, and its `notify_all` is guaranteed to wake it.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut guard = self.inner.lock();
        if guard.closed {
            return false;
        }
        if !guard.messages.is_empty() {
            return true;
        }
        self.condvar.wait_for(&mut guard, timeout);
        true
    }

    /// Mark the queue closed and wake every waiter (`spec.md` §4.1 `close`:
    /// "broadcasts the queue's condition"). Idempotent.
    pub fn close(&self) {
        self.inner.lock().closed = true;
        self.condvar.notify_all();
    }
}

/// Per-subscription byte counter, atomically updated as TS payloads are
/// accounted (`spec.md` §4.2 "Account bytes to subscription", §6 "Downward
/// API": "atomically updatable `bytes_out` counter").
#[derive(Debug, Default)]
pub struct Subscription {
    bytes_out: AtomicU64,
}

impl Subscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes(&self, n: u64) {
        self.bytes_out.fetch_add(n, Ordering::Relaxed);
    }

    pub fn bytes_out(&self) -> u64 {
        self.bytes_out.load(Ordering::Relaxed)
    }
}
