//! A live RTP/RTCP session and its streamer thread (`spec.md` §3, §4.2).

use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use socket2::Socket;
use tracing::{debug, warn};

use crate::batch::{SendBatch, SLOT_CAPACITY, TS_PACKET_LEN};
use crate::clock::coarse_secs;
use crate::error::{Result, SatipError};
use crate::handle::Handle;
use crate::mux::MuxDescriptor;
use crate::pid::{ts_packet_pid, PidFilter};
use crate::queue::{StreamingMessage, StreamingQueue, Subscription};
use crate::signal::SignalStatus;

/// How long the streamer waits on the queue condition between wake-ups,
/// purely as a safety net against a missed notification — every real
/// wake-up is a direct `notify_one`/`notify_all` from the producer or the
/// control layer (`spec.md` §4.2 main loop).
const QUEUE_WAIT: Duration = Duration::from_secs(2);

/// Fields guarded by the session's own mutex (`spec.md` §4.1: "the session
/// mutex protects only the PID filter ... and the signal-status snapshot").
struct SessionState {
    pid_filter: PidFilter,
    signal: SignalStatus,
}

/// One client's live RTP stream from one tuner with one PID filter
/// (`spec.md` §3 "Session").
pub struct Session<H: Handle> {
    pub handle: H,
    pub rtp_peer: SocketAddr,
    pub rtcp_peer: SocketAddr,
    pub frontend_id: u32,
    pub source_id: u32,
    pub mux: MuxDescriptor,
    pub subscription: Arc<Subscription>,
    rtp_socket: Socket,
    rtcp_socket: Socket,
    state: Mutex<SessionState>,
    queue: Arc<StreamingQueue>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<H: Handle> Session<H> {
    /// Build a session and spawn its streamer thread. Corresponds to the
    /// body of `spec.md` §4.1 `open` minus the registry insertion, which the
    /// caller ([`crate::registry::SessionRegistry::open`]) performs while
    /// still holding the registry lock.
    pub(crate) fn spawn(
        handle: H,
        queue: Arc<StreamingQueue>,
        subscription: Arc<Subscription>,
        rtp_peer: SocketAddr,
        rtp_socket: Socket,
        rtcp_socket: Socket,
        frontend_id: u32,
        source_id: u32,
        mux: MuxDescriptor,
        pids: PidFilter,
    ) -> Arc<Self> {
        let rtcp_peer = rtcp_peer_of(rtp_peer);
        let session = Arc::new(Session {
            handle,
            rtp_peer,
            rtcp_peer,
            frontend_id,
            source_id,
            mux,
            subscription,
            rtp_socket,
            rtcp_socket,
            state: Mutex::new(SessionState {
                pid_filter: pids,
                signal: SignalStatus::default(),
            }),
            queue,
            thread: Mutex::new(None),
        });

        let worker = session.clone();
        let join = std::thread::spawn(move || worker.run());
        *session.thread.lock() = Some(join);
        session
    }

    /// Replace the PID filter under the session lock (`spec.md` §4.1
    /// `update_pids`).
    pub(crate) fn set_pid_filter(&self, pids: PidFilter) {
        self.state.lock().pid_filter = pids;
    }

    /// A copy of the current PID filter, for RTCP body rendering.
    pub(crate) fn pid_filter_snapshot(&self) -> PidFilter {
        self.state.lock().pid_filter.clone()
    }

    /// A copy of the most recently received signal status.
    pub(crate) fn signal_snapshot(&self) -> SignalStatus {
        self.state.lock().signal
    }

    pub(crate) fn rtcp_socket(&self) -> &Socket {
        &self.rtcp_socket
    }

    /// Whether this session is still streaming — only streaming sessions
    /// receive RTCP emissions (`spec.md` §4.3 "States": "streaming" vs.
    /// "closing").
    pub(crate) fn is_streaming(&self) -> bool {
        !self.queue.is_closed()
    }

    /// `spec.md` §4.1 `close`: closes the queue (see
    /// [`StreamingQueue::close`] for why this is race-free against a
    /// streamer that is about to block), then joins the streamer thread. The
    /// registry has already removed this session from its map by the time
    /// this is called.
    pub(crate) fn close(&self) {
        self.queue.close();
        if let Some(join) = self.thread.lock().take() {
            let _ = join.join();
        }
    }

    fn run(self: Arc<Self>) {
        let mut seq: u16 = 0;
        let (hseq, hts) = Self::next_stamp(&mut seq);
        let mut batch = SendBatch::new(hseq, hts);
        let mut last_pid: Option<u16> = None;
        let mut fatal = false;
        let mut remote_terminated = false;

        loop {
            if fatal || self.queue.is_closed() {
                break;
            }

            match self.queue.try_pop() {
                Some(StreamingMessage::MpegTs(payload)) => {
                    self.subscription.add_bytes(payload.len() as u64);
                    if let Err(err) = self.pack(&mut batch, &mut seq, &mut last_pid, &payload) {
                        warn!(handle = ?self.handle, error = %err, "RTP send failed, session terminating");
                        fatal = true;
                    }
                }
                Some(StreamingMessage::SignalStatus(status)) => {
                    self.state.lock().signal = status;
                }
                Some(StreamingMessage::NoStart) | Some(StreamingMessage::Exit) => {
                    remote_terminated = true;
                    break;
                }
                Some(_) => {
                    // Start/Stop/Packet/Grace/Skip/Speed/ServiceStatus/TimeshiftStatus: ignored.
                }
                None => {
                    if let Err(err) = self.flush(&mut batch, &mut seq) {
                        warn!(handle = ?self.handle, error = %err, "RTP flush failed, session terminating");
                        fatal = true;
                        continue;
                    }
                    if !self.queue.wait(QUEUE_WAIT) {
                        break;
                    }
                }
            }
        }

        debug!(
            handle = ?self.handle,
            remote_terminated,
            fatal,
            "session streamer exiting"
        );
    }

    /// Compute the `(header seq field, header timestamp field)` pair for the
    /// next RTP header write, and advance `seq` in place.
    ///
    /// The original computes the timestamp from the *pre*-increment sequence
    /// value and only then increments the counter, so the seq field written
    /// into the header (post-increment) and the timestamp field
    /// (`dispatch_clock + pre-increment seq`) differ by exactly one tick —
    /// not the same value used for both. This mirrors that ordering instead
    /// of incrementing first and reusing the new value for both fields.
    fn next_stamp(seq: &mut u16) -> (u16, u32) {
        let ts = coarse_secs().wrapping_add(*seq as u32);
        *seq = seq.wrapping_add(1);
        (*seq, ts)
    }

    /// PID filter + packer (`spec.md` §4.2 "PID filter + packer").
    fn pack(
        &self,
        batch: &mut SendBatch,
        seq: &mut u16,
        last_pid: &mut Option<u16>,
        payload: &[u8],
    ) -> Result<()> {
        debug_assert_eq!(
            payload.len() % TS_PACKET_LEN,
            0,
            "MPEG-TS payload length must be a multiple of 188"
        );

        for packet in payload.chunks_exact(TS_PACKET_LEN) {
            let pid = ts_packet_pid(packet);

            let accepted = if last_pid == &Some(pid) {
                true
            } else {
                self.state.lock().pid_filter.accepts(pid)
            };
            if !accepted {
                continue;
            }
            *last_pid = Some(pid);

            batch.append_ts_packet(packet);

            if batch.cursor_len() == SLOT_CAPACITY {
                if !batch.is_last_slot() {
                    let (hseq, hts) = Self::next_stamp(seq);
                    batch.advance_cursor(hseq, hts);
                } else {
                    self.flush(batch, seq)?;
                }
            }
        }
        Ok(())
    }

    /// Flush (`spec.md` §4.2 "Flush"), callable both from the packer when
    /// the last slot fills and speculatively when the queue drains.
    ///
    /// Each full slot is its own RTP datagram, sent individually over the
    /// connected RTP socket — `sendmmsg`-style batching (send `sent`
    /// datagrams in one syscall) has no safe binding in the crates this
    /// workspace depends on, so the batch is flushed as a tight loop of
    /// per-datagram sends instead. This preserves every invariant the
    /// caller can observe (packet boundaries, strictly increasing sequence
    /// numbers, one RTP send failure aborting the whole flush) at the cost
    /// of `sent` syscalls instead of one.
    fn flush(&self, batch: &mut SendBatch, seq: &mut u16) -> Result<()> {
        if batch.slot0_len() != SLOT_CAPACITY {
            return Ok(());
        }

        let sent = batch.full_slot_count();
        for i in 0..sent {
            self.rtp_socket
                .send(batch.slot(i))
                .map_err(SatipError::FlushFailed)?;
        }

        batch.rollover(sent);
        if batch.slot0_len() == 0 {
            let (hseq, hts) = Self::next_stamp(seq);
            batch.write_header_if_empty(hseq, hts);
        }
        Ok(())
    }
}

/// RTCP peer is the RTP peer with its port incremented by one (`spec.md`
/// §3, §6 "Wire outputs").
fn rtcp_peer_of(rtp_peer: SocketAddr) -> SocketAddr {
    let mut peer = rtp_peer;
    peer.set_port(rtp_peer.port().wrapping_add(1));
    peer
}
