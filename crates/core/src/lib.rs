//! RTP/RTCP streaming core for a SAT>IP server.
//!
//! Takes a stream of MPEG-TS packets produced by a tuner/subscription,
//! filters them by PID, packs them into fixed-shape RTP datagrams, sends
//! them in batches over UDP, and periodically emits an RTCP
//! application-defined report describing the current tuner state for each
//! live session.
//!
//! Out of scope (owned by collaborators outside this crate): the RTSP
//! control surface, the tuner/demux frontend, the PID-list text parser, and
//! UDP socket creation — callers hand in already-bound sockets.

pub mod batch;
pub mod clock;
pub mod error;
pub mod handle;
pub mod mux;
pub mod pid;
pub mod queue;
pub mod registry;
mod rtcp;
mod session;
pub mod signal;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use socket2::Socket;
use tracing::info;

pub use handle::Handle;
pub use mux::MuxDescriptor;
pub use pid::PidFilter;
pub use queue::{StreamingMessage, StreamingQueue, Subscription};
pub use registry::SessionRegistry;
pub use rtcp::{RtcpReporter, DEFAULT_RTCP_INTERVAL};
pub use session::Session;

/// Ambient configuration for one [`Core`] instance.
///
/// `spec.md` leaves process configuration to the surrounding server; the
/// only genuinely variable ambient parameter this crate owns is the RTCP
/// reporter's period. Batch shape (128 × 1328 bytes) is a hard protocol
/// invariant, not configuration — see `SPEC_FULL.md` §8.3.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub rtcp_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config { rtcp_interval: DEFAULT_RTCP_INTERVAL }
    }
}

/// The process-wide streaming core: a session registry plus the shared
/// RTCP reporter thread (`spec.md` §6, §9 "Process-wide state").
///
/// `H` is the opaque handle type the control layer uses to name sessions
/// (see [`Handle`]).
pub struct Core<H: Handle + 'static> {
    registry: Arc<SessionRegistry<H>>,
    reporter: RtcpReporter,
}

impl<H: Handle + 'static> Core<H> {
    /// `init()`: create the registry, start the RTCP reporter.
    pub fn init(config: Config) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let reporter = RtcpReporter::spawn(registry.clone(), config.rtcp_interval);
        info!("streaming core initialized");
        Core { registry, reporter }
    }

    /// `done()`: stop the RTCP reporter. The registry must already be
    /// empty — every session must have been `close`d first (`spec.md` §5
    /// "Full shutdown: registry must be empty (asserted)").
    pub fn done(mut self) {
        debug_assert!(
            self.registry.is_empty(),
            "Core::done called with live sessions still in the registry"
        );
        self.reporter.stop();
        info!("streaming core shut down");
    }

    /// `open(...)`: register and start a session's streamer thread.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &self,
        handle: H,
        queue: Arc<StreamingQueue>,
        subscription: Arc<Subscription>,
        rtp_peer: SocketAddr,
        fd_rtp: Socket,
        fd_rtcp: Socket,
        frontend: u32,
        source: u32,
        mux: MuxDescriptor,
        pids: PidFilter,
    ) -> bool {
        self.registry.open(
            handle,
            queue,
            subscription,
            rtp_peer,
            fd_rtp,
            fd_rtcp,
            frontend,
            source,
            mux,
            pids,
        )
    }

    /// `update_pids(handle, pids)`: replace the filter under the session
    /// lock.
    pub fn update_pids(&self, handle: &H, pids: PidFilter) {
        self.registry.update_pids(handle, pids);
    }

    /// `close(handle)`: deregister, stop the streamer, release resources.
    pub fn close(&self, handle: &H) {
        self.registry.close(handle);
    }

    /// Direct access to the registry, e.g. for diagnostics or tests that
    /// need `is_empty()` without tearing the core down.
    pub fn registry(&self) -> &SessionRegistry<H> {
        &self.registry
    }
}
