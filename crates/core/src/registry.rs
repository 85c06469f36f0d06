//! The global session registry (`spec.md` §4.1).
//!
//! Lock ordering is registry → (queue or session), never reversed
//! (`spec.md` §5). The registry lock is only ever held across short,
//! non-blocking map operations and the RTCP reporter's per-pass walk — never
//! across a thread join or a blocking wait.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use socket2::Socket;
use tracing::debug;

use crate::handle::Handle;
use crate::mux::MuxDescriptor;
use crate::pid::PidFilter;
use crate::queue::{StreamingQueue, Subscription};
use crate::session::Session;

/// Holds every live session, keyed by its opaque handle.
pub struct SessionRegistry<H: Handle> {
    sessions: Mutex<HashMap<H, Arc<Session<H>>>>,
}

impl<H: Handle> Default for SessionRegistry<H> {
    fn default() -> Self {
        SessionRegistry { sessions: Mutex::new(HashMap::new()) }
    }
}

impl<H: Handle> SessionRegistry<H> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `spec.md` §4.1 `open`: allocates the session and spawns its streamer
    /// thread while holding the registry mutex for the whole operation.
    /// Returns `false` without creating anything if `handle` is already in
    /// use, preserving "a session's handle is unique across the registry
    /// for its lifetime" (`spec.md` §3) instead of silently replacing the
    /// existing session.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        &self,
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
    ) -> bool {
        let mut sessions = self.sessions.lock();
        if sessions.contains_key(&handle) {
            return false;
        }
        debug!(?handle, ?rtp_peer, "opening session");
        let session = Session::spawn(
            handle.clone(),
            queue,
            subscription,
            rtp_peer,
            rtp_socket,
            rtcp_socket,
            frontend_id,
            source_id,
            mux,
            pids,
        );
        sessions.insert(handle, session);
        true
    }

    /// `spec.md` §4.1 `update_pids`: registry lock, look up, then the
    /// session lock to copy in the new filter. A lookup miss is a silent
    /// no-op (`spec.md` §7: callers acting on a handle the registry no
    /// longer recognizes are not a typed error at this layer).
    pub fn update_pids(&self, handle: &H, pids: PidFilter) {
        let sessions = self.sessions.lock();
        if let Some(session) = sessions.get(handle) {
            debug!(?handle, "updating PID filter");
            session.set_pid_filter(pids);
        }
    }

    /// `spec.md` §4.1 `close`: remove from the map, release the registry
    /// lock, then mark the session's queue closed, broadcast its condition
    /// and join the streamer thread — all of which happens without the
    /// registry lock held.
    pub fn close(&self, handle: &H) {
        let removed = self.sessions.lock().remove(handle);
        if let Some(session) = removed {
            debug!(handle = ?handle, "closing session");
            session.close();
        }
    }

    /// Walk every live session under the registry lock, for the RTCP
    /// reporter's per-pass sweep (`spec.md` §4.3).
    pub(crate) fn for_each(&self, mut f: impl FnMut(&Session<H>)) {
        let sessions = self.sessions.lock();
        for session in sessions.values() {
            f(session);
        }
    }

    /// `spec.md` §5 "Full shutdown: registry must be empty (asserted)".
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
