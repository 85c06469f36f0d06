//! Coarse wall-clock tick shared by the RTP header timestamp (`spec.md`
//! §4.2, §9 Open Questions: "coarse seconds-resolution tick plus the
//! sequence number rather than a 90 kHz media clock... preserved").
//!
//! `spec.md` attributes this tick to an external `dispatch_clock`
//! collaborator outside this crate's scope (see `SPEC_FULL.md` §4.4); this
//! crate has no such collaborator, so it reads the wall clock directly.

use std::time::{SystemTime, UNIX_EPOCH};

/// Current UNIX time in seconds, truncated to 32 bits (wraps in 2106, same
/// as the original's `uint32_t` tick).
pub fn coarse_secs() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coarse_secs_is_plausible() {
        // Any timestamp from 2020-01-01 onward, sanity-checking the clock
        // isn't returning zero or something absurd.
        assert!(coarse_secs() > 1_577_836_800);
    }
}
