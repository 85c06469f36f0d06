//! PID filter: the set of MPEG-TS PIDs a session wants delivered.
//!
//! `spec.md` §3/§4.2: either "all PIDs" or a sorted, deduplicated ascending
//! list of 13-bit PIDs. Lookups take the fast path introduced in §4.2 (the
//! caller tracks the last accepted PID across consecutive TS packets and
//! skips the scan when it repeats); [`PidFilter::accepts`] itself only
//! implements the early-exiting linear scan over the sorted list.

/// Highest value a 13-bit MPEG-TS PID can take.
pub const MAX_PID: u16 = 0x1FFF;

/// A session's PID filter: everything, or an explicit sorted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PidFilter {
    /// Pass every PID through unfiltered.
    All,
    /// Pass only PIDs present in this sorted, deduplicated list.
    Selected(Vec<u16>),
}

impl PidFilter {
    /// Build a filter from an arbitrary PID list, sorting and deduplicating
    /// it as `spec.md` §3 requires ("The PID filter list is sorted and
    /// deduplicated when \"all\" is false").
    pub fn selected(mut pids: Vec<u16>) -> Self {
        pids.sort_unstable();
        pids.dedup();
        PidFilter::Selected(pids)
    }

    /// Render the filter for an RTCP `pids=` field: `"all"` for the
    /// unfiltered case, otherwise a comma-separated decimal list in the
    /// filter's sorted order (`spec.md` §4.3 `pids=<p1>,<p2>,…`).
    pub fn render_for_rtcp(&self) -> String {
        match self {
            PidFilter::All => "all".to_string(),
            PidFilter::Selected(pids) => pids
                .iter()
                .map(u16::to_string)
                .collect::<Vec<_>>()
                .join(","),
        }
    }

    /// Whether `pid` is admitted by this filter.
    ///
    /// For [`PidFilter::Selected`], relies on sort order to early-exit: once
    /// a list entry exceeds the candidate PID, nothing further can match
    /// (`spec.md` §4.2, "early-exiting when the list value exceeds the
    /// candidate PID").
    pub fn accepts(&self, pid: u16) -> bool {
        match self {
            PidFilter::All => true,
            PidFilter::Selected(pids) => {
                for &p in pids {
                    if pid < p {
                        break;
                    }
                    if p == pid {
                        return true;
                    }
                }
                false
            }
        }
    }
}

/// Extract the 13-bit PID from a 188-byte MPEG-TS packet's first 3 bytes.
///
/// `spec.md` §4.2: `PID = ((byte1 & 0x1F) << 8) | byte2`, where `byte1` is
/// offset 1 of the TS packet (offset 0 is the sync byte `0x47`).
#[inline]
pub fn ts_packet_pid(packet: &[u8]) -> u16 {
    debug_assert!(packet.len() >= 3);
    (((packet[1] & 0x1F) as u16) << 8) | packet[2] as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_accepts_everything() {
        let f = PidFilter::All;
        assert!(f.accepts(0));
        assert!(f.accepts(MAX_PID));
    }

    #[test]
    fn selected_sorts_and_dedups() {
        let f = PidFilter::selected(vec![0x100, 0x000, 0x100, 0x1FFE]);
        assert_eq!(f, PidFilter::Selected(vec![0x000, 0x100, 0x1FFE]));
    }

    #[test]
    fn selected_admission_matches_s4() {
        // S4 — filter = sorted [0x000, 0x100, 0x1FFE]
        let f = PidFilter::selected(vec![0x000, 0x100, 0x1FFE]);
        assert!(f.accepts(0x000));
        assert!(!f.accepts(0x042));
        assert!(f.accepts(0x100));
        assert!(!f.accepts(0x200));
        assert!(f.accepts(0x1FFE));
    }

    #[test]
    fn pid_extraction() {
        let mut pkt = [0u8; 188];
        pkt[0] = 0x47;
        pkt[1] = 0x01; // top 5 bits of PID
        pkt[2] = 0x00;
        assert_eq!(ts_packet_pid(&pkt), 0x100);
    }

    #[test]
    fn pid_extraction_masks_high_bits() {
        let mut pkt = [0u8; 188];
        pkt[1] = 0xFF; // transport_error/payload_unit_start/priority bits set
        pkt[2] = 0xFE;
        assert_eq!(ts_packet_pid(&pkt), 0x1FFE);
    }
}
