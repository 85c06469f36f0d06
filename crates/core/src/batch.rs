//! The per-session send batch: a fixed-capacity scatter-gather array of RTP
//! datagram buffers, and the RTP header layout written into each one
//! (`spec.md` §3 "Send batch", §4.2 "RTP header", §9 "Batched vectored
//! send").
//!
//! This module only owns the buffer layout and the header/rollover
//! mechanics; the actual per-datagram sends and flush decision live in
//! [`crate::session`], which is where the RTP socket lives. See
//! `SPEC_FULL.md` §4.2 for why a flush is a tight loop of individual
//! datagram sends rather than one `sendmmsg`-style syscall.

/// Number of scatter-gather slots in one batch (`spec.md` §3).
pub const BATCH_SLOTS: usize = 128;
/// One MPEG-TS packet is always exactly this many bytes.
pub const TS_PACKET_LEN: usize = 188;
/// TS packets carried per RTP datagram.
pub const TS_PER_DATAGRAM: usize = 7;
/// RTP header size.
pub const RTP_HEADER_LEN: usize = 12;
/// Fixed slot size: one header plus seven TS packets (`spec.md` §3:
/// "each sized to exactly 7·188 + 12 = 1328 bytes").
pub const SLOT_CAPACITY: usize = RTP_HEADER_LEN + TS_PER_DATAGRAM * TS_PACKET_LEN;

const RTP_VERSION: u8 = 0x80;
const RTP_PAYLOAD_TYPE_MP2T: u8 = 33;
const SSRC_FILLER: u8 = 0xA5;

/// Write a 12-byte RTP header in place, per `spec.md` §4.2's byte table.
pub fn write_rtp_header(buf: &mut [u8], seq: u16, timestamp: u32) {
    debug_assert!(buf.len() >= RTP_HEADER_LEN);
    buf[0] = RTP_VERSION;
    buf[1] = RTP_PAYLOAD_TYPE_MP2T;
    buf[2..4].copy_from_slice(&seq.to_be_bytes());
    buf[4..8].copy_from_slice(&timestamp.to_be_bytes());
    buf[8..12].fill(SSRC_FILLER);
}

/// The 128×1328 scatter-gather array and its fill cursor.
///
/// Invariants mirror `spec.md` §3 exactly: the cursor slot is the only
/// non-full one, every slot before it is full, and each slot holds one RTP
/// header followed by zero or more whole TS packets.
pub struct SendBatch {
    slots: Box<[[u8; SLOT_CAPACITY]]>,
    lens: [usize; BATCH_SLOTS],
    cursor: usize,
}

impl SendBatch {
    /// Allocate the batch and write the initial header into slot 0
    /// (`spec.md` §4.1 `open`: "writes the initial RTP header into buffer
    /// 0").
    pub fn new(seq: u16, timestamp: u32) -> Self {
        let mut slots = vec![[0u8; SLOT_CAPACITY]; BATCH_SLOTS].into_boxed_slice();
        write_rtp_header(&mut slots[0], seq, timestamp);
        let mut lens = [0usize; BATCH_SLOTS];
        lens[0] = RTP_HEADER_LEN;
        SendBatch { slots, lens, cursor: 0 }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn cursor_len(&self) -> usize {
        self.lens[self.cursor]
    }

    pub fn is_cursor_full(&self) -> bool {
        self.lens[self.cursor] == SLOT_CAPACITY
    }

    pub fn is_last_slot(&self) -> bool {
        self.cursor == BATCH_SLOTS - 1
    }

    pub fn slot0_len(&self) -> usize {
        self.lens[0]
    }

    /// Append one whole TS packet to the cursor slot. Caller must ensure it
    /// fits (`cursor_len() + TS_PACKET_LEN <= SLOT_CAPACITY`).
    pub fn append_ts_packet(&mut self, packet: &[u8]) {
        debug_assert_eq!(packet.len(), TS_PACKET_LEN);
        let len = self.lens[self.cursor];
        debug_assert!(len + TS_PACKET_LEN <= SLOT_CAPACITY);
        self.slots[self.cursor][len..len + TS_PACKET_LEN].copy_from_slice(packet);
        self.lens[self.cursor] = len + TS_PACKET_LEN;
    }

    /// Move the cursor to the next slot and stamp a fresh header into it.
    /// Caller must check `!is_last_slot()` first.
    pub fn advance_cursor(&mut self, seq: u16, timestamp: u32) {
        debug_assert!(!self.is_last_slot());
        self.cursor += 1;
        write_rtp_header(&mut self.slots[self.cursor], seq, timestamp);
        self.lens[self.cursor] = RTP_HEADER_LEN;
    }

    /// Number of full slots to hand to the vectored send: the cursor slot
    /// itself if it just became full, otherwise everything strictly before
    /// it (`spec.md` §4.2 Flush: "if the cursor slot is itself full, send
    /// `cursor+1` packets ... else send `cursor` packets").
    pub fn full_slot_count(&self) -> usize {
        if self.is_cursor_full() { self.cursor + 1 } else { self.cursor }
    }

    /// Borrow slot `i`'s current bytes (header plus whatever TS packets have
    /// been appended to it so far).
    pub fn slot(&self, i: usize) -> &[u8] {
        &self.slots[i][..self.lens[i]]
    }

    /// Post-flush rollover: if `sent` didn't include the cursor slot, carry
    /// its partial content — header included — down to slot 0; otherwise
    /// slot 0 is left empty. Always resets the cursor to 0 (`spec.md` §4.2
    /// "Rollover").
    pub fn rollover(&mut self, sent: usize) {
        if sent <= self.cursor {
            let tail_len = self.lens[self.cursor];
            let mut tail = [0u8; SLOT_CAPACITY];
            tail[..tail_len].copy_from_slice(&self.slots[self.cursor][..tail_len]);
            self.slots[0][..tail_len].copy_from_slice(&tail[..tail_len]);
            self.lens[0] = tail_len;
        } else {
            self.lens[0] = 0;
        }
        self.cursor = 0;
    }

    /// If slot 0 is empty after a rollover, stamp a fresh header into it so
    /// the next TS append finds one already in place (`spec.md` §4.2:
    /// "the next TS append will find a header already in place").
    pub fn write_header_if_empty(&mut self, seq: u16, timestamp: u32) {
        if self.lens[0] == 0 {
            write_rtp_header(&mut self.slots[0], seq, timestamp);
            self.lens[0] = RTP_HEADER_LEN;
        }
    }
}
