//! End-to-end loopback tests for the scenarios in `spec.md` §8.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use socket2::Socket;

use satip_rtp::mux::{DeliverySystem, Modulation, MuxDescriptor, SystemParams};
use satip_rtp::{Config, Core, PidFilter, StreamingMessage, StreamingQueue, Subscription};

const TS_PACKET_LEN: usize = 188;
const RTP_HEADER_LEN: usize = 12;
const SLOT_CAPACITY: usize = RTP_HEADER_LEN + 7 * TS_PACKET_LEN;

fn ts_packet(pid: u16) -> [u8; TS_PACKET_LEN] {
    let mut pkt = [0u8; TS_PACKET_LEN];
    pkt[0] = 0x47;
    pkt[1] = ((pid >> 8) as u8) & 0x1F;
    pkt[2] = (pid & 0xFF) as u8;
    pkt
}

fn dummy_mux() -> MuxDescriptor {
    MuxDescriptor {
        delivery_system: DeliverySystem::Other,
        modulation: Modulation::Other,
        frequency_hz: 0,
        params: SystemParams::None,
    }
}

/// Bind a receiver and a connected sender on adjacent loopback ports, so the
/// sender can play the role of a session's RTP/RTCP socket pair.
fn bind_session_sockets() -> (Socket, Socket, UdpSocket, SocketAddr) {
    for port in 40_000..40_200 {
        let rtp_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let rtcp_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();
        let Ok(rtp_recv) = UdpSocket::bind(rtp_addr) else { continue };
        let Ok(_rtcp_recv) = UdpSocket::bind(rtcp_addr) else { continue };
        let rtp_send = UdpSocket::bind("127.0.0.1:0").unwrap();
        rtp_send.connect(rtp_addr).unwrap();
        let rtcp_send = UdpSocket::bind("127.0.0.1:0").unwrap();
        rtp_recv.set_read_timeout(Some(Duration::from_millis(300))).unwrap();
        return (Socket::from(rtp_send), Socket::from(rtcp_send), rtp_recv, rtp_addr);
    }
    panic!("no free adjacent loopback port pair");
}

fn open_session(
    core: &Core<String>,
    handle: &str,
    queue: Arc<StreamingQueue>,
    pids: PidFilter,
) -> UdpSocket {
    let (rtp_socket, rtcp_socket, rtp_recv, rtp_peer) = bind_session_sockets();
    let opened = core.open(
        handle.to_string(),
        queue,
        Arc::new(Subscription::new()),
        rtp_peer,
        rtp_socket,
        rtcp_socket,
        0,
        0,
        dummy_mux(),
        pids,
    );
    assert!(opened);
    rtp_recv
}

/// S2 — exactly 7 TS packets, PID all accepted: cursor advances to slot 1,
/// slot 0 is full, nothing is sent yet.
#[test]
fn s2_seven_packets_do_not_flush() {
    let core: Core<String> = Core::init(Config::default());
    let queue = Arc::new(StreamingQueue::new());
    let rtp_recv = open_session(&core, "s2", queue.clone(), PidFilter::All);

    let mut payload = Vec::with_capacity(7 * TS_PACKET_LEN);
    for _ in 0..7 {
        payload.extend_from_slice(&ts_packet(0x100));
    }
    queue.push(StreamingMessage::MpegTs(payload));
    std::thread::sleep(Duration::from_millis(100));

    let mut buf = [0u8; 2048];
    assert!(rtp_recv.recv_from(&mut buf).is_err(), "no flush expected yet");

    // An 8th packet lands in the new cursor slot; still no send.
    queue.push(StreamingMessage::MpegTs(ts_packet(0x100).to_vec()));
    std::thread::sleep(Duration::from_millis(100));
    assert!(rtp_recv.recv_from(&mut buf).is_err(), "still no flush expected");

    core.close(&"s2".to_string());
    core.done();
}

/// S3 — force a flush by filling the batch: 128·7 TS packets produce
/// exactly one run of 128 datagrams of 1328 bytes, sequences s..s+127.
#[test]
fn s3_full_batch_flushes_once() {
    let core: Core<String> = Core::init(Config::default());
    let queue = Arc::new(StreamingQueue::new());
    let rtp_recv = open_session(&core, "s3", queue.clone(), PidFilter::All);

    let mut payload = Vec::with_capacity(128 * 7 * TS_PACKET_LEN);
    for _ in 0..(128 * 7) {
        payload.extend_from_slice(&ts_packet(0x100));
    }
    queue.push(StreamingMessage::MpegTs(payload));

    let mut buf = [0u8; 2048];
    let mut seqs = Vec::new();
    loop {
        match rtp_recv.recv_from(&mut buf) {
            Ok((n, _)) => {
                assert_eq!(n, SLOT_CAPACITY);
                assert_eq!(buf[0], 0x80);
                assert_eq!(buf[1], 33);
                seqs.push(u16::from_be_bytes([buf[2], buf[3]]));
            }
            Err(_) => break,
        }
    }

    assert_eq!(seqs.len(), 128, "exactly one full batch of 128 datagrams");
    for w in seqs.windows(2) {
        assert_eq!(w[1], w[0].wrapping_add(1), "sequence numbers must be contiguous");
    }

    core.close(&"s3".to_string());
    core.done();
}

/// S4 — PID filter admission: only PIDs present in the filter are packed.
#[test]
fn s4_pid_filter_admits_only_listed_pids() {
    let core: Core<String> = Core::init(Config::default());
    let queue = Arc::new(StreamingQueue::new());
    let filter = PidFilter::selected(vec![0x000, 0x100, 0x1FFE]);
    let rtp_recv = open_session(&core, "s4", queue.clone(), filter);

    // One packet each for 0x000, 0x042, 0x100, 0x200, 0x1FFE, then force a
    // flush with filler packets on an accepted PID so admitted packets
    // become observable.
    let mut payload = Vec::new();
    for pid in [0x000u16, 0x042, 0x100, 0x200, 0x1FFE] {
        payload.extend_from_slice(&ts_packet(pid));
    }
    queue.push(StreamingMessage::MpegTs(payload));

    // 3 of the 5 packets above were accepted (0x000, 0x100, 0x1FFE), leaving
    // slot 0 with 4 free TS-packet slots before it's full; then 127 more
    // full slots complete the batch and trigger exactly one flush.
    let mut filler = Vec::with_capacity((4 + 127 * 7) * TS_PACKET_LEN);
    for _ in 0..(4 + 127 * 7) {
        filler.extend_from_slice(&ts_packet(0x100));
    }
    queue.push(StreamingMessage::MpegTs(filler));

    let mut buf = [0u8; 2048];
    let (n, _) = rtp_recv.recv_from(&mut buf).expect("expected the flushed slot 0");
    assert_eq!(n, SLOT_CAPACITY);
    // Slot 0 holds 3 accepted TS packets (0x000, 0x100, 0x1FFE) followed by
    // filler: extract the first 3 TS packets after the header and check PIDs.
    let pid_of = |pkt: &[u8]| (((pkt[1] & 0x1F) as u16) << 8) | pkt[2] as u16;
    let body = &buf[RTP_HEADER_LEN..n];
    assert_eq!(pid_of(&body[0..TS_PACKET_LEN]), 0x000);
    assert_eq!(pid_of(&body[TS_PACKET_LEN..2 * TS_PACKET_LEN]), 0x100);
    assert_eq!(pid_of(&body[2 * TS_PACKET_LEN..3 * TS_PACKET_LEN]), 0x1FFE);

    core.close(&"s4".to_string());
    core.done();
}
