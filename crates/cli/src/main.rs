//! Loopback demo/test harness for the `satip-rtp` streaming core.
//!
//! Opens one session against a synthetic DVB-S mux descriptor, feeds it a
//! run of synthetic MPEG-TS payloads from a background generator thread,
//! and prints receipt-side stats for the RTP and RTCP datagrams a real
//! SAT>IP client would have received. This is a developer harness for
//! manually verifying framing end-to-end — the real RTSP control surface,
//! tuner frontend and PID-list parser are external collaborators this
//! binary does not reimplement.

use std::net::{SocketAddr, UdpSocket};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use socket2::Socket;

use satip_rtp::mux::{
    DeliverySystem, Fec, Modulation, MuxDescriptor, Pilot, Polarization, RollOff, SatelliteParams,
    SystemParams,
};
use satip_rtp::{Config, Core, PidFilter, StreamingMessage, StreamingQueue, Subscription};

#[derive(Parser)]
#[command(
    name = "satip-rtp-demo",
    about = "Loopback demo/test harness for the satip-rtp streaming core"
)]
struct Args {
    /// Number of synthetic 188-byte MPEG-TS packets to generate.
    #[arg(long, default_value_t = 2_000)]
    packets: usize,

    /// 13-bit PID stamped into every synthetic TS packet.
    #[arg(long, default_value_t = 0x100)]
    pid: u16,

    /// Print the decoded RTCP report body in addition to the summary.
    #[arg(long)]
    verbose_rtcp: bool,
}

fn main() {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let (rtp_recv, rtcp_recv, rtp_peer) = bind_receiver_pair();
    rtp_recv.set_read_timeout(Some(Duration::from_millis(500))).unwrap();
    rtcp_recv.set_read_timeout(Some(Duration::from_millis(500))).unwrap();

    let rtp_send = UdpSocket::bind("127.0.0.1:0").expect("bind RTP send socket");
    rtp_send.connect(rtp_peer).expect("connect RTP send socket to receiver");
    let rtcp_send = UdpSocket::bind("127.0.0.1:0").expect("bind RTCP send socket");

    let core: Core<String> = Core::init(Config::default());

    let queue = Arc::new(StreamingQueue::new());
    let subscription = Arc::new(Subscription::new());
    let mux = demo_mux();
    let handle = "demo".to_string();

    let opened = core.open(
        handle.clone(),
        queue.clone(),
        subscription.clone(),
        rtp_peer,
        Socket::from(rtp_send),
        Socket::from(rtcp_send),
        1,
        0,
        mux,
        PidFilter::selected(vec![args.pid]),
    );
    assert!(opened, "demo session handle unexpectedly already in use");

    let producer = spawn_producer(queue, args.pid, args.packets);

    let (datagrams, bytes) = drain_rtp(&rtp_recv);
    println!("received {datagrams} RTP datagrams, {bytes} bytes total");

    let mut buf = [0u8; 2048];
    match rtcp_recv.recv_from(&mut buf) {
        Ok((n, _)) => {
            println!("received an RTCP report, {n} bytes");
            if args.verbose_rtcp && n > 16 {
                println!("body: {}", String::from_utf8_lossy(&buf[16..n]));
            }
        }
        Err(err) => println!("no RTCP report observed within the wait window: {err}"),
    }

    producer.join().expect("producer thread panicked");
    core.close(&handle);
    core.done();
}

fn demo_mux() -> MuxDescriptor {
    MuxDescriptor {
        delivery_system: DeliverySystem::DvbS,
        modulation: Modulation::Qpsk,
        frequency_hz: 11_495_000_000,
        params: SystemParams::Satellite(SatelliteParams {
            polarization: Polarization::Horizontal,
            pilot: Pilot::On,
            rolloff: RollOff::R35,
            symbol_rate_hz: 22_000_000,
            fec: Fec::Rate(3, 4),
        }),
    }
}

/// Bind an adjacent RTP/RTCP receiver pair (`spec.md` §3: "RTCP peer
/// address derived by setting port to RTP-port + 1").
fn bind_receiver_pair() -> (UdpSocket, UdpSocket, SocketAddr) {
    for port in 30_000..30_100 {
        let rtp_addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        let rtcp_addr: SocketAddr = format!("127.0.0.1:{}", port + 1).parse().unwrap();
        if let (Ok(rtp), Ok(rtcp)) = (UdpSocket::bind(rtp_addr), UdpSocket::bind(rtcp_addr)) {
            return (rtp, rtcp, rtp_addr);
        }
    }
    panic!("could not find a free adjacent RTP/RTCP port pair");
}

fn spawn_producer(
    queue: Arc<StreamingQueue>,
    pid: u16,
    packets: usize,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut ts_packet = [0u8; 188];
        ts_packet[0] = 0x47;
        ts_packet[1] = ((pid >> 8) as u8) & 0x1F;
        ts_packet[2] = (pid & 0xFF) as u8;

        let mut sent = 0usize;
        while sent < packets {
            let batch = (packets - sent).min(7);
            let mut payload = Vec::with_capacity(batch * 188);
            for _ in 0..batch {
                payload.extend_from_slice(&ts_packet);
            }
            queue.push(StreamingMessage::MpegTs(payload));
            sent += batch;
        }
        queue.push(StreamingMessage::Exit);
    })
}

fn drain_rtp(socket: &UdpSocket) -> (u64, u64) {
    let mut datagrams = 0u64;
    let mut bytes = 0u64;
    let mut buf = [0u8; 2048];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((n, _)) => {
                datagrams += 1;
                bytes += n as u64;
            }
            Err(_) => break,
        }
    }
    (datagrams, bytes)
}
