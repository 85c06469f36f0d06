//! The shared RTCP reporter thread (`spec.md` §4.3).

use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use crate::handle::Handle;
use crate::mux::{round_div, DeliverySystem, SystemParams};
use crate::registry::SessionRegistry;
use crate::session::Session;

/// `spec.md` §2: "Every ~150 ms walks the registry".
pub const DEFAULT_RTCP_INTERVAL: Duration = Duration::from_millis(150);

const RTCP_APP_HEADER_LEN: usize = 16;
/// `spec.md` §4.3: "Body is bounded to `RTCP_PAYLOAD - 16` bytes (≤ 1404)".
const RTCP_MAX_BODY: usize = 1404;

struct ShutdownSignal {
    stop: Mutex<bool>,
    condvar: Condvar,
}

/// Owns the lifetime of the shared RTCP reporter thread (`spec.md` §2, §5).
pub struct RtcpReporter {
    signal: Arc<ShutdownSignal>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl RtcpReporter {
    /// Start the reporter thread. It sleeps for `interval` (retrying across
    /// spurious wakeups the way the original retries across signal
    /// interruption — see `SPEC_FULL.md` §5), then walks `registry` under
    /// its lock and emits one RTCP datagram per streaming session.
    pub fn spawn<H: Handle + 'static>(
        registry: Arc<SessionRegistry<H>>,
        interval: Duration,
    ) -> Self {
        let signal = Arc::new(ShutdownSignal {
            stop: Mutex::new(false),
            condvar: Condvar::new(),
        });
        let worker_signal = signal.clone();

        let thread = std::thread::spawn(move || {
            info!("RTCP reporter started");
            loop {
                {
                    let mut stop = worker_signal.stop.lock();
                    if *stop {
                        break;
                    }
                    worker_signal.condvar.wait_for(&mut stop, interval);
                    if *stop {
                        break;
                    }
                }
                registry.for_each(|session| report_one(session));
            }
            info!("RTCP reporter stopped");
        });

        RtcpReporter { signal, thread: Some(thread) }
    }

    /// Clear the run flag, wake the sleeping thread and join it
    /// (`spec.md` §5 "Full shutdown").
    pub fn stop(&mut self) {
        *self.signal.stop.lock() = true;
        self.signal.condvar.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RtcpReporter {
    fn drop(&mut self) {
        self.stop();
    }
}

fn report_one<H: Handle>(session: &Session<H>) {
    if !session.is_streaming() {
        return;
    }
    let Some(body) = build_report(session) else {
        return;
    };
    let packet = frame_app_packet(&body);
    if let Err(err) = session
        .rtcp_socket()
        .send_to(&packet, &session.rtcp_peer.into())
    {
        warn!(peer = %session.rtcp_peer, error = %err, "RTCP send failed");
        return;
    }
    debug!(peer = %session.rtcp_peer, len = packet.len(), "RTCP report sent");
}

/// Build the textual RTCP APP body for one session, per `spec.md` §4.3's
/// per-delivery-system grammars. Returns `None` for [`DeliverySystem::Other`]
/// ("emit no RTCP for this session").
fn build_report<H: Handle>(session: &Session<H>) -> Option<String> {
    let signal = session.signal_snapshot();
    let level = signal.level();
    let lock = signal.lock();
    let quality = signal.quality();
    let freq = session.mux.frequency_mhz();
    let pids = session.pid_filter_snapshot().render_for_rtcp();
    let fe = session.frontend_id;

    let body = match (&session.mux.delivery_system, &session.mux.params) {
        (DeliverySystem::DvbS, SystemParams::Satellite(sat))
        | (DeliverySystem::DvbS2, SystemParams::Satellite(sat)) => {
            let sys = session.mux.delivery_system.sys_str()?;
            let src = session.source_id;
            let pol = sat.polarization.as_str();
            let mtype = session.mux.modulation.dvbs_str();
            let pilot = sat.pilot.as_str();
            let rolloff = sat.rolloff.as_str();
            let sr = round_div(sat.symbol_rate_hz as u64, 1000);
            let fec = sat.fec.render();
            format!(
                "vers=1.0;src={src};tuner={fe},{level},{lock},{quality},{freq},{pol},{sys},{mtype},{pilot},{rolloff},{sr},{fec};pids={pids}"
            )
        }
        (DeliverySystem::DvbT, SystemParams::Terrestrial(ter))
        | (DeliverySystem::DvbT2, SystemParams::Terrestrial(ter)) => {
            let sys = session.mux.delivery_system.sys_str()?;
            let bw = ter.bandwidth.as_str();
            let tmode = ter.transmission_mode.as_str();
            let mtype = session.mux.modulation.qam_str();
            let gi = ter.guard_interval.as_str();
            let fec = ter.fec.render();
            let plp = render_u8(ter.plp_id);
            let t2id = render_u16(ter.t2_system_id);
            let sm = ter.siso_miso.map(|s| s.as_str()).unwrap_or("");
            format!(
                "vers=1.1;tuner={fe},{level},{lock},{quality},{freq},{bw},{sys},{tmode},{mtype},{gi},{fec},{plp},{t2id},{sm};pids={pids}"
            )
        }
        (DeliverySystem::DvbCAnnexA, SystemParams::Cable(cab))
        | (DeliverySystem::DvbCAnnexC, SystemParams::Cable(cab)) => {
            let sys = session.mux.delivery_system.sys_str()?;
            let mtype = session.mux.modulation.qam_str();
            let sr = round_div(cab.symbol_rate_hz as u64, 1000);
            let c2tft = cab.c2_tft.map(|v| v.as_str()).unwrap_or("");
            let ds = render_u8(cab.data_slice_id);
            let plp = render_u8(cab.plp_id);
            let specinv = cab.spec_inversion.map(|v| v.as_str()).unwrap_or("");
            format!(
                "vers=1.1;tuner={fe},{level},{lock},{quality},{freq},,{sys},{mtype},{sr},{c2tft},{ds},{plp},{specinv};pids={pids}"
            )
        }
        _ => return None,
    };
    Some(body)
}

fn render_u8(v: Option<u8>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

fn render_u16(v: Option<u16>) -> String {
    v.map(|x| x.to_string()).unwrap_or_default()
}

/// Frame a textual body into the RTCP APP packet shape from `spec.md`
/// §4.3's byte table.
fn frame_app_packet(body: &str) -> Vec<u8> {
    let mut payload = body.as_bytes().to_vec();
    if payload.len() > RTCP_MAX_BODY {
        payload.truncate(RTCP_MAX_BODY);
    }
    if payload.is_empty() {
        // "if its length is zero, one zero byte is inserted before padding
        // so that the length field is non-zero."
        payload.push(0);
    }
    let pre_pad_len = payload.len() as u16;
    let padded_len = payload.len().div_ceil(4) * 4;
    payload.resize(padded_len, 0);

    let total_len = RTCP_APP_HEADER_LEN + padded_len;
    let words_minus_one = ((total_len / 4) as u16).wrapping_sub(1);

    let mut packet = Vec::with_capacity(total_len);
    packet.push(0x80);
    packet.push(204);
    packet.extend_from_slice(&words_minus_one.to_be_bytes());
    packet.extend_from_slice(&0u32.to_be_bytes()); // SSRC
    packet.extend_from_slice(b"SES1");
    packet.extend_from_slice(&0u16.to_be_bytes()); // reserved
    packet.extend_from_slice(&pre_pad_len.to_be_bytes());
    packet.extend_from_slice(&payload);
    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mux::{Fec, Modulation, MuxDescriptor, Pilot, Polarization, RollOff, SatelliteParams};
    use crate::pid::PidFilter;
    use crate::queue::{StreamingQueue, Subscription};
    use crate::signal::{SignalScale, SignalStatus};
    use socket2::Socket;
    use std::net::{SocketAddr, UdpSocket};

    fn session_with(
        mux: MuxDescriptor,
        pids: PidFilter,
        signal: SignalStatus,
    ) -> Arc<Session<String>> {
        use crate::queue::StreamingMessage;
        use std::time::Duration;

        let rtp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let rtcp = UdpSocket::bind("127.0.0.1:0").unwrap();
        let rtp_peer: SocketAddr = rtp.local_addr().unwrap();
        rtp.connect(rtp_peer).unwrap();

        let queue = Arc::new(StreamingQueue::new());
        let subscription = Arc::new(Subscription::new());

        let session = Session::spawn(
            "s5".to_string(),
            queue.clone(),
            subscription,
            rtp_peer,
            Socket::from(rtp),
            Socket::from(rtcp),
            2,
            1,
            mux,
            pids,
        );
        queue.push(StreamingMessage::SignalStatus(signal));
        // Give the streamer thread a moment to drain the signal update.
        std::thread::sleep(Duration::from_millis(50));
        session
    }

    #[test]
    fn s5_dvbs_report_body() {
        let mux = MuxDescriptor {
            delivery_system: DeliverySystem::DvbS,
            modulation: Modulation::Qpsk,
            frequency_hz: 11_495_000_000,
            params: SystemParams::Satellite(SatelliteParams {
                polarization: Polarization::Horizontal,
                pilot: Pilot::Unknown,
                rolloff: RollOff::Unknown,
                symbol_rate_hz: 22_000_000,
                fec: Fec::Rate(3, 4),
            }),
        };
        let signal = SignalStatus {
            signal: 0x8000,
            signal_scale: SignalScale::Relative,
            snr: 0x4000,
            snr_scale: SignalScale::Relative,
        };
        let session = session_with(mux, PidFilter::selected(vec![100, 256]), signal);

        let body = build_report(&session).expect("DvbS must produce a report");
        assert_eq!(
            body,
            "vers=1.0;src=1;tuner=2,122,1,8,11495,H,dvbs,qpsk,,,22000,34;pids=100,256"
        );
        session.close();
    }

    #[test]
    fn other_delivery_system_produces_no_report() {
        let mux = MuxDescriptor {
            delivery_system: DeliverySystem::Other,
            modulation: Modulation::Other,
            frequency_hz: 0,
            params: SystemParams::None,
        };
        let session = session_with(mux, PidFilter::All, SignalStatus::default());
        assert!(build_report(&session).is_none());
        session.close();
    }

    #[test]
    fn frame_app_packet_has_expected_header() {
        let packet = frame_app_packet("vers=1.0;src=1;tuner=x;pids=1");
        assert_eq!(packet[0], 0x80);
        assert_eq!(packet[1], 204);
        assert_eq!(&packet[8..12], b"SES1");
        let len_field = u16::from_be_bytes([packet[2], packet[3]]);
        assert_eq!((len_field as usize + 1) * 4, packet.len());
    }

    #[test]
    fn frame_app_packet_pads_to_four_bytes() {
        let packet = frame_app_packet("abc"); // 3 bytes -> pads to 4
        assert_eq!(packet.len() % 4, 0);
        let body_len = u16::from_be_bytes([packet[14], packet[15]]);
        assert_eq!(body_len, 3);
    }

    #[test]
    fn frame_app_packet_empty_body_gets_sentinel_byte() {
        let packet = frame_app_packet("");
        let body_len = u16::from_be_bytes([packet[14], packet[15]]);
        assert_eq!(body_len, 1);
    }
}
