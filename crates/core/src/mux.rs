//! Mux descriptor: the frozen tuner configuration snapshot used only to
//! format RTCP reports (`spec.md` §3, §4.3).

/// DVB delivery system the mux is tuned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySystem {
    DvbS,
    DvbS2,
    DvbT,
    DvbT2,
    DvbCAnnexA,
    DvbCAnnexC,
    /// Anything else: `spec.md` §4.3 says "Otherwise: emit no RTCP for this
    /// session."
    Other,
}

impl DeliverySystem {
    /// The `<sys>` token in the RTCP body grammars (`spec.md` §4.3).
    pub(crate) fn sys_str(self) -> Option<&'static str> {
        match self {
            DeliverySystem::DvbS => Some("dvbs"),
            DeliverySystem::DvbS2 => Some("dvbs2"),
            DeliverySystem::DvbT => Some("dvbt"),
            DeliverySystem::DvbT2 => Some("dvbt2"),
            DeliverySystem::DvbCAnnexA => Some("dvbc"),
            DeliverySystem::DvbCAnnexC => Some("dvbc2"),
            DeliverySystem::Other => None,
        }
    }
}

/// Modulation scheme (only the variants `spec.md`'s RTCP grammar names).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modulation {
    Qpsk,
    Psk8,
    Qam16,
    Qam32,
    Qam64,
    Qam128,
    Other,
}

impl Modulation {
    pub(crate) fn dvbs_str(self) -> &'static str {
        match self {
            Modulation::Qpsk => "qpsk",
            Modulation::Psk8 => "8psk",
            _ => "",
        }
    }

    pub(crate) fn qam_str(self) -> &'static str {
        match self {
            Modulation::Qam16 => "qam16",
            Modulation::Qam32 => "qam32",
            Modulation::Qam64 => "qam64",
            Modulation::Qam128 => "qam128",
            _ => "",
        }
    }
}

/// DVB-S/S2 polarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarization {
    Horizontal,
    Vertical,
    CircularLeft,
    CircularRight,
    Unknown,
}

impl Polarization {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Polarization::Horizontal => "H",
            Polarization::Vertical => "V",
            Polarization::CircularLeft => "L",
            Polarization::CircularRight => "R",
            Polarization::Unknown => "",
        }
    }
}

/// DVB-S2 pilot symbols setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pilot {
    On,
    Off,
    Unknown,
}

impl Pilot {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Pilot::On => "on",
            Pilot::Off => "off",
            Pilot::Unknown => "",
        }
    }
}

/// DVB-S2 roll-off factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollOff {
    R20,
    R25,
    R35,
    Unknown,
}

impl RollOff {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            RollOff::R20 => "20",
            RollOff::R25 => "25",
            RollOff::R35 => "35",
            RollOff::Unknown => "",
        }
    }
}

/// DVB-T/T2 channel bandwidth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bandwidth {
    Mhz1712,
    Mhz5,
    Mhz6,
    Mhz7,
    Mhz8,
    Mhz10,
    Unknown,
}

impl Bandwidth {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Bandwidth::Mhz1712 => "1.712",
            Bandwidth::Mhz5 => "5",
            Bandwidth::Mhz6 => "6",
            Bandwidth::Mhz7 => "7",
            Bandwidth::Mhz8 => "8",
            Bandwidth::Mhz10 => "10",
            Bandwidth::Unknown => "",
        }
    }
}

/// DVB-T/T2 transmission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransmissionMode {
    T1k,
    T2k,
    T4k,
    T8k,
    T16k,
    T32k,
    Unknown,
}

impl TransmissionMode {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            TransmissionMode::T1k => "1k",
            TransmissionMode::T2k => "2k",
            TransmissionMode::T4k => "4k",
            TransmissionMode::T8k => "8k",
            TransmissionMode::T16k => "16k",
            TransmissionMode::T32k => "32k",
            TransmissionMode::Unknown => "",
        }
    }
}

/// DVB-T/T2 guard interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardInterval {
    G1_4,
    G1_8,
    G1_16,
    G1_32,
    G1_128,
    G19_128,
    G19_256,
    Unknown,
}

impl GuardInterval {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            GuardInterval::G1_4 => "14",
            GuardInterval::G1_8 => "18",
            GuardInterval::G1_16 => "116",
            GuardInterval::G1_32 => "132",
            GuardInterval::G1_128 => "1128",
            GuardInterval::G19_128 => "19128",
            GuardInterval::G19_256 => "19256",
            GuardInterval::Unknown => "",
        }
    }
}

/// Forward error correction rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fec {
    Auto,
    None,
    Rate(u8, u8),
}

impl Fec {
    /// Render per `spec.md` §4.3: strip the `/` from `"a/b"`, AUTO/NONE
    /// render empty. Unlike the original C (`satip_rtcp_fec`), which
    /// rewrites through a fixed buffer and can run past its end if the `/`
    /// is absent, this just formats into an owned `String` — there is no
    /// buffer to overrun.
    pub fn render(self) -> String {
        match self {
            Fec::Auto | Fec::None => String::new(),
            Fec::Rate(a, b) => format!("{a}{b}"),
        }
    }
}

/// DVB-S/S2 specific parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SatelliteParams {
    pub polarization: Polarization,
    pub pilot: Pilot,
    pub rolloff: RollOff,
    pub symbol_rate_hz: u32,
    pub fec: Fec,
}

/// DVB-T2 SISO/MISO antenna mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SisoMiso {
    Siso,
    Miso,
}

impl SisoMiso {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SisoMiso::Siso => "0",
            SisoMiso::Miso => "1",
        }
    }
}

/// DVB-T/T2 specific parameters. `plp_id`, `t2_system_id` and `siso_miso`
/// are DVB-T2-only and render as empty fields for plain DVB-T
/// (`spec.md` §4.3 DVB-T/T2 grammar: `...,<fec>,<plp>,<t2id>,<sm>;pids=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrestrialParams {
    pub bandwidth: Bandwidth,
    pub transmission_mode: TransmissionMode,
    pub guard_interval: GuardInterval,
    pub fec: Fec,
    pub plp_id: Option<u8>,
    pub t2_system_id: Option<u16>,
    pub siso_miso: Option<SisoMiso>,
}

/// DVB-C2 time-frequency-slicing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum C2Tft {
    Identical,
    TimeSliced,
}

impl C2Tft {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            C2Tft::Identical => "0",
            C2Tft::TimeSliced => "1",
        }
    }
}

/// DVB-C2 spectral inversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpectralInversion {
    Off,
    On,
    Auto,
}

impl SpectralInversion {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            SpectralInversion::Off => "0",
            SpectralInversion::On => "1",
            SpectralInversion::Auto => "2",
        }
    }
}

/// DVB-C/C2 specific parameters. `c2_tft`, `data_slice_id`, `plp_id` and
/// `spec_inversion` are DVB-C2-only and render as empty fields for plain
/// DVB-C (`spec.md` §4.3 DVB-C/C2 grammar:
/// `...,<sr_kHz>,<c2tft>,<ds>,<plp>,<specinv>;pids=`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CableParams {
    pub symbol_rate_hz: u32,
    pub c2_tft: Option<C2Tft>,
    pub data_slice_id: Option<u8>,
    pub plp_id: Option<u8>,
    pub spec_inversion: Option<SpectralInversion>,
}

/// Delivery-system-specific parameters, discriminated together with
/// [`DeliverySystem`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemParams {
    Satellite(SatelliteParams),
    Terrestrial(TerrestrialParams),
    Cable(CableParams),
    None,
}

/// Frozen mux configuration snapshot (`spec.md` §3 "Tuner descriptor").
///
/// Immutable after session creation; read lock-free by the RTCP reporter
/// thread (`spec.md` §5 "Shared resources").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MuxDescriptor {
    pub delivery_system: DeliverySystem,
    pub modulation: Modulation,
    pub frequency_hz: u64,
    pub params: SystemParams,
}

impl MuxDescriptor {
    /// `tuner=` field rendering is delegated to [`crate::rtcp::build_report`];
    /// this accessor just exposes the frequency in MHz the way every
    /// delivery-system grammar in `spec.md` §4.3 wants it (`%.f` on
    /// `freq / 1_000_000.0` in the original C, i.e. rounded to the nearest
    /// MHz, not truncated).
    pub fn frequency_mhz(&self) -> u64 {
        round_div(self.frequency_hz, 1_000_000)
    }
}

/// Round `value / divisor` to the nearest integer instead of truncating,
/// matching the original's `%.f`-formatted floating point division (used for
/// both the tuner frequency in MHz and the symbol rate in kHz, `spec.md`
/// §4.3). `divisor` is always a compile-time constant (`1_000_000` or
/// `1_000`) at every call site, so this never sees a zero divisor.
pub(crate) fn round_div(value: u64, divisor: u64) -> u64 {
    (value + divisor / 2) / divisor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fec_strips_slash() {
        assert_eq!(Fec::Rate(3, 4).render(), "34");
    }

    #[test]
    fn fec_auto_and_none_are_empty() {
        assert_eq!(Fec::Auto.render(), "");
        assert_eq!(Fec::None.render(), "");
    }

    #[test]
    fn frequency_conversion() {
        let mux = MuxDescriptor {
            delivery_system: DeliverySystem::DvbS2,
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
        assert_eq!(mux.frequency_mhz(), 11_495);
    }

    #[test]
    fn frequency_conversion_rounds_half_mhz_up() {
        // A real half-MHz transponder frequency: truncating division gives
        // 11727, but the original's `%.f`-on-float rendering rounds to 11728.
        let mux = MuxDescriptor {
            delivery_system: DeliverySystem::DvbS2,
            modulation: Modulation::Qpsk,
            frequency_hz: 11_727_500_000,
            params: SystemParams::None,
        };
        assert_eq!(mux.frequency_mhz(), 11_728);
    }
}
