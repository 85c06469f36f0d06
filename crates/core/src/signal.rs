//! Cached tuner signal status and the RTCP level/quality scaling rules.
//!
//! `spec.md` §3: "Cached signal status: most recent signal/SNR reading with
//! scale tags." §4.3 spells out the scaling formulas this module implements
//! exactly as given, including the Open Question that the decibel scaling
//! saturates at the clamp ceiling for any positive input — preserved as-is.

/// How a raw signal/SNR reading is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SignalScale {
    #[default]
    Unknown,
    Relative,
    Decibel,
}

/// Most recent signal/SNR reading reported by the tuner frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SignalStatus {
    pub signal: u32,
    pub signal_scale: SignalScale,
    pub snr: u32,
    pub snr_scale: SignalScale,
}

impl SignalStatus {
    /// `lock` bit: 1 if the signal reading is nonzero, 0 otherwise
    /// (`spec.md` §4.3: "If signal is zero, lock = 0; otherwise lock = 1").
    pub fn lock(&self) -> u8 {
        if self.signal > 0 { 1 } else { 0 }
    }

    /// Signal `level` field, clamped to `0..=240`.
    pub fn level(&self) -> u8 {
        scale_level(self.signal, self.signal_scale)
    }

    /// Signal `quality` field, clamped to `0..=15`.
    ///
    /// Note: per the original source (preserved per `spec.md` §9 Open
    /// Questions), quality is derived from `signal`, not `snr` — the SNR
    /// reading and its scale tag are carried on the struct but the
    /// `quality` formula uses `self.signal` in both scale branches, exactly
    /// matching `satip_rtcp_build`'s `rtp->sig.signal` use under the
    /// `rtp->sig.snr_scale` switch.
    pub fn quality(&self) -> u8 {
        scale_quality(self.signal, self.snr_scale)
    }
}

fn scale_level(raw: u32, scale: SignalScale) -> u8 {
    let level = match scale {
        SignalScale::Relative => (raw as u64 * 245) / 0xFFFF,
        SignalScale::Decibel => raw as u64 * 900_000,
        SignalScale::Unknown => 0,
    };
    level.clamp(0, 240) as u8
}

fn scale_quality(raw: u32, scale: SignalScale) -> u8 {
    let quality = match scale {
        SignalScale::Relative => (raw as u64 * 16) / 0xFFFF,
        SignalScale::Decibel => raw as u64 * 100_000,
        SignalScale::Unknown => 0,
    };
    quality.clamp(0, 15) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_relative_scaling() {
        // S5 — relative signal 0x8000: level = 122, quality = 8
        let sig = SignalStatus {
            signal: 0x8000,
            signal_scale: SignalScale::Relative,
            snr: 0x4000,
            snr_scale: SignalScale::Relative,
        };
        assert_eq!(sig.level(), 122);
        assert_eq!(sig.quality(), 8);
        assert_eq!(sig.lock(), 1);
    }

    #[test]
    fn zero_signal_is_unlocked() {
        let sig = SignalStatus::default();
        assert_eq!(sig.lock(), 0);
        assert_eq!(sig.level(), 0);
    }

    #[test]
    fn decibel_scale_saturates() {
        let sig = SignalStatus {
            signal: 1,
            signal_scale: SignalScale::Decibel,
            snr: 1,
            snr_scale: SignalScale::Decibel,
        };
        assert_eq!(sig.level(), 240);
        assert_eq!(sig.quality(), 15);
    }

    #[test]
    fn relative_clamps_to_ceiling() {
        let sig = SignalStatus {
            signal: 0xFFFF,
            signal_scale: SignalScale::Relative,
            snr: 0xFFFF,
            snr_scale: SignalScale::Relative,
        };
        assert_eq!(sig.level(), 240);
        assert_eq!(sig.quality(), 15);
    }
}
