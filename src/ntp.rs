use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds between the NTP era (Jan 1, 1900) and the Unix epoch.
const SECONDS_1900_TO_1970: u32 = 0x83AA_7E80;

/// 64-bit NTP timestamp split into 32-bit seconds and fraction.
///
/// The all-zero value doubles as a "never" sentinel, e.g. no sender
/// report received yet.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NtpTime {
    /// Seconds since Jan 1, 1900.
    pub seconds: u32,
    /// Fractional second in 1/2^32 units.
    pub fraction: u32,
}

impl NtpTime {
    /// Current wall-clock time as an NTP timestamp.
    pub fn now() -> NtpTime {
        let dur = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();

        let seconds = (dur.as_secs() as u32).wrapping_add(SECONDS_1900_TO_1970);
        let fraction = (((dur.subsec_nanos() as u64) << 32) / 1_000_000_000) as u32;

        NtpTime { seconds, fraction }
    }

    /// Whether this is the zero sentinel.
    pub fn is_zero(&self) -> bool {
        self.seconds == 0 && self.fraction == 0
    }

    /// The middle 32 bits, which is the LSR format of RFC 3550, 6.4.1.
    pub fn middle_32(&self) -> u32 {
        self.seconds << 16 | self.fraction >> 16
    }

    /// Seconds elapsed from `self` to `later`.
    pub fn seconds_until(&self, later: NtpTime) -> f64 {
        const FRAC: f64 = (1_u64 << 32) as f64;

        let a = self.seconds as f64 + self.fraction as f64 / FRAC;
        let b = later.seconds as f64 + later.fraction as f64 / FRAC;

        b - a
    }
}
