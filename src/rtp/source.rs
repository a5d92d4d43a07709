use crate::config::{MAX_DROPOUT, MAX_MISORDER, MIN_SEQUENTIAL};

const RTP_SEQ_MOD: u32 = 1 << 16;

/// Per-source sequence and jitter accounting, RFC 3550 appendix A.1 and
/// A.8, plus the A.3 snapshot used for reception report blocks.
#[derive(Debug, Default)]
pub struct SourceState {
    max_seq: u16,
    cycles: u32,
    base_seq: u32,
    bad_seq: u32,
    probation: u32,
    received: u32,
    expected_prior: u32,
    received_prior: u32,
    transit: u32,
    jitter: f64,
}

/// One cycle's numbers for a reception report block.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ReportSnapshot {
    pub fraction: u8,
    pub lost: u32,
    pub extended_max: u32,
    pub jitter: u32,
}

impl SourceState {
    /// Seed the state from `seq`. `first` marks a brand new source which
    /// must clear probation before it is trusted.
    pub(crate) fn init_seq(&mut self, seq: u16, first: bool) {
        self.base_seq = seq as u32;
        self.max_seq = seq;
        self.bad_seq = RTP_SEQ_MOD + 1; // so seq == bad_seq is false
        self.cycles = 0;
        self.received = 0;
        self.received_prior = 0;
        self.expected_prior = 0;

        if first {
            self.max_seq = seq.wrapping_sub(1);
            self.probation = MIN_SEQUENTIAL;
        }
    }

    /// Validate one sequence number. True when the packet counts as
    /// received.
    pub(crate) fn update_seq(&mut self, seq: u16) -> bool {
        let udelta = seq.wrapping_sub(self.max_seq);

        // Source is not valid until MIN_SEQUENTIAL packets with
        // sequential sequence numbers have been received.
        if self.probation > 0 {
            // packet is in sequence
            if seq == self.max_seq.wrapping_add(1) {
                self.probation -= 1;
                self.max_seq = seq;
                if self.probation == 0 {
                    self.init_seq(seq, false);
                    self.received += 1;
                    return true;
                }
            } else {
                self.probation = MIN_SEQUENTIAL - 1;
                self.max_seq = seq;
            }
            return false;
        } else if udelta < MAX_DROPOUT {
            // in order, with permissible gap
            if seq < self.max_seq {
                // sequence number wrapped, count another 64K cycle
                self.cycles += RTP_SEQ_MOD;
            }
            self.max_seq = seq;
        } else if udelta as u32 <= RTP_SEQ_MOD - MAX_MISORDER as u32 {
            // the sequence number made a very large jump
            if seq as u32 == self.bad_seq {
                // two sequential packets: assume the other side restarted
                // without telling us and re-sync
                self.init_seq(seq, true);
            } else {
                self.bad_seq = (seq as u32 + 1) & (RTP_SEQ_MOD - 1);
                return false;
            }
        } else {
            // duplicate or reordered packet
        }

        self.received += 1;
        true
    }

    /// Interarrival jitter, RFC 3550 A.8. Both timestamps are in RTP
    /// timestamp units; the subtraction wraps.
    pub(crate) fn update_jitter(&mut self, rtp_ts: u32, arrival: u32) {
        let transit = arrival.wrapping_sub(rtp_ts);
        let d = transit.wrapping_sub(self.transit) as i32;
        self.transit = transit;

        self.jitter += (d.unsigned_abs() as f64 - self.jitter) / 16.0;
    }

    /// Loss and sequence numbers for one reception report block, RFC
    /// 3550 A.3. Mutates the previous-interval counters, so call exactly
    /// once per report cycle.
    pub(crate) fn reception_snapshot(&mut self) -> ReportSnapshot {
        let extended_max = self.cycles + self.max_seq as u32;
        let expected = extended_max.wrapping_sub(self.base_seq).wrapping_add(1);

        let lost = expected.wrapping_sub(self.received) as i32;
        // clamp into the 24-bit signed wire field
        let lost = if lost >= 0 {
            lost as u32 & 0x7f_ffff
        } else {
            lost as u32 & 0x80_0000
        };

        let expected_interval = expected.wrapping_sub(self.expected_prior);
        self.expected_prior = expected;

        let received_interval = self.received.wrapping_sub(self.received_prior);
        self.received_prior = self.received;

        let lost_interval = expected_interval.wrapping_sub(received_interval) as i32;

        let fraction = if expected_interval == 0 || lost_interval <= 0 {
            0
        } else {
            ((lost_interval << 8) / expected_interval as i32) as u8
        };

        ReportSnapshot {
            fraction,
            lost,
            extended_max,
            jitter: self.jitter as u32,
        }
    }

    /// Highest sequence number seen.
    pub fn max_seq(&self) -> u16 {
        self.max_seq
    }

    /// First sequence number seen.
    pub fn base_seq(&self) -> u32 {
        self.base_seq
    }

    /// Accumulated 16-bit sequence wraparounds, in units of 65536.
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// In-order packets still needed before the source is trusted.
    pub fn probation(&self) -> u32 {
        self.probation
    }

    /// Packets counted as received since the last (re)init.
    pub fn received(&self) -> u32 {
        self.received
    }

    /// Current interarrival jitter estimate, in RTP timestamp units.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }
}
