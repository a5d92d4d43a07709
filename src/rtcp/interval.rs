use crate::config::AVERAGE_RTCP_SIZE;
use crate::member_table::MemberKey;
use crate::session::{RtpSession, SessionHooks};
use crate::timer::Token;

/// The control variables of RFC 3550, 6.3, driving the report schedule.
///
/// Times are in seconds on the session's tick clock.
#[derive(Debug)]
pub struct ControlVars {
    /// When the last RTCP packet was transmitted.
    pub tp: f64,
    /// Next scheduled transmission time.
    pub tn: f64,
    /// Membership estimate when `tn` was last recomputed.
    pub pmembers: u32,
    /// Current membership estimate.
    pub members: u32,
    /// Current sender estimate.
    pub senders: u32,
    /// Target RTCP bandwidth in bytes per second.
    pub rtcp_bw: f64,
    /// Running 1/16 average over compound RTCP packet sizes.
    pub avg_rtcp_size: f64,
    /// Whether we sent RTP since the second previous report.
    pub we_sent: bool,
    /// True until the first report goes out; halves the minimum
    /// interval.
    pub initial: bool,
}

/// What happened, for the purposes of the interval controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RtcpEvent {
    RxNonBye,
    RxBye,
    Timeout,
}

impl ControlVars {
    /// Initialization per RFC 3550, 6.3.2.
    pub(crate) fn new(rtcp_bw: f64) -> ControlVars {
        ControlVars {
            tp: 0.0,
            tn: 0.0,
            pmembers: 1,
            members: 1,
            senders: 0,
            rtcp_bw,
            avg_rtcp_size: AVERAGE_RTCP_SIZE,
            we_sent: false,
            initial: true,
        }
    }

    /// Computing the RTCP transmission interval, RFC 3550 A.7. Each call
    /// draws fresh randomization.
    pub(crate) fn transmission_interval(&self) -> f64 {
        const RTCP_MIN_TIME: f64 = 5.0;
        const RTCP_SENDER_BW_FRACTION: f64 = 0.25;
        const RTCP_RCVR_BW_FRACTION: f64 = 1.0 - RTCP_SENDER_BW_FRACTION;
        // compensates that timer reconsideration converges below the
        // intended average
        const COMPENSATION: f64 = 2.71828 - 1.5;

        let mut rtcp_min_time = RTCP_MIN_TIME;
        if self.initial {
            rtcp_min_time /= 2.0;
        }

        // Dedicate a fraction of the bandwidth to senders unless they
        // are more than a quarter of the membership.
        let mut rtcp_bw = self.rtcp_bw;
        let mut n = self.members as f64;
        if (self.senders as f64) <= n * RTCP_SENDER_BW_FRACTION {
            if self.we_sent {
                rtcp_bw *= RTCP_SENDER_BW_FRACTION;
                n = self.senders as f64;
            } else {
                rtcp_bw *= RTCP_RCVR_BW_FRACTION;
                n -= self.senders as f64;
            }
        }

        let mut t = self.avg_rtcp_size * n / rtcp_bw;
        if t < rtcp_min_time {
            t = rtcp_min_time;
        }

        t *= fastrand::f64() + 0.5;
        t / COMPENSATION
    }

    pub(crate) fn update_avg_size(&mut self, pkt_size: u32) {
        self.avg_rtcp_size = pkt_size as f64 / 16.0 + self.avg_rtcp_size * 15.0 / 16.0;
    }
}

impl<H: SessionHooks> RtpSession<H> {
    /// Seconds on the tick clock, the `tc` of RFC 3550, 6.3.
    fn rtcp_now(&self) -> f64 {
        self.timer.now_ms() as f64 / 1000.0
    }

    /// Arm the very first report interval. Part of session construction.
    pub(crate) fn rtcp_interval_init(&mut self) {
        let tc = self.rtcp_now();
        let t = self.cvar.transmission_interval();
        self.rtcp_interval_schedule(tc, tc + t);
    }

    fn rtcp_interval_schedule(&mut self, tc: f64, tn: f64) {
        self.cvar.tn = tn;

        let mut delay_ms = ((tn - tc) * 1000.0) as i64;
        if delay_ms <= 0 {
            // an overdue deadline still waits for the next tick
            delay_ms = 1;
        }

        self.timer.schedule(Token::RtcpReport, delay_ms as u64);
    }

    /// New RTP activity: unconditional membership/sender growth.
    pub(crate) fn handle_rtp_event(&mut self, new_member: bool, new_sender: bool) {
        if new_member {
            self.cvar.members += 1;
        }
        if new_sender {
            self.cvar.senders += 1;
        }
    }

    /// RTCP activity or a timeout, per RFC 3550, 6.3.4 and 6.3.5. On
    /// membership shrink the schedule is reconsidered: `tn` and `tp`
    /// rescale toward `tc` by the shrink ratio.
    pub(crate) fn handle_rtcp_event(
        &mut self,
        event: RtcpEvent,
        member: bool,
        sender: bool,
        pkt_size: u32,
    ) {
        let tc = self.rtcp_now();

        match event {
            RtcpEvent::RxNonBye => {
                if member {
                    self.cvar.members += 1;
                }
                self.cvar.update_avg_size(pkt_size);
            }
            RtcpEvent::RxBye | RtcpEvent::Timeout => {
                if sender {
                    self.cvar.senders = self.cvar.senders.saturating_sub(1);
                }
                if member {
                    self.cvar.members = self.cvar.members.saturating_sub(1);
                }

                if self.cvar.members < self.cvar.pmembers {
                    let ratio = self.cvar.members as f64 / self.cvar.pmembers as f64;
                    let tn = tc + ratio * (self.cvar.tn - tc);
                    self.cvar.tp = tc - ratio * (tc - self.cvar.tp);

                    self.rtcp_interval_schedule(tc, tn);
                    self.cvar.pmembers = self.cvar.members;
                }
            }
        }
    }

    /// The report timer fired. Reconsideration: recompute the interval
    /// from current estimates and only send when it has really elapsed.
    pub(crate) fn rtcp_interval_timeout(&mut self) {
        let tc = self.rtcp_now();
        let t = self.cvar.transmission_interval();
        let tn = self.cvar.tp + t;

        if tn <= tc {
            let pkt_size = self.send_rtcp_report();
            self.cvar.update_avg_size(pkt_size);
            self.cvar.tp = tc;

            // the draw above was conditioned on being small enough to
            // fire, so the next deadline gets a fresh one
            let t = self.cvar.transmission_interval();
            self.rtcp_interval_schedule(tc, tc + t);

            self.cvar.initial = false;
        } else {
            self.rtcp_interval_schedule(tc, tn);
        }
    }

    /// A member fell silent for the full member timeout.
    pub(crate) fn member_timedout(&mut self, key: MemberKey) {
        let Some(m) = self.members.get(key) else {
            return;
        };

        debug!("member {} timed out", m.ssrc);

        let was_sender = m.rtp_heard;
        self.handle_rtcp_event(RtcpEvent::Timeout, true, was_sender, 0);
        self.dealloc_member(key);
    }

    /// A sender stopped sending RTP for the sender timeout; it stays a
    /// member but no longer counts as a sender.
    pub(crate) fn sender_timedout(&mut self, key: MemberKey) {
        let is_self = key == self.self_key;

        let Some(m) = self.members.get_mut(key) else {
            return;
        };

        m.rtp_heard = false;
        if is_self {
            m.sender = false;
            self.cvar.we_sent = false;
        }

        self.handle_rtcp_event(RtcpEvent::Timeout, false, true, 0);
    }
}
