use std::io;
use std::net::SocketAddr;

use crate::config::{SessionConfig, MAX_RTP_PKT_SIZE, TIMER_TICK_MS};
use crate::conflict::SourceConflictTable;
use crate::error::{RtcpRxError, RtpRxError};
use crate::id::Ssrc;
use crate::member::Member;
use crate::member_table::{MemberKey, MemberTable};
use crate::rtcp::interval::ControlVars;
use crate::rtcp::parse::ReceptionReport;
use crate::rtp::RtpReceive;
use crate::timer::{SoftTimer, Token};

/// User and transport callbacks of a session.
///
/// All methods are invoked synchronously from the session entry points
/// and must not re-enter the session.
pub trait SessionHooks {
    /// A validated RTP packet was received.
    fn receive_rtp(&mut self, packet: RtpReceive<'_>);

    /// One reception report block arrived in an SR or RR, attributed to
    /// the reporting SSRC.
    fn receive_rr(&mut self, from: Ssrc, block: &ReceptionReport);

    /// Current media clock, in RTP timestamp units. Used to timestamp
    /// arrivals for jitter and to fill our sender reports.
    fn rtp_timestamp(&mut self) -> u32;

    /// Hand one finished RTP packet to the transport. Fire and forget;
    /// a failure is logged, never retried.
    fn transmit_rtp(&mut self, pkt: &[u8]) -> io::Result<()>;

    /// Hand one finished compound RTCP packet to the transport.
    fn transmit_rtcp(&mut self, pkt: &[u8]) -> io::Result<()>;
}

/// One RTP/RTCP session: the member table, the per-source receive
/// accounting, the SSRC collision bookkeeping and the RTCP report
/// schedule of RFC 3550.
///
/// Sans-IO and single threaded: datagrams go in through [`rx_rtp`] and
/// [`rx_rtcp`], media goes out through [`tx`], and time advances only
/// when the owner calls [`timer_tick`] every 100 ms. Outgoing packets
/// and received media come back through the [`SessionHooks`]
/// implementation.
///
/// [`rx_rtp`]: RtpSession::rx_rtp
/// [`rx_rtcp`]: RtpSession::rx_rtcp
/// [`tx`]: RtpSession::tx
/// [`timer_tick`]: RtpSession::timer_tick
pub struct RtpSession<H: SessionHooks> {
    pub(crate) hooks: H,
    pub(crate) config: SessionConfig,
    pub(crate) timer: SoftTimer,
    pub(crate) members: MemberTable,
    pub(crate) conflicts: SourceConflictTable,
    pub(crate) cvar: ControlVars,
    pub(crate) self_key: MemberKey,

    /// Outgoing sequence number, wrapping.
    pub(crate) seq: u16,
    pub(crate) rtp_pkt: [u8; MAX_RTP_PKT_SIZE],
    pub(crate) tx_pkt_count: u32,
    pub(crate) tx_octet_count: u32,

    pub(crate) invalid_rtp_pkt: u32,
    pub(crate) invalid_rtcp_pkt: u32,
    pub(crate) last_rtp_error: RtpRxError,
    pub(crate) last_rtcp_error: RtcpRxError,

    /// Scratch for `timer_tick`, reused between calls.
    expired: Vec<Token>,
}

impl<H: SessionHooks> RtpSession<H> {
    /// Create a session. Allocates the self member with a random SSRC
    /// and the configured CNAME, and arms the first report interval.
    pub fn new(config: SessionConfig, hooks: H) -> RtpSession<H> {
        let mut members = MemberTable::new();
        let self_key = members
            .alloc(Ssrc::random())
            .expect("fresh member table has room for self");

        let mut session = RtpSession {
            hooks,
            timer: SoftTimer::new(TIMER_TICK_MS),
            members,
            conflicts: SourceConflictTable::new(),
            cvar: ControlVars::new(config.session_bw as f64),
            self_key,
            seq: fastrand::u16(..),
            rtp_pkt: [0; MAX_RTP_PKT_SIZE],
            tx_pkt_count: 0,
            tx_octet_count: 0,
            invalid_rtp_pkt: 0,
            invalid_rtcp_pkt: 0,
            last_rtp_error: RtpRxError::NoError,
            last_rtcp_error: RtcpRxError::NoError,
            expired: Vec::new(),
            config,
        };

        if let Some(m) = session.members.get_mut(self_key) {
            m.is_self = true;
            m.rtp_addr = Some(session.config.rtp_addr);
            m.rtcp_addr = Some(session.config.rtcp_addr);
        }
        let cname = session.config.cname.clone();
        if let Some(m) = session.members.get_mut(self_key) {
            m.set_cname(cname.as_bytes());
        }

        session.rtcp_interval_init();

        session
    }

    /// Feed one received RTP datagram, with the transport address it
    /// came from.
    pub fn rx_rtp(&mut self, pkt: &[u8], from: SocketAddr) {
        self.rtp_rx_inner(pkt, from);
    }

    /// Feed one received compound RTCP datagram.
    pub fn rx_rtcp(&mut self, pkt: &[u8], from: SocketAddr) {
        self.rtcp_rx_inner(pkt, from);
    }

    /// Send one media payload. The packet is assembled around it and
    /// handed to [`SessionHooks::transmit_rtp`] before this returns.
    pub fn tx(&mut self, payload: &[u8], rtp_ts: u32, csrc: &[u32]) {
        self.rtp_tx_inner(payload, rtp_ts, csrc);
    }

    /// Advance time by one tick (100 ms) and run everything that came
    /// due: report intervals, member/sender/leave timeouts, conflict
    /// window expiry.
    pub fn timer_tick(&mut self) {
        let mut expired = std::mem::take(&mut self.expired);

        self.timer.drive(&mut expired);

        for token in expired.drain(..) {
            match token {
                Token::RtcpReport => self.rtcp_interval_timeout(),
                Token::Sender(key) => self.sender_timedout(key),
                Token::Member(key) => self.member_timedout(key),
                Token::Leave(key) => self.leave_timedout(key),
                Token::Conflict(slot) => self.conflicts.expire(slot),
            }
        }

        self.expired = expired;
    }

    /// Leave the session. Deliberately does not transmit a BYE; we go
    /// quiet and let remote members time us out.
    pub fn bye(&mut self) {
        self.tx_bye();
    }

    fn leave_timedout(&mut self, key: MemberKey) {
        self.dealloc_member(key);
    }

    pub(crate) fn dealloc_member(&mut self, key: MemberKey) {
        self.timer.cancel(Token::Sender(key));
        self.timer.cancel(Token::Member(key));
        self.timer.cancel(Token::Leave(key));

        self.members.free(key);
    }

    pub(crate) fn reset_tx_stats(&mut self) {
        self.tx_pkt_count = 0;
        self.tx_octet_count = 0;
    }

    /// The SSRC we currently go by. Changes when a collision against us
    /// is resolved.
    pub fn self_ssrc(&self) -> Ssrc {
        self.members
            .get(self.self_key)
            .map(|m| m.ssrc)
            .unwrap_or_else(|| Ssrc::from(0))
    }

    /// Number of members currently in the table, self included.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// State snapshot of the member going by `ssrc`.
    pub fn member(&self, ssrc: Ssrc) -> Option<&Member> {
        let key = self.members.lookup(ssrc)?;
        self.members.get(key)
    }

    /// All current members, in the order they joined.
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.members.members()
    }

    /// The RFC 3550, 6.3 control variables, as currently estimated.
    pub fn rtcp_vars(&self) -> &ControlVars {
        &self.cvar
    }

    /// Sticky outcome of the most recent RTP receive decision.
    pub fn last_rtp_error(&self) -> RtpRxError {
        self.last_rtp_error
    }

    /// Sticky outcome of the most recent RTCP receive decision.
    pub fn last_rtcp_error(&self) -> RtcpRxError {
        self.last_rtcp_error
    }

    /// RTP packets rejected before reaching a member.
    pub fn invalid_rtp_packets(&self) -> u32 {
        self.invalid_rtp_pkt
    }

    /// RTCP compounds rejected by the framing check.
    pub fn invalid_rtcp_packets(&self) -> u32 {
        self.invalid_rtcp_pkt
    }

    /// Packets and octets sent since session start or the last SSRC
    /// change.
    pub fn tx_stats(&self) -> (u32, u32) {
        (self.tx_pkt_count, self.tx_octet_count)
    }

    /// Whether the sender timeout is armed for `ssrc`.
    pub fn sender_timer_running(&self, ssrc: Ssrc) -> bool {
        self.members
            .lookup(ssrc)
            .map(|k| self.timer.is_scheduled(Token::Sender(k)))
            .unwrap_or(false)
    }

    /// Whether the member timeout is armed for `ssrc`.
    pub fn member_timer_running(&self, ssrc: Ssrc) -> bool {
        self.members
            .lookup(ssrc)
            .map(|k| self.timer.is_scheduled(Token::Member(k)))
            .unwrap_or(false)
    }

    /// Whether the post-BYE leave timer is armed for `ssrc`.
    pub fn leave_timer_running(&self, ssrc: Ssrc) -> bool {
        self.members
            .lookup(ssrc)
            .map(|k| self.timer.is_scheduled(Token::Leave(k)))
            .unwrap_or(false)
    }

    /// Force our own SSRC to a fixed value. Only sensible from tests
    /// that need predictable identifiers.
    #[doc(hidden)]
    pub fn set_self_ssrc(&mut self, ssrc: Ssrc) {
        self.members.reassign_explicit_ssrc(self.self_key, ssrc);
    }
}
