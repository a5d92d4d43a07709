use std::net::SocketAddr;

use crate::config::SDES_CNAME_MAX;
use crate::id::Ssrc;
use crate::ntp::NtpTime;
use crate::rtp::source::SourceState;

/// One known session participant, self included.
///
/// Owned exclusively by the member table. Everything else refers to
/// members by table key, for at most the duration of one entry point
/// call.
#[derive(Debug)]
pub struct Member {
    pub(crate) ssrc: Ssrc,
    pub(crate) rtp_addr: Option<SocketAddr>,
    pub(crate) rtcp_addr: Option<SocketAddr>,
    pub(crate) cname: String,

    pub(crate) is_self: bool,
    pub(crate) rtp_heard: bool,
    pub(crate) rtcp_heard: bool,
    pub(crate) bye_received: bool,
    pub(crate) validated: bool,
    pub(crate) sender: bool,
    pub(crate) csrc: bool,

    pub(crate) source: SourceState,

    // Filled in from received sender reports.
    pub(crate) last_sr: NtpTime,
    pub(crate) last_sr_local: NtpTime,
    pub(crate) rtp_ts: u32,
    pub(crate) pkt_count: u32,
    pub(crate) octet_count: u32,
}

impl Member {
    pub(crate) fn new(ssrc: Ssrc) -> Member {
        Member {
            ssrc,
            rtp_addr: None,
            rtcp_addr: None,
            cname: String::new(),
            is_self: false,
            rtp_heard: false,
            rtcp_heard: false,
            bye_received: false,
            validated: false,
            sender: false,
            csrc: false,
            source: SourceState::default(),
            last_sr: NtpTime::default(),
            last_sr_local: NtpTime::default(),
            rtp_ts: 0,
            pkt_count: 0,
            octet_count: 0,
        }
    }

    pub(crate) fn set_cname(&mut self, cname: &[u8]) {
        let len = cname.len().min(SDES_CNAME_MAX);
        self.cname = String::from_utf8_lossy(&cname[..len]).into_owned();
    }

    /// The SSRC this member currently goes by.
    pub fn ssrc(&self) -> Ssrc {
        self.ssrc
    }

    /// Canonical name from the member's SDES, or empty if none seen.
    pub fn cname(&self) -> &str {
        &self.cname
    }

    /// Whether this is the session's own member entry.
    pub fn is_self(&self) -> bool {
        self.is_self
    }

    /// Heard over RTP within the sender timeout.
    pub fn is_rtp_heard(&self) -> bool {
        self.rtp_heard
    }

    /// Heard over RTCP at least once.
    pub fn is_rtcp_heard(&self) -> bool {
        self.rtcp_heard
    }

    /// A BYE for this SSRC was received; removal is pending.
    pub fn is_bye_received(&self) -> bool {
        self.bye_received
    }

    /// Validated by surviving probation or by a CNAME.
    pub fn is_validated(&self) -> bool {
        self.validated
    }

    /// Currently counted as a sender.
    pub fn is_sender(&self) -> bool {
        self.sender
    }

    /// First seen as a contributing source in someone else's packet.
    pub fn is_csrc(&self) -> bool {
        self.csrc
    }

    /// Sequence and jitter state for this source.
    pub fn source(&self) -> &SourceState {
        &self.source
    }

    /// NTP timestamp of the member's last sender report.
    pub fn last_sr(&self) -> NtpTime {
        self.last_sr
    }

    /// Packet and octet counts from the member's last sender report.
    pub fn sender_counts(&self) -> (u32, u32) {
        (self.pkt_count, self.octet_count)
    }
}
