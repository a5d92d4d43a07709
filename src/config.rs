use std::net::SocketAddr;

/// Hard capacity of the member table, self included.
pub const MAX_MEMBERS: usize = 32;

/// Hard cap on an outgoing RTP packet, header and padding included.
pub const MAX_RTP_PKT_SIZE: usize = 1024;

/// Presumed average compound RTCP packet size before any is seen
/// (RFC 3550, 6.3.2).
pub const AVERAGE_RTCP_SIZE: f64 = 256.0;

/// Capacity of the source conflict blocklist.
pub const SOURCE_CONFLICT_TABLE_SIZE: usize = 16;

/// Sliding window on a conflict blocklist entry, in milliseconds.
pub const SOURCE_CONFLICT_TIMEOUT: u64 = 5_000;

/// A sender not heard over RTP for this long stops being a sender.
pub const SENDER_TIMEOUT: u64 = 5_000;

/// A member not heard at all for this long is timed out.
pub const MEMBER_TIMEOUT: u64 = 10_000;

/// Grace period before a member that said goodbye is removed.
pub const LEAVE_TIMEOUT: u64 = 3_000;

/// Largest forward sequence jump still treated as in order (A.1).
pub const MAX_DROPOUT: u16 = 3_000;

/// Largest backward sequence distance still treated as reordering (A.1).
pub const MAX_MISORDER: u16 = 100;

/// In-order packets needed before a new source is trusted (A.1).
pub const MIN_SEQUENTIAL: u32 = 2;

/// Longest CNAME we keep for a member.
pub const SDES_CNAME_MAX: usize = 256;

/// Scratch buffer for one outgoing compound RTCP packet.
pub const RTCP_ENCODER_BUFFER_LEN: usize = 256;

/// Granularity of the cooperative timer, in milliseconds.
pub const TIMER_TICK_MS: u64 = 100;

/// Session-wide configuration. All fields are fixed for the lifetime of
/// the session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Our own RTP transport address, as remotes see it.
    pub rtp_addr: SocketAddr,
    /// Our own RTCP transport address, as remotes see it.
    pub rtcp_addr: SocketAddr,
    /// Bandwidth available to RTCP in bytes per second. The report
    /// schedule divides this between senders and receivers.
    pub session_bw: u32,
    /// Canonical name announced in our SDES chunk.
    pub cname: String,
    /// The single RTP payload type this session carries.
    pub pt: u8,
    /// Pad outgoing RTP packets to a multiple of 4 bytes.
    pub align_by_4: bool,
}
