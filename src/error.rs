use thiserror::Error;

/// Outcome of the most recent RTP receive path decision.
///
/// Network input is never allowed to abort the session, so rejections are
/// recorded in a sticky register instead of being raised. The register
/// holds its value until the next packet overwrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RtpRxError {
    /// The last packet was fully processed and delivered.
    #[error("no error")]
    NoError,

    /// Shorter than the 12 byte fixed header.
    #[error("rtp packet shorter than fixed header")]
    HeaderTooShort,

    /// Packet length inconsistent with the CSRC count field.
    #[error("rtp length inconsistent with csrc count")]
    InvalidCsrcCount,

    /// Version field is not 2.
    #[error("rtp version is not 2")]
    InvalidRtpVersion,

    /// Payload type differs from the session's configured one.
    #[error("payload type mismatch")]
    InvalidPayloadType,

    /// P bit set but the trailing octet count overruns the payload.
    #[error("invalid padding octet count")]
    InvalidOctetCount,

    /// X bit set; no profile with header extensions is supported.
    #[error("header extension not supported")]
    NotImplemented,

    /// Sequence number rejected by the validation state machine.
    #[error("sequence number rejected")]
    SeqError,

    /// Member table is at capacity.
    #[error("member table full")]
    MemberAllocFailed,

    /// First packet from a previously unknown source.
    #[error("member first heard")]
    MemberFirstHeard,

    /// The source already said goodbye; packet dropped.
    #[error("member bye in progress")]
    MemberByeInProgress,

    /// Two third parties use the same SSRC; not ours to resolve.
    #[error("third party ssrc conflict")]
    ThirdPartyConflict,

    /// Sender address is on the conflict blocklist.
    #[error("source in conflict list")]
    SourceInConflictList,

    /// A remote source collided with our own SSRC; we picked a new one.
    #[error("ssrc conflict")]
    SsrcConflict,
}

/// Outcome of the most recent RTCP receive path decision.
///
/// Same sticky-register semantics as [`RtpRxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RtcpRxError {
    /// The last compound packet was fully processed.
    #[error("no error")]
    NoError,

    /// Shorter than one sub-packet header.
    #[error("rtcp packet shorter than one header")]
    HeaderTooShort,

    /// Compound length is not a multiple of 4.
    #[error("rtcp length not a multiple of 4")]
    LenNotMultipleOf4,

    /// First sub-packet is not a version-2, unpadded SR or RR.
    #[error("invalid first packet mask")]
    InvalidMask,

    /// The sub-packet length walk did not land on the packet end.
    #[error("invalid compound packet")]
    InvalidCompoundPacket,

    /// Member table is at capacity.
    #[error("member table full")]
    MemberAllocFailed,

    /// First packet from a previously unknown source.
    #[error("member first heard")]
    MemberFirstHeard,

    /// The source already said goodbye; sub-packet dropped.
    #[error("member bye in progress")]
    MemberByeInProgress,

    /// Two third parties use the same SSRC; not ours to resolve.
    #[error("third party ssrc conflict")]
    ThirdPartyConflict,

    /// Sender address is on the conflict blocklist.
    #[error("source in conflict list")]
    SourceInConflictList,

    /// A remote source collided with our own SSRC; we picked a new one.
    #[error("ssrc conflict")]
    SsrcConflict,
}
