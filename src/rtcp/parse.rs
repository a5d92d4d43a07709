use crate::error::RtcpRxError;
use crate::id::Ssrc;
use crate::ntp::NtpTime;

pub(crate) const RTCP_SR: u8 = 200;
pub(crate) const RTCP_RR: u8 = 201;
pub(crate) const RTCP_SDES: u8 = 202;
pub(crate) const RTCP_BYE: u8 = 203;
pub(crate) const RTCP_APP: u8 = 204;

/// SDES item type for the canonical name.
pub(crate) const SDES_CNAME: u8 = 1;

/// RTCP packet types of RFC 3550.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RtcpType {
    SenderReport,
    ReceiverReport,
    SourceDescription,
    Goodbye,
    ApplicationDefined,
    Unknown(u8),
}

impl From<u8> for RtcpType {
    fn from(v: u8) -> RtcpType {
        match v {
            RTCP_SR => RtcpType::SenderReport,
            RTCP_RR => RtcpType::ReceiverReport,
            RTCP_SDES => RtcpType::SourceDescription,
            RTCP_BYE => RtcpType::Goodbye,
            RTCP_APP => RtcpType::ApplicationDefined,
            _ => RtcpType::Unknown(v),
        }
    }
}

/// Compound framing check, following the validity mask the RFC
/// recommends. Nothing is processed from a packet failing this.
pub(crate) fn check_compound(buf: &[u8]) -> Result<(), RtcpRxError> {
    if buf.len() < 4 {
        return Err(RtcpRxError::HeaderTooShort);
    }

    if buf.len() % 4 != 0 {
        return Err(RtcpRxError::LenNotMultipleOf4);
    }

    // first sub-packet must be a version 2, unpadded SR or RR
    if buf[0] & 0b1110_0000 != 0b1000_0000 || buf[1] & 0xfe != RTCP_SR {
        return Err(RtcpRxError::InvalidMask);
    }

    // walk the chain by declared lengths. The walk must land exactly on
    // the end, finding version 2 at every hop.
    let mut offset = 0;
    loop {
        let words = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]) as usize;
        offset += (words + 1) * 4;

        if offset >= buf.len() || buf[offset] & 0b1100_0000 != 0b1000_0000 {
            break;
        }
    }
    if offset != buf.len() {
        return Err(RtcpRxError::InvalidCompoundPacket);
    }

    Ok(())
}

/// One sub-packet of a validated compound packet, header included.
#[derive(Debug)]
pub(crate) struct SubPacket<'a> {
    pub rtcp_type: RtcpType,
    pub count: usize,
    pub buf: &'a [u8],
}

/// Iterate the sub-packets of a compound packet that already passed
/// [`check_compound`].
pub(crate) fn compound(buf: &[u8]) -> CompoundIter<'_> {
    CompoundIter { buf, offset: 0 }
}

pub(crate) struct CompoundIter<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> Iterator for CompoundIter<'a> {
    type Item = SubPacket<'a>;

    fn next(&mut self) -> Option<SubPacket<'a>> {
        if self.offset + 4 > self.buf.len() {
            return None;
        }

        let b = &self.buf[self.offset..];
        let words = u16::from_be_bytes([b[2], b[3]]) as usize;
        let len = (words + 1) * 4;
        if len > b.len() {
            return None;
        }

        self.offset += len;

        Some(SubPacket {
            rtcp_type: b[1].into(),
            count: (b[0] & 0b0001_1111) as usize,
            buf: &b[..len],
        })
    }
}

/// The sender info section of an SR (RFC 3550, 6.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SenderInfo {
    pub ssrc: Ssrc,
    pub ntp_time: NtpTime,
    pub rtp_time: u32,
    pub packet_count: u32,
    pub octet_count: u32,
}

impl<'a> TryFrom<&'a [u8]> for SenderInfo {
    type Error = &'static str;

    fn try_from(buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 24 {
            return Err("Less than 24 bytes for SenderInfo");
        }

        let ssrc = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]).into();
        let ntp_time = NtpTime {
            seconds: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
            fraction: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
        };
        let rtp_time = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let packet_count = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let octet_count = u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]);

        Ok(SenderInfo {
            ssrc,
            ntp_time,
            rtp_time,
            packet_count,
            octet_count,
        })
    }
}

/// An individual report of reception (RFC 3550, 6.4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct ReceptionReport {
    pub ssrc: Ssrc,
    pub fraction_lost: u8,
    pub packets_lost: u32, // 24 bit
    pub max_seq: u32,
    pub jitter: u32,
    pub last_sr_time: u32,
    pub last_sr_delay: u32,
}

impl<'a> TryFrom<&'a [u8]> for ReceptionReport {
    type Error = &'static str;

    fn try_from(buf: &'a [u8]) -> Result<Self, Self::Error> {
        if buf.len() < 24 {
            return Err("Less than 24 bytes for ReceptionReport");
        }

        let ssrc = u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]]).into();
        let fraction_lost = buf[4];
        let packets_lost = u32::from_be_bytes([0, buf[5], buf[6], buf[7]]);
        let max_seq = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]);
        let jitter = u32::from_be_bytes([buf[12], buf[13], buf[14], buf[15]]);
        let last_sr_time = u32::from_be_bytes([buf[16], buf[17], buf[18], buf[19]]);
        let last_sr_delay = u32::from_be_bytes([buf[20], buf[21], buf[22], buf[23]]);

        Ok(ReceptionReport {
            ssrc,
            fraction_lost,
            packets_lost,
            max_seq,
            jitter,
            last_sr_time,
            last_sr_delay,
        })
    }
}

/// SSRC list of a BYE sub-packet, bounded by both the count field and
/// the sub-packet length.
pub(crate) fn bye_ssrcs<'a>(sub: &'a SubPacket) -> impl Iterator<Item = Ssrc> + 'a {
    let n = sub.count.min((sub.buf.len() - 4) / 4);

    (0..n).map(move |i| {
        let o = 4 + i * 4;
        u32::from_be_bytes([sub.buf[o], sub.buf[o + 1], sub.buf[o + 2], sub.buf[o + 3]]).into()
    })
}

/// Optional reason text trailing the SSRC list of a BYE sub-packet.
pub(crate) fn bye_reason<'a>(sub: &'a SubPacket) -> Option<&'a str> {
    let o = 4 + sub.count * 4;
    let b = sub.buf.get(o..)?;
    if b.is_empty() {
        return None;
    }

    let len = b[0] as usize;
    let text = b.get(1..1 + len)?;

    std::str::from_utf8(text).ok()
}
