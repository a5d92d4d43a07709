use std::ops::Range;

use crate::error::RtpRxError;
use crate::id::Ssrc;

pub(crate) const RTP_VERSION: u8 = 2;

/// Fixed part of the RTP header, CSRC list excluded.
pub(crate) const MIN_HEADER_LEN: usize = 12;

/// Most contributing sources one header can carry (4-bit count).
pub(crate) const MAX_CSRC: usize = 15;

/// Parsed header of an RTP packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RtpHeader {
    pub has_padding: bool,
    pub has_extension: bool,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: Ssrc,
    pub csrc: [u32; MAX_CSRC],
    pub csrc_count: usize,
    pub header_len: usize,
}

impl RtpHeader {
    /// Header validity checks of RFC 3550 A.1, against the session's
    /// single configured payload type. On success returns the header and
    /// the payload range with padding stripped.
    pub fn parse(buf: &[u8], expected_pt: u8) -> Result<(RtpHeader, Range<usize>), RtpRxError> {
        if buf.len() < MIN_HEADER_LEN {
            return Err(RtpRxError::HeaderTooShort);
        }

        // the length must be consistent with CC
        let csrc_count = (buf[0] & 0b0000_1111) as usize;
        let header_len = MIN_HEADER_LEN + 4 * csrc_count;
        if buf.len() < header_len {
            return Err(RtpRxError::InvalidCsrcCount);
        }

        let version = (buf[0] & 0b1100_0000) >> 6;
        if version != RTP_VERSION {
            return Err(RtpRxError::InvalidRtpVersion);
        }

        let has_padding = buf[0] & 0b0010_0000 > 0;
        let has_extension = buf[0] & 0b0001_0000 > 0;
        let marker = buf[1] & 0b1000_0000 > 0;
        let payload_type = buf[1] & 0b0111_1111;

        // the payload type must be known, in particular not SR or RR
        if payload_type != expected_pt {
            return Err(RtpRxError::InvalidPayloadType);
        }

        // with the P bit set, the last octet must hold a count smaller
        // than the packet length minus the header
        let mut padding_len = 0;
        if has_padding {
            padding_len = buf[buf.len() - 1] as usize;
            if padding_len >= buf.len() - header_len {
                return Err(RtpRxError::InvalidOctetCount);
            }
        }

        // no profile with header extensions is supported
        if has_extension {
            return Err(RtpRxError::NotImplemented);
        }

        let sequence_number = u16::from_be_bytes([buf[2], buf[3]]);
        let timestamp = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let ssrc: Ssrc = u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]).into();

        let mut csrc = [0_u32; MAX_CSRC];
        for (i, c) in csrc.iter_mut().take(csrc_count).enumerate() {
            let o = MIN_HEADER_LEN + 4 * i;
            *c = u32::from_be_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]);
        }

        let payload = header_len..buf.len() - padding_len;

        let header = RtpHeader {
            has_padding,
            has_extension,
            marker,
            payload_type,
            sequence_number,
            timestamp,
            ssrc,
            csrc,
            csrc_count,
            header_len,
        };

        Ok((header, payload))
    }

    /// Serialize into the front of `buf`, returning the header length.
    /// The buffer must hold at least `header_len` bytes.
    pub fn write_to(&self, buf: &mut [u8]) -> usize {
        buf[0] = (RTP_VERSION << 6)
            | if self.has_padding { 1 << 5 } else { 0 }
            | if self.has_extension { 1 << 4 } else { 0 }
            | (self.csrc_count as u8 & 0b1111);
        buf[1] = if self.marker { 1 << 7 } else { 0 } | (self.payload_type & 0b0111_1111);
        buf[2..4].copy_from_slice(&self.sequence_number.to_be_bytes());
        buf[4..8].copy_from_slice(&self.timestamp.to_be_bytes());
        buf[8..12].copy_from_slice(&self.ssrc.to_be_bytes());

        for i in 0..self.csrc_count {
            let o = MIN_HEADER_LEN + 4 * i;
            buf[o..o + 4].copy_from_slice(&self.csrc[i].to_be_bytes());
        }

        MIN_HEADER_LEN + 4 * self.csrc_count
    }
}
