use crate::id::Ssrc;
use crate::ntp::NtpTime;

use super::parse::{RTCP_BYE, RTCP_RR, RTCP_SDES, RTCP_SR, SDES_CNAME};

const RTP_VERSION: u8 = 2;

/// Builder for one compound RTCP packet over a caller-owned buffer.
///
/// Every builder call checks remaining space first and reports failure
/// with `false` instead of writing anything. `end_packet` back-patches
/// the length field of the sub-packet being built, which must be called
/// before starting the next one.
#[derive(Debug)]
pub(crate) struct RtcpEncoder<'a> {
    buf: &'a mut [u8],
    /// Next byte to write.
    write: usize,
    /// Header position of the sub-packet being built.
    pkt_start: usize,
    /// Start of the SDES chunk being built.
    chunk_start: usize,
}

impl<'a> RtcpEncoder<'a> {
    pub fn new(buf: &'a mut [u8]) -> RtcpEncoder<'a> {
        RtcpEncoder {
            buf,
            write: 0,
            pkt_start: 0,
            chunk_start: 0,
        }
    }

    /// Bytes written so far.
    pub fn len(&self) -> usize {
        self.write
    }

    fn space_left(&self) -> usize {
        self.buf.len() - self.write
    }

    fn begin_packet(&mut self, pt: u8) {
        self.pkt_start = self.write;
        self.buf[self.write] = RTP_VERSION << 6;
        self.buf[self.write + 1] = pt;
        self.buf[self.write + 2] = 0;
        self.buf[self.write + 3] = 0;
        self.write += 4;
    }

    /// The low five bits of the first octet count blocks or chunks.
    fn bump_count(&mut self) {
        self.buf[self.pkt_start] += 1;
    }

    fn put_u32(&mut self, v: u32) {
        self.buf[self.write..self.write + 4].copy_from_slice(&v.to_be_bytes());
        self.write += 4;
    }

    /// Patch the length field (in words minus one) of the current
    /// sub-packet. Panics when the sub-packet is not whole words; that
    /// is a defect in this crate, not a property of any input.
    pub fn end_packet(&mut self) {
        let len = self.write - self.pkt_start;
        assert!(len % 4 == 0, "rtcp sub-packet is not 4 byte aligned");

        let words = (len / 4 - 1) as u16;
        self.buf[self.pkt_start + 2..self.pkt_start + 4].copy_from_slice(&words.to_be_bytes());
    }

    #[must_use]
    pub fn sr_begin(
        &mut self,
        ssrc: Ssrc,
        ntp: NtpTime,
        rtp_ts: u32,
        pkt_count: u32,
        octet_count: u32,
    ) -> bool {
        if self.space_left() < 28 {
            return false;
        }

        self.begin_packet(RTCP_SR);
        self.put_u32(*ssrc);
        self.put_u32(ntp.seconds);
        self.put_u32(ntp.fraction);
        self.put_u32(rtp_ts);
        self.put_u32(pkt_count);
        self.put_u32(octet_count);

        true
    }

    #[must_use]
    pub fn rr_begin(&mut self, ssrc: Ssrc) -> bool {
        if self.space_left() < 8 {
            return false;
        }

        self.begin_packet(RTCP_RR);
        self.put_u32(*ssrc);

        true
    }

    /// Append one 24 byte reception report block to an open SR or RR.
    /// `lost` is the 24-bit masked cumulative loss.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn add_report_block(
        &mut self,
        ssrc: Ssrc,
        fraction: u8,
        lost: u32,
        extended_max: u32,
        jitter: u32,
        lsr: u32,
        dlsr: u32,
    ) -> bool {
        if self.space_left() < 24 {
            return false;
        }

        self.put_u32(*ssrc);
        self.put_u32((fraction as u32) << 24 | (lost & 0x00ff_ffff));
        self.put_u32(extended_max);
        self.put_u32(jitter);
        self.put_u32(lsr);
        self.put_u32(dlsr);

        self.bump_count();

        true
    }

    #[must_use]
    pub fn sdes_begin(&mut self) -> bool {
        if self.space_left() < 4 {
            return false;
        }

        self.begin_packet(RTCP_SDES);

        true
    }

    #[must_use]
    pub fn sdes_chunk_begin(&mut self, ssrc: Ssrc) -> bool {
        if self.space_left() < 4 {
            return false;
        }

        self.bump_count();
        self.chunk_start = self.write;
        self.put_u32(*ssrc);

        true
    }

    #[must_use]
    pub fn sdes_chunk_add_cname(&mut self, cname: &[u8]) -> bool {
        let len = cname.len().min(255);
        if self.space_left() < len + 2 {
            return false;
        }

        self.buf[self.write] = SDES_CNAME;
        self.buf[self.write + 1] = len as u8;
        self.buf[self.write + 2..self.write + 2 + len].copy_from_slice(&cname[..len]);
        self.write += 2 + len;

        true
    }

    /// Null octet to end the item list, then zero padding out to the
    /// next word boundary.
    #[must_use]
    pub fn sdes_chunk_end(&mut self) -> bool {
        let chunk = self.write - self.chunk_start;
        let pad = 4 - chunk % 4;
        if self.space_left() < pad {
            return false;
        }

        for _ in 0..pad {
            self.buf[self.write] = 0;
            self.write += 1;
        }

        true
    }

    #[must_use]
    pub fn bye_begin(&mut self) -> bool {
        if self.space_left() < 4 {
            return false;
        }

        self.begin_packet(RTCP_BYE);

        true
    }

    #[must_use]
    pub fn bye_add_ssrc(&mut self, ssrc: Ssrc) -> bool {
        if self.space_left() < 4 {
            return false;
        }

        self.put_u32(*ssrc);
        self.bump_count();

        true
    }

    /// Length-prefixed reason text, zero padded to a word boundary.
    #[must_use]
    pub fn bye_add_reason(&mut self, reason: &str) -> bool {
        let len = reason.len().min(255);
        let unpadded = 1 + len;
        let total = (unpadded + 3) & !3;
        if self.space_left() < total {
            return false;
        }

        self.buf[self.write] = len as u8;
        self.buf[self.write + 1..self.write + 1 + len].copy_from_slice(&reason.as_bytes()[..len]);
        for i in unpadded..total {
            self.buf[self.write + i] = 0;
        }
        self.write += total;

        true
    }
}
