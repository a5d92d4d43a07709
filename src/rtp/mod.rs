//! RTP engine: receive validation and the transmit path.

pub(crate) mod header;
pub(crate) mod source;

use std::net::SocketAddr;

use crate::config::{MAX_RTP_PKT_SIZE, MEMBER_TIMEOUT, SENDER_TIMEOUT};
use crate::error::RtpRxError;
use crate::id::Ssrc;
use crate::member_table::MemberKey;
use crate::session::{RtpSession, SessionHooks};
use crate::timer::Token;

use header::{RtpHeader, MAX_CSRC, MIN_HEADER_LEN};

/// One received, validated RTP packet as delivered upstream.
#[derive(Debug)]
pub struct RtpReceive<'a> {
    /// Media payload, padding stripped.
    pub payload: &'a [u8],
    /// RTP timestamp of the packet.
    pub rtp_ts: u32,
    /// Sequence number of the packet.
    pub seq: u16,
    /// Contributing sources listed in the header.
    pub csrc: &'a [u32],
}

impl<H: SessionHooks> RtpSession<H> {
    pub(crate) fn rtp_rx_inner(&mut self, pkt: &[u8], from: SocketAddr) {
        let arrival = self.hooks.rtp_timestamp();

        let (hdr, payload) = match RtpHeader::parse(pkt, self.config.pt) {
            Ok(v) => v,
            Err(e) => {
                debug!("rtp packet rejected: {}", e);
                self.last_rtp_error = e;
                self.invalid_rtp_pkt += 1;
                return;
            }
        };

        let Some(key) = self.handle_rtp_ssrc(hdr.ssrc, hdr.sequence_number, from, false) else {
            return;
        };

        let seq_ok = self
            .members
            .get_mut(key)
            .map(|m| m.source.update_seq(hdr.sequence_number))
            .unwrap_or(false);
        if !seq_ok {
            self.last_rtp_error = RtpRxError::SeqError;
            return;
        }

        if let Some(m) = self.members.get_mut(key) {
            m.source.update_jitter(hdr.timestamp, arrival);
            m.validated = true;
        }

        // contributing sources of a validated packet become members too
        for i in 0..hdr.csrc_count {
            let csrc = Ssrc::from(hdr.csrc[i]);
            if let Some(ckey) = self.handle_rtp_ssrc(csrc, hdr.sequence_number, from, true) {
                if let Some(m) = self.members.get_mut(ckey) {
                    m.source.update_jitter(hdr.timestamp, arrival);
                }
            }
        }

        self.last_rtp_error = RtpRxError::NoError;

        self.hooks.receive_rtp(RtpReceive {
            payload: &pkt[payload],
            rtp_ts: hdr.timestamp,
            seq: hdr.sequence_number,
            csrc: &hdr.csrc[..hdr.csrc_count],
        });
    }

    /// Resolve the member an RTP packet speaks for, creating, refreshing
    /// or conflict-resolving on the way (RFC 3550, 8.2). None means the
    /// packet must not be processed further; the sticky error register
    /// says why.
    fn handle_rtp_ssrc(
        &mut self,
        ssrc: Ssrc,
        seq: u16,
        from: SocketAddr,
        csrc: bool,
    ) -> Option<MemberKey> {
        let Some(key) = self.members.lookup(ssrc) else {
            // new member
            let Some(key) = self.members.alloc(ssrc) else {
                debug!("member table full, ignoring rtp source {}", ssrc);
                self.last_rtp_error = RtpRxError::MemberAllocFailed;
                return None;
            };

            if let Some(m) = self.members.get_mut(key) {
                m.source.init_seq(seq, true);
                m.rtp_addr = Some(from);
                m.rtp_heard = true;
            }

            self.handle_rtp_event(true, true);

            self.timer.schedule(Token::Sender(key), SENDER_TIMEOUT);
            self.timer.schedule(Token::Member(key), MEMBER_TIMEOUT);

            self.last_rtp_error = RtpRxError::MemberFirstHeard;

            // a contributing source never carries the packet itself, so
            // there is no probation to clear
            if csrc {
                if let Some(m) = self.members.get_mut(key) {
                    m.validated = true;
                    m.csrc = true;
                }
                return Some(key);
            }

            return None;
        };

        let (is_self, rtp_heard, bye_received, rtp_addr) = {
            let m = self.members.get(key)?;
            (m.is_self, m.rtp_heard, m.bye_received, m.rtp_addr)
        };

        if bye_received {
            self.last_rtp_error = RtpRxError::MemberByeInProgress;
            return None;
        }

        // created by RTCP, now heard over RTP for the first time
        if !is_self && !rtp_heard {
            if let Some(m) = self.members.get_mut(key) {
                m.source.init_seq(seq, true);
                m.rtp_addr = Some(from);
                m.rtp_heard = true;
            }

            self.handle_rtp_event(false, true);

            self.timer.schedule(Token::Sender(key), SENDER_TIMEOUT);
            self.timer.schedule(Token::Member(key), MEMBER_TIMEOUT);

            self.last_rtp_error = RtpRxError::MemberFirstHeard;

            return None;
        }

        // source transport address doesn't match: an identifier
        // collision or a loop
        if rtp_addr != Some(from) {
            if !is_self {
                // not ours to resolve
                self.last_rtp_error = RtpRxError::ThirdPartyConflict;
                return None;
            }

            if self.conflicts.lookup(from, &mut self.timer) {
                self.last_rtp_error = RtpRxError::SourceInConflictList;
                return None;
            }

            // new collision with our own identifier: remember the
            // address, then move to a fresh SSRC
            info!("ssrc conflict: {}", ssrc);

            self.conflicts.add(from, &mut self.timer);
            self.tx_bye();

            self.members.reassign_random_ssrc(self.self_key);
            self.reset_tx_stats();

            self.last_rtp_error = RtpRxError::SsrcConflict;

            return None;
        }

        if let Some(m) = self.members.get_mut(key) {
            m.rtp_heard = true;
        }

        self.timer.schedule(Token::Sender(key), SENDER_TIMEOUT);
        self.timer.schedule(Token::Member(key), MEMBER_TIMEOUT);

        Some(key)
    }

    pub(crate) fn rtp_tx_inner(&mut self, payload: &[u8], rtp_ts: u32, csrc: &[u32]) {
        if !self.cvar.we_sent {
            self.cvar.we_sent = true;

            if let Some(m) = self.members.get_mut(self.self_key) {
                m.sender = true;
            }
            self.handle_rtp_event(false, true);
        }

        self.timer
            .schedule(Token::Sender(self.self_key), SENDER_TIMEOUT);

        self.tx_pkt_count += 1;
        self.tx_octet_count += payload.len() as u32;

        let csrc_count = csrc.len().min(MAX_CSRC);
        let header_len = MIN_HEADER_LEN + 4 * csrc_count;
        let mut pkt_size = header_len + payload.len();

        if pkt_size > MAX_RTP_PKT_SIZE {
            warn!("rtp packet size {} over the cap, dropped", pkt_size);
            return;
        }

        let ssrc = self
            .members
            .get(self.self_key)
            .map(|m| m.ssrc)
            .unwrap_or_else(|| Ssrc::from(0));

        let mut csrc_arr = [0_u32; MAX_CSRC];
        csrc_arr[..csrc_count].copy_from_slice(&csrc[..csrc_count]);

        let header = RtpHeader {
            has_padding: false,
            has_extension: false,
            marker: false,
            payload_type: self.config.pt,
            sequence_number: self.seq,
            timestamp: rtp_ts,
            ssrc,
            csrc: csrc_arr,
            csrc_count,
            header_len,
        };

        header.write_to(&mut self.rtp_pkt);
        self.rtp_pkt[header_len..pkt_size].copy_from_slice(payload);

        if self.config.align_by_4 && pkt_size % 4 != 0 {
            let pad = 4 - pkt_size % 4;

            if pkt_size + 4 > MAX_RTP_PKT_SIZE {
                warn!("rtp packet too big to pad, dropped");
                return;
            }

            for i in 0..pad - 1 {
                self.rtp_pkt[pkt_size + i] = 0;
            }
            self.rtp_pkt[pkt_size + pad - 1] = pad as u8;
            pkt_size += pad;

            self.rtp_pkt[0] |= 1 << 5;
        }

        if let Err(e) = self.hooks.transmit_rtp(&self.rtp_pkt[..pkt_size]) {
            warn!("rtp transmit failed: {}", e);
        }

        self.seq = self.seq.wrapping_add(1);
    }
}
