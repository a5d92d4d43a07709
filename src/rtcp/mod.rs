//! RTCP engine: compound packet handling and report generation.

pub(crate) mod encoder;
pub(crate) mod interval;
pub(crate) mod parse;

use std::net::SocketAddr;

use crate::config::{LEAVE_TIMEOUT, MEMBER_TIMEOUT, RTCP_ENCODER_BUFFER_LEN};
use crate::error::RtcpRxError;
use crate::id::Ssrc;
use crate::member_table::MemberKey;
use crate::ntp::NtpTime;
use crate::session::{RtpSession, SessionHooks};
use crate::timer::Token;

use encoder::RtcpEncoder;
use interval::RtcpEvent;
use parse::{
    bye_reason, bye_ssrcs, check_compound, compound, ReceptionReport, RtcpType, SenderInfo,
    SubPacket, SDES_CNAME,
};

impl<H: SessionHooks> RtpSession<H> {
    pub(crate) fn rtcp_rx_inner(&mut self, pkt: &[u8], from: SocketAddr) {
        if let Err(e) = check_compound(pkt) {
            debug!("rtcp compound rejected: {}", e);
            self.last_rtcp_error = e;
            self.invalid_rtcp_pkt += 1;
            return;
        }

        self.last_rtcp_error = RtcpRxError::NoError;

        let pkt_size = pkt.len() as u32;
        for sub in compound(pkt) {
            match sub.rtcp_type {
                RtcpType::SenderReport => self.handle_sr(&sub, from, pkt_size),
                RtcpType::ReceiverReport => self.handle_rr(&sub, from, pkt_size),
                RtcpType::SourceDescription => self.handle_sdes(&sub, from, pkt_size),
                RtcpType::Goodbye => self.handle_bye(&sub, pkt_size),
                RtcpType::ApplicationDefined => {
                    debug!("ignoring rtcp APP packet");
                }
                RtcpType::Unknown(pt) => {
                    debug!("ignoring unknown rtcp packet type {}", pt);
                }
            }
        }
    }

    /// Resolve the member an RTCP sub-packet speaks for, the control
    /// plane twin of the RTP resolution. `pkt_size` is the whole
    /// compound length, which feeds the average-size estimate.
    fn handle_rtcp_ssrc(
        &mut self,
        ssrc: Ssrc,
        from: SocketAddr,
        pkt_size: u32,
    ) -> Option<MemberKey> {
        let Some(key) = self.members.lookup(ssrc) else {
            // new member
            let Some(key) = self.members.alloc(ssrc) else {
                debug!("member table full, ignoring rtcp source {}", ssrc);
                self.last_rtcp_error = RtcpRxError::MemberAllocFailed;
                return None;
            };

            if let Some(m) = self.members.get_mut(key) {
                m.rtcp_addr = Some(from);
                m.rtcp_heard = true;
            }

            self.handle_rtcp_event(RtcpEvent::RxNonBye, true, false, pkt_size);
            self.timer.schedule(Token::Member(key), MEMBER_TIMEOUT);

            self.last_rtcp_error = RtcpRxError::MemberFirstHeard;

            return Some(key);
        };

        let (is_self, rtcp_heard, bye_received, rtcp_addr) = {
            let m = self.members.get(key)?;
            (m.is_self, m.rtcp_heard, m.bye_received, m.rtcp_addr)
        };

        if bye_received {
            self.last_rtcp_error = RtcpRxError::MemberByeInProgress;
            return None;
        }

        // created by RTP, now heard over RTCP for the first time. The
        // member is already counted, so no interval event here.
        if !is_self && !rtcp_heard {
            if let Some(m) = self.members.get_mut(key) {
                m.rtcp_addr = Some(from);
                m.rtcp_heard = true;
            }

            self.timer.schedule(Token::Member(key), MEMBER_TIMEOUT);

            self.last_rtcp_error = RtcpRxError::MemberFirstHeard;

            return Some(key);
        }

        // control transport address doesn't match
        if rtcp_addr != Some(from) {
            if !is_self {
                self.last_rtcp_error = RtcpRxError::ThirdPartyConflict;
                return None;
            }

            if self.conflicts.lookup(from, &mut self.timer) {
                self.last_rtcp_error = RtcpRxError::SourceInConflictList;
                return None;
            }

            info!("ssrc conflict: {}", ssrc);

            self.conflicts.add(from, &mut self.timer);
            self.tx_bye();

            self.members.reassign_random_ssrc(self.self_key);
            self.reset_tx_stats();

            self.last_rtcp_error = RtcpRxError::SsrcConflict;

            return None;
        }

        if let Some(m) = self.members.get_mut(key) {
            m.rtcp_heard = true;
        }

        self.timer.schedule(Token::Member(key), MEMBER_TIMEOUT);
        self.handle_rtcp_event(RtcpEvent::RxNonBye, false, false, pkt_size);

        self.last_rtcp_error = RtcpRxError::NoError;

        Some(key)
    }

    fn handle_sr(&mut self, sub: &SubPacket, from: SocketAddr, pkt_size: u32) {
        let body = &sub.buf[4..];

        let Ok(si) = SenderInfo::try_from(body) else {
            debug!("short sender report, dropped");
            return;
        };

        let Some(key) = self.handle_rtcp_ssrc(si.ssrc, from, pkt_size) else {
            return;
        };

        if let Some(m) = self.members.get_mut(key) {
            m.last_sr = si.ntp_time;
            m.rtp_ts = si.rtp_time;
            m.pkt_count = si.packet_count;
            m.octet_count = si.octet_count;
            m.last_sr_local = NtpTime::now();
        }

        let mut blocks = &body[24..];
        for _ in 0..sub.count {
            let Ok(rr) = ReceptionReport::try_from(blocks) else {
                break;
            };
            self.hooks.receive_rr(si.ssrc, &rr);
            blocks = &blocks[24..];
        }
    }

    fn handle_rr(&mut self, sub: &SubPacket, from: SocketAddr, pkt_size: u32) {
        let body = &sub.buf[4..];
        if body.len() < 4 {
            return;
        }

        let ssrc: Ssrc = u32::from_be_bytes([body[0], body[1], body[2], body[3]]).into();

        let Some(_key) = self.handle_rtcp_ssrc(ssrc, from, pkt_size) else {
            return;
        };

        let mut blocks = &body[4..];
        for _ in 0..sub.count {
            let Ok(rr) = ReceptionReport::try_from(blocks) else {
                break;
            };
            self.hooks.receive_rr(ssrc, &rr);
            blocks = &blocks[24..];
        }
    }

    /// SDES chunk walk, bounded by the declared sub-packet length. A
    /// malformed chunk stops the walk; items already applied stay
    /// applied.
    fn handle_sdes(&mut self, sub: &SubPacket, from: SocketAddr, pkt_size: u32) {
        let buf = sub.buf;
        let end = buf.len();

        let mut count = sub.count as i32;
        let mut sd = 4;

        loop {
            count -= 1;
            if count < 0 {
                break;
            }

            // item cursor; the chunk must have room past its SSRC
            let mut rsp = sd + 4;
            if rsp >= end {
                break;
            }

            let ssrc: Ssrc =
                u32::from_be_bytes([buf[sd], buf[sd + 1], buf[sd + 2], buf[sd + 3]]).into();
            let key = self.handle_rtcp_ssrc(ssrc, from, pkt_size);

            while rsp < end && buf[rsp] != 0 {
                if rsp + 1 >= end {
                    // length octet missing
                    rsp = end;
                    break;
                }

                let item_len = buf[rsp + 1] as usize;
                let next = rsp + 2 + item_len;
                if next >= end {
                    rsp = next;
                    break;
                }

                if buf[rsp] == SDES_CNAME {
                    if let Some(key) = key {
                        if let Some(m) = self.members.get_mut(key) {
                            m.set_cname(&buf[rsp + 2..next]);
                            m.validated = true;
                        }
                    }
                }

                rsp = next;
            }

            // next chunk starts on the word boundary past the terminator
            sd += (((rsp - sd) >> 2) + 1) * 4;
        }

        if count >= 0 {
            debug!("sdes chunks overrun the declared length, rest skipped");
        }
    }

    fn handle_bye(&mut self, sub: &SubPacket, pkt_size: u32) {
        if let Some(reason) = bye_reason(sub) {
            debug!("bye reason: {}", reason);
        }

        for ssrc in bye_ssrcs(sub).collect::<Vec<_>>() {
            let Some(key) = self.members.lookup(ssrc) else {
                continue;
            };

            let (bye_received, was_sender) = {
                let Some(m) = self.members.get(key) else {
                    continue;
                };
                (m.bye_received, m.rtp_heard)
            };
            if bye_received {
                continue;
            }

            info!("bye received from {}", ssrc);

            // the decrement happens at receipt; the leave timer only
            // delays the slot release
            self.handle_rtcp_event(RtcpEvent::RxBye, true, was_sender, pkt_size);

            if let Some(m) = self.members.get_mut(key) {
                m.bye_received = true;
            }

            self.timer.cancel(Token::Sender(key));
            self.timer.cancel(Token::Member(key));
            self.timer.schedule(Token::Leave(key), LEAVE_TIMEOUT);
        }
    }

    /// Build and hand off one compound report: SR or RR with a block per
    /// remote member, then our SDES CNAME. Returns the byte length for
    /// the average-size update, 0 when the encoder ran out of room.
    pub(crate) fn send_rtcp_report(&mut self) -> u32 {
        let mut buf = [0_u8; RTCP_ENCODER_BUFFER_LEN];

        let now = NtpTime::now();
        let rtp_ts = self.hooks.rtp_timestamp();

        let (ssrc, is_sender, cname) = {
            let Some(m) = self.members.get(self.self_key) else {
                return 0;
            };
            (m.ssrc, m.sender, m.cname.clone())
        };

        let len = {
            let mut enc = RtcpEncoder::new(&mut buf);

            let ok = if is_sender {
                enc.sr_begin(ssrc, now, rtp_ts, self.tx_pkt_count, self.tx_octet_count)
            } else {
                enc.rr_begin(ssrc)
            };
            if !ok || !self.append_report_blocks(&mut enc, now) {
                warn!("rtcp encoder out of space, report skipped");
                return 0;
            }
            enc.end_packet();

            let ok = enc.sdes_begin()
                && enc.sdes_chunk_begin(ssrc)
                && enc.sdes_chunk_add_cname(cname.as_bytes())
                && enc.sdes_chunk_end();
            if !ok {
                warn!("rtcp encoder out of space, report skipped");
                return 0;
            }
            enc.end_packet();

            enc.len()
        };

        trace!("sending rtcp report, {} bytes", len);

        if let Err(e) = self.hooks.transmit_rtcp(&buf[..len]) {
            warn!("rtcp transmit failed: {}", e);
        }

        len as u32
    }

    /// One reception report block per remote member that hasn't said
    /// goodbye. All of them go into a single packet; members that don't
    /// fit are not reported this cycle.
    fn append_report_blocks(&mut self, enc: &mut RtcpEncoder<'_>, now: NtpTime) -> bool {
        let keys: Vec<MemberKey> = self.members.keys().collect();

        for key in keys {
            let Some(m) = self.members.get_mut(key) else {
                continue;
            };
            if m.is_self || m.bye_received {
                continue;
            }

            let snap = m.source.reception_snapshot();

            let lsr = m.last_sr.middle_32();
            let dlsr = if m.last_sr_local.is_zero() {
                0
            } else {
                (m.last_sr_local.seconds_until(now) * 65_536.0) as u32
            };

            let ssrc = m.ssrc;
            if !enc.add_report_block(
                ssrc,
                snap.fraction,
                snap.lost,
                snap.extended_max,
                snap.jitter,
                lsr,
                dlsr,
            ) {
                return false;
            }
        }

        true
    }

    /// BYE transmission is not implemented: we go quiet and let remote
    /// members time us out instead.
    pub(crate) fn tx_bye(&mut self) {
        debug!("bye requested, relying on remote timeouts");
    }
}
