//! Scenario tests driving a whole session through packets and clock
//! ticks, with a recording hooks implementation in place of real
//! transports.

use std::cell::RefCell;
use std::io;
use std::net::SocketAddr;
use std::rc::Rc;

use rtp_session::{
    ReceptionReport, RtcpRxError, RtpReceive, RtpRxError, RtpSession, SessionConfig, SessionHooks,
    Ssrc, LEAVE_TIMEOUT, MEMBER_TIMEOUT, MIN_SEQUENTIAL, SENDER_TIMEOUT, SOURCE_CONFLICT_TIMEOUT,
    TIMER_TICK_MS,
};

const OWN_SSRC: u32 = 9999;
const PT: u8 = 5;

#[derive(Default)]
struct Recorded {
    rtp_out: Vec<Vec<u8>>,
    rtcp_out: Vec<Vec<u8>>,
    delivered: Vec<(u32, u16, Vec<u8>, Vec<u32>)>,
    rr_blocks: Vec<(Ssrc, ReceptionReport)>,
    rtp_ts: u32,
}

#[derive(Clone, Default)]
struct Hooks(Rc<RefCell<Recorded>>);

impl SessionHooks for Hooks {
    fn receive_rtp(&mut self, p: RtpReceive<'_>) {
        self.0
            .borrow_mut()
            .delivered
            .push((p.rtp_ts, p.seq, p.payload.to_vec(), p.csrc.to_vec()));
    }

    fn receive_rr(&mut self, from: Ssrc, block: &ReceptionReport) {
        self.0.borrow_mut().rr_blocks.push((from, *block));
    }

    fn rtp_timestamp(&mut self) -> u32 {
        self.0.borrow().rtp_ts
    }

    fn transmit_rtp(&mut self, pkt: &[u8]) -> io::Result<()> {
        self.0.borrow_mut().rtp_out.push(pkt.to_vec());
        Ok(())
    }

    fn transmit_rtcp(&mut self, pkt: &[u8]) -> io::Result<()> {
        self.0.borrow_mut().rtcp_out.push(pkt.to_vec());
        Ok(())
    }
}

fn addr(s: &str) -> SocketAddr {
    s.parse().unwrap()
}

fn rtp_remote() -> SocketAddr {
    addr("192.168.1.10:17000")
}

fn rtcp_remote() -> SocketAddr {
    addr("192.168.1.10:17001")
}

fn init_log() {
    use std::sync::Once;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    static START: Once = Once::new();

    START.call_once(|| {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(env_filter)
            .init();
    });
}

fn session() -> (RtpSession<Hooks>, Rc<RefCell<Recorded>>) {
    init_log();

    let state = Rc::new(RefCell::new(Recorded::default()));

    let config = SessionConfig {
        rtp_addr: addr("192.168.1.1:16000"),
        rtcp_addr: addr("192.168.1.1:16001"),
        session_bw: 64_000,
        cname: "test_session".into(),
        pt: PT,
        align_by_4: false,
    };

    let mut sess = RtpSession::new(config, Hooks(state.clone()));
    sess.set_self_ssrc(Ssrc::from(OWN_SSRC));

    (sess, state)
}

fn ticks(sess: &mut RtpSession<Hooks>, n: u64) {
    for _ in 0..n {
        sess.timer_tick();
    }
}

fn rtp_packet(ssrc: u32, seq: u16, ts: u32, csrc: &[u32], payload_len: usize) -> Vec<u8> {
    let mut buf = vec![0x80 | csrc.len() as u8, PT];
    buf.extend_from_slice(&seq.to_be_bytes());
    buf.extend_from_slice(&ts.to_be_bytes());
    buf.extend_from_slice(&ssrc.to_be_bytes());
    for c in csrc {
        buf.extend_from_slice(&c.to_be_bytes());
    }
    buf.extend((0..payload_len).map(|i| i as u8));
    buf
}

/// SR with no report blocks and the given sender info words.
fn sr_packet(ssrc: u32, info: [u32; 5]) -> Vec<u8> {
    let mut buf = vec![0x80, 200, 0, 6];
    buf.extend_from_slice(&ssrc.to_be_bytes());
    for w in info {
        buf.extend_from_slice(&w.to_be_bytes());
    }
    buf
}

fn rr_packet(ssrc: u32, blocks: &[[u32; 6]]) -> Vec<u8> {
    let words = 1 + blocks.len() as u16 * 6;
    let mut buf = vec![0x80 | blocks.len() as u8, 201];
    buf.extend_from_slice(&words.to_be_bytes());
    buf.extend_from_slice(&ssrc.to_be_bytes());
    for b in blocks {
        for w in b {
            buf.extend_from_slice(&w.to_be_bytes());
        }
    }
    buf
}

fn sdes_packet(ssrc: u32, cname: &str) -> Vec<u8> {
    let mut chunk = ssrc.to_be_bytes().to_vec();
    chunk.push(1); // CNAME
    chunk.push(cname.len() as u8);
    chunk.extend_from_slice(cname.as_bytes());
    chunk.push(0);
    while chunk.len() % 4 != 0 {
        chunk.push(0);
    }

    let mut buf = vec![0x81, 202];
    buf.extend_from_slice(&((chunk.len() / 4) as u16).to_be_bytes());
    buf.extend_from_slice(&chunk);
    buf
}

fn bye_packet(ssrc: u32) -> Vec<u8> {
    let mut buf = vec![0x81, 203, 0, 1];
    buf.extend_from_slice(&ssrc.to_be_bytes());
    buf
}

/// Walk a member through probation with packets seq, seq, seq + 1, the
/// way an unvalidated source becomes validated.
fn validate_rtp_member(sess: &mut RtpSession<Hooks>, ssrc: u32, seq: u16) {
    assert_eq!(MIN_SEQUENTIAL, 2);
    sess.rx_rtp(&rtp_packet(ssrc, seq, 160, &[], 64), rtp_remote());
    sess.rx_rtp(&rtp_packet(ssrc, seq, 320, &[], 64), rtp_remote());
    sess.rx_rtp(&rtp_packet(ssrc, seq + 1, 480, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::NoError);
}

#[test]
fn session_init_per_6_3_2() {
    let (sess, _) = session();

    let v = sess.rtcp_vars();
    assert_eq!(v.tp, 0.0);
    assert_eq!(v.pmembers, 1);
    assert_eq!(v.members, 1);
    assert_eq!(v.senders, 0);
    assert!(!v.we_sent);
    assert!(v.initial);
    assert_eq!(v.avg_rtcp_size, 256.0);
    assert!(v.tn != 0.0);

    let own = Ssrc::from(OWN_SSRC);
    assert_eq!(sess.self_ssrc(), own);

    let m = sess.member(own).unwrap();
    assert_eq!(m.cname(), "test_session");
    assert!(m.is_self());
    assert!(!m.is_validated());
    assert!(!m.is_sender());
    assert!(!m.is_rtp_heard());
    assert!(!m.is_rtcp_heard());
    assert!(!m.is_bye_received());
}

#[test]
fn self_send_and_sender_timeout() {
    let (mut sess, state) = session();
    let own = Ssrc::from(OWN_SSRC);

    sess.tx(&[0_u8; 128], 0, &[]);

    assert!(sess.rtcp_vars().we_sent);
    assert_eq!(sess.rtcp_vars().senders, 1);
    assert!(sess.member(own).unwrap().is_sender());
    assert!(sess.sender_timer_running(own));
    assert_eq!(state.borrow().rtp_out.len(), 1);

    // let the sender timer run out
    ticks(&mut sess, SENDER_TIMEOUT / TIMER_TICK_MS);

    assert!(!sess.rtcp_vars().we_sent);
    assert_eq!(sess.rtcp_vars().senders, 0);
    assert!(!sess.member(own).unwrap().is_sender());
    assert!(!sess.sender_timer_running(own));

    // sending again re-promotes us
    sess.tx(&[0_u8; 128], 100, &[]);

    assert!(sess.rtcp_vars().we_sent);
    assert_eq!(sess.rtcp_vars().senders, 1);

    // half the timeout is not enough to demote
    ticks(&mut sess, SENDER_TIMEOUT / TIMER_TICK_MS / 2);
    assert!(sess.rtcp_vars().we_sent);
    assert!(sess.sender_timer_running(own));

    ticks(&mut sess, SENDER_TIMEOUT / TIMER_TICK_MS);
    assert!(!sess.rtcp_vars().we_sent);
}

#[test]
fn tx_builds_valid_packets() {
    let (mut sess, state) = session();

    sess.tx(&(0..160).map(|i| i as u8).collect::<Vec<_>>(), 1234, &[]);

    let out = state.borrow().rtp_out[0].clone();
    assert_eq!(out.len(), 172);
    assert_eq!(out[0], 0x80);
    assert_eq!(out[1], PT);
    assert_eq!(u32::from_be_bytes([out[4], out[5], out[6], out[7]]), 1234);
    assert_eq!(
        u32::from_be_bytes([out[8], out[9], out[10], out[11]]),
        OWN_SSRC
    );
    assert_eq!(out[12], 0);
    assert_eq!(out[171], 159);

    // sequence numbers increment between packets
    let seq0 = u16::from_be_bytes([out[2], out[3]]);
    sess.tx(&[0_u8; 16], 1394, &[]);
    let out = state.borrow().rtp_out[1].clone();
    let seq1 = u16::from_be_bytes([out[2], out[3]]);
    assert_eq!(seq1, seq0.wrapping_add(1));

    // the full CSRC list goes into the header
    let csrc: Vec<u32> = (1..=15).collect();
    sess.tx(&[0_u8; 160], 1234, &csrc);
    let out = state.borrow().rtp_out[2].clone();
    assert_eq!(out.len(), 160 + 12 + 4 * 15);
    assert_eq!(out[0] & 0x0f, 15);
    for (i, c) in csrc.iter().enumerate() {
        let o = 12 + 4 * i;
        assert_eq!(
            u32::from_be_bytes([out[o], out[o + 1], out[o + 2], out[o + 3]]),
            *c
        );
    }
}

#[test]
fn tx_pads_to_word_boundary() {
    init_log();

    let state = Rc::new(RefCell::new(Recorded::default()));
    let config = SessionConfig {
        rtp_addr: addr("192.168.1.1:16000"),
        rtcp_addr: addr("192.168.1.1:16001"),
        session_bw: 64_000,
        cname: "test_session".into(),
        pt: PT,
        align_by_4: true,
    };
    let mut sess = RtpSession::new(config, Hooks(state.clone()));

    sess.tx(&[7_u8; 161], 1234, &[]);

    let out = state.borrow().rtp_out[0].clone();
    assert_eq!(out.len(), 12 + 161 + 3);
    assert!(out[0] & 0x20 != 0); // padding bit
    assert_eq!(out[12 + 161], 0);
    assert_eq!(out[12 + 161 + 1], 0);
    assert_eq!(out[12 + 161 + 2], 3);

    // already aligned payloads go out untouched
    sess.tx(&[7_u8; 160], 1234, &[]);
    let out = state.borrow().rtp_out[1].clone();
    assert_eq!(out.len(), 172);
    assert_eq!(out[0] & 0x20, 0);
}

#[test]
fn oversize_tx_is_dropped_but_counted() {
    let (mut sess, state) = session();

    sess.tx(&[0_u8; 2000], 0, &[]);

    assert!(state.borrow().rtp_out.is_empty());
    // counters move before the size check, as the reports do
    assert_eq!(sess.tx_stats(), (1, 2000));
}

#[test]
fn rtp_validation_rejects_garbage() {
    let (mut sess, state) = session();

    sess.rx_rtp(&[0x80; 7], rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::HeaderTooShort);
    assert_eq!(sess.invalid_rtp_packets(), 1);

    // fifteen CSRCs announced, none present
    let mut pkt = rtp_packet(1234, 10, 0, &[], 0);
    pkt[0] |= 0x0f;
    sess.rx_rtp(&pkt, rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::InvalidCsrcCount);

    let mut pkt = rtp_packet(1234, 10, 0, &[], 64);
    pkt[0] = (pkt[0] & 0x3f) | 0x40; // version 1
    sess.rx_rtp(&pkt, rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::InvalidRtpVersion);

    let mut pkt = rtp_packet(1234, 10, 0, &[], 64);
    pkt[1] = PT - 1;
    sess.rx_rtp(&pkt, rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::InvalidPayloadType);

    let mut pkt = rtp_packet(1234, 10, 0, &[], 64);
    pkt[0] |= 0x20;
    let end = pkt.len() - 1;
    pkt[end] = 84;
    sess.rx_rtp(&pkt, rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::InvalidOctetCount);

    let mut pkt = rtp_packet(1234, 10, 0, &[], 64);
    pkt[0] |= 0x10;
    sess.rx_rtp(&pkt, rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::NotImplemented);

    assert_eq!(sess.invalid_rtp_packets(), 6);
    assert!(state.borrow().delivered.is_empty());
    // none of it created a member
    assert_eq!(sess.member_count(), 1);
}

#[test]
fn rtp_probation_then_delivery() {
    let (mut sess, state) = session();
    let ssrc = Ssrc::from(1234);

    // first packet creates the member in probation, nothing delivered
    sess.rx_rtp(&rtp_packet(1234, 10, 160, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::MemberFirstHeard);

    {
        let m = sess.member(ssrc).unwrap();
        assert_eq!(m.source().base_seq(), 10);
        assert_eq!(m.source().max_seq(), 9);
        assert_eq!(m.source().probation(), MIN_SEQUENTIAL);
        assert!(m.is_rtp_heard());
        assert!(!m.is_rtcp_heard());
        assert!(!m.is_validated());
    }
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 1);
    assert!(sess.member_timer_running(ssrc));
    assert!(sess.sender_timer_running(ssrc));
    assert!(state.borrow().delivered.is_empty());

    // same sequence again: probation counts down but still no delivery
    sess.rx_rtp(&rtp_packet(1234, 10, 320, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::SeqError);
    assert_eq!(
        sess.member(ssrc).unwrap().source().probation(),
        MIN_SEQUENTIAL - 1
    );
    assert!(state.borrow().delivered.is_empty());

    // probation clears and the packet reaches the user
    sess.rx_rtp(&rtp_packet(1234, 11, 480, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::NoError);

    let m = sess.member(ssrc).unwrap();
    assert_eq!(m.source().probation(), 0);
    assert!(m.is_validated());

    let delivered = state.borrow().delivered.clone();
    assert_eq!(delivered.len(), 1);
    let (ts, seq, payload, csrc) = &delivered[0];
    assert_eq!(*ts, 480);
    assert_eq!(*seq, 11);
    assert_eq!(payload.len(), 64);
    assert!(csrc.is_empty());
}

#[test]
fn csrc_members_appear_after_validation() {
    let (mut sess, _) = session();
    let csrc = [2000_u32, 2001, 2002, 2003];

    sess.rx_rtp(&rtp_packet(1234, 10, 160, &csrc, 64), rtp_remote());
    sess.rx_rtp(&rtp_packet(1234, 10, 320, &csrc, 64), rtp_remote());

    // not created while the carrier is in probation
    for c in csrc {
        assert!(sess.member(Ssrc::from(c)).is_none());
    }

    sess.rx_rtp(&rtp_packet(1234, 11, 480, &csrc, 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::NoError);

    for c in csrc {
        let m = sess.member(Ssrc::from(c)).unwrap();
        assert!(m.is_validated());
        assert!(m.is_csrc());
        assert!(m.is_rtp_heard());
        assert!(sess.sender_timer_running(Ssrc::from(c)));
        assert!(sess.member_timer_running(Ssrc::from(c)));
    }

    assert_eq!(sess.rtcp_vars().members, 6);
    assert_eq!(sess.rtcp_vars().senders, 5);
}

#[test]
fn sender_then_member_timeout() {
    let (mut sess, _) = session();
    let csrc = [2000_u32, 2001, 2002, 2003];

    sess.rx_rtp(&rtp_packet(1234, 10, 160, &csrc, 64), rtp_remote());
    sess.rx_rtp(&rtp_packet(1234, 10, 320, &csrc, 64), rtp_remote());
    sess.rx_rtp(&rtp_packet(1234, 11, 480, &csrc, 64), rtp_remote());

    assert_eq!(sess.rtcp_vars().members, 6);
    assert_eq!(sess.rtcp_vars().senders, 5);

    // all five senders go quiet
    ticks(&mut sess, SENDER_TIMEOUT / TIMER_TICK_MS);

    assert_eq!(sess.rtcp_vars().members, 6);
    assert_eq!(sess.rtcp_vars().senders, 0);
    for c in csrc {
        assert!(!sess.member(Ssrc::from(c)).unwrap().is_rtp_heard());
    }

    // then the members themselves expire
    ticks(&mut sess, MEMBER_TIMEOUT / TIMER_TICK_MS);

    for c in csrc {
        assert!(sess.member(Ssrc::from(c)).is_none());
    }
    assert!(sess.member(Ssrc::from(1234)).is_none());
    assert_eq!(sess.member_count(), 1);
    assert_eq!(sess.rtcp_vars().members, 1);
    assert_eq!(sess.rtcp_vars().senders, 0);
}

#[test]
fn third_party_conflict_leaves_member_alone() {
    let (mut sess, state) = session();

    validate_rtp_member(&mut sess, 1234, 10);
    state.borrow_mut().delivered.clear();

    // same SSRC from a different address is not ours to resolve
    sess.rx_rtp(
        &rtp_packet(1234, 12, 640, &[], 64),
        addr("192.168.1.20:17000"),
    );

    assert_eq!(sess.last_rtp_error(), RtpRxError::ThirdPartyConflict);
    assert!(state.borrow().delivered.is_empty());
    assert_eq!(sess.member_count(), 2);
}

#[test]
fn own_ssrc_conflict_moves_us() {
    let (mut sess, state) = session();

    sess.tx(&[0_u8; 64], 0, &[]);
    assert_eq!(sess.tx_stats(), (1, 64));

    // a remote claims our SSRC
    sess.rx_rtp(&rtp_packet(OWN_SSRC, 10, 160, &[], 64), rtp_remote());

    assert_eq!(sess.last_rtp_error(), RtpRxError::SsrcConflict);
    let new_ssrc = sess.self_ssrc();
    assert_ne!(new_ssrc, Ssrc::from(OWN_SSRC));
    assert_eq!(sess.member_count(), 1);
    // moving identifiers resets the send counters
    assert_eq!(sess.tx_stats(), (0, 0));
    assert!(state.borrow().delivered.is_empty());

    // the looped packet tracks our new SSRC, but the address is now
    // blocklisted
    sess.rx_rtp(&rtp_packet(*new_ssrc, 11, 320, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::SourceInConflictList);
    assert_eq!(sess.self_ssrc(), new_ssrc);

    // once the window expires the same pattern resolves afresh
    ticks(&mut sess, SOURCE_CONFLICT_TIMEOUT / TIMER_TICK_MS);
    sess.rx_rtp(&rtp_packet(*new_ssrc, 12, 480, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::SsrcConflict);
    assert_ne!(sess.self_ssrc(), new_ssrc);
}

#[test]
fn rtcp_framing_rejections() {
    let (mut sess, _) = session();

    sess.rx_rtcp(&[0x80, 200, 0], rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::HeaderTooShort);

    sess.rx_rtcp(&[0x80, 200, 0, 0, 0, 0, 0], rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::LenNotMultipleOf4);

    // leading SDES, BYE and APP all fail the mask
    for pt in [202_u8, 203, 204] {
        let mut pkt = vec![0x80, pt, 0, 1];
        pkt.extend_from_slice(&[0; 4]);
        sess.rx_rtcp(&pkt, rtcp_remote());
        assert_eq!(sess.last_rtcp_error(), RtcpRxError::InvalidMask);
    }

    // length walk overshooting the buffer
    let mut pkt = vec![0x80, 200, 0, 9];
    pkt.extend_from_slice(&[0; 8]);
    sess.rx_rtcp(&pkt, rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::InvalidCompoundPacket);

    assert_eq!(sess.invalid_rtcp_packets(), 6);
    assert_eq!(sess.member_count(), 1);
}

#[test]
fn sr_creates_member_and_stores_sender_info() {
    let (mut sess, _) = session();
    let ssrc = Ssrc::from(1001);

    sess.rx_rtcp(&sr_packet(1001, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::MemberFirstHeard);

    let m = sess.member(ssrc).unwrap();
    assert!(m.is_rtcp_heard());
    assert!(!m.is_rtp_heard());
    assert_eq!(m.last_sr().seconds, 1);
    assert_eq!(m.last_sr().fraction, 2);
    assert_eq!(m.sender_counts(), (4, 5));

    assert!(sess.member_timer_running(ssrc));
    assert!(!sess.sender_timer_running(ssrc));
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 0);

    // a second report is a plain refresh
    sess.rx_rtcp(&sr_packet(1001, [6, 7, 8, 9, 10]), rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::NoError);
    assert_eq!(sess.rtcp_vars().members, 2);

    // receiving feeds the average size estimate
    assert!(sess.rtcp_vars().avg_rtcp_size < 256.0);
}

#[test]
fn compound_sr_rr_creates_two_members() {
    let (mut sess, state) = session();

    let mut pkt = sr_packet(1001, [1, 2, 3, 4, 5]);
    pkt.extend_from_slice(&rr_packet(
        1002,
        &[[1234, (11 << 24) | 2222, 3333, 4444, 5555, 6666]],
    ));

    sess.rx_rtcp(&pkt, rtcp_remote());

    assert!(sess.member(Ssrc::from(1001)).is_some());
    assert!(sess.member(Ssrc::from(1002)).is_some());
    assert_eq!(sess.rtcp_vars().members, 3);
    assert_eq!(sess.rtcp_vars().senders, 0);

    // the RR block surfaced through the callback
    let blocks = state.borrow().rr_blocks.clone();
    assert_eq!(blocks.len(), 1);
    let (from, rr) = &blocks[0];
    assert_eq!(*from, Ssrc::from(1002));
    assert_eq!(rr.ssrc, Ssrc::from(1234));
    assert_eq!(rr.fraction_lost, 11);
    assert_eq!(rr.packets_lost, 2222);
    assert_eq!(rr.max_seq, 3333);
    assert_eq!(rr.jitter, 4444);
    assert_eq!(rr.last_sr_time, 5555);
    assert_eq!(rr.last_sr_delay, 6666);
}

#[test]
fn sdes_cname_validates_member() {
    let (mut sess, _) = session();

    let mut pkt = sr_packet(1001, [1, 2, 3, 4, 5]);
    pkt.extend_from_slice(&sdes_packet(1001, "alice@host"));

    sess.rx_rtcp(&pkt, rtcp_remote());

    let m = sess.member(Ssrc::from(1001)).unwrap();
    assert_eq!(m.cname(), "alice@host");
    assert!(m.is_validated());
}

#[test]
fn rtcp_member_times_out() {
    let (mut sess, _) = session();

    sess.rx_rtcp(&sr_packet(1001, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.rtcp_vars().members, 2);

    ticks(&mut sess, MEMBER_TIMEOUT / TIMER_TICK_MS);

    assert!(sess.member(Ssrc::from(1001)).is_none());
    assert_eq!(sess.rtcp_vars().members, 1);
    assert_eq!(sess.rtcp_vars().senders, 0);
}

#[test]
fn member_created_by_rtcp_then_heard_on_rtp() {
    let (mut sess, _) = session();
    let ssrc = Ssrc::from(1001);

    sess.rx_rtcp(&sr_packet(1001, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 0);

    sess.rx_rtp(&rtp_packet(1001, 10, 160, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::MemberFirstHeard);

    let m = sess.member(ssrc).unwrap();
    assert!(m.is_rtp_heard());
    assert!(m.is_rtcp_heard());
    assert!(sess.sender_timer_running(ssrc));

    // the member was already counted; only the sender count grows
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 1);
}

#[test]
fn member_created_by_rtp_then_heard_on_rtcp() {
    let (mut sess, _) = session();

    sess.rx_rtp(&rtp_packet(1001, 10, 160, &[], 64), rtp_remote());
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 1);

    sess.rx_rtcp(&sr_packet(1001, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::MemberFirstHeard);

    let m = sess.member(Ssrc::from(1001)).unwrap();
    assert!(m.is_rtcp_heard());
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 1);
}

#[test]
fn rtcp_third_party_and_own_conflict() {
    let (mut sess, _) = session();

    sess.rx_rtcp(&sr_packet(1001, [1, 2, 3, 4, 5]), rtcp_remote());

    // same SSRC from another control address
    sess.rx_rtcp(&sr_packet(1001, [1, 2, 3, 4, 5]), addr("192.168.1.20:17001"));
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::ThirdPartyConflict);

    // a claim on our own SSRC moves us and blocklists the source
    sess.rx_rtcp(&sr_packet(OWN_SSRC, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::SsrcConflict);
    let new_ssrc = sess.self_ssrc();
    assert_ne!(new_ssrc, Ssrc::from(OWN_SSRC));

    sess.rx_rtcp(&sr_packet(*new_ssrc, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::SourceInConflictList);
    assert_eq!(sess.self_ssrc(), new_ssrc);
}

#[test]
fn bye_retires_a_sender() {
    let (mut sess, _) = session();
    let ssrc = Ssrc::from(1234);

    sess.rx_rtp(&rtp_packet(1234, 10, 160, &[], 64), rtp_remote());
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 1);

    let mut pkt = sr_packet(1234, [1, 2, 3, 4, 5]);
    pkt.extend_from_slice(&bye_packet(1234));
    sess.rx_rtcp(&pkt, rtcp_remote());

    let m = sess.member(ssrc).unwrap();
    assert!(m.is_bye_received());

    // counted down at receipt, not at removal
    assert_eq!(sess.rtcp_vars().members, 1);
    assert_eq!(sess.rtcp_vars().senders, 0);

    assert!(!sess.member_timer_running(ssrc));
    assert!(!sess.sender_timer_running(ssrc));
    assert!(sess.leave_timer_running(ssrc));

    // traffic for the leaving member is dropped
    sess.rx_rtp(&rtp_packet(1234, 11, 320, &[], 64), rtp_remote());
    assert_eq!(sess.last_rtp_error(), RtpRxError::MemberByeInProgress);

    sess.rx_rtcp(&sr_packet(1234, [1, 2, 3, 4, 5]), rtcp_remote());
    assert_eq!(sess.last_rtcp_error(), RtcpRxError::MemberByeInProgress);

    // duplicate BYEs change nothing
    let mut pkt = sr_packet(4242, [1, 2, 3, 4, 5]);
    pkt.extend_from_slice(&bye_packet(1234));
    sess.rx_rtcp(&pkt, rtcp_remote());
    assert_eq!(sess.rtcp_vars().members, 2); // 4242 joined

    // the slot is released after the leave timeout
    ticks(&mut sess, LEAVE_TIMEOUT / TIMER_TICK_MS);
    assert!(sess.member(ssrc).is_none());
}

#[test]
fn bye_for_receiver_only_member() {
    let (mut sess, _) = session();

    let mut pkt = sr_packet(1234, [1, 2, 3, 4, 5]);
    pkt.extend_from_slice(&sdes_packet(1234, "bob@host"));
    sess.rx_rtcp(&pkt, rtcp_remote());
    assert_eq!(sess.rtcp_vars().members, 2);
    assert_eq!(sess.rtcp_vars().senders, 0);

    let mut pkt = sr_packet(1234, [1, 2, 3, 4, 5]);
    pkt.extend_from_slice(&bye_packet(1234));
    sess.rx_rtcp(&pkt, rtcp_remote());

    assert!(sess.member(Ssrc::from(1234)).unwrap().is_bye_received());
    assert_eq!(sess.rtcp_vars().members, 1);
    assert_eq!(sess.rtcp_vars().senders, 0);

    ticks(&mut sess, LEAVE_TIMEOUT / TIMER_TICK_MS);
    assert!(sess.member(Ssrc::from(1234)).is_none());
    assert_eq!(sess.rtcp_vars().members, 1);
}

#[test]
fn report_interval_emits_rr_with_cname() {
    let (mut sess, state) = session();

    validate_rtp_member(&mut sess, 1234, 10);

    // the initial interval draw tops out around three seconds, and
    // reconsideration can defer a few times past that
    ticks(&mut sess, 100);

    let reports = state.borrow().rtcp_out.clone();
    assert!(!reports.is_empty());

    let pkt = &reports[0];
    assert_eq!(pkt.len() % 4, 0);

    // we never sent, so the report leads with an RR carrying one block
    // for the remote sender
    assert_eq!(pkt[1], 201);
    assert_eq!(pkt[0] & 0x1f, 1);
    assert_eq!(u32::from_be_bytes([pkt[4], pkt[5], pkt[6], pkt[7]]), OWN_SSRC);
    assert_eq!(
        u32::from_be_bytes([pkt[8], pkt[9], pkt[10], pkt[11]]),
        1234
    );

    // trailed by our SDES CNAME
    let rr_len = (u16::from_be_bytes([pkt[2], pkt[3]]) as usize + 1) * 4;
    let sdes = &pkt[rr_len..];
    assert_eq!(sdes[1], 202);
    assert_eq!(
        u32::from_be_bytes([sdes[4], sdes[5], sdes[6], sdes[7]]),
        OWN_SSRC
    );
    assert_eq!(sdes[8], 1);
    assert_eq!(sdes[9] as usize, "test_session".len());
    assert_eq!(&sdes[10..10 + 12], b"test_session");

    // sending flips the schedule over to SRs. Keep the sender timeout
    // refreshed so every report in this stretch leads with one.
    assert!(!sess.rtcp_vars().initial);
    state.borrow_mut().rtcp_out.clear();
    for i in 0..200_u32 {
        sess.tx(&[0_u8; 64], i * 160, &[]);
        ticks(&mut sess, 1);
    }

    let reports = state.borrow().rtcp_out.clone();
    assert!(!reports.is_empty());
    assert!(reports.iter().all(|p| p[1] == 200));
}
