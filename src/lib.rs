//! Sans-IO RTP/RTCP session core implementing the data and control
//! plane bookkeeping of RFC 3550.
//!
//! This crate does no I/O and spawns no threads. The owner feeds it
//! received datagrams and 100 ms clock ticks, and implements
//! [`SessionHooks`] to take outgoing packets and validated media back
//! out. What the session does in between:
//!
//! * track session members by SSRC, with activity timeouts and the
//!   BYE leave procedure
//! * validate RTP per appendix A.1 (probation, dropout, misorder,
//!   restart re-sync) and keep A.8 interarrival jitter
//! * detect SSRC collisions against our own identifier and resolve
//!   them by moving to a fresh one (RFC 3550, 8.2)
//! * schedule compound SR/RR + SDES reports on the bandwidth-adaptive
//!   interval of appendix A.7, with timer reconsideration on shrink
//!
//! ```no_run
//! use rtp_session::{RtpSession, SessionConfig, SessionHooks};
//! # use rtp_session::{ReceptionReport, RtpReceive, Ssrc};
//! # struct App;
//! # impl SessionHooks for App {
//! #     fn receive_rtp(&mut self, _: RtpReceive<'_>) {}
//! #     fn receive_rr(&mut self, _: Ssrc, _: &ReceptionReport) {}
//! #     fn rtp_timestamp(&mut self) -> u32 { 0 }
//! #     fn transmit_rtp(&mut self, _: &[u8]) -> std::io::Result<()> { Ok(()) }
//! #     fn transmit_rtcp(&mut self, _: &[u8]) -> std::io::Result<()> { Ok(()) }
//! # }
//!
//! let config = SessionConfig {
//!     rtp_addr: "192.168.1.1:16000".parse().unwrap(),
//!     rtcp_addr: "192.168.1.1:16001".parse().unwrap(),
//!     session_bw: 64_000,
//!     cname: "user@host".into(),
//!     pt: 96,
//!     align_by_4: false,
//! };
//!
//! let mut session = RtpSession::new(config, App);
//!
//! // every 100 ms:
//! session.timer_tick();
//!
//! // for every received datagram:
//! let (pkt, from) = ([0u8; 12], "192.168.1.10:17000".parse().unwrap());
//! session.rx_rtp(&pkt, from);
//!
//! // to send media:
//! session.tx(b"payload", 3200, &[]);
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![allow(clippy::new_without_default)]

#[macro_use]
extern crate tracing;

mod config;
pub use config::SessionConfig;
pub use config::{
    AVERAGE_RTCP_SIZE, LEAVE_TIMEOUT, MAX_MEMBERS, MAX_RTP_PKT_SIZE, MEMBER_TIMEOUT,
    MIN_SEQUENTIAL, SENDER_TIMEOUT, SOURCE_CONFLICT_TIMEOUT, TIMER_TICK_MS,
};

mod error;
pub use error::{RtcpRxError, RtpRxError};

mod id;
pub use id::Ssrc;

mod ntp;
pub use ntp::NtpTime;

mod conflict;
mod member_table;
mod timer;

mod member;
pub use member::Member;

mod rtp;
pub use rtp::source::SourceState;
pub use rtp::RtpReceive;

mod rtcp;
pub use rtcp::interval::ControlVars;
pub use rtcp::parse::ReceptionReport;

mod session;
pub use session::{RtpSession, SessionHooks};
