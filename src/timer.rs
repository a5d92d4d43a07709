use crate::member_table::MemberKey;

/// What a scheduled timeout refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Token {
    /// The session-wide RTCP report interval.
    RtcpReport,
    /// Per-member sender timeout (RFC 3550, 6.3.8).
    Sender(MemberKey),
    /// Per-member activity timeout (RFC 3550, 6.3.5).
    Member(MemberKey),
    /// Grace period after a received BYE.
    Leave(MemberKey),
    /// Sliding window on one source conflict entry.
    Conflict(usize),
}

#[derive(Debug)]
struct Entry {
    token: Token,
    deadline: u64,
}

/// Cooperative timer driven by fixed ticks from the outside.
///
/// Single threaded and run-to-completion: `drive` advances the clock by
/// one tick and hands back the expired tokens for the session to
/// dispatch. Scheduling an already armed token replaces its deadline.
#[derive(Debug)]
pub(crate) struct SoftTimer {
    tick_ms: u64,
    now_ms: u64,
    entries: Vec<Entry>,
}

impl SoftTimer {
    pub fn new(tick_ms: u64) -> SoftTimer {
        SoftTimer {
            tick_ms,
            now_ms: 0,
            entries: Vec::new(),
        }
    }

    /// Current tick time in milliseconds since session start.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Arm `token` to expire `delay_ms` from now.
    pub fn schedule(&mut self, token: Token, delay_ms: u64) {
        self.cancel(token);
        self.entries.push(Entry {
            token,
            deadline: self.now_ms + delay_ms,
        });
    }

    pub fn cancel(&mut self, token: Token) {
        self.entries.retain(|e| e.token != token);
    }

    pub fn is_scheduled(&self, token: Token) -> bool {
        self.entries.iter().any(|e| e.token == token)
    }

    /// Advance one tick and collect expired tokens, soonest first.
    pub fn drive(&mut self, expired: &mut Vec<Token>) {
        self.now_ms += self.tick_ms;
        let now = self.now_ms;

        let mut due = Vec::new();
        let mut keep = Vec::with_capacity(self.entries.len());

        for e in self.entries.drain(..) {
            if e.deadline <= now {
                due.push(e);
            } else {
                keep.push(e);
            }
        }
        self.entries = keep;

        due.sort_by_key(|e| e.deadline);
        expired.extend(due.into_iter().map(|e| e.token));
    }
}
