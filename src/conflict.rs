use std::net::SocketAddr;

use crate::config::{SOURCE_CONFLICT_TABLE_SIZE, SOURCE_CONFLICT_TIMEOUT};
use crate::timer::{SoftTimer, Token};

/// Bounded record of transport addresses recently involved in an SSRC
/// collision with our own identifier (RFC 3550, 8.2).
///
/// Presence means "drop traffic from this address claiming a contested
/// SSRC". Entries live for a sliding window that every hit refreshes.
#[derive(Debug)]
pub(crate) struct SourceConflictTable {
    slots: Vec<Option<SocketAddr>>,
}

impl SourceConflictTable {
    pub fn new() -> SourceConflictTable {
        SourceConflictTable {
            slots: vec![None; SOURCE_CONFLICT_TABLE_SIZE],
        }
    }

    /// Start tracking `addr`. When the table is full the address goes
    /// untracked, which means the collision resolution repeats if the
    /// source keeps talking.
    pub fn add(&mut self, addr: SocketAddr, timer: &mut SoftTimer) -> bool {
        let Some(free) = self.slots.iter().position(|s| s.is_none()) else {
            warn!("source conflict table full, not tracking {}", addr);
            return false;
        };

        self.slots[free] = Some(addr);
        timer.schedule(Token::Conflict(free), SOURCE_CONFLICT_TIMEOUT);

        true
    }

    /// Membership check. A hit refreshes the sliding window.
    pub fn lookup(&mut self, addr: SocketAddr, timer: &mut SoftTimer) -> bool {
        for (i, slot) in self.slots.iter().enumerate() {
            if *slot == Some(addr) {
                timer.schedule(Token::Conflict(i), SOURCE_CONFLICT_TIMEOUT);
                return true;
            }
        }
        false
    }

    /// Window expiry for slot `i`, dispatched from the session timer.
    pub fn expire(&mut self, i: usize) {
        if let Some(slot) = self.slots.get_mut(i) {
            *slot = None;
        }
    }
}
