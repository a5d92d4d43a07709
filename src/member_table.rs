use crate::config::MAX_MEMBERS;
use crate::id::Ssrc;
use crate::member::Member;

/// Key of a member slot. Stable for the lifetime of the allocation; a
/// freed key must not be used again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MemberKey(pub(crate) usize);

/// Fixed-capacity pool of members with stable insertion-order iteration.
#[derive(Debug)]
pub(crate) struct MemberTable {
    slots: Vec<Option<Member>>,
    order: Vec<MemberKey>,
}

impl MemberTable {
    pub fn new() -> MemberTable {
        MemberTable {
            slots: (0..MAX_MEMBERS).map(|_| None).collect(),
            order: Vec::with_capacity(MAX_MEMBERS),
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Allocate a slot for `ssrc`. None means the table is full.
    pub fn alloc(&mut self, ssrc: Ssrc) -> Option<MemberKey> {
        let free = self.slots.iter().position(|s| s.is_none())?;
        let key = MemberKey(free);

        self.slots[free] = Some(Member::new(ssrc));
        self.order.push(key);

        Some(key)
    }

    pub fn free(&mut self, key: MemberKey) {
        self.slots[key.0] = None;
        self.order.retain(|k| *k != key);
    }

    pub fn lookup(&self, ssrc: Ssrc) -> Option<MemberKey> {
        self.order
            .iter()
            .copied()
            .find(|k| self.slots[k.0].as_ref().map(|m| m.ssrc) == Some(ssrc))
    }

    pub fn get(&self, key: MemberKey) -> Option<&Member> {
        self.slots.get(key.0)?.as_ref()
    }

    pub fn get_mut(&mut self, key: MemberKey) -> Option<&mut Member> {
        self.slots.get_mut(key.0)?.as_mut()
    }

    /// Keys in insertion order. Not to be held across mutation.
    pub fn keys(&self) -> impl Iterator<Item = MemberKey> + '_ {
        self.order.iter().copied()
    }

    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.order.iter().filter_map(|k| self.slots[k.0].as_ref())
    }

    /// Give the member a fresh random SSRC, unique across the table.
    pub fn reassign_random_ssrc(&mut self, key: MemberKey) -> Ssrc {
        loop {
            let ssrc = Ssrc::random();
            if self.lookup(ssrc).is_some() {
                continue;
            }
            if let Some(m) = self.get_mut(key) {
                m.ssrc = ssrc;
            }
            return ssrc;
        }
    }

    /// Explicit SSRC override. Only sensible from tests.
    pub fn reassign_explicit_ssrc(&mut self, key: MemberKey, ssrc: Ssrc) {
        if let Some(m) = self.get_mut(key) {
            m.ssrc = ssrc;
        }
    }
}
