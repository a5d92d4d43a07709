use std::fmt;
use std::ops::Deref;

/// 32-bit synchronization source identifier.
///
/// Identifies one stream source inside a session. Also used for the
/// contributing sources listed in an RTP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ssrc(u32);

impl Ssrc {
    /// Draw a new random SSRC.
    pub(crate) fn random() -> Ssrc {
        Ssrc(fastrand::u32(..))
    }
}

impl Deref for Ssrc {
    type Target = u32;

    fn deref(&self) -> &u32 {
        &self.0
    }
}

impl From<u32> for Ssrc {
    fn from(v: u32) -> Ssrc {
        Ssrc(v)
    }
}

impl From<Ssrc> for u32 {
    fn from(v: Ssrc) -> u32 {
        v.0
    }
}

impl fmt::Display for Ssrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
