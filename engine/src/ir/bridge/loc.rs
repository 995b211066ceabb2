use std::fmt::{Display, Formatter};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// An opaque identifier of a program point
#[derive(Eq, PartialEq, Ord, PartialOrd, Hash, Copy, Clone, Debug, Serialize, Deserialize)]
pub enum Loc {
    /// sentinel: where execution enters
    Entry,
    /// sentinel: where execution leaves
    Exit,
    /// a freshly allocated location
    Id(usize),
}

impl Loc {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, Self::Entry | Self::Exit)
    }
}

impl Display for Loc {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Entry => write!(f, "entry"),
            Self::Exit => write!(f, "exit"),
            Self::Id(id) => write!(f, "l{}", id),
        }
    }
}

/// Allocator of fresh locations, owned by whoever builds a CFG.
///
/// Allocation is dense and monotonic, so the allocated range can be sampled.
pub struct LocAllocator {
    next: usize,
    rng: StdRng,
}

impl LocAllocator {
    pub fn new(seed: u64) -> Self {
        Self {
            next: 0,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Allocate a location strictly greater than every previously allocated one
    pub fn fresh(&mut self) -> Loc {
        let loc = Loc::Id(self.next);
        self.next += 1;
        loc
    }

    /// Restart allocation; only valid between independent analyses
    pub fn reset(&mut self) {
        self.next = 0;
    }

    /// Number of locations allocated since the last reset
    pub fn allocated(&self) -> usize {
        self.next
    }

    /// Uniformly pick a location in `[0, allocated)`, if any
    pub fn sample(&mut self) -> Option<Loc> {
        if self.next == 0 {
            return None;
        }
        Some(Loc::Id(self.rng.gen_range(0..self.next)))
    }
}
