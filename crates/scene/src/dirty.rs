//! Staleness tracking for the per-slot GPU copies of scene data.
//!
//! Every dataset the renderer uploads exists once per ring slot. When the
//! CPU side changes, each slot's copy goes stale independently and must be
//! rewritten the next time that slot comes up. [`DirtyState`] records which
//! slots are still pending as a bitmask, so a ring holds at most 32 slots.

/// Maximum ring size a pending mask can describe.
pub const MAX_TRACKED_SLOTS: usize = u32::BITS as usize;

/// The four datasets tracked independently.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DirtyKind {
    /// Compact position/rotation/scale records.
    Transforms,
    /// World bounding spheres and group indices.
    CullingData,
    /// Per-group indirect command layout.
    DrawCommands,
    /// Per-instance texture index table.
    TextureIndices,
}

impl DirtyKind {
    pub const COUNT: usize = 4;
    pub const ALL: [DirtyKind; Self::COUNT] = [
        DirtyKind::Transforms,
        DirtyKind::CullingData,
        DirtyKind::DrawCommands,
        DirtyKind::TextureIndices,
    ];

    #[inline]
    fn index(self) -> usize {
        self as usize
    }
}

/// `Clean`, or `Dirty` with one bit per slot that has not been refreshed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DirtyState {
    #[default]
    Clean,
    Dirty { pending: u32 },
}

impl DirtyState {
    /// Marks every slot of a `ring_size` ring as stale. Raising an already
    /// dirty state restarts it, since slots refreshed before the new change
    /// hold outdated data again.
    pub fn raise(&mut self, ring_size: usize) {
        *self = DirtyState::Dirty {
            pending: all_slots(ring_size),
        };
    }

    /// Returns true if `slot` still needed refreshing, and clears its bit.
    /// The state returns to `Clean` once the last pending slot is consumed.
    pub fn consume(&mut self, slot: usize) -> bool {
        let DirtyState::Dirty { pending } = *self else {
            return false;
        };
        let Some(bit) = 1u32.checked_shl(slot as u32) else {
            return false;
        };
        if pending & bit == 0 {
            return false;
        }
        let remaining = pending & !bit;
        *self = if remaining == 0 {
            DirtyState::Clean
        } else {
            DirtyState::Dirty { pending: remaining }
        };
        true
    }

    pub fn is_dirty(&self) -> bool {
        matches!(self, DirtyState::Dirty { .. })
    }

    pub fn is_pending(&self, slot: usize) -> bool {
        match *self {
            DirtyState::Clean => false,
            DirtyState::Dirty { pending } => {
                1u32.checked_shl(slot as u32).is_some_and(|bit| pending & bit != 0)
            }
        }
    }

    /// Number of slots still waiting for a refresh.
    pub fn pending_count(&self) -> u32 {
        match *self {
            DirtyState::Clean => 0,
            DirtyState::Dirty { pending } => pending.count_ones(),
        }
    }
}

fn all_slots(ring_size: usize) -> u32 {
    match ring_size {
        0 => 0,
        n if n >= MAX_TRACKED_SLOTS => u32::MAX,
        n => (1u32 << n) - 1,
    }
}

/// One [`DirtyState`] per [`DirtyKind`], sized for a fixed ring.
#[derive(Clone, Debug)]
pub struct DirtyFlags {
    ring_size: usize,
    states: [DirtyState; DirtyKind::COUNT],
}

impl DirtyFlags {
    /// Starts with every kind raised so the first pass over the ring uploads
    /// everything.
    pub fn new(ring_size: usize) -> Self {
        let ring_size = ring_size.min(MAX_TRACKED_SLOTS);
        let mut flags = Self {
            ring_size,
            states: [DirtyState::Clean; DirtyKind::COUNT],
        };
        flags.mark_all();
        flags
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    pub fn mark(&mut self, kind: DirtyKind) {
        self.states[kind.index()].raise(self.ring_size);
    }

    pub fn mark_all(&mut self) {
        for kind in DirtyKind::ALL {
            self.mark(kind);
        }
    }

    pub fn consume(&mut self, kind: DirtyKind, slot: usize) -> bool {
        self.states[kind.index()].consume(slot)
    }

    pub fn state(&self, kind: DirtyKind) -> DirtyState {
        self.states[kind.index()]
    }

    pub fn is_dirty(&self, kind: DirtyKind) -> bool {
        self.state(kind).is_dirty()
    }

    pub fn any_dirty(&self) -> bool {
        self.states.iter().any(DirtyState::is_dirty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_after_exactly_ring_size_refreshes() {
        let mut state = DirtyState::Clean;
        state.raise(4);
        assert_eq!(state.pending_count(), 4);

        for slot in 0..3 {
            assert!(state.consume(slot));
            assert!(state.is_dirty());
        }
        assert!(state.consume(3));
        assert_eq!(state, DirtyState::Clean);
    }

    #[test]
    fn test_consume_same_slot_twice() {
        let mut state = DirtyState::Clean;
        state.raise(2);
        assert!(state.consume(1));
        assert!(!state.consume(1));
        assert!(state.is_pending(0));
        assert!(!state.is_pending(1));
    }

    #[test]
    fn test_raise_while_dirty_restarts() {
        let mut state = DirtyState::Clean;
        state.raise(4);
        state.consume(0);
        state.consume(1);
        state.raise(4);
        assert_eq!(state.pending_count(), 4);
        assert!(state.is_pending(0));
    }

    #[test]
    fn test_clean_state_never_consumes() {
        let mut state = DirtyState::Clean;
        assert!(!state.consume(0));
        assert!(!state.consume(40));
    }

    #[test]
    fn test_full_width_mask() {
        let mut state = DirtyState::Clean;
        state.raise(MAX_TRACKED_SLOTS);
        assert_eq!(state.pending_count(), 32);
        assert!(state.consume(31));
        assert!(!state.consume(32));
    }

    #[test]
    fn test_flags_are_independent() {
        let mut flags = DirtyFlags::new(3);
        for kind in DirtyKind::ALL {
            for slot in 0..3 {
                flags.consume(kind, slot);
            }
        }
        assert!(!flags.any_dirty());

        flags.mark(DirtyKind::TextureIndices);
        assert!(flags.is_dirty(DirtyKind::TextureIndices));
        assert!(!flags.is_dirty(DirtyKind::Transforms));
        assert!(!flags.consume(DirtyKind::Transforms, 0));
        assert!(flags.consume(DirtyKind::TextureIndices, 0));
    }

    #[test]
    fn test_every_slot_written_within_ring_size_frames() {
        let ring = 4;
        let mut flags = DirtyFlags::new(ring);
        // Drain the initial upload.
        for slot in 0..ring {
            flags.consume(DirtyKind::Transforms, slot);
        }

        // Mark at an arbitrary frame, then walk the ring.
        let start = 6;
        flags.mark(DirtyKind::Transforms);
        let mut written = vec![false; ring];
        for frame in start..start + ring {
            if flags.consume(DirtyKind::Transforms, frame % ring) {
                written[frame % ring] = true;
            }
        }
        assert!(written.iter().all(|&w| w));
        assert!(!flags.is_dirty(DirtyKind::Transforms));
    }
}
