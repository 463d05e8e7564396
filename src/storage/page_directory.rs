use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::{
    storage::page_range::SlotLocation,
    types::{Rid, error::DatabaseError},
};

/// Physical address of a record: range, page within the range, slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub range: usize,
    pub page: usize,
    pub slot: usize,
}

impl Location {
    pub fn new(range: usize, at: SlotLocation) -> Self {
        Self {
            range,
            page: at.page,
            slot: at.slot,
        }
    }

    pub fn in_range(&self) -> SlotLocation {
        SlotLocation {
            page: self.page,
            slot: self.slot,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DirectoryState {
    pub base: HashMap<Rid, Location>,
    pub tail: HashMap<Rid, Location>,
    pub tombstones: HashSet<Rid>,
}

/// RID -> location map for base and tail records.
///
/// Entries of range `r` are only mutated while range `r` is exclusively
/// locked, so a reader holding the range's shared lock sees a stable view
/// of that range's entries.
#[derive(Debug, Default)]
pub struct PageDirectory {
    state: RwLock<DirectoryState>,
}

impl PageDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_state(state: DirectoryState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    pub fn insert_base(&self, rid: Rid, location: Location) {
        self.state.write().base.insert(rid, location);
    }

    pub fn insert_tail(&self, rid: Rid, location: Location) {
        self.state.write().tail.insert(rid, location);
    }

    /// Location of a live base record.
    pub fn base_location(&self, rid: Rid) -> Result<Location, DatabaseError> {
        let state = self.state.read();
        if state.tombstones.contains(&rid) {
            return Err(DatabaseError::RecordNotFound { rid });
        }
        state
            .base
            .get(&rid)
            .copied()
            .ok_or(DatabaseError::RecordNotFound { rid })
    }

    pub fn tail_location(&self, rid: Rid) -> Result<Location, DatabaseError> {
        self.state
            .read()
            .tail
            .get(&rid)
            .copied()
            .ok_or(DatabaseError::RecordNotFound { rid })
    }

    pub fn is_live(&self, rid: Rid) -> bool {
        let state = self.state.read();
        state.base.contains_key(&rid) && !state.tombstones.contains(&rid)
    }

    pub fn is_tombstoned(&self, rid: Rid) -> bool {
        self.state.read().tombstones.contains(&rid)
    }

    /// Logically remove every RID in `rids` (a base RID and its chain).
    pub fn tombstone<I: IntoIterator<Item = Rid>>(&self, rids: I) {
        let mut state = self.state.write();
        state.tombstones.extend(rids);
    }

    /// Apply a committed merge of `range`: every live record moves to its
    /// new slot, tombstoned base records and all tail records of the range
    /// are dropped.
    pub fn commit_merge(&self, range: usize, moves: &[(Rid, Location)]) -> usize {
        let mut state = self.state.write();
        let DirectoryState {
            base,
            tail,
            tombstones,
        } = &mut *state;

        let before = base.len() + tail.len();
        base.retain(|rid, location| {
            let keep = location.range != range || !tombstones.contains(rid);
            if !keep {
                tombstones.remove(rid);
            }
            keep
        });
        tail.retain(|rid, location| {
            let keep = location.range != range;
            if !keep {
                tombstones.remove(rid);
            }
            keep
        });
        for (rid, location) in moves {
            base.insert(*rid, *location);
        }
        before - base.len() - tail.len()
    }

    /// Live base RIDs stored in `range`, in slot order.
    pub fn live_base_in_range(&self, range: usize) -> Vec<(Rid, Location)> {
        let state = self.state.read();
        let mut rids: Vec<(Rid, Location)> = state
            .base
            .iter()
            .filter(|(rid, location)| location.range == range && !state.tombstones.contains(rid))
            .map(|(rid, location)| (*rid, *location))
            .collect();
        rids.sort_by_key(|(_, location)| (location.page, location.slot));
        rids
    }

    pub fn live_base_rids(&self) -> Vec<Rid> {
        let state = self.state.read();
        let mut rids: Vec<Rid> = state
            .base
            .keys()
            .filter(|rid| !state.tombstones.contains(rid))
            .copied()
            .collect();
        rids.sort_unstable();
        rids
    }

    pub fn base_len(&self) -> usize {
        self.state.read().base.len()
    }

    pub fn tail_len(&self) -> usize {
        self.state.read().tail.len()
    }

    pub fn snapshot(&self) -> DirectoryState {
        self.state.read().clone()
    }
}
