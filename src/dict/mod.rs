//! Hash map keyed by the contents of a string region.
//!
//! Lookups hash the queried region directly, so probing a slice of a larger
//! buffer allocates nothing. Slots are open-addressed in a power-of-two
//! table; collisions probe by incrementing the hash. The hash is 32-bit
//! FNV-1a XORed with a per-instance random seed, which makes slot order
//! non-deterministic across instances and spoils precomputed collision sets.

use rand::Rng;

use crate::config::InsertBehavior;
use crate::error::{CollectionError, Result};

const FNV_OFFSET: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

const MIN_SLOTS: usize = 8;

enum Slot<V> {
    Empty,
    /// Keeps probe chains intact across removals
    Tombstone,
    Occupied { hash: u32, key: Box<str>, value: V },
}

impl<V> Slot<V> {
    #[inline]
    fn is_vacant(&self) -> bool {
        !matches!(self, Slot::Occupied { .. })
    }
}

/// Map from owned string keys to `V`, looked up by string region without
/// materializing a key per query.
pub struct SubstringDictionary<V> {
    slots: Vec<Slot<V>>,
    seed: u32,
    len: usize,
    /// Occupied plus tombstoned slots; drives growth
    used: usize,
}

impl<V> SubstringDictionary<V> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let slots = slots_for(capacity);
        Self {
            slots: (0..slots).map(|_| Slot::Empty).collect(),
            seed: rand::thread_rng().gen(),
            len: 0,
            used: 0,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    fn hash(&self, region: &str) -> u32 {
        let mut hash = FNV_OFFSET;
        for b in region.as_bytes() {
            hash ^= u32::from(*b);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash ^ self.seed
    }

    /// Index of the slot holding `region`, if present.
    fn find(&self, region: &str) -> Option<usize> {
        let hash = self.hash(region);
        let mask = self.mask();
        for probe in 0..self.slots.len() {
            let idx = (hash as usize).wrapping_add(probe) & mask;
            match &self.slots[idx] {
                Slot::Empty => return None,
                Slot::Tombstone => {}
                Slot::Occupied { hash: h, key, .. } => {
                    if *h == hash && key.as_bytes() == region.as_bytes() {
                        return Some(idx);
                    }
                }
            }
        }
        None
    }

    /// Inserts `key`, resolving an existing entry per `behavior`.
    ///
    /// Returns whether the map was modified. Fails with `EmptyKey` on `""`
    /// and `DuplicateKey` under `Reject`.
    pub fn insert(&mut self, key: &str, value: V, behavior: InsertBehavior) -> Result<bool> {
        if key.is_empty() {
            return Err(CollectionError::EmptyKey);
        }
        if let Some(idx) = self.find(key) {
            return match behavior {
                InsertBehavior::Reject => Err(CollectionError::DuplicateKey(key.to_owned())),
                InsertBehavior::Overwrite => {
                    if let Slot::Occupied { value: stored, .. } = &mut self.slots[idx] {
                        *stored = value;
                    }
                    Ok(true)
                }
                InsertBehavior::Skip => Ok(false),
            };
        }
        // grow at 3/4 load, counting tombstones
        if (self.used + 1) * 4 > self.slots.len() * 3 {
            self.grow();
        }
        let hash = self.hash(key);
        let idx = self.vacant_slot(hash);
        if matches!(self.slots[idx], Slot::Empty) {
            self.used += 1;
        }
        self.slots[idx] = Slot::Occupied {
            hash,
            key: Box::from(key),
            value,
        };
        self.len += 1;
        Ok(true)
    }

    /// The value stored under a key equal to `region`, byte for byte.
    pub fn try_get(&self, region: &str) -> Option<&V> {
        self.find(region).and_then(|idx| match &self.slots[idx] {
            Slot::Occupied { value, .. } => Some(value),
            _ => None,
        })
    }

    /// Removes the entry whose key equals `region`, returning its value.
    pub fn remove(&mut self, region: &str) -> Option<V> {
        let idx = self.find(region)?;
        match std::mem::replace(&mut self.slots[idx], Slot::Tombstone) {
            Slot::Occupied { value, .. } => {
                self.len -= 1;
                Some(value)
            }
            // find() only returns occupied slots
            _ => None,
        }
    }

    /// First empty or tombstoned slot on the probe sequence for `hash`.
    /// The load factor guarantees one exists.
    fn vacant_slot(&self, hash: u32) -> usize {
        let mask = self.mask();
        let mut probe = 0usize;
        loop {
            let idx = (hash as usize).wrapping_add(probe) & mask;
            if self.slots[idx].is_vacant() {
                return idx;
            }
            probe += 1;
        }
    }

    fn grow(&mut self) {
        let next = (self.slots.len() * 2).max(MIN_SLOTS);
        let old = std::mem::replace(
            &mut self.slots,
            (0..next).map(|_| Slot::Empty).collect(),
        );
        self.used = self.len;
        for slot in old {
            if let Slot::Occupied { hash, key, value } = slot {
                let idx = self.vacant_slot(hash);
                self.slots[idx] = Slot::Occupied { hash, key, value };
            }
        }
    }
}

impl<V> Default for SubstringDictionary<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> std::fmt::Debug for SubstringDictionary<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubstringDictionary")
            .field("len", &self.len)
            .field("slots", &self.slots.len())
            .finish()
    }
}

fn slots_for(capacity: usize) -> usize {
    if capacity == 0 {
        MIN_SLOTS
    } else {
        (capacity * 4 / 3 + 1).next_power_of_two().max(MIN_SLOTS)
    }
}
