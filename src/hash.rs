//! Fixed-bucket string-keyed hash table.
//!
//! Both the per-network signal table (64 buckets) and the root's network
//! table (128 buckets) use this index.  Items live in an arena and are
//! chained per bucket through "next" indices instead of pointers:
//!
//! ```text
//!   heads: [ 0 ][ 1 ][ 2 ] ... [BUCKETS-1]
//!            │         │
//!            ▼         ▼
//!   slots: ┌────┐    ┌────┐   ┌────┐
//!          │ #4 │──▶ │ #0 │   │ #2 │──▶ none
//!          └────┘    └────┘   └────┘
//! ```
//!
//! Handles ([`SlotId`]) carry a generation, so a handle to a removed item
//! never resolves to whatever later reuses its slot.  There is no resizing;
//! chain length is bounded only statistically, which is fine for the small
//! number of networks and signals of one deployment.

/// Hash a key.  Pure and stable across runs and platforms: a weighted sum of
/// the key bytes, weights cycling through a fixed table of primes.
pub fn hash(key: &str) -> u32 {
    const PRIMES: [u32; 15] = [47, 2, 43, 3, 41, 5, 37, 7, 31, 11, 29, 13, 23, 17, 19];

    key.bytes()
        .zip(PRIMES.iter().cycle())
        .fold(0u32, |sum, (c, p)| sum.wrapping_add(u32::from(c).wrapping_mul(*p)))
}

/// Something stored in a [`HashIndex`], keyed by a short string.
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Generational handle to an item in a [`HashIndex`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot<T> {
    item: Option<T>,
    generation: u32,
    next: Option<SlotId>,
}

/// Hash table with `BUCKETS` chains, insertion order kept within a chain.
#[derive(Debug)]
pub struct HashIndex<T, const BUCKETS: usize> {
    heads: [Option<SlotId>; BUCKETS],
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T: Keyed, const BUCKETS: usize> HashIndex<T, BUCKETS> {
    pub fn new() -> Self {
        Self {
            heads: [None; BUCKETS],
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Bucket index for a key.
    pub fn bucket_of(key: &str) -> usize {
        hash(key) as usize % BUCKETS
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append `item` at the tail of its bucket chain.  O(chain length).
    pub fn insert(&mut self, item: T) -> SlotId {
        let bucket = Self::bucket_of(item.key());
        let id = self.alloc(item);

        match self.tail_of(bucket) {
            Some(tail) => self.slot_mut(tail).next = Some(id),
            None => self.heads[bucket] = Some(id),
        }
        self.len += 1;
        id
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.item.as_ref())
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.item.as_mut())
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.get(id).is_some()
    }

    /// Unlink an item from its chain and return it.  `None` for a stale id.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        let bucket = Self::bucket_of(self.get(id)?.key());
        let next = self.slot_mut(id).next;

        let mut prev = None;
        let mut cur = self.heads[bucket];
        while let Some(c) = cur {
            if c == id {
                break;
            }
            prev = Some(c);
            cur = self.slot_mut(c).next;
        }
        match prev {
            Some(p) => self.slot_mut(p).next = next,
            None => self.heads[bucket] = next,
        }

        let slot = self.slot_mut(id);
        let item = slot.item.take();
        slot.next = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        item
    }

    /// First item of the chain `key` hashes to (whatever its own key).
    pub fn chain_head(&self, key: &str) -> Option<SlotId> {
        self.heads[Self::bucket_of(key)]
    }

    /// Item following `id` in its chain.
    pub fn chain_next(&self, id: SlotId) -> Option<SlotId> {
        self.slots
            .get(id.index as usize)
            .filter(|s| s.generation == id.generation && s.item.is_some())
            .and_then(|s| s.next)
    }

    /// All items in the chain for `key`, in insertion order.
    pub fn chain<'a>(&'a self, key: &str) -> impl Iterator<Item = (SlotId, &'a T)> + 'a {
        let mut cur = self.chain_head(key);
        core::iter::from_fn(move || {
            let id = cur?;
            cur = self.chain_next(id);
            self.get(id).map(|item| (id, item))
        })
    }

    /// First item whose key equals `key` and satisfies `pred`.
    pub fn find(&self, key: &str, mut pred: impl FnMut(&T) -> bool) -> Option<SlotId> {
        self.chain(key)
            .find(|(_, item)| item.key() == key && pred(item))
            .map(|(id, _)| id)
    }

    /// Every item, bucket by bucket.
    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> + '_ {
        self.heads.iter().flat_map(move |head| {
            let mut cur = *head;
            core::iter::from_fn(move || {
                let id = cur?;
                cur = self.chain_next(id);
                self.get(id).map(|item| (id, item))
            })
        })
    }

    /// Remove every item for which `pred` is true, returning them.
    pub fn remove_where(&mut self, mut pred: impl FnMut(&T) -> bool) -> Vec<T> {
        let doomed: Vec<SlotId> = self
            .iter()
            .filter(|(_, item)| pred(item))
            .map(|(id, _)| id)
            .collect();
        doomed.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    /// Drop every item.
    pub fn clear(&mut self) {
        self.heads = [None; BUCKETS];
        self.slots.clear();
        self.free.clear();
        self.len = 0;
    }

    fn alloc(&mut self, item: T) -> SlotId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.item = Some(item);
            slot.next = None;
            return SlotId {
                index,
                generation: slot.generation,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            item: Some(item),
            generation: 0,
            next: None,
        });
        SlotId {
            index,
            generation: 0,
        }
    }

    fn tail_of(&self, bucket: usize) -> Option<SlotId> {
        let mut cur = self.heads[bucket]?;
        while let Some(next) = self.slots[cur.index as usize].next {
            cur = next;
        }
        Some(cur)
    }

    fn slot_mut(&mut self, id: SlotId) -> &mut Slot<T> {
        &mut self.slots[id.index as usize]
    }
}

impl<T: Keyed, const BUCKETS: usize> Default for HashIndex<T, BUCKETS> {
    fn default() -> Self {
        Self::new()
    }
}
