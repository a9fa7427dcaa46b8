//! Memory block shortcut list.
//!
//! Each network keeps a doubly linked list of the memory blocks currently
//! feeding it, so resolving a signal to its block does not need a scan over
//! every block of the communication root.  Nodes live in an arena and link by
//! index; appending at the tail and unlinking a known node are both O(1).
//!
//! A shortcut holds a `Weak` block reference.  If a block vanishes without a
//! deletion notification the shortcut goes stale, and the next scan drops it.

use std::sync::{Arc, Weak};

use crate::mblk::{MblkHandle, MblkInfo, MemoryBlock, is_same_block};

/// Generational handle to a shortcut node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShortcutId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Node {
    mblk: Weak<MemoryBlock>,
    info: MblkInfo,
    prev: Option<u32>,
    next: Option<u32>,
}

#[derive(Debug)]
struct Slot {
    node: Option<Node>,
    generation: u32,
}

#[derive(Debug, Default)]
pub struct ShortcutList {
    slots: Vec<Slot>,
    free: Vec<u32>,
    head: Option<u32>,
    tail: Option<u32>,
    len: usize,
}

impl ShortcutList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append a shortcut to `mblk` at the tail.
    pub fn push_back(&mut self, mblk: &MblkHandle) -> ShortcutId {
        let node = Node {
            mblk: Arc::downgrade(mblk),
            info: mblk.info().clone(),
            prev: self.tail,
            next: None,
        };
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index as usize].node = Some(node);
                index
            }
            None => {
                self.slots.push(Slot {
                    node: Some(node),
                    generation: 0,
                });
                (self.slots.len() - 1) as u32
            }
        };

        match self.tail.and_then(|tail| self.node_mut(tail)) {
            Some(tail) => tail.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        self.len += 1;

        ShortcutId {
            index,
            generation: self.slots[index as usize].generation,
        }
    }

    /// Unlink a shortcut.  Returns `false` for a stale id.
    pub fn release(&mut self, id: ShortcutId) -> bool {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return false;
        };
        if slot.generation != id.generation {
            return false;
        }
        let Some(node) = slot.node.take() else {
            return false;
        };
        slot.generation = slot.generation.wrapping_add(1);

        match node.prev.and_then(|prev| self.node_mut(prev)) {
            Some(prev) => prev.next = node.next,
            None => self.head = node.next,
        }
        match node.next.and_then(|next| self.node_mut(next)) {
            Some(next) => next.prev = node.prev,
            None => self.tail = node.prev,
        }
        self.free.push(id.index);
        self.len -= 1;
        true
    }

    /// First live block matching the key.  Stale shortcuts met on the way
    /// are released.
    pub fn find(&mut self, mblk_name: &str, device_name: &str, device_nr: u32) -> Option<MblkHandle> {
        let mut stale = Vec::new();
        let mut found = None;
        for (id, node) in self.nodes() {
            if !node.info.matches(mblk_name, device_name, device_nr) {
                continue;
            }
            match node.mblk.upgrade() {
                Some(mblk) => {
                    found = Some(mblk);
                    break;
                }
                None => stale.push(id),
            }
        }
        for id in stale {
            self.release(id);
        }
        found
    }

    /// Id of the shortcut referring to `mblk`, if any.
    pub fn find_block(&self, mblk: &MemoryBlock) -> Option<ShortcutId> {
        self.nodes()
            .find(|(_, node)| is_same_block(&node.mblk, mblk))
            .map(|(id, _)| id)
    }

    /// Release shortcuts that refer to `deleting` or to a block that is gone.
    /// Returns how many were released.
    pub fn clean(&mut self, deleting: Option<&MemoryBlock>) -> usize {
        let doomed: Vec<ShortcutId> = self
            .nodes()
            .filter(|(_, node)| {
                deleting.is_some_and(|mblk| is_same_block(&node.mblk, mblk))
                    || node.mblk.strong_count() == 0
            })
            .map(|(id, _)| id)
            .collect();
        doomed.into_iter().filter(|id| self.release(*id)).count()
    }

    /// Live blocks, head to tail.
    pub fn blocks(&self) -> impl Iterator<Item = MblkHandle> + '_ {
        self.nodes().filter_map(|(_, node)| node.mblk.upgrade())
    }

    /// Metadata of every shortcut, live or stale, head to tail.
    pub fn infos(&self) -> impl Iterator<Item = &MblkInfo> + '_ {
        self.nodes().map(|(_, node)| &node.info)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    fn nodes(&self) -> impl Iterator<Item = (ShortcutId, &Node)> + '_ {
        let mut cur = self.head;
        core::iter::from_fn(move || {
            let index = cur?;
            let slot = &self.slots[index as usize];
            let node = slot.node.as_ref()?;
            cur = node.next;
            Some((
                ShortcutId {
                    index,
                    generation: slot.generation,
                },
                node,
            ))
        })
    }

    fn node_mut(&mut self, index: u32) -> Option<&mut Node> {
        self.slots.get_mut(index as usize).and_then(|slot| slot.node.as_mut())
    }
}
