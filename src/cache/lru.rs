//! LRU Tracker Module
//!
//! Implements Least Recently Used tracking for cache eviction.

/// Marks the absence of a neighbour.
const NIL: usize = usize::MAX;

// == Node Handle ==
/// Stable reference to a node of the [`RecencyIndex`].
///
/// A handle stays valid until its node is removed; slots are then recycled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHandle(usize);

impl NodeHandle {
    #[cfg(test)]
    pub(crate) fn from_slot(slot: usize) -> Self {
        Self(slot)
    }
}

#[derive(Debug)]
struct Node<K> {
    /// None while the slot sits on the free list
    key: Option<K>,
    prev: usize,
    next: usize,
}

// == Recency Index ==
/// Tracks access order for LRU eviction strategy.
///
/// Nodes live in a `Vec` arena and are linked by index:
/// - Head = Most recently used
/// - Tail = Least recently used
///
/// Touch, remove and eviction are all O(1).
#[derive(Debug)]
pub struct RecencyIndex<K> {
    nodes: Vec<Node<K>>,
    head: usize,
    tail: usize,
    /// Recycled slots
    free: Vec<usize>,
    len: usize,
}

impl<K> Default for RecencyIndex<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K> RecencyIndex<K> {
    // == Constructor ==
    /// Creates a new empty index.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty index with room for `capacity` nodes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            head: NIL,
            tail: NIL,
            free: Vec::new(),
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts a key as the most recently used and returns its handle.
    pub fn push_front(&mut self, key: K) -> NodeHandle {
        let node = Node {
            key: Some(key),
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        };
        self.attach_front(slot);
        self.len += 1;
        NodeHandle(slot)
    }

    // == Touch ==
    /// Marks a node as recently used (moves it to the head).
    pub fn touch(&mut self, handle: NodeHandle) {
        debug_assert!(self.is_live(handle.0), "touch on a detached node");
        if self.head == handle.0 {
            return;
        }
        self.detach(handle.0);
        self.attach_front(handle.0);
    }

    // == Remove ==
    /// Removes a node and returns its key.
    pub fn remove(&mut self, handle: NodeHandle) -> Option<K> {
        if !self.is_live(handle.0) {
            return None;
        }
        self.detach(handle.0);
        self.len -= 1;
        self.free.push(handle.0);
        self.nodes[handle.0].key.take()
    }

    // == Evict Oldest ==
    /// Returns and removes the least recently used key.
    ///
    /// Returns None if the index is empty.
    pub fn pop_back(&mut self) -> Option<K> {
        match self.tail {
            NIL => None,
            tail => self.remove(NodeHandle(tail)),
        }
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_back(&self) -> Option<&K> {
        self.nodes.get(self.tail).and_then(|node| node.key.as_ref())
    }

    /// Returns the key behind a handle.
    pub fn key(&self, handle: NodeHandle) -> Option<&K> {
        self.nodes.get(handle.0).and_then(|node| node.key.as_ref())
    }

    // == Slot Access ==
    /// Number of arena slots, live or free.
    ///
    /// Slot numbers are stable while nodes stay alive, which lets a sweep walk
    /// the arena in batches across lock releases.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    /// Returns the key stored in `slot`, or None for a free or missing slot.
    pub fn key_at(&self, slot: usize) -> Option<&K> {
        self.nodes.get(slot).and_then(|node| node.key.as_ref())
    }

    // == Length ==
    /// Returns the number of tracked keys.
    pub fn len(&self) -> usize {
        self.len
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drops every node.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        self.len = 0;
    }

    /// Iterates keys from most to least recently used.
    pub fn iter(&self) -> Iter<'_, K> {
        Iter {
            index: self,
            cursor: self.head,
        }
    }

    fn is_live(&self, slot: usize) -> bool {
        self.nodes.get(slot).is_some_and(|node| node.key.is_some())
    }

    fn attach_front(&mut self, slot: usize) {
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = self.head;
        match self.head {
            NIL => self.tail = slot,
            head => self.nodes[head].prev = slot,
        }
        self.head = slot;
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = (self.nodes[slot].prev, self.nodes[slot].next);
        match prev {
            NIL => self.head = next,
            prev => self.nodes[prev].next = next,
        }
        match next {
            NIL => self.tail = prev,
            next => self.nodes[next].prev = prev,
        }
        self.nodes[slot].prev = NIL;
        self.nodes[slot].next = NIL;
    }
}

/// Iterator over keys in recency order, most recent first.
pub struct Iter<'a, K> {
    index: &'a RecencyIndex<K>,
    cursor: usize,
}

impl<'a, K> Iterator for Iter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.index.nodes.get(self.cursor)?;
        self.cursor = node.next;
        node.key.as_ref()
    }
}
