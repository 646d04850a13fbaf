//! Time-ordered expiry queue.
//!
//! A singly-linked list stored in a `Vec` arena and addressed by index. The
//! head is always the entry that expires first, so a GC sweep touches only
//! expired entries and never rescans live ones. Freed slots are recycled and
//! the arena is released once the queue drains.

/// Queue entry: an id and the wall-clock millisecond at which it expires
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryEntry {
    pub id: String,
    pub expires_at: i64,
}

#[derive(Debug)]
struct Slot {
    entry: ExpiryEntry,
    next: Option<usize>,
}

#[derive(Debug, Default)]
pub struct ExpiryQueue {
    slots: Vec<Slot>,
    free: Vec<usize>,
    head: Option<usize>,
    tail: Option<usize>,
    len: usize,
}

impl ExpiryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Entry that expires first
    pub fn front(&self) -> Option<&ExpiryEntry> {
        self.head.map(|i| &self.slots[i].entry)
    }

    /// Entry that expires last
    pub fn back(&self) -> Option<&ExpiryEntry> {
        self.tail.map(|i| &self.slots[i].entry)
    }

    /// Append an entry that expires no earlier than the current tail.
    ///
    /// Local adds share one TTL, so they always land here. If the wall clock
    /// stepped backwards the entry is placed by `insert_sorted` instead.
    pub fn push_back(&mut self, id: String, expires_at: i64) {
        if self.back().is_some_and(|tail| tail.expires_at > expires_at) {
            self.insert_sorted(id, expires_at);
            return;
        }

        let index = self.alloc(id, expires_at);
        match self.tail {
            Some(tail) => self.slots[tail].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    /// Insert an entry at its time-ordered position, scanning from the head.
    ///
    /// Entries with equal expiry keep insertion order.
    pub fn insert_sorted(&mut self, id: String, expires_at: i64) {
        let mut previous: Option<usize> = None;
        let mut current = self.head;
        while let Some(i) = current {
            if expires_at < self.slots[i].entry.expires_at {
                break;
            }
            previous = Some(i);
            current = self.slots[i].next;
        }

        let index = self.alloc(id, expires_at);
        self.slots[index].next = current;
        match previous {
            Some(p) => self.slots[p].next = Some(index),
            None => self.head = Some(index),
        }
        if current.is_none() {
            self.tail = Some(index);
        }
    }

    /// Pop every entry with `expires_at <= now`, oldest first
    pub fn pop_expired(&mut self, now: i64) -> Vec<String> {
        let mut expired = Vec::new();
        while let Some(head) = self.head {
            if self.slots[head].entry.expires_at > now {
                break;
            }
            let slot = &mut self.slots[head];
            expired.push(std::mem::take(&mut slot.entry.id));
            self.head = slot.next.take();
            self.free.push(head);
            self.len -= 1;
        }

        if self.head.is_none() {
            self.tail = None;
            self.slots.clear();
            self.free.clear();
        }
        expired
    }

    /// Entries in expiry order
    pub fn iter(&self) -> impl Iterator<Item = &ExpiryEntry> {
        std::iter::successors(self.head, |&i| self.slots[i].next).map(|i| &self.slots[i].entry)
    }

    fn alloc(&mut self, id: String, expires_at: i64) -> usize {
        self.len += 1;
        let slot = Slot {
            entry: ExpiryEntry { id, expires_at },
            next: None,
        };
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                index
            }
            None => {
                self.slots.push(slot);
                self.slots.len() - 1
            }
        }
    }
}
