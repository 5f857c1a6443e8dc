//! Ordered holding area for serialized responses.
//!
//! Only the head entry is ever handed to the transport, so at most one write
//! is in flight and entries reach the wire in enqueue order. The queue is
//! owned by the session task and needs no locking.

use std::collections::VecDeque;

/// How an entry entered the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    /// Answer to the current request; completing it resumes the read cycle.
    Reply,
    /// Server-initiated message; does not touch the read cycle.
    Push,
}

#[derive(Debug)]
pub(crate) struct Outgoing {
    /// Assigned by the queue; a write deadline names the entry it guards.
    pub(crate) id: u64,
    buffer: Vec<u8>,
    written: usize,
    pub(crate) delivery: Delivery,
    /// The peer is not kept alive after this entry.
    pub(crate) close: bool,
}

impl Outgoing {
    pub(crate) fn new(buffer: Vec<u8>, delivery: Delivery, close: bool) -> Self {
        Self {
            id: 0,
            buffer,
            written: 0,
            delivery,
            close,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buffer.len()
    }

    fn remaining(&self) -> &[u8] {
        &self.buffer[self.written..]
    }
}

#[derive(Debug, Default)]
pub(crate) struct ResponseQueue {
    entries: VecDeque<Outgoing>,
    next_id: u64,
}

impl ResponseQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail and returns the id given to the entry.
    pub(crate) fn enqueue(&mut self, mut entry: Outgoing) -> u64 {
        self.next_id += 1;
        entry.id = self.next_id;
        self.entries.push_back(entry);
        self.next_id
    }

    /// Bytes of the head entry not yet accepted by the transport; empty when idle.
    pub(crate) fn pending(&self) -> &[u8] {
        self.entries.front().map(Outgoing::remaining).unwrap_or(&[])
    }

    /// Records `n` bytes of the head as written. Returns the head once it has
    /// been written completely, making the next entry the one in flight.
    pub(crate) fn advance(&mut self, n: usize) -> Option<Outgoing> {
        let head = self.entries.front_mut()?;
        head.written = (head.written + n).min(head.buffer.len());
        if head.written < head.buffer.len() {
            return None;
        }
        self.entries.pop_front()
    }

    /// Id of the entry in flight.
    pub(crate) fn head_id(&self) -> Option<u64> {
        self.entries.front().map(|entry| entry.id)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Abandons every unsent entry, returning how many were dropped.
    pub(crate) fn clear(&mut self) -> usize {
        let abandoned = self.entries.len();
        self.entries.clear();
        abandoned
    }
}
