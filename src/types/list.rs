// src/types/list.rs

//! # List Type Support
//!
//! A list is kept in a [`Ziplist`] while it is small, and in a
//! `VecDeque<ByteBuffer>` once it holds more than `list_max_ziplist_entries`
//! elements or any element longer than `list_max_ziplist_value` bytes.
//!
//! Supported commands:
//! - `LPUSH`
//! - `RPUSH`
//! - `LPOP`
//! - `RPOP`
//! - `LRANGE`
//! - `LLEN`

use std::borrow::Cow;
use std::collections::VecDeque;
use std::collections::vec_deque;

use tracing::debug;

use crate::config::EncodingLimits;
use crate::engine::MemoryKeyspace;
use crate::error::Result;
use crate::object::Value;
use crate::types::Encoding;
use crate::types::string::ByteBuffer;
use crate::types::ziplist::{Ziplist, ZiplistIter};

/// Which end of the list an operation applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListEnd {
    Head,
    Tail,
}

#[derive(Debug, Clone)]
enum ListRepr {
    Ziplist(Ziplist),
    Deque(VecDeque<ByteBuffer>),
}

#[derive(Debug, Clone)]
pub struct ListValue {
    repr: ListRepr,
}

impl Default for ListValue {
    fn default() -> Self {
        Self::new()
    }
}

impl ListValue {
    pub fn new() -> Self {
        ListValue { repr: ListRepr::Ziplist(Ziplist::new()) }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ListValue { repr: ListRepr::Deque(VecDeque::with_capacity(capacity)) }
    }

    /// Wrap a ziplist read from a snapshot.
    pub fn from_ziplist(zl: Ziplist) -> Self {
        ListValue { repr: ListRepr::Ziplist(zl) }
    }

    pub fn encoding(&self) -> Encoding {
        match self.repr {
            ListRepr::Ziplist(_) => Encoding::Ziplist,
            ListRepr::Deque(_) => Encoding::LinkedList,
        }
    }

    pub fn ziplist(&self) -> Option<&Ziplist> {
        match &self.repr {
            ListRepr::Ziplist(zl) => Some(zl),
            ListRepr::Deque(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            ListRepr::Ziplist(zl) => zl.len(),
            ListRepr::Deque(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push `value` at `end`, converting first if the value is too long
    /// and afterwards if the list grew past the entry limit.
    pub fn push(&mut self, value: &[u8], end: ListEnd, limits: EncodingLimits) {
        if matches!(self.repr, ListRepr::Ziplist(_)) && !limits.value_fits(value.len()) {
            self.convert_to_general();
        }
        match &mut self.repr {
            ListRepr::Ziplist(zl) => {
                match end {
                    ListEnd::Head => zl.push_front(value),
                    ListEnd::Tail => zl.push_back(value),
                }
                if zl.len() > limits.max_entries {
                    self.convert_to_general();
                }
            }
            ListRepr::Deque(d) => match end {
                ListEnd::Head => d.push_front(ByteBuffer::from_bytes(value)),
                ListEnd::Tail => d.push_back(ByteBuffer::from_bytes(value)),
            },
        }
    }

    pub fn pop(&mut self, end: ListEnd) -> Option<ByteBuffer> {
        match &mut self.repr {
            ListRepr::Ziplist(zl) => {
                let idx = match end {
                    ListEnd::Head => 0,
                    ListEnd::Tail => zl.len().checked_sub(1)?,
                };
                let value = ByteBuffer::from(zl.get(idx)?.to_bytes());
                zl.delete_range(idx, 1);
                Some(value)
            }
            ListRepr::Deque(d) => match end {
                ListEnd::Head => d.pop_front(),
                ListEnd::Tail => d.pop_back(),
            },
        }
    }

    /// Element at `index`; negative indices count from the tail.
    pub fn index(&self, index: isize) -> Option<Cow<'_, [u8]>> {
        let len = self.len() as isize;
        let index = if index < 0 { index + len } else { index };
        if index < 0 || index >= len {
            return None;
        }
        let index = index as usize;
        match &self.repr {
            ListRepr::Ziplist(zl) => zl.get(index).map(|e| e.to_bytes()),
            ListRepr::Deque(d) => d.get(index).map(|b| Cow::Borrowed(b.as_bytes())),
        }
    }

    /// Elements in the inclusive range `[start, stop]` (negative indices allowed).
    pub fn range(&self, start: isize, stop: isize) -> Vec<ByteBuffer> {
        let len = self.len() as isize;
        let start = if start < 0 { (start + len).max(0) } else { start };
        let stop = if stop < 0 { stop + len } else { stop };
        if start > stop || start >= len {
            return Vec::new();
        }
        let stop = stop.min(len - 1);
        self.iter()
            .skip(start as usize)
            .take((stop - start + 1) as usize)
            .map(ByteBuffer::from)
            .collect()
    }

    pub fn iter(&self) -> ListIter<'_> {
        match &self.repr {
            ListRepr::Ziplist(zl) => ListIter::Ziplist(zl.iter()),
            ListRepr::Deque(d) => ListIter::Deque(d.iter()),
        }
    }

    /// Convert to the general encoding. Does nothing if already general.
    pub fn convert_to_general(&mut self) {
        let ListRepr::Ziplist(zl) = &self.repr else {
            return;
        };
        let mut deque = VecDeque::with_capacity(zl.len());
        deque.extend(zl.iter().map(|e| ByteBuffer::from(e.to_bytes())));
        debug!(entries = deque.len(), "list converted from ziplist to linkedlist");
        self.repr = ListRepr::Deque(deque);
    }

    /// Re-check a compact list against the current thresholds.
    pub fn enforce_limits(&mut self, limits: EncodingLimits) {
        if let ListRepr::Ziplist(zl) = &self.repr {
            if zl.len() > limits.max_entries || !limits.value_fits(zl.max_entry_len()) {
                self.convert_to_general();
            }
        }
    }
}

/// Iterator over list elements, head to tail.
pub enum ListIter<'a> {
    Ziplist(ZiplistIter<'a>),
    Deque(vec_deque::Iter<'a, ByteBuffer>),
}

impl<'a> Iterator for ListIter<'a> {
    type Item = Cow<'a, [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ListIter::Ziplist(it) => it.next().map(|e| e.to_bytes()),
            ListIter::Deque(it) => it.next().map(|b| Cow::Borrowed(b.as_bytes())),
        }
    }
}

fn push(ks: &mut MemoryKeyspace, db: usize, key: &[u8], value: &[u8], end: ListEnd) -> Result<usize> {
    let limits = ks.limits().list;
    let list = ks.get_or_create(db, key, || Value::List(ListValue::new()))?.as_list_mut()?;
    list.push(value, end, limits);
    let len = list.len();
    ks.mark_dirty(1);
    Ok(len)
}

fn pop(ks: &mut MemoryKeyspace, db: usize, key: &[u8], end: ListEnd) -> Result<Option<ByteBuffer>> {
    let Some(value) = ks.get_value_mut(db, key)? else {
        return Ok(None);
    };
    let list = value.as_list_mut()?;
    let popped = list.pop(end);
    if list.is_empty() {
        ks.remove(db, key)?;
    }
    if popped.is_some() {
        ks.mark_dirty(1);
    }
    Ok(popped)
}

/// Execute LPUSH: push `value` to the head of the list.
///
/// # Returns
///
/// The length of the list after the push.
pub fn lpush(ks: &mut MemoryKeyspace, db: usize, key: &[u8], value: &[u8]) -> Result<usize> {
    push(ks, db, key, value, ListEnd::Head)
}

/// Execute RPUSH: push `value` to the tail of the list.
pub fn rpush(ks: &mut MemoryKeyspace, db: usize, key: &[u8], value: &[u8]) -> Result<usize> {
    push(ks, db, key, value, ListEnd::Tail)
}

/// Execute LPOP. The key is removed once the list is empty.
pub fn lpop(ks: &mut MemoryKeyspace, db: usize, key: &[u8]) -> Result<Option<ByteBuffer>> {
    pop(ks, db, key, ListEnd::Head)
}

/// Execute RPOP.
pub fn rpop(ks: &mut MemoryKeyspace, db: usize, key: &[u8]) -> Result<Option<ByteBuffer>> {
    pop(ks, db, key, ListEnd::Tail)
}

/// Execute LRANGE key start stop.
pub fn lrange(ks: &MemoryKeyspace, db: usize, key: &[u8], start: isize, stop: isize) -> Result<Vec<ByteBuffer>> {
    match ks.get_value(db, key)? {
        None => Ok(Vec::new()),
        Some(v) => Ok(v.as_list()?.range(start, stop)),
    }
}

/// Execute LLEN.
pub fn llen(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<usize> {
    match ks.get_value(db, key)? {
        None => Ok(0),
        Some(v) => Ok(v.as_list()?.len()),
    }
}
