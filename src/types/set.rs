// src/types/set.rs

//! # Set Type Support
//!
//! A set starts life as an [`Intset`]: a sorted array of integers that is
//! cheap to store and to serialize. It is converted to a general
//! `HashSet<ByteBuffer>` as soon as
//! - a member that is not a canonical decimal `i64` is added, or
//! - the number of members exceeds `set_max_intset_entries`.
//!
//! The conversion is one-way for the lifetime of the value.
//!
//! Supported commands:
//! - `SADD`
//! - `SREM`
//! - `SMEMBERS`
//! - `SISMEMBER`
//! - `SCARD`

use std::borrow::Cow;
use std::collections::HashSet;
use std::collections::hash_set;

use tracing::debug;

use crate::config::EncodingLimits;
use crate::engine::MemoryKeyspace;
use crate::error::Result;
use crate::object::Value;
use crate::types::Encoding;
use crate::types::intset::Intset;
use crate::types::string::{ByteBuffer, parse_canonical_i64};

#[derive(Debug, Clone)]
enum SetRepr {
    Intset(Intset),
    Table(HashSet<ByteBuffer>),
}

/// A dual-encoding set value.
#[derive(Debug, Clone)]
pub struct SetValue {
    repr: SetRepr,
}

impl SetValue {
    /// Create an empty set suitable for holding `first_member`:
    /// an intset when it is a canonical integer, a hash set otherwise.
    pub fn new_for(first_member: &[u8]) -> Self {
        if parse_canonical_i64(first_member).is_some() {
            SetValue { repr: SetRepr::Intset(Intset::new()) }
        } else {
            SetValue::with_capacity(0)
        }
    }

    /// Create an empty general-encoded set sized for `capacity` members.
    pub fn with_capacity(capacity: usize) -> Self {
        SetValue { repr: SetRepr::Table(HashSet::with_capacity(capacity)) }
    }

    /// Wrap an intset read from a snapshot.
    pub fn from_intset(intset: Intset) -> Self {
        SetValue { repr: SetRepr::Intset(intset) }
    }

    pub fn encoding(&self) -> Encoding {
        match self.repr {
            SetRepr::Intset(_) => Encoding::Intset,
            SetRepr::Table(_) => Encoding::HashTable,
        }
    }

    /// The underlying intset, when compact.
    pub fn intset(&self) -> Option<&Intset> {
        match &self.repr {
            SetRepr::Intset(is) => Some(is),
            SetRepr::Table(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            SetRepr::Intset(is) => is.len(),
            SetRepr::Table(set) => set.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        match &self.repr {
            SetRepr::Intset(is) => parse_canonical_i64(member).is_some_and(|v| is.contains(v)),
            SetRepr::Table(set) => set.contains(member),
        }
    }

    /// Add `member`, converting to the general encoding when required.
    ///
    /// # Returns
    ///
    /// `true` if the member was newly added.
    pub fn add(&mut self, member: &[u8], limits: EncodingLimits) -> bool {
        if let SetRepr::Intset(is) = &mut self.repr {
            match parse_canonical_i64(member) {
                Some(v) => {
                    if !is.add(v) {
                        return false;
                    }
                    if is.len() > limits.max_entries {
                        self.convert_to_general();
                    }
                    return true;
                }
                None => self.convert_to_general(),
            }
        }
        match &mut self.repr {
            SetRepr::Table(set) => set.insert(ByteBuffer::from_bytes(member)),
            SetRepr::Intset(_) => unreachable!("set is general after conversion"),
        }
    }

    /// Remove `member`.
    ///
    /// # Returns
    ///
    /// `true` if the member existed.
    pub fn remove(&mut self, member: &[u8]) -> bool {
        match &mut self.repr {
            SetRepr::Intset(is) => parse_canonical_i64(member).is_some_and(|v| is.remove(v)),
            SetRepr::Table(set) => set.remove(member),
        }
    }

    /// Iterate over the members. Intset members are rendered in decimal.
    pub fn iter(&self) -> SetIter<'_> {
        match &self.repr {
            SetRepr::Intset(is) => SetIter::Intset(Box::new(is.iter())),
            SetRepr::Table(set) => SetIter::Table(set.iter()),
        }
    }

    /// Convert to the general encoding. Does nothing if already general.
    pub fn convert_to_general(&mut self) {
        self.convert_to_general_sized(self.len());
    }

    /// Like [`convert_to_general`](Self::convert_to_general), but pre-sizes the
    /// table for `capacity` members.
    pub fn convert_to_general_sized(&mut self, capacity: usize) {
        let SetRepr::Intset(is) = &self.repr else {
            return;
        };
        let mut set = HashSet::with_capacity(capacity.max(is.len()));
        set.extend(is.iter().map(ByteBuffer::from_i64));
        debug!(members = set.len(), "set converted from intset to hashtable");
        self.repr = SetRepr::Table(set);
    }

    /// Re-check a compact set against the current thresholds (used after loading).
    pub fn enforce_limits(&mut self, limits: EncodingLimits) {
        if matches!(&self.repr, SetRepr::Intset(is) if is.len() > limits.max_entries) {
            self.convert_to_general();
        }
    }
}

/// Iterator over set members.
pub enum SetIter<'a> {
    Intset(Box<dyn Iterator<Item = i64> + 'a>),
    Table(hash_set::Iter<'a, ByteBuffer>),
}

impl<'a> Iterator for SetIter<'a> {
    type Item = Cow<'a, [u8]>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SetIter::Intset(it) => it.next().map(|v| Cow::Owned(v.to_string().into_bytes())),
            SetIter::Table(it) => it.next().map(|m| Cow::Borrowed(m.as_bytes())),
        }
    }
}

/// Execute the SADD command:
/// Add the specified `member` to the set stored at `key`.
///
/// # Arguments
///
/// * `ks`     – The keyspace.
/// * `db`     – Database index.
/// * `key`    – Name of the set.
/// * `member` – Member to add to the set.
///
/// # Returns
///
/// * `true` if the member was newly added (did not exist before).
/// * `false` if the member was already present in the set.
///
/// # Errors
///
/// Returns `WrongType` if `key` holds a non-set value.
pub fn sadd(ks: &mut MemoryKeyspace, db: usize, key: &[u8], member: &[u8]) -> Result<bool> {
    let limits = ks.limits().set;
    let set = ks.get_or_create(db, key, || Value::Set(SetValue::new_for(member)))?.as_set_mut()?;
    let added = set.add(member, limits);
    if added {
        ks.mark_dirty(1);
    }
    Ok(added)
}

/// Execute the SREM command:
/// Remove the specified `member` from the set stored at `key`.
/// The key is deleted when the set becomes empty.
///
/// # Returns
///
/// * `true` if the member existed and was removed.
/// * `false` if the member did not exist.
pub fn srem(ks: &mut MemoryKeyspace, db: usize, key: &[u8], member: &[u8]) -> Result<bool> {
    let Some(value) = ks.get_value_mut(db, key)? else {
        return Ok(false);
    };
    let set = value.as_set_mut()?;
    let removed = set.remove(member);
    if set.is_empty() {
        ks.remove(db, key)?;
    }
    if removed {
        ks.mark_dirty(1);
    }
    Ok(removed)
}

/// Execute the SMEMBERS command:
/// Retrieve all members of the set stored at `key`.
///
/// # Returns
///
/// All members, in no particular order. Empty if the key does not exist.
pub fn smembers(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<Vec<ByteBuffer>> {
    match ks.get_value(db, key)? {
        None => Ok(Vec::new()),
        Some(v) => Ok(v.as_set()?.iter().map(ByteBuffer::from).collect()),
    }
}

/// Execute the SISMEMBER command:
/// Check if the specified `member` exists in the set stored at `key`.
pub fn sismember(ks: &MemoryKeyspace, db: usize, key: &[u8], member: &[u8]) -> Result<bool> {
    match ks.get_value(db, key)? {
        None => Ok(false),
        Some(v) => Ok(v.as_set()?.contains(member)),
    }
}

/// Execute the SCARD command.
pub fn scard(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<usize> {
    match ks.get_value(db, key)? {
        None => Ok(0),
        Some(v) => Ok(v.as_set()?.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeLimits;

    const LIMITS: EncodingLimits = EncodingLimits::new(3, usize::MAX);

    /// Integer members stay in the intset until the entry limit is crossed.
    #[test]
    fn test_intset_until_limit() {
        let mut s = SetValue::new_for(b"1");
        assert!(s.add(b"1", LIMITS));
        assert!(s.add(b"2", LIMITS));
        assert!(!s.add(b"2", LIMITS));
        assert!(s.add(b"3", LIMITS));
        assert_eq!(s.encoding(), Encoding::Intset);

        assert!(s.add(b"4", LIMITS));
        assert_eq!(s.encoding(), Encoding::HashTable);
        assert_eq!(s.len(), 4);
        assert!(s.contains(b"4"));
    }

    /// A non-canonical number is a plain string member.
    #[test]
    fn test_non_integer_member_converts() {
        let mut s = SetValue::new_for(b"10");
        s.add(b"10", LIMITS);
        assert!(!s.contains(b"010"));
        assert!(s.add(b"010", LIMITS));
        assert_eq!(s.encoding(), Encoding::HashTable);
        assert!(s.contains(b"10"));
        assert!(s.contains(b"010"));

        assert!(s.remove(b"010"));
        assert_eq!(s.encoding(), Encoding::HashTable, "conversion is one-way");
    }

    #[test]
    fn test_first_member_selects_encoding() {
        assert_eq!(SetValue::new_for(b"abc").encoding(), Encoding::HashTable);
        assert_eq!(SetValue::new_for(b"-5").encoding(), Encoding::Intset);
    }

    /// Basic tests for Set commands: SADD, SREM, SMEMBERS, SISMEMBER, SCARD
    #[test]
    fn test_set_basic() -> anyhow::Result<()> {
        let mut ks = MemoryKeyspace::new(1, TypeLimits::default());

        assert!(sadd(&mut ks, 0, b"S", b"a")?);
        assert!(!sadd(&mut ks, 0, b"S", b"a")?);
        assert!(sadd(&mut ks, 0, b"S", b"b")?);

        assert!(sismember(&ks, 0, b"S", b"a")?);
        assert!(!sismember(&ks, 0, b"S", b"x")?);
        assert_eq!(scard(&ks, 0, b"S")?, 2);

        let mut ms = smembers(&ks, 0, b"S")?;
        ms.sort();
        assert_eq!(ms, vec![ByteBuffer::from("a"), ByteBuffer::from("b")]);

        assert!(srem(&mut ks, 0, b"S", b"a")?);
        assert!(!srem(&mut ks, 0, b"S", b"a")?);
        assert!(srem(&mut ks, 0, b"S", b"b")?);
        assert!(ks.get_value(0, b"S")?.is_none());
        Ok(())
    }
}
