// src/types/zset.rs

//! 有序集合：
//! - 紧凑编码：ziplist 中 (member, score) 交替存放，按 (score, member) 升序
//! - 通用编码：member → score 的 `HashMap` + 跳表
//!
//! 分数在 ziplist 中以 ASCII 形式保存（整数值直接写整数）。

use std::borrow::Cow;
use std::collections::HashMap;

use tracing::debug;

use crate::config::EncodingLimits;
use crate::engine::MemoryKeyspace;
use crate::error::{KvError, Result};
use crate::object::Value;
use crate::types::skiplist::{SkipIter, SkipList};
use crate::types::string::{ByteBuffer, format_double, parse_double};
use crate::types::ziplist::{Ziplist, ZiplistIter, ZlEntry};
use crate::types::{Encoding, UpdateKind};

#[derive(Debug, Clone)]
enum ZSetRepr {
    Ziplist(Ziplist),
    SkipList { dict: HashMap<ByteBuffer, f64>, list: SkipList },
}

#[derive(Debug, Clone)]
pub struct ZSetValue {
    repr: ZSetRepr,
}

fn entry_score(e: ZlEntry<'_>) -> Option<f64> {
    match e {
        ZlEntry::Int(v) => Some(v as f64),
        ZlEntry::Bytes(b) => parse_double(b),
    }
}

/// 在 ziplist 中查找 member，返回 (下标, 分数)
fn zl_find(zl: &Ziplist, member: &[u8]) -> Option<(usize, f64)> {
    let mut it = zl.iter();
    let mut idx = 0;
    while let (Some(m), Some(s)) = (it.next(), it.next()) {
        if m.eq_bytes(member) {
            return Some((idx, entry_score(s).unwrap_or(0.0)));
        }
        idx += 2;
    }
    None
}

/// 按 (score, member) 顺序插入
fn zl_insert(zl: &mut Ziplist, member: &[u8], score: f64) {
    let mut it = zl.iter();
    let mut idx = 0;
    while let (Some(m), Some(s)) = (it.next(), it.next()) {
        let s = entry_score(s).unwrap_or(0.0);
        if s > score || (s == score && m.to_bytes().as_ref() > member) {
            break;
        }
        idx += 2;
    }
    let score = format_double(score);
    zl.splice(idx, 0, &[member, score.as_bytes()]);
}

/// 把可能为负的闭区间下标规范化为 `[start, end)`
fn normalize_range(start: isize, stop: isize, len: usize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop };
    if start > stop || start >= len {
        return None;
    }
    let stop = stop.min(len - 1);
    Some((start as usize, stop as usize + 1))
}

impl Default for ZSetValue {
    fn default() -> Self {
        Self::new()
    }
}

impl ZSetValue {
    pub fn new() -> Self {
        ZSetValue { repr: ZSetRepr::Ziplist(Ziplist::new()) }
    }

    /// 为第一个 member 选择编码
    pub fn new_for(first_member: &[u8], limits: EncodingLimits) -> Self {
        if limits.max_entries == 0 || !limits.value_fits(first_member.len()) {
            Self::with_capacity(0)
        } else {
            Self::new()
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        ZSetValue {
            repr: ZSetRepr::SkipList { dict: HashMap::with_capacity(capacity), list: SkipList::new() },
        }
    }

    /// 用快照中的 ziplist 构造：个数为偶数、分数可解析、member 不重复
    pub fn from_ziplist(zl: Ziplist) -> Result<Self> {
        if zl.len() % 2 != 0 {
            return Err(KvError::corrupt("zset ziplist has an odd number of entries"));
        }
        let mut seen = std::collections::HashSet::with_capacity(zl.len() / 2);
        let mut it = zl.iter();
        while let (Some(m), Some(s)) = (it.next(), it.next()) {
            match entry_score(s) {
                None => return Err(KvError::corrupt("unparsable score in zset ziplist")),
                Some(score) if score.is_nan() => return Err(KvError::corrupt("NaN score in zset ziplist")),
                Some(_) => {}
            }
            if !seen.insert(m.to_bytes()) {
                return Err(KvError::corrupt("duplicate member in zset ziplist"));
            }
        }
        drop(seen);
        Ok(ZSetValue { repr: ZSetRepr::Ziplist(zl) })
    }

    pub fn encoding(&self) -> Encoding {
        match self.repr {
            ZSetRepr::Ziplist(_) => Encoding::Ziplist,
            ZSetRepr::SkipList { .. } => Encoding::SkipList,
        }
    }

    pub fn ziplist(&self) -> Option<&Ziplist> {
        match &self.repr {
            ZSetRepr::Ziplist(zl) => Some(zl),
            ZSetRepr::SkipList { .. } => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            ZSetRepr::Ziplist(zl) => zl.len() / 2,
            ZSetRepr::SkipList { dict, .. } => dict.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn score(&self, member: &[u8]) -> Option<f64> {
        match &self.repr {
            ZSetRepr::Ziplist(zl) => zl_find(zl, member).map(|(_, s)| s),
            ZSetRepr::SkipList { dict, .. } => dict.get(member).copied(),
        }
    }

    pub fn contains(&self, member: &[u8]) -> bool {
        self.score(member).is_some()
    }

    /// 插入或更新分数
    pub fn insert(&mut self, member: &[u8], score: f64, limits: EncodingLimits) -> UpdateKind {
        match &mut self.repr {
            ZSetRepr::Ziplist(zl) => {
                if let Some((idx, current)) = zl_find(zl, member) {
                    if current != score {
                        zl.delete_range(idx, 2);
                        zl_insert(zl, member, score);
                    }
                    return UpdateKind::Updated;
                }
                zl_insert(zl, member, score);
                if zl.len() / 2 > limits.max_entries || !limits.value_fits(member.len()) {
                    self.convert_to_general();
                }
                UpdateKind::Inserted
            }
            ZSetRepr::SkipList { dict, list } => match dict.get_mut(member) {
                Some(current) => {
                    if *current != score {
                        list.update_score(*current, member, score);
                        *current = score;
                    }
                    UpdateKind::Updated
                }
                None => {
                    list.insert(score, member);
                    dict.insert(ByteBuffer::from_bytes(member), score);
                    UpdateKind::Inserted
                }
            },
        }
    }

    /// 分数加上 `delta`，member 不存在时从 0 开始；结果为 NaN 时报错且不修改
    pub fn incr_by(&mut self, member: &[u8], delta: f64, limits: EncodingLimits) -> Result<f64> {
        let score = self.score(member).unwrap_or(0.0) + delta;
        if score.is_nan() {
            return Err(KvError::Command("resulting score is not a number (NaN)".into()));
        }
        self.insert(member, score, limits);
        Ok(score)
    }

    pub fn delete(&mut self, member: &[u8]) -> bool {
        match &mut self.repr {
            ZSetRepr::Ziplist(zl) => match zl_find(zl, member) {
                Some((idx, _)) => {
                    zl.delete_range(idx, 2);
                    true
                }
                None => false,
            },
            ZSetRepr::SkipList { dict, list } => match dict.remove(member) {
                Some(score) => {
                    list.delete(score, member);
                    true
                }
                None => false,
            },
        }
    }

    /// 从 0 开始的排名；`reverse` 时按分数从高到低
    pub fn rank(&self, member: &[u8], reverse: bool) -> Option<usize> {
        let len = self.len();
        let rank = match &self.repr {
            ZSetRepr::Ziplist(zl) => zl_find(zl, member).map(|(idx, _)| idx / 2)?,
            ZSetRepr::SkipList { dict, list } => {
                let score = *dict.get(member)?;
                list.rank(score, member)? - 1
            }
        };
        Some(if reverse { len - 1 - rank } else { rank })
    }

    /// 按排名取闭区间 `[start, stop]`，负数下标从尾部计数
    pub fn range_by_rank(&self, start: isize, stop: isize, reverse: bool) -> Vec<(ByteBuffer, f64)> {
        let len = self.len();
        let Some((start, end)) = normalize_range(start, stop, len) else {
            return Vec::new();
        };
        let count = end - start;
        match &self.repr {
            ZSetRepr::SkipList { list, .. } => {
                let it = if reverse { list.iter_rev_from_rank(len - 1 - start) } else { list.iter_from_rank(start) };
                it.take(count).map(|(m, s)| (ByteBuffer::from_bytes(m), s)).collect()
            }
            ZSetRepr::Ziplist(_) => {
                let all: Vec<(Cow<'_, [u8]>, f64)> = self.iter().collect();
                let pick = |(m, s): &(Cow<'_, [u8]>, f64)| (ByteBuffer::from_bytes(m), *s);
                if reverse {
                    all.iter().rev().skip(start).take(count).map(pick).collect()
                } else {
                    all.iter().skip(start).take(count).map(pick).collect()
                }
            }
        }
    }

    /// 分数在闭区间 `[min, max]` 内的元素，按分数升序
    pub fn range_by_score(&self, min: f64, max: f64) -> Vec<(ByteBuffer, f64)> {
        match &self.repr {
            ZSetRepr::SkipList { list, .. } => list
                .iter_from_score(min, max)
                .take_while(|(_, s)| *s <= max)
                .map(|(m, s)| (ByteBuffer::from_bytes(m), s))
                .collect(),
            ZSetRepr::Ziplist(_) => self
                .iter()
                .skip_while(|(_, s)| *s < min)
                .take_while(|(_, s)| *s <= max)
                .map(|(m, s)| (ByteBuffer::from(m), s))
                .collect(),
        }
    }

    pub fn count_in_score_range(&self, min: f64, max: f64) -> usize {
        match &self.repr {
            ZSetRepr::SkipList { list, .. } => list.count_in_range(min, max),
            ZSetRepr::Ziplist(_) => self.iter().filter(|(_, s)| *s >= min && *s <= max).count(),
        }
    }

    /// 按 (score, member) 升序遍历
    pub fn iter(&self) -> ZSetIter<'_> {
        match &self.repr {
            ZSetRepr::Ziplist(zl) => ZSetIter::Ziplist(zl.iter()),
            ZSetRepr::SkipList { list, .. } => ZSetIter::SkipList(list.iter()),
        }
    }

    pub fn convert_to_general(&mut self) {
        let ZSetRepr::Ziplist(zl) = &self.repr else {
            return;
        };
        let mut dict = HashMap::with_capacity(zl.len() / 2);
        let mut list = SkipList::new();
        let mut it = zl.iter();
        while let (Some(m), Some(s)) = (it.next(), it.next()) {
            let member = m.to_bytes();
            let score = entry_score(s).unwrap_or(0.0);
            list.insert(score, &member);
            dict.insert(ByteBuffer::from(member), score);
        }
        debug!(members = dict.len(), "zset converted from ziplist to skiplist");
        self.repr = ZSetRepr::SkipList { dict, list };
    }

    /// 按当前阈值复查紧凑编码
    pub fn enforce_limits(&mut self, limits: EncodingLimits) {
        if let ZSetRepr::Ziplist(zl) = &self.repr {
            let longest_member = zl.iter().step_by(2).map(|m| m.byte_len()).max().unwrap_or(0);
            if zl.len() / 2 > limits.max_entries || !limits.value_fits(longest_member) {
                self.convert_to_general();
            }
        }
    }
}

/// 按 (member, score) 遍历
pub enum ZSetIter<'a> {
    Ziplist(ZiplistIter<'a>),
    SkipList(SkipIter<'a>),
}

impl<'a> Iterator for ZSetIter<'a> {
    type Item = (Cow<'a, [u8]>, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            ZSetIter::Ziplist(it) => {
                let member = it.next()?;
                let score = it.next()?;
                Some((member.to_bytes(), entry_score(score).unwrap_or(0.0)))
            }
            ZSetIter::SkipList(it) => it.next().map(|(m, s)| (Cow::Borrowed(m), s)),
        }
    }
}

/// ZADD key score member
pub fn zadd(ks: &mut MemoryKeyspace, db: usize, key: &[u8], score: f64, member: &[u8]) -> Result<UpdateKind> {
    if score.is_nan() {
        return Err(KvError::Command("value is not a valid float".into()));
    }
    let limits = ks.limits().zset;
    let zset = ks
        .get_or_create(db, key, || Value::ZSet(ZSetValue::new_for(member, limits)))?
        .as_zset_mut()?;
    let kind = zset.insert(member, score, limits);
    ks.mark_dirty(1);
    Ok(kind)
}

/// ZINCRBY key delta member
pub fn zincrby(ks: &mut MemoryKeyspace, db: usize, key: &[u8], delta: f64, member: &[u8]) -> Result<f64> {
    let limits = ks.limits().zset;
    let zset = ks
        .get_or_create(db, key, || Value::ZSet(ZSetValue::new_for(member, limits)))?
        .as_zset_mut()?;
    let score = zset.incr_by(member, delta, limits)?;
    ks.mark_dirty(1);
    Ok(score)
}

/// ZSCORE key member
pub fn zscore(ks: &MemoryKeyspace, db: usize, key: &[u8], member: &[u8]) -> Result<Option<f64>> {
    match ks.get_value(db, key)? {
        None => Ok(None),
        Some(v) => Ok(v.as_zset()?.score(member)),
    }
}

/// ZREM key member，集合变空时删除 key
pub fn zrem(ks: &mut MemoryKeyspace, db: usize, key: &[u8], member: &[u8]) -> Result<bool> {
    let Some(value) = ks.get_value_mut(db, key)? else {
        return Ok(false);
    };
    let zset = value.as_zset_mut()?;
    let removed = zset.delete(member);
    if zset.is_empty() {
        ks.remove(db, key)?;
    }
    if removed {
        ks.mark_dirty(1);
    }
    Ok(removed)
}

/// ZCARD key
pub fn zcard(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<usize> {
    match ks.get_value(db, key)? {
        None => Ok(0),
        Some(v) => Ok(v.as_zset()?.len()),
    }
}

/// ZRANK / ZREVRANK key member
pub fn zrank(ks: &MemoryKeyspace, db: usize, key: &[u8], member: &[u8], reverse: bool) -> Result<Option<usize>> {
    match ks.get_value(db, key)? {
        None => Ok(None),
        Some(v) => Ok(v.as_zset()?.rank(member, reverse)),
    }
}

/// ZRANGE key start stop
pub fn zrange(ks: &MemoryKeyspace, db: usize, key: &[u8], start: isize, stop: isize) -> Result<Vec<(ByteBuffer, f64)>> {
    match ks.get_value(db, key)? {
        None => Ok(Vec::new()),
        Some(v) => Ok(v.as_zset()?.range_by_rank(start, stop, false)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeLimits;

    const LIMITS: EncodingLimits = EncodingLimits::new(4, 8);

    fn members(z: &ZSetValue) -> Vec<Vec<u8>> {
        z.iter().map(|(m, _)| m.into_owned()).collect()
    }

    fn build(general: bool) -> ZSetValue {
        let mut z = ZSetValue::new();
        for (m, s) in [("c", 3.0), ("a", 1.0), ("b", 2.0), ("bb", 2.0)] {
            z.insert(m.as_bytes(), s, LIMITS);
        }
        if general {
            z.convert_to_general();
        }
        z
    }

    #[test]
    fn test_ordering_both_encodings() {
        for general in [false, true] {
            let z = build(general);
            assert_eq!(members(&z), vec![b"a".to_vec(), b"b".to_vec(), b"bb".to_vec(), b"c".to_vec()]);
            assert_eq!(z.rank(b"bb", false), Some(2));
            assert_eq!(z.rank(b"bb", true), Some(1));
            assert_eq!(z.rank(b"zz", false), None);
            assert_eq!(z.score(b"c"), Some(3.0));
        }
    }

    #[test]
    fn test_update_moves_member() {
        for general in [false, true] {
            let mut z = build(general);
            assert_eq!(z.insert(b"a", 10.0, LIMITS), UpdateKind::Updated);
            assert_eq!(z.rank(b"a", false), Some(3));
            assert_eq!(z.incr_by(b"b", 0.5, LIMITS).unwrap(), 2.5);
            assert_eq!(z.rank(b"b", false), Some(1));
            assert!(z.delete(b"bb"));
            assert!(!z.delete(b"bb"));
            assert_eq!(z.len(), 3);
        }
    }

    #[test]
    fn test_ranges_both_encodings() {
        for general in [false, true] {
            let z = build(general);
            let names = |v: Vec<(ByteBuffer, f64)>| v.into_iter().map(|(m, _)| m.into_vec()).collect::<Vec<_>>();

            assert_eq!(names(z.range_by_rank(0, -1, false)).len(), 4);
            assert_eq!(names(z.range_by_rank(1, 2, false)), vec![b"b".to_vec(), b"bb".to_vec()]);
            assert_eq!(names(z.range_by_rank(0, 1, true)), vec![b"c".to_vec(), b"bb".to_vec()]);
            assert_eq!(names(z.range_by_rank(-2, 100, false)), vec![b"bb".to_vec(), b"c".to_vec()]);
            assert!(z.range_by_rank(3, 1, false).is_empty());
            assert!(z.range_by_rank(10, 20, false).is_empty());

            assert_eq!(names(z.range_by_score(1.5, 3.0)), vec![b"b".to_vec(), b"bb".to_vec(), b"c".to_vec()]);
            assert_eq!(z.count_in_score_range(2.0, 2.0), 2);
            assert_eq!(z.count_in_score_range(5.0, 9.0), 0);
        }
    }

    #[test]
    fn test_conversion_triggers() {
        let mut z = build(false);
        assert_eq!(z.encoding(), Encoding::Ziplist);
        z.insert(b"e", 5.0, LIMITS);
        assert_eq!(z.encoding(), Encoding::SkipList, "超过元素个数");
        assert_eq!(z.rank(b"e", false), Some(4));

        let mut z = ZSetValue::new();
        z.insert(b"a-very-long-member", 1.0, LIMITS);
        assert_eq!(z.encoding(), Encoding::SkipList, "member 超长");
    }

    #[test]
    fn test_ziplist_scores_are_ascii() {
        let mut z = ZSetValue::new();
        z.insert(b"m", 1.5, LIMITS);
        z.insert(b"n", 2.0, LIMITS);
        let zl = z.ziplist().unwrap();
        assert_eq!(zl.get(1), Some(ZlEntry::Bytes(b"1.5")));
        assert_eq!(zl.get(3), Some(ZlEntry::Int(2)));
    }

    #[test]
    fn test_from_ziplist_rejects_nan_score() {
        let mut zl = Ziplist::new();
        for v in [&b"a"[..], b"1", b"n", b"nan"] {
            zl.push_back(v);
        }
        assert!(matches!(ZSetValue::from_ziplist(zl), Err(KvError::Corrupt(_))));

        let mut zl = Ziplist::new();
        for v in [&b"a"[..], b"1", b"b", b"inf"] {
            zl.push_back(v);
        }
        assert_eq!(ZSetValue::from_ziplist(zl).map(|z| z.len()).ok(), Some(2));
    }

    #[test]
    fn test_incr_nan_rejected() {
        let mut z = ZSetValue::new();
        z.insert(b"m", f64::INFINITY, LIMITS);
        assert!(z.incr_by(b"m", f64::NEG_INFINITY, LIMITS).is_err());
        assert_eq!(z.score(b"m"), Some(f64::INFINITY));
    }

    #[test]
    fn test_commands() -> anyhow::Result<()> {
        let mut ks = MemoryKeyspace::new(1, TypeLimits::default());
        assert_eq!(zadd(&mut ks, 0, b"z", 1.0, b"one")?, UpdateKind::Inserted);
        assert_eq!(zadd(&mut ks, 0, b"z", 2.0, b"two")?, UpdateKind::Inserted);
        assert_eq!(zincrby(&mut ks, 0, b"z", 5.0, b"one")?, 6.0);
        assert_eq!(zscore(&ks, 0, b"z", b"one")?, Some(6.0));
        assert_eq!(zrank(&ks, 0, b"z", b"one", false)?, Some(1));
        assert_eq!(zcard(&ks, 0, b"z")?, 2);
        assert_eq!(zrange(&ks, 0, b"z", 0, 0)?[0].0, ByteBuffer::from("two"));
        assert!(zadd(&mut ks, 0, b"z", f64::NAN, b"x").is_err());

        assert!(zrem(&mut ks, 0, b"z", b"one")?);
        assert!(zrem(&mut ks, 0, b"z", b"two")?);
        assert!(ks.get_value(0, b"z")?.is_none());
        Ok(())
    }
}
