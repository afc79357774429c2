// src/types/hash.rs

//! 支持 Hash 类型：紧凑编码为 ziplist（field, value 交替存放），
//! 通用编码为 `HashMap<ByteBuffer, ByteBuffer>`

use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::hash_map;

use tracing::debug;

use crate::config::EncodingLimits;
use crate::engine::MemoryKeyspace;
use crate::error::{KvError, Result};
use crate::object::Value;
use crate::types::string::ByteBuffer;
use crate::types::ziplist::{Ziplist, ZiplistIter};
use crate::types::{Encoding, UpdateKind};

#[derive(Debug, Clone)]
enum HashRepr {
    Ziplist(Ziplist),
    Table(HashMap<ByteBuffer, ByteBuffer>),
}

#[derive(Debug, Clone)]
pub struct HashValue {
    repr: HashRepr,
}

impl Default for HashValue {
    fn default() -> Self {
        Self::new()
    }
}

impl HashValue {
    /// 新建的 hash 总是从紧凑编码开始
    pub fn new() -> Self {
        HashValue { repr: HashRepr::Ziplist(Ziplist::new()) }
    }

    /// 预分配好容量的通用编码
    pub fn with_capacity(capacity: usize) -> Self {
        HashValue { repr: HashRepr::Table(HashMap::with_capacity(capacity)) }
    }

    /// 用快照中的 ziplist 构造；元素个数必须是偶数且 field 不重复
    pub fn from_ziplist(zl: Ziplist) -> Result<Self> {
        if zl.len() % 2 != 0 {
            return Err(KvError::corrupt("hash ziplist has an odd number of entries"));
        }
        {
            let mut seen = std::collections::HashSet::with_capacity(zl.len() / 2);
            for field in zl.iter().step_by(2) {
                if !seen.insert(field.to_bytes()) {
                    return Err(KvError::corrupt("duplicate field in hash ziplist"));
                }
            }
        }
        Ok(HashValue { repr: HashRepr::Ziplist(zl) })
    }

    pub fn encoding(&self) -> Encoding {
        match self.repr {
            HashRepr::Ziplist(_) => Encoding::Ziplist,
            HashRepr::Table(_) => Encoding::HashTable,
        }
    }

    /// 紧凑编码时返回底层 ziplist
    pub fn ziplist(&self) -> Option<&Ziplist> {
        match &self.repr {
            HashRepr::Ziplist(zl) => Some(zl),
            HashRepr::Table(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            HashRepr::Ziplist(zl) => zl.len() / 2,
            HashRepr::Table(map) => map.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, field: &[u8]) -> Option<Cow<'_, [u8]>> {
        match &self.repr {
            HashRepr::Ziplist(zl) => {
                let idx = zl.find(field, 2)?;
                zl.get(idx + 1).map(|v| v.to_bytes())
            }
            HashRepr::Table(map) => map.get(field).map(|v| Cow::Borrowed(v.as_bytes())),
        }
    }

    pub fn contains(&self, field: &[u8]) -> bool {
        match &self.repr {
            HashRepr::Ziplist(zl) => zl.find(field, 2).is_some(),
            HashRepr::Table(map) => map.contains_key(field),
        }
    }

    /// 写入 field；field 或 value 超长、或个数超限时转为通用编码
    pub fn set(&mut self, field: &[u8], value: &[u8], limits: EncodingLimits) -> UpdateKind {
        if matches!(self.repr, HashRepr::Ziplist(_))
            && !(limits.value_fits(field.len()) && limits.value_fits(value.len()))
        {
            self.convert_to_general();
        }

        match &mut self.repr {
            HashRepr::Ziplist(zl) => {
                let kind = match zl.find(field, 2) {
                    Some(idx) => {
                        zl.replace(idx + 1, value);
                        UpdateKind::Updated
                    }
                    None => {
                        zl.splice(zl.len(), 0, &[field, value]);
                        UpdateKind::Inserted
                    }
                };
                if zl.len() / 2 > limits.max_entries {
                    self.convert_to_general();
                }
                kind
            }
            HashRepr::Table(map) => {
                match map.insert(ByteBuffer::from_bytes(field), ByteBuffer::from_bytes(value)) {
                    Some(_) => UpdateKind::Updated,
                    None => UpdateKind::Inserted,
                }
            }
        }
    }

    pub fn delete(&mut self, field: &[u8]) -> bool {
        match &mut self.repr {
            HashRepr::Ziplist(zl) => match zl.find(field, 2) {
                Some(idx) => {
                    zl.delete_range(idx, 2);
                    true
                }
                None => false,
            },
            HashRepr::Table(map) => map.remove(field).is_some(),
        }
    }

    pub fn iter(&self) -> HashIter<'_> {
        match &self.repr {
            HashRepr::Ziplist(zl) => HashIter::Ziplist(zl.iter()),
            HashRepr::Table(map) => HashIter::Table(map.iter()),
        }
    }

    /// 转为通用编码；已是通用编码时什么都不做
    pub fn convert_to_general(&mut self) {
        let HashRepr::Ziplist(zl) = &self.repr else {
            return;
        };
        let mut map = HashMap::with_capacity(zl.len() / 2);
        let mut it = zl.iter();
        while let (Some(field), Some(value)) = (it.next(), it.next()) {
            map.insert(ByteBuffer::from(field.to_bytes()), ByteBuffer::from(value.to_bytes()));
        }
        debug!(entries = map.len(), "hash converted from ziplist to hashtable");
        self.repr = HashRepr::Table(map);
    }

    /// 按当前阈值复查紧凑编码（用于加载快照后）
    pub fn enforce_limits(&mut self, limits: EncodingLimits) {
        if let HashRepr::Ziplist(zl) = &self.repr {
            if zl.len() / 2 > limits.max_entries || !limits.value_fits(zl.max_entry_len()) {
                self.convert_to_general();
            }
        }
    }
}

/// 按 (field, value) 遍历
pub enum HashIter<'a> {
    Ziplist(ZiplistIter<'a>),
    Table(hash_map::Iter<'a, ByteBuffer, ByteBuffer>),
}

impl<'a> Iterator for HashIter<'a> {
    type Item = (Cow<'a, [u8]>, Cow<'a, [u8]>);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            HashIter::Ziplist(it) => {
                let field = it.next()?;
                let value = it.next()?;
                Some((field.to_bytes(), value.to_bytes()))
            }
            HashIter::Table(it) => {
                let (k, v) = it.next()?;
                Some((Cow::Borrowed(k.as_bytes()), Cow::Borrowed(v.as_bytes())))
            }
        }
    }
}

/// HSET key field value
/// 返回 `Inserted` 表示新建了 field，`Updated` 表示覆盖了旧值
pub fn hset(ks: &mut MemoryKeyspace, db: usize, key: &[u8], field: &[u8], value: &[u8]) -> Result<UpdateKind> {
    let limits = ks.limits().hash;
    let hash = ks.get_or_create(db, key, || Value::Hash(HashValue::new()))?.as_hash_mut()?;
    let kind = hash.set(field, value, limits);
    ks.mark_dirty(1);
    Ok(kind)
}

/// HGET key field
pub fn hget(ks: &MemoryKeyspace, db: usize, key: &[u8], field: &[u8]) -> Result<Option<ByteBuffer>> {
    match ks.get_value(db, key)? {
        None => Ok(None),
        Some(v) => Ok(v.as_hash()?.get(field).map(ByteBuffer::from)),
    }
}

/// HDEL key field，hash 变空时删除 key
pub fn hdel(ks: &mut MemoryKeyspace, db: usize, key: &[u8], field: &[u8]) -> Result<bool> {
    let Some(value) = ks.get_value_mut(db, key)? else {
        return Ok(false);
    };
    let hash = value.as_hash_mut()?;
    let deleted = hash.delete(field);
    let empty = hash.is_empty();
    if empty {
        ks.remove(db, key)?;
    }
    if deleted {
        ks.mark_dirty(1);
    }
    Ok(deleted)
}

/// HLEN key
pub fn hlen(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<usize> {
    match ks.get_value(db, key)? {
        None => Ok(0),
        Some(v) => Ok(v.as_hash()?.len()),
    }
}

/// HGETALL key → field1, value1, field2, value2 …
pub fn hgetall(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<Vec<ByteBuffer>> {
    match ks.get_value(db, key)? {
        None => Ok(Vec::new()),
        Some(v) => {
            let hash = v.as_hash()?;
            let mut out = Vec::with_capacity(hash.len() * 2);
            for (field, value) in hash.iter() {
                out.push(ByteBuffer::from(field));
                out.push(ByteBuffer::from(value));
            }
            Ok(out)
        }
    }
}
