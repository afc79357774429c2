// src/engine/mod.rs

//! # 引擎模块
//!
//! `engine` 模块保存所有数据库的 key → 值对象映射以及过期时间：
//! - [`Keyspace`] 是快照读写依赖的最小接口
//! - [`MemoryKeyspace`] 是基于 `HashMap` 的内存实现，另外提供命令层使用的便捷方法
//!   （惰性过期、按需创建、修改计数）
//!
//! 整个 keyspace 可以 `clone`，后台快照就是在克隆出的副本上进行的。

pub mod kv;
pub use kv::{Entry, Keyspace};

use std::collections::HashMap;

use crate::config::{Config, TypeLimits};
use crate::error::{KvError, Result};
use crate::expire::now_ms;
use crate::object::Value;
use crate::types::string::ByteBuffer;

/// 单个数据库
#[derive(Debug, Clone, Default)]
pub struct Database {
    dict: HashMap<ByteBuffer, Value>,
    expires: HashMap<ByteBuffer, i64>,
}

impl Database {
    pub fn len(&self) -> usize {
        self.dict.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dict.is_empty()
    }

    /// 带过期时间的 key 个数
    pub fn expires_len(&self) -> usize {
        self.expires.len()
    }
}

#[derive(Debug, Clone)]
pub struct MemoryKeyspace {
    dbs: Vec<Database>,
    limits: TypeLimits,
    /// 上次成功保存之后的修改次数
    dirty: u64,
}

impl MemoryKeyspace {
    pub fn new(db_count: usize, limits: TypeLimits) -> Self {
        MemoryKeyspace { dbs: vec![Database::default(); db_count.max(1)], limits, dirty: 0 }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.databases, cfg.type_limits())
    }

    pub fn limits(&self) -> TypeLimits {
        self.limits
    }

    /// 数据库不存在时返回 None
    pub fn database(&self, db: usize) -> Option<&Database> {
        self.dbs.get(db)
    }

    fn db(&self, db: usize) -> Result<&Database> {
        self.dbs.get(db).ok_or_else(|| out_of_range(db, self.dbs.len()))
    }

    fn db_mut(&mut self, db: usize) -> Result<&mut Database> {
        let max = self.dbs.len();
        self.dbs.get_mut(db).ok_or_else(|| out_of_range(db, max))
    }

    pub fn total_keys(&self) -> usize {
        self.dbs.iter().map(Database::len).sum()
    }

    pub fn dirty(&self) -> u64 {
        self.dirty
    }

    pub fn mark_dirty(&mut self, n: u64) {
        self.dirty += n;
    }

    /// 保存成功后扣除保存开始时已有的修改数
    pub fn clear_dirty(&mut self, saved: u64) {
        self.dirty = self.dirty.saturating_sub(saved);
    }

    fn is_expired(&self, db: usize, key: &[u8]) -> bool {
        self.dbs
            .get(db)
            .and_then(|d| d.expires.get(key))
            .is_some_and(|&when| when < now_ms())
    }

    /// 已过期则删除，返回是否删除
    pub fn expire_if_needed(&mut self, db: usize, key: &[u8]) -> bool {
        if self.is_expired(db, key) {
            self.delete(db, key);
            true
        } else {
            false
        }
    }

    /// 读取值，已过期的 key 视为不存在
    pub fn get_value(&self, db: usize, key: &[u8]) -> Result<Option<&Value>> {
        let d = self.db(db)?;
        if self.is_expired(db, key) {
            return Ok(None);
        }
        Ok(d.dict.get(key))
    }

    /// 可写地读取值，顺带清理已过期的 key
    pub fn get_value_mut(&mut self, db: usize, key: &[u8]) -> Result<Option<&mut Value>> {
        self.expire_if_needed(db, key);
        Ok(self.db_mut(db)?.dict.get_mut(key))
    }

    /// 取得 key 对应的值，不存在时用 `make` 创建
    pub fn get_or_create(&mut self, db: usize, key: &[u8], make: impl FnOnce() -> Value) -> Result<&mut Value> {
        self.expire_if_needed(db, key);
        Ok(self.db_mut(db)?.dict.entry(ByteBuffer::from_bytes(key)).or_insert_with(make))
    }

    /// 覆盖写入，并清除原有的过期时间（SET 语义）
    pub fn overwrite(&mut self, db: usize, key: &[u8], value: Value) -> Result<()> {
        let d = self.db_mut(db)?;
        d.expires.remove(key);
        d.dict.insert(ByteBuffer::from_bytes(key), value);
        self.dirty += 1;
        Ok(())
    }

    /// 覆盖写入，保留过期时间
    pub fn overwrite_keep_ttl(&mut self, db: usize, key: &[u8], value: Value) -> Result<()> {
        self.expire_if_needed(db, key);
        self.db_mut(db)?.dict.insert(ByteBuffer::from_bytes(key), value);
        self.dirty += 1;
        Ok(())
    }

    /// 删除 key；已过期的 key 不计入
    pub fn remove(&mut self, db: usize, key: &[u8]) -> Result<bool> {
        self.db(db)?;
        if self.expire_if_needed(db, key) {
            return Ok(false);
        }
        let removed = self.delete(db, key);
        if removed {
            self.dirty += 1;
        }
        Ok(removed)
    }

    /// 清空所有数据库
    pub fn flush_all(&mut self) {
        let removed: usize = self.total_keys();
        for d in &mut self.dbs {
            *d = Database::default();
        }
        self.dirty += removed as u64;
    }
}

fn out_of_range(db: usize, max: usize) -> KvError {
    KvError::DbIndexOutOfRange { index: u32::try_from(db).unwrap_or(u32::MAX), max }
}

/// 超出范围的数据库按空库处理：读取不到任何 key，写入返回 false
impl Keyspace for MemoryKeyspace {
    fn db_count(&self) -> usize {
        self.dbs.len()
    }

    fn db_len(&self, db: usize) -> usize {
        self.dbs.get(db).map_or(0, Database::len)
    }

    fn add(&mut self, db: usize, key: ByteBuffer, value: Value) -> bool {
        self.dbs.get_mut(db).is_some_and(|d| d.dict.insert(key, value).is_none())
    }

    fn lookup(&self, db: usize, key: &[u8]) -> Option<&Value> {
        self.dbs.get(db)?.dict.get(key)
    }

    fn lookup_mut(&mut self, db: usize, key: &[u8]) -> Option<&mut Value> {
        self.dbs.get_mut(db)?.dict.get_mut(key)
    }

    fn delete(&mut self, db: usize, key: &[u8]) -> bool {
        let Some(d) = self.dbs.get_mut(db) else {
            return false;
        };
        d.expires.remove(key);
        d.dict.remove(key).is_some()
    }

    fn get_expire(&self, db: usize, key: &[u8]) -> Option<i64> {
        self.dbs.get(db)?.expires.get(key).copied()
    }

    fn set_expire(&mut self, db: usize, key: &[u8], when_ms: i64) -> bool {
        let Some(d) = self.dbs.get_mut(db) else {
            return false;
        };
        match d.dict.get_key_value(key) {
            Some((k, _)) => {
                d.expires.insert(k.clone(), when_ms);
                true
            }
            None => false,
        }
    }

    fn remove_expire(&mut self, db: usize, key: &[u8]) -> bool {
        self.dbs.get_mut(db).is_some_and(|d| d.expires.remove(key).is_some())
    }

    fn entries(&self, db: usize) -> Box<dyn Iterator<Item = Entry<'_>> + '_> {
        match self.dbs.get(db) {
            Some(d) => Box::new(d.dict.iter().map(move |(k, v)| (k.as_bytes(), v, d.expires.get(k).copied()))),
            None => Box::new(std::iter::empty()),
        }
    }
}
