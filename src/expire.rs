// src/expire.rs

//! 过期时间：EXPIRE / PEXPIREAT / TTL / PTTL / PERSIST 以及全量清理
//!
//! 过期时间统一以 UNIX 毫秒（i64）保存在 keyspace 中，
//! 快照写出时也是这个值。

use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::engine::{Keyspace, MemoryKeyspace};

/// 返回当前的 UNIX 毫秒
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// 设置 key 在 `secs` 秒后过期，key 不存在时返回 false
pub fn expire(ks: &mut MemoryKeyspace, db: usize, key: &[u8], secs: i64) -> bool {
    pexpire_at(ks, db, key, now_ms().saturating_add(secs.saturating_mul(1000)))
}

/// 设置绝对过期时间（毫秒）
pub fn pexpire_at(ks: &mut MemoryKeyspace, db: usize, key: &[u8], when_ms: i64) -> bool {
    if ks.expire_if_needed(db, key) {
        return false;
    }
    let ok = ks.set_expire(db, key, when_ms);
    if ok {
        ks.mark_dirty(1);
    }
    ok
}

/// 剩余毫秒数：key 不存在返回 -2，没有过期时间返回 -1
pub fn pttl(ks: &mut MemoryKeyspace, db: usize, key: &[u8]) -> i64 {
    if ks.expire_if_needed(db, key) || ks.lookup(db, key).is_none() {
        return -2;
    }
    match ks.get_expire(db, key) {
        Some(when) => (when - now_ms()).max(0),
        None => -1,
    }
}

/// 剩余秒数（向上取整），约定同 [`pttl`]
pub fn ttl(ks: &mut MemoryKeyspace, db: usize, key: &[u8]) -> i64 {
    match pttl(ks, db, key) {
        ms if ms < 0 => ms,
        ms => (ms + 999) / 1000,
    }
}

/// 移除 key 的过期属性
pub fn persist(ks: &mut MemoryKeyspace, db: usize, key: &[u8]) -> bool {
    if ks.expire_if_needed(db, key) {
        return false;
    }
    let removed = ks.remove_expire(db, key);
    if removed {
        ks.mark_dirty(1);
    }
    removed
}

/// 删除所有已过期的 key，返回删除个数
pub fn purge_expired<K: Keyspace>(ks: &mut K, now: i64) -> usize {
    let mut removed = 0;
    for db in 0..ks.db_count() {
        let expired: Vec<Vec<u8>> = ks
            .entries(db)
            .filter(|(_, _, ttl)| ttl.is_some_and(|when| when < now))
            .map(|(k, _, _)| k.to_vec())
            .collect();
        for key in &expired {
            ks.delete(db, key);
        }
        if !expired.is_empty() {
            debug!(db, count = expired.len(), "purged expired keys");
        }
        removed += expired.len();
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TypeLimits;
    use crate::types::string;

    #[test]
    fn test_expire_and_ttl() -> anyhow::Result<()> {
        let mut ks = MemoryKeyspace::new(1, TypeLimits::default());

        // SET + EXPIRE
        string::set(&mut ks, 0, b"k", b"v")?;
        assert_eq!(ttl(&mut ks, 0, b"k"), -1);
        assert!(expire(&mut ks, 0, b"k", 10));
        let t1 = ttl(&mut ks, 0, b"k");
        assert!((9..=10).contains(&t1));
        assert!(!expire(&mut ks, 0, b"missing", 10));
        assert_eq!(ttl(&mut ks, 0, b"missing"), -2);

        // 过去的时间点：TTL 返回 -2，且 key 被删除
        assert!(pexpire_at(&mut ks, 0, b"k", now_ms() - 10));
        assert_eq!(ttl(&mut ks, 0, b"k"), -2);
        assert!(ks.lookup(0, b"k").is_none());
        Ok(())
    }

    #[test]
    fn test_persist() -> anyhow::Result<()> {
        let mut ks = MemoryKeyspace::new(1, TypeLimits::default());
        string::set(&mut ks, 0, b"k", b"v")?;
        assert!(!persist(&mut ks, 0, b"k"));
        expire(&mut ks, 0, b"k", 100);
        assert!(persist(&mut ks, 0, b"k"));
        assert_eq!(ttl(&mut ks, 0, b"k"), -1);
        Ok(())
    }

    #[test]
    fn test_purge_expired() -> anyhow::Result<()> {
        let mut ks = MemoryKeyspace::new(2, TypeLimits::default());
        string::set(&mut ks, 0, b"a", b"1")?;
        string::set(&mut ks, 1, b"b", b"2")?;
        string::set(&mut ks, 1, b"c", b"3")?;
        ks.set_expire(0, b"a", 100);
        ks.set_expire(1, b"b", 100);
        ks.set_expire(1, b"c", i64::MAX);

        assert_eq!(purge_expired(&mut ks, 1000), 2);
        assert_eq!(ks.total_keys(), 1);
        Ok(())
    }
}
