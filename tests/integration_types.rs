// tests/integration_types.rs

//! 集成测试：各类型通过命令级封装时的编码选择与转换

use anyhow::Result;

use cagekv::config::Config;
use cagekv::engine::{Keyspace, MemoryKeyspace};
use cagekv::error::KvError;
use cagekv::expire;
use cagekv::types::{Encoding, UpdateKind, hash, list, set, string, zset};

fn keyspace() -> MemoryKeyspace {
    MemoryKeyspace::from_config(&Config::default())
}

fn encoding(ks: &MemoryKeyspace, key: &[u8]) -> Encoding {
    ks.lookup(0, key).map(|v| v.encoding()).expect("key must exist")
}

#[test]
fn test_set_intset_then_hashtable() -> Result<()> {
    let mut ks = keyspace();
    for m in ["1", "2", "3"] {
        assert!(set::sadd(&mut ks, 0, b"s", m.as_bytes())?);
    }
    assert_eq!(encoding(&ks, b"s"), Encoding::Intset);
    assert!(!set::sadd(&mut ks, 0, b"s", b"2")?, "重复成员不应再次加入");

    assert!(set::sadd(&mut ks, 0, b"s", b"x")?);
    assert_eq!(encoding(&ks, b"s"), Encoding::HashTable);
    assert_eq!(set::scard(&ks, 0, b"s")?, 4);

    let mut members: Vec<Vec<u8>> = set::smembers(&ks, 0, b"s")?.into_iter().map(|m| m.into_vec()).collect();
    members.sort();
    assert_eq!(members, vec![b"1".to_vec(), b"2".to_vec(), b"3".to_vec(), b"x".to_vec()]);
    Ok(())
}

#[test]
fn test_non_canonical_integer_forces_hashtable() -> Result<()> {
    let mut ks = keyspace();
    set::sadd(&mut ks, 0, b"s", b"10")?;
    set::sadd(&mut ks, 0, b"s", b"010")?;
    assert_eq!(encoding(&ks, b"s"), Encoding::HashTable);
    assert!(set::sismember(&ks, 0, b"s", b"010")?);
    assert!(set::sismember(&ks, 0, b"s", b"10")?);
    Ok(())
}

#[test]
fn test_conversion_is_monotonic() -> Result<()> {
    let mut ks = keyspace();
    let long = vec![b'v'; 65];
    hash::hset(&mut ks, 0, b"h", b"short", b"1")?;
    assert_eq!(encoding(&ks, b"h"), Encoding::Ziplist);

    hash::hset(&mut ks, 0, b"h", b"long", &long)?;
    assert_eq!(encoding(&ks, b"h"), Encoding::HashTable);

    // 删除超长的 field 之后仍保持通用编码
    assert!(hash::hdel(&mut ks, 0, b"h", b"long")?);
    assert_eq!(encoding(&ks, b"h"), Encoding::HashTable);
    assert_eq!(hash::hlen(&ks, 0, b"h")?, 1);
    Ok(())
}

#[test]
fn test_zset_entry_threshold() -> Result<()> {
    let mut ks = keyspace();
    for i in 0..128 {
        zset::zadd(&mut ks, 0, b"z", i as f64, format!("m{:03}", i).as_bytes())?;
    }
    assert_eq!(encoding(&ks, b"z"), Encoding::Ziplist);

    zset::zadd(&mut ks, 0, b"z", 1000.0, b"last")?;
    assert_eq!(encoding(&ks, b"z"), Encoding::SkipList);
    assert_eq!(zset::zcard(&ks, 0, b"z")?, 129);
    assert_eq!(zset::zrank(&ks, 0, b"z", b"m010", false)?, Some(10));
    assert_eq!(zset::zrank(&ks, 0, b"z", b"last", true)?, Some(0));

    let top = zset::zrange(&ks, 0, b"z", -2, -1)?;
    assert_eq!(top[1].0.as_bytes(), b"last");
    assert_eq!(top[0].1, 127.0);
    Ok(())
}

#[test]
fn test_zset_update_and_nan() -> Result<()> {
    let mut ks = keyspace();
    assert_eq!(zset::zadd(&mut ks, 0, b"z", 1.0, b"a")?, UpdateKind::Inserted);
    assert_eq!(zset::zadd(&mut ks, 0, b"z", 3.0, b"a")?, UpdateKind::Updated);
    assert_eq!(zset::zincrby(&mut ks, 0, b"z", 0.5, b"a")?, 3.5);
    assert!(matches!(zset::zadd(&mut ks, 0, b"z", f64::NAN, b"b"), Err(KvError::Command(_))));
    assert_eq!(zset::zscore(&ks, 0, b"z", b"a")?, Some(3.5));
    Ok(())
}

#[test]
fn test_list_threshold_and_pops() -> Result<()> {
    let mut ks = keyspace();
    list::rpush(&mut ks, 0, b"l", b"b")?;
    list::lpush(&mut ks, 0, b"l", b"a")?;
    assert_eq!(encoding(&ks, b"l"), Encoding::Ziplist);

    list::rpush(&mut ks, 0, b"l", &[b'x'; 100])?;
    assert_eq!(encoding(&ks, b"l"), Encoding::LinkedList);
    assert_eq!(list::llen(&ks, 0, b"l")?, 3);
    assert_eq!(list::lpop(&mut ks, 0, b"l")?.as_deref(), Some(&b"a"[..]));
    assert_eq!(list::rpop(&mut ks, 0, b"l")?.map(|v| v.len()), Some(100));
    assert_eq!(list::lrange(&ks, 0, b"l", 0, -1)?.len(), 1);
    Ok(())
}

#[test]
fn test_wrong_type_is_recoverable() -> Result<()> {
    let mut ks = keyspace();
    string::set(&mut ks, 0, b"k", b"v")?;
    let err = set::sadd(&mut ks, 0, b"k", b"m").unwrap_err();
    assert!(matches!(err, KvError::WrongType));
    assert!(!err.is_fatal_for_load());
    assert_eq!(string::get(&ks, 0, b"k")?.as_deref(), Some(&b"v"[..]));
    Ok(())
}

#[test]
fn test_expire_and_persist() -> Result<()> {
    let mut ks = keyspace();
    string::set(&mut ks, 0, b"k", b"v")?;
    assert_eq!(expire::ttl(&mut ks, 0, b"k"), -1);
    assert!(expire::expire(&mut ks, 0, b"k", 100));
    let ttl = expire::ttl(&mut ks, 0, b"k");
    assert!((99..=100).contains(&ttl), "ttl = {}", ttl);

    assert!(expire::persist(&mut ks, 0, b"k"));
    assert_eq!(expire::pttl(&mut ks, 0, b"k"), -1);

    // 过去的时间点：key 立即不可见
    assert!(expire::pexpire_at(&mut ks, 0, b"k", 1));
    assert_eq!(string::get(&ks, 0, b"k")?, None);
    assert_eq!(expire::pttl(&mut ks, 0, b"k"), -2);
    Ok(())
}

#[test]
fn test_general_encoding_survives_deletes() -> Result<()> {
    let mut ks = keyspace();
    for i in 0..129 {
        zset::zadd(&mut ks, 0, b"z", i as f64, format!("m{}", i).as_bytes())?;
    }
    list::rpush(&mut ks, 0, b"l", b"a")?;
    list::rpush(&mut ks, 0, b"l", &[b'x'; 100])?;
    assert_eq!(encoding(&ks, b"z"), Encoding::SkipList);
    assert_eq!(encoding(&ks, b"l"), Encoding::LinkedList);

    for i in 0..127 {
        assert!(zset::zrem(&mut ks, 0, b"z", format!("m{}", i).as_bytes())?);
    }
    assert_eq!(list::rpop(&mut ks, 0, b"l")?.map(|v| v.len()), Some(100));

    assert_eq!(zset::zcard(&ks, 0, b"z")?, 2);
    assert_eq!(encoding(&ks, b"z"), Encoding::SkipList);
    assert_eq!(list::llen(&ks, 0, b"l")?, 1);
    assert_eq!(encoding(&ks, b"l"), Encoding::LinkedList);
    Ok(())
}

#[test]
fn test_database_out_of_range() -> Result<()> {
    let mut ks = keyspace();
    let db = Config::default().databases;
    assert!(matches!(string::set(&mut ks, db, b"k", b"v"), Err(KvError::DbIndexOutOfRange { .. })));
    assert!(matches!(set::sadd(&mut ks, db, b"s", b"1"), Err(KvError::DbIndexOutOfRange { .. })));
    assert!(matches!(zset::zadd(&mut ks, db, b"z", 1.0, b"m"), Err(KvError::DbIndexOutOfRange { .. })));
    assert!(matches!(hash::hget(&ks, db, b"h", b"f"), Err(KvError::DbIndexOutOfRange { .. })));
    assert!(matches!(list::lpop(&mut ks, usize::MAX, b"l"), Err(KvError::DbIndexOutOfRange { .. })));
    assert!(matches!(string::del(&mut ks, db, b"k"), Err(KvError::DbIndexOutOfRange { .. })));

    assert!(!expire::expire(&mut ks, db, b"k", 10));
    assert_eq!(expire::pttl(&mut ks, db, b"k"), -2);
    assert!(!expire::persist(&mut ks, db, b"k"));
    assert_eq!(ks.total_keys(), 0);
    assert_eq!(ks.dirty(), 0);
    Ok(())
}
