// tests/integration_persistence.rs

//! 集成测试：快照写出 / 加载 / 校验，以及 SAVE 与 BGSAVE 的协调

use std::collections::BTreeMap;

use anyhow::Result;
use tempfile::tempdir;

use cagekv::config::Config;
use cagekv::engine::{Keyspace, MemoryKeyspace};
use cagekv::error::KvError;
use cagekv::expire::now_ms;
use cagekv::object::Value;
use cagekv::persistence::Persistence;
use cagekv::snapshot::len::encode_len;
use cagekv::snapshot::rio::CRC64;
use cagekv::snapshot::{LoadOptions, SnapshotReader, SnapshotWriter};
use cagekv::types::{Encoding, hash, list, set, string, zset};

/// 已过期的 key 个数：db1 的 `stale` 加上 db3 中每种类型各一个
const EXPIRED_KEYS: usize = 6;

/// 构造一个覆盖所有类型与编码的 keyspace
fn populated() -> Result<MemoryKeyspace> {
    let mut ks = MemoryKeyspace::from_config(&Config::default());
    string::set(&mut ks, 0, b"plain", b"hello")?;
    string::set(&mut ks, 0, b"num", b"12345")?;
    string::set(&mut ks, 0, b"padded", b"007")?;
    string::set(&mut ks, 0, b"blob", &vec![b'a'; 1000])?;

    for item in ["a", "b", "c"] {
        list::rpush(&mut ks, 0, b"list", item.as_bytes())?;
    }
    for i in 0..600 {
        list::rpush(&mut ks, 1, b"biglist", format!("{}", i).as_bytes())?;
    }

    for m in ["1", "2", "3"] {
        set::sadd(&mut ks, 0, b"ints", m.as_bytes())?;
    }
    set::sadd(&mut ks, 0, b"words", b"crab")?;
    set::sadd(&mut ks, 0, b"words", b"cage")?;

    zset::zadd(&mut ks, 0, b"zs", 1.5, b"a")?;
    zset::zadd(&mut ks, 0, b"zs", f64::NEG_INFINITY, b"low")?;
    for i in 0..200 {
        zset::zadd(&mut ks, 2, b"bigz", i as f64 / 3.0, format!("member:{}", i).as_bytes())?;
    }

    hash::hset(&mut ks, 0, b"h", b"field", b"value")?;
    hash::hset(&mut ks, 0, b"h", b"other", b"42")?;
    hash::hset(&mut ks, 2, b"bigh", b"f", &vec![b'x'; 200])?;

    // 每种类型都有一个在未来过期的 key
    let later = now_ms() + 3_600_000;
    for (db, key) in [(0, &b"plain"[..]), (0, b"list"), (1, b"biglist"), (0, b"ints"), (0, b"zs"), (2, b"bigh")] {
        assert!(ks.set_expire(db, key, later));
    }

    // 每种类型都有一个已经过期的 key
    let past = now_ms() - 1000;
    string::set(&mut ks, 1, b"stale", b"gone")?;
    string::set(&mut ks, 3, b"old:string", b"gone")?;
    list::rpush(&mut ks, 3, b"old:list", b"gone")?;
    set::sadd(&mut ks, 3, b"old:set", b"gone")?;
    zset::zadd(&mut ks, 3, b"old:zset", 1.0, b"gone")?;
    hash::hset(&mut ks, 3, b"old:hash", b"f", b"gone")?;
    assert!(ks.set_expire(1, b"stale", past));
    for key in [&b"old:string"[..], b"old:list", b"old:set", b"old:zset", b"old:hash"] {
        assert!(ks.set_expire(3, key, past));
    }
    Ok(ks)
}

/// (db, key) → (类型, 完整内容, 过期时间)，与编码无关
type Contents = BTreeMap<(usize, Vec<u8>), (String, Vec<Vec<u8>>, Option<i64>)>;

fn contents(ks: &MemoryKeyspace) -> Contents {
    let mut out = Contents::new();
    for db in 0..ks.db_count() {
        for (key, value, expire) in ks.entries(db) {
            let items: Vec<Vec<u8>> = match value {
                Value::String(s) => vec![s.to_bytes().into_owned()],
                Value::List(l) => l.iter().map(|v| v.into_owned()).collect(),
                Value::Set(s) => {
                    let mut members: Vec<Vec<u8>> = s.iter().map(|v| v.into_owned()).collect();
                    members.sort();
                    members
                }
                Value::Hash(h) => {
                    let mut pairs: Vec<Vec<u8>> = h
                        .iter()
                        .map(|(f, v)| {
                            let mut pair = f.into_owned();
                            pair.push(b'=');
                            pair.extend_from_slice(&v);
                            pair
                        })
                        .collect();
                    pairs.sort();
                    pairs
                }
                Value::ZSet(z) => z
                    .iter()
                    .map(|(m, score)| {
                        let mut pair = m.into_owned();
                        pair.push(b'@');
                        pair.extend_from_slice(&score.to_bits().to_be_bytes());
                        pair
                    })
                    .collect(),
            };
            out.insert((db, key.to_vec()), (value.kind().to_string(), items, expire));
        }
    }
    out
}

fn load_bytes(bytes: &[u8], replica: bool) -> cagekv::error::Result<MemoryKeyspace> {
    let mut opts = LoadOptions::from_config(&Config::default());
    opts.replica = replica;
    let empty = MemoryKeyspace::from_config(&Config::default());
    SnapshotReader::new(opts).load(bytes, empty, now_ms()).map(|(ks, _)| ks)
}

fn encoding(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Encoding {
    ks.lookup(db, key).map(|v| v.encoding()).expect("key must exist")
}

#[test]
fn test_round_trip_as_primary_and_replica() -> Result<()> {
    let ks = populated()?;
    let original = contents(&ks);
    let now = now_ms();
    // now = 0：写出时不丢弃任何 key，由加载端决定
    let bytes = SnapshotWriter::default().to_vec(&ks, 0)?;

    let primary = load_bytes(&bytes, false)?;
    assert_eq!(primary.total_keys(), ks.total_keys() - EXPIRED_KEYS);
    let live: Contents = original
        .iter()
        .filter(|(_, (_, _, expire))| expire.is_none_or(|when| when >= now))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    assert_eq!(contents(&primary), live);
    assert_eq!(primary.db_len(3), 0);

    let replica = load_bytes(&bytes, true)?;
    assert_eq!(replica.total_keys(), ks.total_keys());
    assert_eq!(contents(&replica), original);
    assert_eq!(replica.get_expire(3, b"old:zset"), ks.get_expire(3, b"old:zset"));

    for loaded in [&primary, &replica] {
        assert!(loaded.get_expire(0, b"list").is_some());
        assert!(loaded.get_expire(0, b"words").is_none());
        assert_eq!(encoding(loaded, 0, b"num"), Encoding::Int);
        assert_eq!(encoding(loaded, 0, b"padded"), Encoding::Raw);
        assert_eq!(encoding(loaded, 0, b"list"), Encoding::Ziplist);
        assert_eq!(encoding(loaded, 1, b"biglist"), Encoding::LinkedList);
        assert_eq!(encoding(loaded, 0, b"ints"), Encoding::Intset);
        assert_eq!(encoding(loaded, 0, b"words"), Encoding::HashTable);
        assert_eq!(encoding(loaded, 0, b"zs"), Encoding::Ziplist);
        assert_eq!(encoding(loaded, 2, b"bigz"), Encoding::SkipList);
        assert_eq!(zset::zrank(loaded, 2, b"bigz", b"member:100", false)?, Some(100));
        assert_eq!(encoding(loaded, 0, b"h"), Encoding::Ziplist);
        assert_eq!(encoding(loaded, 2, b"bigh"), Encoding::HashTable);
    }
    Ok(())
}

#[test]
fn test_writer_drops_expired_keys() -> Result<()> {
    let ks = populated()?;
    let mut out = Vec::new();
    let stats = SnapshotWriter::default().write(&ks, &mut out, now_ms())?;
    assert_eq!(stats.expired_skipped, EXPIRED_KEYS);
    assert_eq!(stats.keys, ks.total_keys() - EXPIRED_KEYS);
    let replica = load_bytes(&out, true)?;
    assert!(replica.lookup(1, b"stale").is_none());
    assert_eq!(replica.db_len(3), 0);
    Ok(())
}

#[test]
fn test_checksum_tamper_detected() -> Result<()> {
    let mut ks = MemoryKeyspace::from_config(&Config::default());
    string::set(&mut ks, 0, b"k", b"hello")?;
    let mut bytes = SnapshotWriter::default().to_vec(&ks, 0)?;

    let pos = bytes.windows(5).position(|w| w == b"hello").expect("value is stored verbatim");
    bytes[pos] = b'j';
    assert!(matches!(load_bytes(&bytes, false), Err(KvError::ChecksumMismatch { .. })));

    // 关闭校验时照常加载被篡改的内容
    let mut opts = LoadOptions::from_config(&Config::default());
    opts.verify_checksum = false;
    let (loaded, _) = SnapshotReader::new(opts).load(&bytes[..], MemoryKeyspace::from_config(&Config::default()), 0)?;
    assert_eq!(string::get(&loaded, 0, b"k")?.as_deref(), Some(&b"jello"[..]));
    Ok(())
}

#[test]
fn test_zero_checksum_skips_verification() -> Result<()> {
    let mut ks = MemoryKeyspace::from_config(&Config::default());
    string::set(&mut ks, 0, b"k", b"v")?;
    let writer = SnapshotWriter { compression: true, checksum: false };
    let bytes = writer.to_vec(&ks, 0)?;
    assert_eq!(load_bytes(&bytes, false)?.total_keys(), 1);
    Ok(())
}

#[test]
fn test_truncated_snapshot_is_fatal() -> Result<()> {
    let ks = populated()?;
    let bytes = SnapshotWriter::default().to_vec(&ks, 0)?;
    for cut in [5, 20, bytes.len() / 2, bytes.len() - 1] {
        let err = load_bytes(&bytes[..cut], false).unwrap_err();
        assert!(err.is_fatal_for_load());
        assert!(matches!(err, KvError::UnexpectedEof | KvError::Corrupt(_)), "cut {}: {:?}", cut, err);
    }
    Ok(())
}

#[test]
fn test_length_codec_boundaries() {
    let cases: [(u32, &[u8]); 3] = [
        (63, &[0x3F]),
        (64, &[0x40, 0x40]),
        (20000, &[0x80, 0x00, 0x00, 0x4E, 0x20]),
    ];
    for (len, expect) in cases {
        let mut out = Vec::new();
        assert_eq!(encode_len(&mut out, len), expect.len());
        assert_eq!(out, expect);
    }
}

#[test]
fn test_legacy_zipmap_hash_loads() -> Result<()> {
    // zipmap: <zmlen> <len>key <len><free>value ... <end>
    let mut zipmap = vec![2u8];
    for (k, v) in [(&b"lang"[..], &b"rust"[..]), (&b"year"[..], &b"2015"[..])] {
        zipmap.push(k.len() as u8);
        zipmap.extend_from_slice(k);
        zipmap.push(v.len() as u8);
        zipmap.push(0);
        zipmap.extend_from_slice(v);
    }
    zipmap.push(0xFF);

    let mut bytes = b"REDIS0006".to_vec();
    bytes.extend_from_slice(&[254, 0, 9]);
    encode_len(&mut bytes, 4);
    bytes.extend_from_slice(b"meta");
    encode_len(&mut bytes, zipmap.len() as u32);
    bytes.extend_from_slice(&zipmap);
    bytes.push(255);
    let crc = CRC64.checksum(&bytes);
    bytes.extend_from_slice(&crc.to_le_bytes());

    let ks = load_bytes(&bytes, false)?;
    assert_eq!(encoding(&ks, 0, b"meta"), Encoding::Ziplist);
    assert_eq!(hash::hget(&ks, 0, b"meta", b"year")?.as_deref(), Some(&b"2015"[..]));
    assert_eq!(hash::hlen(&ks, 0, b"meta")?, 2);
    Ok(())
}

#[test]
fn test_background_save_rejects_concurrent_saves() -> Result<()> {
    let tmp = tempdir()?;
    let mut pers = Persistence::new(Config::default(), tmp.path());
    let mut ks = populated()?;
    let dirty_before = ks.dirty();
    assert!(dirty_before > 0);

    pers.background_save(&ks)?;
    assert!(pers.is_saving());
    assert!(matches!(pers.save(&mut ks), Err(KvError::SaveInProgress)));
    assert!(matches!(pers.background_save(&ks), Err(KvError::SaveInProgress)));

    // 保存期间的写入不会被计入这次保存
    string::set(&mut ks, 0, b"late", b"1")?;

    let stats = pers.wait_background_save(&mut ks)?.expect("a save was running");
    assert!(!pers.is_saving());
    assert_eq!(ks.dirty(), 1);
    assert!(pers.last_save_ok());

    let (loaded, load_stats) = pers.load(false)?;
    assert_eq!(load_stats.map(|s| s.keys_loaded), Some(stats.keys));
    assert!(loaded.lookup(0, b"late").is_none());
    assert!(pers.wait_background_save(&mut ks)?.is_none());
    Ok(())
}

#[test]
fn test_save_replaces_previous_snapshot_atomically() -> Result<()> {
    let tmp = tempdir()?;
    let mut pers = Persistence::new(Config::default(), tmp.path());
    let mut ks = MemoryKeyspace::from_config(pers.config());
    string::set(&mut ks, 0, b"v", b"1")?;
    pers.save(&mut ks)?;
    let first = std::fs::read(pers.path())?;

    string::set(&mut ks, 0, b"v", b"2")?;
    pers.save(&mut ks)?;
    let second = std::fs::read(pers.path())?;
    assert_ne!(first, second);

    // 目录里只剩最终文件，没有遗留的临时文件
    let names: Vec<String> = std::fs::read_dir(tmp.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["dump.rdb".to_string()]);

    let (loaded, _) = pers.load(false)?;
    assert_eq!(string::get(&loaded, 0, b"v")?.as_deref(), Some(&b"2"[..]));
    Ok(())
}

#[test]
fn test_progress_hook_during_file_load() -> Result<()> {
    let tmp = tempdir()?;
    let cfg = Config { loading_process_events_interval_bytes: 512, ..Config::default() };
    let mut pers = Persistence::new(cfg, tmp.path());
    let mut ks = populated()?;
    pers.save(&mut ks)?;

    let size = std::fs::metadata(pers.path())?.len();
    let mut seen = Vec::new();
    pers.load_with_progress(false, |p| seen.push(p))?;
    assert!(!seen.is_empty());
    assert!(seen.iter().all(|p| p.total_bytes == Some(size) && p.loaded_bytes <= size));
    Ok(())
}
