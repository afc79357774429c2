// src/snapshot/writer.rs

//! 把整个 keyspace 序列化为快照字节流

use std::io::Write;

use tracing::debug;

use crate::config::Config;
use crate::engine::Keyspace;
use crate::error::Result;
use crate::object::Value;
use crate::snapshot::len::write_len;
use crate::snapshot::rio::RioWriter;
use crate::snapshot::string::{write_double, write_string, write_string_value};
use crate::snapshot::*;

/// 一次写出的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveStats {
    pub keys: usize,
    /// 写出时已过期而被跳过的 key
    pub expired_skipped: usize,
    pub bytes: u64,
    pub checksum: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct SnapshotWriter {
    pub compression: bool,
    pub checksum: bool,
}

impl Default for SnapshotWriter {
    fn default() -> Self {
        SnapshotWriter { compression: true, checksum: true }
    }
}

/// 值在快照中的类型标签
pub fn value_type_tag(value: &Value) -> u8 {
    match value {
        Value::String(_) => TYPE_STRING,
        Value::List(l) if l.ziplist().is_some() => TYPE_LIST_ZIPLIST,
        Value::List(_) => TYPE_LIST,
        Value::Set(s) if s.intset().is_some() => TYPE_SET_INTSET,
        Value::Set(_) => TYPE_SET,
        Value::ZSet(z) if z.ziplist().is_some() => TYPE_ZSET_ZIPLIST,
        Value::ZSet(_) => TYPE_ZSET,
        Value::Hash(h) if h.ziplist().is_some() => TYPE_HASH_ZIPLIST,
        Value::Hash(_) => TYPE_HASH,
    }
}

impl SnapshotWriter {
    pub fn from_config(cfg: &Config) -> Self {
        SnapshotWriter { compression: cfg.rdb_compression, checksum: cfg.rdb_checksum }
    }

    /// 写出完整快照；`now` 之前已过期的 key 会被跳过
    pub fn write<K, W>(&self, ks: &K, out: W, now: i64) -> Result<SaveStats>
    where
        K: Keyspace + ?Sized,
        W: Write,
    {
        let mut rio = RioWriter::new(out, self.checksum);
        let mut stats = SaveStats::default();

        rio.write_all(MAGIC)?;
        rio.write_all(format!("{:04}", VERSION).as_bytes())?;

        for db in 0..ks.db_count() {
            if ks.db_len(db) == 0 {
                continue;
            }
            debug!(db, keys = ks.db_len(db), "writing database");
            rio.write_u8(OPCODE_SELECTDB)?;
            write_len(&mut rio, db)?;

            for (key, value, expire) in ks.entries(db) {
                if let Some(when) = expire {
                    if when < now {
                        stats.expired_skipped += 1;
                        continue;
                    }
                    rio.write_u8(OPCODE_EXPIRETIME_MS)?;
                    rio.write_all(&when.to_le_bytes())?;
                }
                rio.write_u8(value_type_tag(value))?;
                write_string(&mut rio, key, self.compression)?;
                self.write_value(&mut rio, value)?;
                stats.keys += 1;
            }
        }

        rio.write_u8(OPCODE_EOF)?;
        let checksum = rio.checksum();
        rio.write_all(&checksum.to_le_bytes())?;
        rio.flush()?;

        stats.bytes = rio.tell();
        stats.checksum = checksum;
        Ok(stats)
    }

    fn write_value<W: Write>(&self, rio: &mut RioWriter<W>, value: &Value) -> Result<()> {
        let compress = self.compression;
        match value {
            Value::String(s) => write_string_value(rio, s, compress),
            Value::List(l) => match l.ziplist() {
                Some(zl) => write_string(rio, zl.as_bytes(), compress),
                None => {
                    write_len(rio, l.len())?;
                    for item in l.iter() {
                        write_string(rio, &item, compress)?;
                    }
                    Ok(())
                }
            },
            Value::Set(s) => match s.intset() {
                Some(is) => write_string(rio, &is.to_bytes(), compress),
                None => {
                    write_len(rio, s.len())?;
                    for member in s.iter() {
                        write_string(rio, &member, compress)?;
                    }
                    Ok(())
                }
            },
            Value::ZSet(z) => match z.ziplist() {
                Some(zl) => write_string(rio, zl.as_bytes(), compress),
                None => {
                    write_len(rio, z.len())?;
                    for (member, score) in z.iter() {
                        write_string(rio, &member, compress)?;
                        write_double(rio, score)?;
                    }
                    Ok(())
                }
            },
            Value::Hash(h) => match h.ziplist() {
                Some(zl) => write_string(rio, zl.as_bytes(), compress),
                None => {
                    write_len(rio, h.len())?;
                    for (field, value) in h.iter() {
                        write_string(rio, &field, compress)?;
                        write_string(rio, &value, compress)?;
                    }
                    Ok(())
                }
            },
        }
    }

    /// 写到内存缓冲区（测试与 CLI 使用）
    pub fn to_vec<K: Keyspace + ?Sized>(&self, ks: &K, now: i64) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.write(ks, &mut out, now)?;
        Ok(out)
    }
}
