// src/snapshot/reader.rs

//! 从快照字节流重建 keyspace
//!
//! 读取过程中任何错误都会让整个加载失败；目标 keyspace 以值的方式传入，
//! 只有成功时才交还给调用方，调用方看不到加载了一半的数据。

use std::io::Read;

use tracing::{debug, info, warn};

use crate::config::{Config, TypeLimits};
use crate::engine::Keyspace;
use crate::error::{KvError, Result};
use crate::object::Value;
use crate::snapshot::len::read_plain_len;
use crate::snapshot::rio::RioReader;
use crate::snapshot::string::{read_double, read_string};
use crate::snapshot::*;
use crate::types::hash::HashValue;
use crate::types::intset::Intset;
use crate::types::list::{ListEnd, ListValue};
use crate::types::set::SetValue;
use crate::types::string::{ByteBuffer, StringValue, parse_canonical_i64};
use crate::types::ziplist::Ziplist;
use crate::types::zipmap;
use crate::types::zset::ZSetValue;
use crate::types::UpdateKind;

/// 加载进度，传给进度钩子
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded_bytes: u64,
    /// 总字节数未知时为 None
    pub total_bytes: Option<u64>,
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    /// 以从节点身份加载：保留已过期的 key
    pub replica: bool,
    /// 校验文件末尾的 CRC64
    pub verify_checksum: bool,
    pub limits: TypeLimits,
    /// 每读这么多字节调用一次进度钩子，0 表示不调用
    pub progress_interval: u64,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions::from_config(&Config::default())
    }
}

impl LoadOptions {
    pub fn from_config(cfg: &Config) -> Self {
        LoadOptions {
            replica: false,
            verify_checksum: cfg.rdb_checksum,
            limits: cfg.type_limits(),
            progress_interval: cfg.loading_process_events_interval_bytes,
        }
    }
}

/// 一次加载的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub version: u32,
    pub keys_loaded: usize,
    /// 作为主节点加载时丢弃的过期 key
    pub expired_skipped: usize,
    pub bytes: u64,
}

pub struct SnapshotReader<'h> {
    opts: LoadOptions,
    total_bytes: Option<u64>,
    hook: Option<Box<dyn FnMut(LoadProgress) + 'h>>,
}

impl<'h> SnapshotReader<'h> {
    pub fn new(opts: LoadOptions) -> Self {
        SnapshotReader { opts, total_bytes: None, hook: None }
    }

    /// 已知的总字节数，只用于进度报告
    pub fn with_total_bytes(mut self, total: u64) -> Self {
        self.total_bytes = Some(total);
        self
    }

    pub fn with_progress(mut self, hook: impl FnMut(LoadProgress) + 'h) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    /// 加载快照到 `ks`，成功时返回填充好的 keyspace
    pub fn load<K, R>(&mut self, input: R, mut ks: K, now: i64) -> Result<(K, LoadStats)>
    where
        K: Keyspace,
        R: Read,
    {
        let mut rio = RioReader::new(input, self.total_bytes, self.opts.progress_interval);
        let mut stats = LoadStats { version: read_header(&mut rio)?, ..LoadStats::default() };
        let mut db = 0usize;

        loop {
            let mut expire = None;
            let mut tag = rio.read_u8()?;
            match tag {
                OPCODE_EXPIRETIME_MS => {
                    expire = Some(i64::from_le_bytes(rio.read_array()?));
                    tag = rio.read_u8()?;
                }
                OPCODE_EXPIRETIME => {
                    expire = Some(i32::from_le_bytes(rio.read_array()?) as i64 * 1000);
                    tag = rio.read_u8()?;
                }
                _ => {}
            }

            match tag {
                OPCODE_EOF => break,
                OPCODE_SELECTDB => {
                    let index = read_plain_len(&mut rio)?;
                    if index >= ks.db_count() {
                        return Err(KvError::DbIndexOutOfRange { index: index as u32, max: ks.db_count() });
                    }
                    debug!(db = index, "selecting database");
                    db = index;
                    continue;
                }
                t if !is_value_type(t) => return Err(KvError::UnknownValueType(t)),
                _ => {}
            }

            let key = ByteBuffer::from(read_string(&mut rio)?);
            let value = read_value(&mut rio, tag, &self.opts.limits)?;

            if let Some(progress) = rio.progress_due() {
                if let Some(hook) = self.hook.as_mut() {
                    hook(progress);
                }
            }

            if !self.opts.replica && expire.is_some_and(|when| when < now) {
                stats.expired_skipped += 1;
                continue;
            }
            if !ks.add(db, key.clone(), value) {
                return Err(KvError::corrupt(format!("duplicate key {:?} in database {}", key, db)));
            }
            if let Some(when) = expire {
                ks.set_expire(db, &key, when);
            }
            stats.keys_loaded += 1;
        }

        // 关闭校验时不读取末尾的 8 字节
        if stats.version >= CHECKSUM_SINCE_VERSION && self.opts.verify_checksum {
            let expected = rio.checksum();
            let found = u64::from_le_bytes(rio.read_array()?);
            if found == 0 {
                warn!("snapshot was saved with checksum disabled: no check performed");
            } else if found != expected {
                return Err(KvError::ChecksumMismatch { expected, found });
            }
        }

        stats.bytes = rio.tell();
        info!(
            version = stats.version,
            keys = stats.keys_loaded,
            expired = stats.expired_skipped,
            bytes = stats.bytes,
            "snapshot loaded"
        );
        Ok((ks, stats))
    }
}

fn read_header<R: Read>(rio: &mut RioReader<R>) -> Result<u32> {
    let magic: [u8; 5] = rio.read_array()?;
    if &magic != MAGIC {
        return Err(KvError::BadMagic);
    }
    let digits: [u8; 4] = rio.read_array()?;
    let version = std::str::from_utf8(&digits)
        .ok()
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<u32>().ok())
        .ok_or(KvError::BadMagic)?;
    if !(MIN_VERSION..=VERSION).contains(&version) {
        return Err(KvError::UnsupportedVersion(version));
    }
    Ok(version)
}

/// 按文件中声明的元素个数预分配时的上限；个数本身不可信，
/// 真实元素仍需逐个读出
const MAX_PREALLOC: usize = 1024;

fn insert_unique(kind: UpdateKind, what: &str) -> Result<()> {
    match kind {
        UpdateKind::Inserted => Ok(()),
        UpdateKind::Updated => Err(KvError::corrupt(format!("duplicate {} in snapshot", what))),
    }
}

/// 按类型标签读取并重建一个值
fn read_value<R: Read>(rio: &mut RioReader<R>, tag: u8, limits: &TypeLimits) -> Result<Value> {
    let value = match tag {
        TYPE_STRING => Value::String(StringValue::from_bytes(&read_string(rio)?)),

        TYPE_LIST => {
            let count = read_plain_len(rio)?;
            let mut list = if count > limits.list.max_entries {
                ListValue::with_capacity(count.min(MAX_PREALLOC))
            } else {
                ListValue::new()
            };
            for _ in 0..count {
                list.push(&read_string(rio)?, ListEnd::Tail, limits.list);
            }
            Value::List(list)
        }

        TYPE_SET => {
            let count = read_plain_len(rio)?;
            let mut set = if count > limits.set.max_entries {
                SetValue::with_capacity(count.min(MAX_PREALLOC))
            } else {
                SetValue::from_intset(Intset::new())
            };
            for _ in 0..count {
                let member = read_string(rio)?;
                if set.intset().is_some() && parse_canonical_i64(&member).is_none() {
                    set.convert_to_general_sized(count.min(MAX_PREALLOC));
                }
                set.add(&member, limits.set);
            }
            Value::Set(set)
        }

        TYPE_ZSET => {
            let count = read_plain_len(rio)?;
            let mut pairs = Vec::with_capacity(count.min(MAX_PREALLOC));
            let mut longest = 0;
            for _ in 0..count {
                let member = read_string(rio)?;
                let score = read_double(rio)?;
                if score.is_nan() {
                    return Err(KvError::corrupt("NaN score in zset"));
                }
                longest = longest.max(member.len());
                pairs.push((member, score));
            }
            let compact = count <= limits.zset.max_entries && limits.zset.value_fits(longest);
            let mut zset = if compact { ZSetValue::new() } else { ZSetValue::with_capacity(count) };
            for (member, score) in &pairs {
                insert_unique(zset.insert(member, *score, limits.zset), "zset member")?;
            }
            Value::ZSet(zset)
        }

        TYPE_HASH => {
            let count = read_plain_len(rio)?;
            let mut hash = if count > limits.hash.max_entries {
                HashValue::with_capacity(count.min(MAX_PREALLOC))
            } else {
                HashValue::new()
            };
            for _ in 0..count {
                let field = read_string(rio)?;
                let value = read_string(rio)?;
                insert_unique(hash.set(&field, &value, limits.hash), "hash field")?;
            }
            Value::Hash(hash)
        }

        TYPE_HASH_ZIPMAP => {
            let blob = read_string(rio)?;
            let mut zl = Ziplist::new();
            for (field, value) in zipmap::decode(&blob)? {
                zl.push_back(field);
                zl.push_back(value);
            }
            let mut hash = HashValue::from_ziplist(zl)?;
            hash.enforce_limits(limits.hash);
            Value::Hash(hash)
        }

        TYPE_LIST_ZIPLIST => {
            let mut list = ListValue::from_ziplist(Ziplist::from_bytes(read_string(rio)?)?);
            list.enforce_limits(limits.list);
            Value::List(list)
        }

        TYPE_SET_INTSET => {
            let mut set = SetValue::from_intset(Intset::from_bytes(&read_string(rio)?)?);
            set.enforce_limits(limits.set);
            Value::Set(set)
        }

        TYPE_ZSET_ZIPLIST => {
            let mut zset = ZSetValue::from_ziplist(Ziplist::from_bytes(read_string(rio)?)?)?;
            zset.enforce_limits(limits.zset);
            Value::ZSet(zset)
        }

        TYPE_HASH_ZIPLIST => {
            let mut hash = HashValue::from_ziplist(Ziplist::from_bytes(read_string(rio)?)?)?;
            hash.enforce_limits(limits.hash);
            Value::Hash(hash)
        }

        other => return Err(KvError::UnknownValueType(other)),
    };
    Ok(value)
}
