// src/snapshot/mod.rs

//! # 快照格式
//!
//! 与 Redis RDB v6 兼容的二进制快照：
//!
//! ```text
//! "REDIS" "0006"
//! [SELECTDB <len>] ([EXPIRETIME_MS <i64 LE>] <type> <key> <value>)* ...
//! EOF <crc64 LE, 0 表示未计算>
//! ```
//!
//! - [`len`]：6/14/32 位长度编码
//! - [`string`]：字符串编码（整数打包 / LZF / 原样）与浮点数编码
//! - [`rio`]：带滚动 CRC64 的读写封装
//! - [`writer`] / [`reader`]：整个 keyspace 的序列化与反序列化

pub mod len;
pub mod reader;
pub mod rio;
pub mod string;
pub mod writer;

pub use reader::{LoadOptions, LoadProgress, LoadStats, SnapshotReader};
pub use writer::{SaveStats, SnapshotWriter};

pub const MAGIC: &[u8; 5] = b"REDIS";
pub const VERSION: u32 = 6;
pub const MIN_VERSION: u32 = 1;
/// 从该版本开始文件末尾带 CRC64
pub const CHECKSUM_SINCE_VERSION: u32 = 5;

// 值类型
pub const TYPE_STRING: u8 = 0;
pub const TYPE_LIST: u8 = 1;
pub const TYPE_SET: u8 = 2;
pub const TYPE_ZSET: u8 = 3;
pub const TYPE_HASH: u8 = 4;
/// 旧版 hash 紧凑编码，只读
pub const TYPE_HASH_ZIPMAP: u8 = 9;
pub const TYPE_LIST_ZIPLIST: u8 = 10;
pub const TYPE_SET_INTSET: u8 = 11;
pub const TYPE_ZSET_ZIPLIST: u8 = 12;
pub const TYPE_HASH_ZIPLIST: u8 = 13;

// 操作码
pub const OPCODE_EXPIRETIME_MS: u8 = 252;
pub const OPCODE_EXPIRETIME: u8 = 253;
pub const OPCODE_SELECTDB: u8 = 254;
pub const OPCODE_EOF: u8 = 255;

/// 可以出现在 type 位置上的值类型标签
pub fn is_value_type(tag: u8) -> bool {
    matches!(tag, TYPE_STRING..=TYPE_HASH | TYPE_HASH_ZIPMAP..=TYPE_HASH_ZIPLIST)
}

/// 类型标签的可读名称（CLI 输出用）
pub fn type_name(tag: u8) -> &'static str {
    match tag {
        TYPE_STRING => "string",
        TYPE_LIST => "list",
        TYPE_SET => "set",
        TYPE_ZSET => "zset",
        TYPE_HASH => "hash",
        TYPE_HASH_ZIPMAP => "hash(zipmap)",
        TYPE_LIST_ZIPLIST => "list(ziplist)",
        TYPE_SET_INTSET => "set(intset)",
        TYPE_ZSET_ZIPLIST => "zset(ziplist)",
        TYPE_HASH_ZIPLIST => "hash(ziplist)",
        _ => "unknown",
    }
}
