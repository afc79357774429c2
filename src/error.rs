// src/error.rs

//! 统一错误类型
//!
//! - `WrongType` / `SaveInProgress` 属于可恢复错误，直接返回给调用方
//! - 其余快照相关错误对本次加载是致命的：调用方必须放弃整个 keyspace

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, KvError>;

#[derive(Debug, Error)]
pub enum KvError {
    /// 对错误类型的 key 执行操作
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// 命令参数或当前值不合法
    #[error("ERR {0}")]
    Command(String),

    /// 已经有一个快照写入在进行
    #[error("Background save already in progress")]
    SaveInProgress,

    /// commit_extra_len 越界
    #[error("length adjustment {incr} out of bounds (len {len}, free {free})")]
    InvalidLength { incr: isize, len: usize, free: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// 短读：文件被截断
    #[error("short read or truncated snapshot")]
    UnexpectedEof,

    #[error("wrong signature trying to load snapshot")]
    BadMagic,

    #[error("can't handle snapshot format version {0}")]
    UnsupportedVersion(u32),

    #[error("database index {index} is out of range, only {max} are configured")]
    DbIndexOutOfRange { index: u32, max: usize },

    #[error("unknown value type tag {0}")]
    UnknownValueType(u8),

    #[error("wrong snapshot checksum: expected {expected:#018x}, found {found:#018x}")]
    ChecksumMismatch { expected: u64, found: u64 },

    /// 结构损坏（压缩块、ziplist、intset 等内部格式不合法）
    #[error("corrupt snapshot: {0}")]
    Corrupt(String),
}

impl KvError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        KvError::Corrupt(msg.into())
    }

    /// 加载过程中出现此类错误时，整个 keyspace 不可用
    pub fn is_fatal_for_load(&self) -> bool {
        !matches!(
            self,
            KvError::WrongType
                | KvError::Command(_)
                | KvError::SaveInProgress
                | KvError::InvalidLength { .. }
        )
    }
}
