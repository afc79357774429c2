// src/types/mod.rs

//! 各数据类型的双编码容器，以及基于它们的命令级薄封装
//!
//! 每个容器内部是一个私有的 repr 枚举（紧凑编码 / 通用编码），
//! 转换只会从紧凑到通用单向发生。阈值由调用方通过
//! [`EncodingLimits`](crate::config::EncodingLimits) 显式传入。

pub mod hash;
pub mod intset;
pub mod list;
pub mod set;
pub mod skiplist;
pub mod string;
pub mod ziplist;
pub mod zipmap;
pub mod zset;

use std::fmt;

/// 写入操作的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateKind {
    Inserted,
    Updated,
}

/// 值在内存中的具体编码
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Int,
    Raw,
    Ziplist,
    Intset,
    HashTable,
    SkipList,
    LinkedList,
}

impl Encoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Int => "int",
            Encoding::Raw => "raw",
            Encoding::Ziplist => "ziplist",
            Encoding::Intset => "intset",
            Encoding::HashTable => "hashtable",
            Encoding::SkipList => "skiplist",
            Encoding::LinkedList => "linkedlist",
        }
    }

    /// 是否为紧凑编码
    pub fn is_compact(&self) -> bool {
        matches!(self, Encoding::Int | Encoding::Ziplist | Encoding::Intset)
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
