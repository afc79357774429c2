// src/object.rs

//! 值对象：类型 × 编码 的和类型

use std::fmt;

use crate::error::{KvError, Result};
use crate::types::Encoding;
use crate::types::hash::HashValue;
use crate::types::list::ListValue;
use crate::types::set::SetValue;
use crate::types::string::StringValue;
use crate::types::zset::ZSetValue;

/// 逻辑类型（TYPE 命令的返回值）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    String,
    List,
    Set,
    ZSet,
    Hash,
}

impl ValueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Set => "set",
            ValueKind::ZSet => "zset",
            ValueKind::Hash => "hash",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    String(StringValue),
    List(ListValue),
    Hash(HashValue),
    Set(SetValue),
    ZSet(ZSetValue),
}

macro_rules! accessors {
    ($get:ident, $get_mut:ident, $variant:ident, $ty:ty) => {
        /// 类型不符时返回 `WrongType`
        pub fn $get(&self) -> Result<&$ty> {
            match self {
                Value::$variant(v) => Ok(v),
                _ => Err(KvError::WrongType),
            }
        }

        pub fn $get_mut(&mut self) -> Result<&mut $ty> {
            match self {
                Value::$variant(v) => Ok(v),
                _ => Err(KvError::WrongType),
            }
        }
    };
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::String(_) => ValueKind::String,
            Value::List(_) => ValueKind::List,
            Value::Hash(_) => ValueKind::Hash,
            Value::Set(_) => ValueKind::Set,
            Value::ZSet(_) => ValueKind::ZSet,
        }
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            Value::String(StringValue::Int(_)) => Encoding::Int,
            Value::String(StringValue::Raw(_)) => Encoding::Raw,
            Value::List(l) => l.encoding(),
            Value::Hash(h) => h.encoding(),
            Value::Set(s) => s.encoding(),
            Value::ZSet(z) => z.encoding(),
        }
    }

    /// 元素个数，String 视为 1
    pub fn len(&self) -> usize {
        match self {
            Value::String(_) => 1,
            Value::List(l) => l.len(),
            Value::Hash(h) => h.len(),
            Value::Set(s) => s.len(),
            Value::ZSet(z) => z.len(),
        }
    }

    accessors!(as_string, as_string_mut, String, StringValue);
    accessors!(as_list, as_list_mut, List, ListValue);
    accessors!(as_hash, as_hash_mut, Hash, HashValue);
    accessors!(as_set, as_set_mut, Set, SetValue);
    accessors!(as_zset, as_zset_mut, ZSet, ZSetValue);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_and_encoding() {
        let s = Value::String(StringValue::from_bytes(b"42"));
        assert_eq!(s.kind(), ValueKind::String);
        assert_eq!(s.encoding(), Encoding::Int);

        let h = Value::Hash(HashValue::new());
        assert_eq!(h.encoding().as_str(), "ziplist");
        assert!(matches!(h.as_set(), Err(KvError::WrongType)));
        assert!(h.as_hash().is_ok());
        assert_eq!(Value::Set(SetValue::with_capacity(4)).encoding(), Encoding::HashTable);
    }
}
