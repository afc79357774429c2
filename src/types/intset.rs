// src/types/intset.rs

//! 有序整数数组（与 Redis intset 二进制格式兼容）
//!
//! `<encoding u32 LE> <length u32 LE> <contents>`，元素按升序存放，
//! 宽度为 2/4/8 字节之一；插入更宽的值时整体升级，不会降级。

use crate::error::{KvError, Result};

const ENC_INT16: u32 = 2;
const ENC_INT32: u32 = 4;
const ENC_INT64: u32 = 8;
const HEADER_SIZE: usize = 8;

fn width_for(value: i64) -> u32 {
    if i16::try_from(value).is_ok() {
        ENC_INT16
    } else if i32::try_from(value).is_ok() {
        ENC_INT32
    } else {
        ENC_INT64
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intset {
    encoding: u32,
    contents: Vec<i64>,
}

impl Default for Intset {
    fn default() -> Self {
        Self::new()
    }
}

impl Intset {
    pub fn new() -> Self {
        Intset { encoding: ENC_INT16, contents: Vec::new() }
    }

    /// 解析快照中的二进制块：宽度、长度、升序且无重复都要检查
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        if blob.len() < HEADER_SIZE {
            return Err(KvError::corrupt("intset shorter than its header"));
        }
        let encoding = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
        let length = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]) as usize;
        if !matches!(encoding, ENC_INT16 | ENC_INT32 | ENC_INT64) {
            return Err(KvError::corrupt(format!("intset has invalid encoding {}", encoding)));
        }
        let width = encoding as usize;
        let body = &blob[HEADER_SIZE..];
        if length.checked_mul(width) != Some(body.len()) {
            return Err(KvError::corrupt("intset length does not match blob size"));
        }

        let contents: Vec<i64> = body
            .chunks_exact(width)
            .map(|c| match width {
                2 => i16::from_le_bytes([c[0], c[1]]) as i64,
                4 => i32::from_le_bytes([c[0], c[1], c[2], c[3]]) as i64,
                _ => i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]),
            })
            .collect();
        if contents.windows(2).any(|w| w[0] >= w[1]) {
            return Err(KvError::corrupt("intset is not strictly ascending"));
        }
        Ok(Intset { encoding, contents })
    }

    /// 序列化为快照格式
    pub fn to_bytes(&self) -> Vec<u8> {
        let width = self.encoding as usize;
        let mut out = Vec::with_capacity(HEADER_SIZE + width * self.contents.len());
        out.extend_from_slice(&self.encoding.to_le_bytes());
        out.extend_from_slice(&(self.contents.len() as u32).to_le_bytes());
        for &v in &self.contents {
            match self.encoding {
                ENC_INT16 => out.extend_from_slice(&(v as i16).to_le_bytes()),
                ENC_INT32 => out.extend_from_slice(&(v as i32).to_le_bytes()),
                _ => out.extend_from_slice(&v.to_le_bytes()),
            }
        }
        out
    }

    /// 元素宽度（字节）
    pub fn encoding(&self) -> u32 {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn contains(&self, value: i64) -> bool {
        width_for(value) <= self.encoding && self.contents.binary_search(&value).is_ok()
    }

    /// 插入，返回是否真的新增
    pub fn add(&mut self, value: i64) -> bool {
        match self.contents.binary_search(&value) {
            Ok(_) => false,
            Err(pos) => {
                self.encoding = self.encoding.max(width_for(value));
                self.contents.insert(pos, value);
                true
            }
        }
    }

    pub fn remove(&mut self, value: i64) -> bool {
        match self.contents.binary_search(&value) {
            Ok(pos) => {
                self.contents.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = i64> + '_ {
        self.contents.iter().copied()
    }

    pub fn blob_len(&self) -> usize {
        HEADER_SIZE + self.encoding as usize * self.contents.len()
    }
}
