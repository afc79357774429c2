// src/types/ziplist.rs

//! 紧凑的顺序记录表（与 Redis ziplist 二进制格式兼容）
//!
//! 布局：
//! ```text
//! <zlbytes u32 LE> <zltail u32 LE> <zllen u16 LE> <entry>... <0xFF>
//! entry = <prevlen 1|5 字节> <encoding> <data>
//! ```
//! 快照直接把整个缓冲区作为一个字符串写出，所以这里的字节布局必须精确。
//! 所有修改都走 `splice`：从变更位置开始重新编码尾部，
//! 不做原地级联更新。

use std::borrow::Cow;

use crate::error::{KvError, Result};
use crate::types::string::parse_canonical_i64;

const HEADER_SIZE: usize = 10;
const END: u8 = 0xFF;
const BIG_PREVLEN: u8 = 254;
const ZLLEN_SATURATED: u16 = u16::MAX;

const STR_06B: u8 = 0x00;
const STR_14B: u8 = 0x40;
const STR_32B: u8 = 0x80;
const INT_16B: u8 = 0xC0;
const INT_32B: u8 = 0xD0;
const INT_64B: u8 = 0xE0;
const INT_24B: u8 = 0xF0;
const INT_8B: u8 = 0xFE;
const INT_IMM_MIN: u8 = 0xF1;
const INT_IMM_MAX: u8 = 0xFD;

/// 超过这个长度的字符串不尝试整数编码
const MAX_INT_CANDIDATE_LEN: usize = 32;

/// 表中的一个元素：字符串或整数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZlEntry<'a> {
    Bytes(&'a [u8]),
    Int(i64),
}

impl<'a> ZlEntry<'a> {
    /// 取得字节表示，整数会被渲染成十进制
    pub fn to_bytes(&self) -> Cow<'a, [u8]> {
        match *self {
            ZlEntry::Bytes(b) => Cow::Borrowed(b),
            ZlEntry::Int(v) => Cow::Owned(v.to_string().into_bytes()),
        }
    }

    /// 字节表示的长度（用于阈值判断）
    pub fn byte_len(&self) -> usize {
        match self {
            ZlEntry::Bytes(b) => b.len(),
            ZlEntry::Int(v) => v.to_string().len(),
        }
    }

    /// 与给定字节串比较是否相等
    pub fn eq_bytes(&self, other: &[u8]) -> bool {
        match *self {
            ZlEntry::Bytes(b) => b == other,
            ZlEntry::Int(v) => parse_canonical_i64(other) == Some(v),
        }
    }
}

/// 解析出的单个 entry 的头部信息
#[derive(Debug, Clone, Copy)]
struct RawEntry {
    prevlen_size: usize,
    prevlen: usize,
    header_size: usize,
    data_len: usize,
    int: Option<i64>,
}

impl RawEntry {
    fn total_len(&self) -> usize {
        self.prevlen_size + self.header_size + self.data_len
    }
}

fn read_le(bytes: &[u8]) -> u64 {
    bytes.iter().rev().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// 在 `pos` 处解析 entry，越界或编码非法时返回 None
fn parse_entry(buf: &[u8], pos: usize) -> Option<RawEntry> {
    let first = *buf.get(pos)?;
    if first == END {
        return None;
    }
    let (prevlen_size, prevlen) = if first < BIG_PREVLEN {
        (1, first as usize)
    } else if first == BIG_PREVLEN {
        (5, read_le(buf.get(pos + 1..pos + 5)?) as usize)
    } else {
        return None;
    };

    let p = pos + prevlen_size;
    let enc = *buf.get(p)?;
    let (header_size, data_len, int) = match enc {
        INT_16B => (1, 2, None),
        INT_32B => (1, 4, None),
        INT_64B => (1, 8, None),
        INT_24B => (1, 3, None),
        INT_8B => (1, 1, None),
        INT_IMM_MIN..=INT_IMM_MAX => (1, 0, Some(((enc & 0x0F) - 1) as i64)),
        _ => match enc & 0xC0 {
            STR_06B => (1, (enc & 0x3F) as usize, None),
            STR_14B => {
                let next = *buf.get(p + 1)? as usize;
                (2, (((enc & 0x3F) as usize) << 8) | next, None)
            }
            STR_32B => {
                let b = buf.get(p + 1..p + 5)?;
                (5, u32::from_be_bytes([b[0], b[1], b[2], b[3]]) as usize, None)
            }
            _ => return None,
        },
    };

    let data_start = p + header_size;
    let data = buf.get(data_start..data_start.checked_add(data_len)?)?;
    let int = match enc {
        INT_16B => Some(i16::from_le_bytes([data[0], data[1]]) as i64),
        INT_32B => Some(i32::from_le_bytes([data[0], data[1], data[2], data[3]]) as i64),
        INT_64B => {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(data);
            Some(i64::from_le_bytes(raw))
        }
        // 24 位：放进 i32 的高 24 位再算术右移完成符号扩展
        INT_24B => Some((i32::from_le_bytes([0, data[0], data[1], data[2]]) >> 8) as i64),
        INT_8B => Some(data[0] as i8 as i64),
        _ => int,
    };

    Some(RawEntry { prevlen_size, prevlen, header_size, data_len, int })
}

fn entry_value<'a>(buf: &'a [u8], pos: usize, raw: &RawEntry) -> ZlEntry<'a> {
    match raw.int {
        Some(v) => ZlEntry::Int(v),
        None => {
            let start = pos + raw.prevlen_size + raw.header_size;
            ZlEntry::Bytes(&buf[start..start + raw.data_len])
        }
    }
}

fn encode_prevlen(out: &mut Vec<u8>, prevlen: usize) {
    if prevlen < BIG_PREVLEN as usize {
        out.push(prevlen as u8);
    } else {
        out.push(BIG_PREVLEN);
        out.extend_from_slice(&(prevlen as u32).to_le_bytes());
    }
}

/// 编码 entry 的 encoding + data 部分（不含 prevlen）
fn encode_body(out: &mut Vec<u8>, value: &[u8]) {
    let int = if value.len() <= MAX_INT_CANDIDATE_LEN { parse_canonical_i64(value) } else { None };
    match int {
        Some(v) => encode_int_body(out, v),
        None => {
            let len = value.len();
            if len <= 0x3F {
                out.push(STR_06B | len as u8);
            } else if len <= 0x3FFF {
                out.push(STR_14B | ((len >> 8) as u8 & 0x3F));
                out.push((len & 0xFF) as u8);
            } else {
                out.push(STR_32B);
                out.extend_from_slice(&(len as u32).to_be_bytes());
            }
            out.extend_from_slice(value);
        }
    }
}

fn encode_int_body(out: &mut Vec<u8>, v: i64) {
    if (0..=12).contains(&v) {
        out.push(INT_IMM_MIN + v as u8);
    } else if i8::try_from(v).is_ok() {
        out.push(INT_8B);
        out.push(v as i8 as u8);
    } else if i16::try_from(v).is_ok() {
        out.push(INT_16B);
        out.extend_from_slice(&(v as i16).to_le_bytes());
    } else if (-(1 << 23)..(1 << 23)).contains(&v) {
        out.push(INT_24B);
        out.extend_from_slice(&(v as i32).to_le_bytes()[..3]);
    } else if i32::try_from(v).is_ok() {
        out.push(INT_32B);
        out.extend_from_slice(&(v as i32).to_le_bytes());
    } else {
        out.push(INT_64B);
        out.extend_from_slice(&v.to_le_bytes());
    }
}

/// 紧凑顺序表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ziplist {
    buf: Vec<u8>,
    count: usize,
}

impl Default for Ziplist {
    fn default() -> Self {
        Self::new()
    }
}

impl Ziplist {
    pub fn new() -> Self {
        let mut zl = Ziplist { buf: Vec::with_capacity(HEADER_SIZE + 1), count: 0 };
        zl.buf.extend_from_slice(&[0u8; HEADER_SIZE]);
        zl.buf.push(END);
        zl.write_header(HEADER_SIZE);
        zl
    }

    /// 从快照里读到的二进制块构造，会完整校验结构
    pub fn from_bytes(blob: Vec<u8>) -> Result<Self> {
        if blob.len() < HEADER_SIZE + 1 {
            return Err(KvError::corrupt("ziplist shorter than its header"));
        }
        let zlbytes = read_le(&blob[0..4]) as usize;
        let zltail = read_le(&blob[4..8]) as usize;
        let zllen = read_le(&blob[8..10]) as u16;
        if zlbytes != blob.len() {
            return Err(KvError::corrupt(format!(
                "ziplist declares {} bytes but blob has {}",
                zlbytes,
                blob.len()
            )));
        }

        let mut pos = HEADER_SIZE;
        let mut prev_len = 0;
        let mut last = HEADER_SIZE;
        let mut count = 0usize;
        while blob.get(pos) != Some(&END) {
            let raw = parse_entry(&blob, pos)
                .ok_or_else(|| KvError::corrupt(format!("malformed ziplist entry at offset {}", pos)))?;
            if raw.prevlen != prev_len {
                return Err(KvError::corrupt(format!("ziplist prevlen mismatch at offset {}", pos)));
            }
            last = pos;
            prev_len = raw.total_len();
            pos += prev_len;
            count += 1;
        }
        if pos != blob.len() - 1 {
            return Err(KvError::corrupt("ziplist end marker not at the end of the blob"));
        }
        if zltail != last {
            return Err(KvError::corrupt("ziplist tail offset mismatch"));
        }
        if zllen != ZLLEN_SATURATED && zllen as usize != count {
            return Err(KvError::corrupt("ziplist length mismatch"));
        }
        Ok(Ziplist { buf: blob, count })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// 序列化后的字节数
    pub fn blob_len(&self) -> usize {
        self.buf.len()
    }

    pub fn iter(&self) -> ZiplistIter<'_> {
        ZiplistIter { buf: &self.buf, pos: HEADER_SIZE }
    }

    pub fn get(&self, index: usize) -> Option<ZlEntry<'_>> {
        self.iter().nth(index)
    }

    /// 从下标 0 开始，每 `step` 个元素比较一次，返回第一个相等元素的下标
    pub fn find(&self, value: &[u8], step: usize) -> Option<usize> {
        self.iter()
            .enumerate()
            .step_by(step.max(1))
            .find(|(_, e)| e.eq_bytes(value))
            .map(|(i, _)| i)
    }

    /// 所有元素中最长的字节表示
    pub fn max_entry_len(&self) -> usize {
        self.iter().map(|e| e.byte_len()).max().unwrap_or(0)
    }

    pub fn push_back(&mut self, value: &[u8]) {
        self.splice(self.count, 0, &[value]);
    }

    pub fn push_front(&mut self, value: &[u8]) {
        self.splice(0, 0, &[value]);
    }

    pub fn insert(&mut self, index: usize, value: &[u8]) {
        self.splice(index.min(self.count), 0, &[value]);
    }

    pub fn replace(&mut self, index: usize, value: &[u8]) {
        if index < self.count {
            self.splice(index, 1, &[value]);
        }
    }

    pub fn delete_range(&mut self, index: usize, count: usize) {
        if index < self.count {
            self.splice(index, count.min(self.count - index), &[]);
        }
    }

    /// 删除 `[index, index + remove)` 并在同一位置插入 `insert`
    ///
    /// 变更点之前的字节保持不动，之后的 entry 只重写 prevlen。
    pub fn splice(&mut self, index: usize, remove: usize, insert: &[&[u8]]) {
        debug_assert!(index + remove <= self.count);

        // 定位变更起点，以及它前一个 entry 的长度
        let mut start = HEADER_SIZE;
        let mut prev_len = 0;
        for _ in 0..index {
            match parse_entry(&self.buf, start) {
                Some(raw) => {
                    prev_len = raw.total_len();
                    start += prev_len;
                }
                None => break,
            }
        }
        let mut end = start;
        for _ in 0..remove {
            match parse_entry(&self.buf, end) {
                Some(raw) => end += raw.total_len(),
                None => break,
            }
        }

        let mut out = Vec::with_capacity(self.buf.len() + insert.iter().map(|v| v.len() + 11).sum::<usize>());
        out.extend_from_slice(&self.buf[..start]);
        let mut tail = if index > 0 { start - prev_len } else { HEADER_SIZE };

        let mut body = Vec::new();
        for value in insert {
            body.clear();
            encode_body(&mut body, value);
            tail = out.len();
            encode_prevlen(&mut out, prev_len);
            out.extend_from_slice(&body);
            prev_len = out.len() - tail;
        }

        let mut pos = end;
        while let Some(raw) = parse_entry(&self.buf, pos) {
            tail = out.len();
            encode_prevlen(&mut out, prev_len);
            out.extend_from_slice(&self.buf[pos + raw.prevlen_size..pos + raw.total_len()]);
            prev_len = out.len() - tail;
            pos += raw.total_len();
        }
        out.push(END);

        self.count = self.count + insert.len() - remove;
        self.buf = out;
        self.write_header(tail);
    }

    fn write_header(&mut self, tail: usize) {
        let zlbytes = self.buf.len() as u32;
        let zllen = self.count.min(ZLLEN_SATURATED as usize) as u16;
        self.buf[0..4].copy_from_slice(&zlbytes.to_le_bytes());
        self.buf[4..8].copy_from_slice(&(tail as u32).to_le_bytes());
        self.buf[8..10].copy_from_slice(&zllen.to_le_bytes());
    }
}

/// 顺序遍历
pub struct ZiplistIter<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Iterator for ZiplistIter<'a> {
    type Item = ZlEntry<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let raw = parse_entry(self.buf, self.pos)?;
        let value = entry_value(self.buf, self.pos, &raw);
        self.pos += raw.total_len();
        Some(value)
    }
}
