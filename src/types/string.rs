// src/types/string.rs

//! 动态字符串 `ByteBuffer` 以及 String 类型的值对象
//!
//! `ByteBuffer` 是二进制安全的可增长缓冲区：
//! - `len()` 为 O(1)
//! - 追加操作按「预分配」策略扩容，摊还 O(1)
//! - 内部保持 `buf.len() == len + free`，空闲部分可以被调用方直接写入，
//!   再通过 `commit_extra_len` 提交
//!
//! 本模块还提供 String 值的两种编码（整数 / 原始字节）以及
//! SET/GET/DEL/INCRBY 这几个薄封装命令。

use std::borrow::{Borrow, Cow};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;

use crate::engine::MemoryKeyspace;
use crate::error::{KvError, Result};
use crate::object::Value;

/// 小于该值时按 2 倍扩容，否则每次多分配 1 MiB
pub const MAX_PREALLOC: usize = 1024 * 1024;

/// 二进制安全的动态字符串
#[derive(Default)]
pub struct ByteBuffer {
    len: usize,
    buf: Vec<u8>,
}

impl ByteBuffer {
    /// 创建空字符串，不分配内存
    pub fn new() -> Self {
        ByteBuffer { len: 0, buf: Vec::new() }
    }

    /// 按给定内容创建，空闲空间为 0
    pub fn from_bytes(init: &[u8]) -> Self {
        ByteBuffer { len: init.len(), buf: init.to_vec() }
    }

    /// 整数的十进制表示
    pub fn from_i64(value: i64) -> Self {
        Self::from_bytes(value.to_string().as_bytes())
    }

    /// 复制内容，新副本不携带空闲空间
    pub fn duplicate(&self) -> Self {
        Self::from_bytes(self.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// 尾部尚未使用的字节数
    pub fn free(&self) -> usize {
        self.buf.len() - self.len
    }

    /// 已分配的总字节数（内容 + 空闲）
    pub fn alloc_size(&self) -> usize {
        self.buf.len()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.buf[..self.len]
    }

    pub fn into_vec(mut self) -> Vec<u8> {
        self.buf.truncate(self.len);
        self.buf
    }

    /// 逻辑清空，保留已分配的空间
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// 保证至少还有 `addlen` 字节空闲
    pub fn reserve_for_append(&mut self, addlen: usize) {
        if self.free() >= addlen {
            return;
        }
        let mut newlen = self.len + addlen;
        if newlen < MAX_PREALLOC {
            newlen *= 2;
        } else {
            newlen += MAX_PREALLOC;
        }
        self.buf.resize(newlen, 0);
    }

    /// 回收全部空闲空间
    pub fn shrink_to_fit(&mut self) {
        self.buf.truncate(self.len);
        self.buf.shrink_to_fit();
    }

    /// 空闲区域，配合 `commit_extra_len` 使用
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.len..]
    }

    /// 调用方已直接写入空闲区域后，调整长度；负数表示从右侧截断
    pub fn commit_extra_len(&mut self, incr: isize) -> Result<()> {
        let err = || KvError::InvalidLength { incr, len: self.len, free: self.free() };
        if incr >= 0 {
            let n = incr as usize;
            if n > self.free() {
                return Err(err());
            }
            self.len += n;
        } else {
            let n = incr.unsigned_abs();
            if n > self.len {
                return Err(err());
            }
            self.len -= n;
        }
        Ok(())
    }

    /// 扩展到 `len` 字节，新增部分填 0；`len` 不大于当前长度时什么都不做
    pub fn grow_zero(&mut self, len: usize) {
        if len <= self.len {
            return;
        }
        self.reserve_for_append(len - self.len);
        self.buf[self.len..len].fill(0);
        self.len = len;
    }

    pub fn append(&mut self, data: &[u8]) {
        self.reserve_for_append(data.len());
        self.buf[self.len..self.len + data.len()].copy_from_slice(data);
        self.len += data.len();
    }

    /// 用 `data` 覆盖原内容
    pub fn assign(&mut self, data: &[u8]) {
        if self.buf.len() < data.len() {
            self.reserve_for_append(data.len() - self.len);
        }
        self.buf[..data.len()].copy_from_slice(data);
        self.len = data.len();
    }

    /// 去掉首尾连续出现在 `cset` 中的字节
    pub fn trim(&mut self, cset: &[u8]) {
        let bytes = self.as_bytes();
        let start = bytes.iter().position(|b| !cset.contains(b)).unwrap_or(bytes.len());
        let end = bytes.iter().rposition(|b| !cset.contains(b)).map_or(start, |p| p + 1);
        let newlen = end.saturating_sub(start);
        if start > 0 && newlen > 0 {
            self.buf.copy_within(start..end, 0);
        }
        self.len = newlen;
    }

    /// 只保留闭区间 `[start, end]`，负数下标从尾部计数，越界自动截断
    pub fn slice_range(&mut self, start: isize, end: isize) {
        let len = self.len as isize;
        if len == 0 {
            return;
        }
        let mut start = if start < 0 { (len + start).max(0) } else { start };
        let mut end = if end < 0 { (len + end).max(0) } else { end };
        let mut newlen = if start > end { 0 } else { end - start + 1 };
        if newlen != 0 {
            if start >= len {
                newlen = 0;
            } else if end >= len {
                end = len - 1;
                newlen = if start > end { 0 } else { end - start + 1 };
            }
        } else {
            start = 0;
        }
        let (start, newlen) = (start as usize, newlen as usize);
        if start > 0 && newlen > 0 {
            self.buf.copy_within(start..start + newlen, 0);
        }
        self.len = newlen;
    }

    pub fn to_lower(&mut self) {
        self.as_bytes_mut().make_ascii_lowercase();
    }

    pub fn to_upper(&mut self) {
        self.as_bytes_mut().make_ascii_uppercase();
    }

    /// 把出现在 `from` 中的字节替换成 `to` 中相同位置的字节
    pub fn map_chars(&mut self, from: &[u8], to: &[u8]) {
        let setlen = from.len().min(to.len());
        for b in self.as_bytes_mut() {
            if let Some(i) = from[..setlen].iter().position(|c| c == b) {
                *b = to[i];
            }
        }
    }

    /// 按分隔符切分，分隔符为空时返回 `None`
    pub fn split(data: &[u8], sep: &[u8]) -> Option<Vec<ByteBuffer>> {
        if sep.is_empty() {
            return None;
        }
        let mut tokens = Vec::new();
        if data.is_empty() {
            return Some(tokens);
        }
        let mut start = 0;
        let mut j = 0;
        while j + sep.len() <= data.len() {
            if &data[j..j + sep.len()] == sep {
                tokens.push(ByteBuffer::from_bytes(&data[start..j]));
                start = j + sep.len();
                j = start;
            } else {
                j += 1;
            }
        }
        tokens.push(ByteBuffer::from_bytes(&data[start..]));
        Some(tokens)
    }

    /// 追加带引号、转义过的可打印表示
    pub fn append_repr(&mut self, data: &[u8]) {
        self.append(b"\"");
        for &b in data {
            match b {
                b'\\' => self.append(b"\\\\"),
                b'"' => self.append(b"\\\""),
                b'\n' => self.append(b"\\n"),
                b'\r' => self.append(b"\\r"),
                b'\t' => self.append(b"\\t"),
                0x07 => self.append(b"\\a"),
                0x08 => self.append(b"\\b"),
                0x20..=0x7e => self.append(&[b]),
                _ => self.append(format!("\\x{:02x}", b).as_bytes()),
            }
        }
        self.append(b"\"");
    }

    /// 类 shell 的参数切分，支持双引号（含 `\xHH` 转义）与单引号；
    /// 引号不配对或闭合引号后紧跟非空白字符时返回 `None`
    pub fn split_args(line: &[u8]) -> Option<Vec<ByteBuffer>> {
        let at = |i: usize| line.get(i).copied().unwrap_or(0);
        let mut args = Vec::new();
        let mut p = 0;
        loop {
            while p < line.len() && line[p].is_ascii_whitespace() {
                p += 1;
            }
            if p >= line.len() || line[p] == 0 {
                return Some(args);
            }

            let mut current = ByteBuffer::new();
            let (mut inq, mut insq, mut done) = (false, false, false);
            while !done {
                let c = at(p);
                if inq {
                    if c == b'\\'
                        && at(p + 1) == b'x'
                        && at(p + 2).is_ascii_hexdigit()
                        && at(p + 3).is_ascii_hexdigit()
                    {
                        let byte = (hex_value(at(p + 2)) << 4) | hex_value(at(p + 3));
                        current.append(&[byte]);
                        p += 3;
                    } else if c == b'\\' && at(p + 1) != 0 {
                        p += 1;
                        let escaped = match at(p) {
                            b'n' => b'\n',
                            b'r' => b'\r',
                            b't' => b'\t',
                            b'b' => 0x08,
                            b'a' => 0x07,
                            other => other,
                        };
                        current.append(&[escaped]);
                    } else if c == b'"' {
                        if at(p + 1) != 0 && !at(p + 1).is_ascii_whitespace() {
                            return None;
                        }
                        done = true;
                    } else if c == 0 {
                        return None;
                    } else {
                        current.append(&[c]);
                    }
                } else if insq {
                    if c == b'\\' && at(p + 1) == b'\'' {
                        p += 1;
                        current.append(b"'");
                    } else if c == b'\'' {
                        if at(p + 1) != 0 && !at(p + 1).is_ascii_whitespace() {
                            return None;
                        }
                        done = true;
                    } else if c == 0 {
                        return None;
                    } else {
                        current.append(&[c]);
                    }
                } else {
                    match c {
                        b' ' | b'\n' | b'\r' | b'\t' | 0 => done = true,
                        b'"' => inq = true,
                        b'\'' => insq = true,
                        _ => current.append(&[c]),
                    }
                }
                if p < line.len() {
                    p += 1;
                }
            }
            args.push(current);
        }
    }

    /// 用分隔符连接
    pub fn join<T: AsRef<[u8]>>(parts: &[T], sep: &[u8]) -> ByteBuffer {
        let mut out = ByteBuffer::new();
        for (i, part) in parts.iter().enumerate() {
            out.append(part.as_ref());
            if i + 1 != parts.len() {
                out.append(sep);
            }
        }
        out
    }
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        b'A'..=b'F' => c - b'A' + 10,
        _ => 0,
    }
}

impl Clone for ByteBuffer {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

impl Deref for ByteBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Borrow<[u8]> for ByteBuffer {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteBuffer {}

impl Hash for ByteBuffer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

/// 先按字节内容比较，公共前缀相同时短者在前
impl Ord for ByteBuffer {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl PartialOrd for ByteBuffer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut repr = ByteBuffer::new();
        repr.append_repr(self.as_bytes());
        f.write_str(&String::from_utf8_lossy(repr.as_bytes()))
    }
}

impl fmt::Write for ByteBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.append(s.as_bytes());
        Ok(())
    }
}

impl From<&[u8]> for ByteBuffer {
    fn from(v: &[u8]) -> Self {
        ByteBuffer::from_bytes(v)
    }
}

impl From<&str> for ByteBuffer {
    fn from(v: &str) -> Self {
        ByteBuffer::from_bytes(v.as_bytes())
    }
}

impl From<Vec<u8>> for ByteBuffer {
    fn from(v: Vec<u8>) -> Self {
        ByteBuffer { len: v.len(), buf: v }
    }
}

impl From<String> for ByteBuffer {
    fn from(v: String) -> Self {
        ByteBuffer::from(v.into_bytes())
    }
}

impl<'a> From<Cow<'a, [u8]>> for ByteBuffer {
    fn from(v: Cow<'a, [u8]>) -> Self {
        ByteBuffer::from(v.into_owned())
    }
}

// ---------------------------------------------------------------------------
// 数值辅助
// ---------------------------------------------------------------------------

/// 严格解析十进制 i64：重新渲染后必须与输入逐字节相同
/// （拒绝 "+5"、"007"、" 5"、"-0" 等）
pub fn parse_canonical_i64(s: &[u8]) -> Option<i64> {
    if s.is_empty() || s.len() > 20 {
        return None;
    }
    let text = std::str::from_utf8(s).ok()?;
    let value: i64 = text.parse().ok()?;
    if value.to_string().as_bytes() == s { Some(value) } else { None }
}

/// 浮点数的 ASCII 表示：±2^52 以内的整数按整数输出，否则 `%.17g`
pub fn format_double(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf".to_string() } else { "-inf".to_string() };
    }
    const MIN: f64 = -4503599627370495.0;
    const MAX: f64 = 4503599627370496.0;
    if value > MIN && value < MAX && value == (value as i64) as f64 {
        return (value as i64).to_string();
    }
    format_g17(value)
}

/// C 语言 `%.17g` 的等价实现
fn format_g17(value: f64) -> String {
    const PRECISION: i32 = 17;
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= PRECISION {
        let mantissa = trim_fraction(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let fixed = format!("{:.*}", (PRECISION - 1 - exp) as usize, value);
        trim_fraction(&fixed).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// 解析 `format_double` 的输出（也接受 inf / -inf / nan）
pub fn parse_double(s: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(s).ok()?;
    match text {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

// ---------------------------------------------------------------------------
// String 值对象
// ---------------------------------------------------------------------------

/// String 类型的两种编码
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StringValue {
    /// 可以无损表示为 i64 的短字符串
    Int(i64),
    Raw(ByteBuffer),
}

impl StringValue {
    /// 不大于 20 字节且是规范十进制整数时使用整数编码
    pub fn from_bytes(data: &[u8]) -> Self {
        match parse_canonical_i64(data) {
            Some(v) => StringValue::Int(v),
            None => StringValue::Raw(ByteBuffer::from_bytes(data)),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StringValue::Int(v) => v.to_string().len(),
            StringValue::Raw(b) => b.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 返回内容；整数编码会被渲染成十进制
    pub fn to_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            StringValue::Int(v) => Cow::Owned(v.to_string().into_bytes()),
            StringValue::Raw(b) => Cow::Borrowed(b.as_bytes()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StringValue::Int(v) => Some(*v),
            StringValue::Raw(b) => parse_canonical_i64(b),
        }
    }
}

/// SET key value → "OK"
pub fn set(ks: &mut MemoryKeyspace, db: usize, key: &[u8], value: &[u8]) -> Result<String> {
    ks.overwrite(db, key, Value::String(StringValue::from_bytes(value)))?;
    Ok("OK".to_string())
}

/// GET key → 值；key 不存在时返回 None，类型不符返回 WrongType
pub fn get(ks: &MemoryKeyspace, db: usize, key: &[u8]) -> Result<Option<ByteBuffer>> {
    match ks.get_value(db, key)? {
        None => Ok(None),
        Some(v) => Ok(Some(ByteBuffer::from(v.as_string()?.to_bytes()))),
    }
}

/// DEL key → 是否真的删除了
pub fn del(ks: &mut MemoryKeyspace, db: usize, key: &[u8]) -> Result<bool> {
    ks.remove(db, key)
}

/// INCRBY key delta，key 不存在时视为 0
pub fn incr_by(ks: &mut MemoryKeyspace, db: usize, key: &[u8], delta: i64) -> Result<i64> {
    let old = match ks.get_value(db, key)? {
        None => 0,
        Some(v) => v
            .as_string()?
            .as_i64()
            .ok_or_else(|| KvError::Command("value is not an integer or out of range".into()))?,
    };
    let new = old
        .checked_add(delta)
        .ok_or_else(|| KvError::Command("increment or decrement would overflow".into()))?;
    ks.overwrite_keep_ttl(db, key, Value::String(StringValue::Int(new)))?;
    Ok(new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt::Write;

    #[test]
    fn test_append_and_growth_policy() {
        let mut s = ByteBuffer::new();
        s.append(b"foo");
        // 2 * (0 + 3)
        assert_eq!(s.alloc_size(), 6);
        assert_eq!(s.free(), 3);

        s.reserve_for_append(10);
        assert!(s.free() >= 10);
        assert_eq!(s.alloc_size(), 26);
        assert_eq!(s.as_bytes(), b"foo");

        let mut big = ByteBuffer::new();
        big.reserve_for_append(MAX_PREALLOC);
        assert_eq!(big.alloc_size(), 2 * MAX_PREALLOC);
        big.grow_zero(MAX_PREALLOC);
        big.reserve_for_append(MAX_PREALLOC * 2);
        assert_eq!(big.alloc_size(), 3 * MAX_PREALLOC + MAX_PREALLOC);
    }

    #[test]
    fn test_binary_safe() {
        let mut s = ByteBuffer::from_bytes(b"a\0b");
        s.append(b"\0");
        assert_eq!(s.len(), 4);
        assert_eq!(s.as_bytes(), b"a\0b\0");
    }

    #[test]
    fn test_clear_keeps_capacity_and_assign() {
        let mut s = ByteBuffer::from("hello world");
        let cap = s.alloc_size();
        s.clear();
        assert!(s.is_empty());
        assert_eq!(s.alloc_size(), cap);

        s.assign(b"a much longer replacement string");
        assert_eq!(s.as_bytes(), b"a much longer replacement string");
        s.assign(b"x");
        assert_eq!(s.as_bytes(), b"x");
    }

    #[test]
    fn test_commit_extra_len() {
        let mut s = ByteBuffer::from("ab");
        s.reserve_for_append(4);
        s.spare_mut()[..2].copy_from_slice(b"cd");
        s.commit_extra_len(2).unwrap();
        assert_eq!(s.as_bytes(), b"abcd");

        s.commit_extra_len(-1).unwrap();
        assert_eq!(s.as_bytes(), b"abc");

        let free = s.free() as isize;
        assert!(s.commit_extra_len(free + 1).is_err());
        assert!(s.commit_extra_len(-4).is_err());
        assert_eq!(s.as_bytes(), b"abc", "失败的调整不改变内容");
    }

    #[test]
    fn test_trim() {
        let mut s = ByteBuffer::from("xxciaoyyy");
        s.trim(b"xy");
        assert_eq!(s.as_bytes(), b"ciao");

        let mut all = ByteBuffer::from("xyxy");
        all.trim(b"xy");
        assert!(all.is_empty());
    }

    #[test]
    fn test_slice_range() {
        let cases: &[(isize, isize, &[u8])] = &[
            (1, 1, b"i"),
            (1, -1, b"iao"),
            (-2, -1, b"ao"),
            (2, 1, b""),
            (1, 100, b"iao"),
            (100, 100, b""),
            (0, 0, b"c"),
        ];
        for (start, end, expected) in cases {
            let mut s = ByteBuffer::from("ciao");
            s.slice_range(*start, *end);
            assert_eq!(s.as_bytes(), *expected, "range {} {}", start, end);
        }
    }

    #[test]
    fn test_compare() {
        let a = ByteBuffer::from("foo");
        let b = ByteBuffer::from("foobar");
        assert!(a < b);
        assert!(ByteBuffer::from("bar") < ByteBuffer::from("foo"));
        assert_eq!(ByteBuffer::from("aar").cmp(&ByteBuffer::from("aar")), Ordering::Equal);
        assert!(ByteBuffer::from("b") > ByteBuffer::from("abc"));
    }

    #[test]
    fn test_case_and_map_chars() {
        let mut s = ByteBuffer::from("hello");
        s.map_chars(b"ho", b"01");
        assert_eq!(s.as_bytes(), b"0ell1");
        s.to_upper();
        assert_eq!(s.as_bytes(), b"0ELL1");
        s.to_lower();
        assert_eq!(s.as_bytes(), b"0ell1");
    }

    #[test]
    fn test_split_and_join() {
        let parts = ByteBuffer::split(b"a--b----c", b"--").unwrap();
        let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_bytes()).collect();
        assert_eq!(parts, vec![&b"a"[..], b"b", b"", b"c"]);
        assert!(ByteBuffer::split(b"abc", b"").is_none());
        assert!(ByteBuffer::split(b"", b",").unwrap().is_empty());

        let joined = ByteBuffer::join(&["a", "b", "c"], b", ");
        assert_eq!(joined.as_bytes(), b"a, b, c");
    }

    #[test]
    fn test_repr_and_split_args_agree() {
        let mut repr = ByteBuffer::new();
        repr.append_repr(b"a\"b\n\x01\\");
        assert_eq!(repr.as_bytes(), b"\"a\\\"b\\n\\x01\\\\\"");

        let args = ByteBuffer::split_args(repr.as_bytes()).unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0].as_bytes(), b"a\"b\n\x01\\");
    }

    #[test]
    fn test_split_args() {
        let args = ByteBuffer::split_args(b"set  key 'it\\'s' \"\\xff\\x00z\"").unwrap();
        let args: Vec<&[u8]> = args.iter().map(|a| a.as_bytes()).collect();
        assert_eq!(args, vec![&b"set"[..], b"key", b"it's", b"\xff\x00z"]);

        assert!(ByteBuffer::split_args(b"").unwrap().is_empty());
        assert!(ByteBuffer::split_args(b"\"unterminated").is_none());
        assert!(ByteBuffer::split_args(b"\"foo\"bar").is_none());
    }

    #[test]
    fn test_fmt_write() {
        let mut s = ByteBuffer::from("n=");
        write!(s, "{}:{}", 42, "x").unwrap();
        assert_eq!(s.as_bytes(), b"n=42:x");
    }

    #[test]
    fn test_parse_canonical_i64() {
        assert_eq!(parse_canonical_i64(b"12345"), Some(12345));
        assert_eq!(parse_canonical_i64(b"-7"), Some(-7));
        assert_eq!(parse_canonical_i64(b"0"), Some(0));
        for bad in [&b"+5"[..], b"007", b" 5", b"5 ", b"-0", b"", b"1e3", b"99999999999999999999"] {
            assert_eq!(parse_canonical_i64(bad), None, "{:?}", bad);
        }
    }

    #[test]
    fn test_format_double() {
        assert_eq!(format_double(3.0), "3");
        assert_eq!(format_double(-12.0), "-12");
        assert_eq!(format_double(1.5), "1.5");
        assert_eq!(format_double(0.1), "0.10000000000000001");
        assert_eq!(format_double(1e20), "1e+20");
        assert_eq!(format_double(f64::MAX), "1.7976931348623157e+308");
        for v in [0.1, 1.0 / 3.0, -2.5e300, 6.02214076e23, 1e-310] {
            let s = format_double(v);
            assert_eq!(parse_double(s.as_bytes()), Some(v), "{}", s);
        }
        assert_eq!(parse_double(b"inf"), Some(f64::INFINITY));
        assert!(parse_double(b"nan").unwrap().is_nan());
    }

    #[test]
    fn test_string_value_encoding() {
        assert_eq!(StringValue::from_bytes(b"123"), StringValue::Int(123));
        assert!(matches!(StringValue::from_bytes(b"0123"), StringValue::Raw(_)));
        assert_eq!(StringValue::Int(-5).to_bytes().as_ref(), b"-5");
        assert_eq!(StringValue::Int(-5).len(), 2);
    }
}
