// src/types/zipmap.rs

//! 已废弃的 hash 紧凑编码，只在加载旧快照时读取
//!
//! ```text
//! <zmlen 1 字节> <len>key <len><free>value[free 字节填充] ... <0xFF>
//! len = 1 字节 (< 254) 或 254 + 4 字节 LE
//! ```

use crate::error::{KvError, Result};

const BIGLEN: u8 = 254;
const END: u8 = 0xFF;

/// 解析整个 zipmap，返回 (field, value) 列表
pub fn decode(blob: &[u8]) -> Result<Vec<(&[u8], &[u8])>> {
    let corrupt = || KvError::corrupt("malformed zipmap");
    if blob.is_empty() {
        return Err(corrupt());
    }
    let mut pos = 1;
    let mut pairs = Vec::new();

    loop {
        match blob.get(pos) {
            None => return Err(corrupt()),
            Some(&END) => break,
            Some(_) => {}
        }
        let (klen, n) = read_len(blob, pos).ok_or_else(corrupt)?;
        pos += n;
        let key = blob.get(pos..pos + klen).ok_or_else(corrupt)?;
        pos += klen;

        let (vlen, n) = read_len(blob, pos).ok_or_else(corrupt)?;
        pos += n;
        let free = *blob.get(pos).ok_or_else(corrupt)? as usize;
        pos += 1;
        let value = blob.get(pos..pos + vlen).ok_or_else(corrupt)?;
        pos += vlen + free;
        pairs.push((key, value));
    }

    if pos + 1 != blob.len() {
        return Err(KvError::corrupt("trailing bytes after zipmap end marker"));
    }
    Ok(pairs)
}

fn read_len(blob: &[u8], pos: usize) -> Option<(usize, usize)> {
    let first = *blob.get(pos)?;
    match first {
        END => None,
        BIGLEN => {
            let b = blob.get(pos + 1..pos + 5)?;
            Some((u32::from_le_bytes([b[0], b[1], b[2], b[3]]) as usize, 5))
        }
        n => Some((n as usize, 1)),
    }
}
