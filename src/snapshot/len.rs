// src/snapshot/len.rs

//! 长度编码
//!
//! | 前两位 | 含义 |
//! |---|---|
//! | `00` | 低 6 位即长度 |
//! | `01` | 低 6 位 + 下一字节，共 14 位（大端） |
//! | `10` | 后跟 4 字节大端 u32 |
//! | `11` | 特殊编码，低 6 位为子类型 |

use std::io::{Read, Write};

use crate::error::{KvError, Result};
use crate::snapshot::rio::{RioReader, RioWriter};

pub const LEN_6BIT: u8 = 0;
pub const LEN_14BIT: u8 = 1;
pub const LEN_32BIT: u8 = 2;
pub const LEN_ENCVAL: u8 = 3;

/// 读到的长度字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Len {
    Plain(u32),
    /// 特殊编码的子类型
    Encoded(u8),
}

/// 把长度编码进缓冲区，返回写入的字节数
pub fn encode_len(out: &mut Vec<u8>, len: u32) -> usize {
    if len < 1 << 6 {
        out.push((LEN_6BIT << 6) | len as u8);
        1
    } else if len < 1 << 14 {
        out.push((LEN_14BIT << 6) | (len >> 8) as u8);
        out.push(len as u8);
        2
    } else {
        out.push(LEN_32BIT << 6);
        out.extend_from_slice(&len.to_be_bytes());
        5
    }
}

pub fn write_len<W: Write>(rio: &mut RioWriter<W>, len: usize) -> Result<()> {
    let len = u32::try_from(len).map_err(|_| KvError::corrupt(format!("length {} does not fit in 32 bits", len)))?;
    let mut buf = Vec::with_capacity(5);
    encode_len(&mut buf, len);
    rio.write_all(&buf)
}

pub fn read_len<R: Read>(rio: &mut RioReader<R>) -> Result<Len> {
    let first = rio.read_u8()?;
    match first >> 6 {
        LEN_ENCVAL => Ok(Len::Encoded(first & 0x3F)),
        LEN_6BIT => Ok(Len::Plain((first & 0x3F) as u32)),
        LEN_14BIT => {
            let next = rio.read_u8()?;
            Ok(Len::Plain((((first & 0x3F) as u32) << 8) | next as u32))
        }
        _ => Ok(Len::Plain(u32::from_be_bytes(rio.read_array::<4>()?))),
    }
}

/// 读取一个普通长度，遇到特殊编码视为损坏
pub fn read_plain_len<R: Read>(rio: &mut RioReader<R>) -> Result<usize> {
    match read_len(rio)? {
        Len::Plain(n) => Ok(n as usize),
        Len::Encoded(t) => Err(KvError::corrupt(format!("unexpected special encoding {} for a length", t))),
    }
}
