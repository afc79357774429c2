// src/snapshot/string.rs

//! 字符串与浮点数编码
//!
//! 写字符串时依次尝试：
//! 1. 整数打包：不超过 11 字节、是规范十进制整数、落在 i32 范围内
//! 2. LZF：长度大于 20 且开启压缩，压缩后至少省下 4 字节
//! 3. 原样：长度 + 字节

use std::io::{Read, Write};

use crate::error::{KvError, Result};
use crate::snapshot::len::{LEN_ENCVAL, Len, read_len, read_plain_len, write_len};
use crate::snapshot::rio::{RioReader, RioWriter};
use crate::types::string::{StringValue, format_double, parse_canonical_i64, parse_double};

pub const ENC_INT8: u8 = 0;
pub const ENC_INT16: u8 = 1;
pub const ENC_INT32: u8 = 2;
pub const ENC_LZF: u8 = 3;

/// 整数打包只考虑这么短的字符串
const MAX_INT_STRING_LEN: usize = 11;
/// 不压缩不超过这个长度的字符串
const MIN_COMPRESS_LEN: usize = 20;

const DOUBLE_NAN: u8 = 253;
const DOUBLE_POS_INF: u8 = 254;
const DOUBLE_NEG_INF: u8 = 255;

fn enc_tag(subtype: u8) -> u8 {
    (LEN_ENCVAL << 6) | subtype
}

/// 整数的最短打包形式；超出 i32 返回 None
pub fn encode_integer(value: i64) -> Option<Vec<u8>> {
    if let Ok(v) = i8::try_from(value) {
        Some(vec![enc_tag(ENC_INT8), v as u8])
    } else if let Ok(v) = i16::try_from(value) {
        let b = v.to_le_bytes();
        Some(vec![enc_tag(ENC_INT16), b[0], b[1]])
    } else if let Ok(v) = i32::try_from(value) {
        let mut out = vec![enc_tag(ENC_INT32)];
        out.extend_from_slice(&v.to_le_bytes());
        Some(out)
    } else {
        None
    }
}

/// 字符串能否用整数打包
fn try_integer_encoding(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() > MAX_INT_STRING_LEN {
        return None;
    }
    encode_integer(parse_canonical_i64(data)?)
}

/// LZF 压缩成功且足够小时写出，返回是否写出
fn try_write_lzf<W: Write>(rio: &mut RioWriter<W>, data: &[u8]) -> Result<bool> {
    let compressed = match lzf::compress(data) {
        Ok(c) if c.len() <= data.len() - 4 => c,
        _ => return Ok(false),
    };
    rio.write_u8(enc_tag(ENC_LZF))?;
    write_len(rio, compressed.len())?;
    write_len(rio, data.len())?;
    rio.write_all(&compressed)?;
    Ok(true)
}

/// 写一个二进制安全的字符串
pub fn write_string<W: Write>(rio: &mut RioWriter<W>, data: &[u8], compress: bool) -> Result<()> {
    if let Some(enc) = try_integer_encoding(data) {
        return rio.write_all(&enc);
    }
    if compress && data.len() > MIN_COMPRESS_LEN && try_write_lzf(rio, data)? {
        return Ok(());
    }
    write_len(rio, data.len())?;
    rio.write_all(data)
}

/// 写 String 值：整数编码的值直接走整数路径，超出 i32 则写十进制文本
pub fn write_string_value<W: Write>(rio: &mut RioWriter<W>, value: &StringValue, compress: bool) -> Result<()> {
    match value {
        StringValue::Int(v) => match encode_integer(*v) {
            Some(enc) => rio.write_all(&enc),
            None => {
                let text = v.to_string();
                write_len(rio, text.len())?;
                rio.write_all(text.as_bytes())
            }
        },
        StringValue::Raw(buf) => write_string(rio, buf.as_bytes(), compress),
    }
}

/// 读一个字符串，整数打包形式会被还原成十进制文本
pub fn read_string<R: Read>(rio: &mut RioReader<R>) -> Result<Vec<u8>> {
    match read_len(rio)? {
        Len::Plain(len) => rio.read_vec(len as usize),
        Len::Encoded(ENC_INT8) => {
            let [b] = rio.read_array::<1>()?;
            Ok((b as i8).to_string().into_bytes())
        }
        Len::Encoded(ENC_INT16) => Ok(i16::from_le_bytes(rio.read_array()?).to_string().into_bytes()),
        Len::Encoded(ENC_INT32) => Ok(i32::from_le_bytes(rio.read_array()?).to_string().into_bytes()),
        Len::Encoded(ENC_LZF) => {
            let clen = read_plain_len(rio)?;
            let len = read_plain_len(rio)?;
            let compressed = rio.read_vec(clen)?;
            match lzf::decompress(&compressed, len) {
                Ok(data) if data.len() == len => Ok(data),
                _ => Err(KvError::corrupt(format!(
                    "LZF block of {} bytes does not decompress to {} bytes",
                    clen, len
                ))),
            }
        }
        Len::Encoded(other) => Err(KvError::corrupt(format!("unknown string encoding {}", other))),
    }
}

/// 浮点数：1 字节长度 + ASCII；253/254/255 分别表示 NaN/+inf/-inf
pub fn write_double<W: Write>(rio: &mut RioWriter<W>, value: f64) -> Result<()> {
    if value.is_nan() {
        return rio.write_u8(DOUBLE_NAN);
    }
    if value.is_infinite() {
        return rio.write_u8(if value > 0.0 { DOUBLE_POS_INF } else { DOUBLE_NEG_INF });
    }
    let text = format_double(value);
    rio.write_u8(text.len() as u8)?;
    rio.write_all(text.as_bytes())
}

pub fn read_double<R: Read>(rio: &mut RioReader<R>) -> Result<f64> {
    match rio.read_u8()? {
        DOUBLE_NAN => Ok(f64::NAN),
        DOUBLE_POS_INF => Ok(f64::INFINITY),
        DOUBLE_NEG_INF => Ok(f64::NEG_INFINITY),
        len => {
            let text = rio.read_vec(len as usize)?;
            parse_double(&text).ok_or_else(|| {
                KvError::corrupt(format!("invalid double {:?}", String::from_utf8_lossy(&text)))
            })
        }
    }
}
