// src/snapshot/rio.rs

//! 快照的字节流读写：每一块数据都会更新滚动 CRC64，
//! 读端另外按字节数节流地报告加载进度

use std::io::{self, Read, Write};

use crc::{CRC_64_REDIS, Crc, Digest};

use crate::error::{KvError, Result};
use crate::snapshot::reader::LoadProgress;

pub static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// 写端
pub struct RioWriter<W: Write> {
    inner: W,
    digest: Option<Digest<'static, u64>>,
    written: u64,
}

impl<W: Write> RioWriter<W> {
    /// `checksum` 为 false 时不计算 CRC，`checksum()` 返回 0
    pub fn new(inner: W, checksum: bool) -> Self {
        RioWriter { inner, digest: checksum.then(|| CRC64.digest()), written: 0 }
    }

    pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.inner.write_all(buf)?;
        if let Some(d) = self.digest.as_mut() {
            d.update(buf);
        }
        self.written += buf.len() as u64;
        Ok(())
    }

    pub fn write_u8(&mut self, b: u8) -> Result<()> {
        self.write_all(&[b])
    }

    /// 已写出的字节数
    pub fn tell(&self) -> u64 {
        self.written
    }

    /// 到目前为止写出内容的 CRC64
    pub fn checksum(&self) -> u64 {
        self.digest.clone().map_or(0, |d| d.finalize())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// 读端
pub struct RioReader<R: Read> {
    inner: R,
    digest: Digest<'static, u64>,
    read: u64,
    total: Option<u64>,
    interval: u64,
    next_report: u64,
}

impl<R: Read> RioReader<R> {
    /// `interval` 为 0 时不报告进度
    pub fn new(inner: R, total: Option<u64>, interval: u64) -> Self {
        RioReader { inner, digest: CRC64.digest(), read: 0, total, interval, next_report: interval }
    }

    /// 短读统一映射为 `UnexpectedEof`
    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.inner.read_exact(buf).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => KvError::UnexpectedEof,
            _ => KvError::Io(e),
        })?;
        self.digest.update(buf);
        self.read += buf.len() as u64;
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut b = [0u8; 1];
        self.read_exact(&mut b)?;
        Ok(b[0])
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut b = [0u8; N];
        self.read_exact(&mut b)?;
        Ok(b)
    }

    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>> {
        // 不信任声明的长度，分块读取避免一次性分配过大
        const CHUNK: usize = 64 * 1024;
        let mut out = Vec::with_capacity(len.min(CHUNK));
        let mut remaining = len;
        let mut chunk = [0u8; 4096];
        while remaining > 0 {
            let n = remaining.min(chunk.len());
            self.read_exact(&mut chunk[..n])?;
            out.extend_from_slice(&chunk[..n]);
            remaining -= n;
        }
        Ok(out)
    }

    pub fn tell(&self) -> u64 {
        self.read
    }

    /// 到目前为止读入内容的 CRC64
    pub fn checksum(&self) -> u64 {
        self.digest.clone().finalize()
    }

    /// 距上次报告已读够 `interval` 字节时返回一次进度
    pub fn progress_due(&mut self) -> Option<LoadProgress> {
        if self.interval == 0 || self.read < self.next_report {
            return None;
        }
        self.next_report = self.read + self.interval;
        Some(LoadProgress { loaded_bytes: self.read, total_bytes: self.total })
    }
}
