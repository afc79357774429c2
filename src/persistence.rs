// src/persistence.rs

//! SAVE / BGSAVE 协调与快照文件的读写
//!
//! 快照先写进目标目录下的临时文件，`fsync` 之后再原子地 rename 覆盖目标；
//! 任何一步失败，临时文件都会被删除，旧快照保持不变。

use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::{Path, PathBuf},
    thread::{self, JoinHandle},
    time::Instant,
};

use tempfile::Builder;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{Keyspace, MemoryKeyspace};
use crate::error::{KvError, Result};
use crate::expire::now_ms;
use crate::snapshot::{LoadOptions, LoadProgress, LoadStats, SaveStats, SnapshotReader, SnapshotWriter};

/// 把 keyspace 写到 `path`，成功后才替换原文件
pub fn save_to_path<K>(path: &Path, ks: &K, writer: SnapshotWriter, now: i64) -> Result<SaveStats>
where
    K: Keyspace + ?Sized,
{
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    // 临时文件在 drop 时自动删除
    let tmp = Builder::new().prefix("temp-").suffix(".rdb").tempfile_in(dir)?;

    let mut out = BufWriter::new(tmp);
    let stats = writer.write(ks, &mut out, now)?;
    let tmp = out.into_inner().map_err(|e| KvError::Io(e.into_error()))?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| KvError::Io(e.error))?;
    Ok(stats)
}

/// 读取快照文件；`hook` 按配置的字节间隔接收加载进度
pub fn load_from_path<K, F>(path: &Path, opts: LoadOptions, ks: K, hook: F) -> Result<(K, LoadStats)>
where
    K: Keyspace,
    F: FnMut(LoadProgress),
{
    let file = File::open(path)?;
    let total = file.metadata()?.len();
    SnapshotReader::new(opts)
        .with_total_bytes(total)
        .with_progress(hook)
        .load(BufReader::new(file), ks, now_ms())
}

/// 正在进行的后台保存
struct BackgroundSave {
    handle: JoinHandle<Result<SaveStats>>,
    /// 开始时 keyspace 的修改计数，成功后从 dirty 中扣除
    dirty_at_start: u64,
    started: Instant,
}

/// 快照持久化器
pub struct Persistence {
    cfg: Config,
    path: PathBuf,
    /// 上次成功保存的 UNIX 秒
    last_save: i64,
    last_save_ok: bool,
    last_stats: Option<SaveStats>,
    child: Option<BackgroundSave>,
}

impl Persistence {
    /// 快照文件位于 `dir/<rdb_filename>`
    pub fn new(cfg: Config, dir: impl AsRef<Path>) -> Self {
        let path = dir.as_ref().join(&cfg.rdb_filename);
        Persistence {
            cfg,
            path,
            last_save: now_ms() / 1000,
            last_save_ok: true,
            last_stats: None,
            child: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn last_save_time(&self) -> i64 {
        self.last_save
    }

    pub fn last_save_ok(&self) -> bool {
        self.last_save_ok
    }

    pub fn last_stats(&self) -> Option<SaveStats> {
        self.last_stats
    }

    pub fn is_saving(&self) -> bool {
        self.child.is_some()
    }

    fn writer(&self) -> SnapshotWriter {
        SnapshotWriter::from_config(&self.cfg)
    }

    fn record(&mut self, outcome: &Result<SaveStats>, ks: &mut MemoryKeyspace, dirty_at_start: u64) {
        match outcome {
            Ok(stats) => {
                ks.clear_dirty(dirty_at_start);
                self.last_save = now_ms() / 1000;
                self.last_save_ok = true;
                self.last_stats = Some(*stats);
            }
            Err(e) => {
                warn!(path = ?self.path, error = %e, "snapshot save failed");
                self.last_save_ok = false;
            }
        }
    }

    /// 前台保存（SAVE）
    pub fn save(&mut self, ks: &mut MemoryKeyspace) -> Result<SaveStats> {
        if self.is_saving() {
            return Err(KvError::SaveInProgress);
        }
        let started = Instant::now();
        let dirty = ks.dirty();
        info!(path = ?self.path, "saving snapshot");
        let outcome = save_to_path(&self.path, &*ks, self.writer(), now_ms());
        self.record(&outcome, ks, dirty);
        if let Ok(stats) = &outcome {
            info!(keys = stats.keys, bytes = stats.bytes, elapsed = ?started.elapsed(), "snapshot saved");
        }
        outcome
    }

    /// 后台保存（BGSAVE）：在 keyspace 的副本上由工作线程写出
    pub fn background_save(&mut self, ks: &MemoryKeyspace) -> Result<()> {
        if self.is_saving() {
            return Err(KvError::SaveInProgress);
        }
        let frozen = ks.clone();
        let path = self.path.clone();
        let writer = self.writer();
        let now = now_ms();
        let handle = thread::Builder::new()
            .name("cagekv-bgsave".into())
            .spawn(move || save_to_path(&path, &frozen, writer, now))?;
        info!(path = ?self.path, keys = ks.total_keys(), "background saving started");
        self.child = Some(BackgroundSave { handle, dirty_at_start: ks.dirty(), started: Instant::now() });
        Ok(())
    }

    /// 等待后台保存结束并记录结果；没有后台保存时返回 `Ok(None)`
    pub fn wait_background_save(&mut self, ks: &mut MemoryKeyspace) -> Result<Option<SaveStats>> {
        let Some(child) = self.child.take() else {
            return Ok(None);
        };
        let outcome = child
            .handle
            .join()
            .unwrap_or_else(|_| Err(KvError::Io(io::Error::other("background save thread panicked"))));
        self.record(&outcome, ks, child.dirty_at_start);
        let stats = outcome?;
        info!(keys = stats.keys, bytes = stats.bytes, elapsed = ?child.started.elapsed(), "background saving terminated with success");
        Ok(Some(stats))
    }

    /// 根据保存点判断是否应该自动保存
    pub fn should_save(&self, dirty: u64, now_secs: i64) -> bool {
        if self.is_saving() {
            return false;
        }
        let elapsed = now_secs.saturating_sub(self.last_save);
        self.cfg
            .save_points
            .iter()
            .any(|sp| dirty >= sp.changes && elapsed >= sp.seconds as i64)
    }

    /// 启动时加载快照；文件不存在时返回空 keyspace
    pub fn load(&self, replica: bool) -> Result<(MemoryKeyspace, Option<LoadStats>)> {
        self.load_with_progress(replica, |_| {})
    }

    pub fn load_with_progress<F>(&self, replica: bool, hook: F) -> Result<(MemoryKeyspace, Option<LoadStats>)>
    where
        F: FnMut(LoadProgress),
    {
        let empty = MemoryKeyspace::from_config(&self.cfg);
        if !self.path.exists() {
            info!(path = ?self.path, "no snapshot found, starting with an empty keyspace");
            return Ok((empty, None));
        }
        let started = Instant::now();
        let mut opts = LoadOptions::from_config(&self.cfg);
        opts.replica = replica;
        let (ks, stats) = load_from_path(&self.path, opts, empty, hook)?;
        info!(elapsed = ?started.elapsed(), "DB loaded from disk");
        Ok((ks, Some(stats)))
    }
}

impl Drop for Persistence {
    fn drop(&mut self) {
        if let Some(child) = self.child.take() {
            if let Ok(Err(e)) = child.handle.join() {
                warn!(error = %e, "background save failed during shutdown");
            }
        }
    }
}
