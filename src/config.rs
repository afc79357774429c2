use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::Path
};
use anyhow::{Context, Result};
use tracing::info;

/// 一个自动快照触发点：`seconds` 秒内至少发生 `changes` 次修改
#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavePoint {
    pub seconds: u64,
    pub changes: u64,
}

/// 紧凑编码的阈值：元素个数上限 + 单个元素字节长度上限
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodingLimits {
    pub max_entries: usize,
    pub max_value: usize,
}

impl EncodingLimits {
    pub const fn new(max_entries: usize, max_value: usize) -> Self {
        EncodingLimits { max_entries, max_value }
    }

    /// 元素长度是否仍允许紧凑编码
    pub fn value_fits(&self, len: usize) -> bool {
        len <= self.max_value
    }
}

/// 各类型的阈值集合，由 keyspace 持有并传给容器
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeLimits {
    pub hash: EncodingLimits,
    pub list: EncodingLimits,
    pub set: EncodingLimits,
    pub zset: EncodingLimits,
}

impl Default for TypeLimits {
    fn default() -> Self {
        Config::default().type_limits()
    }
}

/// 进程启动后读到的全局配置
///
/// 核心数据结构不读取全局状态，阈值通过 `*_limits()` 显式传入。
#[derive(Deserialize, Serialize, Debug, Clone)]
#[serde(default)]
pub struct Config {
    /// 数据库个数，SELECT-DB 超出范围视为致命错误
    pub databases: usize,
    /// 快照文件名
    pub rdb_filename: String,
    /// 是否对长字符串做 LZF 压缩
    pub rdb_compression: bool,
    /// 是否计算 / 校验 CRC64
    pub rdb_checksum: bool,
    /// 自动快照触发点
    pub save_points: Vec<SavePoint>,
    /// 加载期间每处理这么多字节回调一次进度钩子，0 表示关闭
    pub loading_process_events_interval_bytes: u64,

    pub hash_max_ziplist_entries: usize,
    pub hash_max_ziplist_value: usize,
    pub list_max_ziplist_entries: usize,
    pub list_max_ziplist_value: usize,
    pub set_max_intset_entries: usize,
    pub zset_max_ziplist_entries: usize,
    pub zset_max_ziplist_value: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            databases: 16,
            rdb_filename: "dump.rdb".to_string(),
            rdb_compression: true,
            rdb_checksum: true,
            save_points: vec![
                SavePoint { seconds: 900, changes: 1 },
                SavePoint { seconds: 300, changes: 10 },
                SavePoint { seconds: 60, changes: 10000 },
            ],
            loading_process_events_interval_bytes: 2 * 1024 * 1024,
            hash_max_ziplist_entries: 512,
            hash_max_ziplist_value: 64,
            list_max_ziplist_entries: 512,
            list_max_ziplist_value: 64,
            set_max_intset_entries: 512,
            zset_max_ziplist_entries: 128,
            zset_max_ziplist_value: 64,
        }
    }
}

impl Config {
    pub fn hash_limits(&self) -> EncodingLimits {
        EncodingLimits::new(self.hash_max_ziplist_entries, self.hash_max_ziplist_value)
    }

    pub fn list_limits(&self) -> EncodingLimits {
        EncodingLimits::new(self.list_max_ziplist_entries, self.list_max_ziplist_value)
    }

    /// intset 只关心个数，成员长度不设上限
    pub fn set_limits(&self) -> EncodingLimits {
        EncodingLimits::new(self.set_max_intset_entries, usize::MAX)
    }

    pub fn zset_limits(&self) -> EncodingLimits {
        EncodingLimits::new(self.zset_max_ziplist_entries, self.zset_max_ziplist_value)
    }

    pub fn type_limits(&self) -> TypeLimits {
        TypeLimits {
            hash: self.hash_limits(),
            list: self.list_limits(),
            set: self.set_limits(),
            zset: self.zset_limits(),
        }
    }
}

/// 从指定路径读取并反序列化 JSON 配置
pub fn load<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();

    // 如果配置文件不存在，创建默认配置
    if !path_ref.exists() {
        info!(path = ?path_ref, "config file not found, creating default configuration");

        let default_cfg = Config::default();
        let default_json = serde_json::to_string_pretty(&default_cfg)?;
        fs::write(path_ref, default_json)
            .with_context(|| format!("Failed to write default config {:?}", path_ref))?;

        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path_ref)
        .with_context(|| format!("Failed to read config file {:?}", path_ref))?;
    let cfg: Config = serde_json::from_str(&data)
        .context("Failed to parse config.json")?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_written_when_missing() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("config.json");

        let cfg = load(&path)?;
        assert!(path.exists(), "缺失时应写出默认配置");
        assert_eq!(cfg.databases, 16);
        assert_eq!(cfg.hash_limits(), EncodingLimits::new(512, 64));

        // 第二次读取应得到相同内容
        let again = load(&path)?;
        assert_eq!(again.zset_max_ziplist_entries, 128);
        Ok(())
    }

    #[test]
    fn test_partial_config_uses_defaults() -> Result<()> {
        let tmp = tempdir()?;
        let path = tmp.path().join("config.json");
        fs::write(&path, r#"{ "rdb_compression": false, "set_max_intset_entries": 4 }"#)?;

        let cfg = load(&path)?;
        assert!(!cfg.rdb_compression);
        assert_eq!(cfg.set_limits().max_entries, 4);
        assert!(cfg.rdb_checksum, "未指定的字段使用默认值");
        Ok(())
    }
}
