// src/monitor/metrics.rs

use std::collections::BTreeMap;

use crate::engine::{Keyspace, MemoryKeyspace};

/// keyspace 的一次统计快照
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyspaceMetrics {
    /// 每个非空数据库：(编号, key 数, 带过期时间的 key 数)
    pub databases: Vec<(usize, usize, usize)>,
    /// "类型/编码" → key 数
    pub encodings: BTreeMap<String, u64>,
    /// 上次保存以来的修改数
    pub dirty: u64,
}

impl KeyspaceMetrics {
    pub fn collect(ks: &MemoryKeyspace) -> Self {
        let mut metrics = KeyspaceMetrics { dirty: ks.dirty(), ..Default::default() };
        for db in 0..ks.db_count() {
            let Some(d) = ks.database(db).filter(|d| !d.is_empty()) else {
                continue;
            };
            metrics.databases.push((db, d.len(), d.expires_len()));
            for (_, value, _) in ks.entries(db) {
                let label = format!("{}/{}", value.kind(), value.encoding());
                *metrics.encodings.entry(label).or_insert(0) += 1;
            }
        }
        metrics
    }

    pub fn total_keys(&self) -> usize {
        self.databases.iter().map(|&(_, keys, _)| keys).sum()
    }

    /// Prometheus 文本格式
    pub fn to_prometheus(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP cagekv_keys Number of keys per database\n");
        output.push_str("# TYPE cagekv_keys gauge\n");
        for (db, keys, _) in &self.databases {
            output.push_str(&format!("cagekv_keys{{db=\"{}\"}} {}\n", db, keys));
        }

        output.push_str("# HELP cagekv_expires Number of keys with a TTL per database\n");
        output.push_str("# TYPE cagekv_expires gauge\n");
        for (db, _, expires) in &self.databases {
            output.push_str(&format!("cagekv_expires{{db=\"{}\"}} {}\n", db, expires));
        }

        output.push_str("# HELP cagekv_values Number of values per type and encoding\n");
        output.push_str("# TYPE cagekv_values gauge\n");
        for (label, count) in &self.encodings {
            let (kind, encoding) = label.split_once('/').unwrap_or((label.as_str(), ""));
            output.push_str(&format!(
                "cagekv_values{{type=\"{}\",encoding=\"{}\"}} {}\n",
                kind, encoding, count
            ));
        }

        output.push_str("# HELP cagekv_changes_since_last_save Writes since the last successful save\n");
        output.push_str("# TYPE cagekv_changes_since_last_save gauge\n");
        output.push_str(&format!("cagekv_changes_since_last_save {}\n", self.dirty));

        output
    }
}
