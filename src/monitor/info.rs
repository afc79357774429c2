use super::*;
use crate::engine::MemoryKeyspace;
use crate::persistence::Persistence;

/// 生成 INFO 文本；`section` 为空时输出全部分节
pub fn build_info_response(section: Option<&str>, ks: &MemoryKeyspace, pers: &Persistence) -> String {
    let sections = section
        .map(|s| vec![s])
        .unwrap_or_else(|| vec!["server", "persistence", "stats", "keyspace"]);

    let metrics = KeyspaceMetrics::collect(ks);
    let mut response = String::new();

    for sec in sections {
        match sec.to_lowercase().as_str() {
            "server" => {
                response.push_str("# Server\n");
                response.push_str(&format!("cagekv_version:{}\n", env!("CARGO_PKG_VERSION")));
                response.push_str(&format!("os:{}\n", std::env::consts::OS));
                response.push_str(&format!("databases:{}\n", pers.config().databases));
            }
            "persistence" => {
                response.push_str("# Persistence\n");
                response.push_str(&format!("rdb_changes_since_last_save:{}\n", metrics.dirty));
                response.push_str(&format!("rdb_bgsave_in_progress:{}\n", pers.is_saving() as u8));
                response.push_str(&format!("rdb_last_save_time:{}\n", pers.last_save_time()));
                response.push_str(&format!(
                    "rdb_last_bgsave_status:{}\n",
                    if pers.last_save_ok() { "ok" } else { "err" }
                ));
                if let Some(stats) = pers.last_stats() {
                    response.push_str(&format!("rdb_last_save_keys:{}\n", stats.keys));
                    response.push_str(&format!("rdb_last_save_bytes:{}\n", stats.bytes));
                }
                response.push_str(&format!("rdb_compression:{}\n", pers.config().rdb_compression as u8));
                response.push_str(&format!("rdb_checksum:{}\n", pers.config().rdb_checksum as u8));
            }
            "stats" => {
                response.push_str("# Stats\n");
                response.push_str(&format!("total_keys:{}\n", metrics.total_keys()));
                for (label, count) in &metrics.encodings {
                    response.push_str(&format!("encoding_{}:{}\n", label.replace('/', "_"), count));
                }
            }
            "keyspace" => {
                response.push_str("# Keyspace\n");
                for (db, keys, expires) in &metrics.databases {
                    response.push_str(&format!("db{}:keys={},expires={}\n", db, keys, expires));
                }
            }
            _ => {}
        }
    }

    response
}
