// src/monitor/mod.rs
//! 监控与诊断模块：keyspace 统计与 INFO 报告
pub mod info;
mod metrics;

pub use info::build_info_response;
pub use metrics::KeyspaceMetrics;
