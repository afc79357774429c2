// src/lib.rs
//! cagekv 库：内存值模型 + 二进制快照

pub mod config;      // JSON 配置与编码阈值
pub mod engine;      // keyspace
pub mod error;       // 错误类型
pub mod expire;      // 过期策略
pub mod monitor;     // 监控 & 诊断
pub mod object;      // 值对象
pub mod persistence; // SAVE / BGSAVE / 加载
pub mod snapshot;    // 快照编解码
pub mod types;       // String / Hash / List / Set / ZSet 数据结构
