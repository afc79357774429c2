// src/engine/kv.rs

use crate::object::Value;
use crate::types::string::ByteBuffer;

/// (key, value, 过期时间毫秒)
pub type Entry<'a> = (&'a [u8], &'a Value, Option<i64>);

/// 快照读写所依赖的 keyspace 基本操作
///
/// 快照模块只通过这个 trait 访问数据，具体的存储由实现方决定。
pub trait Keyspace {
    /// 配置的数据库个数
    fn db_count(&self) -> usize;

    /// 数据库中的 key 个数
    fn db_len(&self, db: usize) -> usize;

    /// 写入 key，返回之前是否不存在
    fn add(&mut self, db: usize, key: ByteBuffer, value: Value) -> bool;

    fn lookup(&self, db: usize, key: &[u8]) -> Option<&Value>;

    fn lookup_mut(&mut self, db: usize, key: &[u8]) -> Option<&mut Value>;

    /// 删除 key 及其过期时间
    fn delete(&mut self, db: usize, key: &[u8]) -> bool;

    /// 绝对过期时间（UNIX 毫秒）
    fn get_expire(&self, db: usize, key: &[u8]) -> Option<i64>;

    /// key 不存在时返回 false
    fn set_expire(&mut self, db: usize, key: &[u8], when_ms: i64) -> bool;

    fn remove_expire(&mut self, db: usize, key: &[u8]) -> bool;

    /// 遍历一个数据库的所有 key，顺序不保证
    fn entries(&self, db: usize) -> Box<dyn Iterator<Item = Entry<'_>> + '_>;
}
