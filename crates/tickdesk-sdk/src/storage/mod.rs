//! 本地存储模块
//!
//! 基于 sled 的本地持久化缓存，承载三类键：
//! - 认证 token
//! - 匿名实例 ID
//! - 计数器快照（远端不可用时的回退数据）

pub mod kv;

pub use kv::{keys, KvStore};

/// KV 存储统计信息
#[derive(Debug, Clone, Default)]
pub struct KvStats {
    pub key_count: u64,
    pub storage_size: u64,
}
