//! KV 存储模块 - 基于 sled 的本地缓存
//!
//! 本模块提供：
//! - JSON 序列化的键值读写
//! - 所有保存路径共享的计数器快照缓存（last writer wins，无版本号）
//! - 进程重启后仍然可用的 token / 实例 ID 持久化

use std::path::{Path, PathBuf};
use std::sync::Arc;
use sled::Db;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TickdeskSDKError};
use crate::storage::KvStats;

/// KV 存储组件
///
/// 单用户部件，直接使用 sled 默认 Tree，不做命名空间隔离。
#[derive(Debug, Clone)]
pub struct KvStore {
    #[allow(dead_code)]
    base_path: PathBuf,
    db: Arc<Db>,
}

impl KvStore {
    /// 创建新的 KV 存储实例
    pub async fn new(base_path: &Path) -> Result<Self> {
        let base_path = base_path.to_path_buf();
        let kv_path = base_path.join("kv");

        tokio::fs::create_dir_all(&kv_path)
            .await
            .map_err(|e| TickdeskSDKError::IO(format!("创建 KV 存储目录失败: {}", e)))?;

        // 打开 sled 数据库（上一个实例可能刚释放锁，重试多次带退避）
        const MAX_OPEN_RETRIES: u32 = 8;
        const RETRY_DELAY_MS: u64 = 300;
        let mut db_opt: Option<Db> = None;
        let mut last_err: Option<sled::Error> = None;
        for attempt in 0..MAX_OPEN_RETRIES {
            match sled::open(&kv_path) {
                Ok(d) => {
                    db_opt = Some(d);
                    break;
                }
                Err(e) => {
                    let msg = format!("{}", e);
                    last_err = Some(e);
                    let is_lock = msg.contains("could not acquire lock")
                        || msg.contains("Resource temporarily unavailable")
                        || msg.contains("WouldBlock");
                    if is_lock && attempt + 1 < MAX_OPEN_RETRIES {
                        let delay_ms = RETRY_DELAY_MS * (1 << attempt);
                        tokio::time::sleep(tokio::time::Duration::from_millis(delay_ms)).await;
                    } else {
                        break;
                    }
                }
            }
        }
        let db = db_opt.ok_or_else(|| {
            TickdeskSDKError::KvStore(
                last_err
                    .map(|e| format!("打开 sled 数据库失败: {}", e))
                    .unwrap_or_else(|| "打开 sled 数据库失败".to_string()),
            )
        })?;

        Ok(Self {
            base_path,
            db: Arc::new(db),
        })
    }

    /// 设置键值对（值以 JSON 序列化）
    pub async fn set<K, V>(&self, key: K, value: &V) -> Result<()>
    where
        K: AsRef<[u8]>,
        V: Serialize,
    {
        let value_bytes = serde_json::to_vec(value)
            .map_err(|e| TickdeskSDKError::Serialization(format!("序列化值失败: {}", e)))?;

        self.db
            .insert(key, value_bytes)
            .map_err(|e| TickdeskSDKError::KvStore(format!("设置键值对失败: {}", e)))?;

        Ok(())
    }

    /// 获取键值对
    pub async fn get<K, V>(&self, key: K) -> Result<Option<V>>
    where
        K: AsRef<[u8]>,
        V: for<'de> Deserialize<'de>,
    {
        let result = self
            .db
            .get(key)
            .map_err(|e| TickdeskSDKError::KvStore(format!("获取键值对失败: {}", e)))?;

        match result {
            Some(value_bytes) => {
                let value = serde_json::from_slice(&value_bytes)
                    .map_err(|e| TickdeskSDKError::Serialization(format!("反序列化值失败: {}", e)))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// 删除键值对
    pub async fn delete<K>(&self, key: K) -> Result<Option<Vec<u8>>>
    where
        K: AsRef<[u8]>,
    {
        let result = self
            .db
            .remove(key)
            .map_err(|e| TickdeskSDKError::KvStore(format!("删除键值对失败: {}", e)))?;

        Ok(result.map(|v| v.to_vec()))
    }

    /// 检查键是否存在
    pub async fn exists<K>(&self, key: K) -> Result<bool>
    where
        K: AsRef<[u8]>,
    {
        let result = self
            .db
            .contains_key(key)
            .map_err(|e| TickdeskSDKError::KvStore(format!("检查键存在失败: {}", e)))?;

        Ok(result)
    }

    /// 刷盘（关闭前调用，保证缓存落地）
    pub async fn flush(&self) -> Result<()> {
        self.db
            .flush_async()
            .await
            .map_err(|e| TickdeskSDKError::KvStore(format!("刷盘失败: {}", e)))?;
        Ok(())
    }

    /// 获取统计信息
    pub async fn get_stats(&self) -> Result<KvStats> {
        let key_count = self.db.len() as u64;
        // sled 没有精确的 size_on_disk 按 Tree 统计，用估算值
        let storage_size = key_count * 256;

        Ok(KvStats {
            key_count,
            storage_size,
        })
    }
}

/// 本地缓存的固定键
pub mod keys {
    /// 认证 token
    pub const AUTH_TOKEN: &str = "auth_token";
    /// 匿名实例 ID（与认证 token 无关，一次生成永久复用）
    pub const INSTANCE_ID: &str = "instance_id";
    /// 计数器快照缓存（JSON）
    pub const COUNTER_CACHE: &str = "counter_cache";
}
