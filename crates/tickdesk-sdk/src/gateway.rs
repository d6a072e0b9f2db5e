//! 持久化网关
//!
//! 计数器状态的读写通道：远端 API 优先，本地缓存回退。
//!
//! - `load`：远端成功 → 镜像到缓存；失败 → 缓存快照；都没有 → 全零。永不报错。
//! - `save`：无 token 时只写缓存并报告未成功（未登录会话是本地模式）；
//!   有 token 时 5 秒超时保护的远端写入，失败仍写缓存兜底。
//! - `save_on_unload`：退出前的单向投递，不等待回执。
//!
//! 已知的正确性缺口（保留观察到的行为）：两个并发 save 不保证按发起顺序完成，
//! 慢的旧请求可能晚于快的新请求落缓存，缓存始终是 last writer wins、无版本号。

use std::sync::Arc;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TickdeskSDKError};
use crate::http_client::ApiHttpClient;
use crate::jira::JiraSyncResult;
use crate::session::{CounterState, SessionStore};
use crate::storage::{keys, KvStore};

/// `/api/data` 响应（计数器 + 可选的内嵌同步元数据）
#[derive(Debug, Clone, Deserialize)]
struct RemoteData {
    #[serde(flatten)]
    counters: CounterState,
    #[serde(rename = "jiraSync", default)]
    jira_sync: Option<JiraSyncResult>,
}

/// `/api/save` 请求体：完整状态 + 自由文本的原因标签
#[derive(Debug, Serialize)]
struct SaveRequest<'a> {
    #[serde(flatten)]
    counters: &'a CounterState,
    action: &'a str,
}

/// `/api/save` 响应
#[derive(Debug, Deserialize)]
struct SaveResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    month: Option<String>,
}

/// 加载结果的数据来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    /// 远端 API
    Remote,
    /// 本地缓存回退
    LocalCache,
    /// 无缓存时的全零兜底
    Default,
}

/// 加载结果
#[derive(Debug, Clone)]
pub struct LoadOutcome {
    pub counters: CounterState,
    /// 远端响应里内嵌的外部同步元数据（仅远端来源时可能出现）
    pub jira_sync: Option<JiraSyncResult>,
    pub source: LoadSource,
}

/// 月度统计条目（`/api/stats/summary`）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthStats {
    pub month: String,
    #[serde(rename = "totalTickets", default)]
    pub total_tickets: u64,
    #[serde(rename = "pendingTickets", default)]
    pub pending_tickets: u64,
    #[serde(rename = "resolvedTickets", default)]
    pub resolved_tickets: u64,
}

/// 统计汇总（当前值 + 月度历史）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSummary {
    #[serde(rename = "totalTickets", default)]
    pub total_tickets: u64,
    #[serde(rename = "pendingTickets", default)]
    pub pending_tickets: u64,
    #[serde(rename = "resolvedTickets", default)]
    pub resolved_tickets: u64,
    #[serde(default)]
    pub months: Vec<MonthStats>,
}

/// 持久化网关
pub struct PersistenceGateway {
    http: Arc<ApiHttpClient>,
    kv: Arc<KvStore>,
    store: Arc<SessionStore>,
    save_timeout: Duration,
}

impl PersistenceGateway {
    pub fn new(
        http: Arc<ApiHttpClient>,
        kv: Arc<KvStore>,
        store: Arc<SessionStore>,
        save_timeout: Duration,
    ) -> Self {
        Self {
            http,
            kv,
            store,
            save_timeout,
        }
    }

    /// 加载计数器状态
    ///
    /// 所有失败路径都降级到回退值，永不返回错误。
    pub async fn load(&self) -> LoadOutcome {
        let token = self.store.auth_token().await;

        match self
            .http
            .get_json::<RemoteData>("/api/data", token.as_deref(), &[])
            .await
        {
            Ok(data) => {
                info!("✅ 已从服务端加载计数器: {:?}", data.counters);
                self.write_cache(&data.counters).await;
                LoadOutcome {
                    counters: data.counters,
                    jira_sync: data.jira_sync,
                    source: LoadSource::Remote,
                }
            }
            Err(e) => {
                warn!("⚠️ 远端加载失败，回退本地缓存: {}", e);
                match self.kv.get::<_, CounterState>(keys::COUNTER_CACHE).await {
                    Ok(Some(cached)) => {
                        info!("✅ 已从本地缓存加载计数器 (fallback)");
                        LoadOutcome {
                            counters: cached,
                            jira_sync: None,
                            source: LoadSource::LocalCache,
                        }
                    }
                    Ok(None) => LoadOutcome {
                        counters: CounterState::zero(),
                        jira_sync: None,
                        source: LoadSource::Default,
                    },
                    Err(e) => {
                        warn!("⚠️ 本地缓存读取失败，使用全零状态: {}", e);
                        LoadOutcome {
                            counters: CounterState::zero(),
                            jira_sync: None,
                            source: LoadSource::Default,
                        }
                    }
                }
            }
        }
    }

    /// 保存计数器状态
    ///
    /// 返回远端写入是否成功。不论远端结果如何，本地缓存都会写入。
    pub async fn save(&self, state: &CounterState, reason: &str) -> bool {
        let token = self.store.auth_token().await;

        let Some(token) = token else {
            // 未登录会话是本地模式：只写缓存，报告未成功
            debug!("无 token，仅写本地缓存: reason={}", reason);
            self.write_cache(state).await;
            return false;
        };

        let body = SaveRequest {
            counters: state,
            action: reason,
        };

        let result = self
            .http
            .post_json::<_, SaveResponse>(
                "/api/save",
                &body,
                Some(&token),
                &[],
                Some(self.save_timeout),
            )
            .await;

        // 远端结果如何都写缓存：成功时是镜像，失败时是兜底
        self.write_cache(state).await;

        match result {
            Ok(resp) if resp.success => {
                debug!(
                    "✅ 已保存到服务端: reason={}, month={:?}",
                    reason, resp.month
                );
                true
            }
            Ok(_) => {
                warn!("⚠️ 服务端拒绝保存: reason={}", reason);
                false
            }
            Err(e) => {
                warn!("⚠️ 保存失败（缓存已兜底）: reason={}, error={}", reason, e);
                false
            }
        }
    }

    /// 页面卸载时的单向保存
    ///
    /// 投递后不等待回执，进程终止导致丢失是可接受的。
    /// 本地缓存先同步写入，落盘快照不依赖网络。
    pub async fn save_on_unload(&self, state: &CounterState) {
        self.write_cache(state).await;

        let Some(token) = self.store.auth_token().await else {
            debug!("无 token，卸载保存仅写本地缓存");
            return;
        };

        let http = self.http.clone();
        let state = *state;
        let timeout = self.save_timeout;
        tokio::spawn(async move {
            let body = SaveRequest {
                counters: &state,
                action: "beforeunload",
            };
            if let Err(e) = http
                .post_json::<_, SaveResponse>("/api/save", &body, Some(&token), &[], Some(timeout))
                .await
            {
                debug!("卸载保存未送达（可接受）: {}", e);
            }
        });
    }

    /// 获取统计汇总（当前值 + 月度历史）
    pub async fn stats_summary(&self) -> Result<StatsSummary> {
        let token = self
            .store
            .auth_token()
            .await
            .ok_or_else(|| TickdeskSDKError::Auth("未登录，无法获取统计".to_string()))?;

        self.http
            .get_json::<StatsSummary>("/api/stats/summary", Some(&token), &[])
            .await
    }

    async fn write_cache(&self, state: &CounterState) {
        if let Err(e) = self.kv.set(keys::COUNTER_CACHE, state).await {
            warn!("⚠️ 写入本地缓存失败: {}", e);
        }
    }
}
