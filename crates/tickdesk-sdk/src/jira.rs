//! 外部同步适配器（Jira）
//!
//! 从外部工单系统拉取权威计数并整体覆盖本地状态：
//! - 每个实例一个匿名 ID（与认证 token 无关），服务端据此选择个人/全局配置
//! - 同步成功 → `replace()` 覆盖计数器，包含尚未保存的本地修改
//! - 任何失败只产生可展示的失败状态文案，绝不抛出
//!
//! 配置查询接口只读，用于决定是否提示用户去配置。

use std::sync::Arc;
use chrono::Local;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, TickdeskSDKError};
use crate::http_client::ApiHttpClient;
use crate::session::{CounterState, SessionStore};
use crate::storage::{keys, KvStore};

/// 外部同步返回的快照（整体覆盖计数器）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraSyncResult {
    #[serde(rename = "pendingTickets", default)]
    pub pending_tickets: u64,
    #[serde(rename = "totalTickets", default)]
    pub total_tickets: u64,
    #[serde(rename = "resolvedTickets", default)]
    pub resolved_tickets: u64,
    /// 服务端的同步时间（ISO 8601 字符串，原样透传）
    #[serde(rename = "lastSync", default)]
    pub last_sync: String,
}

impl JiraSyncResult {
    /// 转成计数器快照
    pub fn to_counters(&self) -> CounterState {
        CounterState {
            pending_tickets: self.pending_tickets,
            total_tickets: self.total_tickets,
            resolved_tickets: self.resolved_tickets,
        }
    }
}

/// `/api/jira/sync` 响应
#[derive(Debug, Deserialize)]
struct SyncResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<JiraSyncResult>,
    #[serde(default)]
    error: Option<String>,
}

/// 同步结果：成功带快照，失败带可展示的状态文案
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Synced {
        result: JiraSyncResult,
        status: String,
    },
    Failed {
        status: String,
    },
}

impl SyncOutcome {
    /// 可展示的状态文案
    pub fn status(&self) -> &str {
        match self {
            SyncOutcome::Synced { status, .. } => status,
            SyncOutcome::Failed { status } => status,
        }
    }

    pub fn is_synced(&self) -> bool {
        matches!(self, SyncOutcome::Synced { .. })
    }
}

/// Jira 配置状态（只读查询，token 永不回显）
#[derive(Debug, Clone, Deserialize)]
pub struct JiraConfigStatus {
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub user_specific: bool,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub jql: Option<String>,
}

/// Jira 配置输入
#[derive(Debug, Clone, Serialize)]
pub struct JiraConfigInput {
    pub url: String,
    pub email: String,
    pub api_token: String,
    /// 空白时使用默认 JQL
    pub jql: String,
}

/// 默认 JQL：分配给当前用户且未完成
pub const DEFAULT_JQL: &str = "assignee = currentUser() AND status != Done";

/// 外部同步适配器
pub struct JiraSyncAdapter {
    http: Arc<ApiHttpClient>,
    kv: Arc<KvStore>,
    store: Arc<SessionStore>,
}

impl JiraSyncAdapter {
    pub fn new(http: Arc<ApiHttpClient>, kv: Arc<KvStore>, store: Arc<SessionStore>) -> Self {
        Self { http, kv, store }
    }

    /// 匿名实例 ID：首次生成后持久化，之后永久复用
    pub async fn instance_id(&self) -> String {
        match self.kv.get::<_, String>(keys::INSTANCE_ID).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                let id = format!("inst_{}", Uuid::new_v4());
                if let Err(e) = self.kv.set(keys::INSTANCE_ID, &id).await {
                    warn!("⚠️ 实例 ID 持久化失败（本次临时使用）: {}", e);
                }
                id
            }
            Err(e) => {
                warn!("⚠️ 读取实例 ID 失败（本次临时生成）: {}", e);
                format!("inst_{}", Uuid::new_v4())
            }
        }
    }

    /// 手动触发同步
    ///
    /// 成功时整体覆盖计数器并镜像到本地缓存；失败时状态不变。
    pub async fn sync(&self) -> SyncOutcome {
        let token = self.store.auth_token().await;
        let instance_id = self.instance_id().await;

        let result = self
            .http
            .post_json::<_, SyncResponse>(
                "/api/jira/sync",
                &serde_json::json!({}),
                token.as_deref(),
                &[("X-User-ID", instance_id.as_str())],
                None,
            )
            .await;

        match result {
            Ok(resp) => match (resp.success, resp.data) {
                (true, Some(data)) => {
                    let counters = data.to_counters();
                    self.store.replace(counters).await;
                    if let Err(e) = self.kv.set(keys::COUNTER_CACHE, &counters).await {
                        warn!("⚠️ 同步结果写缓存失败: {}", e);
                    }

                    let time_str = Local::now().format("%H:%M");
                    let status = format!("✓ Jira 已同步 {}", time_str);
                    info!("✅ Jira 同步完成: {:?}, lastSync={}", counters, data.last_sync);
                    SyncOutcome::Synced {
                        result: data,
                        status,
                    }
                }
                _ => {
                    let detail = resp.error.unwrap_or_else(|| "同步被拒绝".to_string());
                    warn!("⚠️ Jira 同步被服务端拒绝: {}", detail);
                    SyncOutcome::Failed {
                        status: "✗ 同步失败".to_string(),
                    }
                }
            },
            Err(e) if e.is_network_failure() => {
                warn!("⚠️ Jira 同步网络失败: {}", e);
                SyncOutcome::Failed {
                    status: "✗ 连接失败".to_string(),
                }
            }
            Err(e) => {
                warn!("⚠️ Jira 同步失败: {}", e);
                SyncOutcome::Failed {
                    status: "✗ 同步失败".to_string(),
                }
            }
        }
    }

    /// 查询外部同步是否已配置（个人配置优先于全局）
    pub async fn config_status(&self) -> Result<JiraConfigStatus> {
        let instance_id = self.instance_id().await;
        self.http
            .get_json::<JiraConfigStatus>(
                "/api/jira/config",
                None,
                &[("X-User-ID", instance_id.as_str())],
            )
            .await
    }

    /// 保存 Jira 配置
    ///
    /// 必填字段缺失时本地拦截，不会发起请求。保存成功后调用方
    /// 通常会重新查询配置状态并触发一次同步。
    pub async fn save_config(&self, mut input: JiraConfigInput) -> Result<()> {
        input.url = input.url.trim().to_string();
        input.email = input.email.trim().to_string();
        input.api_token = input.api_token.trim().to_string();
        input.jql = input.jql.trim().to_string();

        if input.url.is_empty() || input.email.is_empty() || input.api_token.is_empty() {
            return Err(TickdeskSDKError::InvalidInput(
                "请完整填写 url / email / api_token".to_string(),
            ));
        }
        if input.jql.is_empty() {
            input.jql = DEFAULT_JQL.to_string();
        }

        let instance_id = self.instance_id().await;

        #[derive(Debug, Deserialize)]
        struct ConfigSaveResponse {
            #[serde(default)]
            success: bool,
        }

        let resp = self
            .http
            .post_json::<_, ConfigSaveResponse>(
                "/api/jira/config",
                &input,
                None,
                &[("X-User-ID", instance_id.as_str())],
                None,
            )
            .await?;

        if resp.success {
            info!("✅ Jira 配置已保存");
            Ok(())
        } else {
            Err(TickdeskSDKError::ServerRejected(
                "配置保存被拒绝".to_string(),
            ))
        }
    }
}
