//! Tickdesk SDK 核心控制器
//!
//! 组装并拥有所有组件，对外提供完整的工单计数器会话管理：
//! - 认证门先行，通过后才水合数据（远端优先、缓存回退）
//! - 每次用户变更都成对触发：尽力而为的持久化 + 事件广播，无一例外
//! - 外部同步随时可以整体覆盖本地状态
//!
//! 快捷键（新建/解决/同步）与卸载冲刷由嵌入方接入，语义与这里的方法完全一致。

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::auth::{AuthGate, AuthStatus};
use crate::error::{Result, TickdeskSDKError};
use crate::events::{EventBus, SdkEvent};
use crate::gateway::{LoadOutcome, PersistenceGateway, StatsSummary};
use crate::http_client::ApiHttpClient;
use crate::jira::{JiraConfigInput, JiraConfigStatus, JiraSyncAdapter, SyncOutcome};
use crate::session::{CounterState, SessionStore, UserIdentity};
use crate::storage::KvStore;

/// HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// 连接超时（秒）
    pub connect_timeout_secs: Option<u64>,
    /// 请求超时（秒）
    pub request_timeout_secs: Option<u64>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: Some(10),
            request_timeout_secs: Some(30),
        }
    }
}

/// Tickdesk SDK 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickdeskConfig {
    /// 后端 API 基础 URL（如 http://localhost:5000）
    pub server_url: String,
    /// 数据存储目录（本地缓存）
    pub data_dir: PathBuf,
    /// 保存操作的取消超时（秒），超时只中断请求，内存状态不回滚
    pub save_timeout_secs: u64,
    /// HTTP 客户端配置
    pub http_client_config: HttpClientConfig,
    /// 事件缓冲区大小
    pub event_buffer_size: usize,
    /// 调试模式
    pub debug_mode: bool,
}

impl Default for TickdeskConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:5000".to_string(),
            data_dir: get_default_data_dir(),
            save_timeout_secs: 5,
            http_client_config: HttpClientConfig::default(),
            event_buffer_size: 64,
            debug_mode: false,
        }
    }
}

/// 获取默认数据目录 ~/.tickdesk/
fn get_default_data_dir() -> PathBuf {
    if let Some(home_dir) = std::env::var("HOME").ok().map(PathBuf::from) {
        home_dir.join(".tickdesk")
    } else if let Some(home_dir) = std::env::var("USERPROFILE").ok().map(PathBuf::from) {
        // Windows 支持
        home_dir.join(".tickdesk")
    } else {
        PathBuf::from("./tickdesk_data")
    }
}

/// Tickdesk SDK 配置构建器
pub struct TickdeskConfigBuilder {
    config: TickdeskConfig,
}

impl TickdeskConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: TickdeskConfig::default(),
        }
    }

    pub fn server_url<S: Into<String>>(mut self, url: S) -> Self {
        self.config.server_url = url.into();
        self
    }

    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    pub fn save_timeout_secs(mut self, secs: u64) -> Self {
        self.config.save_timeout_secs = secs;
        self
    }

    pub fn http_client_config(mut self, config: HttpClientConfig) -> Self {
        self.config.http_client_config = config;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.config.event_buffer_size = size;
        self
    }

    pub fn debug_mode(mut self, enabled: bool) -> Self {
        self.config.debug_mode = enabled;
        self
    }

    pub fn build(self) -> TickdeskConfig {
        self.config
    }
}

impl Default for TickdeskConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TickdeskConfig {
    pub fn builder() -> TickdeskConfigBuilder {
        TickdeskConfigBuilder::new()
    }
}

/// 用户确认回调
///
/// 危险操作（重置计数器）前由嵌入方弹出阻塞式确认框。
/// 未注册回调时一律当做取消处理。
#[async_trait]
pub trait ConfirmProvider: Send + Sync {
    async fn confirm(&self, prompt: &str) -> bool;
}

/// Tickdesk SDK
///
/// 工单计数器会话管理器，所有状态的唯一入口。
pub struct TickdeskSDK {
    config: TickdeskConfig,
    store: Arc<SessionStore>,
    kv: Arc<KvStore>,
    gateway: Arc<PersistenceGateway>,
    auth: Arc<AuthGate>,
    jira: Arc<JiraSyncAdapter>,
    events: Arc<EventBus>,
    confirm_provider: RwLock<Option<Arc<dyn ConfirmProvider>>>,
}

impl TickdeskSDK {
    /// 初始化 SDK（只组装组件，不发起网络请求）
    pub async fn initialize(config: TickdeskConfig) -> Result<Arc<Self>> {
        tokio::fs::create_dir_all(&config.data_dir)
            .await
            .map_err(|e| TickdeskSDKError::IO(format!("创建数据目录失败: {}", e)))?;

        let kv = Arc::new(KvStore::new(&config.data_dir).await?);
        let http = Arc::new(ApiHttpClient::new(
            &config.http_client_config,
            config.server_url.clone(),
        )?);
        let store = Arc::new(SessionStore::new());
        let gateway = Arc::new(PersistenceGateway::new(
            http.clone(),
            kv.clone(),
            store.clone(),
            Duration::from_secs(config.save_timeout_secs),
        ));
        let auth = Arc::new(AuthGate::new(http.clone(), kv.clone(), store.clone()));
        let jira = Arc::new(JiraSyncAdapter::new(http, kv.clone(), store.clone()));
        let events = Arc::new(EventBus::new(config.event_buffer_size));

        info!(
            "✅ Tickdesk SDK 初始化完成: server={}, version={}",
            config.server_url,
            crate::version::SDK_VERSION
        );

        Ok(Arc::new(Self {
            config,
            store,
            kv,
            gateway,
            auth,
            jira,
            events,
            confirm_provider: RwLock::new(None),
        }))
    }

    // ============================================================
    // 认证流程
    // ============================================================

    /// 启动时恢复会话：认证门先行，通过后水合数据
    pub async fn restore_session(&self) -> AuthStatus {
        let status = self.auth.restore().await;
        self.emit_auth_state().await;

        if status == AuthStatus::Authenticated {
            // 认证通过才允许拉数据
            if let Err(e) = self.load_data().await {
                warn!("⚠️ 初始数据加载失败: {}", e);
            }
        }
        status
    }

    /// 登录并触发首次数据加载
    pub async fn login(&self, email: &str) -> Result<UserIdentity> {
        let user = self.auth.login(email).await?;
        self.emit_auth_state().await;

        if let Err(e) = self.load_data().await {
            warn!("⚠️ 登录后数据加载失败: {}", e);
        }
        Ok(user)
    }

    /// 登出
    ///
    /// 可见计数器清零只是 UI 重置，不会作为保存落盘。
    pub async fn logout(&self) {
        self.auth.logout().await;

        self.store.replace(CounterState::zero()).await;
        self.events.emit(SdkEvent::CountersChanged {
            counters: CounterState::zero(),
            reason: "logout".to_string(),
        });
        self.emit_auth_state().await;
    }

    /// 当前认证状态
    pub async fn auth_status(&self) -> AuthStatus {
        self.auth.status().await
    }

    /// 当前登录用户
    pub async fn current_user(&self) -> Option<UserIdentity> {
        self.store.current_user().await
    }

    // ============================================================
    // 计数器操作（快捷键与按钮共用同一入口）
    // ============================================================

    /// 新建工单（Ctrl/Cmd+N 等价入口）
    pub async fn new_ticket(&self) -> CounterState {
        let snapshot = self.store.increment_pending_and_total().await;
        self.persist_and_notify(snapshot, "new_ticket").await;
        snapshot
    }

    /// 解决一个工单（Ctrl/Cmd+R 等价入口）
    ///
    /// 待处理为 0 时是 no-op：状态不变、不持久化、不广播。
    pub async fn resolve_ticket(&self) -> CounterState {
        if !self.store.resolve_one().await {
            return self.store.counters().await;
        }
        let snapshot = self.store.counters().await;
        self.persist_and_notify(snapshot, "ticket_resolved").await;
        snapshot
    }

    /// 重置所有计数器
    ///
    /// 必须经过确认回调；取消（或未注册回调）时状态不动、不持久化。
    /// 确认后清零并精确触发一次标签为 `reset` 的保存。
    pub async fn reset_all(&self) -> bool {
        let provider = self.confirm_provider.read().await.clone();
        let confirmed = match provider {
            Some(provider) => provider.confirm("确定要重置所有计数器吗？").await,
            None => {
                warn!("未注册确认回调，重置按取消处理");
                false
            }
        };
        if !confirmed {
            return false;
        }

        let snapshot = self.store.reset().await;
        self.persist_and_notify(snapshot, "reset").await;
        true
    }

    /// 手动保存当前状态（标签 manual_update）
    pub async fn save_now(&self) -> bool {
        let snapshot = self.store.counters().await;
        let saved = self.gateway.save(&snapshot, "manual_update").await;
        self.events.emit(SdkEvent::CountersChanged {
            counters: snapshot,
            reason: "manual_update".to_string(),
        });
        saved
    }

    /// 退出前冲刷（beforeunload 等价入口）
    ///
    /// 单向投递，不等待回执，进程终止导致丢失可接受。
    pub async fn flush_on_exit(&self) {
        let snapshot = self.store.counters().await;
        self.gateway.save_on_unload(&snapshot).await;
    }

    /// 当前计数器快照
    pub async fn counters(&self) -> CounterState {
        self.store.counters().await
    }

    // ============================================================
    // 数据加载与外部同步
    // ============================================================

    /// 从持久化网关水合状态（仅认证后可用）
    pub async fn load_data(&self) -> Result<LoadOutcome> {
        if self.auth.status().await != AuthStatus::Authenticated {
            return Err(TickdeskSDKError::Auth(
                "未登录，认证通过前不拉取数据".to_string(),
            ));
        }

        let outcome = self.gateway.load().await;
        self.store.replace(outcome.counters).await;
        self.events.emit(SdkEvent::CountersChanged {
            counters: outcome.counters,
            reason: "load".to_string(),
        });

        if let Some(sync) = &outcome.jira_sync {
            self.events.emit(SdkEvent::SyncStatusChanged {
                status: format!("✓ Jira 已同步 {}", sync.last_sync),
            });
        }

        Ok(outcome)
    }

    /// 手动 Jira 同步（Ctrl/Cmd+S 等价入口）
    ///
    /// 成功时外部快照整体覆盖本地状态（包括尚未保存的修改）。
    pub async fn sync_jira(&self) -> SyncOutcome {
        self.events.emit(SdkEvent::SyncStatusChanged {
            status: "同步中...".to_string(),
        });

        let outcome = self.jira.sync().await;

        if outcome.is_synced() {
            let counters = self.store.counters().await;
            self.events.emit(SdkEvent::CountersChanged {
                counters,
                reason: "jira_sync".to_string(),
            });
        }
        self.events.emit(SdkEvent::SyncStatusChanged {
            status: outcome.status().to_string(),
        });

        outcome
    }

    /// 查询 Jira 配置状态（用于决定是否提示配置）
    pub async fn jira_config_status(&self) -> Result<JiraConfigStatus> {
        self.jira.config_status().await
    }

    /// 保存 Jira 配置（保存成功后通常紧接一次 `sync_jira`）
    pub async fn save_jira_config(&self, input: JiraConfigInput) -> Result<()> {
        self.jira.save_config(input).await
    }

    /// 获取统计汇总（当前值 + 月度历史）
    pub async fn stats_summary(&self) -> Result<StatsSummary> {
        self.gateway.stats_summary().await
    }

    // ============================================================
    // 事件与扩展点
    // ============================================================

    /// 订阅 SDK 事件流
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.events.subscribe()
    }

    /// 注册危险操作确认回调
    pub async fn set_confirm_provider(&self, provider: Arc<dyn ConfirmProvider>) {
        *self.confirm_provider.write().await = Some(provider);
    }

    /// 关闭 SDK：冲刷状态并保证缓存落盘
    pub async fn shutdown(&self) -> Result<()> {
        self.flush_on_exit().await;
        self.kv.flush().await?;
        info!("Tickdesk SDK 已关闭");
        Ok(())
    }

    /// 当前配置
    pub fn config(&self) -> &TickdeskConfig {
        &self.config
    }

    async fn emit_auth_state(&self) {
        self.events.emit(SdkEvent::AuthStateChanged {
            status: self.auth.status().await,
            user: self.store.current_user().await,
        });
    }

    /// 每次变更的成对副作用：尽力而为的持久化 + 事件广播
    async fn persist_and_notify(&self, snapshot: CounterState, reason: &str) {
        let saved = self.gateway.save(&snapshot, reason).await;
        if !saved && self.config.debug_mode {
            warn!("保存未成功（已写本地缓存）: reason={}", reason);
        }
        self.events.emit(SdkEvent::CountersChanged {
            counters: snapshot,
            reason: reason.to_string(),
        });
    }
}
