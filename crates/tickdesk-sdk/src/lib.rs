//! Tickdesk SDK - 工单计数器会话管理
//!
//! 本 SDK 提供完整的客户端工单计数功能，包括：
//! - 🎫 三字段计数器：待处理 / 总数 / 已解决
//! - 💾 持久化网关：远端 API 优先，本地缓存回退，永不因网络报错
//! - 🔐 认证门：Bearer token 校验，失败强制重新登录
//! - 🔄 外部同步：Jira 计数整体覆盖本地状态
//! - ⚙️ 事件系统：每次变更广播给嵌入方刷新界面
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use tickdesk_sdk::{TickdeskSDK, TickdeskConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = TickdeskConfig::builder()
//!         .server_url("http://localhost:5000")
//!         .data_dir("/path/to/data")
//!         .build();
//!
//!     // 初始化并恢复会话
//!     let sdk = TickdeskSDK::initialize(config).await?;
//!     let status = sdk.restore_session().await;
//!     println!("认证状态: {}", status);
//!
//!     // 订阅事件刷新界面
//!     let mut events = sdk.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("事件: {:?}", event);
//!         }
//!     });
//!
//!     // 新建并解决工单
//!     sdk.new_ticket().await;
//!     sdk.resolve_ticket().await;
//!
//!     // 关闭前冲刷
//!     sdk.shutdown().await?;
//!
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod error;
pub mod version;
pub mod session;
pub mod storage;
pub mod http_client;
pub mod gateway;
pub mod auth;
pub mod jira;
pub mod events;
pub mod sdk;

// 重新导出核心类型，方便使用
pub use error::{Result, TickdeskSDKError};
pub use session::{CounterState, Session, SessionStore, UserIdentity};
pub use auth::{AuthGate, AuthStatus};
pub use gateway::{LoadOutcome, LoadSource, MonthStats, PersistenceGateway, StatsSummary};
pub use jira::{
    JiraConfigInput, JiraConfigStatus, JiraSyncAdapter, JiraSyncResult, SyncOutcome, DEFAULT_JQL,
};
pub use events::{EventBus, SdkEvent};
pub use http_client::ApiHttpClient;
pub use storage::{keys, KvStore};
pub use sdk::{
    ConfirmProvider, HttpClientConfig, TickdeskConfig, TickdeskConfigBuilder, TickdeskSDK,
};
