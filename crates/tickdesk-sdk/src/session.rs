//! 会话状态存储
//!
//! 唯一持有计数器与认证会话的组件：
//! - 三字段工单计数器（待处理/总数/已解决）
//! - 认证 token 与当前用户身份
//!
//! 所有状态变更必须经过 `SessionStore` 的方法，禁止旁路修改。

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// 工单计数器状态
///
/// 约定 `total == pending + resolved`，但刻意不做校验：
/// 远端加载和外部同步（Jira）可以写入任意三元组，信任外部数据源。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterState {
    /// 待处理工单数
    #[serde(rename = "pendingTickets", default)]
    pub pending_tickets: u64,
    /// 累计工单数
    #[serde(rename = "totalTickets", default)]
    pub total_tickets: u64,
    /// 已解决工单数
    #[serde(rename = "resolvedTickets", default)]
    pub resolved_tickets: u64,
}

impl CounterState {
    /// 全零状态（进程启动时的初始值）
    pub fn zero() -> Self {
        Self::default()
    }
}

/// 当前登录用户身份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub email: String,
}

/// 认证会话
///
/// `current_user` 仅在 token 存在且通过认证门校验后才会出现。
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub auth_token: Option<String>,
    pub current_user: Option<UserIdentity>,
}

#[derive(Debug, Default)]
struct SessionInner {
    counters: CounterState,
    session: Session,
}

/// 会话状态管理器（线程安全）
///
/// 计数器与会话的唯一所有者，注入到各组件中使用，不做任何隐式全局状态。
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    inner: Arc<RwLock<SessionInner>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================
    // 计数器操作
    // ============================================================

    /// 新工单：待处理 +1，总数 +1
    ///
    /// 返回变更后的快照。内存操作不会失败。
    pub async fn increment_pending_and_total(&self) -> CounterState {
        let mut inner = self.inner.write().await;
        inner.counters.pending_tickets += 1;
        inner.counters.total_tickets += 1;
        inner.counters
    }

    /// 解决一个工单：待处理 -1，已解决 +1
    ///
    /// 待处理为 0 时是显式的 no-op（返回 false），不是错误。
    pub async fn resolve_one(&self) -> bool {
        let mut inner = self.inner.write().await;
        if inner.counters.pending_tickets == 0 {
            return false;
        }
        inner.counters.pending_tickets -= 1;
        inner.counters.resolved_tickets += 1;
        true
    }

    /// 清零所有计数器（确认逻辑在 SDK 控制器层，这里只负责状态）
    pub async fn reset(&self) -> CounterState {
        let mut inner = self.inner.write().await;
        inner.counters = CounterState::zero();
        inner.counters
    }

    /// 整体覆盖计数器（远端加载或外部同步）
    ///
    /// 不校验 `total == pending + resolved`，外部数据源说了算。
    pub async fn replace(&self, snapshot: CounterState) {
        let mut inner = self.inner.write().await;
        inner.counters = snapshot;
    }

    /// 获取当前计数器快照
    pub async fn counters(&self) -> CounterState {
        self.inner.read().await.counters
    }

    // ============================================================
    // 认证会话操作
    // ============================================================

    /// 认证成功后写入 token 与用户身份
    pub async fn set_auth(&self, token: String, user: UserIdentity) {
        let mut inner = self.inner.write().await;
        inner.session.auth_token = Some(token);
        inner.session.current_user = Some(user);
    }

    /// 丢弃 token 与用户身份（登出或校验失败）
    pub async fn clear_auth(&self) {
        let mut inner = self.inner.write().await;
        inner.session.auth_token = None;
        inner.session.current_user = None;
    }

    /// 当前 token（存在即带上 Bearer 头）
    pub async fn auth_token(&self) -> Option<String> {
        self.inner.read().await.session.auth_token.clone()
    }

    /// 当前用户身份
    pub async fn current_user(&self) -> Option<UserIdentity> {
        self.inner.read().await.session.current_user.clone()
    }

    /// 会话快照
    pub async fn session(&self) -> Session {
        self.inner.read().await.session.clone()
    }
}
