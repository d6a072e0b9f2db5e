//! 事件系统模块 - SDK 与 UI 层的通知通道
//!
//! 每次状态变更（计数器、认证、同步状态）都会广播一个事件，
//! 由嵌入方订阅后刷新可见表示。SDK 自身不触碰任何渲染。

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::auth::AuthStatus;
use crate::session::{CounterState, UserIdentity};

/// SDK 事件类型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SdkEvent {
    /// 计数器变更（用户操作、远端加载、外部同步、登出清零）
    CountersChanged {
        counters: CounterState,
        reason: String,
    },
    /// 认证状态变更
    AuthStateChanged {
        status: AuthStatus,
        user: Option<UserIdentity>,
    },
    /// 同步状态文案变更（人类可读，直接展示）
    SyncStatusChanged { status: String },
}

/// 事件总线（broadcast，多订阅者）
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SdkEvent>,
}

impl EventBus {
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// 订阅事件流
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.sender.subscribe()
    }

    /// 广播事件（没有订阅者不算错误）
    pub fn emit(&self, event: SdkEvent) {
        if let Err(e) = self.sender.send(event) {
            debug!("事件无订阅者，丢弃: {:?}", e.0);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}
