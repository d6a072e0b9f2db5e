//! 认证门
//!
//! 任何数据操作之前先过认证门，状态机：
//! `Unauthenticated -> Validating -> {Authenticated, Unauthenticated}`
//!
//! - 启动时恢复缓存的 token 并调用校验端点
//! - 校验失败（网络错误、非 2xx、authenticated=false）一律丢弃 token 重新登录
//! - 登录只需邮箱，签发逻辑在服务端，SDK 不关心

use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, TickdeskSDKError};
use crate::http_client::ApiHttpClient;
use crate::session::{SessionStore, UserIdentity};
use crate::storage::{keys, KvStore};

/// 认证状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthStatus {
    /// 未认证（需要登录）
    Unauthenticated,
    /// 校验中
    Validating,
    /// 已认证
    Authenticated,
}

impl std::fmt::Display for AuthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthStatus::Unauthenticated => write!(f, "未认证"),
            AuthStatus::Validating => write!(f, "校验中"),
            AuthStatus::Authenticated => write!(f, "已认证"),
        }
    }
}

/// `/api/auth/me` 响应
#[derive(Debug, Deserialize)]
struct MeResponse {
    #[serde(default)]
    authenticated: bool,
    #[serde(default)]
    user: Option<UserIdentity>,
}

/// `/api/auth/login` 请求体（只有邮箱，没有密码）
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
}

/// `/api/auth/login` 响应
#[derive(Debug, Deserialize)]
struct LoginResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    user: Option<UserIdentity>,
    #[serde(default)]
    error: Option<String>,
}

/// 认证门
pub struct AuthGate {
    http: Arc<ApiHttpClient>,
    kv: Arc<KvStore>,
    store: Arc<SessionStore>,
    status: Arc<RwLock<AuthStatus>>,
}

impl AuthGate {
    pub fn new(http: Arc<ApiHttpClient>, kv: Arc<KvStore>, store: Arc<SessionStore>) -> Self {
        Self {
            http,
            kv,
            store,
            status: Arc::new(RwLock::new(AuthStatus::Unauthenticated)),
        }
    }

    /// 当前认证状态
    pub async fn status(&self) -> AuthStatus {
        *self.status.read().await
    }

    async fn set_status(&self, status: AuthStatus) {
        *self.status.write().await = status;
    }

    /// 启动时恢复会话
    ///
    /// 没有缓存 token 直接回到未认证并等待登录；有则走校验端点。
    /// 任何失败都丢弃 token，不会让过期凭证留在缓存里。
    pub async fn restore(&self) -> AuthStatus {
        let token: Option<String> = match self.kv.get(keys::AUTH_TOKEN).await {
            Ok(token) => token,
            Err(e) => {
                warn!("⚠️ 读取缓存 token 失败，按未登录处理: {}", e);
                None
            }
        };

        let Some(token) = token else {
            self.set_status(AuthStatus::Unauthenticated).await;
            info!("无缓存 token，等待登录");
            return AuthStatus::Unauthenticated;
        };

        self.set_status(AuthStatus::Validating).await;

        match self
            .http
            .get_json::<MeResponse>("/api/auth/me", Some(&token), &[])
            .await
        {
            Ok(me) if me.authenticated => {
                let user = me.user.unwrap_or(UserIdentity {
                    email: String::new(),
                });
                info!("✅ token 校验通过: user={}", user.email);
                self.store.set_auth(token, user).await;
                self.set_status(AuthStatus::Authenticated).await;
                AuthStatus::Authenticated
            }
            Ok(_) => {
                warn!("⚠️ token 已失效，丢弃并要求重新登录");
                self.discard_token().await;
                AuthStatus::Unauthenticated
            }
            Err(e) => {
                warn!("⚠️ token 校验失败，丢弃并要求重新登录: {}", e);
                self.discard_token().await;
                AuthStatus::Unauthenticated
            }
        }
    }

    /// 登录（仅邮箱）
    ///
    /// 成功后 token 落缓存、会话写入用户身份，调用方随后触发首次数据加载。
    pub async fn login(&self, email: &str) -> Result<UserIdentity> {
        let email = email.trim();
        if email.is_empty() {
            return Err(TickdeskSDKError::InvalidInput("邮箱不能为空".to_string()));
        }

        self.set_status(AuthStatus::Validating).await;

        let resp = match self
            .http
            .post_json::<_, LoginResponse>("/api/auth/login", &LoginRequest { email }, None, &[], None)
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                self.set_status(AuthStatus::Unauthenticated).await;
                return Err(e);
            }
        };

        match (resp.success, resp.token) {
            (true, Some(token)) => {
                if let Err(e) = self.kv.set(keys::AUTH_TOKEN, &token).await {
                    // 本次会话仍可用，只是下次启动要重新登录
                    warn!("⚠️ token 写入缓存失败: {}", e);
                }
                let user = resp.user.unwrap_or(UserIdentity {
                    email: email.to_string(),
                });
                self.store.set_auth(token, user.clone()).await;
                self.set_status(AuthStatus::Authenticated).await;
                info!("✅ 登录成功: user={}", user.email);
                Ok(user)
            }
            _ => {
                self.set_status(AuthStatus::Unauthenticated).await;
                let message = resp
                    .error
                    .unwrap_or_else(|| "登录失败，请稍后重试".to_string());
                Err(TickdeskSDKError::ServerRejected(message))
            }
        }
    }

    /// 登出
    ///
    /// 服务端通知是尽力而为（失败忽略），本地 token 与身份无条件丢弃。
    /// 可见计数器的清零由控制器层处理，且不会作为保存落盘。
    pub async fn logout(&self) {
        if let Some(token) = self.store.auth_token().await {
            if let Err(e) = self
                .http
                .post_json::<_, serde_json::Value>(
                    "/api/auth/logout",
                    &serde_json::json!({}),
                    Some(&token),
                    &[],
                    None,
                )
                .await
            {
                warn!("⚠️ 登出通知失败（忽略）: {}", e);
            }
        }

        self.discard_token().await;
        info!("已登出");
    }

    async fn discard_token(&self) {
        if let Err(e) = self.kv.delete(keys::AUTH_TOKEN).await {
            warn!("⚠️ 删除缓存 token 失败: {}", e);
        }
        self.store.clear_auth().await;
        self.set_status(AuthStatus::Unauthenticated).await;
    }
}
