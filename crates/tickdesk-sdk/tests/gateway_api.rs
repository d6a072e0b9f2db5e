//! 端到端集成测试
//!
//! 用一个极简的 tokio HTTP 固定应答服务器扮演后端 API，
//! 验证认证门、持久化网关与外部同步的完整闭环。

use std::sync::Arc;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use tickdesk_sdk::sdk::ConfirmProvider;
use tickdesk_sdk::{
    keys, AuthStatus, CounterState, HttpClientConfig, JiraConfigInput, KvStore, LoadSource,
    TickdeskConfig, TickdeskSDK,
};

// ============================================================
// 固定应答服务器
// ============================================================

struct FixtureState {
    /// `/api/data` 返回的计数器（`/api/save` 会更新它）
    counters: Value,
    /// 记录的 `/api/save` 请求体
    saves: Vec<Value>,
    /// `/api/auth/me` 的 authenticated 标志
    me_authenticated: bool,
    /// `/api/jira/sync` 的完整响应
    sync_response: Value,
    /// `GET /api/jira/config` 的响应
    jira_config: Value,
    /// 所有请求 (method, path)
    requests: Vec<(String, String)>,
}

impl Default for FixtureState {
    fn default() -> Self {
        Self {
            counters: json!({"pendingTickets": 0, "totalTickets": 0, "resolvedTickets": 0}),
            saves: Vec::new(),
            me_authenticated: true,
            sync_response: json!({"success": false, "error": "not configured"}),
            jira_config: json!({"configured": false}),
            requests: Vec::new(),
        }
    }
}

struct Fixture {
    url: String,
    state: Arc<Mutex<FixtureState>>,
    handle: tokio::task::JoinHandle<()>,
}

impl Fixture {
    async fn saved_actions(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .saves
            .iter()
            .map(|s| s["action"].as_str().unwrap_or("").to_string())
            .collect()
    }

    async fn request_paths(&self) -> Vec<(String, String)> {
        self.state.lock().await.requests.clone()
    }

    fn shutdown(&self) {
        self.handle.abort();
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

async fn route(state: &Arc<Mutex<FixtureState>>, method: &str, path: &str, body: Value) -> (String, Value) {
    let mut st = state.lock().await;
    st.requests.push((method.to_string(), path.to_string()));

    let ok = "200 OK".to_string();
    match (method, path) {
        ("GET", "/api/data") => (ok, st.counters.clone()),
        ("POST", "/api/save") => {
            st.counters = json!({
                "pendingTickets": body["pendingTickets"],
                "totalTickets": body["totalTickets"],
                "resolvedTickets": body["resolvedTickets"],
            });
            st.saves.push(body);
            (ok, json!({"success": true, "month": "2026-08"}))
        }
        ("GET", "/api/auth/me") => (
            ok,
            json!({
                "authenticated": st.me_authenticated,
                "user": {"email": "dev@example.com"},
            }),
        ),
        ("POST", "/api/auth/login") => (
            ok,
            json!({
                "success": true,
                "token": "tok_fixture",
                "user": {"email": body["email"]},
            }),
        ),
        ("POST", "/api/auth/logout") => (ok, json!({"success": true})),
        ("POST", "/api/jira/sync") => (ok, st.sync_response.clone()),
        ("GET", "/api/jira/config") => (ok, st.jira_config.clone()),
        ("POST", "/api/jira/config") => (ok, json!({"success": true})),
        ("GET", "/api/stats/summary") => (
            ok,
            json!({
                "totalTickets": 12,
                "pendingTickets": 4,
                "resolvedTickets": 8,
                "months": [
                    {"month": "2026-07", "totalTickets": 5, "pendingTickets": 0, "resolvedTickets": 5},
                    {"month": "2026-08", "totalTickets": 7, "pendingTickets": 4, "resolvedTickets": 3},
                ],
            }),
        ),
        _ => ("404 Not Found".to_string(), json!({"error": "not found"})),
    }
}

async fn spawn_fixture(initial: FixtureState) -> Fixture {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(Mutex::new(initial));

    let accept_state = state.clone();
    let handle = tokio::spawn(async move {
        loop {
            let (mut socket, _) = match listener.accept().await {
                Ok(pair) => pair,
                Err(_) => break,
            };
            let conn_state = accept_state.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let mut tmp = [0u8; 1024];

                // 读到头部结束
                let header_end = loop {
                    let n = match socket.read(&mut tmp).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&tmp[..n]);
                    if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
                        break pos + 4;
                    }
                    if buf.len() > 65536 {
                        return;
                    }
                };

                let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
                let mut lines = head.lines();
                let request_line = lines.next().unwrap_or("");
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or("").to_string();
                let path = parts.next().unwrap_or("").to_string();

                let mut content_length = 0usize;
                for line in lines {
                    if let Some((name, value)) = line.split_once(':') {
                        if name.eq_ignore_ascii_case("content-length") {
                            content_length = value.trim().parse().unwrap_or(0);
                        }
                    }
                }

                // 读完请求体
                while buf.len() < header_end + content_length {
                    let n = match socket.read(&mut tmp).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    buf.extend_from_slice(&tmp[..n]);
                }
                let body: Value = if content_length > 0 && buf.len() >= header_end + content_length
                {
                    serde_json::from_slice(&buf[header_end..header_end + content_length])
                        .unwrap_or(Value::Null)
                } else {
                    Value::Null
                };

                let (status, response) = route(&conn_state, &method, &path, body).await;
                let body_text = response.to_string();
                let reply = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body_text.len(),
                    body_text
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    Fixture {
        url: format!("http://{}", addr),
        state,
        handle,
    }
}

// ============================================================
// 测试辅助
// ============================================================

struct AlwaysConfirm;

#[async_trait::async_trait]
impl ConfirmProvider for AlwaysConfirm {
    async fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

fn sdk_config(fixture: &Fixture, temp_dir: &TempDir) -> TickdeskConfig {
    TickdeskConfig::builder()
        .server_url(fixture.url.clone())
        .data_dir(temp_dir.path())
        .http_client_config(HttpClientConfig {
            connect_timeout_secs: Some(2),
            request_timeout_secs: Some(5),
        })
        .build()
}

// ============================================================
// 测试用例
// ============================================================

#[tokio::test]
async fn test_save_then_load_round_trip() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    let user = sdk.login("dev@example.com").await.unwrap();
    assert_eq!(user.email, "dev@example.com");
    assert_eq!(sdk.auth_status().await, AuthStatus::Authenticated);

    // 3 次新建 + 1 次解决 → {2, 3, 1}
    sdk.new_ticket().await;
    sdk.new_ticket().await;
    sdk.new_ticket().await;
    sdk.resolve_ticket().await;

    assert!(sdk.save_now().await);

    // 远端回读与保存一致
    let outcome = sdk.load_data().await.unwrap();
    assert_eq!(outcome.source, LoadSource::Remote);
    assert_eq!(
        outcome.counters,
        CounterState {
            pending_tickets: 2,
            total_tickets: 3,
            resolved_tickets: 1,
        }
    );

    let actions = fixture.saved_actions().await;
    assert_eq!(
        actions,
        vec![
            "new_ticket",
            "new_ticket",
            "new_ticket",
            "ticket_resolved",
            "manual_update",
        ]
    );

    fixture.shutdown();
}

#[tokio::test]
async fn test_load_falls_back_to_cache_when_server_dies() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    sdk.login("dev@example.com").await.unwrap();
    sdk.new_ticket().await;

    // 服务端消失后加载回退到本地缓存快照
    fixture.shutdown();

    let outcome = sdk.load_data().await.unwrap();
    assert_eq!(outcome.source, LoadSource::LocalCache);
    assert_eq!(
        outcome.counters,
        CounterState {
            pending_tickets: 1,
            total_tickets: 1,
            resolved_tickets: 0,
        }
    );
}

#[tokio::test]
async fn test_stale_token_forces_relogin() {
    let fixture = spawn_fixture(FixtureState {
        me_authenticated: false,
        ..FixtureState::default()
    })
    .await;
    let temp_dir = TempDir::new().unwrap();

    // 预埋一个已失效的 token（实例先关掉，释放 sled 锁）
    {
        let kv = KvStore::new(temp_dir.path()).await.unwrap();
        kv.set(keys::AUTH_TOKEN, &"stale_token".to_string())
            .await
            .unwrap();
        kv.flush().await.unwrap();
    }

    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    // authenticated=false → token 丢弃，回到登录
    let status = sdk.restore_session().await;
    assert_eq!(status, AuthStatus::Unauthenticated);
    assert!(sdk.current_user().await.is_none());

    // 认证没过就不拉数据
    let requests = fixture.request_paths().await;
    assert!(requests.contains(&("GET".to_string(), "/api/auth/me".to_string())));
    assert!(!requests.contains(&("GET".to_string(), "/api/data".to_string())));

    fixture.shutdown();
}

#[tokio::test]
async fn test_reset_persists_exactly_once_with_reset_tag() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    sdk.login("dev@example.com").await.unwrap();
    sdk.new_ticket().await;

    sdk.set_confirm_provider(Arc::new(AlwaysConfirm)).await;
    assert!(sdk.reset_all().await);
    assert_eq!(sdk.counters().await, CounterState::zero());

    let actions = fixture.saved_actions().await;
    assert_eq!(
        actions.iter().filter(|a| a.as_str() == "reset").count(),
        1
    );

    // 远端状态也已清零
    let outcome = sdk.load_data().await.unwrap();
    assert_eq!(outcome.counters, CounterState::zero());

    fixture.shutdown();
}

#[tokio::test]
async fn test_sync_overwrites_unpersisted_local_edits() {
    let fixture = spawn_fixture(FixtureState {
        sync_response: json!({
            "success": true,
            "data": {
                "pendingTickets": 5,
                "totalTickets": 10,
                "resolvedTickets": 5,
                "lastSync": "2026-08-29T10:00:00",
            },
        }),
        ..FixtureState::default()
    })
    .await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    sdk.login("dev@example.com").await.unwrap();
    sdk.new_ticket().await;

    let outcome = sdk.sync_jira().await;
    assert!(outcome.is_synced());
    assert!(outcome.status().starts_with('✓'));

    // 外部快照整体覆盖，包括刚才的本地修改
    assert_eq!(
        sdk.counters().await,
        CounterState {
            pending_tickets: 5,
            total_tickets: 10,
            resolved_tickets: 5,
        }
    );

    fixture.shutdown();
}

#[tokio::test]
async fn test_unauthenticated_session_is_local_only() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    // 不登录直接操作：本地可用，远端不应收到任何保存
    sdk.new_ticket().await;
    sdk.resolve_ticket().await;

    let requests = fixture.request_paths().await;
    assert!(!requests.contains(&("POST".to_string(), "/api/save".to_string())));

    fixture.shutdown();
}

#[tokio::test]
async fn test_flush_on_exit_dispatches_beforeunload() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    sdk.login("dev@example.com").await.unwrap();
    sdk.new_ticket().await;
    sdk.flush_on_exit().await;

    // 单向投递是异步的，轮询等待送达
    let mut delivered = false;
    for _ in 0..40 {
        if fixture
            .saved_actions()
            .await
            .iter()
            .any(|a| a == "beforeunload")
        {
            delivered = true;
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    assert!(delivered, "beforeunload 保存未送达");

    fixture.shutdown();
}

#[tokio::test]
async fn test_logout_resets_ui_without_persisting() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    sdk.login("dev@example.com").await.unwrap();
    sdk.new_ticket().await;
    let saves_before = fixture.saved_actions().await.len();

    sdk.logout().await;
    assert_eq!(sdk.auth_status().await, AuthStatus::Unauthenticated);
    assert_eq!(sdk.counters().await, CounterState::zero());

    // 登出清零只是 UI 重置，不触发保存
    assert_eq!(fixture.saved_actions().await.len(), saves_before);

    fixture.shutdown();
}

#[tokio::test]
async fn test_jira_config_flow() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    // 未配置 → 提示用户去配置
    let status = sdk.jira_config_status().await.unwrap();
    assert!(!status.configured);

    // 缺必填字段：本地拦截，服务端不应收到写请求
    let err = sdk
        .save_jira_config(JiraConfigInput {
            url: String::new(),
            email: "dev@example.com".to_string(),
            api_token: "secret".to_string(),
            jql: String::new(),
        })
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        tickdesk_sdk::TickdeskSDKError::InvalidInput(_)
    ));
    let requests = fixture.request_paths().await;
    assert!(!requests.contains(&("POST".to_string(), "/api/jira/config".to_string())));

    // 完整配置 → 保存成功
    sdk.save_jira_config(JiraConfigInput {
        url: "https://example.atlassian.net".to_string(),
        email: "dev@example.com".to_string(),
        api_token: "secret".to_string(),
        jql: String::new(),
    })
    .await
    .unwrap();
    let requests = fixture.request_paths().await;
    assert!(requests.contains(&("POST".to_string(), "/api/jira/config".to_string())));

    fixture.shutdown();
}

#[tokio::test]
async fn test_stats_summary() {
    let fixture = spawn_fixture(FixtureState::default()).await;
    let temp_dir = TempDir::new().unwrap();
    let sdk = TickdeskSDK::initialize(sdk_config(&fixture, &temp_dir))
        .await
        .unwrap();

    sdk.login("dev@example.com").await.unwrap();

    let summary = sdk.stats_summary().await.unwrap();
    assert_eq!(summary.total_tickets, 12);
    assert_eq!(summary.months.len(), 2);
    assert_eq!(summary.months[1].month, "2026-08");

    fixture.shutdown();
}
