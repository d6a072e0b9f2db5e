//! 基础用法演示
//!
//! 运行前准备一个后端（默认 http://localhost:5000），然后：
//! ```bash
//! TICKDESK_SERVER=http://localhost:5000 TICKDESK_EMAIL=dev@example.com \
//!     cargo run --example basic
//! ```

use std::sync::Arc;
use async_trait::async_trait;
use tickdesk_sdk::{ConfirmProvider, SdkEvent, TickdeskConfig, TickdeskSDK};

/// 终端环境没有确认框，演示里直接放行
struct AutoConfirm;

#[async_trait]
impl ConfirmProvider for AutoConfirm {
    async fn confirm(&self, prompt: &str) -> bool {
        println!("[confirm] {} -> yes", prompt);
        true
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let server_url =
        std::env::var("TICKDESK_SERVER").unwrap_or_else(|_| "http://localhost:5000".to_string());
    let email =
        std::env::var("TICKDESK_EMAIL").unwrap_or_else(|_| "dev@example.com".to_string());

    let config = TickdeskConfig::builder()
        .server_url(server_url)
        .data_dir(std::env::temp_dir().join("tickdesk-demo"))
        .build();

    let sdk = TickdeskSDK::initialize(config).await?;
    sdk.set_confirm_provider(Arc::new(AutoConfirm)).await;

    // 订阅事件，模拟 UI 刷新
    let mut events = sdk.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SdkEvent::CountersChanged { counters, reason } => {
                    println!(
                        "[ui] 计数器刷新 ({}): 待处理={} 总数={} 已解决={}",
                        reason,
                        counters.pending_tickets,
                        counters.total_tickets,
                        counters.resolved_tickets
                    );
                }
                SdkEvent::AuthStateChanged { status, user } => {
                    println!("[ui] 认证状态: {} user={:?}", status, user.map(|u| u.email));
                }
                SdkEvent::SyncStatusChanged { status } => {
                    println!("[ui] 同步状态: {}", status);
                }
            }
        }
    });

    // 认证门先行
    let status = sdk.restore_session().await;
    println!("恢复会话: {}", status);
    if status != tickdesk_sdk::AuthStatus::Authenticated {
        match sdk.login(&email).await {
            Ok(user) => println!("登录成功: {}", user.email),
            Err(e) => {
                println!("登录失败（继续本地模式）: {}", e);
            }
        }
    }

    // 新建两个工单，解决一个
    sdk.new_ticket().await;
    sdk.new_ticket().await;
    sdk.resolve_ticket().await;

    // 检查外部同步配置并尝试同步一次
    match sdk.jira_config_status().await {
        Ok(status) if status.configured => {
            let outcome = sdk.sync_jira().await;
            println!("Jira 同步: {}", outcome.status());
        }
        Ok(_) => println!("Jira 未配置，跳过同步"),
        Err(e) => println!("Jira 配置查询失败: {}", e),
    }

    let counters = sdk.counters().await;
    println!(
        "最终计数: 待处理={} 总数={} 已解决={}",
        counters.pending_tickets, counters.total_tickets, counters.resolved_tickets
    );

    sdk.shutdown().await?;
    Ok(())
}
