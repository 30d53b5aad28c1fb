use anyhow::Context;
use genai_relay_lib::config::{self, CONFIG_PATH_ENV};
use genai_relay_lib::{build_router, logger, AppState};
use std::collections::HashMap;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env: HashMap<String, String> = std::env::vars().collect();
    let cli_path = std::env::args().nth(1);
    let config_path = config::resolve_config_path(
        cli_path.as_deref(),
        env.get(CONFIG_PATH_ENV).map(String::as_str),
    );

    let config = config::load_config(&config_path, &env)
        .with_context(|| format!("加载配置失败: {}", config_path.display()))?;
    logger::init(&config.logging);
    tracing::info!("[MAIN] 配置文件: {}", config_path.display());

    let state = AppState::from_config(&config)
        .await
        .context("创建 HTTP 客户端失败")?;
    let app = build_router(state);

    let addr = config.server.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("绑定地址失败: {}", addr))?;
    tracing::info!("[MAIN] 监听 http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("[MAIN] 收到退出信号");
        })
        .await
        .context("服务运行失败")?;

    Ok(())
}
