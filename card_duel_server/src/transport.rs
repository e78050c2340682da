use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use card_duel_core::{ClientMessage, ServerMessage};
use futures_util::{stream::StreamExt, SinkExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::registry::MemoryStore;
use crate::router::{ConnectionContext, ConnectionRouter};

/// 组装 HTTP 应用：`/ws` 为对战连接，其余路径作为静态资源
pub fn app(router: ConnectionRouter, static_dir: &Path) -> Router {
    Router::new()
        .route("/ws", get(websocket_handler))
        .route("/healthz", get(health))
        .fallback_service(ServeDir::new(static_dir))
        .with_state(router)
}

/// 绑定监听地址并一直运行
pub async fn serve(config: ServerConfig) -> anyhow::Result<()> {
    let router = ConnectionRouter::new(Arc::new(MemoryStore::new()));
    let app = app(router, &config.static_dir);

    let addr = config.addr();
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("无法监听 {addr}"))?;
    info!("服务器正在监听 {}", addr);
    axum::serve(listener, app).await.context("服务器异常退出")?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}

/// 处理 WebSocket 连接请求
async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(router): State<ConnectionRouter>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, router))
}

/// 处理单个 WebSocket 连接的生命周期
async fn handle_socket(socket: WebSocket, router: ConnectionRouter) {
    let (mut sender, mut receiver) = socket.split();

    // 对局通过这个通道向当前连接推送消息
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();

    // 启动一个新任务，专门负责将通道中的消息写入 WebSocket
    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let payload = match serde_json::to_string(&msg) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!("序列化消息失败: {}", e);
                    continue;
                }
            };
            if sender.send(Message::Text(payload.into())).await.is_err() {
                // 发送失败，说明客户端已断开，退出任务
                break;
            }
        }
    });

    let mut context = ConnectionContext::new(tx);
    info!(connection = %context.id, "客户端已连接");

    // 主循环，处理从客户端接收到的消息
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => router.handle(&mut context, client_msg),
                Err(e) => warn!(connection = %context.id, "解析消息失败: {}", e),
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    // 客户端断开连接，执行清理工作
    router.disconnect(&mut context);
    writer.abort();
    info!(connection = %context.id, "客户端连接关闭");
}
