//! 中继调用处理器
//!
//! 每个流式请求在独立的 tokio 任务中运行一个 `Relay`，
//! 通过 `ChannelSink` 把 token 写入响应体。响应体被丢弃（调用方断开）时
//! 中继停止读取上游并释放连接。

use axum::{
    body::{Body, Bytes},
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use tracing::Instrument;

use crate::models::PredictRequest;
use crate::providers::InvocationAdapter;
use crate::relay::{body_stream, ChannelSink, Relay, RelayError};
use crate::server::AppState;

/// 响应通道容量（chunk 数）
const STREAM_BUFFER: usize = 32;

const TEXT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}

/// 启动中继任务并返回流式响应
fn spawn_relay<A>(adapter: std::sync::Arc<A>, body: Bytes) -> Response
where
    A: InvocationAdapter + 'static,
{
    let request_id = uuid::Uuid::new_v4().to_string();
    let (sink, rx) = ChannelSink::channel(STREAM_BUFFER);
    let span = tracing::info_span!(
        "relay",
        request_id = %request_id,
        adapter = adapter.name()
    );

    tokio::spawn(
        async move {
            tracing::debug!("[RELAY] 请求体 {} 字节", body.len());
            Relay::new(sink, request_id)
                .run(adapter.as_ref(), &body)
                .await;
        }
        .instrument(span),
    );

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(body_stream(rx)))
        .unwrap_or_else(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Failed to build response"})),
            )
                .into_response()
        })
}

/// POST /predict/stream
pub async fn predict_stream(State(state): State<AppState>, body: Bytes) -> Response {
    spawn_relay(state.sagemaker, body)
}

/// POST /flows/invoke
pub async fn invoke_flow(State(state): State<AppState>, body: Bytes) -> Response {
    spawn_relay(state.flow, body)
}

/// POST /prompts/optimize
pub async fn optimize_prompt(State(state): State<AppState>, body: Bytes) -> Response {
    spawn_relay(state.optimize, body)
}

/// POST /agents/invoke
pub async fn invoke_agent(State(state): State<AppState>, body: Bytes) -> Response {
    spawn_relay(state.agent, body)
}

/// POST /predict - 返回完整文本（JSON 字符串）
pub async fn predict(State(state): State<AppState>, body: Bytes) -> Response {
    let request: PredictRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let err = RelayError::MalformedRequest(e.to_string());
            err.log_with_context("-", state.sagemaker.name());
            return err.into_response();
        }
    };

    match state.sagemaker.invoke(request).await {
        Ok(text) => Json(text).into_response(),
        Err(e) => {
            let err = RelayError::from(e);
            err.log_with_context("-", state.sagemaker.name());
            err.into_response()
        }
    }
}
