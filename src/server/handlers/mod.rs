//! 请求处理器

mod relay_calls;

pub use relay_calls::{invoke_agent, invoke_flow, optimize_prompt, predict, predict_stream};

use axum::Json;
use serde_json::{json, Value};

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}
