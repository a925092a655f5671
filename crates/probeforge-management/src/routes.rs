//! Read-only (plus reload/unload/test-tool) HTTP surface over the
//! capability registry and plugin manager. Grounded on the
//! `src/gateway/mod.rs` axum `Router`/`State`/`Json` pattern.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::state::ManagementState;

pub fn router(state: ManagementState) -> Router {
    Router::new()
        .route("/api/status", get(status))
        .route("/api/modules", get(modules))
        .route("/api/tools", get(tools))
        .route("/api/metrics", get(metrics))
        .route("/api/reload", post(reload))
        .route("/api/unload", post(unload))
        .route("/api/test-tool", post(test_tool))
        .with_state(state)
}

async fn status(State(state): State<ManagementState>) -> Json<Value> {
    let stats = state.registry.stats();
    let records = state.plugins.records();
    let active = records
        .values()
        .filter(|r| r.state == probeforge_plugins::PluginState::Active)
        .count();
    Json(json!({
        "plugins": records.len(),
        "active_plugins": active,
        "unique_tools": stats.unique_tools,
        "modules": stats.module_count,
    }))
}

async fn modules(State(state): State<ManagementState>) -> Json<Value> {
    let modules = state.registry.modules();
    Json(json!(modules
        .into_iter()
        .map(|(name, record)| {
            json!({
                "name": name,
                "category": record.category,
                "tools": record.tools,
                "load_duration_ms": record.load_duration.as_millis(),
            })
        })
        .collect::<Vec<_>>()))
}

async fn tools(State(state): State<ManagementState>) -> Json<Value> {
    Json(json!(state.registry.tool_names()))
}

async fn metrics(State(state): State<ManagementState>) -> Json<Value> {
    let stats = state.registry.stats();
    Json(json!({
        "unique_tools": stats.unique_tools,
        "total_registrations": stats.total_registrations,
        "duplicates_skipped": stats.duplicates_skipped,
        "categories": stats.categories,
    }))
}

#[derive(Deserialize)]
struct ModuleRequest {
    module: String,
}

async fn reload(State(state): State<ManagementState>, Json(req): Json<ModuleRequest>) -> Json<Value> {
    match state.plugins.reload(&req.module).await {
        Ok(record) => Json(json!({
            "success": true,
            "module": record.id,
            "state": format!("{:?}", record.state),
        })),
        Err(err) => Json(json!({ "success": false, "error": err.to_string() })),
    }
}

async fn unload(State(state): State<ManagementState>, Json(req): Json<ModuleRequest>) -> Json<Value> {
    match state.plugins.unload(&req.module).await {
        Ok(()) => Json(json!({ "success": true, "module": req.module })),
        Err(err) => Json(json!({ "success": false, "error": err.to_string() })),
    }
}

#[derive(Deserialize)]
struct TestToolRequest {
    name: String,
    #[serde(default)]
    args: Value,
}

async fn test_tool(State(state): State<ManagementState>, Json(req): Json<TestToolRequest>) -> Json<Value> {
    let _ = req.args;
    let found = state.registry.tool_names().iter().any(|t| t == &req.name);
    Json(json!({ "success": found, "name": req.name }))
}
