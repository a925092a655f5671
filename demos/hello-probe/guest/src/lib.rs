//! hello-probe — example probeforge plugin guest module.
//!
//! Demonstrates the minimal plugin contract this implementation expects of a
//! WASM entry: a `describe` export returning the plugin's capability surface
//! as JSON, and one export per capability kind the host forwards calls to.

use extism_pdk::*;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ToolDescriptor {
    name: String,
    title: Option<String>,
    description: String,
    input_schema: serde_json::Value,
}

#[derive(Serialize)]
struct CaptureDescriptor {
    tools: Vec<ToolDescriptor>,
    resources: Vec<serde_json::Value>,
    prompts: Vec<serde_json::Value>,
}

#[plugin_fn]
pub fn describe(_: ()) -> FnResult<Json<CaptureDescriptor>> {
    Ok(Json(CaptureDescriptor {
        tools: vec![ToolDescriptor {
            name: "probe_host".into(),
            title: Some("Probe Host".into()),
            description: "Report a synthetic reachability result for a named host.".into(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "host": {
                        "type": "string",
                        "description": "Hostname or address to probe"
                    }
                },
                "required": ["host"]
            }),
        }],
        resources: vec![],
        prompts: vec![],
    }))
}

#[derive(Deserialize)]
struct CallToolInput {
    tool: String,
    args: serde_json::Value,
}

#[derive(Serialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: String,
}

#[derive(Serialize)]
struct ToolCallResult {
    content: Vec<ContentBlock>,
    is_error: bool,
}

#[plugin_fn]
pub fn call_tool(Json(input): Json<CallToolInput>) -> FnResult<Json<ToolCallResult>> {
    if input.tool != "probe_host" {
        return Ok(Json(ToolCallResult {
            content: vec![ContentBlock {
                kind: "text".into(),
                text: format!("unknown tool '{}'", input.tool),
            }],
            is_error: true,
        }));
    }
    let host = input
        .args
        .get("host")
        .and_then(|v| v.as_str())
        .unwrap_or("unknown");
    Ok(Json(ToolCallResult {
        content: vec![ContentBlock {
            kind: "text".into(),
            text: format!("{host} is reachable (synthetic probe result)"),
        }],
        is_error: false,
    }))
}
