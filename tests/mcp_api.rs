use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use disegno::{
    application::render::{RenderError, RenderService},
    domain::diagram::{OutputFormat, RenderPayload, RenderRequest},
    infra::http::{McpState, build_router},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

struct StubRender<F>(F);

impl<F> RenderService for StubRender<F>
where
    F: Fn(&RenderRequest) -> Result<RenderPayload, RenderError> + Send + Sync,
{
    fn render(&self, request: &RenderRequest) -> Result<RenderPayload, RenderError> {
        (self.0)(request)
    }
}

fn router_with<F>(behavior: F) -> Router
where
    F: Fn(&RenderRequest) -> Result<RenderPayload, RenderError> + Send + Sync + 'static,
{
    build_router(McpState {
        render: Arc::new(StubRender(behavior)),
    })
}

fn svg_stub() -> Router {
    router_with(|request| {
        assert_eq!(request.output_format, OutputFormat::Svg);
        Ok(RenderPayload {
            format: OutputFormat::Svg,
            mime: "image/svg+xml",
            content: "<svg xmlns=\"http://www.w3.org/2000/svg\"><g/></svg>".to_string(),
        })
    })
}

fn rpc(id: Value, method: &str, params: Value) -> Value {
    json!({"jsonrpc": "2.0", "id": id, "method": method, "params": params})
}

fn render_call(arguments: Value) -> Value {
    rpc(
        json!(1),
        "tools/call",
        json!({"name": "render_mermaid", "arguments": arguments}),
    )
}

async fn post_raw(router: Router, body: String) -> (StatusCode, Vec<u8>) {
    let request = Request::builder()
        .method(Method::POST)
        .uri("/mcp")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .expect("request should build");
    let response = router.oneshot(request).await.expect("router should respond");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    (status, bytes.to_vec())
}

async fn post_mcp(router: Router, message: Value) -> Value {
    let (status, body) = post_raw(router, message.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    serde_json::from_slice(&body).expect("response should be JSON")
}

#[tokio::test]
async fn initialize_reports_server_info() {
    let response = post_mcp(svg_stub(), rpc(json!(1), "initialize", json!({}))).await;

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "disegno");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[tokio::test]
async fn tools_list_exposes_render_mermaid() {
    let response = post_mcp(svg_stub(), rpc(json!(2), "tools/list", json!({}))).await;

    let tools = response["result"]["tools"]
        .as_array()
        .expect("tools array");
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "render_mermaid");
    assert_eq!(tools[0]["inputSchema"]["required"], json!(["diagram"]));
    assert_eq!(
        tools[0]["inputSchema"]["properties"]["output_format"]["enum"],
        json!(["svg", "png", "pdf"])
    );
}

#[tokio::test]
async fn tools_call_returns_svg_payload() {
    let response = post_mcp(
        svg_stub(),
        render_call(json!({"diagram": "graph TD; A-->B;"})),
    )
    .await;

    let result = &response["result"];
    assert!(result.get("isError").is_none());
    assert_eq!(result["structuredContent"]["format"], "svg");
    assert_eq!(result["structuredContent"]["mime"], "image/svg+xml");
    let content = result["structuredContent"]["content"]
        .as_str()
        .expect("content string");
    assert!(content.contains("<svg"), "missing svg root: {content}");

    // The text content block carries the same payload as JSON.
    let text = result["content"][0]["text"].as_str().expect("text block");
    let parsed: Value = serde_json::from_str(text).expect("text block is JSON");
    assert_eq!(parsed, result["structuredContent"]);
}

#[tokio::test]
async fn tools_call_encodes_png_payload() {
    let bytes: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0x42];
    let router = router_with(move |request| {
        assert_eq!(request.output_format, OutputFormat::Png);
        assert_eq!(request.theme(), "forest");
        Ok(RenderPayload {
            format: OutputFormat::Png,
            mime: "image/png",
            content: STANDARD.encode(bytes),
        })
    });

    let response = post_mcp(
        router,
        render_call(json!({
            "diagram": "graph TD; A-->B;",
            "output_format": "png",
            "theme": "forest"
        })),
    )
    .await;

    let structured = &response["result"]["structuredContent"];
    assert_eq!(structured["format"], "png");
    assert_eq!(structured["mime"], "image/png");
    let decoded = STANDARD
        .decode(structured["content"].as_str().expect("content string"))
        .expect("valid base64");
    assert!(!decoded.is_empty());
    assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G']));
    assert_eq!(decoded, bytes);
}

#[tokio::test]
async fn render_failure_is_a_tool_error() {
    let router = router_with(|_request| {
        Err(RenderError::Cli {
            exit_code: Some(1),
            stderr: "Parse error on line 2".to_string(),
        })
    });

    let response = post_mcp(router, render_call(json!({"diagram": "not a diagram"}))).await;

    let result = &response["result"];
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().expect("text block");
    assert!(text.contains("Parse error"), "stderr lost: {text}");
    assert!(text.contains("exit"), "exit status lost: {text}");
}

#[tokio::test]
async fn unavailable_renderer_is_a_tool_error_with_remediation() {
    let router = router_with(|_request| {
        Err(RenderError::Unavailable {
            hint: "install mermaid-cli (`npm install -g @mermaid-js/mermaid-cli`)".to_string(),
        })
    });

    let response = post_mcp(router, render_call(json!({"diagram": "graph TD; A-->B;"}))).await;

    let result = &response["result"];
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().expect("text block");
    assert!(text.contains("npm install"), "remediation lost: {text}");
}

#[tokio::test]
async fn unknown_tool_is_a_tool_error() {
    let response = post_mcp(
        svg_stub(),
        rpc(
            json!(3),
            "tools/call",
            json!({"name": "render_plantuml", "arguments": {}}),
        ),
    )
    .await;

    let result = &response["result"];
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().expect("text block");
    assert!(text.contains("render_plantuml"));
}

#[tokio::test]
async fn unknown_output_format_is_invalid_params() {
    let response = post_mcp(
        svg_stub(),
        render_call(json!({"diagram": "graph TD; A-->B;", "output_format": "gif"})),
    )
    .await;

    assert_eq!(response["error"]["code"], -32602);
    assert!(response.get("result").is_none());
}

#[tokio::test]
async fn missing_diagram_is_invalid_params() {
    let response = post_mcp(svg_stub(), render_call(json!({"output_format": "svg"}))).await;
    assert_eq!(response["error"]["code"], -32602);
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let response = post_mcp(svg_stub(), rpc(json!(4), "resources/list", json!({}))).await;
    assert_eq!(response["error"]["code"], -32601);
}

#[tokio::test]
async fn unparseable_body_is_a_parse_error() {
    let (status, body) = post_raw(svg_stub(), "this is not json".to_string()).await;
    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&body).expect("error envelope");
    assert_eq!(response["error"]["code"], -32700);
    assert_eq!(response["id"], Value::Null);
}

#[tokio::test]
async fn notifications_are_acknowledged_without_a_body() {
    let message = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    let (status, body) = post_raw(svg_stub(), message.to_string()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(body.is_empty());
}

#[tokio::test]
async fn get_mcp_is_method_not_allowed() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/mcp")
        .body(Body::empty())
        .expect("request should build");
    let response = svg_stub()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn healthz_reports_liveness() {
    let request = Request::builder()
        .method(Method::GET)
        .uri("/healthz")
        .body(Body::empty())
        .expect("request should build");
    let response = svg_stub()
        .oneshot(request)
        .await
        .expect("router should respond");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
}

#[cfg(unix)]
mod end_to_end {
    use super::*;
    use std::collections::HashSet;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};

    use disegno::application::render::RenderGateway;
    use disegno::config::RenderSettings;
    use metrics_util::debugging::DebuggingRecorder;
    use tempfile::TempDir;

    /// Fake mmdc: records its arguments and writes either SVG markup or
    /// PNG-signature bytes depending on the requested format.
    fn install_fake_mmdc(dir: &Path) -> (PathBuf, PathBuf) {
        let script_path = dir.join("fake-mmdc");
        let args_path = dir.join("args.log");
        let script = format!(
            r#"#!/bin/sh
set -eu
echo "$@" > "{args_file}"
out=""
fmt="svg"
while [ "$#" -gt 0 ]; do
  case "$1" in
    --output)
      shift
      out="$1"
      ;;
    --outputFormat)
      shift
      fmt="$1"
      ;;
    *)
      ;;
  esac
  shift
done
if [ -z "$out" ]; then
  echo "missing --output" >&2
  exit 2
fi
case "$fmt" in
  svg)
    printf '<svg xmlns="http://www.w3.org/2000/svg"><g/></svg>' > "$out"
    ;;
  png|pdf)
    printf '\211PNG\r\n\032\nfakebytes' > "$out"
    ;;
esac
"#,
            args_file = args_path.display()
        );
        fs::write(&script_path, script).expect("write script");
        let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).expect("set perms");
        (script_path, args_path)
    }

    fn gateway_router(script_path: PathBuf, dir: &Path) -> Router {
        let settings = RenderSettings {
            mermaid_cli_path: script_path,
            local_bin_dir: dir.join("node_modules/.bin"),
        };
        build_router(McpState {
            render: Arc::new(RenderGateway::new(&settings)),
        })
    }

    fn output_path_from(args: &str) -> PathBuf {
        let mut parts = args.split_whitespace();
        while let Some(part) = parts.next() {
            if part == "--output" {
                return PathBuf::from(parts.next().expect("--output value"));
            }
        }
        panic!("no --output in recorded args: {args}");
    }

    #[tokio::test]
    async fn renders_through_a_real_subprocess() {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");

        let dir = TempDir::new().expect("temp dir");
        let (script_path, args_path) = install_fake_mmdc(dir.path());

        // svg round trip
        let response = post_mcp(
            gateway_router(script_path.clone(), dir.path()),
            render_call(json!({"diagram": "graph TD; A-->B;"})),
        )
        .await;
        let structured = &response["result"]["structuredContent"];
        assert_eq!(structured["mime"], "image/svg+xml");
        assert!(
            structured["content"]
                .as_str()
                .expect("content")
                .contains("<svg")
        );

        let args = fs::read_to_string(&args_path).expect("recorded args");
        assert!(args.contains("--theme default"), "theme missing: {args}");
        assert!(args.contains("--quiet"), "quiet missing: {args}");

        // The per-call workspace is gone once the response is produced.
        let staged_output = output_path_from(&args);
        let workspace_dir = staged_output.parent().expect("workspace dir");
        assert!(
            !workspace_dir.exists(),
            "workspace leaked: {}",
            workspace_dir.display()
        );

        // png round trip decodes to the exact bytes the script wrote
        let response = post_mcp(
            gateway_router(script_path, dir.path()),
            render_call(json!({"diagram": "graph TD; A-->B;", "output_format": "png"})),
        )
        .await;
        let structured = &response["result"]["structuredContent"];
        assert_eq!(structured["mime"], "image/png");
        let decoded = STANDARD
            .decode(structured["content"].as_str().expect("content"))
            .expect("valid base64");
        assert!(decoded.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]));

        let names: HashSet<String> = snapshotter
            .snapshot()
            .into_vec()
            .into_iter()
            .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
            .collect();
        assert!(names.contains("disegno_render_total"), "metrics: {names:?}");
        assert!(
            names.contains("disegno_render_duration_ms"),
            "metrics: {names:?}"
        );
    }

    #[tokio::test]
    async fn failing_subprocess_surfaces_and_cleans_up() {
        let dir = TempDir::new().expect("temp dir");
        let script_path = dir.path().join("fake-mmdc");
        let args_path = dir.path().join("args.log");
        let script = format!(
            r#"#!/bin/sh
echo "$@" > "{args_file}"
echo "boom" >&2
exit 42
"#,
            args_file = args_path.display()
        );
        fs::write(&script_path, script).expect("write script");
        let mut perms = fs::metadata(&script_path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).expect("set perms");

        let response = post_mcp(
            gateway_router(script_path, dir.path()),
            render_call(json!({"diagram": "graph TD; A-->B;"})),
        )
        .await;

        let result = &response["result"];
        assert_eq!(result["isError"], true);
        let text = result["content"][0]["text"].as_str().expect("text block");
        assert!(text.contains("boom"), "stderr lost: {text}");
        assert!(text.contains("42"), "exit status lost: {text}");

        let args = fs::read_to_string(&args_path).expect("recorded args");
        let staged_output = output_path_from(&args);
        let workspace_dir = staged_output.parent().expect("workspace dir");
        assert!(
            !workspace_dir.exists(),
            "workspace leaked after failure: {}",
            workspace_dir.display()
        );
    }
}
