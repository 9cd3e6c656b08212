//! Integration tests for the full MCP → Builder → Langbase → Storage flow
//!
//! A wiremock server stands in for the Langbase API and a temporary SQLite
//! file backs storage, so every layer runs as it does in production.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tempfile::{tempdir, TempDir};
use wiremock::{
    matchers::{body_string_contains, method, path},
    Mock, MockServer, ResponseTemplate,
};

use mcp_langbase_mindmap::config::{
    Config, DatabaseConfig, GenerationConfig, LangbaseConfig, LogFormat, LoggingConfig,
    PipeConfig, RequestConfig,
};
use mcp_langbase_mindmap::langbase::LangbaseClient;
use mcp_langbase_mindmap::mindmap::{check_invariants, ColorScheme, MindMap};
use mcp_langbase_mindmap::server::{AppState, JsonRpcRequest, McpServer};
use mcp_langbase_mindmap::storage::{SqliteStorage, Storage};

/// Create test configuration with mock server URL
fn create_test_config(mock_url: &str, db_path: std::path::PathBuf) -> Config {
    Config {
        langbase: LangbaseConfig {
            api_key: "test-api-key".to_string(),
            base_url: mock_url.to_string(),
        },
        database: DatabaseConfig {
            path: db_path,
            max_connections: 1,
        },
        logging: LoggingConfig {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
        },
        request: RequestConfig {
            timeout_ms: 5000,
            max_retries: 0,
            retry_delay_ms: 100,
        },
        pipes: PipeConfig {
            mindmap: "mindmap-generator-v1".to_string(),
        },
        generation: GenerationConfig {
            timeout_ms: 2000,
            default_color_scheme: ColorScheme::CalmGreen,
        },
    }
}

/// Server over a fresh temp database, plus the storage handle for assertions.
struct Harness {
    server: McpServer,
    storage: SqliteStorage,
    _dir: TempDir,
}

async fn harness(mock: &MockServer, tweak: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempdir().unwrap();
    let mut config = create_test_config(&mock.uri(), dir.path().join("mindmap.db"));
    tweak(&mut config);

    let storage = SqliteStorage::new(&config.database)
        .await
        .expect("Failed to create storage");
    let langbase = LangbaseClient::new(&config.langbase, config.request.clone()).unwrap();
    let state = AppState::new(config, storage.clone(), langbase);

    Harness {
        server: McpServer::new(Arc::new(state)),
        storage,
        _dir: dir,
    }
}

fn completion(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "completion": text,
        "threadId": "thread-123"
    }))
}

const GARDEN: &str = r#"{
    "title": "Garden",
    "nodes": [
        {"id": "root", "label": "Garden", "type": "root"},
        {"id": "m1", "label": "Vegetables", "type": "main", "parent": "root"},
        {"id": "m2", "label": "Flowers", "type": "main", "parent": "root"},
        {"id": "s1", "label": "Tomatoes", "type": "sub", "parent": "m1"}
    ],
    "analysis": "Garden plan.",
    "suggestions": ["Add herbs"]
}"#;

/// Call a tool and parse its JSON text payload; panics on tool errors.
async fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    let response = server
        .handle_request(JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "tools/call".to_string(),
            params: Some(json!({"name": name, "arguments": arguments})),
        })
        .await
        .expect("tools/call must respond");

    let result = response.result.expect("tools/call must succeed");
    assert!(
        result.get("isError").is_none(),
        "tool {} failed: {}",
        name,
        result
    );
    serde_json::from_str(result["content"][0]["text"].as_str().unwrap()).unwrap()
}

#[cfg(test)]
mod generate_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_store_get_list() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion(GARDEN))
            .expect(1)
            .mount(&mock)
            .await;

        let h = harness(&mock, |_| {}).await;

        let generated = call_tool(&h.server, "mindmap_generate", json!({"input": "plan my garden"})).await;
        assert_eq!(generated["success"], true);
        assert_eq!(generated["mindMap"]["colorScheme"], "calmGreen");

        let map: MindMap = serde_json::from_value(generated["mindMap"].clone()).unwrap();
        assert_eq!(check_invariants(&map), Ok(()));
        assert_eq!(map.nodes.len(), 4);
        assert_eq!(map.suggestions, vec!["Add herbs"]);

        let map_id = generated["mindMapId"].as_str().unwrap().to_string();
        let session_id = generated["sessionId"].as_str().unwrap().to_string();

        let fetched = call_tool(&h.server, "mindmap_get", json!({"mindMapId": map_id})).await;
        assert_eq!(fetched["input"], "plan my garden");
        assert_eq!(fetched["usedFallback"], false);
        assert_eq!(fetched["mindMap"]["nodes"], generated["mindMap"]["nodes"]);

        let listed = call_tool(&h.server, "mindmap_list", json!({"sessionId": session_id})).await;
        let entries = listed.as_array().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0]["nodeCount"], 4);

        let invocations = h
            .storage
            .get_invocations(Some("mindmap_generate"), 10)
            .await
            .unwrap();
        assert_eq!(invocations.len(), 1);
        assert!(invocations[0].success);
        assert!(!invocations[0].fallback_used);
        assert_eq!(
            invocations[0].pipe_name.as_deref(),
            Some("mindmap-generator-v1")
        );
    }

    #[tokio::test]
    async fn test_evolution_sends_previous_nodes() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .and(body_string_contains("- m1 [main] Vegetables (parent: root)"))
            .respond_with(completion(GARDEN))
            .expect(1)
            .mount(&mock)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion(GARDEN))
            .expect(1)
            .mount(&mock)
            .await;

        let h = harness(&mock, |_| {}).await;

        let first = call_tool(
            &h.server,
            "mindmap_generate",
            json!({"input": "plan my garden", "sessionId": "garden"}),
        )
        .await;
        assert_eq!(first["sessionId"], "garden");

        let evolved = call_tool(
            &h.server,
            "mindmap_generate",
            json!({"input": "add herbs", "sessionId": "garden", "isEvolution": true}),
        )
        .await;
        assert_eq!(evolved["mindMap"]["isEvolution"], true);

        let latest = h.storage.get_latest_mind_map("garden").await.unwrap().unwrap();
        assert_eq!(latest.input, "add herbs");
        assert_eq!(
            h.storage.list_mind_maps(Some("garden"), 10).await.unwrap().len(),
            2
        );
    }
}

#[cfg(test)]
mod fallback_flow_tests {
    use super::*;

    async fn assert_fallback_stored(h: &Harness, generated: &Value) {
        assert_eq!(generated["success"], true);
        let map: MindMap = serde_json::from_value(generated["mindMap"].clone()).unwrap();
        assert_eq!(check_invariants(&map), Ok(()));
        assert_eq!(map.title, "Plan Product Launch");

        let map_id = generated["mindMapId"].as_str().unwrap();
        let record = h.storage.get_mind_map(map_id).await.unwrap().unwrap();
        assert!(record.used_fallback);

        let invocations = h.storage.get_invocations(None, 10).await.unwrap();
        assert!(invocations[0].fallback_used);
        assert!(invocations[0].error.is_some());
    }

    #[tokio::test]
    async fn test_api_error_falls_back() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock)
            .await;

        let h = harness(&mock, |_| {}).await;
        let generated = call_tool(
            &h.server,
            "mindmap_generate",
            json!({"input": "plan a product launch"}),
        )
        .await;

        assert_fallback_stored(&h, &generated).await;
    }

    #[tokio::test]
    async fn test_unusable_completion_falls_back() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion("Sorry, I can only answer in prose today."))
            .mount(&mock)
            .await;

        let h = harness(&mock, |_| {}).await;
        let generated = call_tool(
            &h.server,
            "mindmap_generate",
            json!({"input": "plan a product launch", "colorScheme": "fortuneRed"}),
        )
        .await;

        assert_eq!(generated["mindMap"]["colorScheme"], "fortuneRed");
        assert_fallback_stored(&h, &generated).await;
    }

    #[tokio::test]
    async fn test_failed_pipe_setup_still_serves_fallback_maps() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .expect(1)
            .mount(&mock)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(ResponseTemplate::new(500).set_body_string("down"))
            .mount(&mock)
            .await;

        let dir = tempdir().unwrap();
        let config = create_test_config(&mock.uri(), dir.path().join("mindmap.db"));
        let storage = SqliteStorage::new(&config.database).await.unwrap();
        let langbase = LangbaseClient::new(&config.langbase, config.request.clone()).unwrap();

        let state = AppState::connect(config, storage.clone(), langbase).await;
        let h = Harness {
            server: McpServer::new(Arc::new(state)),
            storage,
            _dir: dir,
        };

        let generated = call_tool(
            &h.server,
            "mindmap_generate",
            json!({"input": "plan a product launch"}),
        )
        .await;
        assert_fallback_stored(&h, &generated).await;
    }

    #[tokio::test]
    async fn test_slow_pipe_hits_generation_timeout() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion(GARDEN).set_delay(Duration::from_secs(3)))
            .mount(&mock)
            .await;

        let h = harness(&mock, |config| config.generation.timeout_ms = 200).await;
        let generated = call_tool(
            &h.server,
            "mindmap_generate",
            json!({"input": "plan a product launch"}),
        )
        .await;

        assert_fallback_stored(&h, &generated).await;
        let invocations = h.storage.get_invocations(None, 1).await.unwrap();
        assert!(invocations[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }
}

#[cfg(test)]
mod error_flow_tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_input_is_tool_error_without_pipe_call() {
        let mock = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/pipes/run"))
            .respond_with(completion(GARDEN))
            .expect(0)
            .mount(&mock)
            .await;

        let h = harness(&mock, |_| {}).await;
        let response = h
            .server
            .handle_request(JsonRpcRequest {
                jsonrpc: "2.0".to_string(),
                id: Some(json!(9)),
                method: "tools/call".to_string(),
                params: Some(json!({"name": "mindmap_generate", "arguments": {"input": "  "}})),
            })
            .await
            .unwrap();

        let result = response.result.unwrap();
        assert_eq!(result["isError"], true);
        assert!(result["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Input cannot be empty"));
    }

    #[tokio::test]
    async fn test_color_schemes_report_configured_default() {
        let mock = MockServer::start().await;
        let h = harness(&mock, |_| {}).await;

        let listed = call_tool(&h.server, "mindmap_color_schemes", json!({})).await;
        let schemes = listed["schemes"].as_array().unwrap();
        assert_eq!(schemes.len(), ColorScheme::ALL.len());

        let defaults: Vec<&str> = schemes
            .iter()
            .filter(|s| s["isDefault"] == true)
            .map(|s| s["name"].as_str().unwrap())
            .collect();
        assert_eq!(defaults, vec!["calmGreen"]);
    }
}
