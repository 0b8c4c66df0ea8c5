use std::sync::Arc;
use std::time::Duration;

use delve_ai::{
    AiError, ChatRole, ChatSession, FindAllCoordinator, FindAllError, ParallelClient,
    PollerConfig, Processor, RemoteRunStatus, RunOutcome, RunPoller, SearchRequest, TaskClient,
};
use delve_storage::{RunRecordStatus, Storage};
use serde_json::json;
use wiremock::matchers::{body_json, body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "test-key";

async fn client_for(server: &MockServer) -> ParallelClient {
    ParallelClient::new(Some(API_KEY.to_string()))
        .unwrap()
        .with_base_url(server.uri())
}

#[tokio::test]
async fn test_chat_appends_one_assistant_turn() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_json(json!({
            "model": "speed",
            "messages": [{ "role": "user", "content": "Who is the CEO of Snowflake?" }],
            "stream": false
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "message": { "role": "assistant", "content": "Sridhar Ramaswamy." } }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut session = ChatSession::new(client_for(&server).await);
    let reply = session.send("Who is the CEO of Snowflake?").await.unwrap();

    assert_eq!(reply, "Sridhar Ramaswamy.");
    let history = session.history();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, ChatRole::User);
    assert_eq!(history[1].role, ChatRole::Assistant);
    assert_eq!(history[1].content, "Sridhar Ramaswamy.");
}

#[tokio::test]
async fn test_chat_sends_previous_turns_and_keeps_history_on_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let mut session = ChatSession::new(client_for(&server).await);
    assert_eq!(session.send("hello").await.unwrap(), "No response generated");

    let err = session.send("again").await.unwrap_err();
    assert!(matches!(err, AiError::Remote { status: 500, .. }));
    assert_eq!(session.history().len(), 2);
}

#[tokio::test]
async fn test_missing_key_is_reported_without_network() {
    let server = MockServer::start().await;
    let client = ParallelClient::new(None).unwrap().with_base_url(server.uri());

    let err = client.create_run("question", Processor::Ultra).await.unwrap_err();
    assert!(matches!(err, AiError::Auth(_)));

    let err = client.search(&SearchRequest::new("query")).await.unwrap_err();
    assert!(matches!(err, AiError::Auth(_)));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_create_and_query_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks/runs"))
        .and(header("x-api-key", API_KEY))
        .and(body_json(json!({ "input": "Lithium outlook", "processor": "pro" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "run_id": "trun_123",
            "status": "queued",
            "is_active": true
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/runs/trun_123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "run_id": "trun_123",
            "status": "running"
        })))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    let created = client.create_run("Lithium outlook", Processor::Pro).await.unwrap();
    assert_eq!(created.id, "trun_123");
    assert_eq!(created.status, RemoteRunStatus::Created);

    let status = client.get_run_status(&created.id).await.unwrap();
    assert_eq!(status.status, RemoteRunStatus::Running);
    assert!(status.output.is_none());
}

#[tokio::test]
async fn test_status_error_mapping() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/runs/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/runs/forbidden"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks/runs"))
        .respond_with(ResponseTemplate::new(422).set_body_string("unknown processor"))
        .mount(&server)
        .await;

    let client = client_for(&server).await;
    assert!(matches!(
        client.get_run_status("missing").await.unwrap_err(),
        AiError::NotFound(id) if id == "missing"
    ));
    assert!(matches!(
        client.get_run_status("forbidden").await.unwrap_err(),
        AiError::Auth(_)
    ));
    match client.create_run("q", Processor::Ultra).await.unwrap_err() {
        AiError::Remote { status, body } => {
            assert_eq!(status, 422);
            assert_eq!(body, "unknown processor");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_poller_end_to_end_records_history() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/tasks/runs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "run_id": "trun_9", "status": "queued" })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/runs/trun_9"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "run_id": "trun_9", "status": "running" })),
        )
        .up_to_n_times(5)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/tasks/runs/trun_9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "run_id": "trun_9",
            "status": "completed",
            "output": { "content": { "summary": "x" } }
        })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let storage = Storage::new(dir.path().join("delve.db")).unwrap();
    let client: Arc<dyn TaskClient> = Arc::new(client_for(&server).await);

    let outcome = RunPoller::new(client)
        .with_history(storage.run_history.clone())
        .with_config(PollerConfig {
            max_attempts: 20,
            poll_interval: Duration::from_millis(10),
        })
        .run("Summarize x", Processor::Ultra)
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Completed {
            run_id: "trun_9".to_string(),
            result: "{\n  \"summary\": \"x\"\n}".to_string(),
        }
    );
    let records = storage.run_history.list();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].run_id, "trun_9");
    assert_eq!(records[0].query, "Summarize x");
    assert_eq!(records[0].status, RunRecordStatus::Completed);
}

#[tokio::test]
async fn test_findall_round_trip_passes_opaque_fields() {
    let server = MockServer::start().await;
    let spec_body = r#"{"objective":"Lithium supply contracts","entity_type":"contracts","columns":[{"name":"company"},{"name":"contract_value"}],"match_conditions":[{"name":"signed","description":"Signed after 2020"}],"min_value":1.50,"scale":1e3,"big_id":123456789012345678901234567890,"f":0.1000000000000000055511151231257827}"#;

    Mock::given(method("POST"))
        .and(path("/v1beta/findall/ingest"))
        .and(header("x-api-key", API_KEY))
        .and(body_json(json!({ "query": "Lithium supply contracts" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(spec_body.as_bytes().to_vec(), "application/json"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/findall/execute"))
        .and(body_string(spec_body))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "company": "Albemarle", "contract_value": "1.2B" },
            { "company": "Ganfeng", "contract_value": { "amount": 800, "currency": "USD" } }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let coordinator = FindAllCoordinator::new(client_for(&server).await);
    let spec = coordinator
        .generate_spec("Lithium supply contracts")
        .await
        .unwrap();
    assert_eq!(
        spec.column_names().collect::<Vec<_>>(),
        vec!["company", "contract_value"]
    );

    let results = coordinator.execute_spec(&spec).await.unwrap();
    assert_eq!(results.len(), 2);
    for entity in &results.entities {
        assert!(entity.contains_key("company"));
        assert!(entity.contains_key("contract_value"));
    }
}

#[tokio::test]
async fn test_generate_and_execute_keeps_spec_on_execution_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/findall/ingest"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "columns": [{ "name": "company" }],
            "hint": "keep me"
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/findall/execute"))
        .respond_with(ResponseTemplate::new(400).set_body_string("spec too broad"))
        .mount(&server)
        .await;

    let coordinator = FindAllCoordinator::new(client_for(&server).await);
    let err = coordinator
        .generate_and_execute("Every company")
        .await
        .unwrap_err();

    let spec = err.spec().expect("spec survives execution failure");
    assert_eq!(spec.field("hint"), Some(&json!("keep me")));
    assert!(matches!(
        err,
        FindAllError::Execute {
            source: AiError::Remote { status: 400, .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_generate_and_execute_success_and_empty_result() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/findall/ingest"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "columns": [{ "name": "company" }] })),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1beta/findall/execute"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "results": [] })))
        .mount(&server)
        .await;

    let run = FindAllCoordinator::new(client_for(&server).await)
        .generate_and_execute("Nothing matches")
        .await
        .unwrap();
    assert!(run.results.is_empty());
    assert_eq!(run.spec.columns().len(), 1);
}

#[tokio::test]
async fn test_search_results_keep_order() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1beta/search"))
        .and(header("x-api-key", API_KEY))
        .and(body_json(json!({
            "objective": "rust async runtimes",
            "processor": "base",
            "max_results": 3,
            "max_chars_per_result": 500,
            "search_queries": ["tokio", "smol"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "search_id": "search_1",
            "results": [
                { "url": "https://tokio.rs", "title": "Tokio", "excerpts": ["An async runtime"] },
                { "url": "https://github.com/smol-rs/smol", "title": "smol", "excerpt": "A small runtime" }
            ]
        })))
        .mount(&server)
        .await;

    let request = SearchRequest::new("rust async runtimes")
        .with_max_results(3)
        .with_max_chars_per_result(500)
        .with_queries(["tokio, smol"]);
    let results = client_for(&server).await.search(&request).await.unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].title, "Tokio");
    assert_eq!(results[0].excerpt, "An async runtime");
    assert_eq!(results[1].url, "https://github.com/smol-rs/smol");
    assert_eq!(results[1].excerpt, "A small runtime");
}
