use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn hrag_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hrag");
    path
}

/// Serve `POST /v1/embeddings` on a background runtime; returns the base URL.
///
/// Every input gets the same 8-dimensional vector.
fn start_mock_embeddings() -> String {
    use axum::{routing::post, Json, Router};
    use serde_json::{json, Value};

    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let router = Router::new().route(
                "/v1/embeddings",
                post(|Json(body): Json<Value>| async move {
                    let count = body["input"].as_array().map_or(0, |a| a.len());
                    let data: Vec<Value> = (0..count)
                        .map(|i| json!({"index": i, "embedding": [1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.5]}))
                        .collect();
                    Json(json!({ "data": data }))
                }),
            );
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            tx.send(listener.local_addr().unwrap()).unwrap();
            axum::serve(listener, router).await.unwrap();
        });
    });
    let addr = rx.recv().unwrap();
    format!("http://{}/v1", addr)
}

/// Config with model endpoints pointing at a closed port, so every remote
/// call fails fast.
fn setup_test_env() -> (TempDir, PathBuf) {
    setup_test_env_with("http://127.0.0.1:9/v1")
}

fn setup_test_env_with(embedding_url: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::create_dir_all(root.join("files")).unwrap();

    let config_content = format!(
        r#"[stores]
vector_path = "{root}/data/vector.db"
keyword_path = "{root}/data/keyword.db"

[chunking]
chunk_size = 400
chunk_overlap = 50

[embedding]
provider = "openai"
url = "{embedding_url}"
model = "text-embedding-3-small"
dims = 8
max_retries = 0
timeout_secs = 2

[retrieval]
default_top_k = 3
timeout_ms = 3000

[generation]
url = "http://127.0.0.1:9/v1"
model = "test-chat"
max_retries = 0
timeout_secs = 2

[ingest]
max_file_bytes = 1024
"#,
        root = root.display(),
        embedding_url = embedding_url
    );

    let config_path = config_dir.join("hrag.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_hrag(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hrag_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("HRAG_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hrag binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

#[test]
fn test_init_creates_both_indexes() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_hrag(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/vector.db").exists());
    assert!(tmp.path().join("data/keyword.db").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, success1) = run_hrag(&config_path, &["init"]);
    assert!(success1, "First init failed");

    let (_, _, success2) = run_hrag(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_health_after_init() {
    let (_tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_hrag(&config_path, &["health"]);
    assert!(success, "health failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("status: healthy"));
}

#[test]
fn test_health_without_init_is_degraded() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_hrag(&config_path, &["--json", "health"]);
    assert!(!success);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["status"], "degraded");
    assert_eq!(report["vector"]["ok"], false);
    assert!(report["vector"]["error"]
        .as_str()
        .unwrap()
        .contains("hrag init"));
}

#[test]
fn test_ingest_rejects_non_pdf() {
    let (tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let file = tmp.path().join("files/notes.txt");
    fs::write(&file, "plain text notes").unwrap();

    let (_, stderr, success) = run_hrag(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("unsupported file type"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_rejects_oversized_file() {
    let (tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let file = tmp.path().join("files/big.pdf");
    fs::write(&file, vec![b'x'; 2048]).unwrap();

    let (_, stderr, success) = run_hrag(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("file too large"), "stderr: {}", stderr);
}

#[test]
fn test_ingest_reports_unparseable_pdf() {
    let (tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let file = tmp.path().join("files/broken.pdf");
    fs::write(&file, "this is not a pdf").unwrap();

    let (_, stderr, success) = run_hrag(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("broken.pdf"), "stderr: {}", stderr);

    let (stdout, _, _) = run_hrag(&config_path, &["--json", "stats", "--owner", "alice"]);
    let report: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["chunk_count"], 0);
}

#[test]
fn test_ingest_requires_owner() {
    let (tmp, config_path) = setup_test_env();
    let file = tmp.path().join("files/a.pdf");
    fs::write(&file, "x").unwrap();

    let (_, _, success) = run_hrag(&config_path, &["ingest", file.to_str().unwrap()]);
    assert!(!success);

    let (_, stderr, success) = run_hrag(
        &config_path,
        &["ingest", file.to_str().unwrap(), "--owner", ""],
    );
    assert!(!success);
    assert!(stderr.contains("owner id must not be empty"), "stderr: {}", stderr);
}

#[test]
fn test_search_empty_index_reports_sources() {
    let (_tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_hrag(
        &config_path,
        &["search", "vacation policy", "--owner", "alice"],
    );
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("No results."));
    // Embedding endpoint is unreachable; keyword side still answers.
    assert!(stdout.contains("vector: unavailable"), "stdout: {}", stdout);
    assert!(stdout.contains("keyword: ok (0 hits)"), "stdout: {}", stdout);
}

#[test]
fn test_search_with_embedding_service() {
    let (_tmp, config_path) = setup_test_env_with(&start_mock_embeddings());
    run_hrag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_hrag(
        &config_path,
        &["--json", "search", "vacation policy", "--owner", "alice"],
    );
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);
    let retrieval: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(retrieval["vector"]["status"], "ok");
    assert_eq!(retrieval["vector"]["hits"], 0);
    assert_eq!(retrieval["keyword"]["status"], "ok");
    assert_eq!(retrieval["results"].as_array().unwrap().len(), 0);
}

#[test]
fn test_search_rejects_zero_top_k() {
    let (_tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let (_, _, success) = run_hrag(
        &config_path,
        &["search", "anything", "--owner", "alice", "--top-k", "0"],
    );
    assert!(!success);
}

#[test]
fn test_ask_without_context_says_i_dont_know() {
    let (_tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let (stdout, stderr, success) = run_hrag(
        &config_path,
        &["--json", "ask", "How many vacation days?", "--owner", "alice"],
    );
    assert!(success, "ask failed: stdout={}, stderr={}", stdout, stderr);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["answer"], "I don't know");
    assert_eq!(response["sources"].as_array().unwrap().len(), 0);
    assert_eq!(response["retrieval"]["keyword"]["status"], "ok");
}

#[test]
fn test_stats_empty() {
    let (_tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let (stdout, _, success) = run_hrag(&config_path, &["stats", "--owner", "alice"]);
    assert!(success);
    assert!(stdout.contains("Sources:       0"));
    assert!(stdout.contains("Chunks:        0"));
}

#[test]
fn test_reindex_unknown_source_fails() {
    let (_tmp, config_path) = setup_test_env();
    run_hrag(&config_path, &["init"]);

    let (_, stderr, success) = run_hrag(
        &config_path,
        &["reindex-keyword", "missing.pdf", "--owner", "alice"],
    );
    assert!(!success);
    assert!(stderr.contains("missing.pdf"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_hrag(&tmp.path().join("nope.toml"), &["health"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}
