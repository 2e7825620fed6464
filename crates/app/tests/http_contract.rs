use std::path::Path;
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use pdf_ask_server::{app_router, AppState, BackendArgs, ServerConfig};
use reqwest::multipart::{Form, Part};
use serde_json::Value;
use tempfile::tempdir;

const FRONTEND: &str = "http://localhost:3000";

fn one_page_pdf(text: &str) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 720.into()]),
            Operation::new("Tj", vec![Object::string_literal(text)]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("content encodes"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("pdf serializes");
    bytes
}

async fn spawn_server(index_dir: &Path) -> (String, tokio::task::JoinHandle<()>) {
    let pipeline = BackendArgs::local()
        .build_pipeline(index_dir.to_path_buf())
        .expect("local pipeline");
    let config = ServerConfig {
        allowed_origins: vec![FRONTEND.to_string()],
        ..ServerConfig::default()
    };
    let app = app_router(
        AppState {
            pipeline: Arc::new(pipeline),
        },
        &config,
    )
    .expect("router builds");

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server run");
    });

    (format!("http://{}", addr), handle)
}

fn upload_form(file_name: &str, pdf: Vec<u8>) -> Form {
    Form::new()
        .part(
            "pdf_file",
            Part::bytes(pdf)
                .file_name(file_name.to_string())
                .mime_str("application/pdf")
                .expect("valid mime"),
        )
        .text("file_name", file_name.to_string())
}

#[tokio::test]
async fn ingest_then_ask_returns_an_answer() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();

    let ingest = client
        .post(format!("{base}/embed-and-vectorize"))
        .multipart(upload_form("test.pdf", one_page_pdf("The sky is blue.")))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(ingest.status(), 200);
    assert!(ingest.bytes().await.expect("body").is_empty());
    assert!(dir.path().join("test.pkl").is_file());

    let ask = client
        .post(format!("{base}/ask-question"))
        .json(&serde_json::json!({
            "question": "What color is the sky?",
            "fileName": "test.pdf",
        }))
        .send()
        .await
        .expect("ask response");
    assert_eq!(ask.status(), 200);

    let body: Value = ask.json().await.expect("answer json");
    let answer = body
        .get("answer")
        .and_then(Value::as_str)
        .expect("answer field");
    assert!(!answer.trim().is_empty());

    handle.abort();
}

#[tokio::test]
async fn repeated_ingest_is_a_successful_no_op() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;
    let client = reqwest::Client::new();
    let url = format!("{base}/embed-and-vectorize");

    let first = client
        .post(&url)
        .multipart(upload_form("notes.pdf", one_page_pdf("First version.")))
        .send()
        .await
        .expect("first ingest");
    assert_eq!(first.status(), 200);
    let before = std::fs::read(dir.path().join("notes.pkl")).expect("index written");

    let second = client
        .post(&url)
        .multipart(upload_form("notes.pdf", one_page_pdf("Second version.")))
        .send()
        .await
        .expect("second ingest");
    assert_eq!(second.status(), 200);

    let after = std::fs::read(dir.path().join("notes.pkl")).expect("index kept");
    assert_eq!(before, after);

    handle.abort();
}

#[tokio::test]
async fn unknown_document_is_a_500_with_detail() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/ask-question"))
        .json(&serde_json::json!({
            "question": "Anything?",
            "fileName": "missing.pdf",
        }))
        .send()
        .await
        .expect("ask response");
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.expect("error json");
    let detail = body
        .get("detail")
        .and_then(Value::as_str)
        .expect("detail field");
    assert!(detail.starts_with("Error processing question: "));
    assert!(!detail.contains(&dir.path().display().to_string()));
    assert_eq!(body.get("kind").and_then(Value::as_str), Some("index_not_found"));

    handle.abort();
}

#[tokio::test]
async fn broken_pdf_is_a_500_with_pdf_detail() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/embed-and-vectorize"))
        .multipart(upload_form("broken.pdf", b"%PDF-1.4\n%broken".to_vec()))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.expect("error json");
    let detail = body.get("detail").and_then(Value::as_str).unwrap_or_default();
    assert!(detail.starts_with("Error processing PDF: "));
    assert_eq!(body.get("kind").and_then(Value::as_str), Some("pdf"));

    handle.abort();
}

#[tokio::test]
async fn missing_upload_field_is_reported() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/embed-and-vectorize"))
        .multipart(Form::new().text("file_name", "test.pdf"))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.expect("error json");
    assert_eq!(body.get("kind").and_then(Value::as_str), Some("invalid_input"));

    handle.abort();
}

#[tokio::test]
async fn non_multipart_upload_is_a_500_with_pdf_detail() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;

    let response = reqwest::Client::new()
        .post(format!("{base}/embed-and-vectorize"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .expect("ingest response");
    assert_eq!(response.status(), 500);

    let body: Value = response.json().await.expect("error json");
    let detail = body.get("detail").and_then(Value::as_str).unwrap_or_default();
    assert!(detail.starts_with("Error processing PDF: "));
    assert_eq!(body.get("kind").and_then(Value::as_str), Some("invalid_input"));

    handle.abort();
}

#[tokio::test]
async fn configured_origin_is_allowed_by_cors() {
    let dir = tempdir().expect("tempdir");
    let (base, handle) = spawn_server(dir.path()).await;

    let response = reqwest::Client::new()
        .get(format!("{base}/health"))
        .header("Origin", FRONTEND)
        .send()
        .await
        .expect("health response");
    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|value| value.to_str().ok()),
        Some(FRONTEND)
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .and_then(|value| value.to_str().ok()),
        Some("true")
    );

    handle.abort();
}
