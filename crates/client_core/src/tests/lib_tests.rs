use axum::{routing::post, Json, Router};
use shared::protocol::{AnswerRequest, AnswerResponse};
use tokio::net::TcpListener;

use super::*;

async fn handle_answer(Json(_payload): Json<AnswerRequest>) -> Json<AnswerResponse> {
    Json(AnswerResponse {
        answer: "Hi".to_string(),
    })
}

async fn handle_ingest() -> &'static str {
    "{}"
}

async fn spawn_stack_server() -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let app = Router::new()
        .route("/message", post(handle_answer))
        .route("/api/upload", post(handle_ingest));
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn sample_pdf() -> DocumentUpload {
    DocumentUpload {
        filename: "paper.pdf".to_string(),
        media_type: PDF_MEDIA_TYPE.to_string(),
        bytes: vec![0u8; 256],
    }
}

#[test]
fn config_defaults_to_the_standard_ingest_path() {
    let config = ClientConfig::new("http://localhost:8000");
    assert_eq!(config.upload_path, DEFAULT_UPLOAD_PATH);

    let config = config.with_upload_path("/ingest");
    assert_eq!(config.upload_path, "/ingest");
}

#[tokio::test]
async fn handle_drives_both_controllers_over_one_event_stream() {
    let server_url = spawn_stack_server().await;
    let client: Arc<dyn ClientHandle> = AssistantClient::new(ClientConfig::new(server_url));
    let mut events = client.subscribe_events();

    client.submit("Hello").await.expect("submit");
    client
        .select_document(sample_pdf())
        .await
        .expect("upload");

    assert_eq!(client.chat_snapshot().transcript.len(), 2);
    assert_eq!(client.upload_state(), UploadState::Idle);

    let mut saw_message = false;
    let mut saw_upload = false;
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::MessageAppended(_) => saw_message = true,
            ClientEvent::UploadStateChanged(_) => saw_upload = true,
            _ => {}
        }
    }
    assert!(saw_message);
    assert!(saw_upload);
}

#[tokio::test]
async fn trailing_slash_in_the_server_url_is_tolerated() {
    let server_url = spawn_stack_server().await;
    let client = AssistantClient::new(ClientConfig::new(format!("{server_url}/")));

    client.submit("Hello").await.expect("submit");
    client
        .select_document(sample_pdf())
        .await
        .expect("upload");

    assert_eq!(client.chat_snapshot().transcript.len(), 2);
    assert_eq!(client.upload_state(), UploadState::Idle);
}
