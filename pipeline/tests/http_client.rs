#![cfg(feature = "native")]

use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
use serde_json::json;
use std::sync::Mutex;

use pipeline::config::PipelineConfig;
use pipeline::{AnalysisClient, ClientError, HttpAnalysisClient, Submission};
use shared::{EncodedImage, RemoteStatus, TaskHandle};

struct Upload {
    authorization: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Default)]
struct Recorded {
    uploads: Mutex<Vec<Upload>>,
}

fn header(req: &HttpRequest, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

fn analysis() -> serde_json::Value {
    json!({
        "image_size": [120, 80],
        "flowers": [{
            "bbox": [10, 12, 60, 70, 0.88],
            "votes": [
                {"model_name": "vit", "class_id": 5, "class_name": "orchid", "confidence": 0.9},
                {"model_name": "cnn", "class_id": 5, "class_name": "orchid", "confidence": 0.85}
            ],
            "final_class": {"class_name": "orchid", "class_id": 5, "confidence": 0.875, "vote_count": 2}
        }],
        "processing_time": 0.31,
        "timestamp": "2024-05-01T10:00:00"
    })
}

/// The bearer token picks the behaviour, so one server covers every case.
async fn detect(req: HttpRequest, body: web::Bytes, recorded: web::Data<Recorded>) -> HttpResponse {
    let authorization = header(&req, "authorization");
    recorded.uploads.lock().unwrap().push(Upload {
        authorization: authorization.clone(),
        content_type: header(&req, "content-type"),
        body: body.to_vec(),
    });
    match authorization.as_deref() {
        Some("Bearer expired") => HttpResponse::Unauthorized().json(json!({"detail": "Token expired"})),
        Some("Bearer bad") => HttpResponse::UnprocessableEntity()
            .json(json!({"detail": [{"loc": ["body", "image"], "msg": "field required"}]})),
        Some("Bearer boom") => HttpResponse::InternalServerError().body("inference crashed"),
        Some("Bearer garbled") => HttpResponse::Ok().body("<html>maintenance</html>"),
        Some("Bearer async") => HttpResponse::Ok().json(json!({"task_id": 42, "status": "pending"})),
        _ => HttpResponse::Ok().json(analysis()),
    }
}

async fn task_status(path: web::Path<String>) -> HttpResponse {
    match path.as_str() {
        "42" => HttpResponse::Ok().json(json!({"status": "processing"})),
        "7" => HttpResponse::Ok().json(json!({"status": "completed", "result": analysis()})),
        "9" => HttpResponse::Ok().json(json!({"status": "failed", "error": "model crashed"})),
        "../detect" | "..%2Fdetect" => HttpResponse::Ok().json(json!({"status": "processing"})),
        _ => HttpResponse::NotFound().json(json!({"detail": "Task not found"})),
    }
}

async fn spawn_backend() -> (HttpAnalysisClient, web::Data<Recorded>) {
    let recorded = web::Data::new(Recorded::default());
    let data = recorded.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .route("/api/flower/detect", web::post().to(detect))
            .route("/api/flower/tasks/{task_id}", web::get().to(task_status))
    })
    .workers(1)
    .bind(("127.0.0.1", 0))
    .unwrap();
    let addr = server.addrs()[0];
    actix_web::rt::spawn(server.run());

    let mut config = PipelineConfig::default();
    config.api.base_url = format!("http://{addr}/api");
    (HttpAnalysisClient::from_config(&config).unwrap(), recorded)
}

fn jpeg() -> EncodedImage {
    EncodedImage {
        mime: "image/jpeg".into(),
        width: 120,
        height: 80,
        bytes: b"\xff\xd8\xff\xe0not-really-a-jpeg".to_vec(),
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}

#[actix_web::test]
async fn synchronous_detection_uploads_a_multipart_image() {
    let (client, recorded) = spawn_backend().await;

    let submission = client.submit(jpeg(), "sync").await.unwrap();

    let Submission::Completed(result) = submission else {
        panic!("expected an inline result, got {submission:?}");
    };
    assert_eq!(result.image_size, [120, 80]);
    assert_eq!(result.flowers.len(), 1);
    assert_eq!(result.flowers[0].bbox.confidence, Some(0.88));
    assert_eq!(result.flowers[0].final_class.vote_count, 2);

    let uploads = recorded.uploads.lock().unwrap();
    let upload = &uploads[0];
    assert_eq!(upload.authorization.as_deref(), Some("Bearer sync"));
    assert!(upload
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("multipart/form-data"));
    assert!(contains(&upload.body, b"name=\"image\""));
    assert!(contains(&upload.body, b"filename=\"image.jpg\""));
    assert!(contains(&upload.body, &jpeg().bytes));
}

#[actix_web::test]
async fn asynchronous_detection_is_polled_by_handle() {
    let (client, _) = spawn_backend().await;

    let submission = client.submit(jpeg(), "async").await.unwrap();
    assert_eq!(submission, Submission::Accepted(TaskHandle::from("42")));

    let pending = client.fetch_status(&TaskHandle::from("42"), "async").await.unwrap();
    assert_eq!(pending.status, RemoteStatus::Processing);
    assert!(pending.result.is_none());

    let done = client.fetch_status(&TaskHandle::from("7"), "async").await.unwrap();
    assert_eq!(done.status, RemoteStatus::Completed);
    assert_eq!(done.result.unwrap().flowers[0].final_class.class_name, "orchid");

    let failed = client.fetch_status(&TaskHandle::from("9"), "async").await.unwrap();
    assert_eq!(failed.status, RemoteStatus::Failed);
    assert_eq!(failed.error.as_deref(), Some("model crashed"));
}

#[actix_web::test]
async fn http_failures_map_onto_client_errors() {
    let (client, _) = spawn_backend().await;

    let err = client.submit(jpeg(), "expired").await.unwrap_err();
    assert!(matches!(err, ClientError::Auth(ref detail) if detail == "Token expired"));

    let err = client.submit(jpeg(), "bad").await.unwrap_err();
    assert!(matches!(err, ClientError::Validation { status: 422, ref detail } if detail.contains("field required")));

    let err = client.submit(jpeg(), "boom").await.unwrap_err();
    assert!(matches!(err, ClientError::Service { status: 500, ref detail } if detail == "inference crashed"));
    assert!(err.is_transient());

    let err = client.submit(jpeg(), "garbled").await.unwrap_err();
    assert!(matches!(err, ClientError::InvalidResponse(_)));

    let err = client
        .fetch_status(&TaskHandle::from("missing"), "t")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation { status: 404, .. }));
}

#[actix_web::test]
async fn unreachable_service_is_a_network_error() {
    let mut config = PipelineConfig::default();
    config.api.base_url = "http://127.0.0.1:1".into();
    let client = HttpAnalysisClient::from_config(&config).unwrap();

    let err = client.submit(jpeg(), "t").await.unwrap_err();
    assert!(matches!(err, ClientError::Network(_)));
    assert!(err.is_transient());
}

#[actix_web::test]
async fn task_ids_with_path_characters_stay_under_the_tasks_endpoint() {
    let (client, recorded) = spawn_backend().await;

    let pending = client
        .fetch_status(&TaskHandle::from("../detect"), "t")
        .await
        .unwrap();
    assert_eq!(pending.status, RemoteStatus::Processing);
    assert!(recorded.uploads.lock().unwrap().is_empty());
}
