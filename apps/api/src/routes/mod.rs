pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::services::ServeDir;

use crate::config::StorageKind;
use crate::intake::handlers;
use crate::state::AppState;

/// Headroom above the file limit for the form data and multipart framing, so
/// oversized files reach the handler and get a proper 413 message.
const BODY_OVERHEAD: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size + BODY_OVERHEAD;

    let mut router = Router::new()
        .route("/", get(health::root_handler))
        .route("/health", get(health::health_handler))
        .route("/api/form-config", get(handlers::handle_form_config))
        .route("/api/upload", post(handlers::handle_upload))
        .route("/api/stats", get(handlers::handle_stats))
        .route("/api/uploads/:id", get(handlers::handle_get_upload));

    // Locally stored CVs are served back at the URLs returned in receipts
    if state.config.storage == StorageKind::Local {
        router = router.nest_service("/uploads", ServeDir::new(&state.config.upload_dir));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::config::Config;
    use crate::intake::storage::{LocalStorageBackend, StorageService};
    use crate::intake::validation::FormDataValidator;

    const BOUNDARY: &str = "cv-upload-test-boundary";

    async fn test_state(dir: &tempfile::TempDir) -> AppState {
        let config = Config::for_tests(dir.path());
        let backend = LocalStorageBackend::new(dir.path()).await.unwrap();
        AppState {
            config,
            storage: StorageService::new(Arc::new(backend)),
            validator: Arc::new(FormDataValidator::new().unwrap()),
        }
    }

    fn multipart_body(file: Option<(&str, &str, &[u8])>, form_data: Option<&str>) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some((filename, content_type, bytes)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"cv_file\"; \
                     filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(form_data) = form_data {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"form_data\"\r\n\r\n\
                     {form_data}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(body: Vec<u8>) -> Request<Body> {
        Request::post("/api/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn valid_form() -> String {
        json!({
            "prenom": "Jean",
            "nom": "Dupont",
            "email": "jean.dupont@example.fr",
            "rgpd_consent": true,
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);

        let (status, body) = send(app.clone(), Request::get("/").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["message"].as_str().unwrap().contains("running"));

        let (status, body) = send(app, Request::get("/health").body(Body::empty()).unwrap()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn test_form_config_lists_fields() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);
        let (status, body) = send(
            app,
            Request::get("/api/form-config").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "1.0");
        assert_eq!(body["fields"].as_array().unwrap().len(), 7);
        assert!(body["last_updated"].is_string());
    }

    #[tokio::test]
    async fn test_upload_then_stats_and_details() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);

        let form = valid_form();
        let body = multipart_body(
            Some(("mon_cv.pdf", "application/pdf", b"%PDF-1.4 fake")),
            Some(&form),
        );
        let (status, receipt) = send(app.clone(), upload_request(body)).await;
        assert_eq!(status, StatusCode::CREATED, "{receipt}");
        assert_eq!(receipt["success"], true);
        assert_eq!(receipt["message"], "CV et données sauvegardés avec succès");
        assert_eq!(receipt["file_info"]["filename"], "mon_cv.pdf");
        assert_eq!(receipt["file_info"]["size"], 13);
        assert_eq!(receipt["form_fields_received"].as_array().unwrap().len(), 4);

        let upload_id = receipt["upload_id"].as_str().unwrap().to_string();
        assert_eq!(receipt["cv_url"], format!("/uploads/cv/{upload_id}.pdf"));

        let (_, stats) = send(
            app.clone(),
            Request::get("/api/stats").body(Body::empty()).unwrap(),
        )
        .await;
        assert_eq!(stats["total_uploads"], 1);
        assert_eq!(stats["storage_backend"], "LocalStorageBackend");

        let (status, details) = send(
            app.clone(),
            Request::get(format!("/api/uploads/{upload_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(details["cv_available"], true);
        assert_eq!(details["metadata"]["form_data"]["prenom"], "Jean");

        let response = app
            .oneshot(
                Request::get(format!("/uploads/cv/{upload_id}.pdf"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let served = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&served[..], b"%PDF-1.4 fake");
    }

    #[tokio::test]
    async fn test_invalid_form_json_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);
        let body = multipart_body(
            Some(("cv.pdf", "application/pdf", b"%PDF-1.4")),
            Some("{not json"),
        );
        let (status, body) = send(app, upload_request(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body["detail"],
            "Format JSON invalide pour les données du formulaire"
        );
    }

    #[tokio::test]
    async fn test_missing_file_part_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);
        let form = valid_form();
        let (status, body) = send(app, upload_request(multipart_body(None, Some(&form)))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Champ manquant: cv_file");
    }

    #[tokio::test]
    async fn test_non_pdf_is_415_and_nothing_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir).await;
        let storage = state.storage.clone();
        let app = build_router(state);

        let form = valid_form();
        let body = multipart_body(Some(("photo.png", "image/png", b"\x89PNG")), Some(&form));
        let (status, body) = send(app, upload_request(body)).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["detail"], "Le fichier ne semble pas être un PDF valide");
        assert_eq!(storage.count_uploads().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_oversized_file_is_413() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = test_state(&dir).await;
        state.config.max_file_size = 1024;
        let app = build_router(state);

        let big = vec![b'a'; 2048];
        let form = valid_form();
        let body = multipart_body(Some(("cv.pdf", "application/pdf", &big)), Some(&form));
        let (status, body) = send(app, upload_request(body)).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert!(body["detail"]
            .as_str()
            .unwrap()
            .starts_with("Fichier trop volumineux"));
    }

    #[tokio::test]
    async fn test_form_errors_are_422_with_field_list() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);

        let form = json!({"prenom": "Jean", "email": "nope"}).to_string();
        let body = multipart_body(Some(("cv.pdf", "application/pdf", b"%PDF-1.4")), Some(&form));
        let (status, body) = send(app, upload_request(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"]["message"], "Erreurs de validation détectées");

        let fields: Vec<&str> = body["detail"]["errors"]
            .as_array()
            .unwrap()
            .iter()
            .map(|e| e["field"].as_str().unwrap())
            .collect();
        assert!(fields.contains(&"rgpd_consent"));
        assert!(fields.contains(&"email"));
    }

    #[tokio::test]
    async fn test_unknown_upload_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);

        for id in ["not-a-uuid", "00000000-0000-4000-8000-000000000000"] {
            let (status, body) = send(
                app.clone(),
                Request::get(format!("/api/uploads/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
            assert_eq!(status, StatusCode::NOT_FOUND);
            assert_eq!(body["detail"], "Upload non trouvé");
        }
    }

    /// Full round trip: the form controller talks to a live server over HTTP.
    #[tokio::test]
    async fn test_form_controller_against_live_server() {
        use cv_form::{
            FieldInput, FormGateway, FormSettings, HttpGateway, Phase, SelectedAttachment,
            StatsPanel, UploadController,
        };

        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(&dir).await);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let settings = FormSettings {
            api_base_url: format!("http://{addr}"),
            ..FormSettings::default()
        };
        let gateway = Arc::new(HttpGateway::new(&settings).unwrap());
        let mut controller = UploadController::new(gateway.clone(), &settings);

        controller.load_config().await;
        assert_eq!(controller.phase(), &Phase::Ready);

        controller
            .select_file(SelectedAttachment::new(
                "cv.pdf",
                "application/pdf",
                b"%PDF-1.4 round trip".to_vec(),
            ))
            .unwrap();
        for (name, value) in [
            ("prenom", "Marie"),
            ("nom", "Curie"),
            ("email", "marie.curie@example.fr"),
        ] {
            controller
                .change_field(name, FieldInput::Text(value.to_string()))
                .unwrap();
        }
        controller
            .change_field("rgpd_consent", FieldInput::Checked(true))
            .unwrap();

        controller.submit().await.unwrap();
        let success = controller.success().expect("upload should succeed");
        assert_eq!(success.title(), "Merci Marie, votre CV a été reçu !");
        let upload_id = success.upload_id().to_string();

        let details = gateway.fetch_upload(&upload_id).await.unwrap();
        assert_eq!(details["cv_available"], true);

        match StatsPanel::load(gateway.as_ref()).await {
            StatsPanel::Loaded(stats) => assert_eq!(stats.total_uploads, 1),
            other => panic!("unexpected {other:?}"),
        }
    }
}
