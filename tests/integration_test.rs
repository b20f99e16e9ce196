// Integration tests for facereg
use base64::{engine::general_purpose::STANDARD, Engine as _};
use facereg::prelude::*;
use facereg::{DeleteRequest, EditRequest, RecognizeRequest, RegisterRequest};
use image::{DynamicImage, Rgb, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

/// Deterministic stand-in for the extraction model: the embedding is the
/// mean pixel colour, and an all-black image has no face.
struct MeanColor;

impl FaceEmbedder for MeanColor {
    fn extract(&self, image: &DynamicImage) -> Extraction {
        let rgb = image.to_rgb8();
        let n = (rgb.width() * rgb.height()) as f32;
        let mut sum = [0f32; 3];
        for px in rgb.pixels() {
            for (s, c) in sum.iter_mut().zip(px.0) {
                *s += c as f32;
            }
        }
        if sum.iter().all(|s| *s == 0.0) {
            return Extraction::NotDetected;
        }
        Extraction::Detected(Embedding::new(sum.iter().map(|s| s / n).collect()))
    }
}

/// Always fails, like an unreachable model service.
struct Broken;

impl FaceEmbedder for Broken {
    fn extract(&self, _image: &DynamicImage) -> Extraction {
        Extraction::Failed("model offline".to_string())
    }
}

fn png(color: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb(color)));
    let mut buffer = Cursor::new(Vec::new());
    img.write_to(&mut buffer, image::ImageFormat::Png).unwrap();
    buffer.into_inner()
}

fn b64(color: [u8; 3]) -> String {
    STANDARD.encode(png(color))
}

fn service_in(dir: &TempDir) -> RegistryService {
    let store = Arc::new(RecordStore::open(dir.path()).unwrap());
    RegistryService::new(store, Arc::new(MeanColor), RegistryConfig::default())
}

fn register_req(first: &str, last: &str, color: [u8; 3]) -> RegisterRequest {
    RegisterRequest {
        first_name: Some(first.to_string()),
        last_name: Some(last.to_string()),
        last_names: None,
        email: Some(format!("{}@example.com", first.to_lowercase())),
        phone: Some("555-0101".to_string()),
        image: Some(b64(color)),
    }
}

#[test]
fn test_register_roundtrip() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);

    let key = service.register(register_req("Ana", "Gomez", [100, 50, 25])).unwrap();
    assert_eq!(key, derive_key("Ana", "Gomez"));

    let profile = service.profile(Some(&key)).unwrap();
    assert_eq!(
        serde_json::to_value(&profile).unwrap(),
        serde_json::json!({
            "nombre": "Ana",
            "apellido": "Gomez",
            "email": "ana@example.com",
            "telefono": "555-0101",
        })
    );

    // The stored image is the submitted bytes.
    assert_eq!(service.store().read_image(&key).unwrap(), png([100, 50, 25]));
}

#[test]
fn test_recognize_picks_nearest() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service.register(register_req("Ana", "Gomez", [100, 50, 25])).unwrap();
    service.register(register_req("Luis", "Diaz", [30, 200, 90])).unwrap();

    let result = service
        .recognize(RecognizeRequest { image: Some(b64([31, 201, 90])) })
        .unwrap();
    match result {
        Recognition::Recognized { key, distance, .. } => {
            assert_eq!(key, "Luis_Diaz.png");
            assert!(distance < 2.0);
        }
        other => panic!("expected a match, got {:?}", other),
    }
}

#[test]
fn test_threshold_is_configurable() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RecordStore::open(dir.path()).unwrap());
    let strict = RegistryService::new(store, Arc::new(MeanColor), RegistryConfig { threshold: 0.5 });
    strict.register(register_req("Ana", "Gomez", [100, 50, 25])).unwrap();

    let near = strict
        .recognize(RecognizeRequest { image: Some(b64([101, 50, 25])) })
        .unwrap();
    assert_eq!(near, Recognition::Unrecognized { distance: 1.0 });
}

#[test]
fn test_extraction_failure_is_distinct() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(RecordStore::open(dir.path()).unwrap());
    let service = RegistryService::new(store, Arc::new(Broken), RegistryConfig::default());

    let err = service.register(register_req("Ana", "Gomez", [1, 2, 3])).unwrap_err();
    assert!(matches!(err, Error::Extraction(_)));
    assert!(service.store().is_empty());
}

#[test]
fn test_edit_delete_and_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let service = service_in(&dir);
        service.register(register_req("Ana", "Gomez", [100, 50, 25])).unwrap();
        service.register(register_req("Luis", "Diaz", [30, 200, 90])).unwrap();
        let original = service.store().get_embedding("Ana_Gomez.png").unwrap();

        let new_key = service
            .edit(EditRequest {
                key: Some("Ana_Gomez.png".to_string()),
                first_name: Some("Ana".to_string()),
                last_name: Some("Lopez".to_string()),
                email: Some("ana@example.com".to_string()),
                phone: Some("555-0199".to_string()),
            })
            .unwrap();
        assert_eq!(new_key, "Ana_Lopez.png");
        assert_eq!(service.store().get_embedding("Ana_Lopez.png"), Some(original));

        service
            .delete(DeleteRequest { key: Some("Luis_Diaz.png".to_string()) })
            .unwrap();
    }

    // Everything above is on disk.
    let service = service_in(&dir);
    assert_eq!(service.list_images().unwrap(), vec!["Ana_Lopez.png"]);
    assert_eq!(service.profile(Some("Ana_Lopez.png")).unwrap().phone, "555-0199");
    assert!(matches!(service.profile(Some("Ana_Gomez.png")), Err(Error::NotFound(_))));
    assert!(matches!(service.profile(Some("Luis_Diaz.png")), Err(Error::NotFound(_))));
    assert!(service.store().get_embedding("Ana_Gomez.png").is_none());

    let result = service
        .recognize(RecognizeRequest { image: Some(b64([100, 50, 25])) })
        .unwrap();
    assert!(matches!(result, Recognition::Recognized { ref key, .. } if key == "Ana_Lopez.png"));
}

#[test]
fn test_same_name_overwrites() {
    let dir = TempDir::new().unwrap();
    let service = service_in(&dir);
    service.register(register_req("Ana", "Gomez", [100, 50, 25])).unwrap();
    service.register(register_req("Ana", "Gomez", [10, 20, 30])).unwrap();

    assert_eq!(service.store().len(), 1);
    assert_eq!(
        service.store().get_embedding("Ana_Gomez.png"),
        Some(Embedding::new(vec![10.0, 20.0, 30.0]))
    );
}

mod rest {
    use super::*;
    use actix_web::{http::StatusCode, test, web, App};

    fn data(dir: &TempDir) -> web::Data<Arc<RegistryService>> {
        web::Data::new(Arc::new(service_in(dir)))
    }

    #[actix_web::test]
    async fn test_register_and_recognize_over_http() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().app_data(data(&dir)).configure(facereg_api::routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(serde_json::json!({
                "nombre": "Ana",
                "apellidos": "Gomez",
                "email": "ana@example.com",
                "telefono": "555-0101",
                "imagen": format!("data:image/png;base64,{}", b64([100, 50, 25])),
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["archivo"], "Ana_Gomez.png");

        let req = test::TestRequest::post()
            .uri("/recognize")
            .set_json(serde_json::json!({ "imagen": b64([100, 50, 25]) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["nombre"], "Ana");
        assert_eq!(body["distancia"], 0.0);

        let req = test::TestRequest::get().uri("/images").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["images"], serde_json::json!(["Ana_Gomez.png"]));

        let req = test::TestRequest::get()
            .uri("/registered_faces/Ana_Gomez.png")
            .to_request();
        let bytes = test::call_and_read_body(&app, req).await;
        assert_eq!(bytes.as_ref(), png([100, 50, 25]).as_slice());
    }

    #[actix_web::test]
    async fn test_error_statuses() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().app_data(data(&dir)).configure(facereg_api::routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(serde_json::json!({ "nombre": "Ana" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/recognize")
            .set_json(serde_json::json!({ "imagen": b64([0, 0, 0]) }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/recognize")
            .set_json(serde_json::json!({ "imagen": b64([5, 5, 5]) }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["distancia"].is_null());

        let req = test::TestRequest::get().uri("/user_data").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::get()
            .uri("/user_data?filename=Nadie_Aqui.png")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/edit_user")
            .set_json(serde_json::json!({
                "filename": "Nadie_Aqui.png",
                "nombre": "Nadie",
                "apellido": "Aqui",
                "email": "n@a.com",
                "telefono": "0",
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        let req = test::TestRequest::post()
            .uri("/delete_image")
            .set_json(serde_json::json!({}))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/delete_image")
            .set_json(serde_json::json!({ "filename": "Nadie_Aqui.png" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/registered_faces/missing.png")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn test_edit_over_http() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().app_data(data(&dir)).configure(facereg_api::routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(serde_json::json!({
                "nombre": "Ana",
                "apellido": "Gomez",
                "email": "ana@example.com",
                "telefono": "555-0101",
                "imagen": b64([100, 50, 25]),
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::post()
            .uri("/edit_user")
            .set_json(serde_json::json!({
                "filename": "Ana_Gomez.png",
                "nombre": "Ana",
                "apellido": "Lopez",
                "email": "ana@example.com",
                "telefono": "555-0101",
            }))
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["nuevo_filename"], "Ana_Lopez.png");

        let req = test::TestRequest::get()
            .uri("/user_data?filename=Ana_Lopez.png")
            .to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["apellido"], "Lopez");

        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["records"], 1);
    }

    #[actix_web::test]
    async fn test_unsafe_filenames_rejected_over_http() {
        let root = TempDir::new().unwrap();
        let store = Arc::new(RecordStore::open(root.path().join("data")).unwrap());
        let service = RegistryService::new(store, Arc::new(MeanColor), RegistryConfig::default());
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(Arc::new(service)))
                .configure(facereg_api::routes),
        )
        .await;
        let victim = root.path().join("victim.txt");
        std::fs::write(&victim, b"keep").unwrap();

        let req = test::TestRequest::post()
            .uri("/delete_image")
            .set_json(serde_json::json!({ "filename": "../../victim.txt" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        assert!(victim.exists());

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(serde_json::json!({
                "nombre": "../../pwn",
                "apellido": "x",
                "email": "p@x.com",
                "telefono": "0",
                "imagen": b64([100, 50, 25]),
            }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
        assert!(!root.path().join("pwn_x.png").exists());
    }

    #[actix_web::test]
    async fn test_register_with_apellido_and_apellidos() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new().app_data(data(&dir)).configure(facereg_api::routes),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/register")
            .set_json(serde_json::json!({
                "nombre": "Ana",
                "apellido": "",
                "apellidos": "Gomez Ruiz",
                "email": "ana@example.com",
                "telefono": "555-0101",
                "imagen": b64([100, 50, 25]),
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["archivo"], "Ana_Gomez_Ruiz.png");
    }
}
