use actix_cors::Cors;
use actix_files::NamedFile;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Result as ActixResult};
use facereg_core::Error;
use facereg_registry::{
    DeleteRequest, EditRequest, RecognizeRequest, Recognition, RegisterRequest, RegistryService,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;

#[derive(Deserialize)]
struct FilenameQuery {
    filename: Option<String>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(service: Arc<RegistryService>, port: u16) -> std::io::Result<()> {
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(service.clone()))
                .configure(routes)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Register every route. Expects `web::Data<Arc<RegistryService>>` in app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/register", web::post().to(register))
        .route("/recognize", web::post().to(recognize))
        .route("/images", web::get().to(list_images))
        .route("/registered_faces/{filename}", web::get().to(serve_image))
        .route("/delete_image", web::post().to(delete_image))
        .route("/edit_user", web::post().to(edit_user))
        .route("/user_data", web::get().to(user_data));
}

fn error_response(e: &Error) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        Error::Validation(_) | Error::NoFaceDetected => HttpResponse::BadRequest().json(body),
        Error::NotFound(_) => HttpResponse::NotFound().json(body),
        Error::Extraction(_) => HttpResponse::BadGateway().json(body),
        _ => {
            error!("Request failed: {}", e);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// JSON has no infinity; an unbounded distance goes out as `null`.
fn distance_json(distance: f32) -> serde_json::Value {
    if distance.is_finite() {
        serde_json::json!(distance)
    } else {
        serde_json::Value::Null
    }
}

async fn health(service: web::Data<Arc<RegistryService>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "records": service.store().len(),
    })))
}

async fn register(
    service: web::Data<Arc<RegistryService>>,
    req: web::Json<RegisterRequest>,
) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    let result = web::block(move || service.register(req.into_inner())).await?;

    match result {
        Ok(key) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Registro exitoso",
            "archivo": key,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn recognize(
    service: web::Data<Arc<RegistryService>>,
    req: web::Json<RecognizeRequest>,
) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    let result = web::block(move || service.recognize(req.into_inner())).await?;

    match result {
        Ok(Recognition::Recognized { key, profile, distance }) => {
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "message": format!("Rostro reconocido: {}", profile.full_name()),
                "archivo": key,
                "nombre": profile.first_name,
                "apellido": profile.last_name,
                "email": profile.email,
                "telefono": profile.phone,
                "distancia": distance_json(distance),
            })))
        }
        Ok(Recognition::Unrecognized { distance }) => {
            Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "No se encontró coincidencia",
                "distancia": distance_json(distance),
            })))
        }
        Err(e) => Ok(error_response(&e)),
    }
}

async fn list_images(service: web::Data<Arc<RegistryService>>) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    match web::block(move || service.list_images()).await? {
        Ok(images) => Ok(HttpResponse::Ok().json(serde_json::json!({ "images": images }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn serve_image(
    service: web::Data<Arc<RegistryService>>,
    path: web::Path<String>,
    req: HttpRequest,
) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    let filename = path.into_inner();
    match web::block(move || service.store().image_path(&filename)).await? {
        Ok(image_path) => Ok(NamedFile::open_async(image_path).await?.into_response(&req)),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn delete_image(
    service: web::Data<Arc<RegistryService>>,
    req: web::Json<DeleteRequest>,
) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    let result = web::block(move || service.delete(req.into_inner())).await?;

    match result {
        Ok(_) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Imagen y datos eliminados",
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn edit_user(
    service: web::Data<Arc<RegistryService>>,
    req: web::Json<EditRequest>,
) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    let result = web::block(move || service.edit(req.into_inner())).await?;

    match result {
        Ok(new_key) => Ok(HttpResponse::Ok().json(serde_json::json!({
            "message": "Datos actualizados",
            "nuevo_filename": new_key,
        }))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn user_data(
    service: web::Data<Arc<RegistryService>>,
    query: web::Query<FilenameQuery>,
) -> ActixResult<HttpResponse> {
    let service = service.get_ref().clone();
    let filename = query.into_inner().filename;
    match web::block(move || service.profile(filename.as_deref())).await? {
        Ok(profile) => Ok(HttpResponse::Ok().json(profile)),
        Err(e) => Ok(error_response(&e)),
    }
}
