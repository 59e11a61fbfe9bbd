use actix_web::{
    get,
    web::{self, Data},
    HttpResponse, Responder,
};
use chrono::{Duration, Utc};
use serde::Deserialize;

use crate::{errors::AppError, AppState};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    filename: String,
    crn: String,
    #[serde(rename = "type")]
    doc_type: String,
}

fn safe_segment(name: &str, value: &str) -> Result<(), AppError> {
    if value.is_empty() || value.contains('/') || value.contains("..") {
        return Err(AppError::Validation(format!("Invalid {}: {}", name, value)));
    }
    Ok(())
}

/// Object path for an uploaded document: `{crn}/{type}/{filename}`.
pub fn object_name(query: &UploadQuery) -> Result<String, AppError> {
    safe_segment("filename", &query.filename)?;
    safe_segment("crn", &query.crn)?;
    safe_segment("type", &query.doc_type)?;
    Ok(format!("{}/{}/{}", query.crn, query.doc_type, query.filename))
}

#[get("/server/gcp/upload")]
pub async fn upload_handler(
    state: Data<AppState>,
    query: web::Query<UploadQuery>,
) -> Result<impl Responder, AppError> {
    let object = object_name(&query)?;
    let policy = state
        .uploads
        .post_policy(&object, Utc::now(), Duration::minutes(1))?;
    log::info!("Upload policy issued for {} in {}", object, state.uploads.bucket());
    Ok(HttpResponse::Ok().json(policy))
}

#[cfg(test)]
mod tests {
    use actix_web::{cookie::Key, http::StatusCode, test as actix_test};
    use serde_json::Value;

    use super::*;
    use crate::{build_app, testing::test_context};

    #[test]
    fn rejects_path_traversal() {
        let query = |filename: &str, crn: &str| UploadQuery {
            filename: filename.into(),
            crn: crn.into(),
            doc_type: "pod".into(),
        };
        assert_eq!(
            object_name(&query("receipt.pdf", "12345678")).unwrap(),
            "12345678/pod/receipt.pdf"
        );
        assert!(object_name(&query("../secret", "12345678")).is_err());
        assert!(object_name(&query("receipt.pdf", "a/b")).is_err());
        assert!(object_name(&query("", "12345678")).is_err());
    }

    #[actix_web::test]
    async fn issues_signed_policy() {
        let ctx = test_context().await;
        let app = actix_test::init_service(build_app(ctx.state.clone(), Key::generate())).await;
        let req = actix_test::TestRequest::get()
            .uri("/server/gcp/upload?filename=pod.png&crn=12345678&type=invoices")
            .to_request();
        let body: Value = actix_test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["url"], "https://storage.googleapis.com/trok-uploads/");
        assert_eq!(body["fields"]["key"], "12345678/invoices/pod.png");
        assert_eq!(body["fields"]["x-goog-algorithm"], "GOOG4-HMAC-SHA256");
        assert_eq!(body["fields"]["x-goog-signature"].as_str().unwrap().len(), 64);
    }

    #[actix_web::test]
    async fn missing_parameters_are_rejected() {
        let ctx = test_context().await;
        let app = actix_test::init_service(build_app(ctx.state.clone(), Key::generate())).await;
        let req = actix_test::TestRequest::get()
            .uri("/server/gcp/upload?filename=pod.png")
            .to_request();
        let resp = actix_test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
