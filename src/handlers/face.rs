use crate::core::error::ApiError;
use crate::core::state::AppState;
use crate::face::client::check_face;
use crate::models::payloads::{FaceVerifyRequest, FaceVerifyResponse};
use crate::models::user::Principal;
use axum::{extract::State, Extension, Json};
use std::sync::Arc;

/// POST /face/verify
///
/// Never fails on a matching problem; the outcome is reported in the body.
pub async fn verify_face_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<FaceVerifyRequest>,
) -> Result<Json<FaceVerifyResponse>, ApiError> {
    let usn = payload.user_id.unwrap_or_else(|| principal.usn.clone());
    if principal.is_student() && usn != principal.usn {
        return Err(ApiError::Forbidden("students may only verify their own face".to_string()));
    }

    let response = if state.identity.get_user(&usn).is_none() {
        FaceVerifyResponse {
            verified: false,
            message: "User not found".to_string(),
            confidence: None,
        }
    } else if let Some(matcher) = state.face.as_deref() {
        let check = check_face(matcher, &state.config.storage.face_dir, &usn, &payload.image).await;
        FaceVerifyResponse {
            verified: check.verified,
            message: check.message,
            confidence: check.confidence,
        }
    } else {
        FaceVerifyResponse {
            verified: false,
            message: "Face matching is not configured".to_string(),
            confidence: None,
        }
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use crate::core::routes::testing::TestApp;
    use crate::face::client::testing::StaticMatcher;
    use crate::face::images::store_reference;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_verify_without_service() {
        let app = TestApp::new();
        let student = app.seed_student("U1", "Asha", "CSE-3A");

        let (status, body) = app.post("/face/verify", Some(&student), json!({"image": "AAAA"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["verified"], false);
    }

    #[tokio::test]
    async fn test_verify_with_service() {
        let app = TestApp::with_face(Arc::new(StaticMatcher { verified: Some(true) }));
        let student = app.seed_student("U1", "Asha", "CSE-3A");

        let (_, body) = app.post("/face/verify", Some(&student), json!({"image": "AAAA"})).await;
        assert_eq!(body["verified"], false);
        assert!(body["message"].as_str().unwrap().contains("No registered face"));

        store_reference(&app.state.config.storage.face_dir, "U1", b"reference")
            .await
            .unwrap();
        let (_, body) = app.post("/face/verify", Some(&student), json!({"image": "AAAA"})).await;
        assert_eq!(body["verified"], true);
    }

    #[tokio::test]
    async fn test_verify_other_user() {
        let app = TestApp::new();
        let student = app.seed_student("U1", "Asha", "CSE-3A");
        let teacher = app.seed_teacher("T01", &["Math"]);

        let (status, _) = app
            .post("/face/verify", Some(&student), json!({"image": "AAAA", "user_id": "U2"}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = app
            .post("/face/verify", Some(&teacher), json!({"image": "AAAA", "user_id": "U404"}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User not found");
    }
}
