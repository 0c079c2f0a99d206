use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use diorama_core::error::{DioramaError, ValidationError};

// ---------------------------------------------------------------------------
// Internal sentinel for explicit 400 Bad Request errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct BadRequestError(String);

impl std::fmt::Display for BadRequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequestError {}

// ---------------------------------------------------------------------------
// AppError: unified error type for HTTP responses
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequestError(msg.into()).into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequestError>().is_some()
            || self.0.downcast_ref::<ValidationError>().is_some()
        {
            StatusCode::BAD_REQUEST
        } else if let Some(e) = self.0.downcast_ref::<DioramaError>() {
            match e {
                DioramaError::SceneNotFound(_) => StatusCode::NOT_FOUND,
                DioramaError::AliasCycle(_) => StatusCode::UNPROCESSABLE_ENTITY,
                DioramaError::UnknownOperation(_)
                | DioramaError::InvalidParams { .. }
                | DioramaError::Validation(_) => StatusCode::BAD_REQUEST,
                DioramaError::MissingCredentials(_) => StatusCode::SERVICE_UNAVAILABLE,
                DioramaError::Io(_) | DioramaError::Yaml(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diorama_core::error::Field;

    fn validation() -> ValidationError {
        ValidationError {
            field: Field::P1,
            value: 5000,
            min: 0,
            max: 4095,
        }
    }

    #[test]
    fn validation_error_maps_to_400() {
        let response = AppError::from(validation()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn wrapped_validation_error_maps_to_400() {
        let err = AppError(DioramaError::Validation(validation()).into());
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn scene_not_found_maps_to_404() {
        let err = AppError(DioramaError::SceneNotFound("NOPE".into()).into());
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn alias_cycle_maps_to_422() {
        let err = AppError(DioramaError::AliasCycle(vec!["A".into(), "A".into()]).into());
        assert_eq!(err.into_response().status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn bad_request_constructor_maps_to_400() {
        let err = AppError::bad_request("text must not be empty");
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn io_error_maps_to_500() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "scenes.yaml");
        let err = AppError(DioramaError::Io(io).into());
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn other_errors_map_to_500() {
        let err = AppError(anyhow::anyhow!("something unexpected"));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn response_body_is_json() {
        let response = AppError::bad_request("nope").into_response();
        let ct = response
            .headers()
            .get(axum::http::header::CONTENT_TYPE)
            .expect("should have content-type");
        assert!(ct.to_str().unwrap().contains("application/json"));
    }
}
