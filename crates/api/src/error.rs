use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use filestore_core::FileStoreError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("调度器错误: {0}")]
    Dispatcher(#[from] FileStoreError),

    #[error("未找到资源")]
    NotFound,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            ApiError::Dispatcher(FileStoreError::UnknownWorker { id }) => (
                StatusCode::NOT_FOUND,
                format!("Worker {id} 不存在"),
                "WORKER_NOT_FOUND",
            ),
            // 客户端违反提交协议，调度器状态不受影响
            ApiError::Dispatcher(err) if err.is_protocol_violation() => (
                StatusCode::BAD_REQUEST,
                err.to_string(),
                "PROTOCOL_VIOLATION",
            ),
            ApiError::Dispatcher(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                err.to_string(),
                "DISPATCHER_ERROR",
            ),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "请求的资源不存在".to_string(),
                "NOT_FOUND",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message, error_type) = self.parts();

        if status.is_server_error() {
            tracing::error!("请求处理失败: {}", error_message);
        } else {
            tracing::debug!("请求被拒绝: {}", error_message);
        }

        let body = Json(json!({
            "success": false,
            "error": {
                "message": error_message,
                "type": error_type,
                "code": status.as_u16(),
            },
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_violations_map_to_bad_request() {
        let error = ApiError::Dispatcher(FileStoreError::UnknownToken {
            token: "t".to_string(),
        });
        assert_eq!(error.into_response().status(), StatusCode::BAD_REQUEST);

        let error = ApiError::Dispatcher(FileStoreError::InvalidJob("missing".to_string()));
        let (status, message, error_type) = error.parts();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(error_type, "PROTOCOL_VIOLATION");
        assert!(message.contains("missing"));
    }

    #[test]
    fn test_unknown_worker_maps_to_not_found() {
        let error = ApiError::from(FileStoreError::UnknownWorker {
            id: "w9".to_string(),
        });
        assert_eq!(error.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_other_errors_map_to_internal() {
        let error = ApiError::Dispatcher(FileStoreError::NoWorkersRegistered);
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let error = ApiError::Dispatcher(FileStoreError::WorkerTimeout {
            id: "w1".to_string(),
        });
        assert_eq!(
            error.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(ApiError::NotFound.to_string(), "未找到资源");
    }
}
