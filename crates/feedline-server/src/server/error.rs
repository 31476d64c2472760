use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use feedline::{Error, StoreError};
use serde::Serialize;

/// Everything a handler can fail with, rendered as
/// `{ "error": { "code": ..., "message": ... } }`.
#[derive(Debug)]
pub enum ApiError {
    Feed(Error),
    /// A write endpoint was called without an `x-user-id` header.
    Unauthenticated,
    /// The path, query string or JSON body did not parse.
    Rejected { status: StatusCode, message: String },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl ApiError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::Feed(Error::InvalidRequest {
            reason: reason.into(),
        })
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            Self::Rejected { status, .. } => (*status, "invalid_request"),
            Self::Feed(err) => match err {
                Error::InvalidCursor(_) => (StatusCode::BAD_REQUEST, "invalid_cursor"),
                Error::AmbiguousPaginationMode => {
                    (StatusCode::BAD_REQUEST, "ambiguous_pagination_mode")
                }
                Error::InvalidRequest { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
                Error::MetadataHydration { .. } => {
                    (StatusCode::SERVICE_UNAVAILABLE, "metadata_hydration_failure")
                }
                Error::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "not_found"),
                Error::Store(StoreError::Constraint(_)) => (StatusCode::CONFLICT, "conflict"),
                Error::Store(source) if source.is_transient() => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable")
                }
                Error::Store(_) | Error::InvalidConfig { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "internal")
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), code, error = ?self, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), code, error = ?self, "Request rejected");
        }

        let message = match self {
            Self::Feed(err) => err.to_string(),
            Self::Unauthenticated => "the x-user-id header is required".to_string(),
            Self::Rejected { message, .. } => message,
        };
        let body = ErrorBody {
            error: ErrorDetail { code, message },
        };
        (status, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self::Feed(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self::Feed(Error::Store(err))
    }
}

macro_rules! impl_from_rejection {
    ($($rejection:ty),* $(,)?) => {
        $(
            impl From<$rejection> for ApiError {
                fn from(rejection: $rejection) -> Self {
                    Self::Rejected {
                        status: rejection.status(),
                        message: rejection.body_text(),
                    }
                }
            }
        )*
    };
}

impl_from_rejection!(JsonRejection, PathRejection, QueryRejection);

#[cfg(test)]
mod tests {
    use super::*;
    use feedline::CursorError;

    #[test]
    fn taxonomy_maps_to_status_codes() {
        let cases: [(ApiError, u16); 8] = [
            (Error::InvalidCursor(CursorError::Empty).into(), 400),
            (Error::AmbiguousPaginationMode.into(), 400),
            (ApiError::invalid("nope"), 400),
            (ApiError::Unauthenticated, 401),
            (StoreError::NotFound("post 9".into()).into(), 404),
            (StoreError::Constraint("self".into()).into(), 409),
            (
                Error::MetadataHydration {
                    source: StoreError::Timeout,
                }
                .into(),
                503,
            ),
            (StoreError::Unavailable("pool".into()).into(), 503),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status().as_u16(), expected);
        }
    }
}
