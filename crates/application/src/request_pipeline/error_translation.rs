use http::StatusCode;
use serde_json::Value;
use tramite_core::AppError;

/// Maps an unsuccessful response status to an application error.
///
/// A `message` field in the JSON body replaces the default text for the
/// categories where the server explains itself.
#[must_use]
pub fn translate_status(status: StatusCode, body: Option<&Value>) -> AppError {
    let server_message = body
        .and_then(|body| body.get("message"))
        .and_then(Value::as_str)
        .filter(|message| !message.trim().is_empty())
        .map(str::to_owned);

    match status {
        StatusCode::BAD_REQUEST => {
            AppError::BadRequest(server_message.unwrap_or_else(|| "Bad request".to_owned()))
        }
        StatusCode::UNAUTHORIZED => {
            AppError::Unauthorized("Unauthorized. Please login again.".to_owned())
        }
        StatusCode::FORBIDDEN => AppError::Forbidden("Access forbidden".to_owned()),
        StatusCode::NOT_FOUND => {
            AppError::NotFound(server_message.unwrap_or_else(|| "Resource not found".to_owned()))
        }
        StatusCode::UNPROCESSABLE_ENTITY => {
            AppError::Validation(server_message.unwrap_or_else(|| "Validation error".to_owned()))
        }
        StatusCode::INTERNAL_SERVER_ERROR => AppError::ServerError {
            status: status.as_u16(),
            message: "Internal server error".to_owned(),
        },
        StatusCode::SERVICE_UNAVAILABLE => AppError::ServerError {
            status: status.as_u16(),
            message: "Service unavailable".to_owned(),
        },
        other => AppError::Http {
            status: other.as_u16(),
            message: server_message.unwrap_or_else(|| format!("Error: {}", other.as_u16())),
        },
    }
}
