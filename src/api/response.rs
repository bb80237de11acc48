//! API response types
//!
//! `{"status":"ok","data":...}` or
//! `{"status":"error","code":...,"message":...,"retriable":...}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::ApiError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessResponse {
    pub status: String,
    pub data: Value,
}

impl SuccessResponse {
    pub fn new(data: Value) -> Self {
        Self {
            status: "ok".to_string(),
            data,
        }
    }

    pub fn empty() -> Self {
        Self::new(Value::Null)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub status: String,
    pub code: String,
    pub message: String,
    pub retriable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorResponse {
    pub fn from_error(err: &ApiError) -> Self {
        Self {
            status: "error".to_string(),
            code: err.code().to_string(),
            message: err.message().to_string(),
            retriable: err.is_retriable(),
            hint: err.hint().map(str::to_string),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Response {
    Success(SuccessResponse),
    Error(ErrorResponse),
}

impl Response {
    pub fn success(data: Value) -> Self {
        Response::Success(SuccessResponse::new(data))
    }

    pub fn ok() -> Self {
        Response::Success(SuccessResponse::empty())
    }

    pub fn error(err: &ApiError) -> Self {
        Response::Error(ErrorResponse::from_error(err))
    }

    /// One line of JSON
    pub fn to_json(&self) -> String {
        let encoded = match self {
            Response::Success(r) => serde_json::to_string(r),
            Response::Error(r) => serde_json::to_string(r),
        };
        // Both shapes are plain strings and JSON values
        encoded.unwrap_or_else(|e| {
            format!(
                r#"{{"status":"error","code":"INTERNAL","message":{:?},"retriable":false}}"#,
                e.to_string()
            )
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Response::Success(_))
    }

    /// Payload of a success response
    pub fn data(&self) -> Option<&Value> {
        match self {
            Response::Success(r) => Some(&r.data),
            Response::Error(_) => None,
        }
    }

    /// Code of an error response
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Response::Success(_) => None,
            Response::Error(r) => Some(&r.code),
        }
    }
}
