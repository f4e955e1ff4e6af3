//! View models handed to the page renderer.
//!
//! A page is a view name, the flash messages to show, and a data context
//! flattened next to them, serialized as JSON.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum FlashLevel {
    #[serde(rename = "alert-success")]
    Success,
    #[serde(rename = "alert-danger")]
    Danger,
}

#[derive(Debug, Clone, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct Page<T: Serialize> {
    pub view: &'static str,
    pub flashes: Vec<Flash>,
    #[serde(flatten)]
    pub data: T,
    #[serde(skip)]
    pub status: StatusCode,
}

impl<T: Serialize> Page<T> {
    pub fn new(view: &'static str, data: T) -> Self {
        Self {
            view,
            flashes: Vec::new(),
            data,
            status: StatusCode::OK,
        }
    }

    pub fn flash(mut self, level: FlashLevel, message: impl Into<String>) -> Self {
        self.flashes.push(Flash {
            level,
            message: message.into(),
        });
        self
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl<T: Serialize> IntoResponse for Page<T> {
    fn into_response(self) -> Response {
        let status = self.status;
        (status, Json(self)).into_response()
    }
}
