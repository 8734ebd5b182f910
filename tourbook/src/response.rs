//! JSON envelopes for successful responses.
//!
//! ```json
//! { "status": "success", "results": 2, "data": { "docs": [..] } }
//! { "status": "success", "data": { "doc": {..} } }
//! ```

use std::collections::BTreeMap;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

const SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
pub struct Docs<T> {
    pub docs: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct Doc<T> {
    pub doc: T,
}

/// `{status, data: {<key>: ..}}` as built by [`Success::keyed`].
pub type Keyed<T> = Success<BTreeMap<&'static str, T>>;

/// Success envelope. `data` carries the payload under a named key.
#[derive(Debug, Serialize)]
pub struct Success<D> {
    #[serde(skip)]
    code: StatusCode,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    pub data: D,
}

impl<D> Success<D> {
    fn new(data: D) -> Self {
        Self {
            code: StatusCode::OK,
            status: SUCCESS,
            results: None,
            token: None,
            data,
        }
    }

    #[must_use]
    pub fn with_status(mut self, code: StatusCode) -> Self {
        self.code = code;
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: String) -> Self {
        self.token = Some(token);
        self
    }
}

impl<T> Success<Docs<T>> {
    /// `{status, results, data: {docs}}`
    pub fn list(docs: Vec<T>) -> Self {
        let mut envelope = Self::new(Docs { docs });
        envelope.results = Some(envelope.data.docs.len());
        envelope
    }
}

impl<T> Success<Doc<T>> {
    /// `{status, data: {doc}}`
    pub fn doc(doc: T) -> Self {
        Self::new(Doc { doc })
    }

    /// `201` with `{status, data: {doc}}`
    pub fn created(doc: T) -> Self {
        Self::doc(doc).with_status(StatusCode::CREATED)
    }
}

impl<T> Success<BTreeMap<&'static str, T>> {
    /// `{status, data: {<key>: value}}`
    pub fn keyed(key: &'static str, value: T) -> Self {
        Self::new(BTreeMap::from([(key, value)]))
    }
}

/// `{status, message?}` for responses without data.
#[derive(Debug, Serialize)]
pub struct Message {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: SUCCESS,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn status_only() -> Self {
        Self {
            status: SUCCESS,
            message: None,
        }
    }
}

impl IntoResponse for Message {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

impl<D: Serialize> IntoResponse for Success<D> {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}
