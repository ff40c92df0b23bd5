//! Request construction.
//!
//! A [`Request`] is the fully shaped message a [`Transport`](crate::Transport)
//! puts on the wire. Building one applies the emulation rules of a
//! [`SyncConfig`]:
//!
//! - `emulate_json`: the body becomes form-urlencoded with the JSON document
//!   under a single `model` field.
//! - `emulate_http`: PUT, PATCH and DELETE are sent as POST with the real
//!   method in `X-HTTP-Method-Override`, and also in a `_method` form field
//!   when the body is form-encoded.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use crate::method::{HttpMethod, SyncMethod};
use serde_json::Value;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// Request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    /// A JSON document.
    Json(String),
    /// Form fields, in order.
    Form(Vec<(String, String)>),
}

impl Body {
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => CONTENT_TYPE_JSON,
            Self::Form(_) => CONTENT_TYPE_FORM,
        }
    }

    /// The body as it goes on the wire.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Json(json) => json.clone(),
            Self::Form(fields) => fields
                .iter()
                .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                .collect::<Vec<_>>()
                .join("&"),
        }
    }

    /// Looks up a form field.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&str> {
        match self {
            Self::Json(_) => None,
            Self::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.as_str()),
        }
    }
}

/// A shaped transport request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The verb the caller asked for.
    pub method: SyncMethod,
    /// The HTTP method actually sent.
    pub http_method: HttpMethod,
    pub url: String,
    pub body: Option<Body>,
    pub headers: Vec<(String, String)>,
}

impl Request {
    /// Shapes a request for `method` against `url`.
    ///
    /// `payload` is serialized only for verbs that carry a body.
    pub fn build(
        method: SyncMethod,
        url: impl Into<String>,
        payload: Option<&Value>,
        config: &SyncConfig,
    ) -> SyncResult<Self> {
        let real = method.http_method();
        let json = match payload {
            Some(value) if method.has_body() => Some(serde_json::to_string(value)?),
            _ => None,
        };

        let mut body = if config.emulate_json {
            let mut fields = Vec::new();
            if let Some(json) = json {
                fields.push(("model".to_owned(), json));
            }
            Some(Body::Form(fields))
        } else {
            json.map(Body::Json)
        };

        let mut headers = Vec::new();
        let mut http_method = real;
        if config.emulate_http && real.needs_override() {
            http_method = HttpMethod::Post;
            if let Some(Body::Form(fields)) = &mut body {
                fields.push(("_method".to_owned(), real.as_str().to_owned()));
            }
            headers.push((METHOD_OVERRIDE_HEADER.to_owned(), real.as_str().to_owned()));
        }
        if let Some(body) = &body {
            headers.push(("Content-Type".to_owned(), body.content_type().to_owned()));
        }

        Ok(Self {
            method,
            http_method,
            url: url.into(),
            body,
            headers,
        })
    }

    /// Case-insensitive header lookup.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn content_type(&self) -> Option<&'static str> {
        self.body.as_ref().map(Body::content_type)
    }

    /// The JSON document carried by the body, whichever encoding it uses.
    pub fn json(&self) -> SyncResult<Option<Value>> {
        let raw = match &self.body {
            Some(Body::Json(json)) => Some(json.as_str()),
            Some(form @ Body::Form(_)) => form.field("model"),
            None => None,
        };
        raw.map(serde_json::from_str).transpose().map_err(Into::into)
    }
}
