//! Transport boundary for spine.
//!
//! Maps persistence verbs to HTTP methods, shapes requests (including the
//! legacy emulation modes for limited servers), and defines the
//! callback-based [`Transport`] contract records and sets use.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use spine_sync::{HttpMethod, Request, SyncConfig, SyncMethod};
//!
//! let config = SyncConfig { emulate_http: true, ..Default::default() };
//! let request = Request::build(SyncMethod::Update, "/books/7", Some(&json!({"id": 7})), &config)?;
//!
//! assert_eq!(request.http_method, HttpMethod::Post);
//! assert_eq!(request.header("x-http-method-override"), Some("PUT"));
//! # Ok::<(), spine_sync::SyncError>(())
//! ```

mod config;
mod error;
mod method;
mod request;
pub mod transport;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use method::{HttpMethod, SyncMethod};
pub use request::{
    Body, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON, METHOD_OVERRIDE_HEADER, Request,
};
pub use transport::{Completion, RequestHandle, Transport};
