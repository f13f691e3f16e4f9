//! HTTP surface of the avalanche annotation backend.
//!
//! Thin plumbing around the annotation engine: multipart uploads in, PNG
//! base64 JSON out. Route table:
//!
//! | Route | Input | Output |
//! |---|---|---|
//! | POST /spamcheck | image file | `{"spam": bool}` |
//! | POST /checkavalanchetype | image file | `{"avalanche_type": label}` |
//! | POST /upload | image file | `{"image": base64 PNG}` |
//! | POST /add_point | `{x, y, label}` + `?multi_object` | `{"image": ..., "mask": ... or null}` |
//! | POST /undo | (none) | `{"image": base64 PNG}` |
//! | GET /health | (none) | `{"status": "OK"}` |
//!
//! Sessions are selected by the optional `x-session-id` header; clients
//! that never send one share the default session. Failures come back as
//! `{"error": message}` JSON.

pub mod encode;
pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
