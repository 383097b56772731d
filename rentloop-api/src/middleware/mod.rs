/// Middleware modules for the API server
///
/// - `security`: OWASP response headers
///
/// Bearer authentication lives in [`crate::app`] since it needs `AppState`.

pub mod security;
