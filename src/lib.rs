//! Sendfile proxy library.
//!
//! Intercepts responses carrying an `X-Sendfile` header and streams the
//! named file to the client in bounded chunks instead of the captured body.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod pool;
pub mod sendfile;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
