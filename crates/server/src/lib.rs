pub mod admission;
pub mod app;
pub mod config;
pub mod handler;
pub mod response;

pub use admission::{client_identity, AdmissionLayer, AdmissionService};
pub use app::{build_router, serve, serve_listener};
pub use response::Message;
