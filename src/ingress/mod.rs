pub mod api;
pub mod server;

pub use api::{ApiError, IngressState, LogRequest, LogResponse};
pub use server::{router, start_server};
