pub mod auth;
pub mod logging;
pub mod response;

pub use auth::{auth_middleware, CurrentUser};
pub use logging::log_requests;
pub use response::wrap_response_middleware;
