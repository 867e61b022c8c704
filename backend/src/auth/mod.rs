pub mod password;
pub mod service;
pub mod token;

pub use password::PasswordHasher;
pub use service::{AccessToken, AuthService};
pub use token::{TokenError, TokenService};
