pub mod credentials;
pub mod error;
pub mod identity;
pub mod server;
pub mod users;
