pub mod runtime_env;

pub mod auth;
pub mod bootstrap;
pub mod config;
mod context;
pub mod error;
mod handlers;
pub mod logging;
pub mod routes;
pub mod store;
pub mod user;

pub use context::{AppContext, Clock, SystemClock};
pub use handlers::handle_request;
