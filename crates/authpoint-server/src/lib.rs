pub mod config;
pub mod handlers;
pub mod observability;
pub mod server;
pub mod storage;

pub use config::AppConfig;
pub use server::{AuthpointServer, ServerBuilder, build_app, build_router, build_state};
