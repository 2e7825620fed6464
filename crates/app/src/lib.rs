pub mod config;
pub mod server;

pub use config::{BackendArgs, Cli, Command, ServeArgs};
pub use server::{app_router, run_server, ApiError, AppState, ServerConfig};
