pub mod config;
mod event_log_routes;
mod http_layers;
pub mod metrics;
pub mod server;
pub(self) mod session;
pub mod state;
mod task_routes;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use session::AdminSession;
pub use state::ServerState;
