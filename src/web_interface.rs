// Web Interface module root
pub mod routes;
pub mod types;
pub mod web_server;

pub use routes::{health_route, ingest_route};
pub use web_server::WebServer;
