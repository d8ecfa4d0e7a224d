use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use log::info;
use warp::Filter;

use super::routes::{health_route, ingest_route};
use crate::error_handling::types::WebError;
use crate::session_management::rotation::RotationEngine;

/// HTTP front-end feeding captured records into the rotation engine.
pub struct WebServer {
    engine: Arc<RotationEngine>,
}

impl WebServer {
    pub fn new(engine: Arc<RotationEngine>) -> Self {
        Self { engine }
    }

    /// Resolves `bind_address`/`port` into a socket address.
    pub fn socket_addr(bind_address: &str, port: u16) -> Result<SocketAddr, WebError> {
        let ip: IpAddr = bind_address
            .trim()
            .parse()
            .map_err(|e| WebError::BindFailed(format!("{}: {}", bind_address, e)))?;
        Ok(SocketAddr::new(ip, port))
    }

    /// Serves until the process is stopped.
    pub async fn start(&self, bind_address: &str, port: u16) -> Result<(), WebError> {
        let addr = Self::socket_addr(bind_address, port)?;
        let routes = health_route().or(ingest_route(self.engine.clone()));
        info!("Ingest server listening on {}", addr);
        warp::serve(routes).run(addr).await;
        Ok(())
    }
}
