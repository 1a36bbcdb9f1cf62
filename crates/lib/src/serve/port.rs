//! Free port discovery.

use std::io::ErrorKind;

use tokio::net::TcpListener;
use tracing::debug;

use super::{BoundPort, ServeError};

/// Bind the first free port at or above `start` on `host`.
///
/// The listener itself is returned so nothing can take the port between
/// finding it and serving on it.
pub async fn bind_free_port(host: &str, start: u16) -> Result<BoundPort, ServeError> {
  for port in start..=u16::MAX {
    match TcpListener::bind((host, port)).await {
      Ok(listener) => {
        debug!(host, port, "bound port");
        return BoundPort::new(listener, host, port);
      }
      Err(e) if matches!(e.kind(), ErrorKind::AddrInUse | ErrorKind::PermissionDenied) => {
        debug!(host, port, "port unavailable, trying next");
      }
      Err(source) => {
        return Err(ServeError::Bind {
          host: host.to_string(),
          port,
          source,
        });
      }
    }
  }

  Err(ServeError::PortUnavailable {
    host: host.to_string(),
    start,
  })
}
