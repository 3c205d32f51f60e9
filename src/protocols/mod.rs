//! Request handlers.
//!
//! The runtime hands every decoded request payload to a [`RequestHandler`]
//! and frames whatever it returns as the reply. Payload interpretation is
//! entirely the handler's business.
//!
//! ## Handlers
//! - `echo`: replies with the request payload verbatim

pub mod echo;

pub use echo::Echo;

use mio::Token;
use thiserror::Error;

/// Error returned by a handler that cannot produce a reply.
///
/// The runtime closes the connection the request arrived on.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The handler refused the request.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// Produces one reply payload per request payload.
///
/// Called synchronously on the event-loop thread, so implementations must
/// not block. Request and reply payloads are both bounded by
/// [`MAX_PAYLOAD`](crate::codec::MAX_PAYLOAD); an oversized reply closes the
/// connection.
pub trait RequestHandler {
    /// Handle one request received on connection `conn`.
    fn handle(&mut self, conn: Token, request: &[u8]) -> Result<Vec<u8>, HandlerError>;
}

impl<F> RequestHandler for F
where
    F: FnMut(Token, &[u8]) -> Result<Vec<u8>, HandlerError>,
{
    fn handle(&mut self, conn: Token, request: &[u8]) -> Result<Vec<u8>, HandlerError> {
        self(conn, request)
    }
}
