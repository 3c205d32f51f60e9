//! Echo request handler.

use crate::protocols::{HandlerError, RequestHandler};
use mio::Token;
use tracing::debug;

/// Echoes every request back to the sender.
#[derive(Debug, Default, Clone, Copy)]
pub struct Echo;

impl RequestHandler for Echo {
    fn handle(&mut self, conn: Token, request: &[u8]) -> Result<Vec<u8>, HandlerError> {
        debug!(
            conn_id = conn.0,
            len = request.len(),
            payload = %String::from_utf8_lossy(request),
            "Echoing request"
        );
        Ok(request.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_returns_payload() {
        let mut echo = Echo;
        assert_eq!(echo.handle(Token(3), b"hello1").unwrap(), b"hello1");
        assert!(echo.handle(Token(3), b"").unwrap().is_empty());
    }
}
