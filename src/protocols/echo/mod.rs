//! Echo protocol.
//!
//! Replies with the request payload unchanged. Useful for exercising the
//! runtime's framing and partial read/write handling without any
//! application logic in the way:
//!
//! ```text
//! Request:  06 00 00 00 "hello1"
//! Response: 06 00 00 00 "hello1"
//! ```

pub mod handler;

pub use handler::Echo;
