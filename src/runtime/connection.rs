//! Connection state machine for managing TCP connections.
//!
//! Each connection cycles between reading requests and writing replies:
//!
//! ```text
//! AwaitingRequest --(request(s) decoded)--> SendingResponse
//!        ^                                        |
//!        +-----------(replies flushed)------------+
//!
//! any state --(EOF, I/O error, bad frame, handler error)--> Closing
//! ```
//!
//! A step performs as much non-blocking I/O as the socket allows and stops
//! at the first `WouldBlock`, handing control back to the event loop.

use crate::codec::{self, MAX_FRAME};
use crate::protocols::RequestHandler;
use crate::runtime::buffer::{ReadBuffer, WriteBuffer};
use crate::runtime::error::ConnError;
use mio::{Interest, Token};
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

/// Current state of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    /// Reading request bytes. Write buffer is empty.
    AwaitingRequest,
    /// Flushing staged replies. No reads happen in this state.
    SendingResponse,
    /// Terminal; the connection must be removed from the table.
    Closing,
}

/// Readiness a connection in `state` needs to make progress.
///
/// Error and hang-up conditions are always reported by the poller, so they
/// are not part of the interest.
pub fn interest_for(state: ConnState) -> Option<Interest> {
    match state {
        ConnState::AwaitingRequest => Some(Interest::READABLE),
        ConnState::SendingResponse => Some(Interest::WRITABLE),
        ConnState::Closing => None,
    }
}

/// A single client connection.
#[derive(Debug)]
pub struct Connection<S> {
    token: Token,
    stream: S,
    state: ConnState,
    read_buf: ReadBuffer,
    write_buf: WriteBuffer,
    last_activity: Instant,
    close_reason: Option<ConnError>,
}

impl<S> Connection<S> {
    /// Create a new connection in the initial reading state.
    pub fn new(token: Token, stream: S) -> Self {
        Self {
            token,
            stream,
            state: ConnState::AwaitingRequest,
            read_buf: ReadBuffer::new(MAX_FRAME),
            write_buf: WriteBuffer::with_capacity(MAX_FRAME),
            last_activity: Instant::now(),
            close_reason: None,
        }
    }

    /// Handle this connection is registered under.
    pub fn token(&self) -> Token {
        self.token
    }

    /// Current state.
    pub fn state(&self) -> ConnState {
        self.state
    }

    /// Check if the connection is waiting to be removed.
    pub fn is_closing(&self) -> bool {
        self.state == ConnState::Closing
    }

    /// Readiness to register for in the current state.
    pub fn interest(&self) -> Option<Interest> {
        interest_for(self.state)
    }

    /// Underlying socket.
    pub fn stream(&self) -> &S {
        &self.stream
    }

    /// Underlying socket, mutably.
    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    /// Reason recorded when the connection entered `Closing`.
    pub fn close_reason(&self) -> Option<&ConnError> {
        self.close_reason.as_ref()
    }

    /// Unconsumed request bytes.
    pub fn buffered(&self) -> usize {
        self.read_buf.len()
    }

    /// Staged reply bytes, and how many of them were already sent.
    pub fn write_progress(&self) -> (usize, usize) {
        (self.write_buf.filled(), self.write_buf.sent())
    }

    /// Time since the last successful read or write.
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity)
    }

    /// Mark the connection for closing. The first reason wins.
    pub fn close(&mut self, reason: ConnError) {
        if self.state != ConnState::Closing {
            self.state = ConnState::Closing;
            self.close_reason = Some(reason);
        }
    }
}

impl<S: Read + Write> Connection<S> {
    /// Run the state machine until the socket would block or the
    /// connection starts closing.
    pub fn on_ready<H: RequestHandler>(&mut self, handler: &mut H) {
        loop {
            let progressed = match self.state {
                ConnState::AwaitingRequest => self.try_fill_buffer(handler),
                ConnState::SendingResponse => self.try_flush_buffer(),
                ConnState::Closing => false,
            };
            if !progressed {
                break;
            }
        }
    }

    /// One read attempt. Returns `true` if the state machine should keep going.
    fn try_fill_buffer<H: RequestHandler>(&mut self, handler: &mut H) -> bool {
        debug_assert!(self.write_buf.is_empty());
        debug_assert!(self.read_buf.remaining() > 0, "read buffer full after drain");

        let n = loop {
            match self.stream.read(self.read_buf.spare_mut()) {
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) => {
                    self.close(ConnError::Io(e));
                    return false;
                }
            }
        };

        if n == 0 {
            let reason = if self.read_buf.is_empty() {
                ConnError::PeerClosed
            } else {
                ConnError::UnexpectedClose {
                    buffered: self.read_buf.len(),
                }
            };
            self.close(reason);
            return false;
        }

        self.read_buf.commit(n);
        self.last_activity = Instant::now();

        if let Err(e) = self.drain_requests(handler) {
            self.close(e);
            return false;
        }

        if !self.write_buf.is_empty() {
            self.state = ConnState::SendingResponse;
        }
        true
    }

    /// Handle every complete request in the read buffer, queueing replies
    /// in arrival order. A trailing partial frame stays buffered.
    fn drain_requests<H: RequestHandler>(&mut self, handler: &mut H) -> Result<(), ConnError> {
        while let Some(frame) = codec::try_decode_one(self.read_buf.data())? {
            let consumed = frame.consumed;
            let reply = handler.handle(self.token, frame.payload)?;
            codec::encode(&reply, self.write_buf.staging())?;
            self.read_buf.consume(consumed);
        }
        Ok(())
    }

    /// One write attempt. Returns `true` if the state machine should keep going.
    fn try_flush_buffer(&mut self) -> bool {
        let n = loop {
            match self.stream.write(self.write_buf.unsent()) {
                Ok(0) => {
                    self.close(ConnError::Io(io::ErrorKind::WriteZero.into()));
                    return false;
                }
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return false,
                Err(e) => {
                    self.close(ConnError::Io(e));
                    return false;
                }
            }
        };

        self.write_buf.advance(n);
        self.last_activity = Instant::now();

        if self.write_buf.is_empty() {
            self.state = ConnState::AwaitingRequest;
        }
        true
    }
}
