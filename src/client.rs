//! Blocking client for the framed protocol.
//!
//! Requests may be pipelined: send any number of frames, then read one reply
//! per request, in order. A reply header announcing more than
//! [`MAX_PAYLOAD`] bytes aborts the exchange, and a close in the middle of a
//! frame surfaces as [`io::ErrorKind::UnexpectedEof`].

use crate::codec::{self, FrameError, HEADER_LEN, MAX_PAYLOAD};
use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;

/// Client-side failures.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    /// Request too large to send, or reply announced an oversized payload.
    #[error(transparent)]
    Frame(#[from] FrameError),
    /// Server closed the connection cleanly before a reply started.
    #[error("connection closed by server")]
    Closed,
}

/// Write one request frame.
pub fn send_request<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), ClientError> {
    let frame = codec::encode_to_vec(payload)?;
    writer.write_all(&frame)?;
    Ok(())
}

/// Read one reply frame and return its payload.
pub fn read_response<R: Read>(reader: &mut R) -> Result<Vec<u8>, ClientError> {
    let mut header = [0u8; HEADER_LEN];
    match read_full(reader, &mut header)? {
        0 => return Err(ClientError::Closed),
        n if n < HEADER_LEN => return Err(unexpected_eof("reply header").into()),
        _ => {}
    }

    let len = codec::read_len(&header);
    if len > MAX_PAYLOAD {
        return Err(FrameError::Oversized { len }.into());
    }

    let mut payload = vec![0u8; len];
    if read_full(reader, &mut payload)? < len {
        return Err(unexpected_eof("reply payload").into());
    }
    Ok(payload)
}

/// Fill `buf`, stopping early only at EOF. Returns bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn unexpected_eof(what: &str) -> io::Error {
    io::Error::new(
        io::ErrorKind::UnexpectedEof,
        format!("connection closed while reading {what}"),
    )
}

/// A connected client.
pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self, ClientError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Bound how long a reply may take to arrive.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    pub fn send(&mut self, payload: &[u8]) -> Result<(), ClientError> {
        send_request(&mut self.stream, payload)
    }

    pub fn recv(&mut self) -> Result<Vec<u8>, ClientError> {
        read_response(&mut self.stream)
    }

    /// Send one request and wait for its reply.
    pub fn request(&mut self, payload: &[u8]) -> Result<Vec<u8>, ClientError> {
        self.send(payload)?;
        self.recv()
    }

    /// Pipeline all requests, then collect the replies in order.
    pub fn pipeline<I, P>(&mut self, payloads: I) -> Result<Vec<Vec<u8>>, ClientError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let mut sent = 0;
        for payload in payloads {
            self.send(payload.as_ref())?;
            sent += 1;
        }
        (0..sent).map(|_| self.recv()).collect()
    }

    /// Raw socket, for sending bytes outside the protocol.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_send_request_frames_payload() {
        let mut out = Vec::new();
        send_request(&mut out, b"hello1").unwrap();
        assert_eq!(out, codec::encode_to_vec(b"hello1").unwrap());
    }

    #[test]
    fn test_send_request_rejects_oversized() {
        let mut out = Vec::new();
        let payload = vec![0u8; MAX_PAYLOAD + 1];
        assert!(matches!(
            send_request(&mut out, &payload),
            Err(ClientError::Frame(_))
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_read_pipelined_responses() {
        let mut wire = codec::encode_to_vec(b"one").unwrap();
        wire.extend(codec::encode_to_vec(b"").unwrap());
        let mut reader = Cursor::new(wire);

        assert_eq!(read_response(&mut reader).unwrap(), b"one");
        assert!(read_response(&mut reader).unwrap().is_empty());
        assert!(matches!(
            read_response(&mut reader),
            Err(ClientError::Closed)
        ));
    }

    #[test]
    fn test_read_oversized_reply_aborts() {
        let wire = ((MAX_PAYLOAD + 1) as u32).to_le_bytes().to_vec();
        assert!(matches!(
            read_response(&mut Cursor::new(wire)),
            Err(ClientError::Frame(FrameError::Oversized { .. }))
        ));
    }

    #[test]
    fn test_partial_header_is_io_error() {
        let mut reader = Cursor::new(vec![5u8, 0]);
        match read_response(&mut reader) {
            Err(ClientError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_truncated_payload_is_io_error() {
        let mut wire = codec::encode_to_vec(b"truncated").unwrap();
        wire.truncate(7);
        match read_response(&mut Cursor::new(wire)) {
            Err(ClientError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected: {:?}", other),
        }
    }
}
