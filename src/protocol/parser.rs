//! Request Parsing and Response Decoding
//!
//! [`parse_request`] takes one request body (the bytes after the outer
//! `total_len` prefix) and returns the command as a vector of byte
//! strings. The framing itself (waiting for `total_len` bytes to
//! accumulate) is the connection layer's job; by the time the parser
//! runs, the body is complete, so anything short here is a malformed
//! frame, not a retry.
//!
//! [`decode_reply`] is the inverse of the response writer. The server
//! doesn't use it; clients and tests do.

use crate::protocol::types::{tag, Reply, MAX_ARGS};
use bytes::Bytes;
use thiserror::Error;

/// Errors for malformed request bodies and response streams.
///
/// Every variant is connection-fatal: the peer has violated the framing
/// contract and the stream can no longer be trusted.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    /// The declared frame ended before its contents did.
    #[error("truncated frame")]
    Truncated,

    /// The argument count exceeds the 200,000 safety limit.
    #[error("argument count {0} exceeds limit")]
    TooManyArgs(u32),

    /// Bytes remained inside the frame after the last argument.
    #[error("{0} trailing bytes after the last argument")]
    TrailingBytes(usize),

    /// A response value carried an unknown tag byte.
    #[error("unknown response tag {0:#04x}")]
    UnknownTag(u8),
}

/// A cursor over a byte slice with little-endian reads.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn read_u32(&mut self) -> Result<u32, ParseError> {
        if self.remaining() < 4 {
            return Err(ParseError::Truncated);
        }
        let v = u32::from_le_bytes(self.buf[self.pos..self.pos + 4].try_into().unwrap());
        self.pos += 4;
        Ok(v)
    }

    fn read_i64(&mut self) -> Result<i64, ParseError> {
        if self.remaining() < 8 {
            return Err(ParseError::Truncated);
        }
        let v = i64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn read_f64(&mut self) -> Result<f64, ParseError> {
        if self.remaining() < 8 {
            return Err(ParseError::Truncated);
        }
        let v = f64::from_le_bytes(self.buf[self.pos..self.pos + 8].try_into().unwrap());
        self.pos += 8;
        Ok(v)
    }

    fn read_u8(&mut self) -> Result<u8, ParseError> {
        if self.remaining() < 1 {
            return Err(ParseError::Truncated);
        }
        let v = self.buf[self.pos];
        self.pos += 1;
        Ok(v)
    }

    fn read_bytes(&mut self, len: usize) -> Result<Bytes, ParseError> {
        if self.remaining() < len {
            return Err(ParseError::Truncated);
        }
        let out = Bytes::copy_from_slice(&self.buf[self.pos..self.pos + len]);
        self.pos += len;
        Ok(out)
    }
}

/// Parses one request body into a command vector.
///
/// The body must contain exactly `nstr` length-prefixed strings and
/// nothing else.
pub fn parse_request(body: &[u8]) -> Result<Vec<Bytes>, ParseError> {
    let mut cur = Cursor::new(body);
    let nstr = cur.read_u32()?;
    if nstr as usize > MAX_ARGS {
        return Err(ParseError::TooManyArgs(nstr));
    }
    let mut cmd = Vec::with_capacity(nstr.min(16) as usize);
    for _ in 0..nstr {
        let len = cur.read_u32()? as usize;
        cmd.push(cur.read_bytes(len)?);
    }
    if cur.remaining() != 0 {
        return Err(ParseError::TrailingBytes(cur.remaining()));
    }
    Ok(cmd)
}

/// Decodes one tagged response value from `buf`, returning the value and
/// the number of bytes it occupied.
pub fn decode_reply(buf: &[u8]) -> Result<(Reply, usize), ParseError> {
    let mut cur = Cursor::new(buf);
    let reply = decode_value(&mut cur)?;
    Ok((reply, cur.pos))
}

fn decode_value(cur: &mut Cursor<'_>) -> Result<Reply, ParseError> {
    match cur.read_u8()? {
        tag::NIL => Ok(Reply::Nil),
        tag::ERR => {
            let code = cur.read_u32()?;
            let len = cur.read_u32()? as usize;
            let message = cur.read_bytes(len)?;
            Ok(Reply::Err { code, message })
        }
        tag::STR => {
            let len = cur.read_u32()? as usize;
            Ok(Reply::Str(cur.read_bytes(len)?))
        }
        tag::INT => Ok(Reply::Int(cur.read_i64()?)),
        tag::DBL => Ok(Reply::Dbl(cur.read_f64()?)),
        tag::ARR => {
            let n = cur.read_u32()?;
            let mut items = Vec::with_capacity(n.min(1024) as usize);
            for _ in 0..n {
                items.push(decode_value(cur)?);
            }
            Ok(Reply::Arr(items))
        }
        other => Err(ParseError::UnknownTag(other)),
    }
}
