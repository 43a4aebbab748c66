//! Streaming Response Emission
//!
//! Command handlers write their replies directly into the connection's
//! outgoing ring buffer. Because a response's total length is not known
//! until the handler finishes, the writer reserves the four header bytes
//! up front and patches them in place afterwards; arrays use the same
//! trick for their element count when it cannot be known ahead of the
//! iteration (`zquery`'s limit cuts off mid-walk).
//!
//! [`end_response`] also enforces the 32 MiB response cap: an oversized
//! body is rolled back to the header position and replaced with a single
//! `ERR(TOO_BIG)` record, so the client always receives exactly one
//! well-formed response per request.

use crate::buffer::RingBuf;
use crate::protocol::types::{errcode, tag, MAX_MSG};

/// Appends a NIL value.
pub fn write_nil(out: &mut RingBuf) {
    out.append_u8(tag::NIL);
}

/// Appends a string value.
pub fn write_str(out: &mut RingBuf, data: &[u8]) {
    out.append_u8(tag::STR);
    out.append_u32(data.len() as u32);
    out.append(data);
}

/// Appends an integer value.
pub fn write_int(out: &mut RingBuf, v: i64) {
    out.append_u8(tag::INT);
    out.append_i64(v);
}

/// Appends a double value.
pub fn write_dbl(out: &mut RingBuf, v: f64) {
    out.append_u8(tag::DBL);
    out.append_dbl(v);
}

/// Appends an error value.
pub fn write_err(out: &mut RingBuf, code: u32, message: &str) {
    out.append_u8(tag::ERR);
    out.append_u32(code);
    out.append_u32(message.len() as u32);
    out.append(message.as_bytes());
}

/// Appends an array header for `n` elements that follow.
pub fn write_arr(out: &mut RingBuf, n: u32) {
    out.append_u8(tag::ARR);
    out.append_u32(n);
}

/// Appends an array header with a placeholder count, returning the count's
/// position for [`end_arr`].
pub fn begin_arr(out: &mut RingBuf) -> usize {
    out.append_u8(tag::ARR);
    out.append_u32(0);
    out.len() - 4
}

/// Patches the element count of an array started with [`begin_arr`].
pub fn end_arr(out: &mut RingBuf, ctx: usize, n: u32) {
    out.insert(ctx, &n.to_le_bytes());
}

/// Reserves the four-byte response length header, returning its position
/// for [`end_response`].
pub fn begin_response(out: &mut RingBuf) -> usize {
    let header = out.len();
    out.append_u32(0);
    header
}

/// Body length of the response whose header sits at `header`.
fn response_size(out: &RingBuf, header: usize) -> usize {
    out.len() - header - 4
}

/// Finalizes a response: enforces the size cap, then patches the length
/// header in place.
pub fn end_response(out: &mut RingBuf, header: usize) {
    let mut size = response_size(out, header);
    if size > MAX_MSG {
        out.truncate(header + 4);
        write_err(out, errcode::TOO_BIG, "response is too big.");
        size = response_size(out, header);
    }
    out.insert(header, &(size as u32).to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{decode_reply, Reply};

    fn bytes_of(buf: &RingBuf) -> Vec<u8> {
        let mut out = vec![0u8; buf.len()];
        buf.peek(0, &mut out);
        out
    }

    #[test]
    fn test_framed_nil() {
        let mut out = RingBuf::new();
        let header = begin_response(&mut out);
        write_nil(&mut out);
        end_response(&mut out, header);
        assert_eq!(bytes_of(&out), [0x01, 0, 0, 0, 0x00]);
    }

    #[test]
    fn test_framed_str() {
        let mut out = RingBuf::new();
        let header = begin_response(&mut out);
        write_str(&mut out, b"v");
        end_response(&mut out, header);
        assert_eq!(bytes_of(&out), [0x06, 0, 0, 0, 0x02, 0x01, 0, 0, 0, b'v']);
    }

    #[test]
    fn test_patched_array_count() {
        let mut out = RingBuf::new();
        let header = begin_response(&mut out);
        let ctx = begin_arr(&mut out);
        write_str(&mut out, b"a");
        write_dbl(&mut out, 2.0);
        end_arr(&mut out, ctx, 2);
        end_response(&mut out, header);

        let bytes = bytes_of(&out);
        let len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        assert_eq!(len, bytes.len() - 4);
        let (reply, _) = decode_reply(&bytes[4..]).unwrap();
        assert_eq!(reply, Reply::Arr(vec![Reply::str("a"), Reply::Dbl(2.0)]));
    }

    #[test]
    fn test_consecutive_responses() {
        // pipelined responses share one buffer; headers must not collide
        let mut out = RingBuf::new();
        for payload in [&b"one"[..], &b"two"[..]] {
            let header = begin_response(&mut out);
            write_str(&mut out, payload);
            end_response(&mut out, header);
        }
        let bytes = bytes_of(&out);
        let first_len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        let (first, _) = decode_reply(&bytes[4..4 + first_len]).unwrap();
        let (second, _) = decode_reply(&bytes[4 + first_len + 4..]).unwrap();
        assert_eq!(first, Reply::str("one"));
        assert_eq!(second, Reply::str("two"));
    }

    #[test]
    fn test_oversized_response_replaced() {
        let mut out = RingBuf::new();
        let header = begin_response(&mut out);
        // a single string payload already over the cap
        let huge = vec![b'x'; MAX_MSG + 1];
        write_str(&mut out, &huge);
        end_response(&mut out, header);

        let bytes = bytes_of(&out);
        let len = u32::from_le_bytes(bytes[..4].try_into().unwrap()) as usize;
        assert_eq!(len, bytes.len() - 4);
        assert!(len <= MAX_MSG);
        let (reply, consumed) = decode_reply(&bytes[4..]).unwrap();
        assert_eq!(consumed, len);
        assert_eq!(reply, Reply::err(errcode::TOO_BIG, "response is too big."));
    }
}
