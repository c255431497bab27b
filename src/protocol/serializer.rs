//! RESP2 serializer implementation

use super::resp::RespFrame;
use crate::error::Result;
use std::io::Write;

/// Serialize a RESP frame to a writer
pub fn serialize_resp_frame<W: Write>(frame: &RespFrame, writer: &mut W) -> Result<()> {
    match frame {
        RespFrame::SimpleString(bytes) => {
            writer.write_all(b"+")?;
            writer.write_all(bytes)?;
            writer.write_all(b"\r\n")?;
        }

        RespFrame::Error(bytes) => {
            writer.write_all(b"-")?;
            writer.write_all(bytes)?;
            writer.write_all(b"\r\n")?;
        }

        RespFrame::Integer(n) => {
            writer.write_all(b":")?;
            writer.write_all(n.to_string().as_bytes())?;
            writer.write_all(b"\r\n")?;
        }

        RespFrame::BulkString(opt) => match opt {
            Some(bytes) => {
                writer.write_all(b"$")?;
                writer.write_all(bytes.len().to_string().as_bytes())?;
                writer.write_all(b"\r\n")?;
                writer.write_all(bytes)?;
                writer.write_all(b"\r\n")?;
            }
            None => {
                writer.write_all(b"$-1\r\n")?;
            }
        },

        RespFrame::Array(opt) => match opt {
            Some(frames) => {
                writer.write_all(b"*")?;
                writer.write_all(frames.len().to_string().as_bytes())?;
                writer.write_all(b"\r\n")?;
                for frame in frames {
                    serialize_resp_frame(frame, writer)?;
                }
            }
            None => {
                writer.write_all(b"*-1\r\n")?;
            }
        },
    }

    Ok(())
}

/// Serialize a RESP frame to a byte vector
pub fn serialize_to_vec(frame: &RespFrame) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    serialize_resp_frame(frame, &mut buf)?;
    Ok(buf)
}

/// Accumulating serializer for multiple frames sharing one write syscall
pub struct RespSerializer {
    buffer: Vec<u8>,
}

impl RespSerializer {
    pub fn new() -> Self {
        RespSerializer {
            buffer: Vec::with_capacity(4096),
        }
    }

    pub fn add(&mut self, frame: &RespFrame) -> Result<()> {
        serialize_resp_frame(frame, &mut self.buffer)
    }

    pub fn take(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.buffer, Vec::with_capacity(4096))
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for RespSerializer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialize_simple_string() {
        let frame = RespFrame::ok();
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b"+OK\r\n");
    }

    #[test]
    fn test_serialize_error() {
        let frame = RespFrame::error("ERR test");
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b"-ERR test\r\n");
    }

    #[test]
    fn test_serialize_integer() {
        let frame = RespFrame::Integer(42);
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b":42\r\n");

        let frame = RespFrame::Integer(-100);
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b":-100\r\n");
    }

    #[test]
    fn test_serialize_bulk_string() {
        let frame = RespFrame::from_string("hello");
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b"$5\r\nhello\r\n");

        let frame = RespFrame::null_bulk();
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b"$-1\r\n");
    }

    #[test]
    fn test_serialize_array() {
        let frame = RespFrame::Array(Some(vec![
            RespFrame::from_string("foo"),
            RespFrame::from_string("bar"),
        ]));
        let result = serialize_to_vec(&frame).unwrap();
        assert_eq!(result, b"*2\r\n$3\r\nfoo\r\n$3\r\nbar\r\n");
    }

    #[test]
    fn test_resp_serializer() {
        let mut serializer = RespSerializer::new();
        serializer.add(&RespFrame::ok()).unwrap();
        serializer.add(&RespFrame::Integer(42)).unwrap();

        let buffer = serializer.take();
        assert_eq!(buffer, b"+OK\r\n:42\r\n");
    }
}
