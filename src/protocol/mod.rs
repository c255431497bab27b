//! RESP2 (REdis Serialization Protocol) implementation
//!
//! Only RESP2 is implemented; every client this core talks to negotiates
//! RESP2 by default and there's no HELLO-based protocol upgrade here.

pub mod parser;
pub mod resp;
pub mod serializer;

pub use parser::{parse_resp_frame, RespParser};
pub use resp::RespFrame;
pub use serializer::{serialize_resp_frame, serialize_to_vec, RespSerializer};
