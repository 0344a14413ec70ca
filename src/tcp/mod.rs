//! TCP 传输层 / TCP transport
//!
//! 帧格式 / Frame layout: 14-byte header (magic, version, type, meta length,
//! body length, CRC32 of body), bincode `FrameMeta`, then the body.

pub mod protocol;
pub mod validate;
pub mod server;
pub mod client;

pub use client::{RemoteError, TcpClient, TcpClientOptions};
pub use protocol::{FieldViolation, Frame, FrameMeta, MsgType, Status, WireMessage};
pub use server::{TcpServer, TcpServerOptions};
