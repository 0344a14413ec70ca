use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::mq::Message;

/// 单帧负载上限 / Upper bound on a single frame body.
pub const MAX_BODY_LEN: u32 = 16 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MsgType {
    Publish = 1,
    Subscribe = 2,
    Poll = 3,
    MoveOffset = 4,
    Response = 5,
}

impl MsgType {
    fn from_u8(value: u8) -> anyhow::Result<Self> {
        Ok(match value {
            1 => MsgType::Publish,
            2 => MsgType::Subscribe,
            3 => MsgType::Poll,
            4 => MsgType::MoveOffset,
            5 => MsgType::Response,
            other => anyhow::bail!("unknown msg type {}", other),
        })
    }
}

/// 响应状态码 / Response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Ok,
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
}

/// 字段校验失败详情 / Machine-readable field violation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub field: String,
    pub reason: String,
}

impl FieldViolation {
    pub const REQUIRED_FIELD: &'static str = "REQUIRED_FIELD";
    pub const OUT_OF_RANGE: &'static str = "OUT_OF_RANGE";
    pub const INVALID_FORMAT: &'static str = "INVALID_FORMAT";

    pub fn new(field: impl Into<String>, reason: &str) -> Self {
        FieldViolation { field: field.into(), reason: reason.to_string() }
    }
}

/// 线上消息；所有字段可选，由服务端校验
///
/// Message as carried on the wire. Every field is optional so the server can
/// tell a missing field from an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub key: Option<String>,
    pub payload: Option<Vec<u8>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub partition: Option<u64>,
    pub offset: Option<u64>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        WireMessage {
            key: Some(message.key().to_string()),
            payload: Some(message.payload().to_vec()),
            timestamp: message.timestamp(),
            partition: message.partition().map(|p| p as u64),
            offset: message.offset().map(|o| o as u64),
        }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        Message::from_parts(
            wire.key.unwrap_or_default(),
            wire.payload.unwrap_or_default(),
            wire.timestamp,
            wire.partition.map(|p| p as usize),
            wire.offset.map(|o| o as usize),
        )
    }
}

/// 帧元数据：请求字段与响应字段
///
/// Frame metadata: request fields plus response status and error details.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameMeta {
    pub topic: Option<String>,
    pub group: Option<String>,
    pub subscriber_id: Option<String>,
    pub limit: Option<i64>,
    pub delta: Option<i64>,
    pub status: Option<Status>,
    pub error: Option<String>,
    pub violations: Vec<FieldViolation>,
}

#[derive(Debug, Clone, Copy)]
pub struct WireHeader {
    pub magic: u16,       // 'MQ' 0x4D51
    pub version: u8,      // 1
    pub msg_type: u8,     // MsgType
    pub header_len: u16,  // meta length
    pub body_len: u32,    // payload length
    pub checksum: u32,    // crc32 over body
}

impl WireHeader {
    pub const MAGIC: u16 = 0x4D51;
    pub const VERSION: u8 = 1;
    pub const SIZE: usize = 14;

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..2].copy_from_slice(&self.magic.to_le_bytes());
        buf[2] = self.version;
        buf[3] = self.msg_type;
        buf[4..6].copy_from_slice(&self.header_len.to_le_bytes());
        buf[6..10].copy_from_slice(&self.body_len.to_le_bytes());
        buf[10..14].copy_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8]) -> anyhow::Result<Self> {
        if buf.len() < Self::SIZE {
            anyhow::bail!("header too short");
        }
        let magic = u16::from_le_bytes([buf[0], buf[1]]);
        if magic != Self::MAGIC {
            anyhow::bail!("invalid magic");
        }
        let version = buf[2];
        if version != Self::VERSION {
            anyhow::bail!("unsupported protocol version {}", version);
        }
        Ok(Self {
            magic,
            version,
            msg_type: buf[3],
            header_len: u16::from_le_bytes([buf[4], buf[5]]),
            body_len: u32::from_le_bytes([buf[6], buf[7], buf[8], buf[9]]),
            checksum: u32::from_le_bytes([buf[10], buf[11], buf[12], buf[13]]),
        })
    }
}

/// 一个完整帧 / A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub msg_type: MsgType,
    pub meta: FrameMeta,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(msg_type: MsgType, meta: FrameMeta) -> Self {
        Frame { msg_type, meta, body: Vec::new() }
    }

    pub fn with_messages(mut self, messages: &[WireMessage]) -> anyhow::Result<Self> {
        self.body = bincode::serialize(messages)?;
        Ok(self)
    }

    /// 解码消息体；空消息体视为无消息
    ///
    /// Decode the body as messages; an empty body means no messages.
    pub fn messages(&self) -> anyhow::Result<Vec<WireMessage>> {
        if self.body.is_empty() {
            return Ok(Vec::new());
        }
        Ok(bincode::deserialize(&self.body)?)
    }
}

pub fn encode_frame(frame: &Frame) -> anyhow::Result<Vec<u8>> {
    let meta_bytes = bincode::serialize(&frame.meta)?;
    if meta_bytes.len() > u16::MAX as usize {
        anyhow::bail!("frame metadata too large: {} bytes", meta_bytes.len());
    }
    if frame.body.len() > MAX_BODY_LEN as usize {
        anyhow::bail!("frame body too large: {} bytes", frame.body.len());
    }
    let checksum = crc32fast::hash(&frame.body);
    let header = WireHeader {
        magic: WireHeader::MAGIC,
        version: WireHeader::VERSION,
        msg_type: frame.msg_type as u8,
        header_len: meta_bytes.len() as u16,
        body_len: frame.body.len() as u32,
        checksum,
    };
    let mut buf = Vec::with_capacity(WireHeader::SIZE + meta_bytes.len() + frame.body.len());
    buf.extend_from_slice(&header.to_bytes());
    buf.extend_from_slice(&meta_bytes);
    buf.extend_from_slice(&frame.body);
    Ok(buf)
}

pub async fn read_exact<R: AsyncRead + Unpin>(reader: &mut R, len: usize) -> anyhow::Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> anyhow::Result<Frame> {
    let header_bytes = read_exact(reader, WireHeader::SIZE).await?;
    let header = WireHeader::from_bytes(&header_bytes)?;
    if header.body_len > MAX_BODY_LEN {
        anyhow::bail!("frame body too large: {} bytes", header.body_len);
    }
    let msg_type = MsgType::from_u8(header.msg_type)?;
    let meta_buf = read_exact(reader, header.header_len as usize).await?;
    let body = read_exact(reader, header.body_len as usize).await?;
    if crc32fast::hash(&body) != header.checksum {
        anyhow::bail!("checksum mismatch");
    }
    let meta: FrameMeta = bincode::deserialize(&meta_buf)?;
    Ok(Frame { msg_type, meta, body })
}

pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &Frame) -> anyhow::Result<()> {
    let bytes = encode_frame(frame)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}
