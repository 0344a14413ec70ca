use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

/// 消息负载（共享字节，轮询时零拷贝克隆）
///
/// Message payload; shared bytes so polled copies are cheap clones.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Payload(Arc<Vec<u8>>);

impl Payload {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.0.as_ref().clone()
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Payload").field(&self.0.len()).finish()
    }
}

impl From<Vec<u8>> for Payload {
    fn from(bytes: Vec<u8>) -> Self {
        Payload(Arc::new(bytes))
    }
}

impl From<&[u8]> for Payload {
    fn from(bytes: &[u8]) -> Self {
        Payload(Arc::new(bytes.to_vec()))
    }
}

impl From<&str> for Payload {
    fn from(s: &str) -> Self {
        Payload(Arc::new(s.as_bytes().to_vec()))
    }
}

impl From<String> for Payload {
    fn from(s: String) -> Self {
        Payload(Arc::new(s.into_bytes()))
    }
}

/// 主题消息
///
/// A keyed message. The timestamp, partition and offset are assigned by the
/// broker when the message is published and are `None` before that.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    key: String,
    payload: Payload,
    timestamp: Option<DateTime<Utc>>,
    partition: Option<usize>,
    offset: Option<usize>,
}

impl Message {
    /// 创建待发布的消息
    ///
    /// Create a message ready to be published.
    pub fn new(key: impl Into<String>, payload: impl Into<Payload>) -> Self {
        Message {
            key: key.into(),
            payload: payload.into(),
            timestamp: None,
            partition: None,
            offset: None,
        }
    }

    /// 创建无键消息 / Create a message with an empty key.
    pub fn unkeyed(payload: impl Into<Payload>) -> Self {
        Self::new(String::new(), payload)
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// 服务端发布时间（UTC） / Server-side publish time (UTC).
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamp
    }

    /// 消息所在分区 / Partition the message was stored in.
    pub fn partition(&self) -> Option<usize> {
        self.partition
    }

    /// 分区内偏移量 / Position inside its partition.
    pub fn offset(&self) -> Option<usize> {
        self.offset
    }

    /// 负载的 UTF-8 文本视图 / Lossy UTF-8 view of the payload.
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(self.payload.as_bytes())
    }

    /// 截断后的负载文本，用于日志
    ///
    /// Truncated payload text for log lines.
    pub fn display_payload(&self, max_len: usize) -> String {
        let s = self.payload_str();
        let truncated = if s.chars().count() > max_len {
            format!("{}...", s.chars().take(max_len).collect::<String>())
        } else {
            s.into_owned()
        };
        format!("{} (len={} key={:?})", truncated, self.payload.len(), self.key)
    }

    /// 发布时盖上时间戳，调用方提供的值会被覆盖
    ///
    /// Stamp at publish time; anything the caller set is overwritten.
    pub(crate) fn stamped(mut self, now: DateTime<Utc>) -> Self {
        self.timestamp = Some(now);
        self
    }

    pub(crate) fn placed(mut self, partition: usize, offset: usize) -> Self {
        self.partition = Some(partition);
        self.offset = Some(offset);
        self
    }

    /// 从线上数据还原已存储的消息 / Rebuild a stored message received over the wire.
    pub(crate) fn from_parts(
        key: String,
        payload: Vec<u8>,
        timestamp: Option<DateTime<Utc>>,
        partition: Option<usize>,
        offset: Option<usize>,
    ) -> Self {
        Message { key, payload: payload.into(), timestamp, partition, offset }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_message_has_no_server_fields() {
        let msg = Message::new("k", "v");
        assert_eq!(msg.key(), "k");
        assert_eq!(msg.payload().as_bytes(), b"v");
        assert!(msg.timestamp().is_none());
        assert!(msg.partition().is_none());
        assert!(msg.offset().is_none());
    }

    #[test]
    fn stamping_overwrites_timestamp() {
        let first = Utc::now();
        let msg = Message::new("k", "v").stamped(first);
        let later = first + chrono::Duration::seconds(5);
        assert_eq!(msg.stamped(later).timestamp(), Some(later));
    }

    #[test]
    fn display_payload_truncates_on_char_boundary() {
        let msg = Message::new("k", "héllo wörld");
        assert_eq!(msg.display_payload(3), "hél... (len=13 key=\"k\")");
    }
}
