use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace};

use super::error::{BrokerError, Result};
use super::message::Message;

/// 分区统计信息
///
/// Partition statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStats {
    pub index: usize,
    pub message_count: usize,
    pub committed_offsets: HashMap<String, usize>,
}

#[derive(Debug, Default)]
struct PartitionLog {
    messages: Vec<Message>,
    offsets: HashMap<String, usize>,
}

/// 仅追加的分区日志，以及每个消费者组已提交的偏移量
///
/// Append-only message log plus the committed offset of every consumer group.
/// Offsets only move forward and never pass the end of the log.
#[derive(Debug)]
pub struct Partition {
    index: usize,
    log: RwLock<PartitionLog>,
}

impl Partition {
    pub fn new(index: usize) -> Self {
        Partition { index, log: RwLock::new(PartitionLog::default()) }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, PartitionLog>> {
        self.log.read().map_err(|_| BrokerError::poisoned("partition"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, PartitionLog>> {
        self.log.write().map_err(|_| BrokerError::poisoned("partition"))
    }

    /// 追加消息（消息应已盖好时间戳）
    ///
    /// Append a message that has already been stamped.
    pub fn publish(&self, message: Message) -> Result<()> {
        let mut log = self.write()?;
        let offset = log.messages.len();
        trace!("分区 {} 追加消息，偏移量: {}，内容: {} / Partition {} appended message at offset {}: {}", self.index, offset, message.display_payload(64), self.index, offset, message.display_payload(64));
        log.messages.push(message.placed(self.index, offset));
        Ok(())
    }

    /// 从组的已提交偏移量开始读取最多 `limit` 条消息，不移动偏移量
    ///
    /// Peek up to `limit` messages from the group's committed offset without moving it.
    pub fn poll(&self, group: &str, limit: usize) -> Result<Vec<Message>> {
        let log = self.read()?;
        let offset = log.offsets.get(group).copied().unwrap_or(0);
        if offset >= log.messages.len() {
            return Ok(Vec::new());
        }
        let end = offset.saturating_add(limit).min(log.messages.len());
        Ok(log.messages[offset..end].to_vec())
    }

    /// 按 `delta` 推进组的偏移量（截断到日志末尾），返回未被吸收的余量
    ///
    /// Advance the group's offset by `delta`, clamped to the log length, and
    /// return the part of `delta` this partition could not absorb.
    pub fn move_offset(&self, group: &str, delta: usize) -> Result<usize> {
        let mut log = self.write()?;
        let len = log.messages.len();
        let offset = log.offsets.entry(group.to_string()).or_insert(0);
        let target = offset.saturating_add(delta);
        let new_offset = target.min(len);
        let remainder = target - new_offset;
        debug!("分区 {} 组 {} 偏移量 {} -> {} / Partition {} group {} offset {} -> {}", self.index, group, *offset, new_offset, self.index, group, *offset, new_offset);
        *offset = new_offset;
        Ok(remainder)
    }

    /// 当前消息数 / Current number of messages.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.messages.len())
    }

    pub fn committed_offset(&self, group: &str) -> Result<usize> {
        Ok(self.read()?.offsets.get(group).copied().unwrap_or(0))
    }

    pub fn stats(&self) -> Result<PartitionStats> {
        let log = self.read()?;
        Ok(PartitionStats {
            index: self.index,
            message_count: log.messages.len(),
            committed_offsets: log.offsets.clone(),
        })
    }
}
