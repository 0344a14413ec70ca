//! 分区路由 / Partition routing
//!
//! 两种固定策略：按键哈希（相同键总是进入同一分区）与轮询（均匀分布）。
//! Two closed strategies: key hash (same key, same partition) and round-robin
//! (even spread, key ignored).

use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

use log::trace;
use serde::{Deserialize, Serialize};

use super::error::{BrokerError, Result};
use super::message::Message;

const FNV_OFFSET_BASIS: u64 = 14695981039346656037;
const FNV_PRIME: u64 = 1099511628211;

/// FNV-1a 64 位哈希 / 64-bit FNV-1a hash.
pub fn fnv1a_hash(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// 分区策略
///
/// Partitioning strategy selected when a topic is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartitionStrategy {
    /// 按键哈希 / Route by key hash.
    #[default]
    Hash,
    /// 轮询 / Rotate through partitions.
    RoundRobin,
}

impl PartitionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PartitionStrategy::Hash => "hash",
            PartitionStrategy::RoundRobin => "round_robin",
        }
    }
}

impl fmt::Display for PartitionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartitionStrategy {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hash" => Ok(PartitionStrategy::Hash),
            "round_robin" | "round-robin" | "roundrobin" => Ok(PartitionStrategy::RoundRobin),
            other => Err(BrokerError::UnrecognizedStrategy(other.to_string())),
        }
    }
}

/// 分区器：消息 → 分区索引
///
/// Maps a message to a partition index in `[0, partitions)`.
#[derive(Debug)]
pub enum Partitioner {
    Hash { partitions: usize },
    RoundRobin { partitions: usize, counter: Mutex<usize> },
}

impl Partitioner {
    pub fn new(strategy: PartitionStrategy, partitions: usize) -> Result<Self> {
        if partitions < 1 {
            return Err(BrokerError::InvalidPartitionCount(partitions));
        }
        Ok(match strategy {
            PartitionStrategy::Hash => Partitioner::Hash { partitions },
            PartitionStrategy::RoundRobin => Partitioner::RoundRobin {
                partitions,
                counter: Mutex::new(0),
            },
        })
    }

    pub fn strategy(&self) -> PartitionStrategy {
        match self {
            Partitioner::Hash { .. } => PartitionStrategy::Hash,
            Partitioner::RoundRobin { .. } => PartitionStrategy::RoundRobin,
        }
    }

    pub fn partitions(&self) -> usize {
        match self {
            Partitioner::Hash { partitions } | Partitioner::RoundRobin { partitions, .. } => *partitions,
        }
    }

    /// 计算消息的目标分区 / Compute the target partition for a message.
    pub fn route(&self, message: &Message) -> usize {
        let idx = match self {
            Partitioner::Hash { partitions } => {
                (fnv1a_hash(message.key().as_bytes()) % *partitions as u64) as usize
            }
            Partitioner::RoundRobin { partitions, counter } => {
                // a poisoned counter is still a valid counter
                let mut counter = counter.lock().unwrap_or_else(PoisonError::into_inner);
                *counter = (*counter + 1) % *partitions;
                *counter
            }
        };
        trace!("消息路由到分区 {}，键: {:?} / Routed message to partition {}, key: {:?}", idx, message.key(), idx, message.key());
        idx
    }
}
