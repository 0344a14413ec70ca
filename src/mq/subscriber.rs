use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::BrokerError;

/// 订阅者标识（128 位随机 UUID）
///
/// Opaque subscriber identifier (random 128-bit UUID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub(crate) fn generate() -> Self {
        SubscriberId(Uuid::new_v4())
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SubscriberId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(SubscriberId)
    }
}

/// 订阅者记录：消费者组与分配的分区
///
/// Subscriber record: consumer group plus assigned partition indices, in the
/// ascending order poll and commit walk them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscriber {
    group: String,
    partitions: Vec<usize>,
}

impl Subscriber {
    pub(crate) fn new(group: String, partitions: Vec<usize>) -> Self {
        Subscriber { group, partitions }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn partitions(&self) -> &[usize] {
        &self.partitions
    }
}

/// 订阅结果：新 ID 以及被替换掉的旧 ID
///
/// Outcome of a subscribe: the fresh ID and the IDs it invalidated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub id: SubscriberId,
    pub evicted: Vec<SubscriberId>,
}

/// 新订阅如何影响已有订阅者
///
/// How a new subscribe treats existing registrations of the topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPolicy {
    /// 单活跃消费者：每次订阅替换整个注册表
    ///
    /// Single active consumer: every subscribe replaces the whole registry.
    #[default]
    Exclusive,
    /// 每个消费者组一个活跃订阅者，不同组互不影响
    ///
    /// One active subscriber per group; other groups are left alone.
    PerGroup,
}

impl SubscriptionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPolicy::Exclusive => "exclusive",
            SubscriptionPolicy::PerGroup => "per_group",
        }
    }
}

impl fmt::Display for SubscriptionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionPolicy {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "exclusive" => Ok(SubscriptionPolicy::Exclusive),
            "per_group" | "per-group" => Ok(SubscriptionPolicy::PerGroup),
            other => Err(BrokerError::UnrecognizedSubscriptionPolicy(other.to_string())),
        }
    }
}
