use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use super::error::{BrokerError, Result};
use super::message::Message;
use super::partition::{Partition, PartitionStats};
use super::partitioner::{PartitionStrategy, Partitioner};
use super::subscriber::{Subscriber, SubscriberId, Subscription, SubscriptionPolicy};

fn default_strategy() -> String {
    PartitionStrategy::default().as_str().to_string()
}

fn default_subscription() -> String {
    SubscriptionPolicy::default().as_str().to_string()
}

/// 静态主题定义
///
/// Static topic definition. Strategy and policy stay textual so that every
/// bad definition can be reported together when the broker is built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicDefinition {
    pub name: String,
    pub partitions: usize,
    #[serde(default = "default_strategy")]
    pub strategy: String,
    #[serde(default = "default_subscription")]
    pub subscription: String,
}

impl TopicDefinition {
    /// 哈希分区、独占订阅的默认定义
    ///
    /// Definition with hash partitioning and the exclusive subscription policy.
    pub fn new(name: impl Into<String>, partitions: usize) -> Self {
        TopicDefinition {
            name: name.into(),
            partitions,
            strategy: default_strategy(),
            subscription: default_subscription(),
        }
    }

    pub fn with_strategy(mut self, strategy: PartitionStrategy) -> Self {
        self.strategy = strategy.as_str().to_string();
        self
    }

    pub fn with_subscription(mut self, policy: SubscriptionPolicy) -> Self {
        self.subscription = policy.as_str().to_string();
        self
    }
}

/// 主题统计信息
///
/// Topic statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicStats {
    pub name: String,
    pub strategy: PartitionStrategy,
    pub subscription: SubscriptionPolicy,
    pub subscriber_count: usize,
    pub partitions: Vec<PartitionStats>,
}

impl TopicStats {
    pub fn message_count(&self) -> usize {
        self.partitions.iter().map(|p| p.message_count).sum()
    }
}

/// 分区主题
///
/// A fixed set of partitions, the partitioner that feeds them and the
/// registry of active subscribers. The registry lock also serialises
/// publishes; it is always taken before any partition lock.
#[derive(Debug)]
pub struct Topic {
    name: String,
    partitions: Vec<Partition>,
    partitioner: Partitioner,
    policy: SubscriptionPolicy,
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
}

impl Topic {
    pub fn new(
        name: impl Into<String>,
        partitions: usize,
        strategy: PartitionStrategy,
        policy: SubscriptionPolicy,
    ) -> Result<Self> {
        let name = name.into();
        let partitioner = Partitioner::new(strategy, partitions)?;
        info!("创建新主题: {}，分区数: {}，策略: {} / Creating new topic: {}, partitions: {}, strategy: {}", name, partitions, strategy, name, partitions, strategy);
        Ok(Topic {
            name,
            partitions: (0..partitions).map(Partition::new).collect(),
            partitioner,
            policy,
            subscribers: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_definition(def: &TopicDefinition) -> Result<Self> {
        let strategy: PartitionStrategy = def.strategy.parse()?;
        let policy: SubscriptionPolicy = def.subscription.parse()?;
        Self::new(def.name.clone(), def.partitions, strategy, policy)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn partition(&self, index: usize) -> Option<&Partition> {
        self.partitions.get(index)
    }

    pub fn strategy(&self) -> PartitionStrategy {
        self.partitioner.strategy()
    }

    pub fn policy(&self) -> SubscriptionPolicy {
        self.policy
    }

    fn registry(&self) -> Result<RwLockReadGuard<'_, HashMap<SubscriberId, Subscriber>>> {
        self.subscribers.read().map_err(|_| BrokerError::poisoned("topic"))
    }

    pub(super) fn registry_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<SubscriberId, Subscriber>>> {
        self.subscribers.write().map_err(|_| BrokerError::poisoned("topic"))
    }

    fn assigned(&self, index: usize) -> Result<&Partition> {
        self.partitions.get(index).ok_or_else(|| {
            BrokerError::Internal(format!("topic {:?} has no partition {}", self.name, index))
        })
    }

    /// 发布消息：盖时间戳、路由、追加。整个调用持有主题写锁。
    ///
    /// Stamp, route and append each message. The whole call holds the topic
    /// write lock, so publishes to one topic never interleave.
    pub fn publish(&self, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        let _routing = self.registry_mut()?;
        let now = Utc::now();
        let mut count = 0usize;
        for message in messages {
            let message = message.stamped(now);
            let idx = self.partitioner.route(&message);
            self.assigned(idx)?.publish(message)?;
            count += 1;
        }
        debug!("主题 {} 发布 {} 条消息 / Topic {} published {} messages", self.name, count, self.name, count);
        Ok(())
    }

    /// 注册订阅者并分配全部分区
    ///
    /// Register a subscriber for `group` with every partition assigned.
    pub fn subscribe(&self, group: &str) -> Result<Subscription> {
        let mut registry = self.registry_mut()?;
        let evicted: Vec<SubscriberId> = match self.policy {
            SubscriptionPolicy::Exclusive => registry.drain().map(|(id, _)| id).collect(),
            SubscriptionPolicy::PerGroup => {
                let stale: Vec<SubscriberId> = registry
                    .iter()
                    .filter(|(_, s)| s.group() == group)
                    .map(|(id, _)| *id)
                    .collect();
                for id in &stale {
                    registry.remove(id);
                }
                stale
            }
        };

        let id = SubscriberId::generate();
        let assigned: Vec<usize> = (0..self.partitions.len()).collect();
        registry.insert(id, Subscriber::new(group.to_string(), assigned));

        if !evicted.is_empty() {
            info!("主题 {} 的订阅者已替换: {:?} -> {} / Subscribers of topic {} superseded: {:?} -> {}", self.name, evicted, id, self.name, evicted, id);
        }
        debug!("主题订阅成功，主题: {}，组: {}，ID: {} / Topic subscription successful, topic: {}, group: {}, id: {}", self.name, group, id, self.name, group, id);
        Ok(Subscription { id, evicted })
    }

    /// 查找订阅者记录 / Look up a subscriber record.
    pub fn subscriber(&self, id: &SubscriberId) -> Result<Subscriber> {
        self.registry()?
            .get(id)
            .cloned()
            .ok_or_else(|| BrokerError::SubscriberNotFound(id.to_string()))
    }

    /// 按分区升序读取最多 `limit` 条消息；不阻塞，也不移动偏移量
    ///
    /// Collect up to `limit` messages walking the assigned partitions in
    /// ascending order. Never blocks and never moves offsets.
    pub fn poll(&self, id: &SubscriberId, limit: usize) -> Result<Vec<Message>> {
        let subscriber = self.subscriber(id)?;
        let mut polled = Vec::new();
        for &idx in subscriber.partitions() {
            if polled.len() >= limit {
                break;
            }
            let batch = self.assigned(idx)?.poll(subscriber.group(), limit - polled.len())?;
            polled.extend(batch);
        }
        debug!("订阅者 {} 从主题 {} 拉取 {} 条消息 / Subscriber {} polled {} messages from topic {}", id, self.name, polled.len(), id, polled.len(), self.name);
        Ok(polled)
    }

    /// 提交 `delta` 条消息，按分区升序分摊。
    ///
    /// Commit `delta` messages, spreading them over the assigned partitions in
    /// the same order poll uses. Not atomic: partitions advanced before the
    /// delta runs out keep their advancement.
    pub fn move_offset(&self, id: &SubscriberId, delta: usize) -> Result<()> {
        let subscriber = self.subscriber(id)?;
        let mut remaining = delta;
        for &idx in subscriber.partitions() {
            if remaining == 0 {
                break;
            }
            remaining = self.assigned(idx)?.move_offset(subscriber.group(), remaining)?;
        }
        if remaining > 0 {
            warn!("提交偏移量超出未消费消息数，主题: {}，订阅者: {}，delta: {} / Commit exceeds unconsumed messages, topic: {}, subscriber: {}, delta: {}", self.name, id, delta, self.name, id, delta);
            return Err(BrokerError::InvalidOffsetDelta { delta, available: delta - remaining });
        }
        Ok(())
    }

    pub fn stats(&self) -> Result<TopicStats> {
        let subscriber_count = self.registry()?.len();
        let partitions = self
            .partitions
            .iter()
            .map(Partition::stats)
            .collect::<Result<Vec<_>>>()?;
        Ok(TopicStats {
            name: self.name.clone(),
            strategy: self.strategy(),
            subscription: self.policy,
            subscriber_count,
            partitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn topic(partitions: usize, strategy: PartitionStrategy) -> Topic {
        Topic::new("t", partitions, strategy, SubscriptionPolicy::Exclusive).unwrap()
    }

    fn payloads(messages: &[Message]) -> Vec<String> {
        messages.iter().map(|m| m.payload_str().into_owned()).collect()
    }

    #[test]
    fn publish_stamps_messages_with_one_timestamp() {
        let t = topic(1, PartitionStrategy::Hash);
        let before = Utc::now();
        t.publish(vec![Message::new("a", "1"), Message::new("b", "2")]).unwrap();
        let sub = t.subscribe("g").unwrap();
        let polled = t.poll(&sub.id, 10).unwrap();
        let stamp = polled[0].timestamp().unwrap();
        assert!(stamp >= before);
        assert_eq!(polled[1].timestamp(), Some(stamp));
    }

    #[test]
    fn poll_walks_partitions_in_ascending_order() {
        let t = topic(3, PartitionStrategy::RoundRobin);
        // round-robin starts at partition 1
        t.publish((0..6).map(|i| Message::unkeyed(format!("m{}", i)))).unwrap();
        let sub = t.subscribe("g").unwrap();
        let polled = t.poll(&sub.id, 10).unwrap();
        assert_eq!(payloads(&polled), vec!["m2", "m5", "m0", "m3", "m1", "m4"]);
        let partitions: Vec<_> = polled.iter().map(|m| m.partition().unwrap()).collect();
        assert_eq!(partitions, vec![0, 0, 1, 1, 2, 2]);
    }

    #[test]
    fn poll_respects_limit_across_partitions() {
        let t = topic(3, PartitionStrategy::RoundRobin);
        t.publish((0..6).map(|i| Message::unkeyed(format!("m{}", i)))).unwrap();
        let sub = t.subscribe("g").unwrap();
        assert_eq!(payloads(&t.poll(&sub.id, 3).unwrap()), vec!["m2", "m5", "m0"]);
    }

    #[test]
    fn move_offset_carries_remainder_to_next_partition() {
        let t = topic(3, PartitionStrategy::RoundRobin);
        t.publish((0..6).map(|i| Message::unkeyed(format!("m{}", i)))).unwrap();
        let sub = t.subscribe("g").unwrap();
        t.move_offset(&sub.id, 3).unwrap();
        assert_eq!(t.partition(0).unwrap().committed_offset("g").unwrap(), 2);
        assert_eq!(t.partition(1).unwrap().committed_offset("g").unwrap(), 1);
        assert_eq!(payloads(&t.poll(&sub.id, 10).unwrap()), vec!["m3", "m1", "m4"]);
    }

    #[test]
    fn exclusive_policy_replaces_every_subscriber() {
        let t = topic(2, PartitionStrategy::Hash);
        let first = t.subscribe("a").unwrap();
        let second = t.subscribe("b").unwrap();
        assert_eq!(second.evicted, vec![first.id]);
        assert!(matches!(t.poll(&first.id, 1), Err(BrokerError::SubscriberNotFound(_))));
        assert!(t.poll(&second.id, 1).is_ok());
        assert_eq!(t.stats().unwrap().subscriber_count, 1);
    }

    #[test]
    fn per_group_policy_only_replaces_same_group() {
        let t = Topic::new("t", 2, PartitionStrategy::Hash, SubscriptionPolicy::PerGroup).unwrap();
        let a1 = t.subscribe("a").unwrap();
        let b1 = t.subscribe("b").unwrap();
        assert!(b1.evicted.is_empty());
        let a2 = t.subscribe("a").unwrap();
        assert_eq!(a2.evicted, vec![a1.id]);
        assert!(t.poll(&a1.id, 1).is_err());
        assert!(t.poll(&b1.id, 1).is_ok());
        assert_eq!(t.subscriber(&a2.id).unwrap().group(), "a");
        assert_eq!(t.subscriber(&a2.id).unwrap().partitions(), &[0, 1]);
    }

    #[test]
    fn from_definition_rejects_unknown_identifiers() {
        let mut def = TopicDefinition::new("t", 2);
        def.strategy = "sticky".into();
        assert!(matches!(Topic::from_definition(&def), Err(BrokerError::UnrecognizedStrategy(_))));

        let mut def = TopicDefinition::new("t", 2);
        def.subscription = "shared".into();
        assert!(matches!(Topic::from_definition(&def), Err(BrokerError::UnrecognizedSubscriptionPolicy(_))));
    }

    #[test]
    fn stats_report_per_partition_counts() {
        let t = topic(2, PartitionStrategy::RoundRobin);
        t.publish((0..5).map(|i| Message::unkeyed(format!("m{}", i)))).unwrap();
        let stats = t.stats().unwrap();
        assert_eq!(stats.message_count(), 5);
        assert_eq!(stats.partitions[0].message_count, 2);
        assert_eq!(stats.partitions[1].message_count, 3);
    }
}
