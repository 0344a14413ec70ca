use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, info, warn};

use super::error::{BrokerError, Result, TopicViolation};
use super::message::Message;
use super::subscriber::SubscriberId;
use super::topic::{Topic, TopicDefinition, TopicStats};

/// 消息代理：主题注册表与订阅者路由
///
/// Registry of topics plus the subscriber → topic index used to route
/// `poll` and `move_offset`. The topic set is fixed at construction.
#[derive(Debug)]
pub struct Broker {
    topics: HashMap<String, Topic>,
    topic_by_subscriber: RwLock<HashMap<SubscriberId, String>>,
}

impl Broker {
    /// 由静态主题定义构造代理，所有无效定义一并报告
    ///
    /// Build a broker from static topic definitions. Every invalid definition
    /// is reported in a single `InvalidConfiguration` error.
    pub fn new(definitions: impl IntoIterator<Item = TopicDefinition>) -> Result<Self> {
        let mut topics = HashMap::new();
        let mut seen = HashSet::new();
        let mut violations = Vec::new();

        for def in definitions {
            if !seen.insert(def.name.clone()) {
                violations.push(TopicViolation { topic: def.name.clone(), reason: "duplicate topic name".to_string() });
                continue;
            }
            match Topic::from_definition(&def) {
                Ok(topic) => {
                    topics.insert(def.name.clone(), topic);
                }
                Err(e) => violations.push(TopicViolation { topic: def.name.clone(), reason: e.to_string() }),
            }
        }

        if !violations.is_empty() {
            warn!("主题定义无效: {} 个 / Invalid topic definitions: {}", violations.len(), violations.len());
            return Err(BrokerError::InvalidConfiguration(violations));
        }

        info!("代理已创建，主题: {:?} / Broker created, topics: {:?}", topics.keys().collect::<Vec<_>>(), topics.keys().collect::<Vec<_>>());
        Ok(Broker { topics, topic_by_subscriber: RwLock::new(HashMap::new()) })
    }

    fn index(&self) -> Result<RwLockReadGuard<'_, HashMap<SubscriberId, String>>> {
        self.topic_by_subscriber.read().map_err(|_| BrokerError::poisoned("subscriber index"))
    }

    fn index_mut(&self) -> Result<RwLockWriteGuard<'_, HashMap<SubscriberId, String>>> {
        self.topic_by_subscriber.write().map_err(|_| BrokerError::poisoned("subscriber index"))
    }

    fn topic_or_not_found(&self, name: &str) -> Result<&Topic> {
        self.topics.get(name).ok_or_else(|| BrokerError::TopicNotFound(name.to_string()))
    }

    /// 订阅者 → 主题；订阅者已知但主题缺失时为内部错误
    ///
    /// Resolve a subscriber to its topic. A known subscriber pointing at a
    /// missing topic means the two indexes disagree, which is internal.
    fn topic_of(&self, id: &SubscriberId) -> Result<&Topic> {
        let name = self
            .index()?
            .get(id)
            .cloned()
            .ok_or_else(|| BrokerError::SubscriberNotFound(id.to_string()))?;
        self.topics.get(&name).ok_or_else(|| {
            BrokerError::Internal(format!("subscriber {} refers to unknown topic {:?}", id, name))
        })
    }

    pub fn publish(&self, topic: &str, messages: impl IntoIterator<Item = Message>) -> Result<()> {
        self.topic_or_not_found(topic)?.publish(messages)
    }

    /// 先在主题中注册，再更新订阅者索引；两把锁从不同时持有
    ///
    /// Register with the topic first, then update the subscriber index. The
    /// two locks are never held together; an evicted ID that is briefly still
    /// indexed is rejected by the topic's own registry.
    pub fn subscribe(&self, topic: &str, group: &str) -> Result<SubscriberId> {
        let subscription = self.topic_or_not_found(topic)?.subscribe(group)?;
        let mut index = self.index_mut()?;
        for stale in &subscription.evicted {
            index.remove(stale);
        }
        index.insert(subscription.id, topic.to_string());
        debug!("订阅者索引大小: {} / Subscriber index size: {}", index.len(), index.len());
        Ok(subscription.id)
    }

    pub fn poll(&self, id: &SubscriberId, limit: usize) -> Result<Vec<Message>> {
        self.topic_of(id)?.poll(id, limit)
    }

    pub fn move_offset(&self, id: &SubscriberId, delta: usize) -> Result<()> {
        self.topic_of(id)?.move_offset(id, delta)
    }

    pub fn topic(&self, name: &str) -> Option<&Topic> {
        self.topics.get(name)
    }

    /// 列出所有主题（按名称排序） / List topic names, sorted.
    pub fn topic_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.topics.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn topic_stats(&self, name: &str) -> Result<TopicStats> {
        self.topic_or_not_found(name)?.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mq::error::ErrorKind;
    use crate::mq::partitioner::PartitionStrategy;

    #[test]
    fn construction_aggregates_all_violations() {
        let mut unknown = TopicDefinition::new("c", 2);
        unknown.strategy = "sticky".into();
        let err = Broker::new(vec![
            TopicDefinition::new("a", 1),
            TopicDefinition::new("b", 0),
            unknown,
            TopicDefinition::new("a", 3),
        ])
        .unwrap_err();

        match err {
            BrokerError::InvalidConfiguration(violations) => {
                let topics: Vec<&str> = violations.iter().map(|v| v.topic.as_str()).collect();
                assert_eq!(topics, vec!["b", "c", "a"]);
                assert!(violations[2].reason.contains("duplicate"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn unknown_topic_is_reported() {
        let broker = Broker::new(vec![TopicDefinition::new("a", 1)]).unwrap();
        assert_eq!(broker.publish("nope", Vec::<Message>::new()).unwrap_err().kind(), ErrorKind::TopicNotFound);
        assert_eq!(broker.subscribe("nope", "g").unwrap_err().kind(), ErrorKind::TopicNotFound);
        assert_eq!(broker.topic_stats("nope").unwrap_err().kind(), ErrorKind::TopicNotFound);
    }

    #[test]
    fn unknown_subscriber_is_reported() {
        let broker = Broker::new(vec![TopicDefinition::new("a", 1)]).unwrap();
        let id = SubscriberId::generate();
        assert_eq!(broker.poll(&id, 1).unwrap_err().kind(), ErrorKind::SubscriberNotFound);
        assert_eq!(broker.move_offset(&id, 1).unwrap_err().kind(), ErrorKind::SubscriberNotFound);
    }

    #[test]
    fn rotated_subscribers_leave_the_broker_index() {
        let broker = Broker::new(vec![TopicDefinition::new("a", 1)]).unwrap();
        let first = broker.subscribe("a", "g").unwrap();
        let second = broker.subscribe("a", "g").unwrap();
        assert!(!broker.index().unwrap().contains_key(&first));
        assert!(broker.index().unwrap().contains_key(&second));
    }

    #[test]
    fn subscribe_does_not_block_other_topics() {
        use std::sync::{mpsc, Arc};
        use std::thread;
        use std::time::Duration;

        let broker = Arc::new(Broker::new(vec![TopicDefinition::new("a", 1), TopicDefinition::new("b", 1)]).unwrap());
        broker.publish("b", vec![Message::new("k", "v")]).unwrap();
        let reader = broker.subscribe("b", "g").unwrap();

        // keep topic a busy so a subscribe to it has to wait
        let busy = broker.topic("a").unwrap().registry_mut().unwrap();
        let waiting = {
            let broker = Arc::clone(&broker);
            thread::spawn(move || broker.subscribe("a", "g").map(|_| ()))
        };
        thread::sleep(Duration::from_millis(50));

        let (tx, rx) = mpsc::channel();
        {
            let broker = Arc::clone(&broker);
            thread::spawn(move || {
                let _ = tx.send(broker.poll(&reader, 10).map(|m| m.len()));
            });
        }
        let polled = rx.recv_timeout(Duration::from_secs(5));
        drop(busy);
        waiting.join().unwrap().unwrap();

        assert_eq!(polled.expect("poll on topic b was blocked").unwrap(), 1);
    }

    #[test]
    fn dangling_index_entry_is_internal_not_fatal() {
        let broker = Broker::new(vec![TopicDefinition::new("a", 1)]).unwrap();
        let id = SubscriberId::generate();
        broker.index_mut().unwrap().insert(id, "ghost".to_string());
        assert_eq!(broker.poll(&id, 1).unwrap_err().kind(), ErrorKind::Internal);
        assert_eq!(broker.move_offset(&id, 1).unwrap_err().kind(), ErrorKind::Internal);
    }

    #[test]
    fn topics_are_listed_sorted() {
        let broker = Broker::new(vec![
            TopicDefinition::new("zeta", 1),
            TopicDefinition::new("alpha", 2).with_strategy(PartitionStrategy::RoundRobin),
        ])
        .unwrap();
        assert_eq!(broker.topic_names(), vec!["alpha", "zeta"]);
        assert_eq!(broker.topic("alpha").unwrap().strategy(), PartitionStrategy::RoundRobin);
    }
}
