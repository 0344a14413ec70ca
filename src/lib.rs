//! MemQ Broker - 分区内存消息代理
//!
//! MemQ Broker - partitioned in-memory message broker with per-group offsets.
//!
//! # Examples
//!
//! Publish, poll (peek) and commit:
//! ```rust
//! use memq_broker::{Broker, Message, TopicDefinition};
//!
//! fn main() -> anyhow::Result<()> {
//!     let broker = Broker::new(vec![TopicDefinition::new("demo", 1)])?;
//!     broker.publish("demo", vec![Message::new("user-1", "walter")])?;
//!
//!     let sub = broker.subscribe("demo", "group-1")?;
//!     let polled = broker.poll(&sub, 10)?;
//!     assert_eq!(polled[0].payload_str(), "walter");
//!
//!     // poll does not move the offset
//!     assert_eq!(broker.poll(&sub, 10)?.len(), 1);
//!
//!     broker.move_offset(&sub, 1)?;
//!     assert!(broker.poll(&sub, 10)?.is_empty());
//!     Ok(())
//! }
//! ```
//!
//! Round-robin topics and error kinds:
//! ```rust
//! use memq_broker::{Broker, ErrorKind, Message, PartitionStrategy, TopicDefinition};
//!
//! fn main() -> anyhow::Result<()> {
//!     let broker = Broker::new(vec![
//!         TopicDefinition::new("jobs", 3).with_strategy(PartitionStrategy::RoundRobin),
//!     ])?;
//!     broker.publish("jobs", (0..6).map(|i| Message::unkeyed(format!("job {}", i))))?;
//!
//!     let stats = broker.topic_stats("jobs")?;
//!     assert!(stats.partitions.iter().all(|p| p.message_count == 2));
//!
//!     let sub = broker.subscribe("jobs", "workers")?;
//!     let err = broker.move_offset(&sub, 7).unwrap_err();
//!     assert_eq!(err.kind(), ErrorKind::InvalidOffsetDelta);
//!     Ok(())
//! }
//! ```
pub mod mq;
pub mod config;
pub mod tcp;

pub use mq::{
    Broker, BrokerError, ErrorKind, Message, PartitionStats, PartitionStrategy, Payload,
    SubscriberId, SubscriptionPolicy, TopicDefinition, TopicStats,
};
pub use config::BrokerConfig;
pub use tcp::{TcpClient, TcpClientOptions, TcpServer, TcpServerOptions};
