pub mod error;
pub mod message;
pub mod partitioner;
pub mod partition;
pub mod subscriber;
pub mod topic;
pub mod broker;

pub use error::{BrokerError, ErrorKind, Result, TopicViolation};
pub use message::{Message, Payload};
pub use partitioner::{PartitionStrategy, Partitioner};
pub use partition::{Partition, PartitionStats};
pub use subscriber::{Subscriber, SubscriberId, Subscription, SubscriptionPolicy};
pub use topic::{Topic, TopicDefinition, TopicStats};
pub use broker::Broker;
