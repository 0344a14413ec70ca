//! 代理核心错误类型 / Broker core error types
//!
//! 核心只负责对失败进行分类，传输层负责映射为线上状态码。
//! The core only classifies failures; the transport maps them to wire statuses.

use std::fmt;

/// 核心操作结果 / Result of a core operation.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// 单个主题定义的配置违规
///
/// A configuration violation attached to one topic definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicViolation {
    pub topic: String,
    pub reason: String,
}

impl fmt::Display for TopicViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid topic definition for topic {:?}: {}", self.topic, self.reason)
    }
}

fn join_violations(violations: &[TopicViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("topic {0:?} not found")]
    TopicNotFound(String),

    #[error("subscriber {0:?} is not a registered subscriber of the broker")]
    SubscriberNotFound(String),

    #[error("offset delta {delta} is larger than the {available} unconsumed messages")]
    InvalidOffsetDelta { delta: usize, available: usize },

    #[error("unrecognised partition strategy {0:?}")]
    UnrecognizedStrategy(String),

    #[error("invalid number of partitions: must be greater than zero, got {0}")]
    InvalidPartitionCount(usize),

    #[error("invalid subscription policy {0:?}")]
    UnrecognizedSubscriptionPolicy(String),

    #[error("invalid broker configuration: {}", join_violations(.0))]
    InvalidConfiguration(Vec<TopicViolation>),

    #[error("internal error: {0}")]
    Internal(String),
}

/// 错误分类，供协作方映射为自身的状态码
///
/// Error classification collaborators map onto their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    TopicNotFound,
    SubscriberNotFound,
    InvalidOffsetDelta,
    InvalidConfiguration,
    Internal,
}

impl BrokerError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BrokerError::TopicNotFound(_) => ErrorKind::TopicNotFound,
            BrokerError::SubscriberNotFound(_) => ErrorKind::SubscriberNotFound,
            BrokerError::InvalidOffsetDelta { .. } => ErrorKind::InvalidOffsetDelta,
            BrokerError::UnrecognizedStrategy(_)
            | BrokerError::InvalidPartitionCount(_)
            | BrokerError::UnrecognizedSubscriptionPolicy(_)
            | BrokerError::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            BrokerError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 锁中毒时转换为内部错误 / Turn a poisoned lock into an internal error.
    pub(crate) fn poisoned(what: &str) -> Self {
        BrokerError::Internal(format!("{} lock poisoned", what))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_errors_classify_as_configuration() {
        assert_eq!(BrokerError::UnrecognizedStrategy("x".into()).kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(BrokerError::InvalidPartitionCount(0).kind(), ErrorKind::InvalidConfiguration);
        assert_eq!(BrokerError::InvalidConfiguration(vec![]).kind(), ErrorKind::InvalidConfiguration);
    }

    #[test]
    fn aggregated_configuration_error_lists_every_topic() {
        let err = BrokerError::InvalidConfiguration(vec![
            TopicViolation { topic: "a".into(), reason: "bad".into() },
            TopicViolation { topic: "b".into(), reason: "worse".into() },
        ]);
        let text = err.to_string();
        assert!(text.contains("\"a\": bad"));
        assert!(text.contains("\"b\": worse"));
    }
}
