//! 请求校验：核心假定这些约束已在上游保证
//!
//! Request validation. The broker core assumes these constraints hold, so
//! the transport rejects violating requests before calling in.

use super::protocol::{FieldViolation, FrameMeta, WireMessage};

fn required(present: bool, field: &str, violations: &mut Vec<FieldViolation>) {
    if !present {
        violations.push(FieldViolation::new(field, FieldViolation::REQUIRED_FIELD));
    }
}

fn at_least_one(value: Option<i64>, field: &str, violations: &mut Vec<FieldViolation>) {
    match value {
        None => violations.push(FieldViolation::new(field, FieldViolation::REQUIRED_FIELD)),
        Some(v) if v < 1 => violations.push(FieldViolation::new(field, FieldViolation::OUT_OF_RANGE)),
        Some(_) => {}
    }
}

pub fn validate_publish(meta: &FrameMeta, messages: &[WireMessage]) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    required(meta.topic.is_some(), "topic", &mut violations);
    if messages.is_empty() {
        violations.push(FieldViolation::new("messages", FieldViolation::OUT_OF_RANGE));
    }
    for (i, message) in messages.iter().enumerate() {
        match &message.payload {
            None => violations.push(FieldViolation::new(format!("messages[{}].payload", i), FieldViolation::REQUIRED_FIELD)),
            Some(p) if p.is_empty() => {
                violations.push(FieldViolation::new(format!("messages[{}].payload", i), FieldViolation::OUT_OF_RANGE))
            }
            Some(_) => {}
        }
    }
    violations
}

pub fn validate_subscribe(meta: &FrameMeta) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    required(meta.topic.is_some(), "topic", &mut violations);
    required(meta.group.is_some(), "group", &mut violations);
    violations
}

pub fn validate_poll(meta: &FrameMeta) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    required(meta.subscriber_id.is_some(), "subscriber_id", &mut violations);
    at_least_one(meta.limit, "limit", &mut violations);
    violations
}

pub fn validate_move_offset(meta: &FrameMeta) -> Vec<FieldViolation> {
    let mut violations = Vec::new();
    required(meta.subscriber_id.is_some(), "subscriber_id", &mut violations);
    at_least_one(meta.delta, "delta", &mut violations);
    violations
}
