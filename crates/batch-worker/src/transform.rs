//! Per-record transformation
//!
//! The business logic of a deployment lives behind [`Transform`]. It must be
//! pure: redelivered messages are reprocessed from scratch, and the uploaded
//! result is only idempotent if the same input always yields the same output.

use serde_json::Value;

/// Maps one parsed record to one output record
pub trait Transform: Send + Sync {
    fn apply(&self, record: Value) -> Value;
}

/// Returns every record unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity;

impl Transform for Identity {
    fn apply(&self, record: Value) -> Value {
        record
    }
}

impl<F> Transform for F
where
    F: Fn(Value) -> Value + Send + Sync,
{
    fn apply(&self, record: Value) -> Value {
        self(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity() {
        let record = json!({"id": 1, "tags": ["a", "b"]});
        assert_eq!(Identity.apply(record.clone()), record);
    }

    #[test]
    fn test_closure_transform() {
        let add_flag = |mut record: Value| {
            record["seen"] = json!(true);
            record
        };
        assert_eq!(add_flag.apply(json!({"id": 7})), json!({"id": 7, "seen": true}));
    }

    #[test]
    fn test_boxed_transform() {
        let transform: Box<dyn Transform> = Box::new(Identity);
        assert_eq!(transform.apply(json!(null)), json!(null));
    }
}
