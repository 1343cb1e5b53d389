use serde::{Deserialize, Serialize};
use stripelock_common::prelude::*;
use uuid::Uuid;

/// Value stored under `<keyPrefix><name>` while a lock is held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// Ownership token of the acquisition that wrote this record.
    pub id: Uuid,
    /// Acquiring thread, diagnostics only.
    pub thread_id: u64,
}

impl LockRecord {
    pub fn new(id: Uuid, thread_id: u64) -> Self {
        Self { id, thread_id }
    }

    pub fn encode(&self) -> LockResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(value: &str) -> LockResult<Self> {
        serde_json::from_str(value)
            .map_err(|e| ErrorCode::IllegalArgument(format!("invalid lock record {}: {}", value, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_camel_case_fields() {
        let id = Uuid::parse_str("67e55044-10b1-426f-9247-bb680e5fe0c8").expect("valid uuid");
        let encoded = LockRecord::new(id, 7).encode().expect("encode failed");
        assert_eq!(
            encoded,
            r#"{"id":"67e55044-10b1-426f-9247-bb680e5fe0c8","threadId":7}"#
        );
        assert_eq!(
            LockRecord::decode(&encoded).expect("decode failed"),
            LockRecord::new(id, 7)
        );
    }

    #[test]
    fn rejects_foreign_values() {
        for value in ["", "locked", r#"{"id":"not-a-uuid","threadId":1}"#, r#"{"threadId":1}"#] {
            let err = LockRecord::decode(value).unwrap_err();
            assert_eq!(err.code(), ErrorCode::IllegalArgumentCode());
        }
    }
}
