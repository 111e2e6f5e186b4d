use serde::{Deserialize, Serialize};

/// A user event as published on the subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: u64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub gender: String,
    pub ip_address: String,
}

impl User {
    /// Partition key: events for one user stay on one partition.
    pub fn partition_key(&self) -> String {
        self.id.to_string()
    }
}
