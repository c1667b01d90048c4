use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// 32-bit multiplicative string hash rendered as hex.
///
/// Only good enough to tell accounts apart on a shared machine. Do not reuse
/// it for anything that needs to resist an attacker.
pub fn toy_password_hash(password: &str) -> String {
    let hash = password
        .chars()
        .fold(0i32, |acc, c| acc.wrapping_mul(31).wrapping_add(c as i32));
    format!("{:08x}", hash as u32)
}
