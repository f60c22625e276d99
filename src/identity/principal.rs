use serde::{Deserialize, Serialize};

use crate::credentials::UserRecord;

/// User reference carried by a session and exposed to downstream handlers.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub user_id: String,
    pub username: String,
    #[serde(default)]
    pub role: String,
}

impl From<UserRecord> for Principal {
    fn from(rec: UserRecord) -> Self {
        Self { user_id: rec.id, username: rec.username, role: rec.role }
    }
}
