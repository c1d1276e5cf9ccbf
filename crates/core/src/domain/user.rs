use serde::{Deserialize, Serialize};

use super::UserId;

/// A registered account. `password_hash` is a PHC-formatted Argon2 string.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
    pub password_hash: String,
    pub display_name: String,
    pub handle: Option<String>,
}
