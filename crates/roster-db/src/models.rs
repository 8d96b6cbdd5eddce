//! Database row types — these map directly to SQLite rows.
//! Distinct from the roster-types API models so the DB layer stays
//! independent of the wire shapes.

use roster_credential::Credential;

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub is_admin: bool,
    pub password: String,
    pub salt: String,
    pub created_at: String,
}

impl UserRow {
    /// The stored credential pair for this user.
    pub fn credential(&self) -> Credential {
        Credential {
            hash: self.password.clone(),
            salt: self.salt.clone(),
        }
    }
}

/// Partial update applied by `update_user` — `None` fields are left
/// untouched. A password change arrives here already derived.
#[derive(Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub name: Option<String>,
    pub is_admin: Option<bool>,
    pub credential: Option<Credential>,
}
