pub mod error;
pub mod login;
pub mod middleware;
pub mod pagination;
pub mod users;
pub mod validate;

use std::sync::Arc;

use roster_credential::CredentialManager;
use roster_db::Database;
use roster_notify::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub credentials: CredentialManager,
    pub notifier: Notifier,
    pub jwt_secret: String,
}
