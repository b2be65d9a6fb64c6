use std::sync::Arc;

use crate::oauth::OAuthClient;
use crate::remote::RemoteClient;
use crate::security::RefreshLocks;
use crate::session::SessionStore;

#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionStore>,
    pub oauth: OAuthClient,
    pub remote: RemoteClient,
    /// Mark the session cookie `Secure`. Needed whenever the app is served over HTTPS.
    pub secure_cookies: bool,
    pub refresh_locks: Arc<RefreshLocks>,
}
