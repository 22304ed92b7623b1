// Authentication module
// Manages the OCP credential lifecycle: acquire, refresh, revoke, probe

mod clock;
mod grant;
mod manager;
mod session;
mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use manager::AuthManager;
pub use session::{with_session, AuthSession};
pub use types::{
    AccessToken, AuthSettings, Credentials, RevokeOutcome, TokenResponse, TokenState,
    DEFAULT_CLIENT_ID, DEFAULT_PROBE_PATH,
};
