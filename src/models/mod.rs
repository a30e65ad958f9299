pub mod identity;
pub mod record;
pub mod session;

pub use identity::Identity;
pub use record::{AuthorizationRecord, RecordDefaults, Role};
pub use session::{SessionPhase, SessionState};
