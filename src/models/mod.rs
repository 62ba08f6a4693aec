pub mod audit_event;
pub mod password_reset;
pub mod refresh_token;
pub mod role;
pub mod user;

pub use audit_event::AuditEvent;
pub use password_reset::PasswordReset;
pub use refresh_token::RefreshToken;
pub use role::Role;
pub use user::{User, UserListRow, UserWithRole};
