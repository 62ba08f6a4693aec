pub mod audit;
pub mod password_resets;
pub mod refresh_tokens;
pub mod roles;
pub mod users;
