use crate::auth::extractor::AuthUser;
use crate::response::ApiResponse;

pub const WELCOME_MESSAGE: &str = "Welcome to the server! 🚀 Your backend is up and running.";

pub async fn welcome(_auth: AuthUser) -> ApiResponse {
    ApiResponse::ok(WELCOME_MESSAGE)
}
