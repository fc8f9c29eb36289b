use std::sync::Arc;

use sqlx::PgPool;

use crate::chat::{ChatClient, FunctionRegistry};
use crate::config::Config;
use crate::invoicing::SquareClient;
use crate::rate_limit::{ChatRateLimiter, LoginRateLimiter};

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub functions: FunctionRegistry,
    /// Absent when no LLM key is configured.
    pub llm: Option<ChatClient>,
    /// Absent when Square credentials are not configured.
    pub square: Option<SquareClient>,
    pub login_limiter: LoginRateLimiter,
    pub chat_limiter: ChatRateLimiter,
}
