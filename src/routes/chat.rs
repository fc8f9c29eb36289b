use axum::Json;
use axum::extract::State;
use serde::Deserialize;

use crate::auth::extractor::AuthUser;
use crate::chat::{self, ChatContext, ChatError, ChatMessage, Conversation, FunctionOutcome};
use crate::error::AppError;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Deserialize)]
pub struct FunctionRequest {
    pub message: ChatMessage,
}

fn check_rate(state: &SharedState, auth: &AuthUser) -> Result<(), AppError> {
    state.chat_limiter.check(auth.user_id).map_err(|retry_after| {
        AppError::RateLimited(format!(
            "Too many chat requests. Try again in {retry_after} seconds."
        ))
    })
}

fn context(state: &SharedState, auth: AuthUser) -> ChatContext {
    ChatContext {
        pool: state.pool.clone(),
        caller: auth,
    }
}

pub async fn converse(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<Conversation>, AppError> {
    let client = state.llm.as_ref().ok_or(ChatError::NotConfigured)?;
    if req.messages.is_empty() {
        return Err(AppError::BadRequest("messages must not be empty".to_string()));
    }
    check_rate(&state, &auth)?;

    let ctx = context(&state, auth);
    let conversation =
        chat::process_conversation(client, &state.functions, &ctx, req.messages).await?;
    Ok(Json(conversation))
}

/// Dispatch one assistant message that carries a function call.
pub async fn function(
    auth: AuthUser,
    State(state): State<SharedState>,
    Json(req): Json<FunctionRequest>,
) -> Result<Json<FunctionOutcome>, AppError> {
    check_rate(&state, &auth)?;

    let ctx = context(&state, auth);
    let outcome = chat::handle_function_call(&state.functions, &ctx, &req.message).await?;
    Ok(Json(outcome))
}
