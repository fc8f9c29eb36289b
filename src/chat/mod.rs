pub mod app_info;
pub mod client;
pub mod functions;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;

use crate::auth::extractor::AuthUser;
use crate::error::AppError;

pub use client::ChatClient;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// One message in an OpenAI-style conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl ChatMessage {
    pub fn function_result(outcome: &FunctionOutcome) -> Self {
        ChatMessage {
            role: "function".to_string(),
            content: Some(outcome.result.to_string()),
            name: Some(outcome.name.clone()),
            function_call: None,
        }
    }
}

/// A dispatched call and the JSON handed back to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FunctionOutcome {
    pub name: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub initial_response: ChatMessage,
    pub function_call: Option<FunctionOutcome>,
    pub final_response: Option<ChatMessage>,
}

#[derive(Debug)]
pub enum ChatError {
    NotConfigured,
    MissingFunctionCall,
    UnknownFunction(String),
    InvalidArguments(String),
    RateLimited,
    Upstream(String),
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatError::NotConfigured => write!(f, "Chat assistant is not configured"),
            ChatError::MissingFunctionCall => write!(f, "No function call in message"),
            ChatError::UnknownFunction(name) => write!(f, "Unknown function {name}"),
            ChatError::InvalidArguments(msg) => write!(f, "Invalid function arguments: {msg}"),
            ChatError::RateLimited => write!(f, "Chat provider rate limit exceeded"),
            ChatError::Upstream(msg) => write!(f, "Chat provider error: {msg}"),
        }
    }
}

impl std::error::Error for ChatError {}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::NotConfigured => AppError::Unavailable(err.to_string()),
            ChatError::MissingFunctionCall
            | ChatError::UnknownFunction(_)
            | ChatError::InvalidArguments(_) => AppError::BadRequest(err.to_string()),
            ChatError::RateLimited => AppError::RateLimited(err.to_string()),
            ChatError::Upstream(msg) => AppError::Internal(format!("Chat provider error: {msg}")),
        }
    }
}

/// Failure inside a function body. Reported to the model, never to the HTTP caller.
#[derive(Debug)]
pub struct FunctionError {
    pub message: String,
}

impl std::fmt::Display for FunctionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<String> for FunctionError {
    fn from(s: String) -> Self {
        FunctionError { message: s }
    }
}

impl From<&str> for FunctionError {
    fn from(s: &str) -> Self {
        FunctionError {
            message: s.to_string(),
        }
    }
}

impl From<serde_json::Error> for FunctionError {
    fn from(err: serde_json::Error) -> Self {
        FunctionError {
            message: err.to_string(),
        }
    }
}

impl From<crate::scheduling::SchedulingError> for FunctionError {
    fn from(err: crate::scheduling::SchedulingError) -> Self {
        FunctionError {
            message: err.to_string(),
        }
    }
}

impl From<crate::analytics::AnalyticsError> for FunctionError {
    fn from(err: crate::analytics::AnalyticsError) -> Self {
        FunctionError {
            message: err.to_string(),
        }
    }
}

/// Who a function runs for, and where it reads and writes.
pub struct ChatContext {
    pub pool: PgPool,
    pub caller: AuthUser,
}

#[async_trait]
pub trait ChatFunction: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON schema of the arguments object.
    fn parameters(&self) -> serde_json::Value;
    async fn execute(
        &self,
        ctx: &ChatContext,
        args: serde_json::Value,
    ) -> Result<serde_json::Value, FunctionError>;
}

pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn ChatFunction>>,
    order: Vec<String>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self {
            functions: HashMap::new(),
            order: Vec::new(),
        }
    }

    pub fn register(&mut self, function: Arc<dyn ChatFunction>) {
        let name = function.name().to_string();
        if self.functions.insert(name.clone(), function).is_none() {
            self.order.push(name);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ChatFunction>> {
        self.functions.get(name)
    }

    /// Function definitions in registration order, as sent with every completion.
    pub fn schemas(&self) -> Vec<serde_json::Value> {
        self.order
            .iter()
            .filter_map(|name| self.functions.get(name))
            .map(|f| {
                json!({
                    "name": f.name(),
                    "description": f.description(),
                    "parameters": f.parameters(),
                })
            })
            .collect()
    }
}

/// Run the function the assistant asked for.
///
/// A missing call, malformed arguments or an unregistered name are errors.
/// Anything that fails while the function runs becomes an
/// `{error: true, message}` result so the conversation can carry on.
pub async fn handle_function_call(
    registry: &FunctionRegistry,
    ctx: &ChatContext,
    message: &ChatMessage,
) -> Result<FunctionOutcome, ChatError> {
    let call = message
        .function_call
        .as_ref()
        .ok_or(ChatError::MissingFunctionCall)?;

    let args: serde_json::Value = if call.arguments.trim().is_empty() {
        json!({})
    } else {
        serde_json::from_str(&call.arguments)
            .map_err(|e| ChatError::InvalidArguments(e.to_string()))?
    };

    let function = registry
        .get(&call.name)
        .ok_or_else(|| ChatError::UnknownFunction(call.name.clone()))?;

    let result = match function.execute(ctx, args).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(function = %call.name, error = %e, "Chat function failed");
            json!({
                "error": true,
                "message": format!("Failed to execute {}: {}", call.name, e),
            })
        }
    };

    Ok(FunctionOutcome {
        name: call.name.clone(),
        result,
    })
}

/// Send `messages`; if the reply asks for a function, run it and send the
/// result back for a final answer.
pub async fn process_conversation(
    client: &ChatClient,
    registry: &FunctionRegistry,
    ctx: &ChatContext,
    mut messages: Vec<ChatMessage>,
) -> Result<Conversation, ChatError> {
    let schemas = registry.schemas();
    let initial = client.complete(&messages, &schemas).await?;

    if initial.function_call.is_none() {
        return Ok(Conversation {
            initial_response: initial,
            function_call: None,
            final_response: None,
        });
    }

    let outcome = handle_function_call(registry, ctx, &initial).await?;
    messages.push(initial.clone());
    messages.push(ChatMessage::function_result(&outcome));
    let final_response = client.complete(&messages, &schemas).await?;

    Ok(Conversation {
        initial_response: initial,
        function_call: Some(outcome),
        final_response: Some(final_response),
    })
}
