use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub registration: RegistrationMode,
    pub max_body_size: usize,
    pub log_level: String,
    /// Account treated as super admin when it has no explicit role row.
    pub super_admin_email: Option<String>,
    pub chat_rate_limit: u32,
    /// Browser origins allowed to call the API. Empty disables CORS.
    pub cors_origins: Vec<String>,
    pub llm: Option<LlmConfig>,
    pub square: Option<SquareConfig>,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub max_retries: u32,
}

#[derive(Debug, Clone)]
pub struct SquareConfig {
    pub access_token: String,
    pub environment: SquareEnvironment,
    pub location_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SquareEnvironment {
    Sandbox,
    Production,
}

impl SquareEnvironment {
    pub fn api_base(&self) -> &'static str {
        match self {
            SquareEnvironment::Sandbox => "https://connect.squareupsandbox.com",
            SquareEnvironment::Production => "https://connect.squareup.com",
        }
    }

    pub fn dashboard_base(&self) -> &'static str {
        match self {
            SquareEnvironment::Sandbox => "https://squareupsandbox.com",
            SquareEnvironment::Production => "https://squareup.com",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RegistrationMode {
    Open,
    Closed,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let jwt_secret = env_required("JWT_SECRET")?;

        let host: IpAddr = env_or("BOOKSMARTLY_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid BOOKSMARTLY_HOST: {e}"))?;

        let port: u16 = env_or("BOOKSMARTLY_PORT", "3000")
            .parse()
            .map_err(|e| format!("Invalid BOOKSMARTLY_PORT: {e}"))?;

        let base_url = env_or("BOOKSMARTLY_BASE_URL", &format!("http://{host}:{port}"));

        let registration = match env_or("BOOKSMARTLY_REGISTRATION", "open").as_str() {
            "closed" => RegistrationMode::Closed,
            _ => RegistrationMode::Open,
        };

        let max_body_size: usize = env_or("BOOKSMARTLY_MAX_BODY_SIZE", "2097152")
            .parse()
            .map_err(|e| format!("Invalid BOOKSMARTLY_MAX_BODY_SIZE: {e}"))?;

        let log_level = env_or("BOOKSMARTLY_LOG_LEVEL", "info");

        let super_admin_email = std::env::var("BOOKSMARTLY_SUPER_ADMIN_EMAIL")
            .ok()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        let chat_rate_limit: u32 = env_or("BOOKSMARTLY_CHAT_RATE_LIMIT", "20")
            .parse()
            .map_err(|e| format!("Invalid BOOKSMARTLY_CHAT_RATE_LIMIT: {e}"))?;

        let cors_origins = parse_origins(&env_or("BOOKSMARTLY_CORS_ORIGINS", ""));

        let llm = match std::env::var("OPENAI_API_KEY").ok() {
            Some(api_key) if !api_key.is_empty() => Some(LlmConfig {
                api_key,
                model: env_or("OPENAI_MODEL", "gpt-4o-mini"),
                base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
                max_retries: env_or("OPENAI_MAX_RETRIES", "3")
                    .parse()
                    .map_err(|e| format!("Invalid OPENAI_MAX_RETRIES: {e}"))?,
            }),
            _ => None,
        };

        let square = match (
            std::env::var("SQUARE_ACCESS_TOKEN").ok(),
            std::env::var("SQUARE_LOCATION_ID").ok(),
        ) {
            (Some(access_token), Some(location_id)) => {
                let environment = match env_or("SQUARE_ENVIRONMENT", "sandbox").as_str() {
                    "production" => SquareEnvironment::Production,
                    _ => SquareEnvironment::Sandbox,
                };
                Some(SquareConfig {
                    access_token,
                    environment,
                    location_id,
                    base_url: env_or("SQUARE_BASE_URL", environment.api_base()),
                })
            }
            _ => None,
        };

        Ok(Config {
            database_url,
            jwt_secret,
            host,
            port,
            base_url,
            registration,
            max_body_size,
            log_level,
            super_admin_email,
            chat_rate_limit,
            cors_origins,
            llm,
            square,
        })
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|o| o.trim().trim_end_matches('/').to_string())
        .filter(|o| !o.is_empty())
        .collect()
}
