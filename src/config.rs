use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Settings for the outbound mail API. Absent when mail is not configured,
/// in which case delivery is skipped rather than failed.
#[derive(Debug, Clone, Deserialize)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from_address: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub mail: Option<MailConfig>,
    /// Base URL the password-reset link is built against.
    pub frontend_base_url: String,
    pub otp_ttl_minutes: i64,
    pub reset_ttl_minutes: i64,
    /// Echo plaintext OTP / reset tokens in JSON responses. Local testing
    /// only; must stay off in production builds.
    pub debug_tokens: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "learnhub".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "learnhub-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 7),
        };
        let mail = match (std::env::var("MAIL_API_URL"), std::env::var("MAIL_API_KEY")) {
            (Ok(api_url), Ok(api_key)) => Some(MailConfig {
                api_url,
                api_key,
                from_address: std::env::var("MAIL_FROM")
                    .unwrap_or_else(|_| "no-reply@learnhub.app".into()),
            }),
            _ => None,
        };
        Ok(Self {
            database_url,
            jwt,
            mail,
            frontend_base_url: std::env::var("FRONTEND_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:3000".into()),
            otp_ttl_minutes: std::env::var("OTP_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(10),
            reset_ttl_minutes: std::env::var("RESET_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(10),
            debug_tokens: std::env::var("DEBUG_TOKENS")
                .map(|v| v == "1" || v == "true")
                .unwrap_or(false),
        })
    }
}
