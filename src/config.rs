use std::env;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

pub const DEFAULT_DRIVE_UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart";
pub const DEFAULT_DRIVE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_expiry_minutes: i64,
    pub cors_allowed_origin: Option<String>,
    pub drive_upload_url: String,
    pub drive_token_url: String,
    pub drive_client_id: Option<String>,
    pub drive_client_secret: Option<String>,
    pub drive_refresh_token: Option<String>,
    pub drive_folder_id: Option<String>,
    pub welcome_webhook_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
        let jwt_issuer = env::var("JWT_ISSUER").unwrap_or_else(|_| "hr-admin".to_string());
        let jwt_audience =
            env::var("JWT_AUDIENCE").unwrap_or_else(|_| "hr-admin-clients".to_string());
        let jwt_expiry_minutes = env::var("JWT_EXPIRY_MINUTES")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .context("JWT_EXPIRY_MINUTES must be an integer")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let drive_upload_url = env::var("DRIVE_UPLOAD_URL")
            .unwrap_or_else(|_| DEFAULT_DRIVE_UPLOAD_URL.to_string());
        Url::parse(&drive_upload_url).context("DRIVE_UPLOAD_URL must be a valid URL")?;
        let drive_token_url =
            env::var("DRIVE_TOKEN_URL").unwrap_or_else(|_| DEFAULT_DRIVE_TOKEN_URL.to_string());
        Url::parse(&drive_token_url).context("DRIVE_TOKEN_URL must be a valid URL")?;
        let drive_client_id = non_empty_var("DRIVE_CLIENT_ID");
        let drive_client_secret = non_empty_var("DRIVE_CLIENT_SECRET");
        let drive_refresh_token = non_empty_var("DRIVE_REFRESH_TOKEN");
        let drive_folder_id = non_empty_var("DRIVE_FOLDER_ID");
        let welcome_webhook_url = non_empty_var("WELCOME_WEBHOOK_URL");

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            jwt_expiry_minutes,
            cors_allowed_origin,
            drive_upload_url,
            drive_token_url,
            drive_client_id,
            drive_client_secret,
            drive_refresh_token,
            drive_folder_id,
            welcome_webhook_url,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }

    pub fn drive_configured(&self) -> bool {
        self.drive_client_id.is_some()
            && self.drive_client_secret.is_some()
            && self.drive_refresh_token.is_some()
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("*****"));
            }
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
