use std::net::IpAddr;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub server_url: String,
    pub client_url: Option<String>,
    pub access_token: TokenConfig,
    pub refresh_token_expiry_secs: i64,
    pub max_body_size: usize,
    pub log_level: String,
    pub mail: MailConfig,
    pub s3: Option<S3Config>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct TokenConfig {
    pub secret: String,
    pub expiry_secs: i64,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub sender_name: String,
    pub sender_email: String,
    pub provider: MailProvider,
}

impl MailConfig {
    /// `"Name" <address>` as used in the From header.
    pub fn from_header(&self) -> String {
        format!("\"{}\" <{}>", self.sender_name, self.sender_email)
    }
}

#[derive(Debug, Clone)]
pub enum MailProvider {
    Resend { api_key: String },
    Smtp(SmtpConfig),
    Log,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub secure: bool,
    pub user: String,
    pub pass: String,
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub access_key: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub sign_expiry_secs: u64,
}

#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
    pub name: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;
        let access_secret = env_required("ACCESS_TOKEN_SECRET")?;

        let host: IpAddr = env_or("APP_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid APP_HOST: {e}"))?;

        let port: u16 = env_parse("PORT", "8000")?;

        let server_url = env_or("SERVER_URL", &format!("http://{host}:{port}"));
        let client_url = env_optional("CLIENT_URL");

        let access_token = TokenConfig {
            secret: access_secret,
            expiry_secs: env_parse("ACCESS_TOKEN_EXPIRY", "3600")?,
        };
        let refresh_token_expiry_secs = env_parse("REFRESH_TOKEN_EXPIRY", "86400")?;

        let max_body_size: usize = env_parse("MAX_BODY_SIZE", "1048576")?;
        let log_level = env_or("LOG_LEVEL", "info");

        let mail = MailConfig {
            sender_name: env_or("SENDER_NAME", "OpenBrief"),
            sender_email: env_or("SENDER_EMAIL", "no-reply@localhost"),
            provider: mail_provider_from_env()?,
        };

        let s3 = match (
            env_optional("BUCKET_REGION"),
            env_optional("ACCESS_KEY"),
            env_optional("SECRET_ACCESS_KEY"),
            env_optional("BUCKET_NAME"),
        ) {
            (Some(region), Some(access_key), Some(secret_access_key), Some(bucket)) => {
                Some(S3Config {
                    region,
                    access_key,
                    secret_access_key,
                    bucket,
                    sign_expiry_secs: env_parse("SIGN_EXPIRY_TIME", "3600")?,
                })
            }
            _ => None,
        };

        let bootstrap_admin = match (
            env_optional("BOOTSTRAP_ADMIN_EMAIL"),
            env_optional("BOOTSTRAP_ADMIN_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapAdmin {
                email,
                password,
                name: env_or("BOOTSTRAP_ADMIN_NAME", "Administrator"),
            }),
            _ => None,
        };

        Ok(Config {
            database_url,
            host,
            port,
            server_url,
            client_url,
            access_token,
            refresh_token_expiry_secs,
            max_body_size,
            log_level,
            mail,
            s3,
            bootstrap_admin,
        })
    }
}

fn mail_provider_from_env() -> Result<MailProvider, String> {
    let explicit = env_optional("MAIL_PROVIDER").map(|p| p.to_lowercase());
    let resend_key = env_optional("RESEND_API_KEY");

    match (explicit.as_deref(), resend_key) {
        (Some("resend"), Some(api_key)) | (None, Some(api_key)) => {
            Ok(MailProvider::Resend { api_key })
        }
        (Some("resend"), None) => {
            Err("MAIL_PROVIDER=resend requires RESEND_API_KEY".to_string())
        }
        (Some("smtp"), _) => Ok(MailProvider::Smtp(SmtpConfig {
            host: env_required("SENDER_HOST")?,
            port: env_parse("SENDER_PORT", "587")?,
            secure: env_or("IS_SENDER_SECURE", "false") == "true",
            user: env_required("SENDER_EMAIL")?,
            pass: env_required("SENDER_EMAIL_PASSWORD")?,
        })),
        (Some("log"), _) | (None, None) => Ok(MailProvider::Log),
        (Some(other), _) => Err(format!("Invalid MAIL_PROVIDER: {other}")),
    }
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_optional(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_or(key, default)
        .parse()
        .map_err(|e| format!("Invalid {key}: {e}"))
}
