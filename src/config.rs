use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_hours: i64,
    pub cookie_ttl_hours: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub smtp: SmtpConfig,
    pub s3_endpoint: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub public_base_url: String,
    pub production: bool,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER")
                .unwrap_or_else(|_| "https://sellz-backend.com".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "https://sellz.com".into()),
            ttl_hours: std::env::var("JWT_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
            cookie_ttl_hours: std::env::var("JWT_COOKIE_TTL_HOURS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(24),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST")?,
            port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse::<u16>().ok())
                .unwrap_or(587),
            username: std::env::var("SMTP_USERNAME").unwrap_or_default(),
            password: std::env::var("SMTP_PASSWORD").unwrap_or_default(),
            from: std::env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@sellz.com".into()),
        };
        Ok(Self {
            database_url,
            jwt,
            smtp,
            s3_endpoint: std::env::var("S3_ENDPOINT")?,
            s3_bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "sellz-uploads".into()),
            s3_access_key: std::env::var("S3_ACCESS_KEY")?,
            s3_secret_key: std::env::var("S3_SECRET_KEY")?,
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".into()),
            production: std::env::var("APP_ENV")
                .map(|v| v == "production")
                .unwrap_or(false),
        })
    }
}
