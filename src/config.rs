use std::env;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    /// Optional NATS broker; the service runs without one.
    pub nats_url: Option<String>,
    /// Bearer token guarding the /api/v1/admin routes.
    pub admin_token: Option<String>,
    pub port: u16,
    pub low_stock_threshold: i32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?,
            nats_url: env::var("NATS_URL").ok(),
            admin_token: env::var("ADMIN_TOKEN").ok(),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8083),
            low_stock_threshold: env::var("LOW_STOCK_THRESHOLD")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(10),
        })
    }

    pub fn admin_auth_enabled(&self) -> bool {
        self.admin_token.is_some()
    }
}
