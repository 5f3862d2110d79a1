use std::env;
use std::time::Duration;

#[derive(Clone)]
pub struct Config {
    /// Absent means the service runs on in-memory stores
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub server_host: String,
    pub server_port: u16,
    pub scan_reset_delay: Duration,
    pub max_top_up: f64,
}

impl Config {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            jwt_secret: env::var("JWT_SECRET")
                .expect("JWT_SECRET must be set"),
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .expect("SERVER_PORT must be a number"),
            scan_reset_delay: Duration::from_millis(
                env::var("SCAN_RESET_DELAY_MS")
                    .unwrap_or_else(|_| "2000".to_string())
                    .parse()
                    .expect("SCAN_RESET_DELAY_MS must be a number"),
            ),
            max_top_up: env::var("MAX_TOP_UP")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .expect("MAX_TOP_UP must be a number"),
        }
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
