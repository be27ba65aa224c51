use crate::configuration::Configuration;
use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Booking service for personal training sessions")]
pub struct ConfigurationHandler {
    /// Port the HTTP server listens on
    #[arg(short, long, env = "PORT", default_value = "3000")]
    port: String,

    /// PostgreSQL connection string. Without it slots and bookings are kept in memory only
    #[arg(short, long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Load demo users, slots and messages into the in-memory store
    #[arg(short, long, default_value_t = false)]
    example_data: bool,

    /// Seconds to wait before retrying a failed database connection
    #[arg(long, default_value_t = 1)]
    database_retry_secs: u64,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn example_data(&self) -> bool {
        self.example_data
    }

    fn database_retry_interval(&self) -> Duration {
        Duration::from_secs(self.database_retry_secs)
    }
}
