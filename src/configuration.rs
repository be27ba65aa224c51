use std::time::Duration;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    fn example_data(&self) -> bool;
    fn database_retry_interval(&self) -> Duration;
}
