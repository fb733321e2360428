pub mod health;
pub mod prewarm;
pub mod recommendations;

pub use health::health_check;
pub use prewarm::prewarm as prewarm_endpoint;
pub use recommendations::recommendations_config;
