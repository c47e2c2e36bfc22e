pub mod breaker;
pub mod service;
pub mod types;

pub use breaker::{CallPermit, CircuitBreaker};
pub use service::CircuitBreakerService;
pub use types::{CircuitBreakerConfig, CircuitBreakerMetrics, CircuitState};
