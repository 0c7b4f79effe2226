// Middleware for resilient provider calls
//
// Remote providers are wrapped in a circuit breaker so a dead endpoint is
// skipped in favour of local compositing.

pub mod circuit_breaker;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
