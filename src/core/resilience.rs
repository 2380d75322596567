// Circuit breaker for outbound calls

use crate::core::errors::QhseError;
use failsafe::futures::CircuitBreaker;
use failsafe::{backoff, failure_policy, Config, Error, StateMachine};
use std::time::Duration;

/// Circuit breaker guarding external services
///
/// Policy:
/// - 5 consecutive failures trips the breaker OPEN
/// - 5 seconds cool-down before HALF-OPEN
pub type ServiceCircuitBreaker = StateMachine<
    failure_policy::ConsecutiveFailures<backoff::Constant>,
    ()
>;

/// Create a new circuit breaker with the standard policy
pub fn create_circuit_breaker() -> ServiceCircuitBreaker {
    Config::new()
        .failure_policy(failure_policy::consecutive_failures(
            5,
            backoff::constant(Duration::from_secs(5)),
        ))
        .build()
}

/// Run `operation` under the breaker
///
/// Inner failures map to `DependencyFailure`, rejections to `TransientError`.
pub async fn execute_with_cb<F, Fut, T, E>(
    cb: &ServiceCircuitBreaker,
    service: &str,
    operation: F,
) -> Result<T, QhseError>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display + std::fmt::Debug + Send + Sync + 'static,
{
    match cb.call(operation()).await {
        Ok(val) => Ok(val),
        Err(Error::Inner(e)) => Err(QhseError::DependencyFailure {
            service: service.to_string(),
            error: e.to_string(),
        }),
        Err(Error::Rejected) => Err(QhseError::TransientError(format!(
            "Circuit breaker open for {}",
            service
        ))),
    }
}
