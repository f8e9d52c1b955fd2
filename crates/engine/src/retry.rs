//! LLM-call retry classification and backoff for the sub-agent (§4.3) and
//! orchestrator loops. Distinct from [`dr_providers::RateGate`], which
//! serialises and retries *search* dispatches — this is plain
//! attempt-then-sleep, one agent at a time, no shared queue.

use dr_domain::error::Error;
use dr_domain::model::AgentErrorType;
use std::time::Duration;

pub fn classify(error: &Error) -> AgentErrorType {
    match error {
        Error::Auth(_) => AgentErrorType::AuthError,
        Error::Provider { message, .. } => {
            let lower = message.to_lowercase();
            if lower.contains("429") || lower.contains("rate limit") {
                AgentErrorType::RateLimit
            } else if lower.contains("400") || lower.contains("bad request") {
                AgentErrorType::BadRequest
            } else if lower.contains("500")
                || lower.contains("502")
                || lower.contains("503")
                || lower.contains("504")
            {
                AgentErrorType::ServerError
            } else {
                AgentErrorType::Unknown
            }
        }
        Error::Http(_) | Error::Timeout(_) => AgentErrorType::ServerError,
        _ => AgentErrorType::Unknown,
    }
}

/// `delay = base × 2^(attempt-1)`, `attempt` is 1-based. Base is 5s for
/// rate limits, 2s otherwise.
pub fn backoff(error_type: AgentErrorType, attempt: u32) -> Duration {
    let base = if error_type == AgentErrorType::RateLimit { 5 } else { 2 };
    let exponent = attempt.saturating_sub(1);
    Duration::from_secs(base * 2u64.saturating_pow(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_rate_limit_from_message() {
        let err = Error::Provider {
            provider: "anthropic".into(),
            message: "HTTP 429 rate limit exceeded".into(),
        };
        assert_eq!(classify(&err), AgentErrorType::RateLimit);
    }

    #[test]
    fn classifies_auth_error() {
        assert_eq!(classify(&Error::Auth("bad key".into())), AgentErrorType::AuthError);
    }

    #[test]
    fn standard_backoff_doubles_from_two_seconds() {
        assert_eq!(backoff(AgentErrorType::ServerError, 1), Duration::from_secs(2));
        assert_eq!(backoff(AgentErrorType::ServerError, 2), Duration::from_secs(4));
        assert_eq!(backoff(AgentErrorType::ServerError, 3), Duration::from_secs(8));
    }

    #[test]
    fn rate_limit_backoff_doubles_from_five_seconds() {
        assert_eq!(backoff(AgentErrorType::RateLimit, 1), Duration::from_secs(5));
        assert_eq!(backoff(AgentErrorType::RateLimit, 2), Duration::from_secs(10));
    }
}
