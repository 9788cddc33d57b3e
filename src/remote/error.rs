//! Erros do cliente do serviço remoto de transformação.
//!
//! O corpo de uma resposta de erro é preservado em [`RemoteError::Api`]
//! porque é dele que sai a classificação das falhas de início de job.
//! Um HTTP 429 vira [`RemoteError::RateLimited`] e carrega a espera pedida
//! pelo servidor, que o laço de polling respeita como piso do backoff.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// HTTP 429. `retry_after_ms` vem do cabeçalho `retry-after`.
    #[error("rate limited by the transformation service, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Resposta 4xx/5xx com o corpo devolvido pelo serviço.
    #[error("service returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Network(#[from] reqwest::Error),
}

impl RemoteError {
    /// Espera mínima pedida pelo servidor antes da próxima chamada.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            RemoteError::RateLimited { retry_after_ms } => {
                Some(Duration::from_millis(*retry_after_ms))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_rate_limits_carry_a_wait() {
        let limited = RemoteError::RateLimited {
            retry_after_ms: 2000,
        };
        assert_eq!(limited.retry_after(), Some(Duration::from_secs(2)));

        let unavailable = RemoteError::Api {
            status: 503,
            message: "unavailable".into(),
        };
        assert_eq!(unavailable.retry_after(), None);
    }

    #[test]
    fn api_error_keeps_service_body() {
        let err = RemoteError::Api {
            status: 400,
            message: "Too many active running jobs".into(),
        };
        assert!(err.to_string().ends_with("Too many active running jobs"));
    }
}
