//! Configuração carregada a partir de `transform.toml`.
//!
//! A struct [`TransformConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `TRANSFORM_API_TOKEN` e `TRANSFORM_ENDPOINT` têm
//! precedência sobre o arquivo.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::TransformError;
use crate::job::RetryConfig;

pub const DEFAULT_CONFIG_FILE: &str = "transform.toml";

/// Configuração de nível superior carregada de `transform.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransformConfig {
    /// URL base do serviço de transformação.
    pub endpoint: String,

    /// Token bearer enviado em todas as chamadas.
    pub api_token: String,

    /// Diretório para payloads, logs de build e sessões de dependência.
    pub work_dir: PathBuf,

    pub poll_interval_ms: u64,

    /// Tempo máximo de espera pelo plano.
    pub plan_timeout_secs: u64,

    /// Tempo máximo de espera pela conclusão; 0 espera indefinidamente.
    pub job_timeout_secs: u64,

    pub upload_cooldown_ms: u64,
    pub start_cooldown_ms: u64,
    pub progress_refresh_ms: u64,

    /// Tentativas de resolução de dependência antes de desistir do job.
    pub max_hil_attempts: u32,

    /// Retentativas de consulta de status antes de marcar o job como falho.
    pub max_poll_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    pub base_delay_ms: u64,

    /// Executável Maven usado para listar versões de dependências.
    pub dependency_tool: String,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            api_token: String::new(),
            work_dir: std::env::temp_dir().join("transform"),
            poll_interval_ms: 5000,
            plan_timeout_secs: 1800,
            job_timeout_secs: 0,
            upload_cooldown_ms: 2000,
            start_cooldown_ms: 2000,
            progress_refresh_ms: 1000,
            max_hil_attempts: 3,
            max_poll_retries: 3,
            base_delay_ms: 1000,
            dependency_tool: "mvn".to_string(),
        }
    }
}

fn secs_or_unbounded(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl TransformConfig {
    /// Carrega a configuração de `transform.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    /// Como [`load`](Self::load), mas a partir de um caminho explícito.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            toml::from_str::<TransformConfig>(&contents)
                .with_context(|| format!("parsing {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Rejeita combinações que tornariam o polling ou as chamadas HTTP inválidos.
    pub fn validate(&self) -> Result<(), TransformError> {
        if !(self.endpoint.starts_with("http://") || self.endpoint.starts_with("https://")) {
            return Err(TransformError::Config(format!(
                "endpoint must be an http(s) URL, got {:?}",
                self.endpoint
            )));
        }
        if self.poll_interval_ms == 0 {
            return Err(TransformError::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    // Variáveis de ambiente têm precedência sobre o arquivo de configuração.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(token) = lookup("TRANSFORM_API_TOKEN")
            && !token.is_empty()
        {
            self.api_token = token;
        }
        if let Some(endpoint) = lookup("TRANSFORM_ENDPOINT")
            && !endpoint.is_empty()
        {
            self.endpoint = endpoint;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn plan_timeout(&self) -> Option<Duration> {
        secs_or_unbounded(self.plan_timeout_secs)
    }

    pub fn job_timeout(&self) -> Option<Duration> {
        secs_or_unbounded(self.job_timeout_secs)
    }

    pub fn upload_cooldown(&self) -> Duration {
        Duration::from_millis(self.upload_cooldown_ms)
    }

    pub fn start_cooldown(&self) -> Duration {
        Duration::from_millis(self.start_cooldown_ms)
    }

    pub fn progress_refresh(&self) -> Duration {
        Duration::from_millis(self.progress_refresh_ms)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_poll_retries,
            base_delay_ms: self.base_delay_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = TransformConfig::default();
        assert_eq!(config.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.plan_timeout(), Some(Duration::from_secs(1800)));
        assert_eq!(config.job_timeout(), None);
        assert_eq!(config.max_hil_attempts, 3);
        assert_eq!(config.retry_config().max_retries, 3);
        assert_eq!(config.dependency_tool, "mvn");
        assert!(config.api_token.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            endpoint = "https://transform.example.com"
            max_hil_attempts = 5
            job_timeout_secs = 600
        "#;
        let config: TransformConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.endpoint, "https://transform.example.com");
        assert_eq!(config.max_hil_attempts, 5);
        assert_eq!(config.job_timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.upload_cooldown_ms, 2000);
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("TRANSFORM_API_TOKEN", "tok-env"),
            ("TRANSFORM_ENDPOINT", ""),
        ]);
        let mut config: TransformConfig =
            toml::from_str(r#"api_token = "tok-file""#).unwrap();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.api_token, "tok-env");
        // Empty values leave the file setting alone.
        assert_eq!(config.endpoint, "http://localhost:8080");
    }

    #[test]
    fn load_from_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("transform.toml");
        std::fs::write(&path, "poll_interval_ms = 250\n").unwrap();
        let config = TransformConfig::load_from(&path).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn validate_rejects_bad_endpoint_and_zero_interval() {
        let mut config = TransformConfig {
            endpoint: "ftp://nope".into(),
            ..TransformConfig::default()
        };
        assert!(matches!(config.validate(), Err(TransformError::Config(_))));

        config.endpoint = "https://ok.example.com".into();
        config.poll_interval_ms = 0;
        assert!(matches!(config.validate(), Err(TransformError::Config(_))));
    }

    #[test]
    fn load_from_rejects_invalid_toml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("transform.toml");
        std::fs::write(&path, "poll_interval_ms = \"soon\"\n").unwrap();
        let err = TransformConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("parsing"));
    }
}
