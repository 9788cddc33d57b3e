//! Tipos de dados trocados com o serviço remoto de transformação.
//!
//! Todas as structs derivam `Serialize`/`Deserialize` com nomes em camelCase,
//! o formato JSON usado pelo [`RemoteClient`](super::RemoteClient).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::job::TransformationType;

/// Status de um job como reportado pelo serviço remoto.
///
/// Strings desconhecidas são preservadas em [`RemoteStatus::Unknown`] em vez
/// de falhar a desserialização; nenhum alvo de polling as aceita.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RemoteStatus {
    Created,
    Accepted,
    Rejected,
    Started,
    Preparing,
    Prepared,
    Planning,
    Planned,
    Transforming,
    Transformed,
    Paused,
    Resumed,
    PartiallyCompleted,
    Completed,
    Stopping,
    Stopped,
    Failed,
    Unknown(String),
}

impl RemoteStatus {
    pub fn as_str(&self) -> &str {
        match self {
            RemoteStatus::Created => "CREATED",
            RemoteStatus::Accepted => "ACCEPTED",
            RemoteStatus::Rejected => "REJECTED",
            RemoteStatus::Started => "STARTED",
            RemoteStatus::Preparing => "PREPARING",
            RemoteStatus::Prepared => "PREPARED",
            RemoteStatus::Planning => "PLANNING",
            RemoteStatus::Planned => "PLANNED",
            RemoteStatus::Transforming => "TRANSFORMING",
            RemoteStatus::Transformed => "TRANSFORMED",
            RemoteStatus::Paused => "PAUSED",
            RemoteStatus::Resumed => "RESUMED",
            RemoteStatus::PartiallyCompleted => "PARTIALLY_COMPLETED",
            RemoteStatus::Completed => "COMPLETED",
            RemoteStatus::Stopping => "STOPPING",
            RemoteStatus::Stopped => "STOPPED",
            RemoteStatus::Failed => "FAILED",
            RemoteStatus::Unknown(raw) => raw,
        }
    }

    /// Estados dos quais o job remoto não se recupera.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Failed
                | RemoteStatus::Stopping
                | RemoteStatus::Stopped
                | RemoteStatus::Rejected
        )
    }

    /// `COMPLETED` ou `PARTIALLY_COMPLETED`.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            RemoteStatus::Completed | RemoteStatus::PartiallyCompleted
        )
    }

    pub fn is_terminal(&self) -> bool {
        self.is_success() || self.is_failure()
    }
}

impl From<&str> for RemoteStatus {
    fn from(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "CREATED" => RemoteStatus::Created,
            "ACCEPTED" => RemoteStatus::Accepted,
            "REJECTED" => RemoteStatus::Rejected,
            "STARTED" => RemoteStatus::Started,
            "PREPARING" => RemoteStatus::Preparing,
            "PREPARED" => RemoteStatus::Prepared,
            "PLANNING" => RemoteStatus::Planning,
            "PLANNED" => RemoteStatus::Planned,
            "TRANSFORMING" => RemoteStatus::Transforming,
            "TRANSFORMED" => RemoteStatus::Transformed,
            "PAUSED" => RemoteStatus::Paused,
            "RESUMED" => RemoteStatus::Resumed,
            "PARTIALLY_COMPLETED" => RemoteStatus::PartiallyCompleted,
            "COMPLETED" => RemoteStatus::Completed,
            "STOPPING" => RemoteStatus::Stopping,
            "STOPPED" => RemoteStatus::Stopped,
            "FAILED" => RemoteStatus::Failed,
            _ => RemoteStatus::Unknown(raw.to_string()),
        }
    }
}

impl From<String> for RemoteStatus {
    fn from(raw: String) -> Self {
        RemoteStatus::from(raw.as_str())
    }
}

impl From<RemoteStatus> for String {
    fn from(status: RemoteStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resposta de `GET /jobs/{id}`: o status e, em falhas, o motivo reportado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: RemoteStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusReport {
    pub fn new(status: RemoteStatus) -> Self {
        Self {
            status,
            reason: None,
        }
    }
}

/// Tipo de artefato enviado no meio de um job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UploadArtifactType {
    Dependencies,
}

/// Contexto que associa um upload a um job já em execução.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadContext {
    pub job_id: String,
    pub upload_artifact_type: UploadArtifactType,
}

/// Corpo de `POST /uploads`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRequest {
    /// SHA-256 do payload em hexadecimal.
    pub content_checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_context: Option<UploadContext>,
}

/// Destino de upload emitido pelo serviço.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    pub upload_id: String,
    pub upload_url: String,
}

/// Corpo de `POST /jobs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobRequest {
    pub upload_id: String,
    pub transformation_type: TransformationType,
    pub source: String,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartJobResponse {
    pub job_id: String,
}

/// Plano de transformação: passos ordenados, cada um com atualizações de progresso.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransformationPlan {
    #[serde(default)]
    pub steps: Vec<TransformationStep>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformationStep {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub progress_updates: Vec<ProgressUpdate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub download_artifacts: Vec<DownloadArtifact>,
}

/// Artefato anunciado pelo plano. Ambos os campos podem faltar na resposta.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadArtifact {
    #[serde(default)]
    pub download_artifact_id: Option<String>,
    #[serde(default)]
    pub download_artifact_type: Option<String>,
}

/// Referência validada a um artefato para download (id e tipo presentes).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactRef {
    pub id: String,
    pub kind: String,
}

/// Resultado enviado ao retomar um job pausado.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResumeOutcome {
    Completed,
    Rejected,
}

impl fmt::Display for ResumeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResumeOutcome::Completed => write!(f, "COMPLETED"),
            ResumeOutcome::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Corpo de `POST /jobs/{id}/resume`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRequest {
    pub user_action_status: ResumeOutcome,
}
