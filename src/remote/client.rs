use std::time::Duration;

use reqwest::{Client, Response};
use tracing::debug;

use super::error::RemoteError;
use super::service::TransformService;
use super::types::{
    ArtifactRef, ResumeOutcome, ResumeRequest, StartJobRequest, StartJobResponse, StatusReport,
    TransformationPlan, UploadContext, UploadRequest, UploadTarget,
};

/// HTTP client for the transformation service.
pub struct RemoteClient {
    api_token: String,
    client: Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: &str, api_token: &str) -> Result<Self, RemoteError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(120))
            .build()?;
        Ok(Self {
            api_token: api_token.to_string(),
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Map non-success responses onto [`RemoteError`].
    async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(1000);
            return Err(RemoteError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RemoteError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }
}

impl TransformService for RemoteClient {
    async fn create_upload_target(&self, req: &UploadRequest) -> Result<UploadTarget, RemoteError> {
        let response = self
            .client
            .post(self.url("/uploads"))
            .bearer_auth(&self.api_token)
            .json(req)
            .send()
            .await?;
        let target = Self::check(response).await?.json::<UploadTarget>().await?;
        debug!(upload_id = %target.upload_id, "upload target issued");
        Ok(target)
    }

    async fn upload_payload(
        &self,
        target: &UploadTarget,
        bytes: Vec<u8>,
        context: Option<&UploadContext>,
    ) -> Result<(), RemoteError> {
        let mut request = self
            .client
            .put(&target.upload_url)
            .header("content-type", "application/zip")
            .body(bytes);
        if let Some(context) = context {
            request = request.header("x-upload-job-id", &context.job_id);
        }
        let response = request.send().await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn start_job(&self, req: &StartJobRequest) -> Result<String, RemoteError> {
        let response = self
            .client
            .post(self.url("/jobs"))
            .bearer_auth(&self.api_token)
            .json(req)
            .send()
            .await?;
        let body = Self::check(response)
            .await?
            .json::<StartJobResponse>()
            .await?;
        Ok(body.job_id)
    }

    async fn get_status(&self, job_id: &str) -> Result<StatusReport, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{job_id}")))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        Ok(Self::check(response).await?.json::<StatusReport>().await?)
    }

    async fn get_transformation_plan(
        &self,
        job_id: &str,
    ) -> Result<TransformationPlan, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{job_id}/plan")))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        Ok(Self::check(response)
            .await?
            .json::<TransformationPlan>()
            .await?)
    }

    async fn download_result_archive(
        &self,
        job_id: &str,
        artifact: &ArtifactRef,
    ) -> Result<Vec<u8>, RemoteError> {
        let response = self
            .client
            .get(self.url(&format!("/jobs/{job_id}/artifacts/{}", artifact.id)))
            .query(&[("type", artifact.kind.as_str())])
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        Ok(bytes.to_vec())
    }

    async fn resume_job(&self, job_id: &str, outcome: ResumeOutcome) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{job_id}/resume")))
            .bearer_auth(&self.api_token)
            .json(&ResumeRequest {
                user_action_status: outcome,
            })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn stop_job(&self, job_id: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .post(self.url(&format!("/jobs/{job_id}/stop")))
            .bearer_auth(&self.api_token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::TransformationType;
    use crate::remote::RemoteStatus;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> RemoteClient {
        RemoteClient::new(&server.uri(), "test-token").unwrap()
    }

    #[tokio::test]
    async fn start_job_returns_job_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_json(json!({
                "uploadId": "u-1",
                "transformationType": "LANGUAGE_UPGRADE",
                "source": "JDK_8",
                "target": "JDK_17"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"jobId": "J1"})))
            .expect(1)
            .mount(&server)
            .await;

        let job_id = client_for(&server)
            .start_job(&StartJobRequest {
                upload_id: "u-1".into(),
                transformation_type: TransformationType::LanguageUpgrade,
                source: "JDK_8".into(),
                target: "JDK_17".into(),
            })
            .await
            .unwrap();
        assert_eq!(job_id, "J1");
    }

    #[tokio::test]
    async fn api_error_carries_response_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs"))
            .respond_with(
                ResponseTemplate::new(400).set_body_string("Too many active running jobs"),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .start_job(&StartJobRequest {
                upload_id: "u-1".into(),
                transformation_type: TransformationType::SqlConversion,
                source: "ORACLE".into(),
                target: "POSTGRESQL".into(),
            })
            .await
            .unwrap_err();
        match err {
            RemoteError::Api { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Too many active running jobs");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_limit_uses_retry_after_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/J1"))
            .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "3"))
            .mount(&server)
            .await;

        let err = client_for(&server).get_status("J1").await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::RateLimited {
                retry_after_ms: 3000
            }
        ));
    }

    #[tokio::test]
    async fn get_status_parses_report() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/J1"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"status": "PAUSED"})),
            )
            .mount(&server)
            .await;

        let report = client_for(&server).get_status("J1").await.unwrap();
        assert_eq!(report.status, RemoteStatus::Paused);
    }

    #[tokio::test]
    async fn resume_sends_user_action_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/jobs/J1/resume"))
            .and(body_json(json!({"userActionStatus": "REJECTED"})))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .resume_job("J1", ResumeOutcome::Rejected)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn upload_flow_puts_bytes_to_issued_url() {
        let server = MockServer::start().await;
        let upload_url = format!("{}/blob/u-9", server.uri());
        Mock::given(method("POST"))
            .and(path("/uploads"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "uploadId": "u-9",
                "uploadUrl": upload_url
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/blob/u-9"))
            .and(header("content-type", "application/zip"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let target = client
            .create_upload_target(&UploadRequest {
                content_checksum: "00ff".into(),
                upload_context: None,
            })
            .await
            .unwrap();
        assert_eq!(target.upload_id, "u-9");
        client
            .upload_payload(&target, b"PK\x03\x04".to_vec(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn download_passes_artifact_type() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/jobs/J1/artifacts/a-1"))
            .and(query_param("type", "BuiltJars"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let bytes = client_for(&server)
            .download_result_archive(
                "J1",
                &ArtifactRef {
                    id: "a-1".into(),
                    kind: "BuiltJars".into(),
                },
            )
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
    }
}
