pub mod client;
pub mod error;
pub mod service;
pub mod types;

pub use client::RemoteClient;
pub use error::RemoteError;
pub use service::TransformService;
pub use types::{
    ArtifactRef, DownloadArtifact, ProgressUpdate, RemoteStatus, ResumeOutcome, StartJobRequest,
    StatusReport, TransformationPlan, TransformationStep, UploadArtifactType, UploadContext,
    UploadRequest, UploadTarget,
};
