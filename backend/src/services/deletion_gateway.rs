//! Capability interface to the systems holding a subject's dependent
//! artifacts: cloned voice profiles at the provider, stored recordings in
//! object storage.
//!
//! Failure here is data, never an error. One artifact's failure must not
//! block the rest of the cascade, and no cascade failure may block the
//! consent record's own deletion.

use async_trait::async_trait;
use serde::Deserialize;

use crate::types::SubjectId;

/// One dependent artifact that could not be removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactFailure {
    pub artifact: String,
    pub reason: String,
}

/// Outcome of a cascade over a subject's dependent artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactDeletionReport {
    pub deleted: u64,
    pub failures: Vec<ArtifactFailure>,
}

impl ArtifactDeletionReport {
    pub fn merge(&mut self, other: ArtifactDeletionReport) {
        self.deleted += other.deleted;
        self.failures.extend(other.failures);
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeletionGateway: Send + Sync {
    /// Removes every dependent artifact tied to the subject, isolating
    /// per-artifact failures into the report. Assumed safe to retry by the
    /// downstream system's own contract.
    async fn delete_dependent_artifacts(&self, subject_id: SubjectId) -> ArtifactDeletionReport;
}

/// Fans one cascade out to several downstream systems and merges their
/// reports. An empty composite is the configured-off state: nothing to
/// purge, nothing fails.
pub struct CompositeDeletionGateway {
    gateways: Vec<Box<dyn DeletionGateway>>,
}

impl CompositeDeletionGateway {
    pub fn new(gateways: Vec<Box<dyn DeletionGateway>>) -> Self {
        Self { gateways }
    }
}

#[async_trait]
impl DeletionGateway for CompositeDeletionGateway {
    async fn delete_dependent_artifacts(&self, subject_id: SubjectId) -> ArtifactDeletionReport {
        let mut report = ArtifactDeletionReport::default();
        for gateway in &self.gateways {
            report.merge(gateway.delete_dependent_artifacts(subject_id).await);
        }
        report
    }
}

#[derive(Debug, Deserialize)]
struct VoiceProfile {
    voice_id: String,
}

#[derive(Debug, Deserialize)]
struct VoiceProfileList {
    voices: Vec<VoiceProfile>,
}

/// Deletes cloned voice profiles at the voice provider over its HTTP API.
pub struct VoiceProfileGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl VoiceProfileGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    fn subject_voices_url(&self, subject_id: SubjectId) -> String {
        format!("{}/v1/subjects/{}/voices", self.base_url, subject_id)
    }

    fn voice_url(&self, voice_id: &str) -> String {
        format!("{}/v1/voices/{}", self.base_url, voice_id)
    }

    async fn list_profiles(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<VoiceProfile>, reqwest::Error> {
        let list: VoiceProfileList = self
            .client
            .get(self.subject_voices_url(subject_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.voices)
    }

    async fn delete_profile(&self, voice_id: &str) -> Result<(), reqwest::Error> {
        self.client
            .delete(self.voice_url(voice_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[async_trait]
impl DeletionGateway for VoiceProfileGateway {
    async fn delete_dependent_artifacts(&self, subject_id: SubjectId) -> ArtifactDeletionReport {
        let mut report = ArtifactDeletionReport::default();

        let profiles = match self.list_profiles(subject_id).await {
            Ok(profiles) => profiles,
            Err(err) => {
                report.failures.push(ArtifactFailure {
                    artifact: format!("voice_profiles:{}", subject_id),
                    reason: format!("listing failed: {}", err),
                });
                return report;
            }
        };

        for profile in profiles {
            match self.delete_profile(&profile.voice_id).await {
                Ok(()) => {
                    tracing::debug!(
                        subject_id = %subject_id,
                        voice_id = %profile.voice_id,
                        "deleted cloned voice profile"
                    );
                    report.deleted += 1;
                }
                Err(err) => report.failures.push(ArtifactFailure {
                    artifact: format!("voice_profile:{}", profile.voice_id),
                    reason: err.to_string(),
                }),
            }
        }

        report
    }
}

/// Purges a subject's stored voice recordings from object storage.
pub struct RecordingStorageGateway {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl RecordingStorageGateway {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    fn subject_prefix(subject_id: SubjectId) -> String {
        format!("recordings/{}/", subject_id)
    }
}

#[async_trait]
impl DeletionGateway for RecordingStorageGateway {
    async fn delete_dependent_artifacts(&self, subject_id: SubjectId) -> ArtifactDeletionReport {
        let mut report = ArtifactDeletionReport::default();
        let prefix = Self::subject_prefix(subject_id);
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix);
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let page = match request.send().await {
                Ok(page) => page,
                Err(err) => {
                    report.failures.push(ArtifactFailure {
                        artifact: format!("recordings:{}", subject_id),
                        reason: format!("listing failed: {}", err),
                    });
                    return report;
                }
            };

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                match self
                    .client
                    .delete_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                {
                    Ok(_) => report.deleted += 1,
                    Err(err) => report.failures.push(ArtifactFailure {
                        artifact: format!("recording:{}", key),
                        reason: err.to_string(),
                    }),
                }
            }

            match page.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        report
    }
}
