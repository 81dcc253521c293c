//! reqwest-backed Patient Directory Service client.

use std::time::Duration;

use async_trait::async_trait;
use patient_registry_core::directory::{DirectoryError, DirectoryResult, PatientDirectory};
use patient_registry_core::models::{PatientRecord, RegistrationRequest, ServiceReply};
use reqwest::{Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::ClientConfig;

/// `GET /patients/today-count` body.
#[derive(Debug, Deserialize)]
struct TodayCount {
    count: u32,
}

/// `GET /patients` body: either wrapped or a bare array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PatientList {
    Wrapped {
        #[serde(default)]
        success: bool,
        #[serde(default)]
        message: Option<String>,
        #[serde(default)]
        patients: Vec<PatientRecord>,
    },
    Bare(Vec<PatientRecord>),
}

/// Patient Directory Service over HTTP.
pub struct HttpDirectory {
    client: reqwest::Client,
    base: Url,
}

impl HttpDirectory {
    /// Create a client for the service rooted at `base`.
    pub fn new(base: &Url, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("patient-registry/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            base: base.clone(),
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(&config.api_url, config.timeout)
    }

    /// Base URL with `segments` appended, each percent-encoded as one path segment.
    fn endpoint(&self, segments: &[&str]) -> DirectoryResult<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| DirectoryError::Transport(format!("cannot extend base URL {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> DirectoryResult<T> {
        let url = self.endpoint(segments)?;
        debug!(url = %url, "GET");
        let response = self.client.get(url).send().await.map_err(transport)?;
        read_json(response).await
    }
}

#[async_trait]
impl PatientDirectory for HttpDirectory {
    async fn today_count(&self) -> DirectoryResult<u32> {
        let body: TodayCount = self.get_json(&["patients", "today-count"]).await?;
        Ok(body.count)
    }

    async fn register(&self, request: &RegistrationRequest) -> DirectoryResult<ServiceReply> {
        let url = self.endpoint(&["patients", "register"])?;
        debug!(url = %url, serial_number = %request.serial_number, "POST");
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport)?;
        read_json(response).await
    }

    async fn list_patients(&self) -> DirectoryResult<Vec<PatientRecord>> {
        match self.get_json::<PatientList>(&["patients"]).await? {
            PatientList::Bare(patients) => Ok(patients),
            PatientList::Wrapped {
                success: true,
                patients,
                ..
            } => Ok(patients),
            PatientList::Wrapped { message, .. } => Err(DirectoryError::Rejected(
                message.unwrap_or_else(|| "Failed to load patients".into()),
            )),
        }
    }

    async fn delete_patient(&self, id: &str) -> DirectoryResult<()> {
        // `.` and `..` would be dropped as segments and hit the collection itself
        if matches!(id, "" | "." | "..") {
            return Err(DirectoryError::InvalidId(id.to_string()));
        }
        let url = self.endpoint(&["patients", id])?;
        debug!(url = %url, "DELETE");
        let response = self.client.delete(url).send().await.map_err(transport)?;
        let reply: ServiceReply = read_json(response).await?;
        if reply.success {
            Ok(())
        } else {
            Err(DirectoryError::Rejected(
                reply
                    .message
                    .unwrap_or_else(|| "Failed to delete patient".into()),
            ))
        }
    }

    async fn health(&self) -> bool {
        match self.get_json::<ServiceReply>(&["health"]).await {
            Ok(reply) => reply.success,
            Err(e) => {
                warn!(error = %e, "Directory service not reachable");
                false
            }
        }
    }
}

fn transport(e: reqwest::Error) -> DirectoryError {
    DirectoryError::Transport(e.to_string())
}

/// Decode a JSON body, mapping non-success statuses to `DirectoryError::Status`.
async fn read_json<T: DeserializeOwned>(response: Response) -> DirectoryResult<T> {
    let status = response.status();
    let body = response.bytes().await.map_err(transport)?;

    if !status.is_success() {
        let message = serde_json::from_slice::<ServiceReply>(&body)
            .ok()
            .and_then(|reply| reply.message);
        return Err(DirectoryError::Status {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_slice(&body).map_err(|e| DirectoryError::Malformed(e.to_string()))
}
