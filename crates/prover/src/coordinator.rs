//! Client side of the coordinator's HTTP API.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use parking_lot::RwLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::*;

use crate::errors::CoordinatorError;

/// Application-level success code in coordinator responses.
pub const SUCCESS_CODE: i32 = 200;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LoginRequest {
    pub public_key: String,
    pub prover_name: String,
    pub prover_version: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GetTaskRequest {
    pub prover_version: String,
    pub prover_height: u64,
    pub task_type: u8,
}

/// Task handed out by the coordinator. `task_data` is decoded according to
/// `task_type`.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct TaskData {
    pub task_id: String,
    pub task_type: u8,
    pub task_data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SubmitProofRequest {
    pub task_id: String,
    pub status: u8,
    pub error_message: String,
    pub task_type: u8,
    pub signature: String,
    /// JSON object with `chunk_proof` and `batch_proof` keys.
    pub proof: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct SubmitProofResponse {
    pub errcode: i32,
    #[serde(default)]
    pub errmsg: String,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CoordinatorClient: Send + Sync + 'static {
    async fn login(&self, req: &LoginRequest) -> Result<(), CoordinatorError>;

    /// Returns `None` when the coordinator has nothing for us.
    async fn get_task(&self, req: &GetTaskRequest) -> Result<Option<TaskData>, CoordinatorError>;

    async fn submit_proof(
        &self,
        req: &SubmitProofRequest,
    ) -> Result<SubmitProofResponse, CoordinatorError>;
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    errcode: i32,
    #[serde(default)]
    errmsg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

/// Coordinator client over HTTP, authenticated with the bearer token obtained
/// on login.
#[derive(Debug)]
pub struct HttpCoordinatorClient {
    base_url: String,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl HttpCoordinatorClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, CoordinatorError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            token: RwLock::new(None),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/coordinator/v1/{path}", self.base_url)
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        auth: bool,
    ) -> Result<Envelope<T>, CoordinatorError> {
        let mut req = self.client.post(self.url(path)).json(body);
        if auth {
            let token = self.token.read().clone().ok_or(CoordinatorError::NotLoggedIn)?;
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?.error_for_status()?;
        Ok(resp.json::<Envelope<T>>().await?)
    }
}

#[async_trait]
impl CoordinatorClient for HttpCoordinatorClient {
    async fn login(&self, req: &LoginRequest) -> Result<(), CoordinatorError> {
        let env = self.post::<_, LoginData>("login", req, false).await?;
        match env.data {
            Some(data) if env.errcode == SUCCESS_CODE => {
                *self.token.write() = Some(data.token);
                debug!(prover_name = %req.prover_name, "coordinator login accepted");
                Ok(())
            }
            _ => Err(CoordinatorError::Rejected {
                errcode: env.errcode,
                errmsg: env.errmsg,
            }),
        }
    }

    async fn get_task(&self, req: &GetTaskRequest) -> Result<Option<TaskData>, CoordinatorError> {
        let env = self.post::<_, TaskData>("get_task", req, true).await?;
        if env.errcode != SUCCESS_CODE {
            return Err(CoordinatorError::Rejected {
                errcode: env.errcode,
                errmsg: env.errmsg,
            });
        }
        Ok(env.data)
    }

    async fn submit_proof(
        &self,
        req: &SubmitProofRequest,
    ) -> Result<SubmitProofResponse, CoordinatorError> {
        let env = self
            .post::<_, serde_json::Value>("submit_proof", req, true)
            .await?;
        Ok(SubmitProofResponse {
            errcode: env.errcode,
            errmsg: env.errmsg,
        })
    }
}
