use crate::config::PublishConfig;
use crate::http::build_client;
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use urlencoding::encode;

const ACCEPT_HEADER: &str = "application/vnd.github.v3+json";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("invalid response: {0}")]
    Deserialize(String),
}

/// Pushes binary artifacts to the GitHub-hosted asset repository via the
/// contents API. Idempotent per repository path: an existing blob is
/// overwritten by supplying its SHA.
#[derive(Debug, Clone)]
pub struct ArtifactPublisher {
    http: Client,
    config: PublishConfig,
}

impl ArtifactPublisher {
    pub fn new(config: PublishConfig) -> Self {
        Self {
            http: build_client(),
            config,
        }
    }

    /// Creates or updates `repo_path` with `content` and returns the durable
    /// reference URL for the published blob.
    pub async fn put_file(
        &self,
        repo_path: &str,
        content: &[u8],
        message: &str,
    ) -> Result<String, PublishError> {
        let url = self.contents_url(repo_path);
        let mut body = json!({
            "message": message,
            "content": BASE64.encode(content),
            "branch": self.config.branch,
        });
        if let Some(sha) = self.existing_sha(&url).await? {
            body["sha"] = Value::String(sha);
        }

        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.config.token)
            .header("Accept", ACCEPT_HEADER)
            .json(&body)
            .send()
            .await
            .map_err(|err| PublishError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(PublishError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        Ok(self.reference_url(repo_path))
    }

    async fn existing_sha(&self, url: &str) -> Result<Option<String>, PublishError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .header("Accept", ACCEPT_HEADER)
            .query(&[("ref", self.config.branch.as_str())])
            .send()
            .await
            .map_err(|err| PublishError::Request(err.to_string()))?;
        if response.status() == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(PublishError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        #[derive(Deserialize)]
        struct ExistingBlob {
            sha: String,
        }
        let payload: ExistingBlob = response
            .json()
            .await
            .map_err(|err| PublishError::Deserialize(err.to_string()))?;
        Ok(Some(payload.sha))
    }

    fn contents_url(&self, repo_path: &str) -> String {
        format!(
            "https://api.github.com/repos/{}/{}/contents/{}",
            self.config.user,
            self.config.repo,
            encode_path(repo_path)
        )
    }

    fn reference_url(&self, repo_path: &str) -> String {
        format!("{}?ref={}", self.contents_url(repo_path), self.config.branch)
    }
}

fn encode_path(repo_path: &str) -> String {
    repo_path
        .split('/')
        .map(|segment| encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> ArtifactPublisher {
        ArtifactPublisher::new(PublishConfig {
            token: "t".into(),
            user: "octocat".into(),
            repo: "assets".into(),
            branch: "main".into(),
        })
    }

    #[test]
    fn contents_url_targets_the_repository_path() {
        assert_eq!(
            publisher().contents_url("images/IconRole02.png"),
            "https://api.github.com/repos/octocat/assets/contents/images/IconRole02.png"
        );
    }

    #[test]
    fn reference_url_pins_the_branch() {
        assert_eq!(
            publisher().reference_url("images/IconRole02.png"),
            "https://api.github.com/repos/octocat/assets/contents/images/IconRole02.png?ref=main"
        );
    }

    #[test]
    fn path_segments_are_encoded_individually() {
        assert_eq!(
            encode_path("images/Icon Role#2.png"),
            "images/Icon%20Role%232.png"
        );
    }
}
