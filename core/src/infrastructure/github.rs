// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// GitHub Tag Store Adapter
//
// Anti-Corruption Layer for the GitHub git references API.
// Also works against GitHub Enterprise Server via a custom API root.
//
// list   GET    /repos/{owner}/{repo}/git/matching-refs/tags/{stem}
// create POST   /repos/{owner}/{repo}/git/refs
// delete DELETE /repos/{owner}/{repo}/git/refs/tags/{name}

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::config::RepositoryId;
use crate::domain::counter::{CounterReference, TAG_NAMESPACE};
use crate::domain::tag_store::{
    CreateOutcome, DeleteOutcome, TagStore, TagStoreError, TransportKind,
};

const USER_AGENT: &str = concat!("build-number/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct GitHubTagStore {
    client: Client,
    api_url: String,
    repository: RepositoryId,
    token: String,
}

#[derive(Deserialize)]
struct GitRef {
    #[serde(rename = "ref")]
    name: String,
    object: GitObject,
}

#[derive(Deserialize)]
struct GitObject {
    sha: String,
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    name: String,
    sha: &'a str,
}

#[derive(Deserialize, Default)]
struct GitHubErrorBody {
    #[serde(default)]
    message: String,
}

impl GitHubTagStore {
    pub fn new(
        api_url: impl Into<String>,
        repository: RepositoryId,
        token: impl Into<String>,
    ) -> Result<Self, TagStoreError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TagStoreError::transport(TransportKind::Network, e.to_string()))?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            repository,
            token: token.into(),
        })
    }

    fn repo_url(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.repository.owner, self.repository.name, path
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", ACCEPT)
    }
}

fn network_error(err: reqwest::Error) -> TagStoreError {
    TagStoreError::transport(TransportKind::Network, err.to_string())
}

/// Maps a non-success response onto the transport taxonomy.
fn classify(status: StatusCode, headers: &HeaderMap, message: &str) -> TagStoreError {
    let exhausted_quota = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false);

    let kind = if status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && exhausted_quota)
    {
        TransportKind::RateLimit
    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        TransportKind::Authentication
    } else if status.is_server_error() {
        TransportKind::Server
    } else {
        TransportKind::Rejected
    };

    TagStoreError::transport(kind, format!("HTTP {}: {}", status.as_u16(), message))
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<GitHubErrorBody>(&text)
        .map(|body| body.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or(text)
}

#[async_trait]
impl TagStore for GitHubTagStore {
    async fn list(&self, stem: &str) -> Result<Vec<CounterReference>, TagStoreError> {
        let url = self.repo_url(&format!("git/matching-refs/tags/{}", stem));
        debug!(%url, "Listing counter tags");

        let response = self
            .authorized(self.client.get(&url))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            let headers = response.headers().clone();
            return Err(classify(status, &headers, &error_message(response).await));
        }

        let refs: Vec<GitRef> = response
            .json()
            .await
            .map_err(|e| TagStoreError::Decode(e.to_string()))?;

        Ok(refs
            .into_iter()
            .filter_map(|r| {
                r.name
                    .strip_prefix(TAG_NAMESPACE)
                    .map(|name| CounterReference::new(name, r.object.sha))
            })
            .collect())
    }

    async fn create(&self, name: &str, commit: &str) -> Result<CreateOutcome, TagStoreError> {
        let url = self.repo_url("git/refs");
        let body = CreateRefRequest {
            name: format!("{}{}", TAG_NAMESPACE, name),
            sha: commit,
        };

        let response = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(CreateOutcome::Created);
        }

        let headers = response.headers().clone();
        let message = error_message(response).await;
        if status == StatusCode::UNPROCESSABLE_ENTITY
            && message.to_lowercase().contains("already exists")
        {
            return Ok(CreateOutcome::Conflict);
        }

        Err(classify(status, &headers, &message))
    }

    async fn delete(&self, name: &str) -> Result<DeleteOutcome, TagStoreError> {
        let url = self.repo_url(&format!("git/refs/tags/{}", name));

        let response = self
            .authorized(self.client.delete(&url))
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(DeleteOutcome::Deleted);
        }
        // GitHub answers 422 "Reference does not exist" for refs deleted moments ago.
        if status == StatusCode::NOT_FOUND || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Ok(DeleteOutcome::NotFound);
        }

        let headers = response.headers().clone();
        Err(classify(status, &headers, &error_message(response).await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn store(url: String) -> GitHubTagStore {
        GitHubTagStore::new(url, "octo/widgets".parse().unwrap(), "t0k3n").unwrap()
    }

    #[tokio::test]
    async fn test_list_parses_refs_and_strips_namespace() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/octo/widgets/git/matching-refs/tags/web-build-number-")
            .match_header("authorization", "token t0k3n")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"[
                    {"ref": "refs/tags/web-build-number-3", "object": {"sha": "aaa"}},
                    {"ref": "refs/tags/web-build-number-4", "object": {"sha": "bbb"}}
                ]"#,
            )
            .create_async()
            .await;

        let refs = store(server.url()).list("web-build-number-").await.unwrap();

        mock.assert_async().await;
        assert_eq!(
            refs,
            vec![
                CounterReference::new("web-build-number-3", "aaa"),
                CounterReference::new("web-build-number-4", "bbb"),
            ]
        );
    }

    #[tokio::test]
    async fn test_list_not_found_is_empty() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/repos/octo/widgets/git/matching-refs/tags/build-number-")
            .with_status(404)
            .with_body(r#"{"message": "Not Found"}"#)
            .create_async()
            .await;

        assert!(store(server.url()).list("build-number-").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_error_statuses_are_classified() {
        let cases = [
            (401, None, TransportKind::Authentication),
            (403, Some("0"), TransportKind::RateLimit),
            (403, Some("12"), TransportKind::Authentication),
            (429, None, TransportKind::RateLimit),
            (502, None, TransportKind::Server),
            (400, None, TransportKind::Rejected),
        ];

        for (status, remaining, expected) in cases {
            let mut server = mockito::Server::new_async().await;
            let mut mock = server
                .mock("GET", "/repos/octo/widgets/git/matching-refs/tags/build-number-")
                .with_status(status)
                .with_body(r#"{"message": "nope"}"#);
            if let Some(remaining) = remaining {
                mock = mock.with_header("x-ratelimit-remaining", remaining);
            }
            let _mock = mock.create_async().await;

            match store(server.url()).list("build-number-").await {
                Err(TagStoreError::Transport { kind, message }) => {
                    assert_eq!(kind, expected, "status {}", status);
                    assert!(message.contains("nope"));
                }
                other => panic!("status {}: unexpected {:?}", status, other),
            }
        }
    }

    #[tokio::test]
    async fn test_create_sends_full_ref() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/repos/octo/widgets/git/refs")
            .match_body(Matcher::Json(serde_json::json!({
                "ref": "refs/tags/build-number-8",
                "sha": "cafe"
            })))
            .with_status(201)
            .with_body(r#"{"ref": "refs/tags/build-number-8", "object": {"sha": "cafe"}}"#)
            .create_async()
            .await;

        let outcome = store(server.url()).create("build-number-8", "cafe").await.unwrap();

        mock.assert_async().await;
        assert_eq!(outcome, CreateOutcome::Created);
    }

    #[tokio::test]
    async fn test_create_existing_ref_is_conflict() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octo/widgets/git/refs")
            .with_status(422)
            .with_body(r#"{"message": "Reference already exists"}"#)
            .create_async()
            .await;

        let outcome = store(server.url()).create("build-number-8", "cafe").await.unwrap();
        assert_eq!(outcome, CreateOutcome::Conflict);
    }

    #[tokio::test]
    async fn test_create_unknown_commit_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/repos/octo/widgets/git/refs")
            .with_status(422)
            .with_body(r#"{"message": "Object does not exist"}"#)
            .create_async()
            .await;

        let err = store(server.url()).create("build-number-8", "nope").await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_delete_outcomes() {
        let mut server = mockito::Server::new_async().await;
        let _deleted = server
            .mock("DELETE", "/repos/octo/widgets/git/refs/tags/build-number-6")
            .with_status(204)
            .create_async()
            .await;
        let _gone = server
            .mock("DELETE", "/repos/octo/widgets/git/refs/tags/build-number-5")
            .with_status(422)
            .with_body(r#"{"message": "Reference does not exist"}"#)
            .create_async()
            .await;
        let _broken = server
            .mock("DELETE", "/repos/octo/widgets/git/refs/tags/build-number-4")
            .with_status(500)
            .create_async()
            .await;

        let store = store(server.url());
        assert_eq!(store.delete("build-number-6").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(store.delete("build-number-5").await.unwrap(), DeleteOutcome::NotFound);
        assert!(store.delete("build-number-4").await.unwrap_err().is_retryable());
    }
}
