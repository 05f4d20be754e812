//! DevOps platform integrations: repository discovery and ALM settings.

use serde::{Deserialize, Serialize};

use crate::builder::{validate_oauth, validate_required, RequestBuilder};
use crate::client::{RequestOptions, SonarClient};
use crate::error::Result;
use crate::pagination::{has_more_by_flag, Page, PageStream, PageStyle, PaginatedBuilder};
use crate::query::QueryParams;

/// A Bitbucket Server repository available for import.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketServerRepo {
    pub id: u64,
    pub slug: String,
    pub name: String,
    pub project_key: String,
    /// Key of the Sonar project already bound to this repository.
    #[serde(default)]
    pub sq_project_key: Option<String>,
}

/// Response of `GET /api/alm_integrations/search_bitbucketserver_repos`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BitbucketServerRepoSearchResponse {
    pub is_last_page: bool,
    #[serde(default)]
    pub repositories: Vec<BitbucketServerRepo>,
}

/// Builder for `GET /api/alm_integrations/search_bitbucketserver_repos`.
///
/// This endpoint reports `isLastPage` instead of a total count.
#[derive(Debug, Clone)]
pub struct BitbucketServerRepoSearchBuilder {
    inner: PaginatedBuilder<BitbucketServerRepoSearchResponse, BitbucketServerRepo>,
}

impl BitbucketServerRepoSearchBuilder {
    pub fn new(client: &SonarClient, alm_setting: impl Into<String>) -> Self {
        let client = client.clone();
        let request = RequestBuilder::new(move |params: QueryParams| {
            let client = client.clone();
            async move {
                client
                    .get::<BitbucketServerRepoSearchResponse>(
                        "/alm_integrations/search_bitbucketserver_repos",
                        &params,
                    )
                    .await
            }
        })
        .set("almSetting", alm_setting.into())
        .with_validator(|p| validate_required(p, "almSetting"));

        Self {
            inner: PaginatedBuilder::new(
                request,
                PageStyle::V1,
                |response: BitbucketServerRepoSearchResponse| response.repositories,
                |response: &BitbucketServerRepoSearchResponse, _page| {
                    has_more_by_flag(response.is_last_page)
                },
            ),
        }
    }

    #[must_use]
    pub fn project_name(self, name: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("projectName", name.into()),
        }
    }

    #[must_use]
    pub fn repository_name(self, name: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("repositoryName", name.into()),
        }
    }

    #[must_use]
    pub fn page(self, page: u32) -> Self {
        Self {
            inner: self.inner.page(page),
        }
    }

    #[must_use]
    pub fn page_size(self, page_size: u32) -> Self {
        Self {
            inner: self.inner.page_size(page_size),
        }
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn execute(&self) -> Result<BitbucketServerRepoSearchResponse> {
        self.inner.execute().await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn execute_page(&self) -> Result<Page<BitbucketServerRepo>> {
        self.inner.execute_page().await
    }

    pub fn all(&self) -> PageStream<BitbucketServerRepo> {
        self.inner.all()
    }

    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn collect_all(&self) -> Result<Vec<BitbucketServerRepo>> {
        self.inner.collect_all().await
    }
}

/// Search repositories of a Bitbucket Server configured as `alm_setting`.
pub fn search_bitbucket_server_repos(
    client: &SonarClient,
    alm_setting: impl Into<String>,
) -> BitbucketServerRepoSearchBuilder {
    BitbucketServerRepoSearchBuilder::new(client, alm_setting)
}

/// Builder for `POST /api/alm_settings/create_github`.
#[derive(Debug, Clone)]
pub struct CreateGithubBuilder {
    inner: RequestBuilder<()>,
}

impl CreateGithubBuilder {
    pub fn new(client: &SonarClient, key: impl Into<String>) -> Self {
        let client = client.clone();
        let request = RequestBuilder::new(move |params: QueryParams| {
            let client = client.clone();
            async move {
                client
                    .request::<()>(
                        "/alm_settings/create_github",
                        RequestOptions::post().with_query(&params),
                    )
                    .await
            }
        })
        .set("key", key.into())
        .with_validator(|p| validate_required(p, "key"))
        .with_validator(|p| validate_required(p, "url"))
        .with_validator(|p| validate_required(p, "appId"))
        .with_validator(|p| validate_required(p, "privateKey"))
        .with_validator(|p| validate_oauth(p, "clientId", "clientSecret"));

        Self { inner: request }
    }

    /// GitHub API URL, e.g. `https://api.github.com/`.
    #[must_use]
    pub fn url(self, url: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("url", url.into()),
        }
    }

    #[must_use]
    pub fn app_id(self, app_id: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("appId", app_id.into()),
        }
    }

    #[must_use]
    pub fn client_id(self, client_id: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("clientId", client_id.into()),
        }
    }

    #[must_use]
    pub fn client_secret(self, client_secret: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("clientSecret", client_secret.into()),
        }
    }

    /// PEM-encoded GitHub App private key.
    #[must_use]
    pub fn private_key(self, private_key: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("privateKey", private_key.into()),
        }
    }

    #[must_use]
    pub fn webhook_secret(self, secret: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("webhookSecret", secret.into()),
        }
    }

    /// # Errors
    ///
    /// Returns a validation error if a mandatory field or one half of the
    /// OAuth client credentials is missing; otherwise the request's error.
    pub async fn execute(&self) -> Result<()> {
        self.inner.execute().await
    }
}

/// Register a GitHub App configuration under `key`.
pub fn create_github_setting(client: &SonarClient, key: impl Into<String>) -> CreateGithubBuilder {
    CreateGithubBuilder::new(client, key)
}
