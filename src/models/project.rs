//! Project search and bulk deletion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::builder::{validate_max_items, validate_one_of, RequestBuilder, MAX_BULK_PROJECTS};
use crate::client::{RequestOptions, SonarClient};
use crate::deprecation::DeprecationRegistry;
use crate::error::Result;
use crate::pagination::{Page, PageStream, PageStyle, PaginatedBuilder, Paging};
use crate::query::QueryParams;

/// A project (or portfolio/application) component.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// The project key (e.g., "my_org_my_project").
    pub key: String,

    /// Display name.
    pub name: String,

    /// Component qualifier: `TRK` for projects, `VW` portfolios, `APP` applications.
    #[serde(default)]
    pub qualifier: Option<String>,

    /// `public` or `private`.
    #[serde(default)]
    pub visibility: Option<String>,

    /// Timestamp of the last analysis, as sent by the server.
    #[serde(default)]
    pub last_analysis_date: Option<String>,

    /// SCM revision of the last analysis.
    #[serde(default)]
    pub revision: Option<String>,

    /// Whether the project is managed by an external provisioning system.
    #[serde(default)]
    pub managed: bool,
}

impl Project {
    /// Whether the project has been analyzed at least once.
    pub fn is_analyzed(&self) -> bool {
        self.last_analysis_date.is_some()
    }

    pub fn is_private(&self) -> bool {
        self.visibility.as_deref() == Some("private")
    }

    /// Search projects visible to the caller.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use futures::TryStreamExt;
    ///
    /// let projects = Project::search(&client)
    ///     .query("payments")
    ///     .page_size(100)
    ///     .collect_all()
    ///     .await?;
    /// ```
    pub fn search(client: &SonarClient) -> ProjectSearchBuilder {
        ProjectSearchBuilder::new(client)
    }

    /// Delete projects in bulk.
    pub fn bulk_delete(client: &SonarClient) -> BulkDeleteBuilder {
        BulkDeleteBuilder::new(client)
    }
}

/// Response of `GET /api/projects/search`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSearchResponse {
    pub paging: Paging,
    #[serde(default)]
    pub components: Vec<Project>,
}

/// Builder for `GET /api/projects/search`.
#[derive(Debug, Clone)]
pub struct ProjectSearchBuilder {
    inner: PaginatedBuilder<ProjectSearchResponse, Project>,
}

impl ProjectSearchBuilder {
    pub fn new(client: &SonarClient) -> Self {
        let client = client.clone();
        let request = RequestBuilder::new(move |params: QueryParams| {
            let client = client.clone();
            async move {
                client
                    .get::<ProjectSearchResponse>("/projects/search", &params)
                    .await
            }
        });

        Self {
            inner: PaginatedBuilder::new(
                request,
                PageStyle::V1,
                |response: ProjectSearchResponse| response.components,
                |response: &ProjectSearchResponse, _page| response.paging.has_more(),
            ),
        }
    }

    /// Limit to components whose name or key contains `q`.
    #[must_use]
    pub fn query(self, q: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("q", q.into()),
        }
    }

    /// SonarCloud organization key.
    #[must_use]
    pub fn organization(self, organization: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("organization", organization.into()),
        }
    }

    #[must_use]
    pub fn qualifiers<S: Into<String>>(self, qualifiers: Vec<S>) -> Self {
        Self {
            inner: self.inner.set("qualifiers", qualifiers),
        }
    }

    /// Restrict to these project keys.
    #[must_use]
    pub fn projects<S: Into<String>>(self, keys: Vec<S>) -> Self {
        Self {
            inner: self.inner.set("projects", keys),
        }
    }

    /// Restrict by internal project ids.
    #[deprecated(note = "use `projects` with project keys")]
    #[must_use]
    pub fn project_ids<S: Into<String>>(self, ids: Vec<S>) -> Self {
        Self {
            inner: self
                .inner
                .deprecated(
                    "projects.search.projectIds",
                    "projectIds is deprecated, filter by project keys with `projects`",
                )
                .set("projectIds", ids),
        }
    }

    /// Only projects whose last analysis is older than `date`.
    #[must_use]
    pub fn analyzed_before(self, date: DateTime<Utc>) -> Self {
        Self {
            inner: self.inner.set("analyzedBefore", date),
        }
    }

    #[must_use]
    pub fn on_provisioned_only(self, provisioned: bool) -> Self {
        Self {
            inner: self.inner.set("onProvisionedOnly", provisioned),
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

    #[must_use]
    pub fn with_deprecations(self, registry: Arc<DeprecationRegistry>) -> Self {
        Self {
            inner: self.inner.with_deprecations(registry),
        }
    }

    pub fn params(&self) -> &QueryParams {
        self.inner.params()
    }

    /// Fetch one page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn execute(&self) -> Result<ProjectSearchResponse> {
        self.inner.execute().await
    }

    /// Fetch one page as a [`Page`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn execute_page(&self) -> Result<Page<Project>> {
        self.inner.execute_page().await
    }

    /// Stream every matching project.
    pub fn all(&self) -> PageStream<Project> {
        self.inner.all()
    }

    /// Collect every matching project.
    ///
    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn collect_all(&self) -> Result<Vec<Project>> {
        self.inner.collect_all().await
    }
}

/// Builder for `POST /api/projects/bulk_delete`.
#[derive(Debug, Clone)]
pub struct BulkDeleteBuilder {
    inner: RequestBuilder<()>,
}

impl BulkDeleteBuilder {
    pub fn new(client: &SonarClient) -> Self {
        let client = client.clone();
        let request = RequestBuilder::new(move |params: QueryParams| {
            let client = client.clone();
            async move {
                client
                    .request::<()>("/projects/bulk_delete", RequestOptions::post().with_query(&params))
                    .await
            }
        })
        .with_validator(|p| validate_one_of(p, &["projects", "q", "analyzedBefore"]))
        .with_validator(|p| validate_max_items(p, "projects", MAX_BULK_PROJECTS));

        Self { inner: request }
    }

    #[must_use]
    pub fn projects<S: Into<String>>(self, keys: Vec<S>) -> Self {
        Self {
            inner: self.inner.set("projects", keys),
        }
    }

    #[must_use]
    pub fn query(self, q: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("q", q.into()),
        }
    }

    #[must_use]
    pub fn analyzed_before(self, date: DateTime<Utc>) -> Self {
        Self {
            inner: self.inner.set("analyzedBefore", date),
        }
    }

    #[must_use]
    pub fn organization(self, organization: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("organization", organization.into()),
        }
    }

    /// Delete the selected projects.
    ///
    /// # Errors
    ///
    /// Returns a validation error if no filter was given or more than
    /// [`MAX_BULK_PROJECTS`] keys were listed; otherwise the request's error.
    pub async fn execute(&self) -> Result<()> {
        self.inner.execute().await
    }
}
