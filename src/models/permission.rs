//! Permission templates.

use chrono::{DateTime, Utc};

use crate::builder::{validate_max_items, validate_one_of, RequestBuilder, MAX_BULK_PROJECTS};
use crate::client::{RequestOptions, SonarClient};
use crate::error::Result;
use crate::query::QueryParams;

/// Builder for `POST /api/permissions/bulk_apply_template`.
///
/// Applies a permission template to up to [`MAX_BULK_PROJECTS`] projects.
#[derive(Debug, Clone)]
pub struct BulkApplyTemplateBuilder {
    inner: RequestBuilder<()>,
}

impl BulkApplyTemplateBuilder {
    pub fn new(client: &SonarClient) -> Self {
        let client = client.clone();
        let request = RequestBuilder::new(move |params: QueryParams| {
            let client = client.clone();
            async move {
                client
                    .request::<()>(
                        "/permissions/bulk_apply_template",
                        RequestOptions::post().with_query(&params),
                    )
                    .await
            }
        })
        .with_validator(|p| validate_one_of(p, &["templateId", "templateName"]))
        .with_validator(|p| validate_max_items(p, "projects", MAX_BULK_PROJECTS));

        Self { inner: request }
    }

    #[must_use]
    pub fn template_id(self, id: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("templateId", id.into()),
        }
    }

    #[must_use]
    pub fn template_name(self, name: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("templateName", name.into()),
        }
    }

    /// Project keys to apply the template to.
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
    pub fn qualifiers<S: Into<String>>(self, qualifiers: Vec<S>) -> Self {
        Self {
            inner: self.inner.set("qualifiers", qualifiers),
        }
    }

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

    pub fn params(&self) -> &QueryParams {
        self.inner.params()
    }

    /// # Errors
    ///
    /// Returns a validation error when no template is named or too many
    /// projects are listed; otherwise the request's error.
    pub async fn execute(&self) -> Result<()> {
        self.inner.execute().await
    }
}

/// Apply a permission template to many projects.
pub fn bulk_apply_template(client: &SonarClient) -> BulkApplyTemplateBuilder {
    BulkApplyTemplateBuilder::new(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::error::ErrorKind;

    #[tokio::test]
    async fn test_template_is_required() {
        let client = SonarClient::new("http://127.0.0.1:9", NoAuth).unwrap();
        let err = bulk_apply_template(&client)
            .projects(vec!["a"])
            .execute()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.field(), Some("templateId"));
    }
}
