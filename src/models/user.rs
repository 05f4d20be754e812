//! User management (v2 API).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::builder::RequestBuilder;
use crate::client::SonarClient;
use crate::error::Result;
use crate::pagination::{Page, PageStream, PageStyle, PaginatedBuilder, Paging};
use crate::query::QueryParams;

/// A user account as returned by `/api/v2/users-management/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub login: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub active: bool,
    /// Whether the account is authenticated by Sonar itself.
    #[serde(default)]
    pub local: bool,
    #[serde(default)]
    pub managed: bool,
    #[serde(default)]
    pub external_login: Option<String>,
    #[serde(default)]
    pub external_provider: Option<String>,
    #[serde(default)]
    pub sonar_qube_last_connection_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sonar_lint_last_connection_date: Option<DateTime<Utc>>,
}

impl User {
    /// List users.
    pub fn search(client: &SonarClient) -> UserSearchBuilder {
        UserSearchBuilder::new(client)
    }
}

/// Response of `GET /api/v2/users-management/users`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSearchResponse {
    #[serde(default)]
    pub users: Vec<User>,
    pub page: Paging,
}

/// Builder for `GET /api/v2/users-management/users`.
#[derive(Debug, Clone)]
pub struct UserSearchBuilder {
    inner: PaginatedBuilder<UserSearchResponse, User>,
}

impl UserSearchBuilder {
    pub fn new(client: &SonarClient) -> Self {
        let client = client.clone();
        let request = RequestBuilder::new(move |params: QueryParams| {
            let client = client.clone();
            async move {
                client
                    .get::<UserSearchResponse>("/v2/users-management/users", &params)
                    .await
            }
        });

        Self {
            inner: PaginatedBuilder::new(
                request,
                PageStyle::V2,
                |response: UserSearchResponse| response.users,
                |response: &UserSearchResponse, _page| response.page.has_more(),
            ),
        }
    }

    /// Only active (`true`) or deactivated (`false`) users.
    #[must_use]
    pub fn active(self, active: bool) -> Self {
        Self {
            inner: self.inner.set("active", active),
        }
    }

    #[must_use]
    pub fn managed(self, managed: bool) -> Self {
        Self {
            inner: self.inner.set("managed", managed),
        }
    }

    /// Match on login, name or email.
    #[must_use]
    pub fn q(self, q: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("q", q.into()),
        }
    }

    #[must_use]
    pub fn external_identity(self, identity: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("externalIdentity", identity.into()),
        }
    }

    #[must_use]
    pub fn group_id(self, group_id: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("groupId", group_id.into()),
        }
    }

    #[must_use]
    pub fn group_id_exclusion(self, group_id: impl Into<String>) -> Self {
        Self {
            inner: self.inner.set("groupId!", group_id.into()),
        }
    }

    #[must_use]
    pub fn sonar_qube_last_connection_date_from(self, date: DateTime<Utc>) -> Self {
        Self {
            inner: self.inner.set("sonarQubeLastConnectionDateFrom", date),
        }
    }

    #[must_use]
    pub fn sonar_qube_last_connection_date_to(self, date: DateTime<Utc>) -> Self {
        Self {
            inner: self.inner.set("sonarQubeLastConnectionDateTo", date),
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

    pub fn params(&self) -> &QueryParams {
        self.inner.params()
    }

    /// Fetch one page.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn execute(&self) -> Result<UserSearchResponse> {
        self.inner.execute().await
    }

    /// Fetch one page as a [`Page`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn execute_page(&self) -> Result<Page<User>> {
        self.inner.execute_page().await
    }

    pub fn all(&self) -> PageStream<User> {
        self.inner.all()
    }

    /// # Errors
    ///
    /// Returns an error if any page request fails.
    pub async fn collect_all(&self) -> Result<Vec<User>> {
        self.inner.collect_all().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::NoAuth;
    use crate::query::QueryValue;
    use chrono::TimeZone;

    #[test]
    fn test_user_deserialize() {
        let json = r#"{
            "id": "AYx1",
            "login": "admin",
            "name": "Administrator",
            "email": "admin@example.com",
            "active": true,
            "local": true,
            "managed": false,
            "externalLogin": "admin",
            "externalProvider": "sonarqube",
            "sonarQubeLastConnectionDate": "2024-01-15T09:30:00Z",
            "sonarLintLastConnectionDate": null
        }"#;

        let user: User = serde_json::from_str(json).expect("Failed to deserialize user");
        assert_eq!(user.login, "admin");
        assert!(user.active);
        assert!(user.sonar_qube_last_connection_date.is_some());
        assert!(user.sonar_lint_last_connection_date.is_none());
    }

    #[test]
    fn test_v2_page_fields() {
        let client = SonarClient::new("http://127.0.0.1:9", NoAuth).unwrap();
        let since = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let builder = User::search(&client)
            .active(true)
            .sonar_qube_last_connection_date_from(since)
            .page(2)
            .page_size(25);

        let params = builder.params();
        assert_eq!(params.get("page"), Some(&QueryValue::Int(2)));
        assert_eq!(params.get("pageSize"), Some(&QueryValue::Int(25)));
        assert!(params.get("p").is_none());

        let qs = QueryParams::parse(&params.to_query_string());
        assert_eq!(qs.parse_bool("active"), Some(true));
        assert_eq!(qs.parse_date("sonarQubeLastConnectionDateFrom"), Some(since));
    }
}
