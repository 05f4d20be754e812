//! SonarQube / SonarCloud Web API client library.
//!
//! Exposes the platform's REST API as typed operations built on a small
//! shared core: credential providers, a single-attempt request engine with
//! a closed error taxonomy, and parameter builders whose paginated variant
//! turns page-oriented list endpoints into lazy streams.
//!
//! # Quick Start
//!
//! ```no_run
//! use futures::TryStreamExt;
//! use sonarapi::{Project, SonarClient, User};
//!
//! #[tokio::main]
//! async fn main() -> sonarapi::Result<()> {
//!     // Create client from environment variables
//!     let client = SonarClient::from_env()?;
//!
//!     // One page of projects
//!     let page = Project::search(&client).page_size(50).execute().await?;
//!     println!("{} projects in total", page.paging.total);
//!
//!     // Every active user, fetched page by page as the stream is consumed
//!     let mut users = User::search(&client).active(true).all();
//!     while let Some(user) = users.try_next().await? {
//!         println!("{}", user.login);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Errors
//!
//! Every failed call yields exactly one [`SonarError`]; match on the variant
//! (or [`SonarError::kind`]) to tell authentication, authorization, rate
//! limiting and the rest apart.
//!
//! # Configuration
//!
//! [`SonarClient::from_env`] reads:
//!
//! - `SONAR_HOST_URL` (optional) - Server URL (defaults to `https://sonarcloud.io`)
//! - `SONAR_TOKEN` - User token, sent as a bearer token
//! - `SONAR_PASSCODE` - System passcode, sent as `X-Sonar-Passcode`
//! - `SONAR_LOGIN` / `SONAR_PASSWORD` - Basic credentials

mod auth;
mod builder;
mod client;
mod deprecation;
mod download;
mod error;
mod models;
mod output;
mod pagination;
mod query;

pub mod cli;

// Re-export core types
pub use auth::{encode_basic, AuthProvider, AuthType, BasicAuth, BearerAuth, NoAuth, PasscodeAuth, PASSCODE_HEADER};
pub use builder::{
    validate_max_items, validate_oauth, validate_one_of, validate_required, Executor, RequestBuilder, Validator,
    MAX_BULK_PROJECTS,
};
pub use client::{Body, RequestOptions, ResponseShape, SonarClient};
pub use deprecation::DeprecationRegistry;
pub use download::{DownloadChunk, DownloadProgress, DownloadStream};
pub use error::{ErrorKind, Result, SonarError};
pub use output::PrettyPrint;
pub use pagination::{has_more_by_flag, has_more_by_total, Page, PageStream, PageStyle, PaginatedBuilder, Paging};
pub use query::{ParsedQuery, QueryParams, QueryValue};

// Re-export models
pub use models::{
    // Projects
    BulkDeleteBuilder,
    Project,
    ProjectSearchBuilder,
    ProjectSearchResponse,
    // Users
    User,
    UserSearchBuilder,
    UserSearchResponse,
    // DevOps platform integrations
    BitbucketServerRepo,
    BitbucketServerRepoSearchBuilder,
    BitbucketServerRepoSearchResponse,
    CreateGithubBuilder,
    // Permissions
    BulkApplyTemplateBuilder,
    // Badges and reports
    BadgeMetric,
};

// Re-export convenience functions
pub use models::{bulk_apply_template, create_github_setting, search_bitbucket_server_repos};
pub use models::{download_regulatory_report, project_badge};
