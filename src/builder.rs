//! Parameter builders with a single `execute()` entry point.
//!
//! A [`RequestBuilder`] accumulates query parameters through chained setters
//! and hands a snapshot of them to an injected executor closure. Endpoint
//! modules wrap it in their own builder types with typed setters.

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};

use crate::deprecation::DeprecationRegistry;
use crate::error::{Result, SonarError};
use crate::query::{QueryParams, QueryValue};

/// Largest project list accepted by bulk endpoints.
pub const MAX_BULK_PROJECTS: usize = 1000;

/// Performs the request for a parameter snapshot.
pub type Executor<Res> = Arc<dyn Fn(QueryParams) -> BoxFuture<'static, Result<Res>> + Send + Sync>;

/// Checks parameters before any request is made.
pub type Validator = Arc<dyn Fn(&QueryParams) -> Result<()> + Send + Sync>;

/// Generic parameter accumulator.
pub struct RequestBuilder<Res> {
    params: QueryParams,
    executor: Executor<Res>,
    validators: Vec<Validator>,
    deprecations: Arc<DeprecationRegistry>,
}

impl<Res> Clone for RequestBuilder<Res> {
    fn clone(&self) -> Self {
        Self {
            params: self.params.clone(),
            executor: Arc::clone(&self.executor),
            validators: self.validators.clone(),
            deprecations: Arc::clone(&self.deprecations),
        }
    }
}

impl<Res> std::fmt::Debug for RequestBuilder<Res> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("params", &self.params)
            .field("validators", &self.validators.len())
            .finish_non_exhaustive()
    }
}

impl<Res: Send + 'static> RequestBuilder<Res> {
    /// Create a builder around `executor`.
    pub fn new<F, Fut>(executor: F) -> Self
    where
        F: Fn(QueryParams) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res>> + Send + 'static,
    {
        Self {
            params: QueryParams::new(),
            executor: Arc::new(move |params| executor(params).boxed()),
            validators: Vec::new(),
            deprecations: DeprecationRegistry::global(),
        }
    }

    /// Set one parameter.
    #[must_use]
    pub fn set(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params.set(key, value);
        self
    }

    /// Set one parameter if present.
    #[must_use]
    pub fn set_opt<V: Into<QueryValue>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.params.set_opt(key, value);
        self
    }

    /// Register a check run by `execute()` before the executor.
    #[must_use]
    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&QueryParams) -> Result<()> + Send + Sync + 'static,
    {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Use `registry` instead of the process-wide one.
    #[must_use]
    pub fn with_deprecations(mut self, registry: Arc<DeprecationRegistry>) -> Self {
        self.deprecations = registry;
        self
    }

    /// Emit a deprecation warning for `name`, at most once per registry.
    #[must_use]
    pub fn deprecated(self, name: &str, message: &str) -> Self {
        self.deprecations.warn_once(name, message);
        self
    }

    pub fn params(&self) -> &QueryParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut QueryParams {
        &mut self.params
    }

    /// Run every registered validator.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure.
    pub fn validate(&self) -> Result<()> {
        self.validators.iter().try_for_each(|v| v(&self.params))
    }

    /// Validate, then run the executor with a snapshot of the parameters.
    ///
    /// # Errors
    ///
    /// Returns a validation error without touching the network, or whatever
    /// error the executor produces.
    pub async fn execute(&self) -> Result<Res> {
        self.validate()?;
        (self.executor)(self.params.clone()).await
    }
}

/// Require `field` to be present and non-empty.
///
/// # Errors
///
/// Returns a validation error naming `field`.
pub fn validate_required(params: &QueryParams, field: &str) -> Result<()> {
    if is_present(params.get(field)) {
        Ok(())
    } else {
        Err(SonarError::validation(field, format!("{field} is required")))
    }
}

/// Require at least one of `fields`.
///
/// # Errors
///
/// Returns a validation error naming the first field.
pub fn validate_one_of(params: &QueryParams, fields: &[&str]) -> Result<()> {
    if fields.iter().any(|f| is_present(params.get(f))) {
        return Ok(());
    }
    let first = fields.first().copied().unwrap_or_default();
    Err(SonarError::validation(
        first,
        format!("One of {} is required", fields.join(", ")),
    ))
}

/// Cap the number of entries in a list parameter.
///
/// # Errors
///
/// Returns a validation error naming `field` if it has more than `max` entries.
pub fn validate_max_items(params: &QueryParams, field: &str, max: usize) -> Result<()> {
    match params.get(field) {
        Some(QueryValue::List(items)) if items.len() > max => Err(SonarError::validation(
            field,
            format!("{field} accepts at most {max} entries, got {}", items.len()),
        )),
        _ => Ok(()),
    }
}

/// OAuth client credentials are only meaningful as a pair.
///
/// # Errors
///
/// Returns a validation error naming whichever of the two is missing.
pub fn validate_oauth(params: &QueryParams, client_id_field: &str, client_secret_field: &str) -> Result<()> {
    let has_id = is_present(params.get(client_id_field));
    let has_secret = is_present(params.get(client_secret_field));
    match (has_id, has_secret) {
        (true, true) => Ok(()),
        (false, _) => Err(SonarError::validation(
            client_id_field,
            format!("{client_id_field} is required for OAuth configuration"),
        )),
        (true, false) => Err(SonarError::validation(
            client_secret_field,
            format!("{client_secret_field} is required when {client_id_field} is set"),
        )),
    }
}

fn is_present(value: Option<&QueryValue>) -> bool {
    match value {
        None => false,
        Some(QueryValue::Str(s)) => !s.trim().is_empty(),
        Some(QueryValue::List(items)) => !items.is_empty(),
        Some(_) => true,
    }
}
