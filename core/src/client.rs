//! Mapping-driven API client.
//!
//! # Design
//! `ApiClient` owns the configuration, the signer, the operation registry and
//! the transport. Construction loads the mapping document once and runs the
//! startup checks in a fixed order, stopping at the first failure:
//!
//! 1. secret key format
//! 2. public key format
//! 3. at least one operation loaded
//! 4. base URL and base path present
//! 5. a signed `GET users` probe returning a non-empty body
//!
//! Request construction (`build_request`) is pure given an instant, so it
//! can be tested without a network; `call` adds the current time and the
//! round-trip.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::args::CallArgs;
use crate::config::{is_valid_key, ClientConfig};
use crate::error::{ApiError, ConfigError};
use crate::http::{HttpMethod, HttpRequest};
use crate::mapping::MappingTable;
use crate::registry::{Operation, OperationRegistry};
use crate::signer::RequestSigner;
use crate::transport::{Invoker, Transport, UreqTransport};

/// Path, relative to the base path, used for the connectivity probe.
pub const PROBE_PATH: &str = "users";

/// Client exposing every operation in a mapping document by name.
#[derive(Debug)]
pub struct ApiClient<T = UreqTransport> {
    config: ClientConfig,
    signer: RequestSigner,
    registry: OperationRegistry,
    invoker: Invoker<T>,
}

impl ApiClient<UreqTransport> {
    /// Load `config.mapping_path`, verify, and talk to the service over ureq.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        Self::with_transport(config, UreqTransport::new())
    }
}

impl<T: Transport> ApiClient<T> {
    pub fn with_transport(config: ClientConfig, transport: T) -> Result<Self, ApiError> {
        let table = MappingTable::load(&config.mapping_path, None)?;
        Self::with_table(config, table, transport)
    }

    /// Build a client from an already resolved table. Verification still runs.
    pub fn with_table(
        config: ClientConfig,
        table: MappingTable,
        transport: T,
    ) -> Result<Self, ApiError> {
        verify_settings(&config, &table)?;

        let signer = RequestSigner::new(&config.public_key, &config.secret_key)?;
        let verbose = config.verbose;
        let client = Self {
            signer,
            registry: OperationRegistry::new(Arc::new(table)),
            invoker: Invoker::new(transport, verbose),
            config,
        };

        client.check_connectivity()?;
        if verbose {
            tracing::info!(operations = client.registry.table().len(), "verification passed");
        }
        Ok(client)
    }

    /// Call `operation` with `args` and return the raw response body.
    pub fn call(&self, operation: &str, args: &CallArgs) -> Result<String, ApiError> {
        let request = self.build_request(operation, args, Utc::now())?;
        Ok(self.invoker.invoke(&request)?)
    }

    /// Resolve, bind and sign `operation` as of `at`, without sending it.
    pub fn build_request(
        &self,
        operation: &str,
        args: &CallArgs,
        at: DateTime<Utc>,
    ) -> Result<HttpRequest, ApiError> {
        let resolved = self.registry.resolve(operation)?.bind(args)?;
        let body = resolved.body()?;
        Ok(self.signed_request(resolved.method, &resolved.path, body, at))
    }

    /// The memoized operation handle for `name`.
    pub fn operation(&self, name: &str) -> Result<Arc<Operation>, ApiError> {
        self.registry.resolve(name)
    }

    pub fn has_operation(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// Every operation name in the mapping table, sorted.
    pub fn operation_names(&self) -> Vec<&str> {
        self.registry.table().names()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        self.invoker.transport()
    }

    fn signed_request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<String>,
        at: DateTime<Utc>,
    ) -> HttpRequest {
        let request_path = format!("{}{path}", self.config.base_path);
        let headers = self.signer.sign(&request_path, body.as_deref(), at);
        HttpRequest {
            method,
            url: format!("{}{request_path}", self.config.base_url),
            headers: headers.into_headers(),
            body,
        }
    }

    fn check_connectivity(&self) -> Result<(), ConfigError> {
        let probe = self.signed_request(HttpMethod::Get, PROBE_PATH, None, Utc::now());
        match self.invoker.invoke_or_none(&probe) {
            Some(body) if !body.is_empty() => Ok(()),
            _ => Err(ConfigError::ConnectivityCheckFailed),
        }
    }
}

/// The offline startup checks, in order.
fn verify_settings(config: &ClientConfig, table: &MappingTable) -> Result<(), ConfigError> {
    if !is_valid_key(&config.secret_key) {
        return Err(ConfigError::InvalidSecretKey);
    }
    if !is_valid_key(&config.public_key) {
        return Err(ConfigError::InvalidPublicKey);
    }
    if table.is_empty() {
        return Err(ConfigError::EmptyMapping);
    }
    if config.base_url.is_empty() || config.base_path.is_empty() {
        return Err(ConfigError::InvalidBaseUrl);
    }
    Ok(())
}
