//! Declarative REST API client driven by an endpoint mapping document.
//!
//! # Overview
//! Instead of one hand-written function per endpoint, the client loads a
//! JSON mapping document (path template, HTTP verb, body attributes per
//! operation) and synthesizes each operation on first use. Every call binds
//! its named arguments to path placeholders or body attributes, signs the
//! request with the `APIAuth` HMAC-SHA1 scheme and sends it through a
//! `Transport`.
//!
//! # Design
//! - `mapping` resolves the document once; the table is read-only afterwards.
//! - `registry` memoizes operations by name and binds arguments on a fresh
//!   copy of the template, path placeholders first.
//! - `signer` builds the `Content-MD5`, `Date` and `Authorization` headers.
//! - `transport` is the I/O seam; `client` ties everything together and runs
//!   the startup verification.
//!
//! ```no_run
//! use apimap_core::{ApiClient, CallArgs, ClientConfig};
//!
//! let config = ClientConfig::from_env().with_mapping_path("ApiMap.json");
//! let client = ApiClient::new(config)?;
//! let user = client.call("getUser", &CallArgs::new().arg("id", 42))?;
//! println!("{user}");
//! # Ok::<(), apimap_core::ApiError>(())
//! ```

pub mod args;
pub mod client;
pub mod config;
pub mod error;
pub mod http;
pub mod mapping;
pub mod registry;
pub mod signer;
pub mod transport;

pub use args::CallArgs;
pub use client::ApiClient;
pub use config::ClientConfig;
pub use error::{ApiError, ConfigError, TransportError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use mapping::{EndpointMapping, MappingTable};
pub use registry::{Operation, OperationRegistry, ResolvedOperation};
pub use signer::{RequestSigner, SignedHeaders};
pub use transport::{Invoker, Transport, UreqTransport};
