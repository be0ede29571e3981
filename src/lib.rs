//! # GitGuardian Lambda Extension
//!
//! **Secret redaction for serverless function responses.**
//!
//! The extension runs next to the function inside its execution environment and
//! stands in for the Lambda runtime API. Every invocation response the function
//! returns is scanned by the GitGuardian API, and matched secrets are replaced
//! with `[REDACTED]` before the response reaches the real runtime API.
//! Scanning failures never block a response.
//!
//! ## Architecture
//!
//! - **[`proxy`]**: axum server mimicking the four runtime API routes
//! - **[`pipeline`]**: fail-open segment → scan → redact
//! - **[`scan`]**: document segmentation and the GitGuardian multiscan client
//! - **[`redact`]**: finding normalization, span merging and text rewriting
//! - **[`credential`]**: memoized API key retrieval from SSM Parameter Store
//! - **[`lifecycle`]**: extension registration and event loop
//! - **[`cli`]**: command-line flags (clap)
//! - **[`config`]**: TOML / environment configuration
//! - **[`error`]**: unified error type using `thiserror`
//!
//! ## Deployment
//!
//! ```bash
//! # Inside the execution environment, point the function runtime at the proxy
//! export AWS_LAMBDA_RUNTIME_API=127.0.0.1:9009
//! ```

pub mod cli;
pub mod config;
pub mod credential;
pub mod error;
pub mod lifecycle;
pub mod pipeline;
pub mod proxy;
pub mod redact;
pub mod scan;
