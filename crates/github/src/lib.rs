//! GitHub adapter for the issue bot.
//!
//! Implements [`pipeline::Authenticator`] with GitHub App credentials and
//! [`pipeline::IssueTracker`] over the REST API. Rate limiting, pagination and
//! retry all live here; the orchestration layer never sees a status code.
//!
//! | Module | Contents |
//! |--------|----------|
//! | `auth` | [`AppAuthenticator`]: App JWT to installation token |
//! | `client` | [`GithubClient`]: contents, comments, pull requests |
//! | `connector` | [`GithubConnector`]: per-run client construction |
//! | `http` | [`GithubApiConfig`] and the shared retry loop |

mod auth;
mod client;
mod connector;
mod http;

pub use auth::AppAuthenticator;
pub use client::GithubClient;
pub use connector::GithubConnector;
pub use http::{GithubApiConfig, DEFAULT_API_BASE};
