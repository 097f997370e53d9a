//! Azure AD authentication module.
//!
//! Provides client-credentials token acquisition and optional per-tenant
//! token reuse.

pub mod oauth;
pub mod token_cache;

pub use oauth::{AccessToken, ClientCredentialProvider, TokenProvider};
pub use token_cache::CachedTokenProvider;
