//! Azure AD Graph directory API access.

pub mod client;
pub mod request;

pub use client::GraphClient;
pub use request::DirectoryRequest;
