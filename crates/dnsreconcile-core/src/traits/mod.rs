//! Core traits for the reconciliation engine
//!
//! - [`DnsProvider`]: Read and replace record sets via a provider API
//! - [`DnsProviderFactory`]: Build providers from configuration and declare their capabilities

pub mod dns_provider;

pub use dns_provider::{DnsProvider, DnsProviderFactory};
