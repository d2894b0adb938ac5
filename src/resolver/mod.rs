//! Resolver backends used to perform discovery lookups.

use crate::LookupKind;
use async_trait::async_trait;
use std::{error::Error, sync::Arc};

#[cfg(feature = "hickory")]
pub mod hickory;

/// Represents the ability to resolve a discovery name into `host:port` addresses.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Errors encountered during a lookup.
    type Error: Error + Send + Sync + 'static;

    /// Resolves `name` according to `kind`.
    ///
    /// An `Err` means the lookup failed and says nothing about the current
    /// state of `name`; an empty `Ok` means the lookup succeeded and nothing
    /// currently matches.
    async fn resolve(&self, name: &str, kind: LookupKind) -> Result<Vec<String>, Self::Error>;
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    type Error = R::Error;

    async fn resolve(&self, name: &str, kind: LookupKind) -> Result<Vec<String>, Self::Error> {
        (**self).resolve(name, kind).await
    }
}

#[async_trait]
impl<'r, R: Resolver + ?Sized> Resolver for &'r R {
    type Error = R::Error;

    async fn resolve(&self, name: &str, kind: LookupKind) -> Result<Vec<String>, Self::Error> {
        (**self).resolve(name, kind).await
    }
}

/// Splits `name` into a host and an optional port.
///
/// Bracketed IPv6 hosts (`[::1]:80`) are unwrapped. A name that cannot be
/// split unambiguously (e.g. a bare IPv6 address) is returned whole as the host.
pub fn split_host_port(name: &str) -> (&str, Option<&str>) {
    if let Some(rest) = name.strip_prefix('[') {
        return match rest.split_once(']') {
            Some((host, "")) => (host, None),
            Some((host, port)) => match port.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => (name, None),
            },
            None => (name, None),
        };
    }

    match name.rsplit_once(':') {
        Some((host, port)) if !host.contains(':') => (host, Some(port)),
        _ => (name, None),
    }
}

/// Joins a host and port, bracketing IPv6 hosts.
pub(crate) fn join_host_port(host: &str, port: impl std::fmt::Display) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
