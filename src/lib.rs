#![deny(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

/*!
Self-refreshing discovery cache for locating peer services through DNS.

# Introduction

Nodes of a distributed service rarely know each other's IP addresses ahead of
time. Instead they are configured with a list of *specifications*, each either
a literal `host:port` address or a DNS query, for instance:

```text
10.0.0.12:10901
dns+store.example.com:10901
dnssrv+_grpc._tcp.store.example.com
dnssrvnoa+_grpc._tcp.store.example.com
```

The scheme before the `+` selects the lookup:

- `dns+host:port` (or `any+host:port`): A/AAAA lookup of `host`, keeping `port`.
- `dnssrv+name`: SRV lookup of `name`, resolving each target to its IP addresses.
- `dnssrvnoa+name`: SRV lookup of `name`, using each target name as-is.

Anything else is a literal address and is never looked up.

[`Provider`] turns such a list into a flat list of addresses. Something
outside the provider calls [`Provider::resolve`] on a fixed cadence with the
current list; anything may call [`Provider::addresses`] at any time to read
the result of the latest cycle.

# Failure handling

A lookup that fails keeps the addresses it produced in the previous cycle, so
one unreachable name never blanks out an otherwise healthy fleet. A lookup
that succeeds with no records empties its entry. Specifications left out of a
cycle are dropped, together with their metric series.

# Resolvers

Lookups go through the [`Resolver`] trait. The `hickory` feature (enabled by
default) implements it for [`hickory_resolver::Resolver`].

[`Resolver`]: resolver::Resolver
*/

pub mod provider;
pub use provider::{Error, Provider};

mod specification;
pub use specification::{is_dynamic, LookupKind, Specification};

pub mod resolver;
