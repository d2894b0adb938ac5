//! Discovery specifications.

use std::fmt::{self, Display};

/// Separates a lookup scheme from the name it applies to, e.g. `dnssrv+_grpc._tcp.example.com`.
const SCHEME_SEPARATOR: char = '+';

/// How a [`Specification`] is turned into addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LookupKind {
    /// No lookup; the specification is itself a `host:port` address.
    Static,
    /// A/AAAA lookup of a `host:port` name, keeping the given port.
    Address,
    /// SRV lookup whose targets are further resolved to IP addresses.
    Service,
    /// SRV lookup whose targets are used as-is, without resolving them further.
    ServiceNoAdditional,
}

impl LookupKind {
    /// Maps a scheme (the text before the first `+`) onto a lookup kind.
    ///
    /// The set of schemes is closed; unknown schemes yield `None`.
    fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme {
            "dns" | "any" => Some(Self::Address),
            "dnssrv" => Some(Self::Service),
            "dnssrvnoa" => Some(Self::ServiceNoAdditional),
            _ => None,
        }
    }

    /// Canonical scheme for this kind, or `None` for [`LookupKind::Static`].
    pub fn scheme(self) -> Option<&'static str> {
        match self {
            Self::Static => None,
            Self::Address => Some("dns"),
            Self::Service => Some("dnssrv"),
            Self::ServiceNoAdditional => Some("dnssrvnoa"),
        }
    }
}

impl Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.scheme().unwrap_or("static"))
    }
}

/// A classified discovery specification.
///
/// Borrows from the caller-supplied string; the original string stays the
/// identity of the specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Specification<'a> {
    kind: LookupKind,
    name: &'a str,
}

impl<'a> Specification<'a> {
    /// Classifies a specification string.
    ///
    /// Every string classifies: anything without a recognized `scheme+`
    /// prefix is a [`LookupKind::Static`] address whose name is the whole
    /// string.
    pub fn parse(spec: &'a str) -> Self {
        spec.split_once(SCHEME_SEPARATOR)
            .and_then(|(scheme, name)| {
                LookupKind::from_scheme(scheme).map(|kind| Specification { kind, name })
            })
            .unwrap_or(Specification {
                kind: LookupKind::Static,
                name: spec,
            })
    }

    /// Gets the specification's lookup kind.
    pub fn kind(&self) -> LookupKind {
        self.kind
    }

    /// Gets the name to resolve (or, for static specifications, the address).
    pub fn name(&self) -> &'a str {
        self.name
    }
}

/// Returns whether `spec` requires a lookup, i.e. is not a static address.
pub fn is_dynamic(spec: &str) -> bool {
    Specification::parse(spec).kind() != LookupKind::Static
}
