//! Discovery resolver backed by [`hickory_resolver`].

use super::{join_host_port, split_host_port, Resolver};
use crate::LookupKind;
use async_trait::async_trait;
use hickory_resolver::{
    name_server::ConnectionProvider, Name, ResolveError, Resolver as HickoryResolver,
};
use std::net::{IpAddr, SocketAddr};

/// Errors encountered by the [`hickory_resolver`] backend.
#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    /// An address lookup was requested for a name without a port
    #[error("missing port in address given for dns lookup: {0}")]
    MissingPort(String),
    /// The port given alongside a name is not a valid port number
    #[error("invalid port in address given for dns lookup: {0}")]
    InvalidPort(String),
    /// The underlying DNS query failed
    #[error("dns lookup failed: {0}")]
    Resolve(#[from] ResolveError),
}

#[async_trait]
impl<P> Resolver for HickoryResolver<P>
where
    P: ConnectionProvider,
{
    type Error = LookupError;

    async fn resolve(&self, name: &str, kind: LookupKind) -> Result<Vec<String>, Self::Error> {
        let (host, port) = split_host_port(name);
        let parse_port = || {
            port.map(|port| {
                port.parse::<u16>()
                    .map_err(|_| LookupError::InvalidPort(name.to_string()))
            })
            .transpose()
        };

        match kind {
            LookupKind::Static => Ok(vec![name.to_string()]),
            LookupKind::Address => {
                let port = parse_port()?
                    .ok_or_else(|| LookupError::MissingPort(name.to_string()))?;
                if host.parse::<IpAddr>().is_ok() {
                    return Ok(vec![name.to_string()]);
                }
                Ok(ip_addresses(self, host)
                    .await?
                    .into_iter()
                    .map(|ip| SocketAddr::new(ip, port).to_string())
                    .collect())
            }
            LookupKind::Service | LookupKind::ServiceNoAdditional => {
                let port = parse_port()?;
                let lookup = match self.srv_lookup(host).await {
                    Ok(lookup) => lookup,
                    Err(e) if e.is_no_records_found() => {
                        #[cfg(feature = "log")]
                        tracing::debug!(%name, "no SRV records found");
                        return Ok(Vec::new());
                    }
                    Err(e) => return Err(e.into()),
                };

                let mut addresses = Vec::new();
                for record in lookup.iter() {
                    let target = record.target();
                    // A root target means the service is decidedly not available.
                    if target.is_root() {
                        continue;
                    }
                    // An explicit port in the name wins over the record's.
                    let port = port.unwrap_or_else(|| record.port());

                    if kind == LookupKind::ServiceNoAdditional {
                        addresses.push(join_host_port(&host_name(target), port));
                        continue;
                    }

                    addresses.extend(
                        ip_addresses(self, &target.to_utf8())
                            .await?
                            .into_iter()
                            .map(|ip| SocketAddr::new(ip, port).to_string()),
                    );
                }
                Ok(addresses)
            }
        }
    }
}

/// Renders `name` as a host, without the trailing root label.
fn host_name(name: &Name) -> String {
    name.to_utf8().trim_end_matches('.').to_string()
}

/// Looks up the IP addresses of `host`, treating an answer without records as empty.
async fn ip_addresses<P>(resolver: &HickoryResolver<P>, host: &str) -> Result<Vec<IpAddr>, ResolveError>
where
    P: ConnectionProvider,
{
    match resolver.lookup_ip(host).await {
        Ok(lookup) => Ok(lookup.iter().collect()),
        Err(e) if e.is_no_records_found() => {
            #[cfg(feature = "log")]
            tracing::debug!(%host, "no address records found");
            Ok(Vec::new())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hickory_resolver::{config::ResolverConfig, name_server::TokioConnectionProvider};

    type TokioResolver = HickoryResolver<TokioConnectionProvider>;

    const EXAMPLE_SRV: &str = "_detsys_ids._tcp.install.determinate.systems.";

    fn resolver() -> TokioResolver {
        HickoryResolver::builder_with_config(
            ResolverConfig::default(),
            TokioConnectionProvider::default(),
        )
        .build()
    }

    #[tokio::test]
    async fn static_name_is_returned_verbatim() {
        let addresses = resolver()
            .resolve("example.com:90", LookupKind::Static)
            .await
            .unwrap();
        assert_eq!(addresses, vec!["example.com:90".to_string()]);
    }

    #[tokio::test]
    async fn ip_literal_skips_lookup() {
        let resolver = resolver();
        let v4 = resolver
            .resolve("127.0.0.1:19091", LookupKind::Address)
            .await
            .unwrap();
        assert_eq!(v4, vec!["127.0.0.1:19091".to_string()]);

        let v6 = resolver.resolve("[::1]:9090", LookupKind::Address).await.unwrap();
        assert_eq!(v6, vec!["[::1]:9090".to_string()]);
    }

    #[tokio::test]
    async fn address_lookup_requires_port() {
        let err = resolver()
            .resolve("example.com", LookupKind::Address)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::MissingPort(name) if name == "example.com"));
    }

    #[tokio::test]
    async fn invalid_port() {
        let err = resolver()
            .resolve("example.com:http", LookupKind::Address)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::InvalidPort(_)));

        let err = resolver()
            .resolve("_grpc._tcp.example.com:99999", LookupKind::Service)
            .await
            .unwrap_err();
        assert!(matches!(err, LookupError::InvalidPort(_)));
    }

    #[test]
    fn host_name_drops_root_label() {
        let fqdn = Name::from_ascii("store-0.example.com.").unwrap();
        assert_eq!(host_name(&fqdn), "store-0.example.com");

        let relative = Name::from_ascii("store-0").unwrap();
        assert_eq!(host_name(&relative), "store-0");
    }

    #[tokio::test]
    async fn srv_targets_verbatim() -> Result<(), LookupError> {
        let addresses = TokioResolver::builder_tokio()?
            .build()
            .resolve(EXAMPLE_SRV, LookupKind::ServiceNoAdditional)
            .await?;
        assert_ne!(addresses.len(), 0);
        for address in &addresses {
            let (host, port) = split_host_port(address);
            assert!(!host.ends_with('.'), "{address}");
            assert!(host.parse::<IpAddr>().is_err(), "{address}");
            port.unwrap().parse::<u16>().unwrap();
        }
        Ok(())
    }

    #[tokio::test]
    async fn srv_targets_resolved_to_ips() -> Result<(), LookupError> {
        let addresses = TokioResolver::builder_tokio()?
            .build()
            .resolve(EXAMPLE_SRV, LookupKind::Service)
            .await?;
        assert_ne!(addresses.len(), 0);
        for address in &addresses {
            address.parse::<SocketAddr>().unwrap();
        }
        Ok(())
    }

    #[tokio::test]
    async fn explicit_port_overrides_srv_port() -> Result<(), LookupError> {
        let resolver = TokioResolver::builder_tokio()?.build();
        let name = format!("{EXAMPLE_SRV}:8443");

        let verbatim = resolver
            .resolve(&name, LookupKind::ServiceNoAdditional)
            .await?;
        assert_ne!(verbatim.len(), 0);
        assert!(verbatim.iter().all(|a| a.ends_with(":8443")), "{verbatim:?}");

        let resolved = resolver.resolve(&name, LookupKind::Service).await?;
        assert_ne!(resolved.len(), 0);
        assert!(
            resolved
                .iter()
                .all(|a| a.parse::<SocketAddr>().unwrap().port() == 8443),
            "{resolved:?}"
        );
        Ok(())
    }

    #[tokio::test]
    async fn missing_srv_records_are_empty() -> Result<(), LookupError> {
        let resolver = TokioResolver::builder_tokio()?.build();
        for kind in [LookupKind::Service, LookupKind::ServiceNoAdditional] {
            let addresses = resolver.resolve("_http._tcp.foobar.deshaw.com", kind).await?;
            assert_eq!(addresses, Vec::<String>::new());
        }
        Ok(())
    }
}
