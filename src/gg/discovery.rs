// Server discovery
// Finding the address of the server that handles an account is left to the
// embedding application; the client only calls into this trait.

use std::net::IpAddr;
use std::sync::Arc;

use crate::models::Uin;

/// Looks up the server responsible for an account.
#[async_trait::async_trait]
pub trait ServerDiscovery: Send + Sync {
    /// `Ok(None)` means the lookup worked but no server was found.
    async fn resolve(&self, uin: Uin) -> anyhow::Result<Option<IpAddr>>;
}

/// Adapts a blocking lookup function into a [`ServerDiscovery`]; the
/// function runs on the blocking thread pool.
pub struct FnDiscovery<F> {
    lookup: Arc<F>,
}

impl<F> FnDiscovery<F>
where
    F: Fn(Uin) -> Option<IpAddr> + Send + Sync + 'static,
{
    pub fn new(lookup: F) -> Self {
        FnDiscovery {
            lookup: Arc::new(lookup),
        }
    }
}

#[async_trait::async_trait]
impl<F> ServerDiscovery for FnDiscovery<F>
where
    F: Fn(Uin) -> Option<IpAddr> + Send + Sync + 'static,
{
    async fn resolve(&self, uin: Uin) -> anyhow::Result<Option<IpAddr>> {
        let lookup = self.lookup.clone();
        let addr = tokio::task::spawn_blocking(move || lookup(uin)).await?;
        Ok(addr)
    }
}

/// Always answers with the same address.
pub struct StaticDiscovery(pub IpAddr);

#[async_trait::async_trait]
impl ServerDiscovery for StaticDiscovery {
    async fn resolve(&self, _uin: Uin) -> anyhow::Result<Option<IpAddr>> {
        Ok(Some(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_fn_discovery_runs_lookup() {
        let discovery = FnDiscovery::new(|uin| {
            if uin == 1 {
                Some(IpAddr::V4(Ipv4Addr::new(91, 214, 237, 10)))
            } else {
                None
            }
        });
        assert_eq!(
            discovery.resolve(1).await.unwrap(),
            Some(IpAddr::V4(Ipv4Addr::new(91, 214, 237, 10)))
        );
        assert_eq!(discovery.resolve(2).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_static_discovery() {
        let discovery = StaticDiscovery(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(
            discovery.resolve(99).await.unwrap(),
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
    }
}
