//! Resolution of configured mobile notify services.

use super::channels::NOTIFY_DOMAIN;
use crate::error::Result;
use crate::hass::{ServiceCatalog, ServiceRegistry};
use log::info;

/// Strip an optional `notify.` prefix from a configured service name.
pub fn service_name(configured: &str) -> &str {
    let configured = configured.trim();
    configured.strip_prefix("notify.").unwrap_or(configured)
}

/// Keep the configured services that exist in `catalog`, prefix stripped.
pub fn filter_available(catalog: &ServiceCatalog, configured: &[String]) -> Vec<String> {
    let mut available: Vec<String> = Vec::new();

    for configured in configured {
        let service = service_name(configured);
        if catalog.has_service(NOTIFY_DOMAIN, service) {
            info!("- Service '{}' is available", service);
            if !available.iter().any(|s| s == service) {
                available.push(service.to_string());
            }
        } else {
            info!("- Service '{}' is NOT available", service);
        }
    }

    available
}

/// Look up the configured services in Home Assistant. Skips discovery when
/// nothing is configured.
pub async fn resolve_mobile_services<R>(registry: &R, configured: &[String]) -> Result<Vec<String>>
where
    R: ServiceRegistry + ?Sized,
{
    info!("{} notify service(s) defined.", configured.len());
    if configured.is_empty() {
        return Ok(Vec::new());
    }

    let catalog = registry.get_services().await?;
    Ok(filter_available(&catalog, configured))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NotifierError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingRegistry {
        catalog: ServiceCatalog,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ServiceRegistry for CountingRegistry {
        async fn get_services(&self) -> Result<ServiceCatalog> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.catalog.clone())
        }
    }

    struct FailingRegistry;

    #[async_trait]
    impl ServiceRegistry for FailingRegistry {
        async fn get_services(&self) -> Result<ServiceCatalog> {
            Err(NotifierError::ConnectionClosed)
        }
    }

    fn catalog() -> ServiceCatalog {
        [
            ("notify", "mobile_app_phone"),
            ("notify", "mobile_app_tablet"),
            ("persistent_notification", "create"),
        ]
        .into_iter()
        .map(|(d, s)| (d.to_string(), s.to_string()))
        .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_service_name_strips_prefix() {
        assert_eq!(service_name("notify.mobile_app_phone"), "mobile_app_phone");
        assert_eq!(service_name("mobile_app_phone"), "mobile_app_phone");
        assert_eq!(service_name("notify.notify.x"), "notify.x");
    }

    #[test]
    fn test_service_name_trims_before_stripping() {
        assert_eq!(service_name(" notify.mobile_app_phone"), "mobile_app_phone");
        assert_eq!(service_name("notify.mobile_app_phone \n"), "mobile_app_phone");
        assert_eq!(service_name("  mobile_app_watch  "), "mobile_app_watch");
    }

    #[test]
    fn test_filter_available() {
        let configured = names(&[
            "notify.mobile_app_phone",
            "mobile_app_watch",
            "mobile_app_tablet",
            "notify.create",
        ]);
        assert_eq!(
            filter_available(&catalog(), &configured),
            names(&["mobile_app_phone", "mobile_app_tablet"])
        );
    }

    #[test]
    fn test_prefixed_and_plain_name_collapse() {
        let configured = names(&["notify.mobile_app_phone", "mobile_app_phone"]);
        assert_eq!(
            filter_available(&catalog(), &configured),
            names(&["mobile_app_phone"])
        );
    }

    #[tokio::test]
    async fn test_no_discovery_without_configured_services() {
        let registry = CountingRegistry {
            catalog: catalog(),
            calls: AtomicUsize::new(0),
        };
        let resolved = resolve_mobile_services(&registry, &[]).await.unwrap();
        assert!(resolved.is_empty());
        assert_eq!(registry.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_resolve_queries_registry_once() {
        let registry = CountingRegistry {
            catalog: catalog(),
            calls: AtomicUsize::new(0),
        };
        let resolved =
            resolve_mobile_services(&registry, &names(&["notify.mobile_app_phone", "gone"]))
                .await
                .unwrap();
        assert_eq!(resolved, names(&["mobile_app_phone"]));
        assert_eq!(registry.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discovery_failure_propagates() {
        let result = resolve_mobile_services(&FailingRegistry, &names(&["mobile_app_phone"])).await;
        assert!(matches!(result, Err(NotifierError::ConnectionClosed)));
    }
}
