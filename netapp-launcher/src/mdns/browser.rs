use std::collections::HashMap;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;
use mdns_sd::{ServiceDaemon, ServiceEvent};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::Future;
use anyhow::{Context, Result};
use shared::types::ServiceInfo;
use crate::app::AppHandle;

/// What the discovery client reports for a browsed service type
#[derive(Debug, Clone)]
pub enum DiscoveryEvent {
    Resolved(ServiceInfo),
    Removed(String),
}

type RecvResult = (usize, flume::Receiver<ServiceEvent>, std::result::Result<ServiceEvent, flume::RecvError>);
type RecvFuture = Pin<Box<dyn Future<Output = RecvResult> + Send>>;

/// Each future owns a clone of the receiver, avoiding borrow issues with the
/// receivers vec. flume::Receiver is Clone (multi-consumer).
fn make_recv_future(idx: usize, rx: flume::Receiver<ServiceEvent>) -> RecvFuture {
    Box::pin(async move {
        let result = rx.recv_async().await;
        (idx, rx, result)
    })
}

/// Browse the given service types until cancelled, forwarding add/remove
/// events to the update loop.
pub async fn run_browser(
    daemon: ServiceDaemon,
    service_types: Vec<String>,
    app: AppHandle,
    cancel: CancellationToken,
) -> Result<()> {
    let mut type_futures: FuturesUnordered<RecvFuture> = FuturesUnordered::new();
    for (idx, service_type) in service_types.iter().enumerate() {
        let receiver = daemon
            .browse(service_type)
            .with_context(|| format!("Failed to browse {}", service_type))?;
        tracing::info!("Browsing for {}", service_type);
        type_futures.push(make_recv_future(idx, receiver));
    }

    loop {
        tokio::select! {
            Some((idx, rx, result)) = type_futures.next() => {
                match result {
                    Ok(ServiceEvent::ServiceResolved(info)) => {
                        if let Some(service) = convert_service_info(&info) {
                            tracing::debug!("Resolved service: {}", service.name);
                            if let Err(e) = app.discovery(DiscoveryEvent::Resolved(service)).await {
                                tracing::error!("Failed to send resolved event: {}", e);
                            }
                        }
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Ok(ServiceEvent::ServiceRemoved(_typ, fullname)) => {
                        tracing::debug!("Service removed: {}", fullname);
                        if let Err(e) = app.discovery(DiscoveryEvent::Removed(fullname)).await {
                            tracing::error!("Failed to send removed event: {}", e);
                        }
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Ok(_) => {
                        type_futures.push(make_recv_future(idx, rx));
                    }
                    Err(e) => {
                        tracing::warn!("Receiver for {} disconnected: {}", service_types[idx], e);
                    }
                }
            }

            _ = cancel.cancelled() => {
                tracing::info!("mDNS browser shutting down");
                break;
            }
        }
    }

    for service_type in &service_types {
        if let Err(e) = daemon.stop_browse(service_type) {
            tracing::debug!("Failed to stop browsing {}: {}", service_type, e);
        }
    }

    Ok(())
}

/// Convert an mdns-sd ServiceInfo to our ServiceInfo. IPv4 is preferred,
/// matching what browsers on the LAN are most likely to reach.
fn convert_service_info(info: &mdns_sd::ServiceInfo) -> Option<ServiceInfo> {
    let addresses = info.get_addresses();
    let address = addresses
        .iter()
        .filter(|addr| addr.is_ipv4())
        .min()
        .or_else(|| addresses.iter().min())
        .copied();

    let Some(address) = address else {
        tracing::debug!("Skipping service {} - no addresses", info.get_fullname());
        return None;
    };

    let properties: HashMap<String, Vec<u8>> = info
        .get_properties()
        .iter()
        .map(|prop| {
            let key = prop.key().to_string();
            let value = prop.val().map(<[u8]>::to_vec).unwrap_or_default();
            (key, value)
        })
        .collect();

    Some(ServiceInfo {
        name: info.get_fullname().to_string(),
        service_type: info.get_type().to_string(),
        hostname: info.get_hostname().to_string(),
        address,
        port: info.get_port(),
        properties,
    })
}
