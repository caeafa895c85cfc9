use std::ops::ControlFlow;
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::{AppDetail, AppManifest, AppRow, ServiceInfo};
use crate::launcher::{LaunchError, UrlOpener};
use crate::projection::Projection;
use crate::registry::{Registry, ResolutionTicket};
use crate::resolver::{Icon, Resolver};
pub use crate::mdns::browser::DiscoveryEvent;

/// Outcome of one resolution step, reported back to the update loop
#[derive(Debug)]
pub enum Resolution {
    Manifest(AppManifest),
    Icon(Icon),
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub visible: bool,
}

/// Commands consumed by the update loop
pub enum AppCommand {
    Discovery(DiscoveryEvent),
    Resolution(ResolutionTicket, Resolution),
    ListApps(oneshot::Sender<Vec<AppRow>>),
    GetApp(String, oneshot::Sender<Option<AppDetail>>),
    GetIcon(String, oneshot::Sender<Option<Icon>>),
    Launch(String, oneshot::Sender<Result<String, LaunchError>>),
    GetWindow(oneshot::Sender<WindowState>),
    SetWindowVisible(bool, oneshot::Sender<WindowState>),
    Close,
}

/// Handle to the update loop. Cheap to clone; holds no app state itself.
#[derive(Clone)]
pub struct AppHandle {
    tx: mpsc::Sender<AppCommand>,
}

/// Create the command channel feeding the update loop
pub fn channel() -> (AppHandle, mpsc::Receiver<AppCommand>) {
    let (tx, rx) = mpsc::channel::<AppCommand>(256);
    (AppHandle { tx }, rx)
}

impl AppHandle {
    pub async fn discovery(&self, event: DiscoveryEvent) -> Result<()> {
        self.tx.send(AppCommand::Discovery(event)).await?;
        Ok(())
    }

    pub async fn report(&self, ticket: ResolutionTicket, resolution: Resolution) -> Result<()> {
        self.tx.send(AppCommand::Resolution(ticket, resolution)).await?;
        Ok(())
    }

    /// Rows in display order
    pub async fn list_apps(&self) -> Result<Vec<AppRow>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AppCommand::ListApps(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn get_app(&self, name: String) -> Result<Option<AppDetail>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AppCommand::GetApp(name, reply)).await?;
        Ok(rx.await?)
    }

    pub async fn get_icon(&self, name: String) -> Result<Option<Icon>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AppCommand::GetIcon(name, reply)).await?;
        Ok(rx.await?)
    }

    /// Open a net app in the browser. Returns the URL that was opened;
    /// a `LaunchError` is carried inside the `anyhow::Error`.
    pub async fn launch(&self, name: String) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AppCommand::Launch(name, reply)).await?;
        Ok(rx.await??)
    }

    pub async fn window(&self) -> Result<WindowState> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AppCommand::GetWindow(reply)).await?;
        Ok(rx.await?)
    }

    pub async fn set_window_visible(&self, visible: bool) -> Result<WindowState> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(AppCommand::SetWindowVisible(visible, reply)).await?;
        Ok(rx.await?)
    }

    /// Close the window: ends discovery and the process
    pub async fn close(&self) -> Result<()> {
        self.tx.send(AppCommand::Close).await?;
        Ok(())
    }
}

/// Behaviour knobs for the update loop
#[derive(Debug, Clone)]
pub struct AppSettings {
    pub hide_on_launch: bool,
}

/// Everything the launcher window owns. Lives on the update loop task only.
pub struct AppContext {
    registry: Registry,
    projection: Projection,
    window: WindowState,
    resolver: Arc<Resolver>,
    opener: Arc<dyn UrlOpener>,
    settings: AppSettings,
    handle: AppHandle,
    hash_tx: watch::Sender<String>,
    cancel: CancellationToken,
}

impl AppContext {
    pub fn new(
        resolver: Resolver,
        opener: Arc<dyn UrlOpener>,
        settings: AppSettings,
        handle: AppHandle,
        hash_tx: watch::Sender<String>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry: Registry::new(),
            projection: Projection::new(),
            window: WindowState { visible: true },
            resolver: Arc::new(resolver),
            opener,
            settings,
            handle,
            hash_tx,
            cancel,
        }
    }

    fn publish_hash(&self) {
        let _ = self.hash_tx.send(self.projection.compute_hash());
    }

    fn handle_command(&mut self, cmd: AppCommand) -> ControlFlow<()> {
        match cmd {
            AppCommand::Discovery(DiscoveryEvent::Resolved(info)) => self.service_added(info),
            AppCommand::Discovery(DiscoveryEvent::Removed(name)) => self.service_removed(&name),
            AppCommand::Resolution(ticket, resolution) => self.resolution(ticket, resolution),
            AppCommand::ListApps(reply) => {
                let _ = reply.send(self.projection.to_app_rows());
            }
            AppCommand::GetApp(name, reply) => {
                let _ = reply.send(self.registry.get(&name).map(|entry| entry.detail()));
            }
            AppCommand::GetIcon(name, reply) => {
                let icon = self.projection.get(&name).and_then(|row| row.icon.clone());
                let _ = reply.send(icon);
            }
            AppCommand::Launch(name, reply) => {
                let _ = reply.send(self.launch(&name));
            }
            AppCommand::GetWindow(reply) => {
                let _ = reply.send(self.window);
            }
            AppCommand::SetWindowVisible(visible, reply) => {
                if self.window.visible != visible {
                    tracing::debug!("Window {}", if visible { "shown" } else { "hidden" });
                }
                self.window.visible = visible;
                let _ = reply.send(self.window);
            }
            AppCommand::Close => {
                tracing::info!("Window closed");
                self.cancel.cancel();
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn service_added(&mut self, info: ServiceInfo) {
        if let Some(existing) = self.registry.get(&info.name) {
            if existing.info == info {
                tracing::trace!("Ignoring unchanged announcement of {}", info.name);
                return;
            }
        }

        tracing::debug!(
            "Service added: {} at {} (vendor {})",
            info.name,
            info.base_url(),
            info.vendor_uuid().unwrap_or("-")
        );

        let url = info.base_url();
        let ticket = self.registry.add_or_update(info.clone());
        if let Some(entry) = self.registry.get(&ticket.name) {
            self.projection.upsert(&ticket.name, entry.label(), &url);
        }
        self.publish_hash();

        if info.info_path().is_some() {
            spawn_resolution(self.resolver.clone(), self.handle.clone(), ticket, info);
        } else {
            tracing::info!("{} is not a net app", info.name);
        }
    }

    fn service_removed(&mut self, name: &str) {
        let removed = self.registry.remove(name).is_some();
        let row_removed = self.projection.remove(name).is_some();
        if removed || row_removed {
            tracing::debug!("Service removed: {} ({} left)", name, self.registry.len());
            self.publish_hash();
        } else {
            tracing::debug!("Ignoring removal of unknown service {}", name);
        }
    }

    fn resolution(&mut self, ticket: ResolutionTicket, resolution: Resolution) {
        let applied = match resolution {
            Resolution::Manifest(manifest) => {
                let app_name = manifest.app_name().to_string();
                let applied = self.registry.apply_manifest(&ticket, manifest);
                if applied {
                    self.projection.set_label(&ticket.name, &app_name);
                    self.publish_hash();
                }
                applied
            }
            Resolution::Icon(icon) => {
                let applied = self.registry.apply_icon(&ticket, icon.clone());
                if applied {
                    self.projection.set_icon(&ticket.name, icon);
                    self.publish_hash();
                }
                applied
            }
            Resolution::Failed => self.registry.apply_failure(&ticket),
        };

        if !applied {
            tracing::debug!(
                "Dropping stale resolution for {} (generation {})",
                ticket.name,
                ticket.generation
            );
        }
    }

    fn launch(&mut self, name: &str) -> Result<String, LaunchError> {
        let url = self
            .registry
            .get(name)
            .map(|entry| entry.info.base_url())
            .ok_or_else(|| LaunchError::UnknownApp(name.to_string()))?;

        if let Err(e) = self.opener.open(&url) {
            tracing::warn!("Failed to open {}: {}", url, e);
            return Err(e);
        }

        tracing::info!("Opened {} for {}", url, name);
        if self.settings.hide_on_launch {
            self.window.visible = false;
        }
        Ok(url)
    }
}

/// Fetch manifest, then icon, reporting each step back through `handle`.
/// Holds only the ticket, so a removed entry simply ignores the reports.
fn spawn_resolution(
    resolver: Arc<Resolver>,
    handle: AppHandle,
    ticket: ResolutionTicket,
    info: ServiceInfo,
) {
    tokio::spawn(async move {
        let resolved = match resolver.fetch_manifest(&info).await {
            Ok(resolved) => resolved,
            Err(e) if e.is_transport() => {
                tracing::warn!("Could not download resources for {}: {}", ticket.name, e);
                let _ = handle.report(ticket, Resolution::Failed).await;
                return;
            }
            Err(e) => {
                tracing::warn!("Could not resolve {}: {}", ticket.name, e);
                let _ = handle.report(ticket, Resolution::Failed).await;
                return;
            }
        };

        tracing::debug!("Resolved {} as {}", ticket.name, resolved.manifest.app_name());
        if handle
            .report(ticket.clone(), Resolution::Manifest(resolved.manifest.clone()))
            .await
            .is_err()
        {
            return;
        }

        let resolution = match resolver.fetch_icon(&resolved).await {
            Ok(icon) => Resolution::Icon(icon),
            Err(e) => {
                tracing::warn!("Could not load icon for {}: {}", ticket.name, e);
                Resolution::Failed
            }
        };
        let _ = handle.report(ticket, resolution).await;
    });
}

/// Update loop: the only place app state is touched
pub async fn run(mut ctx: AppContext, mut rx: mpsc::Receiver<AppCommand>) -> Result<()> {
    let cancel = ctx.cancel.clone();
    ctx.publish_hash();

    loop {
        tokio::select! {
            Some(cmd) = rx.recv() => {
                if ctx.handle_command(cmd).is_break() {
                    break;
                }
            }
            _ = cancel.cancelled() => {
                break;
            }
        }
    }

    tracing::info!("Update loop shutting down");
    Ok(())
}
