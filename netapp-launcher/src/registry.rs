use std::collections::HashMap;
use chrono::{DateTime, Utc};
use shared::types::{AppDetail, AppManifest, ResolutionStatus, ServiceInfo};
use crate::resolver::Icon;

/// Identifies one registration of a service. Resolution tasks carry a ticket
/// instead of a reference to the registry; a result is applied only while the
/// registration it was started for is still current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionTicket {
    pub name: String,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub info: ServiceInfo,
    pub manifest: Option<AppManifest>,
    pub icon: Option<Icon>,
    pub status: ResolutionStatus,
    pub first_seen: DateTime<Utc>,
    generation: u64,
}

impl RegistryEntry {
    /// Manifest name once resolved, otherwise the instance name
    pub fn label(&self) -> &str {
        match &self.manifest {
            Some(manifest) => manifest.app_name(),
            None => self.info.display_name(),
        }
    }

    pub fn detail(&self) -> AppDetail {
        AppDetail {
            service: self.info.clone(),
            manifest: self.manifest.clone(),
            status: self.status,
            has_icon: self.icon.is_some(),
            first_seen: self.first_seen,
        }
    }
}

/// Discovered services keyed by instance name. Last write wins per name.
#[derive(Debug, Default)]
pub struct Registry {
    entries: HashMap<String, RegistryEntry>,
    next_generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `info.name`. An overwrite drops any
    /// resolved manifest and icon and invalidates outstanding tickets.
    pub fn add_or_update(&mut self, info: ServiceInfo) -> ResolutionTicket {
        self.next_generation += 1;
        let generation = self.next_generation;
        let name = info.name.clone();

        let status = if info.info_path().is_some() {
            ResolutionStatus::Pending
        } else {
            ResolutionStatus::NotNetApp
        };
        let first_seen = self
            .entries
            .get(&name)
            .map(|existing| existing.first_seen)
            .unwrap_or_else(Utc::now);

        self.entries.insert(
            name.clone(),
            RegistryEntry {
                info,
                manifest: None,
                icon: None,
                status,
                first_seen,
                generation,
            },
        );

        ResolutionTicket { name, generation }
    }

    /// Remove an entry. Unknown names are a no-op.
    pub fn remove(&mut self, name: &str) -> Option<RegistryEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&RegistryEntry> {
        self.entries.get(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for a ticket, if that registration is still live
    fn live_mut(&mut self, ticket: &ResolutionTicket) -> Option<&mut RegistryEntry> {
        self.entries
            .get_mut(&ticket.name)
            .filter(|entry| entry.generation == ticket.generation)
    }

    /// Returns false when the ticket is stale and nothing was stored.
    pub fn apply_manifest(&mut self, ticket: &ResolutionTicket, manifest: AppManifest) -> bool {
        match self.live_mut(ticket) {
            Some(entry) => {
                entry.manifest = Some(manifest);
                entry.status = ResolutionStatus::Resolved;
                true
            }
            None => false,
        }
    }

    pub fn apply_icon(&mut self, ticket: &ResolutionTicket, icon: Icon) -> bool {
        match self.live_mut(ticket) {
            Some(entry) => {
                entry.icon = Some(icon);
                true
            }
            None => false,
        }
    }

    /// Marks a pending resolution as failed. An icon failure after the
    /// manifest arrived leaves the entry resolved.
    pub fn apply_failure(&mut self, ticket: &ResolutionTicket) -> bool {
        match self.live_mut(ticket) {
            Some(entry) => {
                if entry.status == ResolutionStatus::Pending {
                    entry.status = ResolutionStatus::Failed;
                }
                true
            }
            None => false,
        }
    }
}
