//! In-memory catalog for tests and dry runs.

use async_trait::async_trait;
use repodex_schema::{
    Channel, ChannelDescriptor, Identity, Member, NewPackageVersion, Package, PackageVersion,
    Role,
};
use tokio::sync::Mutex;

use super::{Catalog, CatalogError, Upsert, now_timestamp};

#[derive(Debug, Default)]
struct State {
    next_id: i64,
    channels: Vec<Channel>,
    channel_members: Vec<(String, Identity, Role)>,
    packages: Vec<Package>,
    members: Vec<Member>,
    versions: Vec<PackageVersion>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn has_channel(&self, name: &str) -> bool {
        self.channels.iter().any(|c| c.name == name)
    }
}

/// A [`Catalog`] held entirely in memory. Row ids are shared across tables
/// and strictly increasing.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    state: Mutex<State>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_channel(
        &self,
        descriptor: &ChannelDescriptor,
        owner: &Identity,
        role: Role,
    ) -> Result<Channel, CatalogError> {
        let mut state = self.state.lock().await;
        if state.has_channel(&descriptor.name) {
            return Err(CatalogError::ChannelExists(descriptor.name.clone()));
        }
        let channel = Channel {
            id: state.next_id(),
            name: descriptor.name.clone(),
            private: descriptor.private,
        };
        state.channels.push(channel.clone());
        state
            .channel_members
            .push((descriptor.name.clone(), owner.clone(), role));
        Ok(channel)
    }

    async fn get_channel(&self, name: &str) -> Result<Option<Channel>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state.channels.iter().find(|c| c.name == name).cloned())
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, CatalogError> {
        Ok(self.state.lock().await.channels.clone())
    }

    async fn list_channel_members(
        &self,
        channel: &str,
    ) -> Result<Vec<(Identity, Role)>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state
            .channel_members
            .iter()
            .filter(|(c, _, _)| c == channel)
            .map(|(_, identity, role)| (identity.clone(), *role))
            .collect())
    }

    async fn upsert_package(
        &self,
        channel: &str,
        name: &str,
    ) -> Result<Upsert<Package>, CatalogError> {
        let mut state = self.state.lock().await;
        if !state.has_channel(channel) {
            return Err(CatalogError::ChannelNotFound(channel.to_string()));
        }
        if let Some(existing) = state
            .packages
            .iter()
            .find(|p| p.channel == channel && p.name == name)
        {
            return Ok(Upsert::existing(existing.clone()));
        }
        let package = Package {
            id: state.next_id(),
            channel: channel.to_string(),
            name: name.to_string(),
        };
        state.packages.push(package.clone());
        Ok(Upsert::created(package))
    }

    async fn list_packages(&self, channel: &str) -> Result<Vec<Package>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state
            .packages
            .iter()
            .filter(|p| p.channel == channel)
            .cloned()
            .collect())
    }

    async fn attach_member(
        &self,
        package_id: i64,
        identity: &Identity,
        role: Role,
    ) -> Result<Upsert<Member>, CatalogError> {
        let mut state = self.state.lock().await;
        if !state.packages.iter().any(|p| p.id == package_id) {
            return Err(CatalogError::PackageIdNotFound(package_id));
        }
        if let Some(existing) = state
            .members
            .iter()
            .find(|m| m.package_id == package_id && &m.identity == identity)
        {
            return Ok(Upsert::existing(existing.clone()));
        }
        let member = Member {
            package_id,
            identity: identity.clone(),
            role,
        };
        state.members.push(member.clone());
        Ok(Upsert::created(member))
    }

    async fn list_members(&self, package_id: i64) -> Result<Vec<Member>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state
            .members
            .iter()
            .filter(|m| m.package_id == package_id)
            .cloned()
            .collect())
    }

    async fn upsert_version(
        &self,
        version: NewPackageVersion,
    ) -> Result<Upsert<PackageVersion>, CatalogError> {
        let mut state = self.state.lock().await;
        if !state
            .packages
            .iter()
            .any(|p| p.channel == version.channel && p.name == version.package)
        {
            return Err(CatalogError::PackageNotFound {
                channel: version.channel,
                package: version.package,
            });
        }
        let key = version.key();
        if let Some(existing) = state
            .versions
            .iter()
            .find(|v| v.channel == version.channel && v.key() == key)
        {
            return Ok(Upsert::existing(existing.clone()));
        }
        let row = PackageVersion::from_new(state.next_id(), version, now_timestamp());
        state.versions.push(row.clone());
        Ok(Upsert::created(row))
    }

    async fn list_versions(&self, channel: &str) -> Result<Vec<PackageVersion>, CatalogError> {
        let state = self.state.lock().await;
        Ok(state
            .versions
            .iter()
            .filter(|v| v.channel == channel)
            .cloned()
            .collect())
    }

    async fn delete_version(&self, id: i64) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;
        let before = state.versions.len();
        state.versions.retain(|v| v.id != id);
        Ok(state.versions.len() != before)
    }

    async fn delete_channel(&self, name: &str) -> Result<bool, CatalogError> {
        let mut state = self.state.lock().await;
        if !state.has_channel(name) {
            return Ok(false);
        }
        let package_ids: Vec<i64> = state
            .packages
            .iter()
            .filter(|p| p.channel == name)
            .map(|p| p.id)
            .collect();
        state.versions.retain(|v| v.channel != name);
        state.members.retain(|m| !package_ids.contains(&m.package_id));
        state.packages.retain(|p| p.channel != name);
        state.channel_members.retain(|(channel, _, _)| channel != name);
        state.channels.retain(|c| c.name != name);
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_catalog_conformance() {
        super::super::conformance::run(&MemoryCatalog::new()).await;
    }
}
