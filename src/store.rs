//! The [`Store`] façade — binds a [`Container`] to a cluster identity and
//! drives the read-only transition end to end, the way `Archive` binds a
//! `SixCyReader`/`SixCyWriter` to a single embedding surface.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::StoreConfig;
use crate::container::Container;
use crate::delegate::{Cluster, NodeDelegate, NodeType};
use crate::error::Result;

pub struct Store {
    id: String,
    container: Container,
    delegate: Arc<NodeDelegate>,
    cluster: Option<Arc<Cluster>>,
    sync_on_write: bool,
}

impl Store {
    /// Open or create a store and join it to `cluster` (if given) under
    /// `id`. An empty cluster handle is a valid single-node deployment.
    pub fn init(
        id: &str,
        config: &StoreConfig,
        create_if_missing: bool,
        cluster: Option<Arc<Cluster>>,
    ) -> Result<Self> {
        let delegate = NodeDelegate::new(NodeType::Store);
        let mut container = Container::open(
            id,
            &config.directory,
            config.max_size,
            create_if_missing,
            Some(delegate.clone()),
        )?;

        if let Some(cluster) = &cluster {
            cluster.join(id, delegate.clone());
            let cluster = cluster.clone();
            let id_owned = id.to_owned();
            container.set_on_read_only(Box::new(move || cluster.broadcast(&id_owned)));
        }

        info!(id, "store initialized");
        Ok(Self {
            id: id.to_owned(),
            container,
            delegate,
            cluster,
            sync_on_write: config.sync_on_write,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        self.container.path()
    }

    pub fn is_read_only(&self) -> bool {
        self.container.is_read_only()
    }

    /// Append a needle, fsyncing according to the store's `sync_on_write`
    /// configuration.
    pub fn write(&self, id: u64, data: &[u8]) -> Result<(u64, u32)> {
        self.container.write(id, 0, data, self.sync_on_write)
    }

    pub fn read(&self, id: u64) -> Result<Option<Vec<u8>>> {
        self.container.read_id(id)
    }

    pub fn delete(&self, id: u64) -> Result<()> {
        self.container.delete(id, self.sync_on_write)
    }

    pub fn index_len(&self) -> usize {
        self.container.index_len()
    }

    pub fn delegate(&self) -> &Arc<NodeDelegate> {
        &self.delegate
    }

    /// Promote to read-only. The container's `on_read_only` hook (installed
    /// in `init` when a cluster was supplied) rebroadcasts the new state to
    /// the rest of the cluster — the same hook fires whether promotion was
    /// triggered here or automatically by a write crossing `max_size`.
    pub fn promote_read_only(&self) -> Result<()> {
        self.container.set_read_only()
    }

    /// Leave the cluster (the in-process simulator has no explicit departure
    /// announcement to make — membership here is just dropping the handle)
    /// and close the container.
    pub fn shutdown(&self) -> Result<()> {
        info!(id = %self.id, "shutting down store");
        self.container.close()
    }
}
