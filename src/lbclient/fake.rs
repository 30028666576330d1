use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Pool, PoolClient, PoolMetadata};
use crate::errors::{Error, Result};

/// In-memory `PoolClient` used by translator and reconciler tests. Mirrors
/// what the real EdgeLB API would do: `get_pool` on a name never created (or
/// since deleted) returns `NotFound`.
#[derive(Default)]
pub struct FakePoolClient {
    pools: Mutex<HashMap<String, Pool>>,
    metadata: Mutex<HashMap<String, PoolMetadata>>,
    group: String,
}

impl FakePoolClient {
    pub fn new(group: impl Into<String>) -> Self {
        FakePoolClient {
            pools: Mutex::new(HashMap::new()),
            metadata: Mutex::new(HashMap::new()),
            group: group.into(),
        }
    }

    pub fn with_metadata(self, name: impl Into<String>, metadata: PoolMetadata) -> Self {
        self.metadata.lock().unwrap().insert(name.into(), metadata);
        self
    }

    pub fn seed(&self, pool: Pool) {
        self.pools.lock().unwrap().insert(pool.name.clone(), pool);
    }

    pub fn snapshot(&self, name: &str) -> Option<Pool> {
        self.pools.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl PoolClient for FakePoolClient {
    async fn get_pool(&self, name: &str) -> Result<Pool> {
        self.pools
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    async fn create_pool(&self, pool: &Pool) -> Result<()> {
        self.pools
            .lock()
            .unwrap()
            .insert(pool.name.clone(), pool.clone());
        Ok(())
    }

    async fn update_pool(&self, pool: &Pool) -> Result<()> {
        let mut pools = self.pools.lock().unwrap();
        if !pools.contains_key(&pool.name) {
            return Err(Error::NotFound(pool.name.clone()));
        }
        pools.insert(pool.name.clone(), pool.clone());
        Ok(())
    }

    async fn delete_pool(&self, name: &str) -> Result<()> {
        self.pools.lock().unwrap().remove(name);
        Ok(())
    }

    async fn get_pool_metadata(&self, name: &str) -> Result<PoolMetadata> {
        self.metadata
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn pool_group(&self) -> &str {
        &self.group
    }
}
