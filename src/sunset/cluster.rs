use anyhow::Result;
use serde_json::Value;

/// One row of the cluster's index listing: name plus aggregate store size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexStat {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskProgress {
    pub completed: bool,
}

/// Capability surface of the search cluster consumed by the engine.
///
/// Mapping and settings reads return the raw response keyed by index name,
/// matching the cluster's REST shape; callers extract what they need.
/// Connection pooling and retry policy belong to the implementation, not to
/// the orchestration code calling through this trait.
pub trait SearchCluster {
    fn list_indices(&self) -> Result<Vec<IndexStat>>;
    fn refresh(&self, index: &str) -> Result<()>;
    fn exists(&self, index: &str) -> Result<bool>;
    fn set_read_only(&self, index: &str, read_only: bool) -> Result<()>;
    fn mapping(&self, index: &str) -> Result<Value>;
    fn settings(&self, index: &str) -> Result<Value>;
    fn create_index(&self, index: &str, settings: &Value, mappings: &Value) -> Result<()>;
    fn delete_index(&self, index: &str) -> Result<()>;
    fn start_reindex(&self, source: &str, dest: &str, slices: u32) -> Result<String>;
    fn task_status(&self, task_id: &str) -> Result<TaskProgress>;
    /// Document count for a concrete index or an alias.
    fn count(&self, target: &str) -> Result<u64>;
    fn put_settings(&self, index: &str, settings: &Value) -> Result<()>;
    fn update_aliases(&self, actions: &Value) -> Result<()>;
    fn alias_exists(&self, alias: &str) -> Result<bool>;
    fn alias_indices(&self, alias: &str) -> Result<Vec<String>>;
}
