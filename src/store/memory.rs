use crate::store::{Store, StoreError, segments};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

/// A JSON tree held in memory.
#[derive(Debug)]
pub struct MemoryStore {
    root: RwLock<Value>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::from_value(Value::Object(Map::new()))
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing tree. A non-object root is replaced on first write.
    pub fn from_value(root: Value) -> Self {
        Self {
            root: RwLock::new(root),
        }
    }

    /// A copy of the whole tree.
    pub async fn snapshot(&self) -> Value {
        self.root.read().await.clone()
    }
}

fn set_at(node: &mut Value, path: &[&str], value: Value) {
    let Some((first, rest)) = path.split_first() else {
        *node = value;
        return;
    };
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    if let Value::Object(map) = node {
        set_at(map.entry(*first).or_insert(Value::Null), rest, value);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let path = segments(path)?;
        let mut root = self.root.write().await;
        set_at(&mut root, &path, value);
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let path = segments(path)?;
        let root = self.root.read().await;
        Ok(path
            .iter()
            .try_fold(&*root, |node, segment| node.get(segment))
            .cloned())
    }
}
