//! Invocation context of components.
//!
//! When a response carrying components is finalized, the values the handler
//! attached with [`Response::context`](crate::Response::context) are stored
//! under each component's freshly minted reference id, together with the
//! interaction that produced the response and whether it was ephemeral.
//! Clicking the component loads them back.

use std::fmt;

use quill_core::Interaction;
use quill_state::{Namespace, StateResult};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

const PARENT_KEY: &str = "parent";
const EPHEMERAL_KEY: &str = "ephemeral";

/// Stored context of the component being invoked.
#[derive(Clone)]
pub struct InvokeContext {
    reference_id: String,
    values: Map<String, Value>,
    parent: Option<Interaction>,
    ephemeral: bool,
    contexts: Namespace,
}

impl InvokeContext {
    /// Encodes a context entry. Reserved keys are written last and win over
    /// user values of the same name.
    pub(crate) fn encode(
        values: &Map<String, Value>,
        parent: Option<&Interaction>,
        ephemeral: bool,
    ) -> serde_json::Result<Value> {
        let mut entry = values.clone();
        entry.insert(PARENT_KEY.to_owned(), serde_json::to_value(parent)?);
        entry.insert(EPHEMERAL_KEY.to_owned(), Value::Bool(ephemeral));
        Ok(Value::Object(entry))
    }

    /// Loads the context stored for `reference_id`, consuming it if
    /// `consume` is set.
    pub(crate) async fn load(
        contexts: &Namespace,
        reference_id: &str,
        consume: bool,
    ) -> StateResult<Option<Self>> {
        let entry: Option<Map<String, Value>> = if consume {
            contexts.take(reference_id).await?
        } else {
            contexts.get(reference_id).await?
        };
        let Some(mut values) = entry else {
            return Ok(None);
        };

        let parent = match values.remove(PARENT_KEY) {
            Some(Value::Null) | None => None,
            Some(raw) => Some(serde_json::from_value(raw)?),
        };
        let ephemeral = values
            .remove(EPHEMERAL_KEY)
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        Ok(Some(Self {
            reference_id: reference_id.to_owned(),
            values,
            parent,
            ephemeral,
            contexts: contexts.clone(),
        }))
    }

    /// Reference id the context is stored under.
    pub fn reference_id(&self) -> &str {
        &self.reference_id
    }

    /// Decodes the value stored under `key`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> serde_json::Result<Option<T>> {
        self.values
            .get(key)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
    }

    /// Raw value stored under `key`.
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// All values attached by the producing handler.
    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    /// The interaction that produced the message carrying the component.
    pub fn parent(&self) -> Option<&Interaction> {
        self.parent.as_ref()
    }

    /// Whether the message carrying the component is ephemeral.
    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral
    }

    /// Deletes the stored context so the component can no longer be used.
    pub async fn purge(&self) -> StateResult<bool> {
        self.contexts.remove(&self.reference_id).await
    }
}

impl fmt::Debug for InvokeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvokeContext")
            .field("reference_id", &self.reference_id)
            .field("values", &self.values)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .field("ephemeral", &self.ephemeral)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_state::{COMMAND_STATE, ManagedState, MemoryBackend};
    use serde_json::json;

    fn parent() -> Interaction {
        serde_json::from_value(json!({
            "id": "7", "application_id": "1", "type": 2, "token": "parent-token",
            "data": { "name": "counter" }
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn reserved_keys_win_and_are_split_out() {
        let contexts = ManagedState::new(MemoryBackend::new()).namespace(COMMAND_STATE);
        let mut values = Map::new();
        values.insert("count".into(), json!(3));
        values.insert("ephemeral".into(), json!("spoofed"));

        let entry = InvokeContext::encode(&values, Some(&parent()), true).unwrap();
        contexts.set("ref", &entry, None).await.unwrap();

        let ctx = InvokeContext::load(&contexts, "ref", false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(ctx.get::<i64>("count").unwrap(), Some(3));
        assert!(ctx.is_ephemeral());
        assert_eq!(ctx.parent().unwrap().token, "parent-token");
        assert!(ctx.value("parent").is_none());
        assert_eq!(ctx.values().len(), 1);
    }

    #[tokio::test]
    async fn consuming_load_and_purge() {
        let contexts = ManagedState::new(MemoryBackend::new()).namespace(COMMAND_STATE);
        let entry = InvokeContext::encode(&Map::new(), None, false).unwrap();
        contexts.set("a", &entry, None).await.unwrap();
        contexts.set("b", &entry, None).await.unwrap();

        assert!(InvokeContext::load(&contexts, "a", true).await.unwrap().is_some());
        assert!(InvokeContext::load(&contexts, "a", false).await.unwrap().is_none());

        let b = InvokeContext::load(&contexts, "b", false)
            .await
            .unwrap()
            .unwrap();
        assert!(b.parent().is_none());
        assert!(b.purge().await.unwrap());
        assert!(InvokeContext::load(&contexts, "b", false).await.unwrap().is_none());
    }
}
