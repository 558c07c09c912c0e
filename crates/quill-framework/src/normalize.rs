//! Turning handler replies into wire responses.
//!
//! Normalizing a response with components is the only place invocation
//! contexts are written. Every non-link component gets a fresh reference and
//! a context entry, row by row and left to right. If any row turns out to be
//! invalid, every entry already written for the response is removed again
//! before the error is returned.

use std::time::Duration;

use quill_core::{
    ActionRow, ComponentType, Interaction, MessageFlags, ResponsePayload, ResponseType,
    custom_id::join_custom_id,
};
use quill_state::Namespace;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::InvokeContext;
use crate::error::ResponseError;
use crate::handler::Reply;
use crate::response::{ComponentRef, Response};

/// Longest message content the platform accepts.
pub const MAX_CONTENT_LEN: usize = 2000;
/// Most component rows per message.
pub const MAX_ROWS: usize = 5;
/// Most components per row.
pub const MAX_ROW_LEN: usize = 5;

/// Inputs for finalizing one response.
#[derive(Debug)]
pub struct Finalize<'a> {
    /// Response type used when the handler did not choose one.
    pub default_kind: ResponseType,
    /// Interaction recorded as the parent of new components.
    pub parent: Option<&'a Interaction>,
    /// Ephemerality of the message being updated, for update responses.
    pub inherited_ephemeral: bool,
    /// Where contexts are written.
    pub contexts: &'a Namespace,
    /// Lifetime of written contexts, unless the response overrides it.
    pub ttl: Duration,
}

/// A finalized response.
#[derive(Debug)]
pub struct Normalized {
    /// What goes on the wire.
    pub payload: ResponsePayload,
    /// Whether the handler asked for its parent to be deleted.
    pub delete_parent: bool,
}

impl Normalized {
    fn plain(payload: ResponsePayload) -> Self {
        Self {
            payload,
            delete_parent: false,
        }
    }
}

/// Finalizes a reply, writing contexts for its components.
pub async fn normalize(reply: Reply, f: Finalize<'_>) -> Result<Normalized, ResponseError> {
    match reply {
        Reply::Empty => Ok(Normalized::plain(ResponsePayload::deferred_update())),
        Reply::Payload(payload) => Ok(Normalized::plain(payload)),
        Reply::Choices(choices) => Ok(Normalized::plain(ResponsePayload::autocomplete(choices))),
        Reply::Response(response) => normalize_response(response, f).await,
    }
}

async fn normalize_response(
    response: Response,
    f: Finalize<'_>,
) -> Result<Normalized, ResponseError> {
    let delete_parent = response.delete_parent;
    if response.is_empty() {
        return Ok(Normalized {
            payload: ResponsePayload::deferred_update(),
            delete_parent,
        });
    }

    let Response {
        mut data,
        rows,
        context,
        kind,
        context_ttl,
        ..
    } = response;

    if let Some(content) = &data.content {
        let len = content.chars().count();
        if len > MAX_CONTENT_LEN {
            return Err(ResponseError::ContentTooLong(len));
        }
    }

    let kind = kind.unwrap_or(f.default_kind);
    if let Some(rows) = rows {
        if rows.len() > MAX_ROWS {
            return Err(ResponseError::TooManyRows(rows.len()));
        }
        let ephemeral = if kind == ResponseType::UpdateMessage {
            f.inherited_ephemeral
        } else {
            data.flags
                .is_some_and(|flags| flags.contains(MessageFlags::EPHEMERAL))
        };
        let entry = InvokeContext::encode(&context, f.parent, ephemeral)
            .map_err(quill_state::StateError::from)?;

        let mut written = Vec::new();
        let ttl = context_ttl.unwrap_or(f.ttl);
        match write_rows(rows, &entry, f.contexts, ttl, &mut written).await {
            Ok(rows) => data.components = Some(rows),
            Err(error) => {
                rollback(f.contexts, &written).await;
                return Err(error);
            }
        }
    }

    Ok(Normalized {
        payload: ResponsePayload::with_data(kind, data),
        delete_parent,
    })
}

fn validate_row(index: usize, row: &[ComponentRef]) -> Result<(), ResponseError> {
    if row.is_empty() {
        return Err(ResponseError::EmptyRow { row: index });
    }
    if row.len() > MAX_ROW_LEN {
        return Err(ResponseError::TooManyComponents {
            row: index,
            count: row.len(),
        });
    }
    let has_select = row
        .iter()
        .any(|c| c.data().kind == ComponentType::SelectMenu);
    if has_select && row.len() > 1 {
        return Err(ResponseError::SelectNotAlone { row: index });
    }
    Ok(())
}

async fn write_rows(
    rows: Vec<Vec<ComponentRef>>,
    entry: &serde_json::Value,
    contexts: &Namespace,
    ttl: Duration,
    written: &mut Vec<String>,
) -> Result<Vec<ActionRow>, ResponseError> {
    let mut out = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        validate_row(index, &row)?;

        let mut components = Vec::with_capacity(row.len());
        for component in row {
            let mut data = component.data().clone();
            if let Some(base) = component.base_id() {
                let reference = Uuid::new_v4().simple().to_string();
                contexts.set(&reference, entry, Some(ttl)).await?;
                data.custom_id = Some(join_custom_id(base, &reference));
                written.push(reference);
            }
            components.push(data);
        }
        out.push(ActionRow::new(components));
    }
    debug!(references = written.len(), "Invocation contexts written");
    Ok(out)
}

async fn rollback(contexts: &Namespace, written: &[String]) {
    for reference in written {
        if let Err(error) = contexts.remove(reference).await {
            warn!(reference_id = %reference, error = %error, "Failed to roll back invocation context");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{ComponentData, SelectOption, split_custom_id};
    use quill_state::{COMMAND_STATE, ManagedState, MemoryBackend};
    use serde_json::{Map, Value, json};
    use std::sync::Arc;

    fn button(id: &str) -> ComponentRef {
        ComponentRef::registered(id, ComponentData::button())
    }

    fn select(id: &str) -> ComponentRef {
        let mut data = ComponentData::select_menu();
        data.options.push(SelectOption::new("A", "a"));
        ComponentRef::registered(id, data)
    }

    fn finalize<'a>(contexts: &'a Namespace, parent: Option<&'a Interaction>) -> Finalize<'a> {
        Finalize {
            default_kind: ResponseType::ChannelMessageWithSource,
            parent,
            inherited_ephemeral: false,
            contexts,
            ttl: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn empty_replies_defer() {
        let backend = MemoryBackend::new();
        let contexts = ManagedState::new(backend).namespace(COMMAND_STATE);
        let out = normalize(Reply::Empty, finalize(&contexts, None)).await.unwrap();
        assert_eq!(out.payload.kind, ResponseType::DeferredUpdateMessage);

        let out = normalize(
            Reply::Response(Response::new().delete_parent()),
            finalize(&contexts, None),
        )
        .await
        .unwrap();
        assert_eq!(out.payload.kind, ResponseType::DeferredUpdateMessage);
        assert!(out.delete_parent);
    }

    #[tokio::test]
    async fn every_component_gets_its_own_reference() {
        let backend = Arc::new(MemoryBackend::new());
        let contexts = ManagedState::from_backend(backend.clone()).namespace(COMMAND_STATE);
        let parent: Interaction = serde_json::from_value(json!({
            "id": "9", "application_id": "1", "type": 2, "token": "p"
        }))
        .unwrap();

        let response = Response::new()
            .content("pick")
            .row([button("a"), button("b"), crate::component::link("docs", "https://x")])
            .row([select("s")])
            .context("owner", "ferris")
            .ephemeral();
        let out = normalize(Reply::Response(response), finalize(&contexts, Some(&parent)))
            .await
            .unwrap();

        let data = out.payload.data.unwrap();
        let rows = data.components.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(backend.len(), 3);
        assert!(rows[0].components[2].custom_id.is_none());

        let id = rows[0].components[0].custom_id.clone().unwrap();
        let split = split_custom_id(&id);
        assert_eq!(split.base, "a");
        let reference = split.reference.unwrap();
        assert_eq!(reference.len(), 32);

        let stored: Map<String, Value> = contexts.get(reference).await.unwrap().unwrap();
        assert_eq!(stored["owner"], json!("ferris"));
        assert_eq!(stored["ephemeral"], json!(true));
        assert_eq!(stored["parent"]["token"], json!("p"));
    }

    #[tokio::test]
    async fn invalid_last_row_rolls_back_everything() {
        let backend = Arc::new(MemoryBackend::new());
        let contexts = ManagedState::from_backend(backend.clone()).namespace(COMMAND_STATE);

        let response = Response::new()
            .row([button("a"), button("b")])
            .row([button("c")])
            .row([select("s"), button("d")]);
        let err = normalize(Reply::Response(response), finalize(&contexts, None))
            .await
            .unwrap_err();

        assert!(matches!(err, ResponseError::SelectNotAlone { row: 2 }));
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn limits_are_enforced() {
        let contexts = ManagedState::new(MemoryBackend::new()).namespace(COMMAND_STATE);

        let long = Response::new().content("x".repeat(2001));
        assert!(matches!(
            normalize(Reply::Response(long), finalize(&contexts, None)).await,
            Err(ResponseError::ContentTooLong(2001))
        ));

        let six_rows = (0..6).fold(Response::new(), |r, i| r.row([button(&format!("b{i}"))]));
        assert!(matches!(
            normalize(Reply::Response(six_rows), finalize(&contexts, None)).await,
            Err(ResponseError::TooManyRows(6))
        ));

        let wide = Response::new().row((0..6).map(|i| button(&format!("b{i}"))));
        assert!(matches!(
            normalize(Reply::Response(wide), finalize(&contexts, None)).await,
            Err(ResponseError::TooManyComponents { row: 0, count: 6 })
        ));
    }

    #[tokio::test]
    async fn updates_inherit_ephemerality() {
        let backend = Arc::new(MemoryBackend::new());
        let contexts = ManagedState::from_backend(backend.clone()).namespace(COMMAND_STATE);

        let mut f = finalize(&contexts, None);
        f.default_kind = ResponseType::UpdateMessage;
        f.inherited_ephemeral = true;
        let out = normalize(Reply::Response(Response::new().row([button("a")])), f)
            .await
            .unwrap();
        assert_eq!(out.payload.kind, ResponseType::UpdateMessage);

        let data = out.payload.data.unwrap();
        assert_eq!(data.flags, None::<MessageFlags>);
        let id = data.components.unwrap()[0].components[0].custom_id.clone().unwrap();
        let stored: Map<String, Value> = contexts
            .get(split_custom_id(&id).reference.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored["ephemeral"], json!(true));
    }
}
