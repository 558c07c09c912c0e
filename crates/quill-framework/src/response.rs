//! Response builder and component references.

use std::sync::Arc;
use std::time::Duration;

use quill_core::{
    AllowedMentions, ButtonStyle, ComponentData, Embed, MessageFlags, PartialEmoji, ResponseData,
    ResponseType,
};
use serde_json::{Map, Value};

/// A registered component, ready to be placed in a response.
///
/// Obtained from the component builders, from
/// [`AppHandle::component`](crate::AppHandle::component) or from [`link`](crate::link).
/// The visual tweaks below only change this copy; the registered component
/// and its handler stay the same.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRef {
    data: Arc<ComponentData>,
    base_id: Option<Arc<str>>,
}

impl ComponentRef {
    pub(crate) fn registered(base_id: &str, data: ComponentData) -> Self {
        Self {
            data: Arc::new(data),
            base_id: Some(Arc::from(base_id)),
        }
    }

    pub(crate) fn unregistered(data: ComponentData) -> Self {
        Self {
            data: Arc::new(data),
            base_id: None,
        }
    }

    /// Registered custom id, `None` for link buttons.
    pub fn base_id(&self) -> Option<&str> {
        self.base_id.as_deref()
    }

    /// Wire data without a reference attached.
    pub fn data(&self) -> &ComponentData {
        &self.data
    }

    /// Whether this is a link button.
    pub fn is_link(&self) -> bool {
        self.data.is_link()
    }

    /// Replaces the label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.data).label = Some(label.into());
        self
    }

    /// Replaces the button style.
    pub fn style(mut self, style: ButtonStyle) -> Self {
        Arc::make_mut(&mut self.data).style = Some(style);
        self
    }

    /// Replaces the emoji.
    pub fn emoji(mut self, emoji: PartialEmoji) -> Self {
        Arc::make_mut(&mut self.data).emoji = Some(emoji);
        self
    }

    /// Enables or disables the component.
    pub fn disabled(mut self, disabled: bool) -> Self {
        Arc::make_mut(&mut self.data).disabled = disabled;
        self
    }
}

/// A message response under construction.
///
/// ```rust,ignore
/// Response::new()
///     .content(format!("Count: {count}"))
///     .row([increment.clone(), reset.clone()])
///     .context("count", count)
///     .update()
/// ```
#[derive(Debug, Clone, Default)]
pub struct Response {
    pub(crate) data: ResponseData,
    pub(crate) rows: Option<Vec<Vec<ComponentRef>>>,
    pub(crate) context: Map<String, Value>,
    pub(crate) kind: Option<ResponseType>,
    pub(crate) delete_parent: bool,
    pub(crate) context_ttl: Option<Duration>,
}

impl Response {
    /// An empty response.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the text content.
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.data.content = Some(content.into());
        self
    }

    /// Appends an embed.
    pub fn embed(mut self, embed: Embed) -> Self {
        self.data.embeds.push(embed);
        self
    }

    /// Replaces all embeds.
    pub fn embeds(mut self, embeds: Vec<Embed>) -> Self {
        self.data.embeds = embeds;
        self
    }

    /// Restricts which mentions ping.
    pub fn allowed_mentions(mut self, mentions: AllowedMentions) -> Self {
        self.data.allowed_mentions = Some(mentions);
        self
    }

    /// Adds message flags.
    pub fn flags(mut self, flags: MessageFlags) -> Self {
        let current = self.data.flags.unwrap_or_default();
        self.data.flags = Some(current | flags);
        self
    }

    /// Only the invoking user will see the message.
    pub fn ephemeral(self) -> Self {
        self.flags(MessageFlags::EPHEMERAL)
    }

    /// Reads the content aloud.
    pub fn tts(mut self) -> Self {
        self.data.tts = Some(true);
        self
    }

    /// Appends a row of components.
    pub fn row(mut self, components: impl IntoIterator<Item = ComponentRef>) -> Self {
        self.rows
            .get_or_insert_with(Vec::new)
            .push(components.into_iter().collect());
        self
    }

    /// Replaces all component rows.
    pub fn components(mut self, rows: Vec<Vec<ComponentRef>>) -> Self {
        self.rows = Some(rows);
        self
    }

    /// Removes every component from the updated message.
    pub fn clear_components(mut self) -> Self {
        self.rows = Some(Vec::new());
        self
    }

    /// Attaches a value to the context of every component in the response.
    pub fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Overrides the response type.
    pub fn response_type(mut self, kind: ResponseType) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Edits the message the component is attached to.
    pub fn update(self) -> Self {
        self.response_type(ResponseType::UpdateMessage)
    }

    /// Sends a new message instead of editing the current one.
    pub fn new_message(self) -> Self {
        self.response_type(ResponseType::ChannelMessageWithSource)
    }

    /// Deletes the message the component is attached to.
    ///
    /// Ignored for ephemeral messages, which cannot be deleted.
    pub fn delete_parent(mut self) -> Self {
        self.delete_parent = true;
        self
    }

    /// Overrides how long component contexts of this response live.
    pub fn context_ttl(mut self, ttl: Duration) -> Self {
        self.context_ttl = Some(ttl);
        self
    }

    /// Whether nothing would be sent.
    pub fn is_empty(&self) -> bool {
        self.data == ResponseData::default() && self.rows.is_none() && self.kind.is_none()
    }

    /// Whether the message is flagged ephemeral.
    pub fn is_ephemeral(&self) -> bool {
        self.data
            .flags
            .is_some_and(|f| f.contains(MessageFlags::EPHEMERAL))
    }

    /// The text content, if set.
    pub fn content_str(&self) -> Option<&str> {
        self.data.content.as_deref()
    }

    /// Whether the response asked for its parent to be deleted.
    pub fn deletes_parent(&self) -> bool {
        self.delete_parent
    }
}

impl From<String> for Response {
    fn from(content: String) -> Self {
        Self::new().content(content)
    }
}

impl From<&str> for Response {
    fn from(content: &str) -> Self {
        Self::new().content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builder_accumulates() {
        let button = ComponentRef::registered("inc", ComponentData::button()).label("+1");
        let response = Response::new()
            .content("Count: 1")
            .row([button.clone()])
            .row([button])
            .context("count", 1)
            .ephemeral()
            .update();

        assert!(!response.is_empty());
        assert!(response.is_ephemeral());
        assert_eq!(response.rows.as_ref().map(Vec::len), Some(2));
        assert_eq!(response.context.get("count"), Some(&json!(1)));
        assert_eq!(response.kind, Some(ResponseType::UpdateMessage));
    }

    #[test]
    fn empty_detection() {
        assert!(Response::new().is_empty());
        assert!(Response::new().delete_parent().is_empty());
        assert!(!Response::new().clear_components().is_empty());
    }

    #[test]
    fn tweaks_do_not_touch_other_copies() {
        let original = ComponentRef::registered("inc", ComponentData::button()).label("+1");
        let disabled = original.clone().disabled(true);
        assert!(!original.data().disabled);
        assert!(disabled.data().disabled);
        assert_eq!(disabled.base_id(), Some("inc"));
    }
}
