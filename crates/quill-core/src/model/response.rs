//! Outbound interaction responses.

use serde::{Deserialize, Serialize};

use super::command::ChoiceValue;
use super::component::ActionRow;
use super::flags::MessageFlags;
use crate::id::Snowflake;

wire_enum! {
    /// Kind of interaction response.
    pub enum ResponseType {
        Pong = 1,
        ChannelMessageWithSource = 4,
        DeferredChannelMessageWithSource = 5,
        DeferredUpdateMessage = 6,
        UpdateMessage = 7,
        AutocompleteResult = 8,
    }
}

/// The body returned to the platform for an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePayload {
    #[serde(rename = "type")]
    pub kind: ResponseType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ResponseData>,
}

impl ResponsePayload {
    /// Acknowledges a ping.
    pub fn pong() -> Self {
        Self {
            kind: ResponseType::Pong,
            data: None,
        }
    }

    /// Acknowledges without changing anything visible.
    pub fn deferred_update() -> Self {
        Self {
            kind: ResponseType::DeferredUpdateMessage,
            data: None,
        }
    }

    /// A response of the given kind carrying message data.
    pub fn with_data(kind: ResponseType, data: ResponseData) -> Self {
        Self {
            kind,
            data: Some(data),
        }
    }

    /// Autocomplete suggestions.
    pub fn autocomplete(choices: Vec<CompletedOption>) -> Self {
        Self::with_data(
            ResponseType::AutocompleteResult,
            ResponseData {
                choices: Some(choices),
                ..Default::default()
            },
        )
    }

    /// A visible-to-invoker-only text message.
    pub fn ephemeral_message(content: impl Into<String>) -> Self {
        Self::with_data(
            ResponseType::ChannelMessageWithSource,
            ResponseData {
                content: Some(content.into()),
                flags: Some(MessageFlags::EPHEMERAL),
                ..Default::default()
            },
        )
    }
}

/// Message data of a response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tts: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub embeds: Vec<Embed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allowed_mentions: Option<AllowedMentions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flags: Option<MessageFlags>,
    /// `Some(vec![])` clears the components of an updated message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ActionRow>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<CompletedOption>>,
}

/// An autocomplete suggestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedOption {
    pub name: String,
    pub value: ChoiceValue,
}

impl CompletedOption {
    /// Creates a suggestion.
    pub fn new(name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Which mentions in the content may ping.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedMentions {
    #[serde(default)]
    pub parse: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<Snowflake>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub users: Vec<Snowflake>,
    #[serde(default)]
    pub replied_user: bool,
}

impl AllowedMentions {
    /// Suppresses every ping.
    pub fn none() -> Self {
        Self::default()
    }
}

/// A rich embed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<EmbedFooter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<EmbedField>,
}

impl Embed {
    /// An empty embed.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn color(mut self, color: u32) -> Self {
        self.color = Some(color);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: impl Into<String>, inline: bool) -> Self {
        self.fields.push(EmbedField {
            name: name.into(),
            value: value.into(),
            inline,
        });
        self
    }

    pub fn footer(mut self, text: impl Into<String>) -> Self {
        self.footer = Some(EmbedFooter {
            text: text.into(),
            icon_url: None,
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub inline: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbedFooter {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pong_has_no_data() {
        assert_eq!(serde_json::to_value(ResponsePayload::pong()).unwrap(), json!({"type": 1}));
    }

    #[test]
    fn autocomplete_payload_shape() {
        let payload = ResponsePayload::autocomplete(vec![CompletedOption::new("Rust", "rust")]);
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            json!({"type": 8, "data": {"choices": [{"name": "Rust", "value": "rust"}]}})
        );
    }

    #[test]
    fn ephemeral_message_sets_flag() {
        let json = serde_json::to_value(ResponsePayload::ephemeral_message("nope")).unwrap();
        assert_eq!(json["type"], 4);
        assert_eq!(json["data"]["flags"], 64);
        assert_eq!(json["data"]["content"], "nope");
    }
}
