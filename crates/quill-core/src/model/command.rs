//! Application command schemas.

use serde::{Deserialize, Serialize};

use crate::id::Snowflake;

wire_enum! {
    /// Kind of application command.
    pub enum CommandType {
        /// Slash command typed in the chat input.
        ChatInput = 1,
        /// Context-menu command on a user.
        User = 2,
        /// Context-menu command on a message.
        Message = 3,
    }
}

wire_enum! {
    /// Kind of command option.
    pub enum CommandOptionType {
        SubCommand = 1,
        SubCommandGroup = 2,
        String = 3,
        Integer = 4,
        Boolean = 5,
        User = 6,
        Channel = 7,
        Role = 8,
        Mentionable = 9,
        Number = 10,
    }
}

impl CommandOptionType {
    /// Whether the option type accepts a fixed list of choices.
    pub fn supports_choices(self) -> bool {
        matches!(self, Self::String | Self::Integer | Self::Number)
    }
}

/// Where a command is published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CommandScope {
    /// Available in every guild and in DMs.
    Global,
    /// Available only in one guild.
    Guild(Snowflake),
}

impl std::fmt::Display for CommandScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Guild(id) => write!(f, "guild {id}"),
        }
    }
}

/// A command definition as submitted to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSchema {
    pub name: String,
    /// Empty for context-menu commands.
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: CommandType,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
    #[serde(default = "default_true")]
    pub default_permission: bool,
}

fn default_true() -> bool {
    true
}

/// One option of a command schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOption {
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub autocomplete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOption>,
}

impl CommandOption {
    /// Creates a required option with no choices.
    pub fn new(
        kind: CommandOptionType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: true,
            choices: Vec::new(),
            channel_types: Vec::new(),
            autocomplete: false,
            options: Vec::new(),
        }
    }

    /// Sets whether the option must be provided.
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Sets the fixed choices.
    pub fn choices(mut self, choices: Vec<CommandChoice>) -> Self {
        self.choices = choices;
        self
    }
}

/// A fixed choice for an option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: ChoiceValue,
}

impl CommandChoice {
    /// Creates a choice.
    pub fn new(name: impl Into<String>, value: impl Into<ChoiceValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Value of a choice or completed autocomplete option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChoiceValue {
    Integer(i64),
    Number(f64),
    String(String),
}

impl From<i64> for ChoiceValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for ChoiceValue {
    fn from(v: f64) -> Self {
        Self::Number(v)
    }
}

impl From<String> for ChoiceValue {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<&str> for ChoiceValue {
    fn from(v: &str) -> Self {
        Self::String(v.to_owned())
    }
}

/// A command as returned by the platform after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredCommand {
    pub id: Snowflake,
    pub application_id: Snowflake,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type", default = "default_command_type")]
    pub kind: CommandType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
}

fn default_command_type() -> CommandType {
    CommandType::ChatInput
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_omits_empty_collections() {
        let schema = CommandSchema {
            name: "ping".into(),
            description: "Pong!".into(),
            kind: CommandType::ChatInput,
            options: Vec::new(),
            default_permission: true,
        };
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "name": "ping",
                "description": "Pong!",
                "type": 1,
                "default_permission": true
            })
        );
    }

    #[test]
    fn choice_values_are_untagged() {
        let choice = CommandChoice::new("Big", 10i64);
        assert_eq!(
            serde_json::to_value(&choice).unwrap(),
            serde_json::json!({"name": "Big", "value": 10})
        );
    }
}
