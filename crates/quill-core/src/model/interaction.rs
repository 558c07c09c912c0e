//! Inbound interactions.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::command::{CommandOptionType, CommandType};
use super::component::ComponentType;
use super::entity::{Member, Message, PartialChannel, Role, User};
use super::flags::Permissions;
use crate::id::Snowflake;

wire_enum! {
    /// Kind of inbound interaction.
    pub enum InteractionType {
        Ping = 1,
        ApplicationCommand = 2,
        MessageComponent = 3,
        Autocomplete = 4,
    }
}

/// An inbound interaction.
///
/// Parsed once per request and passed by value through the check pipeline;
/// checks may return an enriched copy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: Snowflake,
    pub application_id: Snowflake,
    #[serde(rename = "type")]
    pub kind: InteractionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<InteractionData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<Snowflake>,
    /// Invoking member, present in guilds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<Member>,
    /// Invoking user, present in direct messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    /// Short-lived continuation token for follow-ups.
    pub token: String,
    #[serde(default = "default_version")]
    pub version: u8,
    /// Message the component was attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guild_locale: Option<String>,
}

fn default_version() -> u8 {
    1
}

impl Interaction {
    /// The invoking user, whether the interaction came from a guild or a DM.
    pub fn author(&self) -> Option<&User> {
        self.member
            .as_ref()
            .and_then(|m| m.user.as_ref())
            .or(self.user.as_ref())
    }

    /// Permissions of the invoking member. `None` outside guilds.
    pub fn member_permissions(&self) -> Option<Permissions> {
        self.member.as_ref().and_then(|m| m.permissions)
    }

    /// Command name for command and autocomplete interactions.
    pub fn command_name(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.name.as_deref())
    }

    /// Raw custom identifier for component interactions.
    pub fn custom_id(&self) -> Option<&str> {
        self.data.as_ref().and_then(|d| d.custom_id.as_deref())
    }

    /// The option currently being typed in an autocomplete interaction.
    pub fn focused_option(&self) -> Option<&CommandDataOption> {
        self.data
            .as_ref()
            .and_then(|d| CommandDataOption::find_focused(&d.options))
    }
}

/// Payload of an interaction.
///
/// The platform uses one object for every interaction kind; which fields are
/// present depends on [`Interaction::kind`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CommandType>,
    #[serde(default, skip_serializing_if = "ResolvedData::is_empty")]
    pub resolved: ResolvedData,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandDataOption>,
    /// Target of a user or message context-menu command.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<Snowflake>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_type: Option<ComponentType>,
    /// Values chosen in a select menu.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<String>,
}

/// Entities referenced by option values or context-menu targets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedData {
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub users: HashMap<Snowflake, User>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub members: HashMap<Snowflake, Member>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub roles: HashMap<Snowflake, Role>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub channels: HashMap<Snowflake, PartialChannel>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub messages: HashMap<Snowflake, Message>,
}

impl ResolvedData {
    /// Whether nothing was resolved.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
            && self.members.is_empty()
            && self.roles.is_empty()
            && self.channels.is_empty()
            && self.messages.is_empty()
    }

    /// A member with its `user` field filled from the users table.
    pub fn member(&self, id: Snowflake) -> Option<Member> {
        let mut member = self.members.get(&id)?.clone();
        if member.user.is_none() {
            member.user = self.users.get(&id).cloned();
        }
        Some(member)
    }
}

/// An option value as sent by the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDataOption {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: CommandOptionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Nested options of a subcommand or subcommand group.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandDataOption>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub focused: bool,
}

impl CommandDataOption {
    fn find_focused(options: &[CommandDataOption]) -> Option<&CommandDataOption> {
        options.iter().find_map(|option| {
            if option.focused {
                Some(option)
            } else {
                Self::find_focused(&option.options)
            }
        })
    }

    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        self.value.as_ref().and_then(Value::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_command_interaction() {
        let raw = json!({
            "id": "1",
            "application_id": "2",
            "type": 2,
            "token": "tok",
            "guild_id": "3",
            "member": {
                "user": {"id": "4", "username": "ferris"},
                "roles": [],
                "permissions": "8"
            },
            "data": {
                "id": "5",
                "name": "echo",
                "type": 1,
                "options": [{"name": "text", "type": 3, "value": "hi"}]
            }
        });
        let interaction: Interaction = serde_json::from_value(raw).unwrap();
        assert_eq!(interaction.kind, InteractionType::ApplicationCommand);
        assert_eq!(interaction.command_name(), Some("echo"));
        assert_eq!(interaction.author().map(|u| u.username.as_str()), Some("ferris"));
        assert_eq!(interaction.member_permissions(), Some(Permissions::ADMINISTRATOR));
        assert_eq!(interaction.version, 1);
    }

    #[test]
    fn unknown_interaction_type_is_kept() {
        let raw = json!({"id": "1", "application_id": "2", "type": 9, "token": "t"});
        let interaction: Interaction = serde_json::from_value(raw).unwrap();
        assert_eq!(interaction.kind, InteractionType::Unknown(9));
    }

    #[test]
    fn focused_option_is_found_in_subcommands() {
        let raw = json!({
            "id": "1", "application_id": "2", "type": 4, "token": "t",
            "data": {
                "name": "tag",
                "options": [{
                    "name": "get", "type": 1,
                    "options": [{"name": "key", "type": 3, "value": "ru", "focused": true}]
                }]
            }
        });
        let interaction: Interaction = serde_json::from_value(raw).unwrap();
        let focused = interaction.focused_option().unwrap();
        assert_eq!(focused.name, "key");
        assert_eq!(focused.as_str(), Some("ru"));
    }

    #[test]
    fn resolved_member_merges_user() {
        let raw = json!({
            "users": {"7": {"id": "7", "username": "corro"}},
            "members": {"7": {"roles": [], "nick": "c"}}
        });
        let resolved: ResolvedData = serde_json::from_value(raw).unwrap();
        let member = resolved.member(Snowflake::new(7)).unwrap();
        assert_eq!(member.user.unwrap().username, "corro");
        assert_eq!(member.nick.as_deref(), Some("c"));
    }
}
