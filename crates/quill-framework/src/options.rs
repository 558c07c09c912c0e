//! Typed command options.
//!
//! A command's option schema comes from the struct its handler takes through
//! [`Options<T>`](crate::Options). The struct implements [`CommandOptions`],
//! usually through `#[derive(CommandOptions)]`, and every field type
//! implements [`OptionValue`].
//!
//! ```rust,ignore
//! #[derive(CommandOptions)]
//! struct BanArgs {
//!     #[option(description = "Who to ban")]
//!     member: Member,
//!     #[option(description = "Days of messages to delete", default = 0)]
//!     days: i64,
//!     reason: Option<String>,
//! }
//! ```

use std::collections::HashMap;

use quill_core::{
    CommandChoice, CommandDataOption, CommandOption, CommandOptionType, Member, PartialChannel,
    ResolvedData, Role, Snowflake, User,
};
use serde_json::Value;

use crate::error::OptionError;

/// Description used for options declared without one.
pub fn default_description(kind: CommandOptionType, has_choices: bool) -> &'static str {
    if has_choices {
        return "Select an option from the list.";
    }
    match kind {
        CommandOptionType::Integer => "Enter any whole number.",
        CommandOptionType::Number => "Enter any number.",
        CommandOptionType::Boolean => "Enter either true or false.",
        CommandOptionType::User => "Select a member.",
        CommandOptionType::Role => "Select a role.",
        CommandOptionType::Channel => "Select a channel.",
        CommandOptionType::Mentionable => "Select a role or member.",
        _ => "Enter some text.",
    }
}

// ============================================================================
// OptionValue
// ============================================================================

/// A type a single option value binds to.
pub trait OptionValue: Sized + Send {
    /// Wire type of the option.
    const KIND: CommandOptionType;

    /// Fixed choices offered to the user.
    fn choices() -> Vec<CommandChoice> {
        Vec::new()
    }

    /// Whether the option must be provided.
    fn required() -> bool {
        true
    }

    /// Value used when the option was not sent. `None` makes it an error.
    fn absent() -> Option<Self> {
        None
    }

    /// Binds a raw value, looking entities up in `resolved`.
    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String>;
}

impl OptionValue for String {
    const KIND: CommandOptionType = CommandOptionType::String;

    fn from_value(value: &Value, _: &ResolvedData) -> Result<Self, String> {
        value
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| format!("expected a string, got {value}"))
    }
}

impl OptionValue for i64 {
    const KIND: CommandOptionType = CommandOptionType::Integer;

    fn from_value(value: &Value, _: &ResolvedData) -> Result<Self, String> {
        value
            .as_i64()
            .ok_or_else(|| format!("expected an integer, got {value}"))
    }
}

impl OptionValue for f64 {
    const KIND: CommandOptionType = CommandOptionType::Number;

    fn from_value(value: &Value, _: &ResolvedData) -> Result<Self, String> {
        value
            .as_f64()
            .ok_or_else(|| format!("expected a number, got {value}"))
    }
}

impl OptionValue for bool {
    const KIND: CommandOptionType = CommandOptionType::Boolean;

    fn from_value(value: &Value, _: &ResolvedData) -> Result<Self, String> {
        value
            .as_bool()
            .ok_or_else(|| format!("expected a boolean, got {value}"))
    }
}

fn snowflake(value: &Value) -> Result<Snowflake, String> {
    value
        .as_str()
        .and_then(|s| s.parse().ok())
        .or_else(|| value.as_u64().map(Snowflake::new))
        .ok_or_else(|| format!("expected an entity id, got {value}"))
}

impl OptionValue for User {
    const KIND: CommandOptionType = CommandOptionType::User;

    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String> {
        let id = snowflake(value)?;
        resolved
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("user {id} was not resolved"))
    }
}

impl OptionValue for Member {
    const KIND: CommandOptionType = CommandOptionType::User;

    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String> {
        let id = snowflake(value)?;
        resolved
            .member(id)
            .ok_or_else(|| format!("member {id} was not resolved"))
    }
}

impl OptionValue for Role {
    const KIND: CommandOptionType = CommandOptionType::Role;

    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String> {
        let id = snowflake(value)?;
        resolved
            .roles
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("role {id} was not resolved"))
    }
}

impl OptionValue for PartialChannel {
    const KIND: CommandOptionType = CommandOptionType::Channel;

    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String> {
        let id = snowflake(value)?;
        resolved
            .channels
            .get(&id)
            .cloned()
            .ok_or_else(|| format!("channel {id} was not resolved"))
    }
}

/// A role, or a user with their membership when invoked in a guild.
#[derive(Debug, Clone, PartialEq)]
pub enum Mentionable {
    Role(Role),
    Member(Member),
    User(User),
}

impl Mentionable {
    /// `<@&id>` or `<@id>`.
    pub fn mention(&self) -> String {
        match self {
            Self::Role(role) => role.mention(),
            Self::Member(member) => member
                .user
                .as_ref()
                .map(User::mention)
                .unwrap_or_default(),
            Self::User(user) => user.mention(),
        }
    }
}

impl OptionValue for Mentionable {
    const KIND: CommandOptionType = CommandOptionType::Mentionable;

    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String> {
        let id = snowflake(value)?;
        if let Some(role) = resolved.roles.get(&id) {
            return Ok(Self::Role(role.clone()));
        }
        if let Some(member) = resolved.member(id) {
            return Ok(Self::Member(member));
        }
        resolved
            .users
            .get(&id)
            .cloned()
            .map(Self::User)
            .ok_or_else(|| format!("mentionable {id} was not resolved"))
    }
}

/// Optional options may be left out by the user.
impl<T: OptionValue> OptionValue for Option<T> {
    const KIND: CommandOptionType = T::KIND;

    fn choices() -> Vec<CommandChoice> {
        T::choices()
    }

    fn required() -> bool {
        false
    }

    fn absent() -> Option<Self> {
        Some(None)
    }

    fn from_value(value: &Value, resolved: &ResolvedData) -> Result<Self, String> {
        T::from_value(value, resolved).map(Some)
    }
}

// ============================================================================
// CommandOptions
// ============================================================================

/// A set of options bound together, one per field.
pub trait CommandOptions: Sized + Send {
    /// Schema of every option, in declaration order.
    fn options() -> Vec<CommandOption>;

    /// Binds the values sent with an invocation.
    fn from_options(options: &ResolvedOptions<'_>) -> Result<Self, OptionError>;
}

impl CommandOptions for () {
    fn options() -> Vec<CommandOption> {
        Vec::new()
    }

    fn from_options(_: &ResolvedOptions<'_>) -> Result<Self, OptionError> {
        Ok(())
    }
}

/// Option values of one invocation, by name.
///
/// Options the platform reports with a `null` value are treated as not sent.
#[derive(Debug)]
pub struct ResolvedOptions<'a> {
    values: HashMap<&'a str, &'a Value>,
    resolved: &'a ResolvedData,
}

impl<'a> ResolvedOptions<'a> {
    /// Indexes top-level option values.
    pub fn new(options: &'a [CommandDataOption], resolved: &'a ResolvedData) -> Self {
        let values = options
            .iter()
            .filter_map(|option| match &option.value {
                Some(Value::Null) | None => None,
                Some(value) => Some((option.name.as_str(), value)),
            })
            .collect();
        Self { values, resolved }
    }

    /// Whether a value was sent for `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// The raw value sent for `name`.
    pub fn raw(&self, name: &str) -> Option<&'a Value> {
        self.values.get(name).copied()
    }

    /// Binds the value for `name`.
    pub fn get<T: OptionValue>(&self, name: &str) -> Result<T, OptionError> {
        match self.raw(name) {
            Some(value) => T::from_value(value, self.resolved)
                .map_err(|reason| OptionError::invalid(name, reason)),
            None => T::absent().ok_or_else(|| OptionError::Missing {
                name: name.to_owned(),
            }),
        }
    }

    /// Binds the value for `name`, or `default` when it was not sent.
    pub fn get_or<T: OptionValue>(
        &self,
        name: &str,
        default: impl FnOnce() -> T,
    ) -> Result<T, OptionError> {
        if self.contains(name) {
            self.get(name)
        } else {
            Ok(default())
        }
    }
}

/// Builds the schema entry for a field of type `T`.
///
/// Used by `#[derive(CommandOptions)]`.
pub fn option_schema<T: OptionValue>(
    name: &str,
    description: Option<&str>,
    has_default: bool,
    autocomplete: bool,
) -> CommandOption {
    let choices = T::choices();
    let description =
        description.unwrap_or_else(|| default_description(T::KIND, !choices.is_empty()));
    let mut option = CommandOption::new(T::KIND, name, description)
        .required(T::required() && !has_default)
        .choices(choices);
    option.autocomplete = autocomplete;
    option
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_core::{ChoiceValue, Interaction};
    use serde_json::json;

    fn interaction(options: Value) -> Interaction {
        serde_json::from_value(json!({
            "id": "1",
            "application_id": "2",
            "type": 2,
            "token": "t",
            "data": {
                "name": "ban",
                "options": options,
                "resolved": {
                    "users": { "10": { "id": "10", "username": "ferris" } },
                    "members": { "10": { "roles": [], "nick": "crab" } },
                    "roles": { "20": {
                        "id": "20", "name": "mods", "color": 0, "hoist": false,
                        "position": 1, "permissions": "0", "managed": false,
                        "mentionable": true
                    } }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn binds_primitives_and_entities() {
        let i = interaction(json!([
            { "name": "text", "type": 3, "value": "hi" },
            { "name": "days", "type": 4, "value": 7 },
            { "name": "member", "type": 6, "value": "10" },
            { "name": "role", "type": 9, "value": "20" }
        ]));
        let data = i.data.as_ref().unwrap();
        let opts = ResolvedOptions::new(&data.options, &data.resolved);

        assert_eq!(opts.get::<String>("text").unwrap(), "hi");
        assert_eq!(opts.get::<i64>("days").unwrap(), 7);
        let member = opts.get::<Member>("member").unwrap();
        assert_eq!(member.nick.as_deref(), Some("crab"));
        assert_eq!(member.user.unwrap().username, "ferris");
        assert!(matches!(
            opts.get::<Mentionable>("role").unwrap(),
            Mentionable::Role(_)
        ));
    }

    #[test]
    fn null_values_count_as_absent() {
        let i = interaction(json!([{ "name": "reason", "type": 3, "value": null }]));
        let data = i.data.as_ref().unwrap();
        let opts = ResolvedOptions::new(&data.options, &data.resolved);

        assert!(!opts.contains("reason"));
        assert_eq!(opts.get::<Option<String>>("reason").unwrap(), None);
        assert_eq!(
            opts.get::<String>("reason").unwrap_err(),
            OptionError::Missing {
                name: "reason".into()
            }
        );
        assert_eq!(opts.get_or("reason", || "none".to_owned()).unwrap(), "none");
    }

    #[test]
    fn wrong_shape_is_invalid() {
        let i = interaction(json!([{ "name": "days", "type": 4, "value": "seven" }]));
        let data = i.data.as_ref().unwrap();
        let opts = ResolvedOptions::new(&data.options, &data.resolved);
        assert!(matches!(
            opts.get::<i64>("days"),
            Err(OptionError::Invalid { .. })
        ));
    }

    #[test]
    fn schema_defaults() {
        let opt = option_schema::<Option<i64>>("limit", None, false, false);
        assert!(!opt.required);
        assert_eq!(opt.description, "Enter any whole number.");

        let opt = option_schema::<String>("query", Some("Search"), false, true);
        assert!(opt.required);
        assert!(opt.autocomplete);

        let opt = option_schema::<i64>("days", None, true, false);
        assert!(!opt.required);
    }

    #[test]
    fn choices_get_their_own_description() {
        assert_eq!(
            default_description(CommandOptionType::String, true),
            "Select an option from the list."
        );
        let choice = CommandChoice::new("Red", "red");
        assert_eq!(choice.value, ChoiceValue::String("red".into()));
    }

    #[derive(Debug, PartialEq, crate::OptionChoice)]
    enum Color {
        Red,
        #[choice(name = "Dark blue", value = "navy")]
        DarkBlue,
    }

    #[derive(crate::CommandOptions)]
    struct PaintArgs {
        /// What to paint
        target: User,
        color: Color,
        #[option(rename = "coats", default = 2)]
        layers: i64,
        #[option(description = "Leave a note", autocomplete)]
        note: Option<String>,
    }

    #[test]
    fn derived_schema() {
        let options = PaintArgs::options();
        let names: Vec<_> = options.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["target", "color", "coats", "note"]);

        assert_eq!(options[0].description, "What to paint");
        assert!(options[0].required);
        assert_eq!(options[1].kind, CommandOptionType::String);
        assert_eq!(
            options[1].choices[1],
            CommandChoice::new("Dark blue", ChoiceValue::from("navy"))
        );
        assert_eq!(options[1].choices[0].value, ChoiceValue::from("red"));
        assert!(!options[2].required);
        assert!(!options[3].required);
        assert!(options[3].autocomplete);
    }

    #[test]
    fn derived_binding() {
        let i = interaction(json!([
            { "name": "target", "type": 6, "value": "10" },
            { "name": "color", "type": 3, "value": "navy" }
        ]));
        let data = i.data.as_ref().unwrap();
        let args = PaintArgs::from_options(&ResolvedOptions::new(&data.options, &data.resolved))
            .unwrap();
        assert_eq!(args.target.username, "ferris");
        assert_eq!(args.color, Color::DarkBlue);
        assert_eq!(args.layers, 2);
        assert_eq!(args.note, None);

        let i = interaction(json!([
            { "name": "target", "type": 6, "value": "10" },
            { "name": "color", "type": 3, "value": "green" }
        ]));
        let data = i.data.as_ref().unwrap();
        assert!(matches!(
            PaintArgs::from_options(&ResolvedOptions::new(&data.options, &data.resolved)),
            Err(OptionError::Invalid { .. })
        ));
    }
}
