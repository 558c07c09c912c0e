//! Wire model for interactions, commands, components and responses.

pub mod command;
pub mod component;
pub mod entity;
pub mod flags;
pub mod interaction;
pub mod response;

pub use command::{
    ChoiceValue, CommandChoice, CommandOption, CommandOptionType, CommandSchema, CommandScope,
    CommandType, RegisteredCommand,
};
pub use component::{ActionRow, ButtonStyle, ComponentData, ComponentType, PartialEmoji, SelectOption};
pub use entity::{Member, Message, PartialChannel, Role, User};
pub use flags::{MessageFlags, Permissions};
pub use interaction::{
    CommandDataOption, Interaction, InteractionData, InteractionType, ResolvedData,
};
pub use response::{
    AllowedMentions, CompletedOption, Embed, EmbedField, EmbedFooter, ResponseData,
    ResponsePayload, ResponseType,
};
