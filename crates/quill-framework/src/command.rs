//! Application command registry.
//!
//! Commands are registered through a builder that validates the name, the
//! description and the handler's parameter plan, and derives the option
//! schema from the handler's [`Options<T>`](crate::Options) parameter:
//!
//! ```rust,ignore
//! app.command("echo", "Repeat after me")
//!     .guild(test_guild)
//!     .check(require_user_permissions(Permissions::SEND_MESSAGES))
//!     .build(echo)?
//!     .autocomplete_for("text", suggest)?;
//! ```
//!
//! Global and guild-scoped registrations live side by side; a guild-scoped
//! command shadows a global one of the same name inside its guild.

use std::collections::HashMap;

use quill_core::{
    CommandOption, CommandOptionType, CommandSchema, CommandScope, CommandType, Interaction,
    ModelError, ModelResult, Snowflake,
};

use crate::app::AppHandle;
use crate::callable::{Callable, ErrorHandler, IntoCallable, IntoErrorHandler};
use crate::check::{Check, CheckPipeline};
use crate::error::{DispatchError, RegistryError};
use crate::extractor::{Invocation, ParamSpec, TargetKind};
use crate::handler::HandlerResult;
use crate::pool::BlockingPool;

const MAX_NAME_LEN: usize = 32;
const MAX_DESCRIPTION_LEN: usize = 100;

// ============================================================================
// Command
// ============================================================================

/// A registered application command.
#[derive(Debug)]
pub struct Command {
    schema: CommandSchema,
    guild_ids: Vec<Snowflake>,
    register: bool,
    callable: Callable,
    checks: CheckPipeline,
    on_error: Option<ErrorHandler>,
    autocomplete: Option<Callable>,
    option_completers: HashMap<String, Callable>,
}

impl Command {
    /// Command name.
    pub fn name(&self) -> &str {
        &self.schema.name
    }

    /// Schema submitted to the platform.
    pub fn schema(&self) -> &CommandSchema {
        &self.schema
    }

    /// Guilds the command is scoped to. Empty for global commands.
    pub fn guild_ids(&self) -> &[Snowflake] {
        &self.guild_ids
    }

    /// Scopes the command is registered in.
    pub fn scopes(&self) -> Vec<CommandScope> {
        if self.guild_ids.is_empty() {
            vec![CommandScope::Global]
        } else {
            self.guild_ids.iter().copied().map(CommandScope::Guild).collect()
        }
    }

    /// Whether the command is published to the platform on sync.
    pub fn should_register(&self) -> bool {
        self.register
    }

    /// Runs the checks, then the handler.
    ///
    /// A rejection or handler error goes to the check's error handler, then
    /// the command's, with the interaction as it was before any check ran.
    /// `Err` means no error handler claimed it.
    pub async fn invoke(
        &self,
        interaction: Interaction,
        app: &AppHandle,
        pool: &BlockingPool,
    ) -> HandlerResult {
        let original = interaction.clone();
        let interaction = match self.checks.run(interaction, pool).await {
            Ok(interaction) => interaction,
            Err(rejection) => {
                let handler = rejection.on_error.as_ref().or(self.on_error.as_ref());
                return match handler {
                    Some(handler) => handler.handle(original, rejection.error, pool).await,
                    None => Err(rejection.error),
                };
            }
        };

        let inv = Invocation::new(interaction, app.clone());
        match self.callable.invoke(inv, pool).await {
            Err(error) => match &self.on_error {
                Some(handler) => handler.handle(original, error, pool).await,
                None => Err(error),
            },
            ok => ok,
        }
    }

    /// Picks the autocomplete handler for the focused option. Checks are not
    /// consulted for autocomplete.
    pub fn completer_for(&self, interaction: &Interaction) -> Result<&Callable, DispatchError> {
        if let Some(catch_all) = &self.autocomplete {
            return Ok(catch_all);
        }
        let focused = interaction
            .focused_option()
            .ok_or_else(|| DispatchError::BadRequest("autocomplete without a focused option".into()))?;
        self.option_completers.get(&focused.name).ok_or_else(|| {
            DispatchError::BadRequest(format!(
                "command '{}' has no autocomplete handler for '{}'",
                self.name(),
                focused.name
            ))
        })
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Checks a command name against the platform's rules.
pub fn validate_command_name(name: &str, kind: CommandType) -> ModelResult<()> {
    let len = name.chars().count();
    if len == 0 || len > MAX_NAME_LEN {
        return Err(ModelError::invalid_name(name, "must be 1-32 characters"));
    }
    if kind == CommandType::ChatInput {
        let valid = name
            .chars()
            .all(|c| !c.is_uppercase() && (c.is_alphanumeric() || c == '-' || c == '_'));
        if !valid {
            return Err(ModelError::invalid_name(
                name,
                "must be lowercase letters, digits, '-' or '_'",
            ));
        }
    }
    Ok(())
}

fn validate_description(name: &str, description: &str) -> Result<(), RegistryError> {
    let len = description.chars().count();
    if len == 0 || len > MAX_DESCRIPTION_LEN {
        return Err(RegistryError::InvalidDescription {
            name: name.to_owned(),
        });
    }
    Ok(())
}

/// Validates a command handler's parameters and returns its option schema.
fn command_options(
    name: &str,
    kind: CommandType,
    params: &[ParamSpec],
) -> Result<Vec<CommandOption>, RegistryError> {
    let unsupported = |param: &ParamSpec| RegistryError::UnsupportedParam {
        name: name.to_owned(),
        param: param.describe(),
    };

    let mut options: Option<Vec<CommandOption>> = None;
    for param in params {
        match param {
            ParamSpec::Interaction | ParamSpec::App | ParamSpec::Custom(_) => {}
            // Commands never have a context; an optional one is always `None`.
            ParamSpec::Context { required: false } => {}
            ParamSpec::Options(schema) => {
                if kind != CommandType::ChatInput {
                    return Err(unsupported(param));
                }
                if options.is_some() {
                    return Err(RegistryError::MultipleOptionParams {
                        name: name.to_owned(),
                    });
                }
                options = Some(schema());
            }
            ParamSpec::Target(target) => {
                let matches = matches!(
                    (kind, target),
                    (CommandType::User, TargetKind::User) | (CommandType::Message, TargetKind::Message)
                );
                if !matches {
                    return Err(unsupported(param));
                }
            }
            ParamSpec::Context { required: true } | ParamSpec::Selected | ParamSpec::Focused => {
                return Err(unsupported(param));
            }
        }
    }

    let mut options = options.unwrap_or_default();
    for option in &options {
        validate_command_name(&option.name, CommandType::ChatInput)?;
        validate_description(&option.name, &option.description)?;
    }
    // Required options must come first.
    options.sort_by_key(|option| !option.required);
    Ok(options)
}

fn validate_completer(command: &str, callable: &Callable) -> Result<(), RegistryError> {
    for param in callable.params() {
        match param {
            ParamSpec::Interaction
            | ParamSpec::App
            | ParamSpec::Custom(_)
            | ParamSpec::Focused
            | ParamSpec::Context { required: false } => {}
            other => {
                return Err(RegistryError::UnsupportedParam {
                    name: command.to_owned(),
                    param: other.describe(),
                });
            }
        }
    }
    Ok(())
}

// ============================================================================
// Registry
// ============================================================================

/// All commands of an application.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: Vec<Command>,
    index: HashMap<(CommandScope, String), usize>,
}

impl CommandRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts registering a chat-input command.
    pub fn command(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> CommandBuilder<'_> {
        CommandBuilder::new(self, name.into(), description.into(), CommandType::ChatInput)
    }

    /// Starts registering a user context-menu command.
    pub fn user_command(&mut self, name: impl Into<String>) -> CommandBuilder<'_> {
        CommandBuilder::new(self, name.into(), String::new(), CommandType::User)
    }

    /// Starts registering a message context-menu command.
    pub fn message_command(&mut self, name: impl Into<String>) -> CommandBuilder<'_> {
        CommandBuilder::new(self, name.into(), String::new(), CommandType::Message)
    }

    /// Finds the command invoked in `guild_id`, preferring a guild-scoped
    /// registration over a global one.
    pub fn find(&self, name: &str, guild_id: Option<Snowflake>) -> Option<&Command> {
        let guild = guild_id.and_then(|id| self.index.get(&(CommandScope::Guild(id), name.to_owned())));
        guild
            .or_else(|| self.index.get(&(CommandScope::Global, name.to_owned())))
            .map(|&i| &self.commands[i])
    }

    /// Every registered command.
    pub fn iter(&self) -> impl Iterator<Item = &Command> {
        self.commands.iter()
    }

    /// Number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether no command is registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Schemas of global commands to publish.
    pub fn global_schemas(&self) -> Vec<CommandSchema> {
        self.commands
            .iter()
            .filter(|c| c.register && c.guild_ids.is_empty())
            .map(|c| c.schema.clone())
            .collect()
    }

    /// Schemas of guild-scoped commands to publish, by guild.
    pub fn guild_schemas(&self) -> HashMap<Snowflake, Vec<CommandSchema>> {
        let mut by_guild: HashMap<Snowflake, Vec<CommandSchema>> = HashMap::new();
        for command in self.commands.iter().filter(|c| c.register) {
            for guild in &command.guild_ids {
                by_guild.entry(*guild).or_default().push(command.schema.clone());
            }
        }
        by_guild
    }
}

/// Builder returned by [`CommandRegistry::command`].
#[must_use = "commands are only registered by `build`"]
pub struct CommandBuilder<'r> {
    registry: &'r mut CommandRegistry,
    name: String,
    description: String,
    kind: CommandType,
    guild_ids: Vec<Snowflake>,
    default_permission: bool,
    register: bool,
    checks: CheckPipeline,
    on_error: Option<ErrorHandler>,
}

impl<'r> CommandBuilder<'r> {
    fn new(
        registry: &'r mut CommandRegistry,
        name: String,
        description: String,
        kind: CommandType,
    ) -> Self {
        Self {
            registry,
            name,
            description,
            kind,
            guild_ids: Vec::new(),
            default_permission: true,
            register: true,
            checks: CheckPipeline::default(),
            on_error: None,
        }
    }

    /// Scopes the command to a guild. May be called repeatedly.
    pub fn guild(mut self, guild_id: Snowflake) -> Self {
        if !self.guild_ids.contains(&guild_id) {
            self.guild_ids.push(guild_id);
        }
        self
    }

    /// Scopes the command to several guilds.
    pub fn guilds(self, guild_ids: impl IntoIterator<Item = Snowflake>) -> Self {
        guild_ids.into_iter().fold(self, Self::guild)
    }

    /// Whether members can use the command by default.
    pub fn default_permission(mut self, allowed: bool) -> Self {
        self.default_permission = allowed;
        self
    }

    /// Whether the command is published on sync. Defaults to `true`.
    pub fn register(mut self, register: bool) -> Self {
        self.register = register;
        self
    }

    /// Appends a check.
    pub fn check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Handles check rejections and handler errors.
    pub fn on_error<M>(mut self, handler: impl IntoErrorHandler<M>) -> Self {
        self.on_error = Some(handler.into_error_handler());
        self
    }

    /// Validates and registers the command.
    pub fn build<M>(self, handler: impl IntoCallable<M>) -> Result<CommandHandle<'r>, RegistryError> {
        let Self {
            registry,
            name,
            description,
            kind,
            guild_ids,
            default_permission,
            register,
            checks,
            on_error,
        } = self;

        validate_command_name(&name, kind)?;
        if kind == CommandType::ChatInput {
            validate_description(&name, &description)?;
        }
        let callable = handler.into_callable();
        let options = command_options(&name, kind, callable.params())?;

        let command = Command {
            schema: CommandSchema {
                name: name.clone(),
                description,
                kind,
                options,
                default_permission,
            },
            guild_ids,
            register,
            callable,
            checks,
            on_error,
            autocomplete: None,
            option_completers: HashMap::new(),
        };

        let scopes = command.scopes();
        if let Some(taken) = scopes
            .iter()
            .find(|scope| registry.index.contains_key(&(**scope, name.clone())))
        {
            return Err(RegistryError::Duplicate {
                kind: "command",
                name,
                scope: format!(" in {taken}"),
            });
        }

        let index = registry.commands.len();
        for scope in scopes {
            registry.index.insert((scope, name.clone()), index);
        }
        registry.commands.push(command);

        Ok(CommandHandle { registry, index })
    }
}

/// Handle to a freshly registered command for further configuration.
pub struct CommandHandle<'r> {
    registry: &'r mut CommandRegistry,
    index: usize,
}

impl CommandHandle<'_> {
    fn command(&mut self) -> &mut Command {
        &mut self.registry.commands[self.index]
    }

    /// The registered command.
    pub fn get(&self) -> &Command {
        &self.registry.commands[self.index]
    }

    /// Appends a check.
    pub fn check(mut self, check: Check) -> Self {
        self.command().checks.push(check);
        self
    }

    /// Handles check rejections and handler errors.
    pub fn on_error<M>(mut self, handler: impl IntoErrorHandler<M>) -> Self {
        self.command().on_error = Some(handler.into_error_handler());
        self
    }

    /// Handles autocomplete for every option of the command.
    pub fn autocomplete<M>(mut self, handler: impl IntoCallable<M>) -> Result<Self, RegistryError> {
        let callable = handler.into_callable();
        let command = self.command();
        validate_completer(&command.schema.name, &callable)?;
        command.autocomplete = Some(callable);
        Ok(self)
    }

    /// Handles autocomplete for the option named `option` and marks it as
    /// autocompleted in the schema.
    pub fn autocomplete_for<M>(
        mut self,
        option: &str,
        handler: impl IntoCallable<M>,
    ) -> Result<Self, RegistryError> {
        let callable = handler.into_callable();
        let command = self.command();
        validate_completer(&command.schema.name, &callable)?;

        let target = command.schema.options.iter_mut().find(|o| {
            o.name == option
                && o.choices.is_empty()
                && matches!(
                    o.kind,
                    CommandOptionType::String | CommandOptionType::Integer | CommandOptionType::Number
                )
        });
        let Some(target) = target else {
            return Err(RegistryError::UnknownOption {
                command: command.schema.name.clone(),
                option: option.to_owned(),
            });
        };
        target.autocomplete = true;
        command.option_completers.insert(option.to_owned(), callable);
        Ok(self)
    }
}
