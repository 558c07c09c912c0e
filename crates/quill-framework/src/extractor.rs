//! Handler parameter extraction.
//!
//! Every handler parameter implements [`FromInvocation`]. Besides extracting
//! itself, each type reports a [`ParamSpec`] describing what it needs; the
//! registries collect these once at registration to validate the handler and
//! to build the option schema.
//!
//! | Parameter                 | Needs                                     |
//! |---------------------------|-------------------------------------------|
//! | [`Interaction`]           | nothing                                   |
//! | [`AppHandle`]             | nothing                                   |
//! | [`ManagedState`]          | nothing                                   |
//! | [`InvokeContext`]         | a stored context (components only)        |
//! | `Option<InvokeContext>`   | nothing, `None` when there is no context  |
//! | [`Options<T>`]            | the command's options (chat input)        |
//! | [`Target<T>`]             | a context-menu target                     |
//! | [`Selected`]              | a select menu                             |
//! | [`Focused`]               | an autocomplete interaction               |

use quill_core::{
    CommandOption, CommandOptionType, Interaction, InteractionType, Member, Message,
    ResolvedData, Snowflake, User,
};
use quill_state::ManagedState;
use serde_json::Value;

use crate::app::AppHandle;
use crate::context::InvokeContext;
use crate::error::{ExtractError, ExtractResult};
use crate::options::{CommandOptions, ResolvedOptions};

// ============================================================================
// Invocation
// ============================================================================

/// Everything a handler's parameters are extracted from.
#[derive(Debug)]
pub struct Invocation {
    interaction: Interaction,
    app: AppHandle,
    context: Option<InvokeContext>,
    single_select: bool,
}

impl Invocation {
    /// Creates an invocation without a context.
    pub fn new(interaction: Interaction, app: AppHandle) -> Self {
        Self {
            interaction,
            app,
            context: None,
            single_select: false,
        }
    }

    /// Attaches the invocation context of a component.
    pub fn with_context(mut self, context: Option<InvokeContext>) -> Self {
        self.context = context;
        self
    }

    /// Marks select values as binding to a single value.
    pub fn with_single_select(mut self, single: bool) -> Self {
        self.single_select = single;
        self
    }

    /// The interaction being handled.
    pub fn interaction(&self) -> &Interaction {
        &self.interaction
    }

    /// The application handle.
    pub fn app(&self) -> &AppHandle {
        &self.app
    }

    /// Removes the context; only one parameter can own it.
    pub fn take_context(&mut self) -> Option<InvokeContext> {
        self.context.take()
    }
}

// ============================================================================
// ParamSpec
// ============================================================================

/// Kind of entity a context-menu command targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    User,
    Message,
}

/// What a handler parameter needs from the invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamSpec {
    /// The raw interaction.
    Interaction,
    /// Application handle, state or REST client.
    App,
    /// The component's invocation context.
    Context {
        /// Whether the handler fails without one.
        required: bool,
    },
    /// The command's typed options.
    Options(fn() -> Vec<CommandOption>),
    /// A context-menu target.
    Target(TargetKind),
    /// Values chosen in a select menu.
    Selected,
    /// The option being autocompleted.
    Focused,
    /// A user-defined extractor with no registration-time requirements.
    Custom(&'static str),
}

impl ParamSpec {
    /// The [`ParamSpec`] of the same parameter wrapped in `Option`.
    pub fn optional(self) -> Self {
        match self {
            Self::Context { .. } => Self::Context { required: false },
            other => other,
        }
    }

    /// Short name used in registration errors.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Interaction => "interaction",
            Self::App => "application handle",
            Self::Context { .. } => "invocation context",
            Self::Options(_) => "options",
            Self::Target(_) => "context-menu target",
            Self::Selected => "selected values",
            Self::Focused => "focused option",
            Self::Custom(name) => name,
        }
    }
}

// ============================================================================
// FromInvocation
// ============================================================================

/// A type that can be used as a handler parameter.
pub trait FromInvocation: Sized + Send {
    /// What this parameter needs, checked at registration.
    fn param() -> ParamSpec;

    /// Extracts the value.
    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self>;
}

impl FromInvocation for Interaction {
    fn param() -> ParamSpec {
        ParamSpec::Interaction
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        Ok(inv.interaction.clone())
    }
}

impl FromInvocation for AppHandle {
    fn param() -> ParamSpec {
        ParamSpec::App
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        Ok(inv.app.clone())
    }
}

impl FromInvocation for ManagedState {
    fn param() -> ParamSpec {
        ParamSpec::App
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        Ok(inv.app.state().clone())
    }
}

impl FromInvocation for InvokeContext {
    fn param() -> ParamSpec {
        ParamSpec::Context { required: true }
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        inv.take_context().ok_or(ExtractError::MissingContext)
    }
}

/// Optional parameters never fail to extract.
impl<T: FromInvocation> FromInvocation for Option<T> {
    fn param() -> ParamSpec {
        T::param().optional()
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        Ok(T::from_invocation(inv).ok())
    }
}

// ─── Options ────────────────────────────────────────────────────────────────

/// Typed options of a chat-input command.
#[derive(Debug, Clone)]
pub struct Options<T>(pub T);

impl<T: CommandOptions> FromInvocation for Options<T> {
    fn param() -> ParamSpec {
        ParamSpec::Options(T::options)
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        let empty = ResolvedData::default();
        let (options, resolved) = match &inv.interaction.data {
            Some(data) => (data.options.as_slice(), &data.resolved),
            None => (&[][..], &empty),
        };
        let options = ResolvedOptions::new(options, resolved);
        Ok(Options(T::from_options(&options)?))
    }
}

// ─── Context-menu targets ───────────────────────────────────────────────────

/// An entity a context-menu command can target.
pub trait TargetEntity: Sized + Send {
    /// Command type this target belongs to.
    const KIND: TargetKind;

    /// Looks the target up.
    fn resolve(id: Snowflake, resolved: &ResolvedData) -> Option<Self>;
}

impl TargetEntity for User {
    const KIND: TargetKind = TargetKind::User;

    fn resolve(id: Snowflake, resolved: &ResolvedData) -> Option<Self> {
        resolved.users.get(&id).cloned()
    }
}

impl TargetEntity for Member {
    const KIND: TargetKind = TargetKind::User;

    fn resolve(id: Snowflake, resolved: &ResolvedData) -> Option<Self> {
        resolved.member(id)
    }
}

impl TargetEntity for Message {
    const KIND: TargetKind = TargetKind::Message;

    fn resolve(id: Snowflake, resolved: &ResolvedData) -> Option<Self> {
        resolved.messages.get(&id).cloned()
    }
}

/// The user or message a context-menu command was invoked on.
#[derive(Debug, Clone)]
pub struct Target<T>(pub T);

impl<T: TargetEntity> FromInvocation for Target<T> {
    fn param() -> ParamSpec {
        ParamSpec::Target(T::KIND)
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        let data = inv.interaction.data.as_ref().ok_or(ExtractError::NoTarget)?;
        let id = data.target_id.ok_or(ExtractError::NoTarget)?;
        T::resolve(id, &data.resolved)
            .map(Target)
            .ok_or(ExtractError::NoTarget)
    }
}

// ─── Select menus ───────────────────────────────────────────────────────────

/// Values chosen in a select menu.
///
/// A menu with `min_values = max_values = 1` binds [`Selected::One`];
/// any other menu binds the full list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selected {
    One(String),
    Many(Vec<String>),
}

impl Selected {
    /// The first chosen value.
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(values) => values.first().map(String::as_str),
        }
    }

    /// All chosen values.
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(value) => vec![value],
            Self::Many(values) => values,
        }
    }
}

impl FromInvocation for Selected {
    fn param() -> ParamSpec {
        ParamSpec::Selected
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        if inv.interaction.kind != InteractionType::MessageComponent {
            return Err(ExtractError::NoSelection);
        }
        let values = inv
            .interaction
            .data
            .as_ref()
            .map(|d| d.values.clone())
            .unwrap_or_default();
        if inv.single_select {
            values
                .into_iter()
                .next()
                .map(Selected::One)
                .ok_or(ExtractError::NoSelection)
        } else {
            Ok(Selected::Many(values))
        }
    }
}

// ─── Autocomplete ───────────────────────────────────────────────────────────

/// The option the user is typing into.
#[derive(Debug, Clone, PartialEq)]
pub struct Focused {
    /// Option name.
    pub name: String,
    /// Text typed so far.
    pub value: String,
    /// Wire type of the option.
    pub kind: CommandOptionType,
}

impl FromInvocation for Focused {
    fn param() -> ParamSpec {
        ParamSpec::Focused
    }

    fn from_invocation(inv: &mut Invocation) -> ExtractResult<Self> {
        let option = inv
            .interaction
            .focused_option()
            .ok_or(ExtractError::NoFocusedOption)?;
        let value = match &option.value {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        Ok(Focused {
            name: option.name.clone(),
            value,
            kind: option.kind,
        })
    }
}
