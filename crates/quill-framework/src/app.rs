//! The application: registries plus the handle handlers see at runtime.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;
use std::sync::{Arc, OnceLock};

use quill_core::{RestApi, Snowflake};
use quill_state::{COMMAND_STATE, ManagedState, Namespace};

use crate::callable::IntoErrorHandler;
use crate::command::{CommandBuilder, CommandRegistry};
use crate::component::{ButtonBuilder, ComponentRegistry, SelectBuilder};
use crate::deletion::ParentDeletions;
use crate::dispatcher::{DispatchSettings, Dispatcher};
use crate::error_handlers::ErrorHandlers;
use crate::response::ComponentRef;

// ============================================================================
// AppHandle
// ============================================================================

/// Shared services of a running application.
///
/// Cheap to clone. Handlers receive it by declaring an `AppHandle` parameter.
#[derive(Clone)]
pub struct AppHandle {
    application_id: Snowflake,
    state: ManagedState,
    rest: Option<Arc<dyn RestApi>>,
    deletions: Option<ParentDeletions>,
    components: Arc<OnceLock<HashMap<String, ComponentRef>>>,
}

impl AppHandle {
    /// A handle without REST access.
    pub fn new(application_id: Snowflake, state: ManagedState) -> Self {
        Self {
            application_id,
            state,
            rest: None,
            deletions: None,
            components: Arc::new(OnceLock::new()),
        }
    }

    /// Attaches the REST client.
    pub fn with_rest(mut self, rest: Arc<dyn RestApi>) -> Self {
        self.rest = Some(rest);
        self
    }

    /// Attaches the queue of parent messages to delete.
    pub fn with_deletions(mut self, deletions: ParentDeletions) -> Self {
        self.deletions = Some(deletions);
        self
    }

    pub fn application_id(&self) -> Snowflake {
        self.application_id
    }

    pub fn state(&self) -> &ManagedState {
        &self.state
    }

    pub fn rest(&self) -> Option<&Arc<dyn RestApi>> {
        self.rest.as_ref()
    }

    pub fn deletions(&self) -> Option<&ParentDeletions> {
        self.deletions.as_ref()
    }

    /// Where invocation contexts live.
    pub fn contexts(&self) -> Namespace {
        self.state.namespace(COMMAND_STATE)
    }

    /// A registered component, for placing in a response.
    ///
    /// ```rust,ignore
    /// async fn menu(app: AppHandle) -> Response {
    ///     let mut response = Response::new().content("Pick one");
    ///     if let Some(more) = app.component("more") {
    ///         response = response.row([more]);
    ///     }
    ///     response
    /// }
    /// ```
    pub fn component(&self, custom_id: &str) -> Option<ComponentRef> {
        self.components.get()?.get(custom_id).cloned()
    }

    fn publish_components(&self, registry: &ComponentRegistry) {
        let index = registry
            .iter()
            .map(|c| (c.custom_id().to_owned(), c.component_ref()))
            .collect();
        // a handle is bound to one dispatcher; later calls keep the first index
        let _ = self.components.set(index);
    }
}

impl fmt::Debug for AppHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppHandle")
            .field("application_id", &self.application_id)
            .field("state", &self.state)
            .field("has_rest", &self.rest.is_some())
            .finish()
    }
}

// ============================================================================
// Application
// ============================================================================

/// Commands, components and error handlers of one bot.
///
/// ```rust,ignore
/// let mut app = Application::new();
/// app.command("ping", "Check the bot is alive").build(|| async { "pong" })?;
/// app.button("count").label("+1").build(increment)?;
/// app.on_error::<QuotaExceeded, _>(|_: Interaction, _: BoxError| async {
///     Response::new().content("Slow down!").ephemeral()
/// });
/// ```
#[derive(Debug, Default)]
pub struct Application {
    commands: CommandRegistry,
    components: ComponentRegistry,
    error_handlers: ErrorHandlers,
}

impl Application {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts registering a slash command.
    pub fn command(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> CommandBuilder<'_> {
        self.commands.command(name, description)
    }

    /// Starts registering a user context-menu command.
    pub fn user_command(&mut self, name: impl Into<String>) -> CommandBuilder<'_> {
        self.commands.user_command(name)
    }

    /// Starts registering a message context-menu command.
    pub fn message_command(&mut self, name: impl Into<String>) -> CommandBuilder<'_> {
        self.commands.message_command(name)
    }

    /// Starts registering a button.
    pub fn button(&mut self, custom_id: impl Into<String>) -> ButtonBuilder<'_> {
        self.components.button(custom_id)
    }

    /// Starts registering a string select menu.
    pub fn select(&mut self, custom_id: impl Into<String>) -> SelectBuilder<'_> {
        self.components.select(custom_id)
    }

    /// Handles errors of type `E` no check, command or component claimed.
    pub fn on_error<E, M>(&mut self, handler: impl IntoErrorHandler<M>) -> &mut Self
    where
        E: StdError + 'static,
    {
        self.error_handlers.insert::<E, M>(handler);
        self
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.components
    }

    /// Freezes the registries into a dispatcher bound to `app`.
    pub fn into_dispatcher(self, app: AppHandle, settings: DispatchSettings) -> Dispatcher {
        app.publish_components(&self.components);
        Dispatcher::new(
            self.commands,
            self.components,
            self.error_handlers,
            app,
            settings,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_state::MemoryBackend;

    #[test]
    fn components_are_reachable_after_freezing() {
        let handle = AppHandle::new(Snowflake::new(7), ManagedState::new(MemoryBackend::new()));
        let mut app = Application::new();
        app.button("more").label("More").build(|| async {}).unwrap();

        assert!(handle.component("more").is_none());
        let _dispatcher = app.into_dispatcher(handle.clone(), DispatchSettings::default());

        let more = handle.component("more").unwrap();
        assert_eq!(more.base_id(), Some("more"));
        assert!(handle.component("less").is_none());
        assert_eq!(handle.contexts().name(), COMMAND_STATE);
    }
}
