//! Interaction dispatcher.
//!
//! The [`Dispatcher`] routes a parsed [`Interaction`] to its command,
//! autocomplete handler or component, runs the fallback chain on errors and
//! normalizes the reply into the wire response.
//!
//! Errors travel outwards until something claims them:
//!
//! ```text
//! check on_error ─▶ command/component on_error ─▶ ErrorHandlers ─▶ Unhandled
//! ```
//!
//! An unhandled error is logged and surfaced as
//! [`DispatchError::Unhandled`]; the HTTP layer still answers the platform
//! with [`Dispatcher::failure_response`].
//!
//! ```rust,ignore
//! let dispatcher = app.into_dispatcher(handle, DispatchSettings::default());
//! let payload = dispatcher.dispatch(interaction).await?;
//! ```

use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use quill_core::{Interaction, InteractionType, ResponsePayload, ResponseType, split_custom_id};
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::app::AppHandle;
use crate::command::CommandRegistry;
use crate::component::ComponentRegistry;
use crate::error::{BoxError, DispatchError, ResponseError};
use crate::error_handlers::ErrorHandlers;
use crate::extractor::Invocation;
use crate::handler::{HandlerResult, Reply};
use crate::normalize::{Finalize, Normalized, normalize};
use crate::pool::{BlockingPool, DEFAULT_BLOCKING_WORKERS};

/// Lifetime of invocation contexts, matching the interaction token lifetime.
pub const DEFAULT_COMPONENT_TTL: Duration = Duration::from_secs(15 * 60);

/// Message sent when an error reaches nothing that handles it.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Something went wrong while handling this interaction.";

/// Tunables of a [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchSettings {
    /// How long component contexts are kept.
    pub component_ttl: Duration,
    /// Ephemeral message sent for unhandled errors.
    pub failure_message: String,
    /// Concurrent blocking handlers.
    pub blocking_workers: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            component_ttl: DEFAULT_COMPONENT_TTL,
            failure_message: DEFAULT_FAILURE_MESSAGE.to_owned(),
            blocking_workers: DEFAULT_BLOCKING_WORKERS,
        }
    }
}

struct Inner {
    commands: CommandRegistry,
    components: ComponentRegistry,
    error_handlers: ErrorHandlers,
    app: AppHandle,
    pool: BlockingPool,
    settings: DispatchSettings,
}

/// Routes interactions to handlers. Cheap to clone.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

/// What is being dispatched, for fallback and normalization.
struct Route<'a> {
    target: &'a str,
    interaction: &'a Interaction,
    default_kind: ResponseType,
    parent: Option<&'a Interaction>,
    inherited_ephemeral: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        commands: CommandRegistry,
        components: ComponentRegistry,
        error_handlers: ErrorHandlers,
        app: AppHandle,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                commands,
                components,
                error_handlers,
                app,
                pool: BlockingPool::new(settings.blocking_workers),
                settings,
            }),
        }
    }

    pub fn app(&self) -> &AppHandle {
        &self.inner.app
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.inner.commands
    }

    pub fn components(&self) -> &ComponentRegistry {
        &self.inner.components
    }

    pub fn settings(&self) -> &DispatchSettings {
        &self.inner.settings
    }

    /// Generic ephemeral reply for interactions whose error went unhandled.
    pub fn failure_response(&self) -> ResponsePayload {
        ResponsePayload::ephemeral_message(self.inner.settings.failure_message.clone())
    }

    /// Handles one interaction.
    pub async fn dispatch(&self, interaction: Interaction) -> Result<ResponsePayload, DispatchError> {
        let span = debug_span!(
            "dispatch",
            interaction_id = %interaction.id,
            kind = u8::from(interaction.kind),
        );
        async move {
            match interaction.kind {
                InteractionType::Ping => Ok(ResponsePayload::pong()),
                InteractionType::ApplicationCommand => self.dispatch_command(interaction).await,
                InteractionType::Autocomplete => self.dispatch_autocomplete(interaction).await,
                InteractionType::MessageComponent => self.dispatch_component(interaction).await,
                other => Err(DispatchError::UnsupportedType(u8::from(other))),
            }
        }
        .instrument(span)
        .await
    }

    // ─── Commands ───

    async fn dispatch_command(
        &self,
        interaction: Interaction,
    ) -> Result<ResponsePayload, DispatchError> {
        let name = command_name(&interaction)?;
        let command = self
            .inner
            .commands
            .find(&name, interaction.guild_id)
            .ok_or_else(|| DispatchError::CommandNotFound(name.clone()))?;
        debug!(command = %name, "Invoking command");

        let reply = command
            .invoke(interaction.clone(), &self.inner.app, &self.inner.pool)
            .await;
        let route = Route {
            target: &name,
            interaction: &interaction,
            default_kind: ResponseType::ChannelMessageWithSource,
            parent: Some(&interaction),
            inherited_ephemeral: false,
        };
        Ok(self.settle(&route, reply).await?.payload)
    }

    async fn dispatch_autocomplete(
        &self,
        interaction: Interaction,
    ) -> Result<ResponsePayload, DispatchError> {
        let name = command_name(&interaction)?;
        let command = self
            .inner
            .commands
            .find(&name, interaction.guild_id)
            .ok_or_else(|| DispatchError::CommandNotFound(name.clone()))?;
        let completer = command.completer_for(&interaction)?;

        let inv = Invocation::new(interaction.clone(), self.inner.app.clone());
        let reply = match completer.invoke(inv, &self.inner.pool).await {
            Ok(Reply::Response(_)) => Err(BoxError::from(ResponseError::UnexpectedAutocompleteReply)),
            Ok(Reply::Empty) => Ok(Reply::Choices(Vec::new())),
            other => other,
        };
        let route = Route {
            target: &name,
            interaction: &interaction,
            default_kind: ResponseType::AutocompleteResult,
            parent: None,
            inherited_ephemeral: false,
        };
        Ok(self.settle(&route, reply).await?.payload)
    }

    // ─── Components ───

    async fn dispatch_component(
        &self,
        interaction: Interaction,
    ) -> Result<ResponsePayload, DispatchError> {
        let raw = interaction
            .custom_id()
            .ok_or_else(|| DispatchError::BadRequest("component interaction without a custom id".into()))?
            .to_owned();
        let custom_id = split_custom_id(&raw);
        let component = self
            .inner
            .components
            .get(custom_id.base)
            .ok_or_else(|| DispatchError::ComponentNotFound(custom_id.base.to_owned()))?;
        debug!(component = %custom_id.base, "Invoking component");

        let outcome = component
            .invoke(
                interaction.clone(),
                custom_id.reference,
                &self.inner.app,
                &self.inner.pool,
            )
            .await;

        let updates = matches!(&outcome.reply, Ok(Reply::Response(r)) if r.kind.is_none_or(|k| k == ResponseType::UpdateMessage));
        let route = Route {
            target: custom_id.base,
            interaction: &interaction,
            default_kind: ResponseType::UpdateMessage,
            parent: if updates {
                outcome.parent.as_ref()
            } else {
                Some(&interaction)
            },
            inherited_ephemeral: outcome.ephemeral,
        };
        let normalized = self.settle(&route, outcome.reply).await?;

        if normalized.delete_parent {
            self.delete_parent(
                outcome.parent.as_ref(),
                outcome.ephemeral,
                outcome.reference_id.as_deref().filter(|_| !component.is_oneshot()),
            )
            .await;
        }
        Ok(normalized.payload)
    }

    async fn delete_parent(
        &self,
        parent: Option<&Interaction>,
        ephemeral: bool,
        stale_reference: Option<&str>,
    ) {
        let Some(parent) = parent else {
            debug!("Parent deletion requested without a known parent");
            return;
        };
        if ephemeral {
            debug!("Ephemeral parents cannot be deleted");
            return;
        }
        match self.inner.app.deletions() {
            Some(deletions) => {
                deletions.queue(parent.token.clone());
            }
            None => warn!("Parent deletion requested but no deletion queue is attached"),
        }
        if let Some(reference) = stale_reference {
            if let Err(error) = self.inner.app.contexts().remove(reference).await {
                warn!(reference_id = %reference, error = %error, "Failed to remove invocation context");
            }
        }
    }

    // ─── Fallback ───

    /// Normalizes a handler result. Errors, including normalization
    /// failures, get one pass through the error handler table.
    async fn settle(
        &self,
        route: &Route<'_>,
        reply: HandlerResult,
    ) -> Result<Normalized, DispatchError> {
        let contexts = self.inner.app.contexts();
        let mut attempt = reply;
        let mut fell_back = false;
        loop {
            let error = match attempt {
                Ok(reply) => {
                    let finalize = Finalize {
                        default_kind: route.default_kind,
                        parent: route.parent,
                        inherited_ephemeral: route.inherited_ephemeral,
                        contexts: &contexts,
                        ttl: self.inner.settings.component_ttl,
                    };
                    match normalize(reply, finalize).await {
                        Ok(normalized) => return Ok(normalized),
                        Err(error) => BoxError::from(error),
                    }
                }
                Err(error) => error,
            };

            if fell_back {
                return Err(self.unhandled(route, error));
            }
            fell_back = true;
            attempt = self
                .inner
                .error_handlers
                .handle(route.interaction.clone(), error, &self.inner.pool)
                .await;
        }
    }

    fn unhandled(&self, route: &Route<'_>, source: BoxError) -> DispatchError {
        error!(
            target_name = %route.target,
            interaction_id = %route.interaction.id,
            error = %source,
            "Unhandled error while handling interaction"
        );
        DispatchError::Unhandled {
            target: route.target.to_owned(),
            interaction_id: route.interaction.id.to_string(),
            source,
        }
    }
}

fn command_name(interaction: &Interaction) -> Result<String, DispatchError> {
    interaction
        .command_name()
        .map(str::to_owned)
        .ok_or_else(|| DispatchError::BadRequest("command interaction without a name".into()))
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.inner.commands.len())
            .field("components", &self.inner.components.len())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

impl tower::Service<Interaction> for Dispatcher {
    type Response = ResponsePayload;
    type Error = DispatchError;
    type Future = BoxFuture<'static, Result<ResponsePayload, DispatchError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, interaction: Interaction) -> Self::Future {
        let this = self.clone();
        Box::pin(async move { this.dispatch(interaction).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::Application;
    use crate::check::{Check, require_user_permissions};
    use crate::context::InvokeContext;
    use crate::deletion::ParentDeletions;
    use crate::error::CheckError;
    use crate::response::Response;
    use quill_core::{MessageFlags, Permissions, Snowflake};
    use quill_state::{ManagedState, MemoryBackend};
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    fn handle() -> AppHandle {
        AppHandle::new(Snowflake::new(1), ManagedState::new(MemoryBackend::new()))
    }

    fn command(name: &str, token: &str) -> Interaction {
        serde_json::from_value(json!({
            "id": "10", "application_id": "1", "type": 2, "token": token,
            "data": { "name": name }
        }))
        .unwrap()
    }

    fn click(custom_id: &str, message_flags: Option<u64>) -> Interaction {
        let mut raw = json!({
            "id": "11", "application_id": "1", "type": 3, "token": "click",
            "data": { "custom_id": custom_id, "component_type": 2 },
            "message": { "id": "20", "channel_id": "30" }
        });
        if let Some(flags) = message_flags {
            raw["message"]["flags"] = json!(flags);
        }
        serde_json::from_value(raw).unwrap()
    }

    fn content(payload: &ResponsePayload) -> Option<&str> {
        payload.data.as_ref()?.content.as_deref()
    }

    fn first_custom_id(payload: &ResponsePayload) -> String {
        let rows = payload.data.as_ref().unwrap().components.as_ref().unwrap();
        rows[0].components[0].custom_id.clone().unwrap()
    }

    fn is_ephemeral(payload: &ResponsePayload) -> bool {
        payload
            .data
            .as_ref()
            .and_then(|d| d.flags)
            .is_some_and(|f| f.contains(MessageFlags::EPHEMERAL))
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong() {
        let dispatcher = Application::new().into_dispatcher(handle(), DispatchSettings::default());
        let ping = serde_json::from_value(json!({
            "id": "1", "application_id": "1", "type": 1, "token": "t"
        }))
        .unwrap();
        let payload = dispatcher.dispatch(ping).await.unwrap();
        assert_eq!(payload.kind, ResponseType::Pong);
        assert!(payload.data.is_none());
    }

    #[tokio::test]
    async fn commands_reply_with_a_new_message() {
        let mut app = Application::new();
        app.command("echo", "Say hi")
            .build(|| async { "hi" })
            .unwrap();
        let dispatcher = app.into_dispatcher(handle(), DispatchSettings::default());

        let payload = dispatcher
            .clone()
            .oneshot(command("echo", "t"))
            .await
            .unwrap();
        assert_eq!(payload.kind, ResponseType::ChannelMessageWithSource);
        assert_eq!(content(&payload), Some("hi"));

        assert!(matches!(
            dispatcher.dispatch(command("nope", "t")).await,
            Err(DispatchError::CommandNotFound(name)) if name == "nope"
        ));
    }

    #[tokio::test]
    async fn rejected_checks_skip_the_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let mut app = Application::new();
        app.command("purge", "Delete messages")
            .check(require_user_permissions(Permissions::MANAGE_MESSAGES))
            .build(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { "purged" }
            })
            .unwrap();
        let dispatcher = app.into_dispatcher(handle(), DispatchSettings::default());

        let mut interaction = command("purge", "t");
        interaction.member = serde_json::from_value(json!({
            "roles": [], "permissions": "2048",
            "user": { "id": "9", "username": "ferris" }
        }))
        .unwrap();

        let payload = dispatcher.dispatch(interaction).await.unwrap();
        assert!(is_ephemeral(&payload));
        assert_eq!(
            content(&payload),
            Some("You are missing the required permissions: Manage Messages")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unclaimed_errors_are_unhandled() {
        let mut app = Application::new();
        app.command("fail", "Always fails")
            .check(Check::new(|i: Interaction| async move { Ok::<_, CheckError>(i) }))
            .build(|| async { Err::<(), _>("database down") })
            .unwrap();
        let dispatcher = app.into_dispatcher(handle(), DispatchSettings::default());

        let err = dispatcher.dispatch(command("fail", "t")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Unhandled { ref target, .. } if target == "fail"));
        assert!(!err.is_client_error());
        assert!(is_ephemeral(&dispatcher.failure_response()));
    }

    #[tokio::test]
    async fn counter_round_trip() {
        async fn start(app: AppHandle) -> Response {
            let button = app.component("count").unwrap();
            Response::new().content("0").row([button]).context("count", 0)
        }

        async fn count(app: AppHandle, ctx: InvokeContext) -> Response {
            let next = ctx.get::<i64>("count").unwrap().unwrap_or(0) + 1;
            let button = app.component("count").unwrap();
            Response::new()
                .content(next.to_string())
                .row([button])
                .context("count", next)
        }

        let mut app = Application::new();
        app.command("counter", "Count clicks").build(start).unwrap();
        app.button("count").label("+1").build(count).unwrap();
        let dispatcher = app.into_dispatcher(handle(), DispatchSettings::default());

        let first = dispatcher.dispatch(command("counter", "p")).await.unwrap();
        let id = first_custom_id(&first);
        assert!(id.starts_with("count:"));

        let second = dispatcher.dispatch(click(&id, None)).await.unwrap();
        assert_eq!(second.kind, ResponseType::UpdateMessage);
        assert_eq!(content(&second), Some("1"));

        let third = dispatcher
            .dispatch(click(&first_custom_id(&second), None))
            .await
            .unwrap();
        assert_eq!(content(&third), Some("2"));
    }

    #[tokio::test]
    async fn oneshot_components_run_once() {
        let mut app = Application::new();
        app.command("claim", "Claim the prize")
            .build(|app: AppHandle| async move {
                Response::new().row([app.component("prize").unwrap()])
            })
            .unwrap();
        app.button("prize")
            .oneshot(true)
            .build(|_: InvokeContext| async { "claimed" })
            .unwrap();
        let dispatcher = app.into_dispatcher(handle(), DispatchSettings::default());

        let menu = dispatcher.dispatch(command("claim", "p")).await.unwrap();
        let id = first_custom_id(&menu);

        let (a, b) = tokio::join!(
            dispatcher.dispatch(click(&id, None)),
            dispatcher.dispatch(click(&id, None)),
        );
        let contents = [content(a.as_ref().unwrap()), content(b.as_ref().unwrap())];
        assert_eq!(contents.iter().filter(|c| **c == Some("claimed")).count(), 1);
        assert_eq!(
            contents
                .iter()
                .filter(|c| **c == Some("This interaction has expired."))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn parent_deletion_skips_ephemeral_parents() {
        let (deletions, mut receiver) = ParentDeletions::channel(4);
        let handle = handle().with_deletions(deletions);

        let mut app = Application::new();
        app.command("menu", "Open a menu")
            .build(|app: AppHandle| async move {
                Response::new().row([app.component("close").unwrap()])
            })
            .unwrap();
        app.command("secret", "Open a private menu")
            .build(|app: AppHandle| async move {
                Response::new()
                    .ephemeral()
                    .row([app.component("close").unwrap()])
            })
            .unwrap();
        app.button("close")
            .build(|| async { Response::new().content("closed").new_message().delete_parent() })
            .unwrap();
        let dispatcher = app.into_dispatcher(handle, DispatchSettings::default());

        let private = dispatcher.dispatch(command("secret", "hidden")).await.unwrap();
        let flags = MessageFlags::EPHEMERAL.bits();
        let out = dispatcher
            .dispatch(click(&first_custom_id(&private), Some(flags)))
            .await
            .unwrap();
        assert_eq!(content(&out), Some("closed"));

        let public = dispatcher.dispatch(command("menu", "shown")).await.unwrap();
        let reference = first_custom_id(&public);
        dispatcher.dispatch(click(&reference, None)).await.unwrap();

        assert_eq!(receiver.recv().await.as_deref(), Some("shown"));
        let stored: Option<Value> = dispatcher
            .app()
            .contexts()
            .get(split_custom_id(&reference).reference.unwrap())
            .await
            .unwrap();
        assert!(stored.is_none());
    }

    #[tokio::test]
    async fn oneshot_close_consumes_context_and_deletes_parent() {
        let (deletions, mut receiver) = ParentDeletions::channel(4);
        let handle = handle().with_deletions(deletions);

        let mut app = Application::new();
        app.command("poll", "Open a poll")
            .build(|app: AppHandle| async move {
                Response::new()
                    .content("Vote!")
                    .row([app.component("close").unwrap()])
                    .context("votes", 3)
            })
            .unwrap();
        app.button("close")
            .oneshot(true)
            .build(|ctx: InvokeContext| async move {
                let votes: i64 = ctx.get("votes").unwrap().unwrap();
                Response::new()
                    .content(format!("closed with {votes}"))
                    .new_message()
                    .delete_parent()
            })
            .unwrap();
        let dispatcher = app.into_dispatcher(handle, DispatchSettings::default());

        let poll = dispatcher.dispatch(command("poll", "poll-token")).await.unwrap();
        let custom_id = first_custom_id(&poll);
        let reference = split_custom_id(&custom_id).reference.unwrap().to_owned();

        let out = dispatcher.dispatch(click(&custom_id, None)).await.unwrap();
        assert_eq!(content(&out), Some("closed with 3"));
        assert_eq!(receiver.recv().await.as_deref(), Some("poll-token"));

        let stored: Option<Value> = dispatcher.app().contexts().get(&reference).await.unwrap();
        assert!(stored.is_none());

        let again = dispatcher.dispatch(click(&custom_id, None)).await.unwrap();
        assert_eq!(content(&again), Some("This interaction has expired."));
    }

    #[tokio::test]
    async fn unknown_components_and_types() {
        let dispatcher = Application::new().into_dispatcher(handle(), DispatchSettings::default());
        assert!(matches!(
            dispatcher.dispatch(click("missing:abc", None)).await,
            Err(DispatchError::ComponentNotFound(id)) if id == "missing"
        ));

        let modal = serde_json::from_value(json!({
            "id": "1", "application_id": "1", "type": 5, "token": "t"
        }))
        .unwrap();
        assert!(matches!(
            dispatcher.dispatch(modal).await,
            Err(DispatchError::UnsupportedType(5))
        ));
    }
}
