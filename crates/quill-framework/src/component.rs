//! Button and select-menu registry.
//!
//! Components are registered once under a fixed custom id. Every time one is
//! placed in a response it receives a fresh invocation reference, appended
//! to the custom id, under which the response's context is stored. A click
//! recovers that context before the handler runs.
//!
//! ```rust,ignore
//! let increment = app
//!     .button("counter-inc")
//!     .label("+1")
//!     .style(ButtonStyle::Success)
//!     .build(increment)?;
//!
//! let confirm = app
//!     .button("purge-confirm")
//!     .label("Delete everything")
//!     .style(ButtonStyle::Danger)
//!     .oneshot(true)
//!     .build(confirm_purge)?;
//! ```

use std::collections::HashMap;

use quill_core::{
    ButtonStyle, ComponentData, ComponentType, Interaction, ModelError, PartialEmoji,
    SelectOption, custom_id,
};
use tracing::debug;

use crate::app::AppHandle;
use crate::callable::{Callable, ErrorHandler, IntoCallable, IntoErrorHandler};
use crate::context::InvokeContext;
use crate::error::{InteractionExpired, RegistryError};
use crate::extractor::{Invocation, ParamSpec};
use crate::handler::HandlerResult;
use crate::pool::BlockingPool;
use crate::response::ComponentRef;

const MAX_SELECT_OPTIONS: usize = 25;

// ============================================================================
// Component
// ============================================================================

/// A registered button or select menu.
#[derive(Debug)]
pub struct Component {
    custom_id: String,
    component: ComponentRef,
    oneshot: bool,
    callable: Callable,
    on_error: Option<ErrorHandler>,
}

/// What a component invocation produced, with what the dispatcher needs to
/// finish it.
#[derive(Debug)]
pub struct ComponentOutcome {
    /// Handler reply, after the component's error handler.
    pub reply: HandlerResult,
    /// Interaction that produced the message carrying the component.
    pub parent: Option<Interaction>,
    /// Whether that message is ephemeral.
    pub ephemeral: bool,
    /// Reference carried by the clicked component.
    pub reference_id: Option<String>,
}

impl Component {
    /// Registered custom id.
    pub fn custom_id(&self) -> &str {
        &self.custom_id
    }

    /// Whether the context is consumed on the first click.
    pub fn is_oneshot(&self) -> bool {
        self.oneshot
    }

    /// A reference for placing the component in responses.
    pub fn component_ref(&self) -> ComponentRef {
        self.component.clone()
    }

    /// Loads the invocation context and runs the handler.
    pub async fn invoke(
        &self,
        interaction: Interaction,
        reference_id: Option<&str>,
        app: &AppHandle,
        pool: &BlockingPool,
    ) -> ComponentOutcome {
        let loaded = match reference_id {
            Some(reference) => {
                InvokeContext::load(&app.contexts(), reference, self.oneshot).await
            }
            None => Ok(None),
        };

        let (context, reply) = match loaded {
            Ok(context) => (context, None),
            Err(error) => (None, Some(Err(error.into()))),
        };

        let parent = context.as_ref().and_then(|c| c.parent().cloned());
        let ephemeral = match &context {
            Some(context) => context.is_ephemeral(),
            None => interaction
                .message
                .as_ref()
                .is_some_and(|m| m.is_ephemeral()),
        };

        let expired = context.is_none()
            && (self.callable.context_param() == Some(true)
                || (self.oneshot && reference_id.is_some()));

        let reply = match reply {
            Some(failed) => failed,
            None if expired => {
                debug!(
                    component = %self.custom_id,
                    reference_id = reference_id.unwrap_or_default(),
                    "Invocation context is gone"
                );
                Err(InteractionExpired {
                    reference_id: reference_id.map(str::to_owned),
                }
                .into())
            }
            None => {
                let single = self.component.data().kind == ComponentType::SelectMenu
                    && self.component.data().selects_single_value();
                let inv = Invocation::new(interaction.clone(), app.clone())
                    .with_context(context)
                    .with_single_select(single);
                self.callable.invoke(inv, pool).await
            }
        };

        let reply = match (reply, &self.on_error) {
            (Err(error), Some(handler)) => handler.handle(interaction, error, pool).await,
            (reply, _) => reply,
        };

        ComponentOutcome {
            reply,
            parent,
            ephemeral,
            reference_id: reference_id.map(str::to_owned),
        }
    }
}

fn validate_component_params(
    custom_id: &str,
    kind: ComponentType,
    params: &[ParamSpec],
) -> Result<(), RegistryError> {
    let mut contexts = 0;
    for param in params {
        match param {
            ParamSpec::Interaction | ParamSpec::App | ParamSpec::Custom(_) => {}
            ParamSpec::Context { .. } => {
                contexts += 1;
                if contexts > 1 {
                    return Err(RegistryError::MultipleContextParams {
                        name: custom_id.to_owned(),
                    });
                }
            }
            ParamSpec::Selected if kind == ComponentType::SelectMenu => {}
            other => {
                return Err(RegistryError::UnsupportedParam {
                    name: custom_id.to_owned(),
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

/// All components of an application, by custom id.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    components: HashMap<String, Component>,
}

impl ComponentRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts registering a button.
    pub fn button(&mut self, custom_id: impl Into<String>) -> ButtonBuilder<'_> {
        let mut data = ComponentData::button();
        data.style = Some(ButtonStyle::Primary);
        ButtonBuilder {
            inner: Builder::new(self, custom_id.into(), data),
        }
    }

    /// Starts registering a select menu.
    pub fn select(&mut self, custom_id: impl Into<String>) -> SelectBuilder<'_> {
        SelectBuilder {
            inner: Builder::new(self, custom_id.into(), ComponentData::select_menu()),
        }
    }

    /// Finds a component by its registered custom id.
    pub fn get(&self, custom_id: &str) -> Option<&Component> {
        self.components.get(custom_id)
    }

    /// Every registered component.
    pub fn iter(&self) -> impl Iterator<Item = &Component> {
        self.components.values()
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Whether no component is registered.
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// A link button. Links open a URL and never reach a handler.
pub fn link(label: impl Into<String>, url: impl Into<String>) -> ComponentRef {
    let mut data = ComponentData::button();
    data.style = Some(ButtonStyle::Link);
    data.label = Some(label.into());
    data.url = Some(url.into());
    ComponentRef::unregistered(data)
}

struct Builder<'r> {
    registry: &'r mut ComponentRegistry,
    custom_id: String,
    data: ComponentData,
    oneshot: bool,
    on_error: Option<ErrorHandler>,
}

impl<'r> Builder<'r> {
    fn new(registry: &'r mut ComponentRegistry, custom_id: String, data: ComponentData) -> Self {
        Self {
            registry,
            custom_id,
            data,
            oneshot: false,
            on_error: None,
        }
    }

    fn build(self, callable: Callable) -> Result<ComponentRef, RegistryError> {
        custom_id::validate_base_id(&self.custom_id)?;
        if self.registry.components.contains_key(&self.custom_id) {
            return Err(RegistryError::Duplicate {
                kind: "component",
                name: self.custom_id,
                scope: String::new(),
            });
        }
        validate_component_params(&self.custom_id, self.data.kind, callable.params())?;

        let component = ComponentRef::registered(&self.custom_id, self.data);
        self.registry.components.insert(
            self.custom_id.clone(),
            Component {
                custom_id: self.custom_id,
                component: component.clone(),
                oneshot: self.oneshot,
                callable,
                on_error: self.on_error,
            },
        );
        Ok(component)
    }
}

/// Builder returned by [`ComponentRegistry::button`].
#[must_use = "components are only registered by `build`"]
pub struct ButtonBuilder<'r> {
    inner: Builder<'r>,
}

impl ButtonBuilder<'_> {
    /// Text on the button.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.inner.data.label = Some(label.into());
        self
    }

    /// Button colour. Use [`link`] for link buttons.
    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.inner.data.style = Some(style);
        self
    }

    /// Emoji shown before the label.
    pub fn emoji(mut self, emoji: PartialEmoji) -> Self {
        self.inner.data.emoji = Some(emoji);
        self
    }

    /// Whether the button starts disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.inner.data.disabled = disabled;
        self
    }

    /// Consumes the context on the first click; later clicks are expired.
    pub fn oneshot(mut self, oneshot: bool) -> Self {
        self.inner.oneshot = oneshot;
        self
    }

    /// Handles errors of this button, including expiry.
    pub fn on_error<M>(mut self, handler: impl IntoErrorHandler<M>) -> Self {
        self.inner.on_error = Some(handler.into_error_handler());
        self
    }

    /// Validates and registers the button.
    pub fn build<M>(self, handler: impl IntoCallable<M>) -> Result<ComponentRef, RegistryError> {
        if self.inner.data.style == Some(ButtonStyle::Link) {
            return Err(ModelError::invalid_custom_id(
                self.inner.custom_id,
                "link buttons have no handler, use `link` instead",
            )
            .into());
        }
        self.inner.build(handler.into_callable())
    }
}

/// Builder returned by [`ComponentRegistry::select`].
#[must_use = "components are only registered by `build`"]
pub struct SelectBuilder<'r> {
    inner: Builder<'r>,
}

impl SelectBuilder<'_> {
    /// Appends an option.
    pub fn option(mut self, option: SelectOption) -> Self {
        self.inner.data.options.push(option);
        self
    }

    /// Appends several options.
    pub fn options(mut self, options: impl IntoIterator<Item = SelectOption>) -> Self {
        self.inner.data.options.extend(options);
        self
    }

    /// Text shown when nothing is selected.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.inner.data.placeholder = Some(placeholder.into());
        self
    }

    /// Fewest values the user must pick.
    pub fn min_values(mut self, min: u8) -> Self {
        self.inner.data.min_values = Some(min);
        self
    }

    /// Most values the user may pick.
    pub fn max_values(mut self, max: u8) -> Self {
        self.inner.data.max_values = Some(max);
        self
    }

    /// Whether the menu starts disabled.
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.inner.data.disabled = disabled;
        self
    }

    /// Consumes the context on the first choice; later choices are expired.
    pub fn oneshot(mut self, oneshot: bool) -> Self {
        self.inner.oneshot = oneshot;
        self
    }

    /// Handles errors of this menu, including expiry.
    pub fn on_error<M>(mut self, handler: impl IntoErrorHandler<M>) -> Self {
        self.inner.on_error = Some(handler.into_error_handler());
        self
    }

    /// Validates and registers the menu.
    pub fn build<M>(self, handler: impl IntoCallable<M>) -> Result<ComponentRef, RegistryError> {
        let data = &self.inner.data;
        let count = data.options.len();
        let min = data.min_values.unwrap_or(1) as usize;
        let max = data.max_values.unwrap_or(1) as usize;
        if count == 0 || count > MAX_SELECT_OPTIONS || min > max || max > count {
            return Err(ModelError::invalid_custom_id(
                self.inner.custom_id,
                format!("select menus need 1-25 options and min <= max <= options (got {count}, {min}..{max})"),
            )
            .into());
        }
        self.inner.build(handler.into_callable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BoxError;
    use crate::extractor::Selected;
    use crate::handler::Reply;
    use crate::response::Response;
    use quill_core::Snowflake;
    use quill_state::{COMMAND_STATE, ManagedState, MemoryBackend};
    use serde_json::{Map, Value, json};

    fn app() -> AppHandle {
        AppHandle::new(Snowflake::new(1), ManagedState::new(MemoryBackend::new()))
    }

    fn click(custom_id: &str) -> Interaction {
        serde_json::from_value(json!({
            "id": "5", "application_id": "1", "type": 3, "token": "click",
            "data": { "custom_id": custom_id, "component_type": 2 }
        }))
        .unwrap()
    }

    async fn store(app: &AppHandle, reference: &str, values: Value) {
        let Value::Object(values) = values else {
            panic!("expected an object")
        };
        let entry = InvokeContext::encode(&values, None, false).unwrap();
        app.contexts().set(reference, &entry, None).await.unwrap();
    }

    async fn show(ctx: InvokeContext) -> String {
        format!("count={}", ctx.get::<i64>("count").unwrap().unwrap_or(0))
    }

    async fn anything() {}

    #[tokio::test]
    async fn context_is_loaded_by_reference() {
        let app = app();
        let mut registry = ComponentRegistry::new();
        registry.button("show").label("Show").build(show).unwrap();
        store(&app, "r1", json!({ "count": 4 })).await;

        let outcome = registry
            .get("show")
            .unwrap()
            .invoke(click("show:r1"), Some("r1"), &app, &BlockingPool::default())
            .await;
        let Ok(Reply::Response(response)) = outcome.reply else {
            panic!("expected a response");
        };
        assert_eq!(response.content_str(), Some("count=4"));
        assert_eq!(outcome.reference_id.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn missing_required_context_is_expired() {
        let app = app();
        let mut registry = ComponentRegistry::new();
        registry.button("show").build(show).unwrap();

        let outcome = registry
            .get("show")
            .unwrap()
            .invoke(click("show:gone"), Some("gone"), &app, &BlockingPool::default())
            .await;
        let err = outcome.reply.unwrap_err();
        assert!(err.downcast_ref::<InteractionExpired>().is_some());
    }

    #[tokio::test]
    async fn component_error_handler_claims_expiry() {
        let app = app();
        let mut registry = ComponentRegistry::new();
        registry
            .button("show")
            .on_error(|_: Interaction, _: BoxError| async { "too late" })
            .build(show)
            .unwrap();

        let outcome = registry
            .get("show")
            .unwrap()
            .invoke(click("show:gone"), Some("gone"), &app, &BlockingPool::default())
            .await;
        assert!(matches!(outcome.reply, Ok(Reply::Response(r)) if r.content_str() == Some("too late")));
    }

    #[tokio::test]
    async fn oneshot_consumes_the_context() {
        let app = app();
        let mut registry = ComponentRegistry::new();
        registry.button("once").oneshot(true).build(anything).unwrap();
        store(&app, "r", json!({})).await;

        let component = registry.get("once").unwrap();
        let pool = BlockingPool::default();
        let first = component.invoke(click("once:r"), Some("r"), &app, &pool).await;
        let second = component.invoke(click("once:r"), Some("r"), &app, &pool).await;

        assert!(first.reply.is_ok());
        assert!(second.reply.unwrap_err().is::<InteractionExpired>());
        let left: Option<Map<String, Value>> =
            app.state().namespace(COMMAND_STATE).get("r").await.unwrap();
        assert!(left.is_none());
    }

    #[tokio::test]
    async fn ephemeral_falls_back_to_message_flags() {
        let app = app();
        let mut registry = ComponentRegistry::new();
        registry.button("noop").build(anything).unwrap();

        let mut interaction = click("noop");
        interaction.message = Some(
            serde_json::from_value(json!({
                "id": "3", "channel_id": "4", "content": "", "flags": 64
            }))
            .unwrap(),
        );
        let outcome = registry
            .get("noop")
            .unwrap()
            .invoke(interaction, None, &app, &BlockingPool::default())
            .await;
        assert!(outcome.ephemeral);
        assert!(outcome.parent.is_none());
    }

    #[test]
    fn registration_rules() {
        async fn pick(selected: Selected) -> String {
            selected.first().unwrap_or_default().to_owned()
        }

        let mut registry = ComponentRegistry::new();
        assert!(matches!(
            registry.button("a:b").build(anything),
            Err(RegistryError::InvalidName(_))
        ));
        assert!(matches!(
            registry.button("pick").build(pick),
            Err(RegistryError::UnsupportedParam { .. })
        ));
        assert!(matches!(
            registry.select("pick").build(pick),
            Err(RegistryError::InvalidName(_))
        ));
        registry
            .select("pick")
            .option(SelectOption::new("Red", "red"))
            .build(pick)
            .unwrap();
        assert!(matches!(
            registry.button("pick").build(anything),
            Err(RegistryError::Duplicate { .. })
        ));

        let docs = link("Docs", "https://docs.rs");
        assert!(docs.is_link());
        assert!(docs.base_id().is_none());
        let _ = Response::new().row([docs]);
    }
}
