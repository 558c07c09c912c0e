//! Counter Bot Example
//!
//! A small Quill application showing the main registration styles:
//!
//! | Command    | Shows                                                   |
//! |------------|---------------------------------------------------------|
//! | `/echo`    | derived options and autocomplete                        |
//! | `/counter` | buttons carrying state through `InvokeContext`          |
//! | `/flavor`  | a select menu                                           |
//! | `/paint`   | enumerated option choices                               |
//! | `/purge`   | a permission check in front of a blocking handler       |
//!
//! # Usage
//!
//! ```bash
//! QUILL_APPLICATION__ID=... \
//! QUILL_APPLICATION__PUBLIC_KEY=... \
//! QUILL_APPLICATION__TOKEN=... \
//! cargo run --package counter-bot -- --profile development
//! ```
//!
//! Point the application's interactions endpoint URL at the server
//! (default `http://0.0.0.0:8080/`).

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use quill::framework::BoxError;
use quill::prelude::*;
use thiserror::Error;
use tracing::info;

// ============================================================================
// Echo
// ============================================================================

#[derive(CommandOptions)]
#[quill(crate = "quill::framework")]
struct EchoArgs {
    /// What to say
    text: String,
    #[option(description = "How many times to say it", default = 1)]
    times: i64,
}

async fn echo(Options(args): Options<EchoArgs>) -> String {
    let times = args.times.clamp(1, 5) as usize;
    vec![args.text; times].join(" ")
}

async fn suggest_text(focused: Focused) -> Vec<CompletedOption> {
    ["hello", "hi there", "good morning", "good night"]
        .into_iter()
        .filter(|s| s.starts_with(&focused.value))
        .map(|s| CompletedOption::new(s, s))
        .collect()
}

// ============================================================================
// Counter
// ============================================================================

const MINUS: &str = "counter.minus";
const PLUS: &str = "counter.plus";
const DONE: &str = "counter.done";

#[derive(Debug, Error)]
#[error("The counter cannot go below zero.")]
struct BelowZero;

fn counter_view(app: &AppHandle, count: i64) -> Result<Response, BoxError> {
    let button = |id: &str| {
        app.component(id)
            .ok_or_else(|| format!("component {id} is not registered"))
    };
    Ok(Response::new()
        .content(format!("Count: **{count}**"))
        .row([button(MINUS)?, button(PLUS)?, button(DONE)?])
        .context("count", count))
}

fn current(ctx: &InvokeContext) -> Result<i64, BoxError> {
    Ok(ctx.get::<i64>("count")?.unwrap_or(0))
}

async fn start_counter(app: AppHandle) -> Result<Response, BoxError> {
    counter_view(&app, 0)
}

async fn increment(app: AppHandle, ctx: InvokeContext) -> Result<Response, BoxError> {
    counter_view(&app, current(&ctx)? + 1)
}

async fn decrement(app: AppHandle, ctx: InvokeContext) -> Result<Response, BoxError> {
    match current(&ctx)? {
        0 => Err(BelowZero.into()),
        n => counter_view(&app, n - 1),
    }
}

async fn finish(ctx: InvokeContext) -> Result<Response, BoxError> {
    let count = current(&ctx)?;
    info!(count, "Counter finished");
    Ok(Response::new()
        .content(format!("Final count: **{count}**"))
        .new_message()
        .delete_parent())
}

async fn below_zero(_: Interaction, error: BoxError) -> Response {
    Response::new().content(error.to_string()).ephemeral()
}

// ============================================================================
// Flavor
// ============================================================================

const FLAVOR: &str = "flavor.pick";

async fn choose_flavor(app: AppHandle) -> Result<Response, BoxError> {
    let menu = app.component(FLAVOR).ok_or("flavor menu is not registered")?;
    Ok(Response::new()
        .content("What's your favorite flavor?")
        .row([menu]))
}

async fn flavor_picked(selected: Selected) -> String {
    match selected.first() {
        Some(flavor) => format!("Excellent choice: {flavor}."),
        None => "Nothing picked.".to_string(),
    }
}

// ============================================================================
// Paint
// ============================================================================

#[derive(Debug, OptionChoice)]
#[quill(crate = "quill::framework")]
enum Color {
    Red,
    Green,
    #[choice(name = "Sky blue")]
    SkyBlue,
}

#[derive(CommandOptions)]
#[quill(crate = "quill::framework")]
struct PaintArgs {
    /// Paint color
    color: Color,
}

async fn paint(Options(args): Options<PaintArgs>) -> String {
    format!("The fence is now {:?}.", args.color)
}

// ============================================================================
// Purge
// ============================================================================

fn purge(interaction: Interaction) -> Response {
    let channel = interaction
        .channel_id
        .map_or_else(|| "this channel".to_string(), |id| format!("<#{id}>"));
    Response::new()
        .content(format!("Pretending to purge {channel}."))
        .ephemeral()
}

// ============================================================================
// Application
// ============================================================================

fn build_app() -> Result<Application> {
    let mut app = Application::new();

    app.command("echo", "Repeat after me")
        .build(echo)?
        .autocomplete_for("text", suggest_text)?;

    app.command("counter", "Start a click counter")
        .build(start_counter)?;
    app.button(MINUS)
        .label("-1")
        .style(ButtonStyle::Secondary)
        .build(decrement)?;
    app.button(PLUS)
        .label("+1")
        .style(ButtonStyle::Primary)
        .build(increment)?;
    app.button(DONE)
        .label("Done")
        .style(ButtonStyle::Success)
        .oneshot(true)
        .build(finish)?;
    app.on_error::<BelowZero, _>(below_zero);

    app.command("flavor", "Pick a flavor").build(choose_flavor)?;
    app.select(FLAVOR)
        .placeholder("Flavors")
        .options([
            SelectOption::new("Vanilla", "vanilla"),
            SelectOption::new("Chocolate", "chocolate").description("The classic"),
            SelectOption::new("Strawberry", "strawberry"),
        ])
        .build(flavor_picked)?;

    app.command("paint", "Paint the fence").build(paint)?;

    app.command("purge", "Clear this channel")
        .check(require_user_permissions(Permissions::MANAGE_MESSAGES))
        .build(blocking(purge))?;

    Ok(app)
}

/// Counter bot served over signed webhooks.
#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file, instead of searching for quill.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Configuration profile
    #[arg(short, long)]
    profile: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let app = build_app()?;

    let mut builder = QuillRuntime::builder();
    if let Some(path) = args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = args.profile {
        builder = builder.profile(profile);
    }

    builder.build(app)?.run().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill::core::{ResponsePayload, ResponseType, Snowflake};
    use quill::framework::{DispatchSettings, Dispatcher};
    use quill::state::MemoryBackend;
    use serde_json::{Value, json};

    fn dispatcher() -> Dispatcher {
        let handle = AppHandle::new(Snowflake::new(1), ManagedState::new(MemoryBackend::new()));
        build_app()
            .unwrap()
            .into_dispatcher(handle, DispatchSettings::default())
    }

    fn interaction(raw: Value) -> Interaction {
        serde_json::from_value(raw).unwrap()
    }

    fn command(name: &str, options: Value) -> Interaction {
        interaction(json!({
            "id": "10", "application_id": "1", "type": 2, "token": "cmd",
            "data": { "name": name, "options": options }
        }))
    }

    fn click(custom_id: &str) -> Interaction {
        interaction(json!({
            "id": "11", "application_id": "1", "type": 3, "token": "click",
            "data": { "custom_id": custom_id, "component_type": 2 },
            "message": { "id": "20", "channel_id": "30" }
        }))
    }

    fn content(payload: &ResponsePayload) -> Option<&str> {
        payload.data.as_ref()?.content.as_deref()
    }

    fn button(payload: &ResponsePayload, base: &str) -> String {
        let rows = payload.data.as_ref().unwrap().components.as_ref().unwrap();
        rows.iter()
            .flat_map(|row| &row.components)
            .filter_map(|c| c.custom_id.clone())
            .find(|id| id.starts_with(base))
            .unwrap()
    }

    #[tokio::test]
    async fn echo_repeats() {
        let payload = dispatcher()
            .dispatch(command(
                "echo",
                json!([
                    { "name": "text", "type": 3, "value": "hi" },
                    { "name": "times", "type": 4, "value": 2 }
                ]),
            ))
            .await
            .unwrap();
        assert_eq!(content(&payload), Some("hi hi"));
    }

    #[tokio::test]
    async fn counter_counts_and_refuses_negatives() {
        let dispatcher = dispatcher();
        let start = dispatcher.dispatch(command("counter", json!([]))).await.unwrap();
        assert_eq!(content(&start), Some("Count: **0**"));

        let below = dispatcher
            .dispatch(click(&button(&start, MINUS)))
            .await
            .unwrap();
        assert_eq!(content(&below), Some("The counter cannot go below zero."));

        let one = dispatcher
            .dispatch(click(&button(&start, PLUS)))
            .await
            .unwrap();
        assert_eq!(one.kind, ResponseType::UpdateMessage);
        assert_eq!(content(&one), Some("Count: **1**"));

        let done = dispatcher
            .dispatch(click(&button(&one, DONE)))
            .await
            .unwrap();
        assert_eq!(content(&done), Some("Final count: **1**"));
    }

    #[tokio::test]
    async fn purge_requires_permission() {
        let mut purge = command("purge", json!([]));
        purge.member = serde_json::from_value(json!({
            "roles": [], "permissions": "0",
            "user": { "id": "9", "username": "ferris" }
        }))
        .unwrap();
        let payload = dispatcher().dispatch(purge).await.unwrap();
        assert!(content(&payload).unwrap().contains("Manage Messages"));
    }
}
