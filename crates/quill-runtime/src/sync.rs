//! Publishing registered commands to the platform.
//!
//! Only commands built with `register(true)` (the default) are published.
//! Global commands either replace the whole global set in one bulk request
//! after stale ones were deleted, or are upserted one by one when stale
//! removal is off. Guild-scoped commands are upserted per guild.

use std::collections::HashSet;

use quill_core::{CommandScope, RestApi, RestResult};
use quill_framework::CommandRegistry;
use tracing::{debug, info};

use crate::config::CommandsConfig;

/// What a sync changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Stale global commands deleted.
    pub removed: usize,
    /// Global commands published.
    pub global: usize,
    /// Guild-scoped registrations published.
    pub guild: usize,
}

/// Publishes every registered command.
pub async fn sync_commands(
    rest: &dyn RestApi,
    commands: &CommandRegistry,
    config: &CommandsConfig,
) -> RestResult<SyncReport> {
    let mut report = SyncReport::default();
    let global = commands.global_schemas();

    if config.remove_stale_global {
        let keep: HashSet<&str> = global.iter().map(|s| s.name.as_str()).collect();
        for existing in rest.get_global_commands().await? {
            if keep.contains(existing.name.as_str()) {
                continue;
            }
            info!(command = %existing.name, id = %existing.id, "Removing stale global command");
            rest.delete_global_command(existing.id).await?;
            report.removed += 1;
        }
        if !global.is_empty() {
            report.global = rest.register_commands_bulk(&global).await?.len();
        }
    } else {
        for schema in &global {
            debug!(command = %schema.name, "Registering global command");
            rest.register_command(CommandScope::Global, schema).await?;
            report.global += 1;
        }
    }

    let mut by_guild: Vec<_> = commands.guild_schemas().into_iter().collect();
    by_guild.sort_by_key(|(guild, _)| *guild);
    for (guild_id, schemas) in by_guild {
        for schema in &schemas {
            debug!(command = %schema.name, guild_id = %guild_id, "Registering guild command");
            rest.register_command(CommandScope::Guild(guild_id), schema)
                .await?;
            report.guild += 1;
        }
    }

    info!(
        removed = report.removed,
        global = report.global,
        guild = report.guild,
        "Commands synced"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use quill_core::{CommandSchema, CommandType, RegisteredCommand, RestError, Snowflake};
    use quill_framework::Application;

    #[derive(Default)]
    struct FakeRest {
        existing: Vec<RegisteredCommand>,
        calls: Mutex<Vec<String>>,
    }

    fn registered(id: u64, name: &str) -> RegisteredCommand {
        RegisteredCommand {
            id: Snowflake::new(id),
            application_id: Snowflake::new(1),
            name: name.into(),
            description: String::new(),
            kind: CommandType::ChatInput,
            guild_id: None,
        }
    }

    #[async_trait]
    impl RestApi for FakeRest {
        async fn register_command(
            &self,
            scope: CommandScope,
            schema: &CommandSchema,
        ) -> RestResult<RegisteredCommand> {
            self.calls
                .lock()
                .push(format!("register {scope:?} {}", schema.name));
            Ok(registered(99, &schema.name))
        }

        async fn register_commands_bulk(
            &self,
            schemas: &[CommandSchema],
        ) -> RestResult<Vec<RegisteredCommand>> {
            let names: Vec<_> = schemas.iter().map(|s| s.name.as_str()).collect();
            self.calls.lock().push(format!("bulk {}", names.join(",")));
            Ok(schemas.iter().map(|s| registered(99, &s.name)).collect())
        }

        async fn get_global_commands(&self) -> RestResult<Vec<RegisteredCommand>> {
            self.calls.lock().push("list".into());
            Ok(self.existing.clone())
        }

        async fn delete_global_command(&self, command_id: Snowflake) -> RestResult<()> {
            self.calls.lock().push(format!("delete {command_id}"));
            Ok(())
        }

        async fn delete_interaction_message(&self, _token: &str) -> RestResult<()> {
            Err(RestError::NotFound("unused".into()))
        }
    }

    fn app() -> Application {
        let mut app = Application::new();
        app.command("echo", "Say hi").build(|| async { "hi" }).unwrap();
        app.command("secret", "Not published")
            .register(false)
            .build(|| async { "shh" })
            .unwrap();
        app.command("local", "Guild only")
            .guild(Snowflake::new(500))
            .build(|| async { "here" })
            .unwrap();
        app
    }

    #[tokio::test]
    async fn removes_stale_then_bulk_registers() {
        let rest = FakeRest {
            existing: vec![registered(10, "echo"), registered(11, "old")],
            ..Default::default()
        };
        let app = app();
        let report = sync_commands(&rest, app.commands(), &CommandsConfig::default())
            .await
            .unwrap();

        assert_eq!(
            report,
            SyncReport {
                removed: 1,
                global: 1,
                guild: 1
            }
        );
        assert_eq!(
            *rest.calls.lock(),
            [
                "list",
                "delete 11",
                "bulk echo",
                "register Guild(Snowflake(500)) local",
            ]
        );
    }

    #[tokio::test]
    async fn upserts_without_stale_removal() {
        let rest = FakeRest::default();
        let app = app();
        let config = CommandsConfig {
            remove_stale_global: false,
            ..Default::default()
        };
        sync_commands(&rest, app.commands(), &config).await.unwrap();

        let calls = rest.calls.lock();
        assert_eq!(calls[0], "register Global echo");
        assert!(!calls.iter().any(|c| c.contains("secret") || c == "list"));
    }
}
