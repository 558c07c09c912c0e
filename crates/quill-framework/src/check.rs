//! Pre-invocation checks.
//!
//! A check receives the interaction and either returns it, possibly
//! enriched, or rejects the invocation with an error. Checks run strictly in
//! registration order, each seeing the interaction returned by the previous
//! one.

use std::borrow::Cow;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use quill_core::{Interaction, Permissions};
use tracing::debug;

use crate::callable::{ErrorHandler, IntoErrorHandler};
use crate::error::{BoxError, UserMissingPermissions};
use crate::pool::BlockingPool;

type CheckResult = Result<Interaction, BoxError>;
type AsyncCheckFn = Arc<dyn Fn(Interaction) -> BoxFuture<'static, CheckResult> + Send + Sync>;
type BlockingCheckFn = Arc<dyn Fn(Interaction) -> CheckResult + Send + Sync>;

#[derive(Clone)]
enum CheckKind {
    Async(AsyncCheckFn),
    Blocking(BlockingCheckFn),
}

/// A gate in front of a command handler.
#[derive(Clone)]
pub struct Check {
    name: Cow<'static, str>,
    kind: CheckKind,
    on_error: Option<ErrorHandler>,
}

impl Check {
    /// An async check.
    ///
    /// ```rust,ignore
    /// let guild_only = Check::new(|interaction: Interaction| async move {
    ///     match interaction.guild_id {
    ///         Some(_) => Ok(interaction),
    ///         None => Err(CheckError::new("This command only works in servers.")),
    ///     }
    /// });
    /// ```
    pub fn new<F, Fut, E>(f: F) -> Self
    where
        F: Fn(Interaction) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Interaction, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: Cow::Borrowed("check"),
            kind: CheckKind::Async(Arc::new(move |interaction| {
                let fut = f(interaction);
                Box::pin(async move { fut.await.map_err(Into::into) })
            })),
            on_error: None,
        }
    }

    /// A synchronous check, run on the blocking pool.
    pub fn blocking<F, E>(f: F) -> Self
    where
        F: Fn(Interaction) -> Result<Interaction, E> + Send + Sync + 'static,
        E: Into<BoxError>,
    {
        Self {
            name: Cow::Borrowed("check"),
            kind: CheckKind::Blocking(Arc::new(move |interaction| {
                f(interaction).map_err(Into::into)
            })),
            on_error: None,
        }
    }

    /// Names the check in logs.
    pub fn named(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Handles rejections of this check before the command's error handler.
    pub fn on_error<M>(mut self, handler: impl IntoErrorHandler<M>) -> Self {
        self.on_error = Some(handler.into_error_handler());
        self
    }

    /// Name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, interaction: Interaction, pool: &BlockingPool) -> CheckResult {
        match &self.kind {
            CheckKind::Async(f) => f(interaction).await,
            CheckKind::Blocking(f) => {
                let f = f.clone();
                pool.run(move || f(interaction)).await
            }
        }
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("has_on_error", &self.on_error.is_some())
            .finish()
    }
}

/// A rejected invocation.
#[derive(Debug)]
pub struct CheckRejection {
    /// Name of the rejecting check.
    pub check: String,
    /// Why it rejected.
    pub error: BoxError,
    /// The check's own error handler.
    pub on_error: Option<ErrorHandler>,
}

/// Checks of one command, in registration order.
#[derive(Debug, Clone, Default)]
pub struct CheckPipeline {
    checks: Vec<Check>,
}

impl CheckPipeline {
    /// Appends a check.
    pub fn push(&mut self, check: Check) {
        self.checks.push(check);
    }

    /// Number of checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether there are no checks.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Runs every check in order. Stops at the first rejection.
    pub async fn run(
        &self,
        mut interaction: Interaction,
        pool: &BlockingPool,
    ) -> Result<Interaction, CheckRejection> {
        for check in &self.checks {
            match check.run(interaction, pool).await {
                Ok(next) => interaction = next,
                Err(error) => {
                    debug!(check = %check.name, error = %error, "Check rejected invocation");
                    return Err(CheckRejection {
                        check: check.name.to_string(),
                        error,
                        on_error: check.on_error.clone(),
                    });
                }
            }
        }
        Ok(interaction)
    }
}

/// Rejects invokers missing any of `required`.
///
/// Invocations outside a guild carry no member permissions and pass.
/// Administrators always pass.
pub fn require_user_permissions(required: Permissions) -> Check {
    Check::new(move |interaction: Interaction| async move {
        let Some(granted) = interaction.member_permissions() else {
            return Ok(interaction);
        };
        if granted.contains(Permissions::ADMINISTRATOR) {
            return Ok(interaction);
        }
        let missing = required.difference(granted);
        if missing.is_empty() {
            Ok(interaction)
        } else {
            Err(UserMissingPermissions { missing })
        }
    })
    .named("require_user_permissions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn interaction(permissions: Option<&str>) -> Interaction {
        let mut raw = json!({
            "id": "1", "application_id": "1", "type": 2, "token": "t",
            "data": { "name": "purge" }
        });
        if let Some(perms) = permissions {
            raw["member"] = json!({ "roles": [], "permissions": perms,
                                    "user": { "id": "9", "username": "ferris" } });
        }
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn checks_run_in_order_and_see_previous_output() {
        let mut pipeline = CheckPipeline::default();
        pipeline.push(Check::new(|mut i: Interaction| async move {
            i.locale = Some("en-GB".into());
            Ok::<_, CheckError>(i)
        }));
        pipeline.push(Check::blocking(|i: Interaction| {
            if i.locale.as_deref() == Some("en-GB") {
                Ok(i)
            } else {
                Err(CheckError::new("locale not set"))
            }
        }));

        let out = pipeline
            .run(interaction(None), &BlockingPool::default())
            .await
            .unwrap();
        assert_eq!(out.locale.as_deref(), Some("en-GB"));
    }

    #[tokio::test]
    async fn first_rejection_stops_the_pipeline() {
        let ran = Arc::new(AtomicUsize::new(0));
        let counter = ran.clone();

        let mut pipeline = CheckPipeline::default();
        pipeline.push(
            Check::new(|_: Interaction| async { Err::<Interaction, _>(CheckError::new("no")) })
                .named("deny"),
        );
        pipeline.push(Check::new(move |i: Interaction| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok::<_, CheckError>(i) }
        }));

        let rejection = pipeline
            .run(interaction(None), &BlockingPool::default())
            .await
            .unwrap_err();
        assert_eq!(rejection.check, "deny");
        assert_eq!(rejection.error.to_string(), "no");
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn permission_check() {
        let check = require_user_permissions(Permissions::MANAGE_MESSAGES);
        let pool = BlockingPool::default();

        // MANAGE_MESSAGES
        assert!(check.run(interaction(Some("8192")), &pool).await.is_ok());
        // ADMINISTRATOR
        assert!(check.run(interaction(Some("8")), &pool).await.is_ok());
        // outside a guild
        assert!(check.run(interaction(None), &pool).await.is_ok());

        let err = check
            .run(interaction(Some("2048")), &pool)
            .await
            .unwrap_err();
        let missing = err.downcast_ref::<UserMissingPermissions>().unwrap();
        assert_eq!(missing.missing, Permissions::MANAGE_MESSAGES);
    }
}
