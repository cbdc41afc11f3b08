//! # Command Routing
//!
//! Maps command kinds to handlers so a state's `process_command` is one
//! dispatch call instead of a hand-written match.

use std::collections::HashMap;
use std::fmt;

use serde::de::DeserializeOwned;
use tickwire_core::World;

use crate::error::CommandError;
use crate::protocol::Command;

type Handler<S> = Box<dyn Fn(&mut S, &mut World, &Command) -> Result<(), CommandError> + Send + Sync>;

/// Kind -> handler table for a state of type `S`.
///
/// Unmapped kinds yield [`CommandError::UnknownCommand`].
///
/// # Example
///
/// ```rust
/// use serde::Deserialize;
/// use tickwire_core::World;
/// use tickwire_networking::protocol::Command;
/// use tickwire_networking::server::CommandRouter;
///
/// #[derive(Default)]
/// struct Scores { total: i64 }
///
/// #[derive(Deserialize)]
/// struct Add { amount: i64 }
///
/// let router = CommandRouter::<Scores>::new()
///     .on("reset", |scores, _world, _command| {
///         scores.total = 0;
///         Ok(())
///     })
///     .on_payload("add", |scores, _world, add: Add| {
///         scores.total += add.amount;
///         Ok(())
///     });
///
/// let mut scores = Scores::default();
/// let mut world = World::new();
/// let add = Command::new("add", serde_json::json!({ "amount": 5 }));
/// router.dispatch(&mut scores, &mut world, &add).unwrap();
/// assert_eq!(scores.total, 5);
/// assert!(router.dispatch(&mut scores, &mut world, &Command::empty("jump")).is_err());
/// ```
pub struct CommandRouter<S> {
    handlers: HashMap<String, Handler<S>>,
}

impl<S: 'static> CommandRouter<S> {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Routes `kind` to `handler`, replacing any previous handler.
    #[must_use]
    pub fn on<F>(mut self, kind: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut S, &mut World, &Command) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.handlers.insert(kind.into(), Box::new(handler));
        self
    }

    /// Routes `kind` to `handler`, deserializing the payload into `P` first.
    ///
    /// A payload of the wrong shape yields [`CommandError::InvalidPayload`].
    #[must_use]
    pub fn on_payload<P, F>(self, kind: impl Into<String>, handler: F) -> Self
    where
        P: DeserializeOwned,
        F: Fn(&mut S, &mut World, P) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.on(kind, move |state, world, command| {
            let payload = command
                .payload_as::<P>()
                .map_err(|source| CommandError::InvalidPayload {
                    kind: command.kind.clone(),
                    source,
                })?;
            handler(state, world, payload)
        })
    }

    /// Returns true if `kind` has a handler.
    #[must_use]
    pub fn handles(&self, kind: &str) -> bool {
        self.handlers.contains_key(kind)
    }

    /// Runs the handler for `command.kind`.
    ///
    /// # Errors
    ///
    /// [`CommandError::UnknownCommand`] if unmapped, otherwise whatever the
    /// handler returns.
    pub fn dispatch(&self, state: &mut S, world: &mut World, command: &Command) -> Result<(), CommandError> {
        let handler = self
            .handlers
            .get(&command.kind)
            .ok_or_else(|| CommandError::UnknownCommand(command.kind.clone()))?;
        handler(state, world, command)
    }
}

impl<S: 'static> Default for CommandRouter<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> fmt::Debug for CommandRouter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        f.debug_struct("CommandRouter").field("kinds", &kinds).finish()
    }
}
