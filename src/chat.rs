//! Protocol-agnostic chat host.
//!
//! Defines the capability contract a backend implements, the action
//! registry that binds `(command filter, text pattern)` pairs to handlers,
//! and the loop that pumps received events through the registry.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use regex::Regex;
use skald_proto::Event;
use tracing::{error, info, warn};

use crate::error::ApiError;

/// Roles an action may require. The dispatcher only carries the
/// declaration; verifying a sender's actual role is the deployment's
/// concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Role {
    Admin,
    Staff,
    User,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Staff => write!(f, "staff"),
            Role::User => write!(f, "user"),
        }
    }
}

/// Capability contract implemented by every chat backend.
#[async_trait::async_trait]
pub trait ChatApi: Send + Sync {
    /// Establish the connection and complete the handshake.
    async fn start(&self) -> Result<(), ApiError>;
    /// Send a farewell and close the connection.
    async fn stop(&self) -> Result<(), ApiError>;
    /// Send one outbound event.
    async fn send_message(&self, event: &Event) -> Result<(), ApiError>;
    /// Receive the next inbound event, blocking until one arrives.
    async fn receive_message(&self) -> Result<Event, ApiError>;
}

/// Future returned by an action handler.
pub type ActionFuture = Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send>>;

/// An action handler. Receives the compiled pattern, for capture groups,
/// and the triggering event.
pub type ActionFn = Arc<dyn Fn(Arc<Regex>, Event) -> ActionFuture + Send + Sync>;

/// A registered `(command filter, pattern)` -> handler binding.
struct Action {
    command: String,
    pattern: Arc<Regex>,
    example: String,
    help: String,
    roles: Vec<Role>,
    func: ActionFn,
}

/// The host loop. Owns the action list, append-only after setup, and
/// pumps a backend's events through it.
pub struct Handler {
    api: Arc<dyn ChatApi>,
    actions: Vec<Action>,
}

impl Handler {
    /// Create a host around a backend.
    pub fn new(api: Arc<dyn ChatApi>) -> Self {
        Self {
            api,
            actions: Vec::new(),
        }
    }

    /// Append an action. Insertion order is evaluation order; duplicates
    /// are permitted and every matching entry fires.
    pub fn register(
        &mut self,
        command: &str,
        pattern: &str,
        example: &str,
        help: &str,
        func: ActionFn,
        roles: &[Role],
    ) -> Result<(), ApiError> {
        let pattern = Regex::new(pattern)
            .map_err(|e| ApiError::InvalidConfig(format!("action pattern {pattern:?}: {e}")))?;
        self.actions.push(Action {
            command: command.to_string(),
            pattern: Arc::new(pattern),
            example: example.to_string(),
            help: help.to_string(),
            roles: roles.to_vec(),
            func,
        });
        Ok(())
    }

    /// Render the action listing for help output. Entries without an
    /// example are lifecycle hooks and are skipped.
    pub fn render_help(&self) -> Vec<String> {
        self.actions
            .iter()
            .filter(|a| !a.example.is_empty())
            .map(|a| {
                let roles = if a.roles.is_empty() {
                    String::new()
                } else {
                    let names: Vec<String> = a.roles.iter().map(|r| r.to_string()).collect();
                    format!(" [{}]", names.join(", "))
                };
                format!("{} - {}{}", a.example, a.help, roles)
            })
            .collect()
    }

    /// Run one event through every matching action, in registration
    /// order. An action matches when its command filter equals the
    /// event's command and its pattern matches the event's text. A
    /// failing handler is logged and never stops later ones.
    pub async fn dispatch(&self, event: &Event) {
        for action in &self.actions {
            if action.command == event.command && action.pattern.is_match(&event.text) {
                if let Err(e) = (action.func)(Arc::clone(&action.pattern), event.clone()).await {
                    error!(command = %action.command, error = %e, "action failed");
                }
            }
        }
    }

    /// Start the backend, then pump events until the backend reports a
    /// terminal condition or a shutdown signal arrives.
    pub async fn run(&self) -> Result<(), ApiError> {
        self.api.start().await?;

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    if let Err(e) = signal {
                        error!(error = %e, "failed to listen for shutdown signal");
                    } else {
                        info!("shutdown signal received");
                    }
                    if let Err(e) = self.api.stop().await {
                        error!(error = %e, "error stopping backend");
                    }
                    return Ok(());
                }
                received = self.api.receive_message() => match received {
                    Ok(event) => self.dispatch(&event).await,
                    Err(e) if e.is_recoverable() => {
                        warn!(error = %e, "discarding line");
                    }
                    Err(ApiError::Closed) => {
                        info!("inbound stream ended");
                        return Ok(());
                    }
                    Err(e) => {
                        error!(error = %e, "receive failed");
                        return Err(e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct NullApi;

    #[async_trait::async_trait]
    impl ChatApi for NullApi {
        async fn start(&self) -> Result<(), ApiError> {
            Ok(())
        }
        async fn stop(&self) -> Result<(), ApiError> {
            Ok(())
        }
        async fn send_message(&self, _event: &Event) -> Result<(), ApiError> {
            Ok(())
        }
        async fn receive_message(&self) -> Result<Event, ApiError> {
            Err(ApiError::Closed)
        }
    }

    fn handler() -> Handler {
        Handler::new(Arc::new(NullApi))
    }

    fn recording_action(log: Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> ActionFn {
        Arc::new(move |_, _| {
            let log = Arc::clone(&log);
            Box::pin(async move {
                log.lock().unwrap().push(tag);
                Ok(())
            })
        })
    }

    #[tokio::test]
    async fn matching_actions_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handler = handler();
        handler
            .register("PRIVMSG", "!x", "", "", recording_action(log.clone(), "first"), &[])
            .unwrap();
        handler
            .register("PRIVMSG", "!x", "", "", recording_action(log.clone(), "second"), &[])
            .unwrap();
        handler
            .register("NOTICE", "!x", "", "", recording_action(log.clone(), "wrong-command"), &[])
            .unwrap();
        handler
            .register("PRIVMSG", "!y", "", "", recording_action(log.clone(), "wrong-pattern"), &[])
            .unwrap();

        let event = Event {
            command: "PRIVMSG".to_string(),
            text: "!x now".to_string(),
            ..Event::default()
        };
        handler.dispatch(&event).await;

        assert_eq!(*log.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn failing_action_does_not_stop_later_ones() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handler = handler();
        handler
            .register(
                "PRIVMSG",
                "!x",
                "",
                "",
                Arc::new(|_, event| {
                    Box::pin(async move { Err(ApiError::MalformedLine(event.text)) })
                }),
                &[],
            )
            .unwrap();
        handler
            .register("PRIVMSG", "!x", "", "", recording_action(log.clone(), "after"), &[])
            .unwrap();

        let event = Event {
            command: "PRIVMSG".to_string(),
            text: "!x".to_string(),
            ..Event::default()
        };
        handler.dispatch(&event).await;

        assert_eq!(*log.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test]
    async fn empty_filter_matches_synthetic_events() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut handler = handler();
        handler
            .register("", "", "", "", recording_action(log.clone(), "hook"), &[])
            .unwrap();

        let synthetic = Event::default();
        handler.dispatch(&synthetic).await;
        assert_eq!(*log.lock().unwrap(), vec!["hook"]);
    }

    #[tokio::test]
    async fn capture_groups_reach_the_handler() {
        let seen = Arc::new(Mutex::new(String::new()));
        let seen_in_action = Arc::clone(&seen);
        let mut handler = handler();
        handler
            .register(
                "PRIVMSG",
                "!join (.*)",
                "!join #channel",
                "Join the specified channel",
                Arc::new(move |re, event| {
                    let seen = Arc::clone(&seen_in_action);
                    Box::pin(async move {
                        let captured = re
                            .captures(&event.text)
                            .and_then(|c| c.get(1))
                            .map(|m| m.as_str().to_string())
                            .unwrap_or_default();
                        *seen.lock().unwrap() = captured;
                        Ok(())
                    })
                }),
                &[Role::Admin],
            )
            .unwrap();

        let event = Event {
            command: "PRIVMSG".to_string(),
            text: "!join #test".to_string(),
            ..Event::default()
        };
        handler.dispatch(&event).await;
        assert_eq!(*seen.lock().unwrap(), "#test");
    }

    #[test]
    fn help_lists_examples_and_roles() {
        let mut handler = handler();
        handler
            .register("005", "", "", "", Arc::new(|_, _| Box::pin(async { Ok(()) })), &[])
            .unwrap();
        handler
            .register(
                "PRIVMSG",
                "!join (.*)",
                "!join #channel",
                "Join the specified channel",
                Arc::new(|_, _| Box::pin(async { Ok(()) })),
                &[Role::Admin],
            )
            .unwrap();

        let listing = handler.render_help();
        assert_eq!(
            listing,
            vec!["!join #channel - Join the specified channel [admin]"]
        );
    }

    #[test]
    fn bad_pattern_is_a_config_error() {
        let mut handler = handler();
        let result = handler.register(
            "PRIVMSG",
            "!(unclosed",
            "",
            "",
            Arc::new(|_, _| Box::pin(async { Ok(()) })),
            &[],
        );
        assert!(matches!(result, Err(ApiError::InvalidConfig(_))));
    }
}
