use anyhow::Context;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use vigil_common::types::{Action, ActionHandler, ActionKind, EventUpdate};

/// Maps action kinds to ordered handler lists and dispatches triggered
/// actions.
///
/// `dispatch` copies the handler list under a short read lock and invokes
/// the handlers outside it, so a slow handler never blocks registration or
/// other dispatches. The first handler error aborts the remaining handlers
/// for that dispatch.
pub struct ActionRegistry {
    handlers: RwLock<HashMap<ActionKind, Vec<Arc<dyn ActionHandler>>>>,
}

impl Default for ActionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register(&self, kind: ActionKind, handler: Arc<dyn ActionHandler>) {
        self.handlers
            .write()
            .unwrap()
            .entry(kind)
            .or_default()
            .push(handler);
    }

    pub fn dispatch(&self, action: &Action) -> anyhow::Result<()> {
        let handlers: Vec<Arc<dyn ActionHandler>> = {
            let handlers = self.handlers.read().unwrap();
            match handlers.get(&action.kind) {
                Some(list) if !list.is_empty() => list.clone(),
                _ => {
                    anyhow::bail!("no handlers registered for action kind: {}", action.kind)
                }
            }
        };

        for handler in handlers {
            handler
                .handle(action)
                .with_context(|| format!("handler error for {}", action.kind))?;
        }

        Ok(())
    }
}

/// Prints alert actions to stdout with a wall-clock timestamp.
pub struct ConsoleAlertHandler;

impl ActionHandler for ConsoleAlertHandler {
    fn handle(&self, action: &Action) -> anyhow::Result<()> {
        println!(
            "[{}] ALERT [{}]: {}",
            action.timestamp.format("%H:%M:%S"),
            action.rule,
            action.message
        );
        Ok(())
    }
}

/// Emits log actions through `tracing`.
pub struct LogHandler;

impl ActionHandler for LogHandler {
    fn handle(&self, action: &Action) -> anyhow::Result<()> {
        tracing::info!(rule = %action.rule, "LOG [{}]: {}", action.rule, action.message);
        Ok(())
    }
}

/// Forwards alert and log actions to the dashboard's event channel.
pub struct DashboardForwarder {
    events: tokio::sync::mpsc::Sender<EventUpdate>,
}

impl DashboardForwarder {
    pub fn new(events: tokio::sync::mpsc::Sender<EventUpdate>) -> Self {
        Self { events }
    }
}

impl ActionHandler for DashboardForwarder {
    fn handle(&self, action: &Action) -> anyhow::Result<()> {
        let event_type = match action.kind {
            ActionKind::Log => "log",
            _ => "alert",
        };
        // Drop-on-full, matching the dashboard's channel contract.
        let _ = self.events.try_send(EventUpdate::new(
            event_type,
            &action.message,
            &action.rule,
            action.data.clone(),
        ));
        Ok(())
    }
}
