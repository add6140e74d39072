//! Named event dispatch, handler timing, and teardown.
//!
//! [`UiContext::dispatch`] looks up the handlers a node binds to an event and
//! runs them under the node's execution mode:
//!
//! - **parallel**: every handler's `delay` counts from the triggering instant.
//!   Deadlines go into a stable queue ordered by (deadline, declaration
//!   index), so handlers with equal delays run in declaration order.
//!   `waitAfter` is ignored.
//! - **sequential**: handler *i+1* starts only after handler *i* waited its
//!   `delay`, ran, and waited its `waitAfter`.
//!
//! Zero delays run without yielding. Every wait races the node's
//! [`CancellationToken`], a child of the page token: tearing down a node (or
//! the page) abandons its pending handlers, and the torn-down ids are retired
//! in the state store so nothing can write into them afterwards.
//!
//! The futures returned here borrow the context and are not `Send`; run them
//! on a current-thread runtime, or spawn them with
//! [`UiContext::spawn_dispatch`] inside a [`tokio::task::LocalSet`].

use super::context::UiContext;
use crate::domain::{DynUiError, ExecutionMode, Handler, Result};
use futures_util::future::join_all;
use std::rc::Rc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Waits until `deadline`. Returns `false` if `token` was cancelled first.
async fn wait_until(deadline: Instant, token: &CancellationToken) -> bool {
    if token.is_cancelled() {
        return false;
    }
    if deadline <= Instant::now() {
        return true;
    }
    tokio::select! {
        biased;
        () = token.cancelled() => false,
        () = tokio::time::sleep_until(deadline) => true,
    }
}

fn millis(ms: Option<u64>) -> Duration {
    Duration::from_millis(ms.unwrap_or(0))
}

impl UiContext {
    /// Runs the handlers `node_id` binds to `event` and returns how many ran.
    ///
    /// An event the node does not handle runs nothing. Handlers abandoned by a
    /// teardown are not counted.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::NodeNotFound`] if no node has this id. Failures
    /// of individual handlers are logged and do not stop the others.
    pub async fn dispatch(&self, node_id: &str, event: &str) -> Result<usize> {
        let (handlers, mode) = {
            let registry = self.registry.borrow();
            let node = registry
                .get(node_id)
                .ok_or_else(|| DynUiError::NodeNotFound(node_id.to_string()))?;
            let Some(binding) = node.events.get(event) else {
                tracing::debug!(node_id = %node_id, event = %event, "node does not handle event");
                return Ok(0);
            };
            (
                binding.handlers().to_vec(),
                node.event_execution_mode.unwrap_or(self.default_mode),
            )
        };

        tracing::debug!(
            node_id = %node_id,
            event = %event,
            handlers = handlers.len(),
            mode = %mode,
            "dispatching event"
        );
        let token = self.node_token(node_id);
        let executed = self
            .run_handlers(node_id, &handlers, mode, &token)
            .instrument(tracing::debug_span!("dispatch", node_id = %node_id, event = %event))
            .await;
        if executed < handlers.len() {
            tracing::info!(
                node_id = %node_id,
                event = %event,
                executed,
                abandoned = handlers.len() - executed,
                "dispatch cancelled by teardown"
            );
        }
        Ok(executed)
    }

    /// Dispatches several `(node_id, event)` pairs concurrently.
    ///
    /// Results come back in input order.
    pub async fn dispatch_all<S: AsRef<str>>(&self, events: &[(S, S)]) -> Vec<Result<usize>> {
        join_all(
            events
                .iter()
                .map(|(node_id, event)| self.dispatch(node_id.as_ref(), event.as_ref())),
        )
        .await
    }

    /// Spawns [`UiContext::dispatch`] onto the current [`tokio::task::LocalSet`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a `LocalSet`, like [`tokio::task::spawn_local`].
    pub fn spawn_dispatch(
        self: &Rc<Self>,
        node_id: impl Into<String>,
        event: impl Into<String>,
    ) -> JoinHandle<Result<usize>> {
        let context = Rc::clone(self);
        let node_id = node_id.into();
        let event = event.into();
        tokio::task::spawn_local(async move { context.dispatch(&node_id, &event).await })
    }

    /// Runs `handlers` for `node_id` under `mode`; returns how many ran.
    pub async fn run_handlers(
        &self,
        node_id: &str,
        handlers: &[Handler],
        mode: ExecutionMode,
        token: &CancellationToken,
    ) -> usize {
        let mut executed = 0;
        match mode {
            ExecutionMode::Parallel => {
                let start = Instant::now();
                let mut queue: Vec<(Instant, usize, &Handler)> = handlers
                    .iter()
                    .enumerate()
                    .map(|(index, handler)| (start + millis(handler.delay), index, handler))
                    .collect();
                queue.sort_by_key(|(deadline, index, _)| (*deadline, *index));

                for (deadline, index, handler) in queue {
                    if !wait_until(deadline, token).await {
                        return executed;
                    }
                    self.run_one(handler, node_id, index);
                    executed += 1;
                }
            }
            ExecutionMode::Sequential => {
                for (index, handler) in handlers.iter().enumerate() {
                    if !wait_until(Instant::now() + millis(handler.delay), token).await {
                        return executed;
                    }
                    self.run_one(handler, node_id, index);
                    executed += 1;
                    if !wait_until(Instant::now() + millis(handler.wait_after), token).await {
                        return executed;
                    }
                }
            }
        }
        executed
    }

    fn run_one(&self, handler: &Handler, node_id: &str, index: usize) {
        tracing::trace!(node_id = %node_id, index, action = %handler.action, "handler fired");
        if let Err(error) = self.handle_event(handler, node_id) {
            tracing::error!(node_id = %node_id, index, action = %handler.action, error = %error, "handler failed");
        }
    }

    /// The cancellation token guarding `id`'s pending handlers.
    pub fn node_token(&self, id: &str) -> CancellationToken {
        self.node_tokens
            .borrow_mut()
            .entry(id.to_string())
            .or_insert_with(|| self.page_token.child_token())
            .clone()
    }

    /// Cancels pending handlers of `id` and its descendants and retires their
    /// state. The nodes stay in the registry; later dispatches to them are
    /// cancelled immediately.
    ///
    /// # Errors
    ///
    /// Returns [`DynUiError::NodeNotFound`] if no node has this id.
    pub fn teardown_node(&self, id: &str) -> Result<()> {
        let ids = self
            .registry
            .borrow()
            .get(id)
            .map(crate::domain::Node::subtree_ids)
            .ok_or_else(|| DynUiError::NodeNotFound(id.to_string()))?;

        tracing::debug!(node_id = %id, nodes = ids.len(), "tearing down subtree");
        let mut store = self.store.borrow_mut();
        for node_id in &ids {
            self.node_token(node_id).cancel();
            store.retire(node_id);
        }
        Ok(())
    }

    /// Cancels every pending handler on the page.
    pub fn teardown(&self) {
        tracing::info!("tearing down page");
        self.page_token.cancel();
    }

    /// Whether [`UiContext::teardown`] has been called.
    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.page_token.is_cancelled()
    }

    /// Gives `ids` fresh, uncancelled tokens.
    pub(super) fn reset_tokens<'i>(&self, ids: impl IntoIterator<Item = &'i str>) {
        let mut tokens = self.node_tokens.borrow_mut();
        for id in ids {
            tokens.remove(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::app::UiContext;
    use crate::schema::Schema;
    use serde_json::json;
    use std::time::Duration;

    fn context() -> UiContext {
        let schema = Schema::from_json_str(
            r#"[{
                "id": "button", "componentName": "Button",
                "events": {
                    "click": [
                        { "action": "updateState", "payload": { "path": "order", "value": "late" }, "delay": 50 },
                        { "action": "updateState", "payload": { "path": "order", "value": "early" } }
                    ]
                }
            }]"#,
        )
        .unwrap();
        UiContext::builder().build(schema).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn zero_delay_runs_before_first_wait() {
        let context = context();
        let dispatch = context.dispatch("button", "click");
        tokio::pin!(dispatch);
        assert!(futures_util::poll!(dispatch.as_mut()).is_pending());
        assert_eq!(context.get_state_value("order", Some("button")), Some(json!("early")));
        assert_eq!(dispatch.await.unwrap(), 2);
        assert_eq!(context.get_state_value("order", Some("button")), Some(json!("late")));
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_node_and_event() {
        let context = context();
        assert!(context.dispatch("ghost", "click").await.is_err());
        assert_eq!(context.dispatch("button", "hover").await.unwrap(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_abandons_pending_handlers() {
        let context = context();
        let (executed, ()) = tokio::join!(context.dispatch("button", "click"), async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            context.teardown_node("button").unwrap();
        });
        assert_eq!(executed.unwrap(), 1);
        assert_eq!(context.get_state_value("order", Some("button")), None);
        assert_eq!(context.dispatch("button", "click").await.unwrap(), 0);
    }
}
