// src/storage/store_server.rs — Async message passing for Store
//
// One background task owns the SQLite connection. Callers hold a cloneable
// `StoreHandle`; every call takes a cancellation token. Cancelling a call
// drops the reply, and a job whose caller is gone is skipped before it runs.
// Jobs that already started always finish their transaction.

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::infra::errors::AgentError;
use crate::skills::types::ConversationContext;
use crate::storage::store::{
    ActionUsageRow, BookingTemplateRow, LearnedPatternRow, LearningEventRow, NewLearningEvent,
    NewTask, PartnerAmountRow, PatternWrite, SimilarTransactionRow, Store, TaskRow,
    TransactionRecord, TASK_REFERENCE_KEY,
};

type StoreJob = Box<dyn FnOnce(&Store) + Send + 'static>;

pub enum StoreCommand {
    Exec(StoreJob),
}

/// A handle to the Store that uses message passing.
#[derive(Clone)]
pub struct StoreHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl StoreHandle {
    pub fn new(tx: mpsc::Sender<StoreCommand>) -> Self {
        Self { tx }
    }

    async fn call<T, F>(&self, cancel: &CancellationToken, op: F) -> Result<T, AgentError>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> anyhow::Result<T> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let (resp_tx, resp_rx) = oneshot::channel();
        let job: StoreJob = Box::new(move |store| {
            if resp_tx.is_closed() {
                debug!("Skipping store job: caller went away");
                return;
            }
            let _ = resp_tx.send(op(store));
        });

        tokio::select! {
            _ = cancel.cancelled() => return Err(AgentError::Cancelled),
            sent = self.tx.send(StoreCommand::Exec(job)) => {
                sent.map_err(|_| AgentError::StoreUnavailable)?;
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(AgentError::Cancelled),
            reply = resp_rx => match reply {
                Ok(result) => result.map_err(AgentError::from),
                Err(_) => Err(AgentError::StoreUnavailable),
            },
        }
    }

    // -- Tenants & sessions --

    pub async fn insert_tenant(
        &self,
        code: &str,
        name: Option<&str>,
        status: &str,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let (code, name, status) = (code.to_string(), name.map(str::to_string), status.to_string());
        self.call(cancel, move |s| s.insert_tenant(&code, name.as_deref(), &status))
            .await
    }

    pub async fn list_active_tenants(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, AgentError> {
        self.call(cancel, |s| s.list_active_tenants()).await
    }

    pub async fn insert_session(
        &self,
        id: &str,
        tenant_id: &str,
        user_id: &str,
        channel: &str,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let (id, tenant_id, user_id, channel) = (
            id.to_string(),
            tenant_id.to_string(),
            user_id.to_string(),
            channel.to_string(),
        );
        self.call(cancel, move |s| {
            s.insert_session(&id, &tenant_id, &user_id, &channel)
        })
        .await
    }

    pub async fn load_session_state(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<String>, AgentError> {
        let id = id.to_string();
        self.call(cancel, move |s| s.load_session_state(&id)).await
    }

    pub async fn save_session_state(
        &self,
        id: &str,
        state: String,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let id = id.to_string();
        self.call(cancel, move |s| s.save_session_state(&id, &state))
            .await
    }

    /// Load the persisted conversation context, or a fresh one when the
    /// session has no state yet or the blob no longer parses. The configured
    /// follow-up window replaces whatever the blob carried.
    pub async fn load_context(
        &self,
        session_id: &str,
        tenant_id: &str,
        user_id: &str,
        channel: &str,
        follow_up_window_minutes: i64,
        cancel: &CancellationToken,
    ) -> Result<ConversationContext, AgentError> {
        let fresh = || ConversationContext::new(session_id, tenant_id, user_id, channel);
        let ctx = match self.load_session_state(session_id, cancel).await? {
            None => fresh(),
            Some(blob) => match serde_json::from_str::<ConversationContext>(&blob) {
                Ok(ctx) => ctx,
                Err(e) => {
                    warn!(session = session_id, "Discarding unreadable session state: {e}");
                    fresh()
                }
            },
        };
        Ok(ctx.with_follow_up_window(follow_up_window_minutes))
    }

    pub async fn save_context(
        &self,
        ctx: &ConversationContext,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let blob = serde_json::to_string(ctx)?;
        self.save_session_state(&ctx.session_id, blob, cancel).await
    }

    // -- Tasks --

    pub async fn insert_task(
        &self,
        task: NewTask,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        self.call(cancel, move |s| s.insert_task(&task)).await
    }

    pub async fn update_task_status(
        &self,
        id: &str,
        status: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let (id, status) = (id.to_string(), status.to_string());
        self.call(cancel, move |s| s.update_task_status(&id, &status))
            .await
    }

    pub async fn set_task_metadata(
        &self,
        id: &str,
        key: &str,
        value: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        let (id, key, value) = (id.to_string(), key.to_string(), value.to_string());
        self.call(cancel, move |s| s.set_task_metadata(&id, &key, &value))
            .await
    }

    /// Create a task in `pending` state and return its id.
    pub async fn create_task(
        &self,
        session_id: &str,
        tenant_id: &str,
        task_type: &str,
        title: &str,
        label: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, AgentError> {
        let id = uuid::Uuid::new_v4().to_string();
        let task = NewTask {
            id: id.clone(),
            session_id: session_id.to_string(),
            tenant_id: tenant_id.to_string(),
            task_type: task_type.to_string(),
            status: "pending".to_string(),
            label: label.map(str::to_string),
            title: title.to_string(),
            metadata: None,
        };
        self.insert_task(task, cancel).await?;
        Ok(id)
    }

    /// Record the external reference (document number) a task resolved to.
    pub async fn set_task_reference(
        &self,
        id: &str,
        reference: &str,
        cancel: &CancellationToken,
    ) -> Result<bool, AgentError> {
        self.set_task_metadata(id, TASK_REFERENCE_KEY, reference, cancel)
            .await
    }

    pub async fn list_session_tasks(
        &self,
        session_id: &str,
        tenant_id: &str,
        task_type: Option<&str>,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaskRow>, AgentError> {
        let (session_id, tenant_id, task_type) = (
            session_id.to_string(),
            tenant_id.to_string(),
            task_type.map(str::to_string),
        );
        self.call(cancel, move |s| {
            s.list_session_tasks(&session_id, &tenant_id, task_type.as_deref(), limit)
        })
        .await
    }

    // -- Transactions --

    pub async fn insert_transaction(
        &self,
        record: TransactionRecord,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        self.call(cancel, move |s| s.insert_transaction(&record)).await
    }

    pub async fn query_vendor_action_usage(
        &self,
        tenant_id: &str,
        vendor: &str,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<ActionUsageRow>, AgentError> {
        let (tenant_id, vendor) = (tenant_id.to_string(), vendor.to_string());
        self.call(cancel, move |s| {
            s.query_vendor_action_usage(&tenant_id, &vendor, limit)
        })
        .await
    }

    pub async fn query_similar_transactions(
        &self,
        tenant_id: &str,
        lower: f64,
        upper: f64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<SimilarTransactionRow>, AgentError> {
        let tenant_id = tenant_id.to_string();
        self.call(cancel, move |s| {
            s.query_similar_transactions(&tenant_id, lower, upper, limit)
        })
        .await
    }

    pub async fn query_vendor_booking_templates(
        &self,
        tenant_id: &str,
        vendor: &str,
        recent: u32,
        top_k: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<BookingTemplateRow>, AgentError> {
        let (tenant_id, vendor) = (tenant_id.to_string(), vendor.to_string());
        self.call(cancel, move |s| {
            s.query_vendor_booking_templates(&tenant_id, &vendor, recent, top_k)
        })
        .await
    }

    pub async fn query_category_booking_templates(
        &self,
        tenant_id: &str,
        keyword: &str,
        recent: u32,
        top_k: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<BookingTemplateRow>, AgentError> {
        let (tenant_id, keyword) = (tenant_id.to_string(), keyword.to_string());
        self.call(cancel, move |s| {
            s.query_category_booking_templates(&tenant_id, &keyword, recent, top_k)
        })
        .await
    }

    pub async fn query_partner_amounts(
        &self,
        tenant_id: &str,
        since: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<Vec<PartnerAmountRow>, AgentError> {
        let tenant_id = tenant_id.to_string();
        self.call(cancel, move |s| s.query_partner_amounts(&tenant_id, since))
            .await
    }

    // -- Learning events --

    pub async fn insert_learning_event(
        &self,
        event: NewLearningEvent,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        self.call(cancel, move |s| s.insert_learning_event(&event))
            .await
    }

    pub async fn confirm_pending_events(
        &self,
        tenant_id: &str,
        event_type: &str,
        context_key: &str,
        context_value: &str,
        cancel: &CancellationToken,
    ) -> Result<usize, AgentError> {
        let (tenant_id, event_type, key, value) = (
            tenant_id.to_string(),
            event_type.to_string(),
            context_key.to_string(),
            context_value.to_string(),
        );
        self.call(cancel, move |s| {
            s.confirm_pending_events(&tenant_id, &event_type, &key, &value)
        })
        .await
    }

    pub async fn query_events_by_outcome(
        &self,
        tenant_id: &str,
        outcome: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<LearningEventRow>, AgentError> {
        let (tenant_id, outcome) = (tenant_id.to_string(), outcome.to_string());
        self.call(cancel, move |s| s.query_events_by_outcome(&tenant_id, &outcome))
            .await
    }

    pub async fn get_learning_event(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<LearningEventRow>, AgentError> {
        let id = id.to_string();
        self.call(cancel, move |s| s.get_learning_event(&id)).await
    }

    pub async fn count_pending_events_before(
        &self,
        tenant_id: &str,
        before: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> Result<i64, AgentError> {
        let tenant_id = tenant_id.to_string();
        self.call(cancel, move |s| {
            s.count_pending_events_before(&tenant_id, before)
        })
        .await
    }

    // -- Learned patterns --

    #[allow(clippy::too_many_arguments)]
    pub async fn reinforce_pattern(
        &self,
        tenant_id: &str,
        pattern_type: &str,
        conditions: String,
        recommendation: String,
        initial: f64,
        step: f64,
        ceiling: f64,
        cancel: &CancellationToken,
    ) -> Result<(), AgentError> {
        let (tenant_id, pattern_type) = (tenant_id.to_string(), pattern_type.to_string());
        self.call(cancel, move |s| {
            s.reinforce_pattern(
                &tenant_id,
                &pattern_type,
                &conditions,
                &recommendation,
                initial,
                step,
                ceiling,
            )
        })
        .await
    }

    pub async fn replace_patterns(
        &self,
        tenant_id: &str,
        patterns: Vec<PatternWrite>,
        cancel: &CancellationToken,
    ) -> Result<usize, AgentError> {
        let tenant_id = tenant_id.to_string();
        self.call(cancel, move |s| s.replace_patterns(&tenant_id, &patterns))
            .await
    }

    pub async fn get_pattern(
        &self,
        tenant_id: &str,
        pattern_type: &str,
        conditions: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<LearnedPatternRow>, AgentError> {
        let (tenant_id, pattern_type, conditions) = (
            tenant_id.to_string(),
            pattern_type.to_string(),
            conditions.to_string(),
        );
        self.call(cancel, move |s| {
            s.get_pattern(&tenant_id, &pattern_type, &conditions)
        })
        .await
    }

    pub async fn query_patterns_by_type(
        &self,
        tenant_id: &str,
        pattern_type: &str,
        min_confidence: f64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<LearnedPatternRow>, AgentError> {
        let (tenant_id, pattern_type) = (tenant_id.to_string(), pattern_type.to_string());
        self.call(cancel, move |s| {
            s.query_patterns_by_type(&tenant_id, &pattern_type, min_confidence, limit)
        })
        .await
    }

    pub async fn query_category_patterns(
        &self,
        tenant_id: &str,
        category: &str,
        min_confidence: f64,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<LearnedPatternRow>, AgentError> {
        let (tenant_id, category) = (tenant_id.to_string(), category.to_string());
        self.call(cancel, move |s| {
            s.query_category_patterns(&tenant_id, &category, min_confidence, limit)
        })
        .await
    }

    pub async fn query_all_patterns(
        &self,
        tenant_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<LearnedPatternRow>, AgentError> {
        let tenant_id = tenant_id.to_string();
        self.call(cancel, move |s| s.query_all_patterns(&tenant_id)).await
    }
}

/// Helper to spawn the store server and return a handle.
pub fn spawn_store_server(
    store: Store,
    capacity: usize,
) -> (StoreHandle, tokio::task::JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = StoreHandle::new(tx);
    let join_handle = tokio::spawn(run_store_server(store, rx));
    (handle, join_handle)
}

/// The background task that owns the Store.
pub async fn run_store_server(store: Store, mut rx: mpsc::Receiver<StoreCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::Exec(job) => job(&store),
        }
    }
    debug!("Store server stopped");
}
