// src/routing/router.rs — Decide which open task a new message belongs to
//
// Strategies run in a fixed order and the first hit wins:
//   1. external reference number   2. `#N` label
//   3. modify intent + recent task  4. only task   5. newest pending task
// Routing is advisory. Storage failures resolve to "no match".

use std::sync::LazyLock;

use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::infra::config::RouterConfig;
use crate::storage::store::{parse_ts, TaskRow};
use crate::storage::StoreHandle;

pub use crate::storage::store::TASK_REFERENCE_KEY as REFERENCE_KEY;

static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]+").expect("digit run regex"));

static LABEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[#＃]([0-9]+)").expect("label regex"));

static MODIFY_INTENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(改|修改|変更|更新|update|change|modify|edit|纠正|订正|訂正|直す|やり直|削除|delete|取消|cancel|キャンセル|移到|移す|切替)",
    )
    .expect("modify intent regex")
});

/// The fields of a task the router looks at.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSummary {
    pub id: String,
    pub task_type: String,
    pub status: String,
    pub label: Option<String>,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TaskSummary {
    pub fn from_row(row: &TaskRow) -> Self {
        let reference = serde_json::from_str::<Value>(&row.metadata)
            .ok()
            .and_then(|m| match &m[REFERENCE_KEY] {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });
        Self {
            id: row.id.clone(),
            task_type: row.task_type.clone(),
            status: row.status.clone(),
            label: row.label.clone(),
            reference,
            created_at: parse_ts(&row.created_at),
            updated_at: parse_ts(&row.updated_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStrategy {
    ReferenceMatch,
    LabelMatch,
    ModifyIntentSingleRecent,
    ModifyIntentLastCompleted,
    SingleTask,
    PendingPriority,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch {
    pub task_id: String,
    pub task_type: String,
    pub strategy: RouteStrategy,
    /// e.g. `label_match:#3`, `reference_match:2026000123`, `single_task`.
    pub reason: String,
}

impl RouteMatch {
    fn new(task: &TaskSummary, strategy: RouteStrategy, reason: impl Into<String>) -> Self {
        Self {
            task_id: task.id.clone(),
            task_type: task.task_type.clone(),
            strategy,
            reason: reason.into(),
        }
    }
}

/// `#3`, `＃3` and `3` all name the same label.
fn normalize_label(label: &str) -> String {
    let digits = label.trim().trim_start_matches(['#', '＃']);
    format!("#{digits}")
}

fn exactly_one<'a, F>(tasks: &'a [TaskSummary], pred: F) -> Option<&'a TaskSummary>
where
    F: Fn(&TaskSummary) -> bool,
{
    let mut hits = tasks.iter().filter(|t| pred(t));
    let first = hits.next()?;
    if hits.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Pure routing over an already-loaded task list (newest first).
pub fn route(
    message: &str,
    tasks: &[TaskSummary],
    now: DateTime<Utc>,
    config: &RouterConfig,
) -> Option<RouteMatch> {
    if message.trim().is_empty() || tasks.is_empty() {
        return None;
    }

    for run in DIGIT_RUN_RE.find_iter(message) {
        let token = run.as_str();
        if token.len() != config.reference_digits {
            continue;
        }
        let hit = exactly_one(tasks, |t| {
            t.reference
                .as_deref()
                .map(|r| r.contains(token))
                .unwrap_or(false)
        });
        if let Some(task) = hit {
            return Some(RouteMatch::new(
                task,
                RouteStrategy::ReferenceMatch,
                format!("reference_match:{token}"),
            ));
        }
    }

    for caps in LABEL_RE.captures_iter(message) {
        let label = format!("#{}", &caps[1]);
        let hit = exactly_one(tasks, |t| {
            t.label
                .as_deref()
                .map(|l| normalize_label(l) == label)
                .unwrap_or(false)
        });
        if let Some(task) = hit {
            return Some(RouteMatch::new(
                task,
                RouteStrategy::LabelMatch,
                format!("label_match:{label}"),
            ));
        }
    }

    if MODIFY_INTENT_RE.is_match(message) {
        let cutoff = now - Duration::minutes(config.recent_window_minutes);
        let mut recent: Vec<&TaskSummary> =
            tasks.iter().filter(|t| t.updated_at > cutoff).collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));

        match recent.as_slice() {
            [only] => {
                return Some(RouteMatch::new(
                    only,
                    RouteStrategy::ModifyIntentSingleRecent,
                    "modify_intent_single_recent",
                ));
            }
            [_, _, ..] => {
                if let Some(done) = recent
                    .iter()
                    .find(|t| t.status.eq_ignore_ascii_case("completed"))
                {
                    return Some(RouteMatch::new(
                        done,
                        RouteStrategy::ModifyIntentLastCompleted,
                        "modify_intent_last_completed",
                    ));
                }
            }
            [] => {}
        }
    }

    if let [only] = tasks {
        return Some(RouteMatch::new(only, RouteStrategy::SingleTask, "single_task"));
    }

    tasks
        .iter()
        .filter(|t| t.status.eq_ignore_ascii_case("pending"))
        .max_by_key(|t| t.updated_at)
        .map(|t| RouteMatch::new(t, RouteStrategy::PendingPriority, "pending_task_priority"))
}

/// Loads a session's tasks and routes a message to one of them.
#[derive(Clone)]
pub struct MessageTaskRouter {
    store: StoreHandle,
    config: RouterConfig,
}

impl MessageTaskRouter {
    pub fn new(store: StoreHandle, config: RouterConfig) -> Self {
        Self { store, config }
    }

    /// Route among tasks of the configured task type.
    pub async fn resolve(
        &self,
        session_id: &str,
        tenant_id: &str,
        message: &str,
        cancel: &CancellationToken,
    ) -> Option<RouteMatch> {
        let task_type = self.config.task_type.clone();
        self.resolve_typed(session_id, tenant_id, message, Some(&task_type), cancel)
            .await
    }

    /// Route among tasks of one type, or of every type when `task_type` is `None`.
    pub async fn resolve_typed(
        &self,
        session_id: &str,
        tenant_id: &str,
        message: &str,
        task_type: Option<&str>,
        cancel: &CancellationToken,
    ) -> Option<RouteMatch> {
        if message.trim().is_empty() {
            return None;
        }
        let rows = match self
            .store
            .list_session_tasks(session_id, tenant_id, task_type, self.config.task_limit, cancel)
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                warn!(session = session_id, "Task routing skipped: {e}");
                return None;
            }
        };
        let tasks: Vec<TaskSummary> = rows.iter().map(TaskSummary::from_row).collect();

        match route(message, &tasks, Utc::now(), &self.config) {
            Some(hit) => {
                info!(
                    session = session_id,
                    task = %hit.task_id,
                    reason = %hit.reason,
                    "Routed message to task"
                );
                Some(hit)
            }
            None => {
                debug!(session = session_id, tasks = tasks.len(), "No task matched message");
                None
            }
        }
    }
}
