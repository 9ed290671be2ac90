//! A group of live views sharing one commit subscription.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use chrono::{DateTime, Utc};
use live_sync_core::{
    CommitBatch, CommitSubscription, DataEventTransaction, Database, RecordDataEvent, Result,
    Snapshot, SyncError,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ViewSetConfig;
use crate::definition::ViewDefinition;
use crate::dynamic_param::{DynamicParam, ParamId, ParamKind};
use crate::dynamic_view::{DynamicView, ViewId, ViewState};

/// Receives every delivered transaction, in commit order.
pub type ViewSink = Box<dyn FnMut(DataEventTransaction) + Send>;

/// Views and dependent parameters maintained together.
///
/// Views are processed in declaration order. A commit is handled in two
/// passes: every change event is narrowed and diffed for every relevant
/// view, then every view whose dynamic parameters moved is re-evaluated
/// once. A dependency chain declared parent first settles within one
/// commit; a parameter whose consumer was declared before its producer
/// stays dirty until the next commit.
pub struct DynamicViewSet {
    db: Arc<dyn Database>,
    config: ViewSetConfig,
    views: Vec<DynamicView>,
    params: Vec<DynamicParam>,
}

impl DynamicViewSet {
    pub fn new(db: Arc<dyn Database>, config: ViewSetConfig) -> Self {
        Self {
            db,
            config,
            views: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn create_single_value_param(&mut self, name: impl Into<String>) -> ParamId {
        self.create_param(name.into(), ParamKind::Single)
    }

    pub fn create_multi_value_param(&mut self, name: impl Into<String>) -> ParamId {
        self.create_param(name.into(), ParamKind::Multi)
    }

    fn create_param(&mut self, name: String, kind: ParamKind) -> ParamId {
        let id = ParamId(self.params.len());
        self.params.push(DynamicParam::new(id, name, kind));
        id
    }

    /// Registers a view. Statement and definition errors surface here.
    pub fn create_view(&mut self, definition: ViewDefinition) -> Result<ViewId> {
        for param in definition
            .child_params
            .iter()
            .map(|(p, _)| p)
            .chain(definition.dynamic_params.iter().map(|(_, p)| p))
        {
            if param.0 >= self.params.len() {
                return Err(SyncError::MissingParam {
                    name: param.to_string(),
                });
            }
        }
        let id = ViewId(self.views.len());
        let view = DynamicView::new(id, self.db.as_ref(), definition, &self.params)?;
        debug!(view = %view.name(), sql = %view.statement().sql(), "view registered");
        self.views.push(view);
        Ok(id)
    }

    pub fn view(&self, id: ViewId) -> Option<&DynamicView> {
        self.views.get(id.0)
    }

    pub fn views(&self) -> &[DynamicView] {
        &self.views
    }

    pub fn param(&self, id: ParamId) -> Option<&DynamicParam> {
        self.params.get(id.0)
    }

    pub fn database(&self) -> &Arc<dyn Database> {
        &self.db
    }

    /// Initial snapshot of every view, read from the current state.
    pub fn initial_transaction(&mut self) -> Result<DataEventTransaction> {
        let snapshot = self.db.snapshot();
        self.initial_transaction_at(snapshot.as_ref(), Utc::now())
    }

    /// Initial snapshot of every view, read from `snapshot`.
    ///
    /// Each view contributes its own `InitialBegin..InitialEnd` run. Child
    /// parameters are fed as views are read, so a consumer declared after
    /// its producer starts from the producer's rows.
    pub fn initial_transaction_at(
        &mut self,
        snapshot: &dyn Snapshot,
        date_time: DateTime<Utc>,
    ) -> Result<DataEventTransaction> {
        let mut events = Vec::new();
        for index in 0..self.views.len() {
            let fresh = self.views[index].current_dynamic_values(&self.params);
            let view = &mut self.views[index];
            view.rebind(fresh);
            let view_events = view.initial_snapshot(snapshot)?;
            view.update_child_params(&view_events, &mut self.params);
            view.set_state(ViewState::Started);
            events.extend(view_events);
        }
        self.reset_settled_params();
        Ok(DataEventTransaction::new(date_time, events))
    }

    /// Turns one commit into the events of every view.
    ///
    /// A view whose narrowing query fails contributes nothing for that
    /// change; the failure is logged and other views continue.
    pub fn process_commit(&mut self, batch: &CommitBatch) -> DataEventTransaction {
        let mut output: Vec<RecordDataEvent> = Vec::new();

        for change in &batch.events {
            for view in &self.views {
                if !view.is_relevant(&change.name) {
                    continue;
                }
                let params = view.bound_params();
                let pre = view.impacted_records(change, batch.pre.as_ref(), &params);
                let post = view.impacted_records(change, batch.post.as_ref(), &params);
                match pre.and_then(|pre| Ok((pre, post?))) {
                    Ok((pre, post)) => {
                        let events = view.diff(&pre, &post);
                        view.update_child_params(&events, &mut self.params);
                        output.extend(events);
                    }
                    Err(e) => {
                        warn!(view = %view.name(), table = %change.name, key = %change.key_value, error = %e, "skipping change for view");
                    }
                }
            }
        }

        for index in 0..self.views.len() {
            if !self.views[index].is_stale(&self.params) {
                continue;
            }
            let fresh = self.views[index].current_dynamic_values(&self.params);
            let view = &mut self.views[index];
            match view.reevaluate(batch.post.as_ref(), fresh) {
                Ok(events) => {
                    debug!(view = %view.name(), events = events.len(), "re-evaluated for dynamic params");
                    view.update_child_params(&events, &mut self.params);
                    output.extend(events);
                }
                Err(e) => {
                    warn!(view = %view.name(), error = %e, "re-evaluation failed");
                }
            }
        }
        self.reset_settled_params();

        DataEventTransaction::new(batch.committed_at, output)
    }

    /// Clears the dirty flag of every parameter all consumers have bound.
    fn reset_settled_params(&mut self) {
        for param in self.params.iter_mut().filter(|p| p.is_dirty()) {
            if self.views.iter().all(|v| v.has_bound_latest(param)) {
                param.reset_dirty();
            }
        }
    }

    /// Subscribes to commits, delivers the initial snapshot to `sink` and
    /// processes later commits on a dedicated worker thread.
    ///
    /// The subscription is taken before the snapshot, and queued commits
    /// already contained in the snapshot are skipped, so no commit is lost
    /// or delivered twice.
    pub fn start(mut self, mut sink: ViewSink) -> Result<ViewSetHandle> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Arc<CommitBatch>>();
        let subscription = self.db.on_commit(Arc::new(move |batch: Arc<CommitBatch>| {
            // A closed receiver means the worker is gone.
            let _ = sender.send(batch);
        }));

        let snapshot = self.db.snapshot();
        let start_version = snapshot.version();
        let initial = self.initial_transaction_at(snapshot.as_ref(), Utc::now())?;
        drop(snapshot);
        info!(
            worker = %self.config.worker_name,
            views = self.views.len(),
            version = start_version,
            "view set started"
        );
        sink(initial);

        let active = Arc::new(AtomicBool::new(true));
        let worker_active = Arc::clone(&active);
        let worker_name = self.config.worker_name.clone();
        let worker = thread::Builder::new()
            .name(worker_name.clone())
            .spawn(move || {
                while let Some(batch) = receiver.blocking_recv() {
                    if !worker_active.load(Ordering::Acquire) {
                        break;
                    }
                    if batch.post.version() <= start_version {
                        continue;
                    }
                    let transaction = self.process_commit(&batch);
                    if !transaction.is_empty() {
                        sink(transaction);
                    }
                }
                for view in &mut self.views {
                    view.set_state(ViewState::Disposed);
                }
                info!(worker = %self.config.worker_name, "view set stopped");
            })
            .map_err(|e| SyncError::Storage(format!("failed to spawn view set worker: {}", e)))?;

        Ok(ViewSetHandle {
            name: worker_name,
            active,
            worker_id: worker.thread().id(),
            subscription: Mutex::new(Some(subscription)),
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl fmt::Debug for DynamicViewSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicViewSet")
            .field("config", &self.config)
            .field("views", &self.views)
            .field("params", &self.params)
            .finish()
    }
}

/// Control handle of a started view set. Dropping it disposes the set.
pub struct ViewSetHandle {
    name: String,
    active: Arc<AtomicBool>,
    worker_id: ThreadId,
    subscription: Mutex<Option<CommitSubscription>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ViewSetHandle {
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Stops delivery. The commit being processed, if any, completes.
    ///
    /// Safe to call repeatedly and from any thread, the sink included.
    pub fn dispose(&self) {
        if self.active.swap(false, Ordering::AcqRel) {
            info!(worker = %self.name, "disposing view set");
        }
        self.subscription.lock().take();
    }

    /// Stops listening for new commits and waits until every queued commit
    /// has been delivered.
    pub fn join(self) {
        self.subscription.lock().take();
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(worker) = self.worker.lock().take() {
            if worker.join().is_err() {
                warn!(worker = %self.name, "view set worker panicked");
            }
        }
    }
}

impl Drop for ViewSetHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ViewSetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewSetHandle")
            .field("name", &self.name)
            .field("active", &self.is_active())
            .finish()
    }
}
