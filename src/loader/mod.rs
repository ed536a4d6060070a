//! Dependency-aware loading: fetch records, the FIFO request queue, and the
//! global ready gate.
//!
//! Everything here is cooperative and single-threaded. A fetch either
//! completes inline (blocking sources) or parks as `InFlight` until the
//! embedder delivers the unit through `Kernel::complete_fetch`. Requests wait
//! in a FIFO queue and fire the moment their last outstanding name
//! registers; a failed fetch is terminal and its waiters simply never fire.

pub mod paths;
pub mod source;

pub use paths::PathResolver;
pub use source::{
    CompilationUnit, DeclaredSpec, DeclaredUnit, FetchOutcome, FileSource, MemoryUnits,
    UnitPayload, UnitSource,
};

use crate::errors::{CoreError, ErrorKind};
use crate::kernel::Kernel;
use glob::Pattern;
use std::collections::{HashMap, HashSet, VecDeque};

/// Deferred work resumed against the kernel once its wait is over.
pub type Continuation = Box<dyn FnOnce(&mut Kernel)>;

/// Fetch lifecycle of one compilation unit, keyed by resolved path. Absence
/// from the record table means the path was never requested. `Failed` is
/// terminal: the record stays, so the path is never fetched again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchState {
    InFlight,
    Loaded,
    Failed,
}

/// One queued `require`: the canonical names still missing plus the
/// continuation to run when the set drains.
pub struct DependencyRequest {
    pub(crate) outstanding: HashSet<String>,
    pub(crate) continuation: Continuation,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderStats {
    pub fetches_started: u64,
    pub fetches_loaded: u64,
    pub fetches_failed: u64,
    pub requests_queued: u64,
    pub requests_fired: u64,
}

/// Terminal fetch failure, delivered to the registered failure handler.
#[derive(Debug, Clone)]
pub struct FetchFailure {
    pub path: String,
    pub requester: String,
    pub message: String,
}

pub struct LoaderState {
    pub(crate) enabled: bool,
    pub(crate) sync_mode: bool,
    pub(crate) records: HashMap<String, FetchState>,
    /// Who asked for each path, for failure reporting.
    pub(crate) requester: HashMap<String, String>,
    pub(crate) queue: VecDeque<DependencyRequest>,
    pub(crate) ready_listeners: Vec<Continuation>,
    /// Accumulated `uses` names; drained by the ready gate.
    pub(crate) optional: Vec<String>,
    pub(crate) resolver: PathResolver,
    pub(crate) source: Box<dyn UnitSource>,
    pub(crate) failure_handler: Option<Box<dyn FnMut(&FetchFailure)>>,
    pub(crate) stats: LoaderStats,
    pub(crate) in_flight: usize,
    /// Re-entrancy guard around the ready gate.
    pub(crate) firing_ready: bool,
}

impl LoaderState {
    pub(crate) fn new() -> Self {
        Self {
            enabled: true,
            sync_mode: false,
            records: HashMap::new(),
            requester: HashMap::new(),
            queue: VecDeque::new(),
            ready_listeners: Vec::new(),
            optional: Vec::new(),
            resolver: PathResolver::new(),
            source: Box::new(MemoryUnits::new()),
            failure_handler: None,
            stats: LoaderStats::default(),
            in_flight: 0,
            firing_ready: false,
        }
    }

    pub fn record(&self, path: &str) -> Option<FetchState> {
        self.records.get(path).copied()
    }

    pub fn stats(&self) -> LoaderStats {
        self.stats
    }
}

fn is_excluded(name: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|expr| {
        if expr.contains('*') || expr.contains('?') {
            Pattern::new(expr).map(|p| p.matches(name)).unwrap_or(false)
        } else {
            expr == name
        }
    })
}

/// A `require` scope with an exclusion list. Excluded names (plain or
/// wildcard) are dropped from every expansion before queuing.
pub struct ExcludeScope {
    excludes: Vec<String>,
}

impl ExcludeScope {
    pub fn new<I, S>(excludes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excludes: excludes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn require<F>(
        &self,
        kernel: &mut Kernel,
        names: &[String],
        on_loaded: F,
    ) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Kernel) + 'static,
    {
        kernel.require_internal(names, &self.excludes, "<require>", Box::new(on_loaded))
    }

    pub fn sync_require(&self, kernel: &mut Kernel, names: &[String]) -> Result<(), CoreError> {
        let saved = kernel.loader.sync_mode;
        kernel.loader.sync_mode = true;
        let result = kernel.require_internal(names, &self.excludes, "<require>", Box::new(|_| {}));
        kernel.loader.sync_mode = saved;
        result
    }
}

impl Kernel {
    /// Load the named types (and transitively everything they require), then
    /// run `on_loaded`. Fires synchronously when nothing is missing.
    pub fn require<F>(&mut self, names: &[String], on_loaded: F) -> Result<(), CoreError>
    where
        F: FnOnce(&mut Kernel) + 'static,
    {
        self.require_internal(names, &[], "<require>", Box::new(on_loaded))
    }

    /// `require` with blocking fetches: every missing unit is loaded in
    /// place before this returns. The mode is saved and restored, so nested
    /// asynchronous requires issued afterwards behave normally.
    pub fn sync_require(&mut self, names: &[String]) -> Result<(), CoreError> {
        let saved = self.loader.sync_mode;
        self.loader.sync_mode = true;
        let result = self.require_internal(names, &[], "<require>", Box::new(|_| {}));
        self.loader.sync_mode = saved;
        result
    }

    pub(crate) fn require_internal(
        &mut self,
        names: &[String],
        excludes: &[String],
        requester: &str,
        continuation: Continuation,
    ) -> Result<(), CoreError> {
        let expanded = self.expand_names(names);
        let mut outstanding: HashSet<String> = HashSet::new();
        for name in expanded {
            let canonical = self.registry.resolve(&name);
            if is_excluded(&canonical, excludes) || is_excluded(&name, excludes) {
                continue;
            }
            if self.manager.is_created(&canonical) {
                continue;
            }
            outstanding.insert(canonical);
        }

        if outstanding.is_empty() {
            continuation(self);
            return Ok(());
        }
        if !self.loader.enabled {
            let name = outstanding
                .iter()
                .next()
                .cloned()
                .unwrap_or_default();
            return Err(CoreError::new(ErrorKind::LoaderDisabled { name }));
        }

        if self.loader.sync_mode {
            let mut names: Vec<String> = outstanding.into_iter().collect();
            names.sort();
            for name in &names {
                self.fetch_name_sync(name, requester)?;
            }
            continuation(self);
            return Ok(());
        }

        // queue before fetching: a blocking source completes inline, and the
        // resulting rescan must see this request
        tracing::debug!(requester, waiting = outstanding.len(), "queueing dependency request");
        self.loader.stats.requests_queued += 1;
        let names: Vec<String> = outstanding.iter().cloned().collect();
        self.loader.queue.push_back(DependencyRequest {
            outstanding,
            continuation,
        });
        for name in names {
            self.start_fetch(&name, requester)?;
        }
        Ok(())
    }

    /// Begin fetching the unit for `name` unless its path already has a
    /// record. One record per path, ever: re-requests are free.
    pub(crate) fn start_fetch(&mut self, name: &str, requester: &str) -> Result<(), CoreError> {
        let path = self.loader.resolver.resolve(name);
        if self.loader.records.contains_key(&path) {
            return Ok(());
        }
        self.loader.records.insert(path.clone(), FetchState::InFlight);
        self.loader
            .requester
            .insert(path.clone(), requester.to_string());
        self.loader.in_flight += 1;
        self.loader.stats.fetches_started += 1;

        let url = self.loader.resolver.fetch_url(&path);
        tracing::debug!(name, path = %path, "fetching compilation unit");
        match self.loader.source.fetch(&path, &url, false) {
            FetchOutcome::Loaded(unit) => self.complete_fetch(&path, Ok(unit)),
            FetchOutcome::Pending => Ok(()),
            FetchOutcome::Failed(message) => self.complete_fetch(&path, Err(message)),
        }
    }

    /// Fetch record for a resolved path; `None` means never requested.
    pub fn get_record(&self, path: &str) -> Option<FetchState> {
        self.loader.record(path)
    }

    /// Deliver the outcome of an in-flight fetch. Stale completions (no
    /// record, or one already settled) are ignored.
    pub fn complete_fetch(
        &mut self,
        path: &str,
        result: Result<CompilationUnit, String>,
    ) -> Result<(), CoreError> {
        if self.loader.record(path) != Some(FetchState::InFlight) {
            return Ok(());
        }
        self.loader.in_flight -= 1;
        match result {
            Ok(unit) => {
                self.loader
                    .records
                    .insert(path.to_string(), FetchState::Loaded);
                self.loader.stats.fetches_loaded += 1;
                tracing::debug!(path = %path, unit = %unit.name, "compilation unit loaded");
                self.execute_unit(unit)?;
                self.check_ready();
                Ok(())
            }
            Err(message) => {
                self.loader
                    .records
                    .insert(path.to_string(), FetchState::Failed);
                self.loader.stats.fetches_failed += 1;
                let requester = self
                    .loader
                    .requester
                    .get(path)
                    .cloned()
                    .unwrap_or_default();
                self.report_failure(FetchFailure {
                    path: path.to_string(),
                    requester,
                    message,
                });
                self.check_ready();
                Ok(())
            }
        }
    }

    /// Blocking fetch of one name. A loaded record is reused, never fetched
    /// again; a failed one stays failed.
    pub(crate) fn fetch_name_sync(
        &mut self,
        name: &str,
        requester: &str,
    ) -> Result<(), CoreError> {
        let path = self.loader.resolver.resolve(name);
        match self.loader.record(&path) {
            Some(FetchState::Loaded) => return Ok(()),
            Some(FetchState::Failed) => {
                return Err(CoreError::new(ErrorKind::DependencyFetch {
                    path,
                    requester: requester.to_string(),
                }))
            }
            Some(FetchState::InFlight) => {
                return Err(CoreError::new(ErrorKind::SyncFetchPending { path }))
            }
            None => {}
        }

        self.loader.records.insert(path.clone(), FetchState::InFlight);
        self.loader
            .requester
            .insert(path.clone(), requester.to_string());
        self.loader.in_flight += 1;
        self.loader.stats.fetches_started += 1;

        let url = self.loader.resolver.fetch_url(&path);
        tracing::debug!(name, path = %path, "fetching compilation unit (blocking)");
        match self.loader.source.fetch(&path, &url, true) {
            FetchOutcome::Loaded(unit) => self.complete_fetch(&path, Ok(unit)),
            FetchOutcome::Failed(message) => {
                self.complete_fetch(&path, Err(message))?;
                Err(CoreError::new(ErrorKind::DependencyFetch {
                    path,
                    requester: requester.to_string(),
                }))
            }
            FetchOutcome::Pending => {
                self.complete_fetch(
                    &path,
                    Err("source suspended a blocking fetch".to_string()),
                )?;
                Err(CoreError::new(ErrorKind::SyncFetchPending { path }))
            }
        }
    }

    fn execute_unit(&mut self, unit: CompilationUnit) -> Result<(), CoreError> {
        match unit.payload {
            UnitPayload::Spec(spec) => self.define(&unit.name, *spec).map(|_| ()),
            UnitPayload::Native(f) => f(self),
        }
    }

    /// Drop `created` from every queued request and fire the ones whose
    /// outstanding set drained, in FIFO order.
    pub(crate) fn rescan_queue(&mut self, created: &str) {
        let queue = std::mem::take(&mut self.loader.queue);
        let mut kept = VecDeque::with_capacity(queue.len());
        let mut fired: Vec<Continuation> = Vec::new();
        for mut request in queue {
            request.outstanding.remove(created);
            if request.outstanding.is_empty() {
                self.loader.stats.requests_fired += 1;
                fired.push(request.continuation);
            } else {
                kept.push_back(request);
            }
        }
        // restore before firing: continuations may queue new requests
        self.loader.queue = kept;
        for continuation in fired {
            continuation(self);
        }
    }

    /// Fire ready listeners once no fetch is in flight and no request is
    /// queued. Optional (`uses`) names must land first; they are required
    /// here, which restarts the gate when they finish.
    pub(crate) fn check_ready(&mut self) {
        if self.loader.firing_ready {
            return;
        }
        if self.loader.in_flight != 0 || !self.loader.queue.is_empty() {
            return;
        }
        if !self.loader.optional.is_empty() && self.loader.enabled {
            let optional = std::mem::take(&mut self.loader.optional);
            self.loader.firing_ready = true;
            let result = self.require_internal(
                &optional,
                &[],
                "<ready>",
                Box::new(|kernel: &mut Kernel| {
                    kernel.loader.firing_ready = false;
                    kernel.check_ready();
                }),
            );
            if result.is_err() {
                self.loader.firing_ready = false;
            }
            return;
        }
        if self.loader.ready_listeners.is_empty() {
            return;
        }
        self.loader.firing_ready = true;
        let listeners = std::mem::take(&mut self.loader.ready_listeners);
        tracing::debug!(count = listeners.len(), "loader ready, firing listeners");
        for listener in listeners {
            listener(self);
        }
        self.loader.firing_ready = false;
        // a listener may have queued more work or more listeners
        self.check_ready();
    }

    /// Run `listener` once every queued request and optional dependency has
    /// settled. Fires immediately when the loader is already idle.
    pub fn on_ready<F>(&mut self, listener: F)
    where
        F: FnOnce(&mut Kernel) + 'static,
    {
        self.loader.ready_listeners.push(Box::new(listener));
        self.check_ready();
    }

    /// Report an error from deferred definition work (a resumed definition
    /// or a parked override) that has no caller left to return to.
    pub(crate) fn report_deferred_error(&mut self, class: &str, error: &CoreError) {
        let path = self.loader.resolver.resolve(class);
        self.report_failure(FetchFailure {
            path,
            requester: class.to_string(),
            message: error.to_string(),
        });
    }

    pub(crate) fn report_failure(&mut self, failure: FetchFailure) {
        tracing::error!(
            path = %failure.path,
            requester = %failure.requester,
            message = %failure.message,
            "compilation unit fetch failed"
        );
        if let Some(handler) = self.loader.failure_handler.as_mut() {
            handler(&failure);
        }
    }
}
