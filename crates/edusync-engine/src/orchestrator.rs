//! The phased reconciliation orchestrator.
//!
//! One run walks `Init → Fetching → Classifying → Diffing →
//! ApplyingAccounts → ApplyingContainers → ApplyingMemberships →
//! Finalizing`, ending `Completed`, `Failed` (phase-fatal error), or
//! `Cancelled` (external signal). Apply phases dispatch independent items
//! to a bounded worker pool; results flow back over a channel into a
//! single aggregation loop that owns the [`SyncRun`], so counters and the
//! error log have exactly one writer.
//!
//! Dry-run mode walks the identical phase sequence with gateway writes
//! no-op'd, so previews and live runs cannot drift apart.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use edusync_classify::{classify, format_container, CompiledSchema, ContainerSpec, GroupClassification};
use edusync_connector::{ConnectorResult, IdentityProvider, RemoteGroup, RemoteUser};

use crate::config::SyncOptions;
use crate::error::{EngineError, EngineResult};
use crate::gateway::{
    LocalAccount, LocalContainer, LocalMembership, LocalStateGateway, NewContainer,
};
use crate::plan::{
    diff_accounts, diff_containers, diff_memberships, resolve_role, should_sync_user,
    PlannedAccount, PlannedContainer, PlannedMembership, PlannedUpdate, SyncPlan,
};
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::run::{SyncPhase, SyncRun};
use crate::tracker::DeactivationTracker;

/// Remote directory state captured during the fetch phase.
struct RemoteSnapshot {
    users: Vec<RemoteUser>,
    groups: Vec<RemoteGroup>,
    members: HashMap<String, Vec<String>>,
}

/// A group with its per-run classification, cached for the remainder of
/// the run.
struct ClassifiedGroup {
    group: RemoteGroup,
    classification: GroupClassification,
    container: Option<ContainerSpec>,
    members: Vec<String>,
}

/// Local platform state captured during the diff phase.
struct LocalState {
    accounts: Vec<LocalAccount>,
    containers: Vec<LocalContainer>,
    memberships: Vec<LocalMembership>,
}

/// One unit of apply work.
enum WorkItem {
    CreateAccount(PlannedAccount),
    UpdateAccount(PlannedUpdate),
    DisableAccount(LocalAccount),
    DeleteAccount(LocalAccount),
    CreateContainer(PlannedContainer),
    Enroll {
        container_id: String,
        membership: PlannedMembership,
    },
    Unenroll(LocalMembership),
}

impl WorkItem {
    fn kind(&self) -> &'static str {
        match self {
            Self::CreateAccount(_)
            | Self::UpdateAccount(_)
            | Self::DisableAccount(_)
            | Self::DeleteAccount(_) => "account",
            Self::CreateContainer(_) => "container",
            Self::Enroll { .. } | Self::Unenroll(_) => "membership",
        }
    }

    fn label(&self) -> String {
        match self {
            Self::CreateAccount(planned) => planned.user.username.clone(),
            Self::UpdateAccount(update) => update.planned.user.username.clone(),
            Self::DisableAccount(account) | Self::DeleteAccount(account) => {
                account.username.clone()
            }
            Self::CreateContainer(container) => container.spec.display_name.clone(),
            Self::Enroll { membership, .. } => {
                format!("{}:{}", membership.container_external_id, membership.username)
            }
            Self::Unenroll(membership) => {
                format!("{}:{}", membership.container_id, membership.username)
            }
        }
    }
}

/// Side effect of a successfully applied item, beyond the counter bump.
enum AppliedChange {
    Generic,
    ContainerCreated(Option<LocalContainer>),
    AccountDisabled { external_id: Option<String> },
    AccountDeleted { external_id: Option<String> },
}

/// Which cumulative counter a successful item increments.
#[derive(Clone, Copy)]
enum StatBucket {
    Created,
    Updated,
    Disabled,
    Deleted,
}

/// Result of one apply attempt, sent to the aggregation loop.
struct WorkOutcome {
    kind: &'static str,
    label: String,
    bucket: StatBucket,
    result: Result<AppliedChange, String>,
}

/// Collected phase side effects.
#[derive(Default)]
struct PhaseEffects {
    created_containers: Vec<LocalContainer>,
    disabled_ids: Vec<String>,
    deleted_ids: Vec<String>,
}

/// Applies one item against the gateway.
///
/// In dry-run mode the gateway call is skipped but the outcome is
/// identical to a successful write, so counters and the log fill exactly
/// as a live run would.
async fn apply_work(
    gateway: &dyn LocalStateGateway,
    item: WorkItem,
    dry_run: bool,
) -> WorkOutcome {
    let kind = item.kind();
    let label = item.label();

    let (bucket, result) = match item {
        WorkItem::CreateAccount(planned) => {
            let result = if dry_run {
                debug!(username = %planned.user.username, "Dry-run: would create account");
                Ok(AppliedChange::Generic)
            } else {
                gateway
                    .create_account(&planned.as_new_account())
                    .await
                    .map(|_| AppliedChange::Generic)
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Created, result)
        }
        WorkItem::UpdateAccount(update) => {
            let result = if dry_run {
                debug!(username = %update.planned.user.username, "Dry-run: would update account");
                Ok(AppliedChange::Generic)
            } else {
                gateway
                    .update_account(&update.account_id, &update.planned.as_new_account())
                    .await
                    .map(|()| AppliedChange::Generic)
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Updated, result)
        }
        WorkItem::DisableAccount(account) => {
            let external_id = account.external_id.clone();
            let result = if dry_run {
                debug!(username = %account.username, "Dry-run: would disable account");
                Ok(AppliedChange::AccountDisabled { external_id })
            } else {
                gateway
                    .disable_account(&account.id)
                    .await
                    .map(|()| AppliedChange::AccountDisabled { external_id })
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Disabled, result)
        }
        WorkItem::DeleteAccount(account) => {
            let external_id = account.external_id.clone();
            let result = if dry_run {
                debug!(username = %account.username, "Dry-run: would delete account");
                Ok(AppliedChange::AccountDeleted { external_id })
            } else {
                gateway
                    .delete_account(&account.id)
                    .await
                    .map(|()| AppliedChange::AccountDeleted { external_id })
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Deleted, result)
        }
        WorkItem::CreateContainer(container) => {
            let result = if dry_run {
                debug!(name = %container.spec.display_name, "Dry-run: would create container");
                Ok(AppliedChange::ContainerCreated(None))
            } else {
                gateway
                    .create_container(&NewContainer {
                        external_id: container.group_external_id.clone(),
                        display_name: container.spec.display_name.clone(),
                        parent_path: container.spec.parent_path.clone(),
                    })
                    .await
                    .map(|created| AppliedChange::ContainerCreated(Some(created)))
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Created, result)
        }
        WorkItem::Enroll {
            container_id,
            membership,
        } => {
            let result = if dry_run {
                debug!(username = %membership.username, "Dry-run: would enroll");
                Ok(AppliedChange::Generic)
            } else {
                gateway
                    .enroll(&container_id, &membership.username, membership.role)
                    .await
                    .map(|()| AppliedChange::Generic)
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Created, result)
        }
        WorkItem::Unenroll(membership) => {
            let result = if dry_run {
                debug!(username = %membership.username, "Dry-run: would unenroll");
                Ok(AppliedChange::Generic)
            } else {
                gateway
                    .unenroll(&membership.container_id, &membership.username)
                    .await
                    .map(|()| AppliedChange::Generic)
                    .map_err(|e| e.to_string())
            };
            (StatBucket::Deleted, result)
        }
    };

    WorkOutcome {
        kind,
        label,
        bucket,
        result,
    }
}

/// The reconciliation engine for one sync target.
pub struct SyncEngine {
    provider: Arc<dyn IdentityProvider>,
    gateway: Arc<dyn LocalStateGateway>,
    options: SyncOptions,
}

impl SyncEngine {
    /// Creates an engine over a provider and a gateway.
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        gateway: Arc<dyn LocalStateGateway>,
        options: SyncOptions,
    ) -> Self {
        Self {
            provider,
            gateway,
            options,
        }
    }

    /// Computes the sync plan without applying anything.
    ///
    /// This is the dry-run diff shared verbatim with live runs: the same
    /// fetch, classification, and diff code paths produce the preview.
    #[instrument(skip(self))]
    pub async fn preview(&self) -> EngineResult<SyncPlan> {
        self.options.validate()?;
        let schema = self.options.schema.resolve()?;

        let snapshot = self.fetch_remote().await?;
        let classified = self.classify_groups(snapshot.groups, snapshot.members, &schema);
        let local = self.load_local_state().await?;

        Ok(self.build_plan(&snapshot.users, &classified, &local))
    }

    /// Executes one run to completion.
    ///
    /// Phase-fatal errors end the run as `Failed`; per-item apply errors
    /// are accumulated and the run still ends `Completed`. Cancellation is
    /// honored at phase starts and at progress-emission points inside
    /// apply phases; already-applied changes are not rolled back.
    #[instrument(skip_all, fields(run_id = %run_id, dry_run))]
    pub async fn execute(
        &self,
        run_id: Uuid,
        dry_run: bool,
        cancel: CancellationToken,
        shared: Arc<RwLock<SyncRun>>,
        callback: Option<ProgressCallback>,
    ) -> SyncRun {
        let mut run = SyncRun::new(run_id, dry_run);
        let mut reporter = ProgressReporter::new(
            callback,
            self.options.progress_interval,
            self.options.state_dir.as_ref(),
            run_id,
        );
        run.start();

        // ---- Init: validate options and compile the schema. Failures
        // here are run-fatal and precede any fetching; a malformed custom
        // schema never falls back to a built-in.
        run.enter_phase(SyncPhase::Init, "Validating configuration");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        if let Err(e) = self.options.validate() {
            return self.finish_failed(run, reporter, &shared, &e).await;
        }
        let schema = match self.options.schema.resolve() {
            Ok(schema) => schema,
            Err(e) => {
                return self
                    .finish_failed(run, reporter, &shared, &EngineError::Schema(e))
                    .await
            }
        };
        run.push_event(format!(
            "Using schema '{}' with {} rule(s)",
            schema.name(),
            schema.rule_count()
        ));

        let mut tracker = match self.options.state_dir {
            Some(ref dir) => {
                DeactivationTracker::load(&dir.join("tracker.json"), self.options.tracker.clone())
                    .await
            }
            None => DeactivationTracker::in_memory(self.options.tracker.clone()),
        };

        // ---- Fetching: any provider failure here aborts the run; no
        // partial apply is attempted.
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }
        run.enter_phase(SyncPhase::Fetching, "Fetching remote users and groups");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        let snapshot = match self.fetch_remote().await {
            Ok(snapshot) => snapshot,
            Err(e) => return self.finish_failed(run, reporter, &shared, &e).await,
        };
        run.push_event(format!(
            "Fetched {} user(s) and {} group(s)",
            snapshot.users.len(),
            snapshot.groups.len()
        ));

        // ---- Classifying: each group is classified and formatted once;
        // results are cached for the remainder of the run.
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }
        run.enter_phase(SyncPhase::Classifying, "Classifying groups");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        let users = snapshot.users;
        let classified = self.classify_groups(snapshot.groups, snapshot.members, &schema);
        let unknown = classified
            .iter()
            .filter(|c| c.classification.is_unknown())
            .count();
        if unknown > 0 {
            run.push_event(format!(
                "{unknown} group(s) unclassified, excluded from changes"
            ));
        }

        // ---- Diffing.
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }
        run.enter_phase(SyncPhase::Diffing, "Diffing remote state against local state");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        let local = match self.load_local_state().await {
            Ok(local) => local,
            Err(e) => return self.finish_failed(run, reporter, &shared, &e).await,
        };
        let plan = self.build_plan(&users, &classified, &local);
        let summary = plan.summary();
        run.stats.skipped += plan.accounts.skipped;
        run.push_event(format!(
            "Plan: {} account create(s), {} update(s), {} disable(s), {} delete(s), \
             {} container create(s), {} enrollment(s), {} unenrollment(s)",
            summary.accounts_to_create,
            summary.accounts_to_update,
            summary.accounts_to_disable,
            summary.accounts_to_delete,
            summary.containers_to_create,
            summary.memberships_to_enroll,
            summary.memberships_to_unenroll,
        ));

        // ---- ApplyingAccounts: accounts strictly before containers and
        // memberships, which reference them.
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }
        run.enter_phase(SyncPhase::ApplyingAccounts, "Applying account changes");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        // Reappeared accounts reset their soft-delete tracking; missing
        // ones accumulate marks that gate disable/delete below.
        for user in &users {
            tracker.unmark(&user.external_id);
        }
        let mut account_items: Vec<WorkItem> = Vec::new();
        for planned in plan.accounts.to_create.clone() {
            account_items.push(WorkItem::CreateAccount(planned));
        }
        for update in plan.accounts.to_update.clone() {
            account_items.push(WorkItem::UpdateAccount(update));
        }
        for account in plan.accounts.to_disable.clone() {
            let id = account.external_id.clone().unwrap_or_default();
            tracker.mark(&id);
            if tracker.should_disable(&id) {
                account_items.push(WorkItem::DisableAccount(account));
            } else {
                run.stats.skipped += 1;
                debug!(username = %account.username, "Disable deferred by tracker threshold");
            }
        }
        for account in plan.accounts.to_delete.clone() {
            let id = account.external_id.clone().unwrap_or_default();
            tracker.mark(&id);
            tracker.mark_deactivated(&id);
            if tracker.should_delete(&id) {
                account_items.push(WorkItem::DeleteAccount(account));
            } else {
                run.stats.skipped += 1;
                debug!(username = %account.username, "Delete deferred by grace period");
            }
        }

        let effects = self
            .run_apply_phase(&mut run, &shared, &mut reporter, &cancel, account_items, dry_run)
            .await;
        for id in &effects.disabled_ids {
            tracker.mark_deactivated(id);
        }
        for id in &effects.deleted_ids {
            tracker.mark_deleted(id);
        }
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }

        // ---- ApplyingContainers.
        run.enter_phase(SyncPhase::ApplyingContainers, "Applying container changes");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        let container_items: Vec<WorkItem> = plan
            .containers
            .to_create
            .clone()
            .into_iter()
            .map(WorkItem::CreateContainer)
            .collect();
        let container_effects = self
            .run_apply_phase(
                &mut run,
                &shared,
                &mut reporter,
                &cancel,
                container_items,
                dry_run,
            )
            .await;
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }

        // ---- ApplyingMemberships: container IDs resolve through the
        // pre-existing containers plus the ones created this run.
        run.enter_phase(SyncPhase::ApplyingMemberships, "Applying membership changes");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        let mut container_ids: HashMap<String, String> = local
            .containers
            .iter()
            .filter_map(|c| c.external_id.clone().map(|ext| (ext, c.id.clone())))
            .collect();
        for created in &container_effects.created_containers {
            if let Some(ref ext) = created.external_id {
                container_ids.insert(ext.clone(), created.id.clone());
            }
        }

        let mut membership_items: Vec<WorkItem> = Vec::new();
        for membership in plan.memberships.to_enroll.clone() {
            match container_ids.get(&membership.container_external_id) {
                Some(container_id) => membership_items.push(WorkItem::Enroll {
                    container_id: container_id.clone(),
                    membership,
                }),
                // Dry runs create no containers, so enrollments into
                // would-be containers count as applied no-ops.
                None if dry_run => membership_items.push(WorkItem::Enroll {
                    container_id: membership.container_external_id.clone(),
                    membership,
                }),
                // The container create failed earlier this run; the
                // membership fails on its own, not the phase.
                None => {
                    run.record_error(
                        "membership",
                        &format!(
                            "{}:{}",
                            membership.container_external_id, membership.username
                        ),
                        "target container not available",
                    );
                }
            }
        }
        for membership in plan.memberships.to_unenroll.clone() {
            membership_items.push(WorkItem::Unenroll(membership));
        }

        self.run_apply_phase(
            &mut run,
            &shared,
            &mut reporter,
            &cancel,
            membership_items,
            dry_run,
        )
        .await;
        if cancel.is_cancelled() {
            return self.finish_cancelled(run, reporter, &shared).await;
        }

        // ---- Finalizing.
        run.enter_phase(SyncPhase::Finalizing, "Finalizing");
        reporter.emit(&run).await;
        *shared.write().await = run.clone();

        if !dry_run {
            if let Err(e) = tracker.commit().await {
                warn!(error = %e, "Failed to persist deactivation tracker");
            }
        }

        run.complete();
        reporter.emit(&run).await;
        *shared.write().await = run.clone();
        info!(
            run_id = %run.run_id,
            created = run.stats.created,
            updated = run.stats.updated,
            disabled = run.stats.disabled,
            deleted = run.stats.deleted,
            skipped = run.stats.skipped,
            errors = run.stats.errors,
            "Sync run finished"
        );
        run
    }

    /// Fetches users, groups, and group members, and fills each user's
    /// group membership set.
    async fn fetch_remote(&self) -> ConnectorResult<RemoteSnapshot> {
        let mut users = self.provider.fetch_users().await?;
        let groups = self.provider.fetch_groups().await?;

        let mut members = HashMap::new();
        for group in &groups {
            let usernames = self.provider.fetch_group_members(&group.external_id).await?;
            members.insert(group.external_id.clone(), usernames);
        }

        let index: HashMap<String, usize> = users
            .iter()
            .enumerate()
            .map(|(i, user)| (user.username.clone(), i))
            .collect();
        for group in &groups {
            if let Some(usernames) = members.get(&group.external_id) {
                for username in usernames {
                    if let Some(&i) = index.get(username) {
                        users[i].groups.insert(group.path.clone());
                    }
                }
            }
        }

        Ok(RemoteSnapshot {
            users,
            groups,
            members,
        })
    }

    /// Classifies and formats every group once.
    fn classify_groups(
        &self,
        groups: Vec<RemoteGroup>,
        mut members: HashMap<String, Vec<String>>,
        schema: &CompiledSchema,
    ) -> Vec<ClassifiedGroup> {
        groups
            .into_iter()
            .map(|group| {
                let classification = classify(&group.path, schema);
                let container = format_container(&classification, &self.options.naming);
                let group_members = members.remove(&group.external_id).unwrap_or_default();
                debug!(
                    path = %group.path,
                    classification = ?classification,
                    "Classified group"
                );
                ClassifiedGroup {
                    group,
                    classification,
                    container,
                    members: group_members,
                }
            })
            .collect()
    }

    /// Reads the platform state needed for diffing.
    async fn load_local_state(&self) -> EngineResult<LocalState> {
        Ok(LocalState {
            accounts: self.gateway.list_accounts().await?,
            containers: self.gateway.list_containers().await?,
            memberships: self.gateway.list_memberships().await?,
        })
    }

    /// Builds the full plan from the cached snapshots.
    fn build_plan(
        &self,
        users: &[RemoteUser],
        classified: &[ClassifiedGroup],
        local: &LocalState,
    ) -> SyncPlan {
        let teacher_groups: BTreeSet<String> = classified
            .iter()
            .filter(|c| matches!(c.classification, GroupClassification::Teacher { .. }))
            .map(|c| c.group.path.clone())
            .collect();

        let accounts = diff_accounts(users, &local.accounts, &teacher_groups, &self.options);

        let wanted_containers: Vec<PlannedContainer> = classified
            .iter()
            .filter_map(|c| {
                c.container.as_ref().map(|spec| PlannedContainer {
                    group_external_id: c.group.external_id.clone(),
                    group_path: c.group.path.clone(),
                    spec: spec.clone(),
                })
            })
            .collect();
        let containers = diff_containers(&wanted_containers, &local.containers);

        let users_by_name: HashMap<&str, &RemoteUser> =
            users.iter().map(|u| (u.username.as_str(), u)).collect();
        let mut wanted_memberships = Vec::new();
        for c in classified {
            if c.container.is_none() {
                continue;
            }
            for username in &c.members {
                let Some(user) = users_by_name.get(username.as_str()) else {
                    continue;
                };
                if !should_sync_user(user, &self.options) {
                    continue;
                }
                wanted_memberships.push(PlannedMembership {
                    container_external_id: c.group.external_id.clone(),
                    username: username.clone(),
                    role: resolve_role(user, &teacher_groups, &self.options),
                });
            }
        }
        let managed_groups: BTreeSet<String> = wanted_containers
            .iter()
            .map(|c| c.group_external_id.clone())
            .collect();
        let memberships = diff_memberships(
            &wanted_memberships,
            &local.memberships,
            &local.containers,
            &managed_groups,
            &self.options,
        );

        SyncPlan {
            accounts,
            containers,
            memberships,
        }
    }

    /// Dispatches items to the bounded worker pool and aggregates their
    /// outcomes.
    ///
    /// The loop is the single writer of the run's counters and error log:
    /// workers only apply and send results. Once cancellation is observed
    /// at a progress-emission point, no further items are dispatched, but
    /// in-flight items drain so the counters stay exact.
    async fn run_apply_phase(
        &self,
        run: &mut SyncRun,
        shared: &Arc<RwLock<SyncRun>>,
        reporter: &mut ProgressReporter,
        cancel: &CancellationToken,
        items: Vec<WorkItem>,
        dry_run: bool,
    ) -> PhaseEffects {
        let total = items.len();
        let worker_count = self.options.worker_count.max(1);
        let (tx, mut rx) = mpsc::channel::<WorkOutcome>(worker_count);

        let mut queue = items.into_iter();
        let mut in_flight = 0usize;
        let mut processed = 0usize;
        let mut effects = PhaseEffects::default();
        let mut cancelled = cancel.is_cancelled();

        loop {
            while !cancelled && in_flight < worker_count {
                let Some(item) = queue.next() else { break };
                let gateway = Arc::clone(&self.gateway);
                let tx = tx.clone();
                tokio::spawn(async move {
                    let outcome = apply_work(gateway.as_ref(), item, dry_run).await;
                    let _ = tx.send(outcome).await;
                });
                in_flight += 1;
            }

            if in_flight == 0 {
                break;
            }

            let Some(outcome) = rx.recv().await else { break };
            in_flight -= 1;
            processed += 1;

            match outcome.result {
                Ok(change) => {
                    match outcome.bucket {
                        StatBucket::Created => run.stats.created += 1,
                        StatBucket::Updated => run.stats.updated += 1,
                        StatBucket::Disabled => run.stats.disabled += 1,
                        StatBucket::Deleted => run.stats.deleted += 1,
                    }
                    match change {
                        AppliedChange::ContainerCreated(Some(container)) => {
                            effects.created_containers.push(container);
                        }
                        AppliedChange::AccountDisabled {
                            external_id: Some(id),
                        } => effects.disabled_ids.push(id),
                        AppliedChange::AccountDeleted {
                            external_id: Some(id),
                        } => effects.deleted_ids.push(id),
                        _ => {}
                    }
                }
                Err(message) => {
                    warn!(
                        kind = outcome.kind,
                        item = %outcome.label,
                        error = %message,
                        "Item apply failed"
                    );
                    run.record_error(outcome.kind, &outcome.label, message);
                }
            }

            run.set_phase_progress(processed, total);
            if reporter.item_processed(run).await {
                *shared.write().await = run.clone();
                if cancel.is_cancelled() {
                    cancelled = true;
                }
            }
        }

        run.set_phase_progress(processed, total);
        *shared.write().await = run.clone();
        effects
    }

    async fn finish_failed(
        &self,
        mut run: SyncRun,
        mut reporter: ProgressReporter,
        shared: &Arc<RwLock<SyncRun>>,
        error: &(dyn std::fmt::Display + Send + Sync),
    ) -> SyncRun {
        run.fail(error);
        reporter.emit(&run).await;
        *shared.write().await = run.clone();
        run
    }

    async fn finish_cancelled(
        &self,
        mut run: SyncRun,
        mut reporter: ProgressReporter,
        shared: &Arc<RwLock<SyncRun>>,
    ) -> SyncRun {
        run.cancel();
        reporter.emit(&run).await;
        *shared.write().await = run.clone();
        run
    }
}
