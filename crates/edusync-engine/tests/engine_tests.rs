//! End-to-end engine tests against in-memory fakes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use edusync_classify::SchemaSelector;
use edusync_connector::{
    ConnectionStatus, ConnectorError, ConnectorResult, IdentityProvider, RemoteGroup, RemoteUser,
};
use edusync_engine::{
    AccountRole, GatewayError, GatewayResult, LocalAccount, LocalContainer, LocalMembership,
    LocalStateGateway, NewAccount, NewContainer, RunStatus, SyncEngine, SyncOptions, SyncRun,
    SyncService, TrackerOptions,
};

// ---------------------------------------------------------------- fakes

fn remote_user(external_id: &str, username: &str) -> RemoteUser {
    RemoteUser {
        external_id: external_id.to_string(),
        username: username.to_string(),
        email: Some(format!("{username}@example.org")),
        first_name: Some("Test".to_string()),
        last_name: Some("User".to_string()),
        enabled: true,
        groups: BTreeSet::new(),
        attributes: BTreeMap::new(),
    }
}

fn remote_group(external_id: &str, path: &str) -> RemoteGroup {
    RemoteGroup {
        external_id: external_id.to_string(),
        name: path.rsplit('/').next().unwrap_or(path).to_string(),
        path: path.to_string(),
        member_count: None,
        attributes: BTreeMap::new(),
    }
}

/// Scripted identity provider.
#[derive(Default)]
struct FakeProvider {
    users: Vec<RemoteUser>,
    groups: Vec<RemoteGroup>,
    members: HashMap<String, Vec<String>>,
    fail_fetch_users: bool,
    fetch_users_calls: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn fetch_users(&self) -> ConnectorResult<Vec<RemoteUser>> {
        self.fetch_users_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch_users {
            return Err(ConnectorError::auth("invalid client credentials"));
        }
        Ok(self.users.clone())
    }

    async fn fetch_groups(&self) -> ConnectorResult<Vec<RemoteGroup>> {
        Ok(self.groups.clone())
    }

    async fn fetch_group_members(&self, group_id: &str) -> ConnectorResult<Vec<String>> {
        Ok(self.members.get(group_id).cloned().unwrap_or_default())
    }

    async fn count_users(&self) -> ConnectorResult<u32> {
        Ok(self.users.len() as u32)
    }

    async fn test_connection(&self) -> ConnectorResult<ConnectionStatus> {
        Ok(ConnectionStatus {
            ok: true,
            detail: "fake".to_string(),
        })
    }
}

#[derive(Default)]
struct GatewayState {
    accounts: Vec<LocalAccount>,
    containers: Vec<LocalContainer>,
    memberships: Vec<LocalMembership>,
    next_id: u64,
    writes: u64,
}

/// In-memory gateway with scriptable failures and an optional gate that
/// throttles account creation for cancellation tests.
#[derive(Default)]
struct FakeGateway {
    state: Mutex<GatewayState>,
    fail_create_for: BTreeSet<String>,
    create_gate: Option<Arc<Semaphore>>,
}

impl FakeGateway {
    fn seeded(accounts: Vec<LocalAccount>, containers: Vec<LocalContainer>) -> Self {
        Self {
            state: Mutex::new(GatewayState {
                accounts,
                containers,
                ..GatewayState::default()
            }),
            ..Self::default()
        }
    }

    fn writes(&self) -> u64 {
        self.state.lock().unwrap().writes
    }

    fn accounts(&self) -> Vec<LocalAccount> {
        self.state.lock().unwrap().accounts.clone()
    }

    fn containers(&self) -> Vec<LocalContainer> {
        self.state.lock().unwrap().containers.clone()
    }

    fn memberships(&self) -> Vec<LocalMembership> {
        self.state.lock().unwrap().memberships.clone()
    }
}

#[async_trait]
impl LocalStateGateway for FakeGateway {
    async fn list_accounts(&self) -> GatewayResult<Vec<LocalAccount>> {
        Ok(self.accounts())
    }

    async fn create_account(&self, account: &NewAccount) -> GatewayResult<LocalAccount> {
        if let Some(ref gate) = self.create_gate {
            let permit = gate.acquire().await.map_err(|_| {
                GatewayError::unavailable("gate closed")
            })?;
            permit.forget();
        }
        if self.fail_create_for.contains(&account.username) {
            return Err(GatewayError::rejected(format!(
                "creation refused for {}",
                account.username
            )));
        }

        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.writes += 1;
        let stored = LocalAccount {
            id: format!("acc-{}", state.next_id),
            external_id: Some(account.external_id.clone()),
            username: account.username.clone(),
            email: account.email.clone(),
            first_name: account.first_name.clone(),
            last_name: account.last_name.clone(),
            enabled: true,
            role: account.role,
        };
        state.accounts.push(stored.clone());
        Ok(stored)
    }

    async fn update_account(&self, id: &str, account: &NewAccount) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let existing = state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| GatewayError::rejected(format!("no account {id}")))?;
        existing.username = account.username.clone();
        existing.email = account.email.clone();
        existing.first_name = account.first_name.clone();
        existing.last_name = account.last_name.clone();
        existing.role = account.role;
        existing.enabled = true;
        Ok(())
    }

    async fn disable_account(&self, id: &str) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        let existing = state
            .accounts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| GatewayError::rejected(format!("no account {id}")))?;
        existing.enabled = false;
        Ok(())
    }

    async fn delete_account(&self, id: &str) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state.accounts.retain(|a| a.id != id);
        Ok(())
    }

    async fn list_containers(&self) -> GatewayResult<Vec<LocalContainer>> {
        Ok(self.containers())
    }

    async fn create_container(&self, container: &NewContainer) -> GatewayResult<LocalContainer> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.writes += 1;
        let stored = LocalContainer {
            id: format!("cat-{}", state.next_id),
            external_id: Some(container.external_id.clone()),
            display_name: container.display_name.clone(),
            parent_path: container.parent_path.clone(),
        };
        state.containers.push(stored.clone());
        Ok(stored)
    }

    async fn list_memberships(&self) -> GatewayResult<Vec<LocalMembership>> {
        Ok(self.memberships())
    }

    async fn enroll(
        &self,
        container_id: &str,
        username: &str,
        role: AccountRole,
    ) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state
            .memberships
            .retain(|m| !(m.container_id == container_id && m.username == username));
        state.memberships.push(LocalMembership {
            container_id: container_id.to_string(),
            username: username.to_string(),
            role,
        });
        Ok(())
    }

    async fn unenroll(&self, container_id: &str, username: &str) -> GatewayResult<()> {
        let mut state = self.state.lock().unwrap();
        state.writes += 1;
        state
            .memberships
            .retain(|m| !(m.container_id == container_id && m.username == username));
        Ok(())
    }
}

// ------------------------------------------------------------- helpers

/// A small school directory: two students, one teacher, one class group,
/// one project group, one staff group, one unclassifiable group.
fn school_provider() -> FakeProvider {
    let mut teacher = remote_user("u-3", "m.weber");
    teacher
        .attributes
        .insert("role".to_string(), vec!["teacher".to_string()]);

    FakeProvider {
        users: vec![
            remote_user("u-1", "anna"),
            remote_user("u-2", "ben"),
            teacher,
        ],
        groups: vec![
            remote_group("g-10a", "/10a"),
            remote_group("g-teachers", "/teachers"),
            remote_group("g-bio", "/p_biologie"),
            remote_group("g-staff", "/staff-all"),
        ],
        members: HashMap::from([
            (
                "g-10a".to_string(),
                vec!["anna".to_string(), "ben".to_string(), "m.weber".to_string()],
            ),
            ("g-teachers".to_string(), vec!["m.weber".to_string()]),
            ("g-bio".to_string(), vec!["anna".to_string()]),
            ("g-staff".to_string(), vec!["anna".to_string()]),
        ]),
        ..FakeProvider::default()
    }
}

async fn run_engine(engine: &SyncEngine, dry_run: bool) -> SyncRun {
    let run_id = Uuid::new_v4();
    let shared = Arc::new(RwLock::new(SyncRun::new(run_id, dry_run)));
    engine
        .execute(run_id, dry_run, CancellationToken::new(), shared, None)
        .await
}

async fn wait_for_terminal(service: &SyncService, run_id: Uuid) -> SyncRun {
    for _ in 0..500 {
        let snapshot = service.get_status(run_id).await.unwrap();
        if snapshot.status.is_terminal() {
            return snapshot;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("run {run_id} did not reach a terminal status");
}

// --------------------------------------------------------------- tests

#[tokio::test]
async fn test_full_run_creates_accounts_containers_and_memberships() {
    let provider = Arc::new(school_provider());
    let gateway = Arc::new(FakeGateway::default());
    let engine = SyncEngine::new(provider, gateway.clone(), SyncOptions::default());

    let run = run_engine(&engine, false).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stats.errors, 0);

    // Three accounts, the teacher with the elevated role.
    let accounts = gateway.accounts();
    assert_eq!(accounts.len(), 3);
    let weber = accounts.iter().find(|a| a.username == "m.weber").unwrap();
    assert_eq!(weber.role, AccountRole::Elevated);
    let anna = accounts.iter().find(|a| a.username == "anna").unwrap();
    assert_eq!(anna.role, AccountRole::Base);

    // Two containers: the class and the project. The staff group is
    // unknown and the teacher group never becomes a container.
    let containers = gateway.containers();
    assert_eq!(containers.len(), 2);
    let class = containers
        .iter()
        .find(|c| c.external_id.as_deref() == Some("g-10a"))
        .unwrap();
    assert_eq!(class.display_name, "Klasse 10A");
    assert_eq!(class.parent_path, "/Classes/10");
    let project = containers
        .iter()
        .find(|c| c.external_id.as_deref() == Some("g-bio"))
        .unwrap();
    assert_eq!(project.display_name, "Projekt: Biologie");
    assert_eq!(project.parent_path, "/Projects");

    // Enrollments: 10a gets anna, ben, and m.weber (elevated); the
    // project gets anna. Nothing is enrolled into the unknown group.
    let memberships = gateway.memberships();
    assert_eq!(memberships.len(), 4);
    let weber_in_class = memberships
        .iter()
        .find(|m| m.container_id == class.id && m.username == "m.weber")
        .unwrap();
    assert_eq!(weber_in_class.role, AccountRole::Elevated);
    assert!(memberships
        .iter()
        .all(|m| m.container_id == class.id || m.container_id == project.id));

    // 3 accounts + 2 containers + 4 enrollments.
    assert_eq!(run.stats.created, 9);
}

#[tokio::test]
async fn test_rerun_without_remote_changes_is_idempotent() {
    let provider = Arc::new(school_provider());
    let gateway = Arc::new(FakeGateway::default());
    let engine = SyncEngine::new(provider, gateway.clone(), SyncOptions::default());

    let first = run_engine(&engine, false).await;
    assert_eq!(first.status, RunStatus::Completed);
    let writes_after_first = gateway.writes();

    // The preview against the converged state is empty...
    let plan = engine.preview().await.unwrap();
    assert!(plan.is_empty());

    // ...and a live re-run changes nothing.
    let second = run_engine(&engine, false).await;
    assert_eq!(second.status, RunStatus::Completed);
    assert_eq!(second.stats.created, 0);
    assert_eq!(second.stats.updated, 0);
    assert_eq!(second.stats.disabled, 0);
    assert_eq!(second.stats.deleted, 0);
    assert_eq!(gateway.writes(), writes_after_first);
}

#[tokio::test]
async fn test_dry_run_counts_match_live_run_and_write_nothing() {
    let provider = Arc::new(school_provider());

    let dry_gateway = Arc::new(FakeGateway::default());
    let dry_engine = SyncEngine::new(provider, dry_gateway.clone(), SyncOptions::default());
    let dry = run_engine(&dry_engine, true).await;

    assert_eq!(dry.status, RunStatus::Completed);
    assert!(dry.dry_run);
    assert_eq!(dry_gateway.writes(), 0, "dry-run must not touch the gateway");

    // The live run over the same snapshot produces identical counts.
    let live_gateway = Arc::new(FakeGateway::default());
    let live_engine = SyncEngine::new(
        Arc::new(school_provider()),
        live_gateway.clone(),
        SyncOptions::default(),
    );
    let live = run_engine(&live_engine, false).await;

    assert_eq!(dry.stats.created, live.stats.created);
    assert_eq!(dry.stats.updated, live.stats.updated);
    assert_eq!(dry.stats.errors, live.stats.errors);
}

#[tokio::test]
async fn test_item_failure_does_not_affect_other_items() {
    let provider = Arc::new(school_provider());
    let gateway = Arc::new(FakeGateway {
        fail_create_for: BTreeSet::from(["ben".to_string()]),
        ..FakeGateway::default()
    });
    let engine = SyncEngine::new(provider, gateway.clone(), SyncOptions::default());

    let run = run_engine(&engine, false).await;

    // The run completes; the one failure is accumulated, every other
    // account and all containers still apply.
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stats.errors, 1);
    assert_eq!(run.errors.len(), 1);
    assert_eq!(run.errors[0].item, "ben");
    assert_eq!(run.errors[0].kind, "account");

    let accounts = gateway.accounts();
    assert_eq!(accounts.len(), 2);
    assert!(accounts.iter().any(|a| a.username == "anna"));
    assert_eq!(gateway.containers().len(), 2);
}

#[tokio::test]
async fn test_fetch_failure_fails_the_run_without_applying() {
    let provider = Arc::new(FakeProvider {
        fail_fetch_users: true,
        ..FakeProvider::default()
    });
    let gateway = Arc::new(FakeGateway::default());
    let engine = SyncEngine::new(provider, gateway.clone(), SyncOptions::default());

    let run = run_engine(&engine, false).await;

    assert_eq!(run.status, RunStatus::Failed);
    assert!(run.message.contains("Authentication"));
    assert_eq!(gateway.writes(), 0);
}

#[tokio::test]
async fn test_malformed_custom_schema_refuses_to_start() {
    let provider = Arc::new(school_provider());
    let gateway = Arc::new(FakeGateway::default());
    let options = SyncOptions {
        schema: SchemaSelector::Custom("{ this is not a schema".to_string()),
        ..SyncOptions::default()
    };
    let engine = SyncEngine::new(provider.clone(), gateway.clone(), options);

    let run = run_engine(&engine, false).await;

    assert_eq!(run.status, RunStatus::Failed);
    // Fail-fast: the provider was never contacted and nothing was applied.
    assert_eq!(provider.fetch_users_calls.load(Ordering::SeqCst), 0);
    assert_eq!(gateway.writes(), 0);
}

#[tokio::test]
async fn test_missing_account_disable_and_delete_gating() {
    let gone = LocalAccount {
        id: "acc-1".to_string(),
        external_id: Some("u-gone".to_string()),
        username: "left.school".to_string(),
        email: None,
        first_name: None,
        last_name: None,
        enabled: true,
        role: AccountRole::Base,
    };

    // Fail-safe default: nothing happens to the missing account.
    let gateway = Arc::new(FakeGateway::seeded(vec![gone.clone()], vec![]));
    let engine = SyncEngine::new(
        Arc::new(FakeProvider::default()),
        gateway.clone(),
        SyncOptions::default(),
    );
    let run = run_engine(&engine, false).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert!(gateway.accounts()[0].enabled);

    // disable_missing disables it.
    let gateway = Arc::new(FakeGateway::seeded(vec![gone.clone()], vec![]));
    let options = SyncOptions {
        disable_missing: true,
        ..SyncOptions::default()
    };
    let engine = SyncEngine::new(Arc::new(FakeProvider::default()), gateway.clone(), options);
    let run = run_engine(&engine, false).await;
    assert_eq!(run.stats.disabled, 1);
    assert!(!gateway.accounts()[0].enabled);

    // delete_missing with a zero grace period removes an already
    // disabled account.
    let mut disabled = gone;
    disabled.enabled = false;
    let gateway = Arc::new(FakeGateway::seeded(vec![disabled], vec![]));
    let options = SyncOptions {
        delete_missing: true,
        tracker: TrackerOptions {
            mark_count_threshold: 1,
            grace_period_secs: 0,
        },
        ..SyncOptions::default()
    };
    let engine = SyncEngine::new(Arc::new(FakeProvider::default()), gateway.clone(), options);
    let run = run_engine(&engine, false).await;
    assert_eq!(run.stats.deleted, 1);
    assert!(gateway.accounts().is_empty());
}

#[tokio::test]
async fn test_tracker_threshold_defers_disable_across_runs() {
    let state_dir = tempfile::tempdir().unwrap();
    let gone = LocalAccount {
        id: "acc-1".to_string(),
        external_id: Some("u-gone".to_string()),
        username: "left.school".to_string(),
        email: None,
        first_name: None,
        last_name: None,
        enabled: true,
        role: AccountRole::Base,
    };
    let gateway = Arc::new(FakeGateway::seeded(vec![gone], vec![]));
    let options = SyncOptions {
        disable_missing: true,
        tracker: TrackerOptions {
            mark_count_threshold: 2,
            grace_period_secs: 0,
        },
        state_dir: Some(state_dir.path().to_path_buf()),
        ..SyncOptions::default()
    };
    let engine = SyncEngine::new(Arc::new(FakeProvider::default()), gateway.clone(), options);

    // First absence only marks.
    let first = run_engine(&engine, false).await;
    assert_eq!(first.stats.disabled, 0);
    assert!(gateway.accounts()[0].enabled);

    // Second consecutive absence crosses the threshold.
    let second = run_engine(&engine, false).await;
    assert_eq!(second.stats.disabled, 1);
    assert!(!gateway.accounts()[0].enabled);
}

#[tokio::test]
async fn test_protected_account_survives_destructive_options() {
    let admin = LocalAccount {
        id: "acc-1".to_string(),
        external_id: Some("u-admin".to_string()),
        username: "admin.anna".to_string(),
        email: None,
        first_name: None,
        last_name: None,
        enabled: true,
        role: AccountRole::Elevated,
    };
    let gateway = Arc::new(FakeGateway::seeded(vec![admin], vec![]));
    let options = SyncOptions {
        disable_missing: true,
        delete_missing: true,
        protected_users: BTreeSet::from(["admin.anna".to_string()]),
        tracker: TrackerOptions {
            mark_count_threshold: 1,
            grace_period_secs: 0,
        },
        ..SyncOptions::default()
    };
    let engine = SyncEngine::new(Arc::new(FakeProvider::default()), gateway.clone(), options);

    let run = run_engine(&engine, false).await;

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stats.disabled, 0);
    assert_eq!(run.stats.deleted, 0);
    assert!(gateway.accounts()[0].enabled);
}

#[tokio::test]
async fn test_unenroll_missing_is_gated() {
    // A container exists with a stale membership; the remote group still
    // exists but the member left it.
    let container = LocalContainer {
        id: "cat-1".to_string(),
        external_id: Some("g-10a".to_string()),
        display_name: "Klasse 10A".to_string(),
        parent_path: "/Classes/10".to_string(),
    };
    let stale = LocalMembership {
        container_id: "cat-1".to_string(),
        username: "anna".to_string(),
        role: AccountRole::Base,
    };

    let provider = || {
        Arc::new(FakeProvider {
            users: vec![remote_user("u-1", "anna")],
            groups: vec![remote_group("g-10a", "/10a")],
            members: HashMap::from([("g-10a".to_string(), vec![])]),
            ..FakeProvider::default()
        })
    };
    let seeded = || {
        let gateway = FakeGateway::seeded(
            vec![LocalAccount {
                id: "acc-1".to_string(),
                external_id: Some("u-1".to_string()),
                username: "anna".to_string(),
                email: Some("anna@example.org".to_string()),
                first_name: Some("Test".to_string()),
                last_name: Some("User".to_string()),
                enabled: true,
                role: AccountRole::Base,
            }],
            vec![container.clone()],
        );
        gateway.state.lock().unwrap().memberships.push(stale.clone());
        Arc::new(gateway)
    };

    // Default: the stale enrollment stays.
    let gateway = seeded();
    let engine = SyncEngine::new(provider(), gateway.clone(), SyncOptions::default());
    let run = run_engine(&engine, false).await;
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(gateway.memberships().len(), 1);

    // With unenroll_missing the stale enrollment is removed.
    let gateway = seeded();
    let options = SyncOptions {
        unenroll_missing: true,
        ..SyncOptions::default()
    };
    let engine = SyncEngine::new(provider(), gateway.clone(), options);
    let run = run_engine(&engine, false).await;
    assert_eq!(run.stats.deleted, 1);
    assert!(gateway.memberships().is_empty());
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let gate = Arc::new(Semaphore::new(0));
    let mut users = Vec::new();
    let mut members = Vec::new();
    for i in 0..10 {
        users.push(remote_user(&format!("u-{i}"), &format!("user{i}")));
        members.push(format!("user{i}"));
    }
    let provider = Arc::new(FakeProvider {
        users,
        groups: vec![remote_group("g-10a", "/10a")],
        members: HashMap::from([("g-10a".to_string(), members)]),
        ..FakeProvider::default()
    });
    let gateway = Arc::new(FakeGateway {
        create_gate: Some(gate.clone()),
        ..FakeGateway::default()
    });
    let service = SyncService::new(provider, gateway, SyncOptions::default());

    let run_id = service.start_sync(false).await.unwrap();

    // While the first run is blocked in ApplyingAccounts, a second start
    // must be rejected, not queued.
    let second = service.start_sync(false).await;
    assert!(matches!(
        second,
        Err(edusync_engine::EngineError::AlreadyRunning { .. })
    ));

    // Unblock and let the run finish; afterwards a new run may start.
    gate.add_permits(1000);
    let finished = wait_for_terminal(&service, run_id).await;
    assert_eq!(finished.status, RunStatus::Completed);

    let next = service.start_sync(false).await.unwrap();
    gate.add_permits(1000);
    wait_for_terminal(&service, next).await;
}

#[tokio::test]
async fn test_cancellation_mid_accounts_skips_later_phases() {
    let gate = Arc::new(Semaphore::new(0));
    let mut users = Vec::new();
    let mut members = Vec::new();
    for i in 0..10 {
        users.push(remote_user(&format!("u-{i}"), &format!("user{i}")));
        members.push(format!("user{i}"));
    }
    let provider = Arc::new(FakeProvider {
        users,
        groups: vec![remote_group("g-10a", "/10a")],
        members: HashMap::from([("g-10a".to_string(), members)]),
        ..FakeProvider::default()
    });
    let gateway = Arc::new(FakeGateway {
        create_gate: Some(gate.clone()),
        ..FakeGateway::default()
    });
    let options = SyncOptions {
        worker_count: 1,
        progress_interval: 1,
        ..SyncOptions::default()
    };
    let service = SyncService::new(provider, gateway.clone(), options);

    let run_id = service.start_sync(false).await.unwrap();

    // Let exactly three account creations through, then cancel.
    gate.add_permits(3);
    for _ in 0..500 {
        if service.get_status(run_id).await.unwrap().stats.created >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    service.cancel_sync(run_id).await.unwrap();
    // Release anything still in flight so the run can drain.
    gate.add_permits(1000);

    let run = wait_for_terminal(&service, run_id).await;

    assert_eq!(run.status, RunStatus::Cancelled);
    // Stats reflect exactly the accounts processed before cancellation
    // took effect (the three permitted plus at most one in flight).
    assert!(run.stats.created >= 3 && run.stats.created < 10);
    assert_eq!(run.stats.created, gateway.accounts().len() as u64);
    // Later phases never ran.
    assert!(gateway.containers().is_empty());
    assert!(gateway.memberships().is_empty());

    // Cancelling a terminal run is rejected.
    assert!(matches!(
        service.cancel_sync(run_id).await,
        Err(edusync_engine::EngineError::NotCancellable { .. })
    ));
}

#[tokio::test]
async fn test_status_of_unknown_run_is_an_error() {
    let service = SyncService::new(
        Arc::new(FakeProvider::default()),
        Arc::new(FakeGateway::default()),
        SyncOptions::default(),
    );

    let missing = Uuid::new_v4();
    assert!(matches!(
        service.get_status(missing).await,
        Err(edusync_engine::EngineError::RunNotFound { .. })
    ));
    assert!(matches!(
        service.cancel_sync(missing).await,
        Err(edusync_engine::EngineError::RunNotFound { .. })
    ));
}

#[tokio::test]
async fn test_service_preview_reports_plan_summary() {
    let service = SyncService::new(
        Arc::new(school_provider()),
        Arc::new(FakeGateway::default()),
        SyncOptions::default(),
    );

    let plan = service.preview().await.unwrap();
    let summary = plan.summary();

    assert_eq!(summary.accounts_to_create, 3);
    assert_eq!(summary.containers_to_create, 2);
    assert_eq!(summary.memberships_to_enroll, 4);
    assert_eq!(summary.memberships_to_unenroll, 0);
}
