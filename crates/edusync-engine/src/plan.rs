//! Sync plan: the diff between remote and local state.
//!
//! Plans are built fresh each run from the current snapshots and never
//! persisted across runs; re-running against unchanged state yields empty
//! change sets. The diff functions are pure so the dry-run preview and
//! the live run share them verbatim.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use edusync_classify::ContainerSpec;
use edusync_connector::RemoteUser;

use crate::config::SyncOptions;
use crate::gateway::{AccountRole, LocalAccount, LocalContainer, LocalMembership, NewAccount};

/// An account to be created or updated, with its resolved role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAccount {
    /// Remote snapshot backing the change.
    pub user: RemoteUser,
    /// Role the account should end up with.
    pub role: AccountRole,
}

impl PlannedAccount {
    /// Field set handed to the gateway.
    #[must_use]
    pub fn as_new_account(&self) -> NewAccount {
        NewAccount {
            external_id: self.user.external_id.clone(),
            username: self.user.username.clone(),
            email: self.user.email.clone(),
            first_name: self.user.first_name.clone(),
            last_name: self.user.last_name.clone(),
            role: self.role,
        }
    }
}

/// An update pairing a local account with its planned state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedUpdate {
    /// Platform-side account ID.
    pub account_id: String,
    /// Planned state.
    pub planned: PlannedAccount,
}

/// Account change sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountPlan {
    /// Present remotely, absent locally.
    pub to_create: Vec<PlannedAccount>,
    /// Present on both sides with differing fields.
    pub to_update: Vec<PlannedUpdate>,
    /// Enabled locally but missing remotely; only populated when
    /// `disable_missing` is on.
    pub to_disable: Vec<LocalAccount>,
    /// Already disabled locally and missing remotely; only populated when
    /// `delete_missing` is on.
    pub to_delete: Vec<LocalAccount>,
    /// Present on both sides with no differences.
    pub unchanged: u64,
    /// Excluded by filters, protection, or disabled destructive options.
    pub skipped: u64,
}

/// A container to be created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedContainer {
    /// Provider group ID (correlation key).
    pub group_external_id: String,
    /// Raw group path, for logging.
    pub group_path: String,
    /// Derived name and placement.
    pub spec: ContainerSpec,
}

/// Container change sets.
///
/// Containers are only ever created by the sync; renames and removals are
/// operator decisions on the platform side.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContainerPlan {
    /// Wanted containers with no local counterpart.
    pub to_create: Vec<PlannedContainer>,
    /// Wanted containers that already exist.
    pub unchanged: u64,
}

/// An enrollment to be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMembership {
    /// Provider group ID of the target container.
    pub container_external_id: String,
    /// Login name of the member.
    pub username: String,
    /// Role within the container.
    pub role: AccountRole,
}

/// Membership change sets.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MembershipPlan {
    /// Wanted enrollments with no matching local enrollment (including
    /// role corrections).
    pub to_enroll: Vec<PlannedMembership>,
    /// Local enrollments in managed containers with no remote backing;
    /// only populated when `unenroll_missing` is on.
    pub to_unenroll: Vec<LocalMembership>,
    /// Enrollments already in the wanted state.
    pub unchanged: u64,
}

/// The complete diff for one run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncPlan {
    /// Account change sets.
    pub accounts: AccountPlan,
    /// Container change sets.
    pub containers: ContainerPlan,
    /// Membership change sets.
    pub memberships: MembershipPlan,
}

impl SyncPlan {
    /// Condensed counts for previews and logs.
    #[must_use]
    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            accounts_to_create: self.accounts.to_create.len(),
            accounts_to_update: self.accounts.to_update.len(),
            accounts_to_disable: self.accounts.to_disable.len(),
            accounts_to_delete: self.accounts.to_delete.len(),
            containers_to_create: self.containers.to_create.len(),
            memberships_to_enroll: self.memberships.to_enroll.len(),
            memberships_to_unenroll: self.memberships.to_unenroll.len(),
            unchanged: self.accounts.unchanged
                + self.containers.unchanged
                + self.memberships.unchanged,
            skipped: self.accounts.skipped,
        }
    }

    /// Whether the plan contains no changes at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.to_create.is_empty()
            && self.accounts.to_update.is_empty()
            && self.accounts.to_disable.is_empty()
            && self.accounts.to_delete.is_empty()
            && self.containers.to_create.is_empty()
            && self.memberships.to_enroll.is_empty()
            && self.memberships.to_unenroll.is_empty()
    }
}

/// Condensed plan counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub accounts_to_create: usize,
    pub accounts_to_update: usize,
    pub accounts_to_disable: usize,
    pub accounts_to_delete: usize,
    pub containers_to_create: usize,
    pub memberships_to_enroll: usize,
    pub memberships_to_unenroll: usize,
    pub unchanged: u64,
    pub skipped: u64,
}

/// Whether a remote user passes the configured sync filters.
pub(crate) fn should_sync_user(user: &RemoteUser, options: &SyncOptions) -> bool {
    if options.ignore_users.contains(&user.username) {
        return false;
    }

    if let Some(domain) = user
        .email
        .as_deref()
        .and_then(|email| email.rsplit('@').next())
    {
        if options.ignore_email_domains.contains(domain) {
            return false;
        }
    }

    if let Some(ref attribute) = options.required_attribute {
        let Some(value) = user.attribute(attribute) else {
            return false;
        };
        if !options.required_attribute_values.is_empty()
            && !options
                .required_attribute_values
                .iter()
                .any(|allowed| allowed == value)
        {
            return false;
        }
    }

    true
}

/// Resolves the role a user should hold.
///
/// Elevated when the configured role attribute carries the configured
/// value, or when the user is a member of a staff-classified group; base
/// otherwise.
#[must_use]
pub fn resolve_role(
    user: &RemoteUser,
    teacher_groups: &BTreeSet<String>,
    options: &SyncOptions,
) -> AccountRole {
    let by_attribute = user
        .attribute(&options.teacher_attribute)
        .is_some_and(|value| value == options.teacher_attribute_value);
    let by_group = user.groups.iter().any(|g| teacher_groups.contains(g));

    if by_attribute || by_group {
        AccountRole::Elevated
    } else {
        AccountRole::Base
    }
}

/// Whether a local account differs from its planned state.
fn account_needs_update(local: &LocalAccount, planned: &PlannedAccount) -> bool {
    !local.enabled
        || local.username != planned.user.username
        || local.email != planned.user.email
        || local.first_name != planned.user.first_name
        || local.last_name != planned.user.last_name
        || local.role != planned.role
}

/// Diffs remote users against local accounts.
///
/// Correlation is by stable external ID, never by username. Local
/// accounts without a correlation ID are not managed by the sync and are
/// left alone.
#[must_use]
pub fn diff_accounts(
    remote_users: &[RemoteUser],
    local_accounts: &[LocalAccount],
    teacher_groups: &BTreeSet<String>,
    options: &SyncOptions,
) -> AccountPlan {
    let mut plan = AccountPlan::default();

    let local_by_external_id: HashMap<&str, &LocalAccount> = local_accounts
        .iter()
        .filter_map(|account| {
            account
                .external_id
                .as_deref()
                .map(|external_id| (external_id, account))
        })
        .collect();

    let mut seen = BTreeSet::new();

    for user in remote_users {
        if !should_sync_user(user, options) {
            plan.skipped += 1;
            continue;
        }
        seen.insert(user.external_id.as_str());

        let planned = PlannedAccount {
            user: user.clone(),
            role: resolve_role(user, teacher_groups, options),
        };

        match local_by_external_id.get(user.external_id.as_str()) {
            None => plan.to_create.push(planned),
            Some(local) if account_needs_update(local, &planned) => {
                plan.to_update.push(PlannedUpdate {
                    account_id: local.id.clone(),
                    planned,
                });
            }
            Some(_) => plan.unchanged += 1,
        }
    }

    for account in local_accounts {
        let Some(external_id) = account.external_id.as_deref() else {
            continue;
        };
        if seen.contains(external_id) {
            continue;
        }
        if options.protected_users.contains(&account.username) {
            plan.skipped += 1;
            continue;
        }

        if account.enabled {
            if options.disable_missing {
                plan.to_disable.push(account.clone());
            } else {
                plan.skipped += 1;
            }
        } else if options.delete_missing {
            plan.to_delete.push(account.clone());
        } else {
            plan.skipped += 1;
        }
    }

    plan
}

/// Diffs wanted containers against local containers, by group external ID.
#[must_use]
pub fn diff_containers(
    wanted: &[PlannedContainer],
    local_containers: &[LocalContainer],
) -> ContainerPlan {
    let existing: BTreeSet<&str> = local_containers
        .iter()
        .filter_map(|container| container.external_id.as_deref())
        .collect();

    let mut plan = ContainerPlan::default();
    for container in wanted {
        if existing.contains(container.group_external_id.as_str()) {
            plan.unchanged += 1;
        } else {
            plan.to_create.push(container.clone());
        }
    }
    plan
}

/// Diffs wanted enrollments against local memberships.
///
/// Local memberships are correlated to groups through their container's
/// external ID. `managed_groups` holds the external IDs of the groups
/// that produced a container this run: only memberships inside those are
/// candidates for removal; containers whose group disappeared remotely,
/// or that the sync never managed, are never touched.
#[must_use]
pub fn diff_memberships(
    wanted: &[PlannedMembership],
    local_memberships: &[LocalMembership],
    local_containers: &[LocalContainer],
    managed_groups: &BTreeSet<String>,
    options: &SyncOptions,
) -> MembershipPlan {
    let external_by_container_id: HashMap<&str, &str> = local_containers
        .iter()
        .filter_map(|container| {
            container
                .external_id
                .as_deref()
                .map(|external_id| (container.id.as_str(), external_id))
        })
        .collect();

    let mut existing: HashMap<(String, String), AccountRole> = HashMap::new();
    for membership in local_memberships {
        if let Some(external_id) = external_by_container_id.get(membership.container_id.as_str()) {
            existing.insert(
                ((*external_id).to_string(), membership.username.clone()),
                membership.role,
            );
        }
    }

    let mut plan = MembershipPlan::default();
    let mut wanted_keys = BTreeSet::new();

    for membership in wanted {
        let key = (
            membership.container_external_id.clone(),
            membership.username.clone(),
        );
        wanted_keys.insert(key.clone());

        match existing.get(&key) {
            Some(role) if *role == membership.role => plan.unchanged += 1,
            // Absent, or present with the wrong role: enroll (upsert).
            _ => plan.to_enroll.push(membership.clone()),
        }
    }

    if options.unenroll_missing {
        for membership in local_memberships {
            let Some(external_id) = external_by_container_id.get(membership.container_id.as_str())
            else {
                continue;
            };
            if !managed_groups.contains(*external_id) {
                continue;
            }
            let key = ((*external_id).to_string(), membership.username.clone());
            if !wanted_keys.contains(&key) {
                plan.to_unenroll.push(membership.clone());
            }
        }
    }

    plan
}
