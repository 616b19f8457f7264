//! Convergence-plan computation.
//!
//! Pure functions over a snapshot of the inventory and the active session
//! set. The plan invariant: an interface id appears in at most one of the
//! create-set and delete-set, and an eligible interface that already holds
//! a session appears in neither.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::debug;

use tapsync_core::{ConvergencePlan, Instance, MirrorSession, MonitoredEndpoint, ReconcilerConfig};

/// Tag keys the reconciler manages itself; stripped from instance tags
/// before re-stamping so a session is never tagged twice.
const MANAGED_TAG_KEYS: &[&str] = &["instanceId"];

/// Why a running instance contributes nothing to the create-set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Mirror tag absent or carries a non-enabled value.
    NotOptedIn,
    /// Instance-type family is not mirror-capable.
    UnsupportedType,
    /// Instance's interfaces all lie outside the configured network scope.
    OutOfScope,
}

/// Compute the minimal create/delete sets that converge the active session
/// set onto the desired state.
///
/// `instances` is the full inventory snapshot across every lifecycle state;
/// `sessions` is every active session for this target+filter. A session
/// whose interface does not belong to an eligible running instance is
/// always torn down, whether the instance stopped, terminated, dropped its
/// mirror tag, or vanished from the inventory entirely.
pub fn compute_plan(
    config: &ReconcilerConfig,
    instances: &[Instance],
    sessions: &[MirrorSession],
) -> ConvergencePlan {
    let by_interface: HashMap<&str, &MirrorSession> = sessions
        .iter()
        .map(|s| (s.interface_id.as_str(), s))
        .collect();

    // Desired pass: running-family instances are evaluated for eligibility.
    let mut desired: Vec<MonitoredEndpoint> = Vec::new();
    for instance in instances.iter().filter(|i| i.state.is_running_family()) {
        if let Some(reason) = skip_reason(config, instance) {
            debug!(
                instance_id = %instance.instance_id,
                instance_type = %instance.instance_type,
                ?reason,
                "Instance skipped"
            );
            continue;
        }

        let tags = session_tags(config, instance);
        let instance_name = instance.tags.get("Name").cloned();

        for interface in &instance.interfaces {
            if !in_scope(config, &interface.network_id) {
                continue;
            }
            desired.push(MonitoredEndpoint {
                interface_id: interface.interface_id.clone(),
                instance_id: instance.instance_id.clone(),
                instance_type: instance.instance_type.clone(),
                instance_name: instance_name.clone(),
                mac_address: interface.mac_address.clone(),
                device_index: interface.device_index,
                owner_account: interface.owner_account.clone(),
                network_id: interface.network_id.clone(),
                session_tags: tags.clone(),
            });
        }
    }

    let desired_interfaces: HashSet<&str> =
        desired.iter().map(|e| e.interface_id.as_str()).collect();

    let mut plan = ConvergencePlan::default();

    // Tear-down pass: every session whose interface is no longer desired is
    // slated for deletion. This covers stopped, terminated and untagged
    // instances alike, including instances the inventory no longer lists.
    for session in sessions {
        if !desired_interfaces.contains(session.interface_id.as_str()) {
            debug!(
                interface_id = %session.interface_id,
                session_id = %session.session_id,
                "Interface no longer eligible, session slated for deletion"
            );
            plan.delete.push(session.clone());
        }
    }

    plan.create = desired
        .into_iter()
        .filter(|e| !by_interface.contains_key(e.interface_id.as_str()))
        .collect();

    plan
}

/// Eligibility check for a running-family instance. Returns the reason it
/// is skipped, or `None` when it belongs to the desired set.
#[must_use]
pub fn skip_reason(config: &ReconcilerConfig, instance: &Instance) -> Option<SkipReason> {
    let opted_in = instance
        .tags
        .get(&config.mirror_tag_key)
        .is_some_and(|value| config.tag_value_enabled(value));
    if !opted_in {
        return Some(SkipReason::NotOptedIn);
    }

    if !config.family_supported(instance.instance_family()) {
        return Some(SkipReason::UnsupportedType);
    }

    if !instance
        .interfaces
        .iter()
        .any(|i| in_scope(config, &i.network_id))
    {
        return Some(SkipReason::OutOfScope);
    }

    None
}

fn in_scope(config: &ReconcilerConfig, network_id: &str) -> bool {
    config
        .network_id
        .as_deref()
        .is_none_or(|scope| scope == network_id)
}

/// Build the tag set for a new session: the instance's own tags minus
/// provider-reserved and reconciler-managed keys, plus the instanceId
/// marker and the fixed organizational tags.
#[must_use]
pub fn session_tags(config: &ReconcilerConfig, instance: &Instance) -> BTreeMap<String, String> {
    let mut tags: BTreeMap<String, String> = instance
        .tags
        .iter()
        .filter(|(key, _)| {
            !key.starts_with(&config.reserved_tag_prefix)
                && !MANAGED_TAG_KEYS.contains(&key.as_str())
        })
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    tags.insert("instanceId".to_string(), instance.instance_id.clone());
    tags.extend(config.org_tags.clone());
    tags
}

/// Lowest session number ≥ 1 not already occupied on an interface.
///
/// Guarantees per-interface uniqueness without any cross-run state: the
/// occupied set is rebuilt from the live session listing each run.
#[must_use]
pub fn next_session_number(occupied: &HashSet<u32>) -> u32 {
    let mut number = 1;
    while occupied.contains(&number) {
        number += 1;
    }
    number
}

/// Occupied session numbers per interface, from the live session listing.
#[must_use]
pub fn occupied_session_numbers(sessions: &[MirrorSession]) -> HashMap<String, HashSet<u32>> {
    let mut occupied: HashMap<String, HashSet<u32>> = HashMap::new();
    for session in sessions {
        occupied
            .entry(session.interface_id.clone())
            .or_default()
            .insert(session.session_number);
    }
    occupied
}

#[cfg(test)]
mod tests {
    use super::*;
    use tapsync_core::{InstanceState, NetworkInterface};

    fn config() -> ReconcilerConfig {
        ReconcilerConfig::new("tmt-1", "tmf-1", "us-east-1")
    }

    fn interface(id: &str, mac: &str) -> NetworkInterface {
        NetworkInterface {
            interface_id: id.to_string(),
            mac_address: mac.to_string(),
            device_index: 0,
            owner_account: "123456789012".to_string(),
            network_id: "vpc-1".to_string(),
        }
    }

    fn tagged_instance(id: &str, state: InstanceState, interfaces: Vec<NetworkInterface>) -> Instance {
        let mut tags = BTreeMap::new();
        tags.insert("TrafficMirror".to_string(), "enabled".to_string());
        tags.insert("Name".to_string(), format!("host-{id}"));
        Instance {
            instance_id: id.to_string(),
            instance_type: "m5.large".to_string(),
            state,
            tags,
            interfaces,
        }
    }

    fn session(id: &str, interface_id: &str, number: u32) -> MirrorSession {
        MirrorSession {
            session_id: id.to_string(),
            interface_id: interface_id.to_string(),
            target_id: "tmt-1".to_string(),
            filter_id: "tmf-1".to_string(),
            session_number: number,
            tags: BTreeMap::new(),
        }
    }

    #[test]
    fn eligible_unmirrored_interface_is_created() {
        let instances = vec![tagged_instance(
            "i-1",
            InstanceState::Running,
            vec![interface("eni-1", "aa:bb:cc:dd:ee:ff")],
        )];

        let plan = compute_plan(&config(), &instances, &[]);

        assert_eq!(plan.create.len(), 1);
        assert!(plan.delete.is_empty());
        assert_eq!(plan.create[0].interface_id, "eni-1");
        assert_eq!(plan.create[0].mac_address, "aa:bb:cc:dd:ee:ff");
    }

    #[test]
    fn converged_interface_is_a_noop() {
        let instances = vec![tagged_instance(
            "i-1",
            InstanceState::Running,
            vec![interface("eni-1", "aa:bb:cc:dd:ee:ff")],
        )];
        let sessions = vec![session("tms-1", "eni-1", 1)];

        let plan = compute_plan(&config(), &instances, &sessions);

        assert!(plan.is_converged());
    }

    #[test]
    fn stopped_instance_session_deleted_regardless_of_tags() {
        // Still tagged for mirroring, but stopping: tear-down wins.
        let instances = vec![tagged_instance(
            "i-2",
            InstanceState::Stopping,
            vec![interface("eni-2", "11:22:33:44:55:66")],
        )];
        let sessions = vec![session("tms-2", "eni-2", 1)];

        let plan = compute_plan(&config(), &instances, &sessions);

        assert!(plan.create.is_empty());
        assert_eq!(plan.delete.len(), 1);
        assert_eq!(plan.delete[0].session_id, "tms-2");
    }

    #[test]
    fn stopped_instance_without_session_is_a_noop() {
        let instances = vec![tagged_instance(
            "i-2",
            InstanceState::Stopped,
            vec![interface("eni-2", "11:22:33:44:55:66")],
        )];

        let plan = compute_plan(&config(), &instances, &[]);

        assert!(plan.is_converged());
    }

    #[test]
    fn untagged_running_instance_loses_its_session() {
        // Opt-out while running: the session must not outlive the tag.
        let mut instance = tagged_instance(
            "i-2",
            InstanceState::Running,
            vec![interface("eni-2", "11:22:33:44:55:66")],
        );
        instance.tags.remove("TrafficMirror");
        let sessions = vec![session("tms-2", "eni-2", 1)];

        let plan = compute_plan(&config(), &[instance], &sessions);

        assert!(plan.create.is_empty());
        assert_eq!(plan.delete.len(), 1);
        assert_eq!(plan.delete[0].session_id, "tms-2");
    }

    #[test]
    fn disabled_tag_value_loses_its_session() {
        let mut instance = tagged_instance(
            "i-2",
            InstanceState::Running,
            vec![interface("eni-2", "11:22:33:44:55:66")],
        );
        instance
            .tags
            .insert("TrafficMirror".to_string(), "disabled".to_string());
        let sessions = vec![session("tms-2", "eni-2", 1)];

        let plan = compute_plan(&config(), &[instance], &sessions);

        assert_eq!(plan.delete.len(), 1);
    }

    #[test]
    fn session_without_a_listed_instance_is_deleted() {
        // The interface's instance is gone from the inventory altogether.
        let sessions = vec![session("tms-9", "eni-9", 1)];

        let plan = compute_plan(&config(), &[], &sessions);

        assert!(plan.create.is_empty());
        assert_eq!(plan.delete.len(), 1);
        assert_eq!(plan.delete[0].interface_id, "eni-9");
    }

    #[test]
    fn terminated_instance_session_is_deleted() {
        let instances = vec![tagged_instance(
            "i-2",
            InstanceState::Terminated,
            vec![interface("eni-2", "11:22:33:44:55:66")],
        )];
        let sessions = vec![session("tms-2", "eni-2", 1)];

        let plan = compute_plan(&config(), &instances, &sessions);

        assert_eq!(plan.delete.len(), 1);
    }

    #[test]
    fn untagged_instance_is_skipped() {
        let mut instance = tagged_instance(
            "i-3",
            InstanceState::Running,
            vec![interface("eni-3", "aa:aa:aa:aa:aa:aa")],
        );
        instance.tags.remove("TrafficMirror");

        assert_eq!(skip_reason(&config(), &instance), Some(SkipReason::NotOptedIn));
        let plan = compute_plan(&config(), &[instance], &[]);
        assert!(plan.is_converged());
    }

    #[test]
    fn disabled_tag_value_is_skipped() {
        let mut instance = tagged_instance(
            "i-3",
            InstanceState::Running,
            vec![interface("eni-3", "aa:aa:aa:aa:aa:aa")],
        );
        instance
            .tags
            .insert("TrafficMirror".to_string(), "disabled".to_string());

        assert_eq!(skip_reason(&config(), &instance), Some(SkipReason::NotOptedIn));
    }

    #[test]
    fn unsupported_family_is_skipped() {
        let mut instance = tagged_instance(
            "i-4",
            InstanceState::Running,
            vec![interface("eni-4", "aa:aa:aa:aa:aa:ab")],
        );
        instance.instance_type = "t2.micro".to_string();

        assert_eq!(
            skip_reason(&config(), &instance),
            Some(SkipReason::UnsupportedType)
        );
        let plan = compute_plan(&config(), &[instance], &[]);
        assert!(plan.is_converged());
    }

    #[test]
    fn network_scope_excludes_foreign_interfaces() {
        let mut config = config();
        config.network_id = Some("vpc-2".to_string());

        let instance = tagged_instance(
            "i-5",
            InstanceState::Running,
            vec![interface("eni-5", "aa:aa:aa:aa:aa:ac")],
        );

        assert_eq!(skip_reason(&config, &instance), Some(SkipReason::OutOfScope));
    }

    #[test]
    fn create_and_delete_sets_are_disjoint() {
        // One instance running, one stopping, plus a converged one.
        let running = tagged_instance(
            "i-1",
            InstanceState::Running,
            vec![interface("eni-1", "aa:bb:cc:00:00:01")],
        );
        let stopping = tagged_instance(
            "i-2",
            InstanceState::ShuttingDown,
            vec![interface("eni-2", "aa:bb:cc:00:00:02")],
        );
        let converged = tagged_instance(
            "i-3",
            InstanceState::Running,
            vec![interface("eni-3", "aa:bb:cc:00:00:03")],
        );
        let sessions = vec![session("tms-2", "eni-2", 1), session("tms-3", "eni-3", 1)];

        let plan = compute_plan(&config(), &[running, stopping, converged], &sessions);

        let created: HashSet<_> = plan.create.iter().map(|e| e.interface_id.clone()).collect();
        let deleted: HashSet<_> = plan.delete.iter().map(|s| s.interface_id.clone()).collect();
        assert!(created.is_disjoint(&deleted));
        assert_eq!(created.len(), 1);
        assert_eq!(deleted.len(), 1);
    }

    #[test]
    fn all_interfaces_of_an_instance_are_mirrored() {
        let instance = tagged_instance(
            "i-6",
            InstanceState::Running,
            vec![
                interface("eni-6a", "aa:bb:cc:00:00:06"),
                NetworkInterface {
                    device_index: 1,
                    ..interface("eni-6b", "aa:bb:cc:00:00:07")
                },
            ],
        );

        let plan = compute_plan(&config(), &[instance], &[]);

        assert_eq!(plan.create.len(), 2);
    }

    #[test]
    fn session_tags_strip_reserved_and_managed_keys() {
        let mut instance = tagged_instance("i-7", InstanceState::Running, vec![]);
        instance
            .tags
            .insert("aws:autoscaling:groupName".to_string(), "asg-1".to_string());
        instance
            .tags
            .insert("instanceId".to_string(), "stale-value".to_string());
        instance.tags.insert("Team".to_string(), "netops".to_string());

        let mut config = config();
        config
            .org_tags
            .insert("ManagedBy".to_string(), "tapsync".to_string());

        let tags = session_tags(&config, &instance);

        assert_eq!(tags.get("instanceId").map(String::as_str), Some("i-7"));
        assert_eq!(tags.get("Team").map(String::as_str), Some("netops"));
        assert_eq!(tags.get("ManagedBy").map(String::as_str), Some("tapsync"));
        assert!(!tags.contains_key("aws:autoscaling:groupName"));
    }

    #[test]
    fn next_session_number_fills_lowest_gap() {
        assert_eq!(next_session_number(&HashSet::new()), 1);
        assert_eq!(next_session_number(&HashSet::from([1])), 2);
        assert_eq!(next_session_number(&HashSet::from([1, 2, 4])), 3);
        assert_eq!(next_session_number(&HashSet::from([2])), 1);
    }

    #[test]
    fn occupied_numbers_grouped_by_interface() {
        let sessions = vec![
            session("tms-1", "eni-1", 1),
            session("tms-2", "eni-1", 2),
            session("tms-3", "eni-2", 1),
        ];
        let occupied = occupied_session_numbers(&sessions);
        assert_eq!(occupied["eni-1"], HashSet::from([1, 2]));
        assert_eq!(occupied["eni-2"], HashSet::from([1]));
    }
}
