//! Orchestrator tests against in-memory source and destination clusters.
//! These cover the fetch -> transform -> write flow and every terminal outcome.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use rolesync::error::ClusterResult;
use rolesync::{
    ClusterError, EmptyApplicationsPolicy, RoleDocument, RoleReader, RoleSyncOrchestrator, RoleTransformer, RoleWriter,
    SpaceMappingTable, SyncError, SyncOutcome, SyncStage, TransformPrecondition, WriteResult,
};

#[derive(Default)]
struct MemoryCluster {
    roles: Mutex<HashMap<String, Value>>,
    reject_writes: Option<ClusterError>,
    unreachable: bool,
    writes: Mutex<Vec<(String, Value)>>,
}

impl MemoryCluster {
    fn with_role(name: &str, body: Value) -> Self {
        let c = MemoryCluster::default();
        c.roles.lock().unwrap().insert(name.to_string(), body);
        c
    }

    fn writes(&self) -> Vec<(String, Value)> { self.writes.lock().unwrap().clone() }
}

#[async_trait]
impl RoleReader for MemoryCluster {
    async fn get_role_permissions(&self, role_name: &str) -> ClusterResult<RoleDocument> {
        if self.unreachable {
            return Err(ClusterError::connection("connect_failed", "connection refused"));
        }
        let roles = self.roles.lock().unwrap();
        let body = roles
            .get(role_name)
            .cloned()
            .ok_or_else(|| ClusterError::not_found("role_not_found".to_string(), format!("no role {}", role_name)))?;
        RoleDocument::from_value(body).map_err(|e| ClusterError::internal("invalid_response".to_string(), e.to_string()))
    }
}

#[async_trait]
impl RoleWriter for MemoryCluster {
    async fn update_role(&self, role_name: &str, role: RoleDocument) -> ClusterResult<WriteResult> {
        if let Some(e) = &self.reject_writes {
            return Err(e.clone());
        }
        let created = !self.roles.lock().unwrap().contains_key(role_name);
        let body = role.into_value();
        self.writes.lock().unwrap().push((role_name.to_string(), body.clone()));
        self.roles.lock().unwrap().insert(role_name.to_string(), body);
        Ok(WriteResult { created })
    }
}

fn scenario_map() -> SpaceMappingTable {
    [("space1", "*"), ("space2", "!")].into_iter().collect()
}

fn analyst_role() -> Value {
    json!({
        "cluster": ["all"],
        "indices": [{"names": ["logs-*"], "privileges": ["read"]}],
        "applications": [
            {"application": "kibana-.kibana", "privileges": ["read"], "resources": ["space:space1", "feature:dashboard"]},
            {"application": "kibana-.kibana", "privileges": ["all"], "resources": ["space:space1", "space:space2"]},
            {"application": "apm", "privileges": ["read"], "resources": ["*"]}
        ],
        "run_as": [],
        "metadata": {"x": 1},
        "transient_metadata": {"enabled": true},
        "_status": "active"
    })
}

#[tokio::test]
async fn sync_writes_transformed_role_without_cluster_managed_fields() {
    let source = MemoryCluster::with_role("analyst", analyst_role());
    let dest = MemoryCluster::default();
    let map = scenario_map();

    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));
    let outcome = orch.sync_role("analyst").await;
    assert!(matches!(outcome, SyncOutcome::Done(WriteResult { created: true })), "{:?}", outcome);

    let writes = dest.writes();
    assert_eq!(writes.len(), 1);
    let (name, body) = &writes[0];
    assert_eq!(name, "analyst");
    assert_eq!(body, &json!({
        "cluster": ["all"],
        "indices": [{"names": ["logs-*"], "privileges": ["read"]}],
        "applications": [
            {"application": "kibana-.kibana", "privileges": ["read"], "resources": ["space:*", "feature:dashboard"]},
            {"application": "apm", "privileges": ["read"], "resources": ["*"]}
        ],
        "run_as": []
    }));
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys, vec!["cluster", "indices", "applications", "run_as"]);
}

#[tokio::test]
async fn second_sync_updates_existing_role() {
    let source = MemoryCluster::with_role("analyst", analyst_role());
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    assert!(matches!(orch.sync_role("analyst").await, SyncOutcome::Done(WriteResult { created: true })));
    assert!(matches!(orch.sync_role("analyst").await, SyncOutcome::Done(WriteResult { created: false })));
    let writes = dest.writes();
    assert_eq!(writes[0].1, writes[1].1);
}

#[tokio::test]
async fn metadata_is_stripped_even_without_applications() {
    let source = MemoryCluster::with_role("ops", json!({"cluster": ["all"], "metadata": {"x": 1}}));
    let dest = MemoryCluster::default();
    let map = SpaceMappingTable::default();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    assert!(matches!(orch.sync_role("ops").await, SyncOutcome::Done(_)));
    assert_eq!(dest.writes()[0].1, json!({"cluster": ["all"]}));
}

#[tokio::test]
async fn missing_role_fails_at_fetch_without_writing() {
    let source = MemoryCluster::default();
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    match orch.sync_role("ghost").await {
        SyncOutcome::Failed(e @ SyncError::Fetch { .. }) => {
            assert_eq!(e.stage(), SyncStage::Fetching);
            assert_eq!(e.role(), "ghost");
            if let SyncError::Fetch { source, .. } = e { assert!(source.is_not_found()); }
        }
        other => panic!("expected fetch failure, got {:?}", other),
    }
    assert!(dest.writes().is_empty());
}

#[tokio::test]
async fn unreachable_source_is_a_fetch_failure() {
    let source = MemoryCluster { unreachable: true, ..Default::default() };
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    match orch.sync_role("analyst").await {
        SyncOutcome::Failed(SyncError::Fetch { source: ClusterError::Connection { .. }, .. }) => {}
        other => panic!("expected connection failure, got {:?}", other),
    }
}

#[tokio::test]
async fn rejected_body_is_a_write_failure() {
    let source = MemoryCluster::with_role("analyst", analyst_role());
    let dest = MemoryCluster {
        reject_writes: Some(ClusterError::from_http_status(400, "unknown field [bogus]")),
        ..Default::default()
    };
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    let outcome = orch.sync_role("analyst").await;
    assert!(outcome.is_failed());
    match outcome {
        SyncOutcome::Failed(e) => {
            assert_eq!(e.stage(), SyncStage::Writing);
            assert!(e.to_string().contains("unknown field [bogus]"), "{}", e);
        }
        other => panic!("expected write failure, got {:?}", other),
    }
}

#[tokio::test]
async fn malformed_role_fails_at_transform() {
    let source = MemoryCluster::with_role("broken", json!({"applications": {"application": "kibana"}}));
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    match orch.sync_role("broken").await {
        SyncOutcome::Failed(SyncError::Precondition { source, .. }) => {
            assert_eq!(source, TransformPrecondition::ApplicationsNotArray);
        }
        other => panic!("expected precondition failure, got {:?}", other),
    }
    assert!(dest.writes().is_empty());
}

#[tokio::test]
async fn fully_excluded_role_is_skipped_under_exclude_role_policy() {
    let body = json!({"cluster": [], "applications": [
        {"application": "kibana-.kibana", "resources": ["space:space2"]}
    ]});
    let source = MemoryCluster::with_role("legacy", body);
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let transformer = RoleTransformer::new(&map).with_empty_policy(EmptyApplicationsPolicy::ExcludeRole);
    let orch = RoleSyncOrchestrator::new(&source, &dest, transformer);

    assert!(matches!(orch.sync_role("legacy").await, SyncOutcome::Skipped));
    assert!(dest.writes().is_empty());
}

#[tokio::test]
async fn fully_excluded_role_is_written_empty_under_keep_policy() {
    let body = json!({"cluster": [], "applications": [
        {"application": "kibana-.kibana", "resources": ["space:space2"]}
    ]});
    let source = MemoryCluster::with_role("legacy", body);
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map));

    assert!(matches!(orch.sync_role("legacy").await, SyncOutcome::Done(_)));
    assert_eq!(dest.writes()[0].1, json!({"cluster": [], "applications": []}));
}

#[tokio::test]
async fn dry_run_returns_body_and_writes_nothing() {
    let source = MemoryCluster::with_role("analyst", analyst_role());
    let dest = MemoryCluster::default();
    let map = scenario_map();
    let orch = RoleSyncOrchestrator::new(&source, &dest, RoleTransformer::new(&map)).with_dry_run(true);

    match orch.sync_role("analyst").await {
        SyncOutcome::DryRun(body) => {
            assert!(body.get("metadata").is_none());
            assert_eq!(body.get("applications").and_then(|a| a.as_array()).map(|a| a.len()), Some(2));
        }
        other => panic!("expected dry run, got {:?}", other),
    }
    assert!(dest.writes().is_empty());
}

#[tokio::test]
async fn orchestrator_accepts_trait_objects() {
    let source = MemoryCluster::with_role("analyst", analyst_role());
    let dest = MemoryCluster::default();
    let reader: &dyn RoleReader = &source;
    let writer: &dyn RoleWriter = &dest;
    let map = SpaceMappingTable::default();
    let orch = RoleSyncOrchestrator::new(reader, writer, RoleTransformer::new(&map));
    assert!(matches!(orch.sync_role("analyst").await, SyncOutcome::Done(_)));
}
