//! Node service actions against the in-memory transport

use anyhow::Result;
use nodestage_core::logging::init_tracing;
use nodestage_core::{
    EdgeKind, Item, MemoryTransport, NodeKind, NodeService, NodeServiceError, NodeStageConfig,
    Position, SchemaRegistry, SessionContext, Snapshot, StoreError, TransportError,
};
use serde_json::json;
use std::sync::Arc;

const SERVICE: &str = "kubernetesServiceEntity";

fn service_with(transport: Arc<MemoryTransport>, session: SessionContext) -> NodeService {
    let config = NodeStageConfig::default();
    init_tracing(&config.log_filter);
    NodeService::new(Arc::new(SchemaRegistry::with_builtins()), transport, session)
        .with_config(config)
}

fn system_node_record() -> serde_json::Value {
    json!({
        "id": "node:system",
        "entityId": "system:1",
        "name": "production",
        "nodeKind": "SYSTEM",
        "stack": [{"id": "system:1", "siStorable": {"typeName": "system"}, "name": "production"}]
    })
}

fn application_node_record() -> serde_json::Value {
    json!({
        "id": "node:app",
        "entityId": "application:1",
        "name": "shop",
        "nodeKind": "ENTITY",
        "stack": [{
            "id": "application:1",
            "siStorable": {"typeName": "application_entity"},
            "name": "shop"
        }]
    })
}

#[tokio::test]
async fn test_create_focuses_new_node() -> Result<()> {
    let transport = Arc::new(MemoryTransport::new());
    let mut service = service_with(transport.clone(), SessionContext::new().with_change_set("cs1"));

    let node_id = service
        .create(NodeKind::Entity, "kubernetesDeploymentEntity")
        .await?
        .expect("entity nodes are created");

    let current = service.store().current_or_throw()?;
    assert_eq!(current.id, node_id);
    assert!(current.display.change_set("cs1").is_some());
    assert_eq!(service.store().mouse_track_selection(), Some(node_id.as_str()));

    let created = transport.requests_for("kubernetesDeploymentEntity", "create").await;
    assert_eq!(created[0].variables["changeSetId"], "cs1");

    // Non-entity nodes are not created through an entity
    assert!(service.create(NodeKind::System, "system").await?.is_none());
    Ok(())
}

#[tokio::test]
async fn test_add_new_item_creates_node_and_edges() -> Result<()> {
    let transport = Arc::new(
        MemoryTransport::new()
            .with_records("node", vec![system_node_record(), application_node_record()]),
    );
    let session = SessionContext::new()
        .with_workspace("workspace:1")
        .with_system("node:system")
        .with_application("application:1");
    let mut service = service_with(transport.clone(), session);
    service.load().await?;

    let item = Item::from_snapshot(Snapshot::saved("service:1", SERVICE, json!({"name": "frontend"})));
    service.add(vec![item]).await?;

    let node = service.store().get_node_by_entity_id("service:1").unwrap();
    assert_eq!(node.stack.len(), 1);
    assert_eq!(node.display.saved().unwrap().body["name"], "frontend");

    let node_create = &transport.requests_for("node", "create").await[0];
    assert_eq!(node_create.variables["entityId"], "service:1");
    assert_eq!(node_create.variables["siProperties"]["workspaceId"], "workspace:1");
    assert_eq!(node_create.variables["sockets"][0]["kind"], "INPUT");

    let edges = service.store().all_related_edges(&node.id);
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].tail_vertex.id, "node:system");
    assert_eq!(edges[0].edge_kind, Some(EdgeKind::PartOf));
    assert_eq!(edges[1].tail_vertex.id, "node:app");
    assert_eq!(edges[1].tail_vertex.type_name, "application_entity");
    assert_eq!(edges[1].edge_kind, None);

    // The application now lists the new node
    let listed: Vec<&str> = service.list()?.iter().map(|n| n.id.as_str()).collect();
    assert_eq!(listed, vec![node.id.as_str()]);
    Ok(())
}

#[tokio::test]
async fn test_add_application_item_is_not_attached_to_itself() -> Result<()> {
    let transport = Arc::new(MemoryTransport::new().with_records("node", vec![application_node_record()]));
    let mut service = service_with(
        transport.clone(),
        SessionContext::new().with_application("application:1"),
    );
    service.load().await?;

    let item = Item::from_snapshot(Snapshot::saved(
        "application:2",
        "application_entity",
        json!({"name": "billing"}),
    ));
    service.add(vec![item]).await?;

    assert!(transport.requests_for("edge", "create").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_add_known_item_merges_into_focused_node() -> Result<()> {
    let transport = Arc::new(MemoryTransport::new().with_records("node", vec![application_node_record()]));
    let mut service = service_with(transport.clone(), SessionContext::new());
    service.load().await?;
    service.store_mut().set_current_by_id("node:app")?;

    let update = Snapshot::in_change_set(
        "application:1-cs1",
        "application_entity",
        "cs1",
        1,
        json!({"name": "shop v2"}),
    );
    service
        .add(vec![Item {
            entity_id: "application:1".to_string(),
            name: "shop v2".to_string(),
            object: update,
        }])
        .await?;

    assert!(transport.requests_for("node", "create").await.is_empty());
    let current = service.store().current_or_throw()?;
    assert_eq!(current.name, "shop v2");
    assert_eq!(current.stack.len(), 2);
    assert!(current.display.change_set("cs1").is_some());
    Ok(())
}

#[tokio::test]
async fn test_send_action_creates_change_set_and_refreshes_it() -> Result<()> {
    let transport = Arc::new(MemoryTransport::new().with_records("node", vec![application_node_record()]));
    let mut service = service_with(transport.clone(), SessionContext::new());
    service.load().await?;
    service.store_mut().set_current_by_id("node:app")?;

    service.send_action("deploy").await?;

    let change_set_id = service.session().change_set_id.clone().unwrap();
    let actions = transport.requests_for("application_entity", "deploy").await;
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].variables["id"], "application:1");
    assert_eq!(actions[0].variables["changeSetId"], change_set_id.as_str());

    assert_eq!(transport.requests_for("changeSet", "get").await.len(), 1);
    assert_eq!(service.change_set().unwrap().id, change_set_id);
    Ok(())
}

#[tokio::test]
async fn test_delete_action_deletes_related_entities() -> Result<()> {
    let transport = Arc::new(
        MemoryTransport::new()
            .with_records("node", vec![system_node_record(), application_node_record()])
            .with_records(
                "edge",
                vec![json!({
                    "id": "edge:1",
                    "tailVertex": {"id": "node:system", "socket": "output", "typeName": "system"},
                    "headVertex": {"id": "node:app", "socket": "input", "typeName": "application_entity"},
                    "bidirectional": true,
                    "edgeKind": "partOf"
                })],
            ),
    );
    let mut service = service_with(transport.clone(), SessionContext::new().with_change_set("cs1"));
    service.load().await?;
    service.store_mut().set_current_by_id("node:system")?;

    service.send_action("delete").await?;

    // The system node is not an entity; only the related application is deleted
    let deletes = transport.requests_for("application_entity", "delete").await;
    assert_eq!(deletes.len(), 1);
    assert!(transport.requests_for("system", "delete").await.is_empty());
    assert!(transport.requests_for("changeSet", "create").await.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_node_create_is_surfaced() -> Result<()> {
    let transport = Arc::new(MemoryTransport::new().failing("node", "create", "quota exceeded"));
    let mut service = service_with(transport, SessionContext::new());

    let item = Item::from_snapshot(Snapshot::saved("service:1", SERVICE, json!({})));
    let err = service.add(vec![item]).await.unwrap_err();
    assert!(matches!(
        err,
        NodeServiceError::Transport(TransportError::RequestFailed { .. })
    ));
    assert!(service.store().is_empty());
    Ok(())
}

#[test]
fn test_field_edit_errors() {
    let transport = Arc::new(MemoryTransport::new());
    let mut service = service_with(transport, SessionContext::new());

    let err = service
        .set_field_value(&nodestage_core::field_path("name"), json!("x"))
        .unwrap_err();
    assert!(matches!(err, NodeServiceError::Store(StoreError::NoCurrentNode)));

    let err = service
        .set_field_value_by_node("node:missing", &nodestage_core::field_path("name"), json!("x"))
        .unwrap_err();
    assert!(matches!(err, NodeServiceError::Store(StoreError::NodeNotFound { .. })));
}

#[test]
fn test_field_edits_outside_runtime() {
    let transport = Arc::new(MemoryTransport::new().with_records("node", vec![application_node_record()]));
    let mut service = service_with(transport, SessionContext::new());

    tokio_test::block_on(service.load()).unwrap();
    service.store_mut().set_current_by_id("node:app").unwrap();

    service
        .set_field_value(&nodestage_core::field_path("name"), json!("shop v2"))
        .unwrap();
    service
        .set_field_value_by_node("node:app", &nodestage_core::field_path("tier"), json!("web"))
        .unwrap();

    let current = service.store().current().unwrap();
    assert_eq!(current.display.saved().unwrap().body["name"], "shop v2");
    let stored = service.store().get_node_by_id("node:app").unwrap();
    assert_eq!(stored.display.saved().unwrap().body["tier"], "web");
}

#[test]
fn test_set_node_position_outside_runtime() {
    let transport = Arc::new(MemoryTransport::new().with_records("node", vec![application_node_record()]));
    let mut service = service_with(transport, SessionContext::new());

    tokio_test::block_on(service.load()).unwrap();
    service.set_node_position("node:app", Position::new(40.0, 12.0));
    assert_eq!(
        service.store().get_node_by_id("node:app").unwrap().position,
        Position::new(40.0, 12.0)
    );
}
