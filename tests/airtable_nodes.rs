use std::sync::Arc;

use greentic_airtable::{
    connection::{ConnectionConfig, HttpConnector},
    flow::{
        runner::{NodeInvocation, Runner},
        session::InMemorySessionStore,
    },
    node::{Branch, ChildConfig, NodeError},
    nodes::{AirtableNode, GetAllNode, GetOneOrFailNode, InsertRecordNode, UpsertBySearchNode, UpsertRecordNode},
    secret::{EmptySecretsManager, SecretsManager, TestSecretsManager},
    store::StorageOptions,
};
use airtable_client::SortDirection;
use httpmock::Method::{GET, PATCH, POST};
use httpmock::MockServer;
use serde_json::{Map, Value, json};

fn runner(server: &MockServer, secrets: SecretsManager) -> Runner {
    Runner::new(
        InMemorySessionStore::new(60),
        secrets,
        Arc::new(HttpConnector::new(server.base_url())),
    )
}

fn no_secrets() -> SecretsManager {
    SecretsManager(EmptySecretsManager::new())
}

fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}

fn record(id: &str, fields: Value) -> Value {
    json!({"id": id, "createdTime": "2024-05-01T10:00:00.000Z", "fields": fields})
}

fn branch_children() -> Vec<ChildConfig> {
    vec![
        ChildConfig::new("child-success", Branch::Success),
        ChildConfig::new("child-not-found", Branch::NotFound),
        ChildConfig::new("child-multiple", Branch::MultipleFound),
        ChildConfig::new("child-error", Branch::Error),
    ]
}

#[tokio::test]
async fn upsert_by_search_creates_missing_customer() {
    let server = MockServer::start_async().await;

    let search = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v0/appXXX/Customers")
                .query_param("filterByFormula", "{Email} = \"a@b.com\"")
                .header("authorization", "Bearer pat");
            then.status(200).json_body(json!({"records": []}));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v0/appXXX/Customers")
                .header("content-type", "application/json")
                .json_body(json!({"fields": {"Email": "a@b.com"}}));
            then.status(200)
                .json_body(record("recNEW", json!({"Email": "a@b.com"})));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PATCH);
            then.status(200).json_body(record("recX", json!({})));
        })
        .await;

    let node = UpsertBySearchNode::new(
        ConnectionConfig::token("pat"),
        "appXXX",
        "Customers",
        "Email",
        "a@b.com",
        object(json!({"Email": "a@b.com"})),
    );
    let mut invocation = NodeInvocation::new(AirtableNode::UpsertBySearch(node));
    invocation.children = branch_children();

    let report = runner(&server, no_secrets()).run(&invocation).await.unwrap();

    search.assert_async().await;
    create.assert_async().await;
    assert_eq!(update.hits_async().await, 0);

    assert_eq!(report.branch, Some(Branch::Success));
    assert_eq!(report.next_node.as_deref(), Some("child-success"));
    assert_eq!(
        report.payload,
        json!({
            "success": true,
            "created": true,
            "record": {
                "id": "recNEW",
                "createdTime": "2024-05-01T10:00:00.000Z",
                "fields": {"Email": "a@b.com"}
            }
        })
    );
    assert_eq!(report.context["airtableUpsertResult"], report.payload);
}

#[tokio::test]
async fn upsert_by_search_updates_the_single_match() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/appXXX/Customers");
            then.status(200)
                .json_body(json!({"records": [record("recOLD", json!({"Email": "a@b.com"}))]}));
        })
        .await;
    let update = server
        .mock_async(|when, then| {
            when.method(PATCH)
                .path("/v0/appXXX/Customers/recOLD")
                .json_body(json!({"fields": {"Plan": "pro"}}));
            then.status(200)
                .json_body(record("recOLD", json!({"Email": "a@b.com", "Plan": "pro"})));
        })
        .await;
    let create = server
        .mock_async(|when, then| {
            when.method(POST);
            then.status(200).json_body(record("recX", json!({})));
        })
        .await;

    let node = UpsertBySearchNode::new(
        ConnectionConfig::token("pat"),
        "appXXX",
        "Customers",
        "Email",
        "a@b.com",
        object(json!({"Plan": "pro"})),
    );
    let report = runner(&server, no_secrets())
        .run(&NodeInvocation::new(AirtableNode::UpsertBySearch(node)))
        .await
        .unwrap();

    update.assert_async().await;
    assert_eq!(create.hits_async().await, 0);
    assert_eq!(report.payload["updated"], json!(true));
    assert_eq!(report.payload["record"]["fields"]["Plan"], json!("pro"));
}

#[tokio::test]
async fn get_one_or_fail_reports_ambiguous_matches() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v0/appXXX/Customers")
                .query_param("fields[]", "Email");
            then.status(200).json_body(json!({
                "records": [
                    record("rec1", json!({"Email": "a@b.com"})),
                    record("rec2", json!({"Email": "a@b.com"}))
                ]
            }));
        })
        .await;

    let mut node = GetOneOrFailNode::new(ConnectionConfig::token("pat"), "appXXX", "Customers", "Email", "a@b.com");
    node.fields = vec!["Email".into()];
    let mut invocation = NodeInvocation::new(AirtableNode::GetOneOrFail(node));
    invocation.children = branch_children();

    let report = runner(&server, no_secrets()).run(&invocation).await.unwrap();

    assert_eq!(report.branch, Some(Branch::MultipleFound));
    assert_eq!(report.next_node.as_deref(), Some("child-multiple"));
    assert_eq!(report.payload["count"], json!(2));
    assert_eq!(
        report.payload["message"],
        json!("Multiple records found (2) with Email = \"a@b.com\"")
    );
}

#[tokio::test]
async fn get_one_or_fail_routes_remote_errors() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(GET).path("/v0/appXXX/Customers");
            then.status(422).json_body(json!({
                "error": {
                    "type": "INVALID_FILTER_BY_FORMULA",
                    "message": "The formula for filtering records is invalid"
                }
            }));
        })
        .await;

    let node = GetOneOrFailNode::new(ConnectionConfig::token("pat"), "appXXX", "Customers", "Email", "x\"y");
    let mut invocation = NodeInvocation::new(AirtableNode::GetOneOrFail(node));
    invocation.children = branch_children();

    let report = runner(&server, no_secrets()).run(&invocation).await.unwrap();

    assert_eq!(report.next_node.as_deref(), Some("child-error"));
    assert_eq!(
        report.payload,
        json!({
            "error": true,
            "message": "The formula for filtering records is invalid",
            "status": 422
        })
    );
}

#[tokio::test]
async fn upsert_record_separates_not_found_from_other_failures() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(PATCH).path("/v0/appXXX/Customers/recGONE");
            then.status(404).json_body(json!({"error": "NOT_FOUND"}));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(PATCH).path("/v0/appXXX/Customers/recBROKEN");
            then.status(500).body("");
        })
        .await;

    let runner = runner(&server, no_secrets());
    let invocation = |record_id: &str| {
        let node = UpsertRecordNode::new(
            ConnectionConfig::token("pat"),
            "appXXX",
            "Customers",
            record_id,
            object(json!({"Status": "Active"})),
        );
        let mut invocation = NodeInvocation::new(AirtableNode::UpsertRecord(node));
        invocation.children = branch_children();
        invocation
    };

    let missing = runner.run(&invocation("recGONE")).await.unwrap();
    assert_eq!(missing.branch, Some(Branch::NotFound));
    assert_eq!(missing.next_node.as_deref(), Some("child-not-found"));
    assert_eq!(
        missing.payload,
        json!({
            "success": false,
            "notFound": true,
            "message": "Record not found: recGONE",
            "recordId": "recGONE"
        })
    );

    let broken = runner.run(&invocation("recBROKEN")).await.unwrap();
    assert_eq!(broken.branch, Some(Branch::Error));
    assert_eq!(
        broken.payload,
        json!({
            "success": false,
            "error": true,
            "message": "Request failed with status code 500",
            "status": 500
        })
    );
}

#[tokio::test]
async fn get_all_sends_query_options_and_keeps_offset() {
    let server = MockServer::start_async().await;

    let list = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v0/appXXX/Customers")
                .query_param("maxRecords", "10")
                .query_param("filterByFormula", "{Status} = 'Open'")
                .query_param("fields[]", "Name")
                .query_param("sort[0][field]", "Name")
                .query_param("sort[0][direction]", "desc");
            then.status(200).json_body(json!({
                "records": [record("rec2", json!({"Name": "Bob"})), record("rec1", json!({"Name": "Ada"}))],
                "offset": "itrNEXT/rec1"
            }));
        })
        .await;

    let mut node = GetAllNode::new(ConnectionConfig::token("pat"), "appXXX", "Customers");
    node.max_records = 10;
    node.filter_by_formula = "{Status} = 'Open'".into();
    node.fields = vec!["Name".into()];
    node.sort_field = "Name".into();
    node.sort_direction = SortDirection::Desc;
    node.storage = StorageOptions::input("rows");

    let report = runner(&server, no_secrets())
        .run(&NodeInvocation::new(AirtableNode::GetAll(node)))
        .await
        .unwrap();

    list.assert_async().await;
    assert_eq!(report.branch, None);
    assert_eq!(report.next_node, None);
    assert_eq!(report.input["rows"]["total"], json!(2));
    assert_eq!(report.input["rows"]["offset"], json!("itrNEXT/rec1"));
    assert_eq!(report.input["rows"]["records"][0]["id"], json!("rec2"));
    assert!(report.context.is_empty());
}

#[tokio::test]
async fn insert_uses_token_from_secrets() {
    let server = MockServer::start_async().await;

    let create = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v0/appXXX/People")
                .header("authorization", "Bearer secret-pat")
                .json_body(json!({"fields": {"Name": "Ada"}}));
            then.status(200).json_body(record("recNEW", json!({"Name": "Ada"})));
        })
        .await;

    let secrets = SecretsManager(TestSecretsManager::new());
    secrets.add_secret("AIRTABLE_TOKEN", "secret-pat").await.unwrap();
    let node = InsertRecordNode::new(
        ConnectionConfig::secret("AIRTABLE_TOKEN"),
        "appXXX",
        "People",
        object(json!({"Name": "Ada"})),
    );

    let report = runner(&server, secrets)
        .run(&NodeInvocation::new(AirtableNode::InsertRecord(node)))
        .await
        .unwrap();

    create.assert_async().await;
    assert_eq!(report.context["airtableInsertResult"]["id"], json!("recNEW"));
    assert_eq!(
        report.context["airtableInsertResult"]["createdTime"],
        json!("2024-05-01T10:00:00.000Z")
    );
}

#[tokio::test]
async fn insert_failure_with_error_code_has_no_type() {
    let server = MockServer::start_async().await;

    server
        .mock_async(|when, then| {
            when.method(POST).path("/v0/appXXX/Missing");
            then.status(404).json_body(json!({"error": "NOT_FOUND"}));
        })
        .await;

    let node = InsertRecordNode::new(ConnectionConfig::token("pat"), "appXXX", "Missing", Map::new());
    let report = runner(&server, no_secrets())
        .run(&NodeInvocation::new(AirtableNode::InsertRecord(node)))
        .await
        .unwrap();

    assert_eq!(
        report.payload,
        json!({
            "success": false,
            "error": true,
            "message": "Request failed with status code 404",
            "status": 404
        })
    );
}

#[tokio::test]
async fn missing_secret_stops_before_any_request() {
    let server = MockServer::start_async().await;

    let any = server
        .mock_async(|when, then| {
            when.path_contains("/v0/");
            then.status(200).json_body(json!({"records": []}));
        })
        .await;

    let node = GetAllNode::new(ConnectionConfig::secret("AIRTABLE_TOKEN"), "appXXX", "Customers");
    let err = runner(&server, no_secrets())
        .run(&NodeInvocation::new(AirtableNode::GetAll(node)))
        .await
        .unwrap_err();

    assert!(matches!(err, NodeError::ConnectionFailed(_)));
    assert_eq!(any.hits_async().await, 0);
}

#[tokio::test]
async fn unreachable_api_becomes_an_error_payload() {
    let node = GetOneOrFailNode::new(ConnectionConfig::token("pat"), "appXXX", "Customers", "Email", "a@b.com");
    let mut invocation = NodeInvocation::new(AirtableNode::GetOneOrFail(node));
    invocation.children = branch_children();

    let runner = Runner::new(
        InMemorySessionStore::new(60),
        no_secrets(),
        Arc::new(HttpConnector::new("http://127.0.0.1:1")),
    );
    let report = runner.run(&invocation).await.unwrap();

    assert_eq!(report.branch, Some(Branch::Error));
    assert_eq!(report.payload["error"], json!(true));
    assert!(report.payload.get("status").is_none());
}
