use std::sync::Arc;

use parking_lot::Mutex;
use qore_audit::audit_core::{
    AuditErrorKind, CollectionSchema, FieldCheckHandler, IndexCheckHandler, QueryOptions,
    ViolationRecord,
};
use qore_audit::{AuditConfig, InterceptorPipeline, QueryHook};
use serde_json::json;

fn task_schema() -> CollectionSchema {
    CollectionSchema::new("tasks")
        .fields(["name", "createdAt", "updatedAt", "priority", "active", "config"])
        .index(["createdAt"])
        .index(["name"])
}

fn quiet_config() -> AuditConfig {
    AuditConfig {
        log_violations: false,
        ..AuditConfig::default()
    }
}

#[test]
fn test_unknown_field_fails_existence_check() {
    let pipeline = InterceptorPipeline::with_config(quiet_config());
    let engine = pipeline.engine();
    engine.set_throw_condition(true);
    engine.set_field_check_handler(FieldCheckHandler::new().on_fail(|record: &ViolationRecord| {
        format!("{}: {}", record.collection_name, record.violating_fields.join(","))
    }));

    let err = pipeline
        .pre_execute(
            QueryHook::Find,
            &task_schema(),
            &json!({ "name": "x", "uncoveredField": true }),
            &QueryOptions::default(),
        )
        .unwrap_err();

    assert_eq!(err.kind(), AuditErrorKind::InvalidField);
    assert_eq!(err.message(), "tasks: uncoveredField");
}

#[test]
fn test_index_coverage_scenario_depends_on_threshold() {
    let pipeline = InterceptorPipeline::with_config(quiet_config());
    let engine = pipeline.engine();
    let violations: Arc<Mutex<Vec<ViolationRecord>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&violations);
    engine.set_index_check_handler(
        IndexCheckHandler::new()
            .on_notify(move |record: &ViolationRecord| sink.lock().push(record.clone()))
            .with_min_coverage(0.5),
    );

    let schema = task_schema();
    let filter = json!({ "name": "x", "uncoveredField": true });

    pipeline
        .pre_execute(QueryHook::Find, &schema, &filter, &QueryOptions::default())
        .unwrap();
    assert!(violations.lock().is_empty());

    engine.set_index_check_handler(IndexCheckHandler::new().with_min_coverage(0.75));
    pipeline
        .pre_execute(QueryHook::Find, &schema, &filter, &QueryOptions::with_comment("report"))
        .unwrap();

    let violations = violations.lock();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].comment.as_deref(), Some("report"));
    assert_eq!(violations[0].raw_filter, filter);
}

#[test]
fn test_throttling_across_hooks_and_reset() {
    let pipeline = InterceptorPipeline::with_config(quiet_config());
    let notified = Arc::new(Mutex::new(0usize));
    let counter = Arc::clone(&notified);
    pipeline
        .engine()
        .set_field_check_handler(FieldCheckHandler::new().on_notify(move |_: &ViolationRecord| {
            *counter.lock() += 1;
        }));

    let schema = task_schema();
    for hook in [QueryHook::Find, QueryHook::Count, QueryHook::DeleteOne] {
        pipeline
            .pre_execute(hook, &schema, &json!({ "ghost": 1 }), &QueryOptions::default())
            .unwrap();
    }
    assert_eq!(*notified.lock(), 1);

    pipeline
        .pre_execute(QueryHook::Find, &schema, &json!({ "phantom": 1 }), &QueryOptions::default())
        .unwrap();
    assert_eq!(*notified.lock(), 2);

    pipeline.clear_warned_queries();
    pipeline
        .pre_execute(QueryHook::Find, &schema, &json!({ "ghost": 1 }), &QueryOptions::default())
        .unwrap();
    assert_eq!(*notified.lock(), 3);

    let stats = pipeline.get_stats();
    assert_eq!(stats.inspected, 5);
    assert_eq!(stats.suppressed, 2);
}

#[test]
fn test_collections_are_cached_independently() {
    let pipeline = InterceptorPipeline::with_config(quiet_config());
    let orders = CollectionSchema::new("orders").field("status").index(["status"]);

    pipeline
        .pre_execute(QueryHook::Find, &task_schema(), &json!({ "name": "x" }), &QueryOptions::default())
        .unwrap();
    pipeline
        .pre_execute(QueryHook::Find, &orders, &json!({ "status": "open" }), &QueryOptions::default())
        .unwrap();

    let cache = pipeline.engine().metadata_cache();
    assert_eq!(cache.len(), 2);
    let orders = cache.peek("orders").unwrap();
    assert_eq!(
        orders.indexes,
        vec![vec!["status".to_string()], vec!["_id".to_string()]]
    );
}
