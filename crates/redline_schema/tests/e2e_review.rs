//! End-to-end tests for the edit suggestion lifecycle
//!
//! Tests registration -> create -> diff -> publish/reject against a real
//! in-memory store - no mocks.

use redline_schema::{
    Actor, AttributeDescriptor, ConfigError, EntitySchema, FieldValue, NewSuggestion, PivotRow,
    RegistryBuilder, RelationSpec, ReviewDesk, ReviewStatus, ShadowConfig, SuggestError,
};
use chrono::{Duration, Utc};
use redline_store::{Filter, MemoryStore, Query, Record, RecordId, SqliteStore, Store, Value};
use std::sync::{Arc, Mutex};

// =============================================================================
// FIXTURES
// =============================================================================

fn article_schema() -> EntitySchema {
    EntitySchema::new(
        "Article",
        vec![
            AttributeDescriptor::identity("id"),
            AttributeDescriptor::text("title", 120),
            AttributeDescriptor::long_text("body"),
            AttributeDescriptor::text("slug", 50).unique(),
            AttributeDescriptor::foreign_key("author", "User").nullable(),
        ],
    )
    .with_display_attribute("title")
}

fn tag_schema() -> EntitySchema {
    EntitySchema::new(
        "Tag",
        vec![
            AttributeDescriptor::identity("id"),
            AttributeDescriptor::text("name", 40),
        ],
    )
}

fn article_tag_schema() -> EntitySchema {
    EntitySchema::new(
        "ArticleTag",
        vec![
            AttributeDescriptor::identity("id"),
            AttributeDescriptor::foreign_key("article", "Article"),
            AttributeDescriptor::foreign_key("tag", "Tag"),
            AttributeDescriptor::integer("weight"),
        ],
    )
}

fn user_schema() -> EntitySchema {
    EntitySchema::new(
        "User",
        vec![
            AttributeDescriptor::identity("id"),
            AttributeDescriptor::text("username", 150),
        ],
    )
    .with_display_attribute("username")
}

#[derive(Default, Clone)]
struct HookLog(Arc<Mutex<Vec<String>>>);

impl HookLog {
    fn push(&self, entry: String) {
        if let Ok(mut log) = self.0.lock() {
            log.push(entry);
        }
    }

    fn entries(&self) -> Vec<String> {
        self.0.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

struct Fixture {
    desk: ReviewDesk<MemoryStore>,
    hooks: HookLog,
    article: Record,
    rust: Record,
    python: Record,
    alice: Actor,
    reviewer: Actor,
}

fn fixture() -> Fixture {
    let hooks = HookLog::default();
    let on_publish = hooks.clone();
    let on_reject = hooks.clone();

    let config = ShadowConfig::staff_only()
        .with_relation(RelationSpec::new("related", "self"))
        .with_relation(RelationSpec::new("labels", "Tag"))
        .with_relation(RelationSpec::new("tags", "Tag").through(article_tag_schema(), "article", "tag"))
        .on_publish(move |shadow, actor| on_publish.push(format!("publish {} {}", shadow.id(), actor.username)))
        .on_reject(move |shadow, actor, reason| {
            on_reject.push(format!("reject {} {} {}", shadow.id(), actor.username, reason))
        });

    let mut builder = RegistryBuilder::new();
    builder.add_entity(user_schema()).unwrap();
    builder.add_entity(tag_schema()).unwrap();
    builder
        .register(&article_schema(), "edit_suggestions", config)
        .unwrap();
    let desk = ReviewDesk::new(Arc::new(builder.finish()), MemoryStore::new());

    let alice = Actor::new("alice");
    let reviewer = Actor::staff("rita");
    let store = desk.store();
    store
        .insert(Record::with_id("User", alice.id.clone().into()).with("username", "alice"))
        .unwrap();

    let rust = Record::new("Tag").with("name", "rust");
    let python = Record::new("Tag").with("name", "python");
    store.insert(rust.clone()).unwrap();
    store.insert(python.clone()).unwrap();

    let article = Record::new("Article")
        .with("title", "Hello")
        .with("body", "First draft")
        .with("slug", "hello");
    store.insert(article.clone()).unwrap();

    Fixture {
        desk,
        hooks,
        article,
        rust,
        python,
        alice,
        reviewer,
    }
}

fn title_of(f: &Fixture) -> Value {
    f.desk
        .store()
        .get("Article", &f.article.id)
        .unwrap()
        .unwrap()
        .get("title")
        .clone()
}

// =============================================================================
// REGISTRATION
// =============================================================================

#[test]
fn test_second_registration_is_a_config_error() {
    let mut builder = RegistryBuilder::new();
    assert!(builder
        .register(&article_schema(), "edit_suggestions", ShadowConfig::staff_only())
        .is_ok());
    let err = builder
        .register(&article_schema(), "edit_suggestions", ShadowConfig::staff_only())
        .unwrap_err();
    assert!(matches!(err, ConfigError::MultipleRegistrations { .. }));
}

#[test]
fn test_accessor_name_exposed() {
    let f = fixture();
    assert_eq!(
        f.desk.registry().accessor_name("Article"),
        Some("edit_suggestions")
    );
    assert_eq!(f.desk.registry().accessor_name("Tag"), None);
}

// =============================================================================
// CREATION AND SCOPED ACCESS
// =============================================================================

#[test]
fn test_create_is_pending_and_scoped() {
    let f = fixture();
    let accessor = f.desk.suggestions("Article", &f.article.id).unwrap();
    let shadow = accessor
        .create(NewSuggestion::new("typo").by(&f.alice).set("title", "Hello!"))
        .unwrap();

    assert_eq!(shadow.status(), Some(ReviewStatus::Pending));
    assert_eq!(shadow.origin_id(), Some(&f.article.id));
    assert_eq!(shadow.reason(), Some("typo"));
    assert_eq!(shadow.get("body"), &Value::from("First draft"));
    assert!(shadow.created_at().is_some());

    assert_eq!(accessor.count().unwrap(), 1);
    assert_eq!(accessor.get(shadow.id()).unwrap().id(), shadow.id());
    assert_eq!(accessor.latest().unwrap().unwrap().id(), shadow.id());
    assert_eq!(accessor.tracked().scalar, vec!["title", "body", "slug"]);
    assert_eq!(accessor.tracked().foreign, vec!["author"]);
    assert_eq!(accessor.tracked().many_to_many, vec!["related", "labels", "tags"]);

    // Another origin does not see it.
    let other = Record::new("Article").with("title", "Other");
    f.desk.store().insert(other.clone()).unwrap();
    let other_accessor = f.desk.suggestions("Article", &other.id).unwrap();
    assert_eq!(other_accessor.count().unwrap(), 0);
    assert!(matches!(
        other_accessor.get(shadow.id()).unwrap_err(),
        SuggestError::NotFound(_)
    ));
}

#[test]
fn test_list_filters_by_status() {
    let f = fixture();
    let accessor = f.desk.suggestions("Article", &f.article.id).unwrap();
    let first = accessor.create(NewSuggestion::new("one")).unwrap();
    let _second = accessor.create(NewSuggestion::new("two")).unwrap();

    let mut rejected = first.clone();
    f.desk.reject(&mut rejected, &f.reviewer, "no").unwrap();

    assert_eq!(accessor.list(None).unwrap().len(), 2);
    let pending = accessor.list(Some(ReviewStatus::Pending)).unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].reason(), Some("two"));
    let rejected = accessor.list(Some(ReviewStatus::Rejected)).unwrap();
    assert_eq!(rejected[0].id(), first.id());

    let all = f.desk.all_suggestions("Article").unwrap();
    assert_eq!(all.count(None).unwrap(), 2);
    assert_eq!(all.count(Some(ReviewStatus::Rejected)).unwrap(), 1);
}

#[test]
fn test_reason_is_required() {
    let f = fixture();
    let accessor = f.desk.suggestions("Article", &f.article.id).unwrap();
    let err = accessor.create(NewSuggestion::new("   ")).unwrap_err();
    assert!(matches!(err, SuggestError::Validation(_)));
}

#[test]
fn test_bookkeeping_cannot_be_supplied() {
    let f = fixture();
    let accessor = f.desk.suggestions("Article", &f.article.id).unwrap();
    let err = accessor
        .create(NewSuggestion::new("sneaky").set("review_status", 1i64))
        .unwrap_err();
    assert!(matches!(err, SuggestError::Validation(_)));
}

#[test]
fn test_preassigned_id_conflict() {
    let f = fixture();
    let accessor = f.desk.suggestions("Article", &f.article.id).unwrap();
    let id = RecordId::new();
    accessor
        .create(NewSuggestion::new("first").with_id(id.clone()))
        .unwrap();
    let err = accessor
        .create(NewSuggestion::new("again").with_id(id))
        .unwrap_err();
    assert!(matches!(err, SuggestError::Conflict(_)));
}

// =============================================================================
// LIFECYCLE GUARD
// =============================================================================

#[test]
fn test_pending_edits_succeed() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("typo"))
        .unwrap();

    shadow.set("title", "Edited once");
    f.desk.save_shadow(&mut shadow).unwrap();
    shadow.set("title", "Edited twice");
    f.desk.save_shadow(&mut shadow).unwrap();

    let stored = f.desk.load_shadow("Article", shadow.id()).unwrap();
    assert_eq!(stored.get("title"), &Value::from("Edited twice"));
    f.desk
        .add_members(&shadow, "labels", &[f.rust.id.clone()])
        .unwrap();
}

#[test]
fn test_edit_after_publish_is_denied() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("typo").set("title", "New"))
        .unwrap();
    f.desk.publish(&mut shadow, &f.reviewer).unwrap();

    shadow.set("title", "Sneaky");
    let err = f.desk.save_shadow(&mut shadow).unwrap_err();
    assert!(err.is_permission_denied());

    let err = f
        .desk
        .add_members(&shadow, "labels", &[f.rust.id.clone()])
        .unwrap_err();
    assert!(err.is_permission_denied());

    let err = f
        .desk
        .add_pivot(&shadow, "tags", PivotRow::new(f.rust.id.clone()))
        .unwrap_err();
    assert!(err.is_permission_denied());
}

#[test]
fn test_edit_after_reject_is_denied() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("typo"))
        .unwrap();
    f.desk.reject(&mut shadow, &f.reviewer, "not needed").unwrap();

    shadow.set("title", "Sneaky");
    assert!(f.desk.save_shadow(&mut shadow).unwrap_err().is_permission_denied());
}

// =============================================================================
// DIFF ENGINE
// =============================================================================

#[test]
fn test_identical_suggestion_diffs_empty() {
    let f = fixture();
    f.desk
        .store()
        .set_members(
            &redline_store::RelationKey::new("Article", "labels"),
            &f.article.id,
            &[f.rust.id.clone()],
        )
        .unwrap();

    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("nothing").set("title", "Hello"))
        .unwrap();

    let delta = f.desk.diff(&shadow).unwrap();
    assert!(delta.is_empty());
    assert!(delta.changed_attributes.is_empty());
    assert_eq!(delta.origin.id, f.article.id);
    assert_eq!(&delta.shadow.id, shadow.id());
}

#[test]
fn test_single_attribute_change() {
    let f = fixture();
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("rename").set("title", "Goodbye"))
        .unwrap();

    let delta = f.desk.diff(&shadow).unwrap();
    assert_eq!(delta.changed_attributes, vec!["title"]);
    let change = &delta.changes[0];
    assert_eq!(change.old, FieldValue::Scalar(Value::from("Hello")));
    assert_eq!(change.new, FieldValue::Scalar(Value::from("Goodbye")));
}

#[test]
fn test_diff_preserves_enumeration_order() {
    let f = fixture();
    let author = RecordId::from(f.alice.id.clone());
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(
            NewSuggestion::new("several")
                .set("author", author)
                .set("slug", "hi")
                .set("title", "Hi"),
        )
        .unwrap();
    f.desk
        .add_members(&shadow, "labels", &[f.python.id.clone()])
        .unwrap();

    let delta = f.desk.diff(&shadow).unwrap();
    assert_eq!(delta.changed_attributes, vec!["title", "slug", "author", "labels"]);
}

#[test]
fn test_many_to_many_member_added() {
    let f = fixture();
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("label it"))
        .unwrap();
    f.desk
        .add_members(&shadow, "labels", &[f.rust.id.clone()])
        .unwrap();

    let delta = f.desk.diff(&shadow).unwrap();
    assert_eq!(delta.changed_attributes, vec!["labels"]);
    let change = delta.change("labels").unwrap();
    assert_eq!(change.old, FieldValue::Members(vec![]));
    assert_eq!(change.new, FieldValue::Members(vec![f.rust.id.clone()]));
}

#[test]
fn test_diff_is_read_only() {
    let f = fixture();
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("rename").set("title", "Goodbye"))
        .unwrap();
    let before = f.desk.load_shadow("Article", shadow.id()).unwrap();
    f.desk.diff(&shadow).unwrap();

    assert_eq!(title_of(&f), Value::from("Hello"));
    assert_eq!(f.desk.load_shadow("Article", shadow.id()).unwrap(), before);
}

// =============================================================================
// PUBLISH / REJECT
// =============================================================================

#[test]
fn test_publish_copies_tracked_values() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(
            NewSuggestion::new("rewrite")
                .by(&f.alice)
                .set("title", "Hello, world")
                .set("body", "Second draft")
                .members("labels", vec![f.python.id.clone(), f.rust.id.clone()]),
        )
        .unwrap();

    let origin = f.desk.publish(&mut shadow, &f.reviewer).unwrap();
    assert_eq!(origin.get("title"), &Value::from("Hello, world"));
    assert_eq!(origin.get("body"), &Value::from("Second draft"));
    assert_eq!(title_of(&f), Value::from("Hello, world"));
    assert_eq!(
        f.desk
            .store()
            .members(&redline_store::RelationKey::new("Article", "labels"), &f.article.id)
            .unwrap(),
        vec![f.python.id.clone(), f.rust.id.clone()]
    );

    assert_eq!(shadow.status(), Some(ReviewStatus::Published));
    let stored = f.desk.load_shadow("Article", shadow.id()).unwrap();
    assert_eq!(stored.status(), Some(ReviewStatus::Published));
    assert!(f.desk.diff(&stored).unwrap().is_empty());

    assert_eq!(
        f.hooks.entries(),
        vec![format!("publish {} rita", shadow.id())]
    );
}

#[test]
fn test_publish_denied_without_authorization() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("rewrite").set("title", "Mine now"))
        .unwrap();

    let err = f.desk.publish(&mut shadow, &f.alice).unwrap_err();
    assert!(err.is_permission_denied());
    assert_eq!(title_of(&f), Value::from("Hello"));
    assert!(f.desk.load_shadow("Article", shadow.id()).unwrap().is_pending());
    assert!(f.hooks.entries().is_empty());

    let err = f.desk.reject(&mut shadow, &f.alice, "nope").unwrap_err();
    assert!(err.is_permission_denied());
}

#[test]
fn test_reject_leaves_origin_untouched() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("rewrite").set("title", "Nope"))
        .unwrap();

    f.desk.reject(&mut shadow, &f.reviewer, "off topic").unwrap();

    assert_eq!(title_of(&f), Value::from("Hello"));
    let stored = f.desk.load_shadow("Article", shadow.id()).unwrap();
    assert_eq!(stored.status(), Some(ReviewStatus::Rejected));
    assert_eq!(stored.reject_reason(), "off topic");
    assert_eq!(
        f.hooks.entries(),
        vec![format!("reject {} rita off topic", shadow.id())]
    );
}

#[test]
fn test_transition_after_terminal_state_fails() {
    let f = fixture();
    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("rewrite").set("title", "Once"))
        .unwrap();
    f.desk.publish(&mut shadow, &f.reviewer).unwrap();

    // A stale copy still thinks it is pending.
    let mut stale = shadow.clone();
    stale.set("review_status", ReviewStatus::Pending.code());
    stale.set("title", "Twice");

    assert!(f.desk.publish(&mut stale, &f.reviewer).unwrap_err().is_permission_denied());
    assert!(f.desk.reject(&mut stale, &f.reviewer, "late").unwrap_err().is_permission_denied());
    assert_eq!(title_of(&f), Value::from("Once"));
    assert_eq!(f.hooks.entries().len(), 1);
}

#[test]
fn test_through_relation_replaced_on_publish() {
    let f = fixture();
    let store = f.desk.store();
    store
        .insert(
            Record::new("ArticleTag")
                .with("article", f.article.id.clone())
                .with("tag", f.rust.id.clone())
                .with("weight", 1i64),
        )
        .unwrap();

    let mut shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(
            NewSuggestion::new("retag")
                .pivot("tags", PivotRow::new(f.python.id.clone()).with("weight", 2i64)),
        )
        .unwrap();

    let delta = f.desk.diff(&shadow).unwrap();
    assert_eq!(delta.changed_attributes, vec!["tags"]);

    f.desk.publish(&mut shadow, &f.reviewer).unwrap();

    let rows = store
        .query(
            "ArticleTag",
            &Query::from(Filter::all().eq("article", f.article.id.clone())),
        )
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].get_ref("tag"), Some(&f.python.id));
    assert_eq!(rows[0].get("weight"), &Value::Integer(2));
}

#[test]
fn test_through_rows_copied_from_origin_by_default() {
    let f = fixture();
    f.desk
        .store()
        .insert(
            Record::new("ArticleTag")
                .with("article", f.article.id.clone())
                .with("tag", f.rust.id.clone())
                .with("weight", 5i64),
        )
        .unwrap();

    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("no tag change"))
        .unwrap();

    let pivots = f.desk.pivots(&shadow, "tags").unwrap();
    assert_eq!(pivots.len(), 1);
    assert_eq!(pivots[0].entity, "EditSuggestionArticleTag");
    assert_eq!(pivots[0].get_ref("article"), Some(shadow.id()));
    assert_eq!(pivots[0].get("weight"), &Value::Integer(5));
    assert!(f.desk.diff(&shadow).unwrap().is_empty());
}

#[test]
fn test_publish_restamps_auto_now_on_origin() {
    let page = EntitySchema::new(
        "Page",
        vec![
            AttributeDescriptor::identity("id"),
            AttributeDescriptor::text("title", 120),
            AttributeDescriptor::timestamp("created").auto_now_add(),
            AttributeDescriptor::timestamp("edited").auto_now(),
        ],
    );
    let mut builder = RegistryBuilder::new();
    builder
        .register(&page, "edit_suggestions", ShadowConfig::staff_only())
        .unwrap();
    let desk = ReviewDesk::new(
        Arc::new(builder.finish()),
        SqliteStore::open_in_memory().unwrap(),
    );

    let long_ago = Utc::now() - Duration::days(30);
    let origin = Record::new("Page")
        .with("title", "Draft")
        .with("created", long_ago)
        .with("edited", long_ago);
    desk.store().insert(origin.clone()).unwrap();

    let mut shadow = desk
        .suggestions("Page", &origin.id)
        .unwrap()
        .create(NewSuggestion::new("retitle").set("title", "Final"))
        .unwrap();
    assert_eq!(shadow.get("edited"), &Value::Timestamp(long_ago));

    let before_publish = Utc::now();
    desk.publish(&mut shadow, &Actor::staff("rita")).unwrap();

    let stored = desk.store().get("Page", &origin.id).unwrap().unwrap();
    assert_eq!(stored.get_text("title"), Some("Final"));
    assert!(stored.get("edited").as_timestamp().unwrap() >= &before_publish);
    assert_eq!(stored.get("created"), &Value::Timestamp(long_ago));
}

// =============================================================================
// SELF-REFERENTIAL RELATIONS
// =============================================================================

#[test]
fn test_self_relation_resolves_to_source() {
    let f = fixture();
    let sequel = Record::new("Article").with("title", "Hello again");
    f.desk.store().insert(sequel.clone()).unwrap();

    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("link sequel"))
        .unwrap();
    f.desk
        .add_members(&shadow, "related", &[sequel.id.clone()])
        .unwrap();

    let schema = f.desk.schema("Article").unwrap();
    assert_eq!(schema.relation("related").unwrap().target, "Article");

    let members = f.desk.members(&shadow, "related").unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].entity, "Article");
    assert_eq!(members[0].id, sequel.id);
}

// =============================================================================
// DISPLAY AND DELETION
// =============================================================================

#[test]
fn test_describe() {
    let f = fixture();
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("typo").by(&f.alice))
        .unwrap();
    assert_eq!(
        f.desk.describe(&shadow).unwrap(),
        "Edit suggestion by alice for \"Hello\""
    );
}

#[test]
fn test_delete_source_cascades() {
    let f = fixture();
    let accessor = f.desk.suggestions("Article", &f.article.id).unwrap();
    let shadow = accessor
        .create(NewSuggestion::new("one").members("labels", vec![f.rust.id.clone()]))
        .unwrap();
    f.desk
        .add_pivot(&shadow, "tags", PivotRow::new(f.python.id.clone()).with("weight", 3i64))
        .unwrap();
    accessor.create(NewSuggestion::new("two")).unwrap();

    let removed = f.desk.delete_source("Article", &f.article.id).unwrap();
    assert_eq!(removed, 2);

    let store = f.desk.store();
    assert!(store.get("Article", &f.article.id).unwrap().is_none());
    assert_eq!(store.count("EditSuggestionArticle", &Filter::all()).unwrap(), 0);
    assert_eq!(store.count("EditSuggestionArticleTag", &Filter::all()).unwrap(), 0);
    assert!(store
        .members(
            &redline_store::RelationKey::new("EditSuggestionArticle", "labels"),
            shadow.id()
        )
        .unwrap()
        .is_empty());
}

#[test]
fn test_delete_shadow() {
    let f = fixture();
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(NewSuggestion::new("gone"))
        .unwrap();
    assert!(f.desk.delete_shadow(&shadow).unwrap());
    assert!(!f.desk.delete_shadow(&shadow).unwrap());
    assert!(matches!(
        f.desk.load_shadow("Article", shadow.id()).unwrap_err(),
        SuggestError::NotFound(_)
    ));
}

// =============================================================================
// INTAKE
// =============================================================================

#[test]
fn test_json_intake_creates_suggestion() {
    let f = fixture();
    let schema = f.desk.schema("Article").unwrap().clone();
    let data = serde_json::json!({
        "reason": "from the form",
        "title": "Posted",
        "labels": [f.rust.id.to_string()],
        "tags": [{ "pk": f.python.id.to_string(), "weight": 7 }],
        "csrf": "ignored"
    });

    let new = NewSuggestion::from_json(&schema, Some(&f.alice), &data).unwrap();
    let shadow = f
        .desk
        .suggestions("Article", &f.article.id)
        .unwrap()
        .create(new)
        .unwrap();

    assert_eq!(shadow.get("title"), &Value::from("Posted"));
    assert_eq!(shadow.actor_id(), Some(&RecordId::from(f.alice.id.clone())));
    let labels = f.desk.members(&shadow, "labels").unwrap();
    assert_eq!(labels[0].get_text("name"), Some("rust"));
    let pivots = f.desk.pivots(&shadow, "tags").unwrap();
    assert_eq!(pivots[0].get("weight"), &Value::Integer(7));

    let delta = f.desk.diff(&shadow).unwrap();
    assert_eq!(delta.changed_attributes, vec!["title", "labels", "tags"]);
}
