mod common;

use bson::{Bson, doc};
use common::RecordingStore;
use nexus_odm::{
    App, CrudService, DocumentId, MemoryStore, Model, ModelRegistry, Params, Schema, Service,
    ServiceConfig, Store,
};
use std::sync::Arc;

fn models() -> [Model; 2] {
    [
        Model::new(
            "post",
            Schema::new().required("title").embedded("comments").references("tags", "tag"),
        ),
        Model::new("tag", Schema::new().required("name")),
    ]
}

fn posts() -> (Arc<RecordingStore>, Service<RecordingStore>) {
    let store = Arc::new(RecordingStore::default());
    for m in models() {
        store.inner.register_model(m);
    }
    let svc = Service::new(store.clone(), "post", ServiceConfig::default()).unwrap();
    (store, svc)
}

fn ids(items: &[Bson]) -> Vec<DocumentId> {
    items
        .iter()
        .map(|i| match i {
            Bson::ObjectId(oid) => DocumentId(*oid),
            Bson::Document(d) => DocumentId::from_bson(d.get("_id").unwrap()).unwrap(),
            other => panic!("unexpected item {other}"),
        })
        .collect()
}

#[tokio::test]
async fn add_creates_and_links_new_referenced_item() {
    let (store, svc) = posts();
    let post = svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let tag = svc
        .add_to_collection(&post.id.to_hex(), "tags", doc! { "name": "new" }, Params::default())
        .await
        .unwrap();
    assert_eq!(tag.get_str("name").unwrap(), "new");
    let tag_id = DocumentId::from_bson(tag.get("_id").unwrap()).unwrap();

    assert_eq!(store.inner.count("tag"), 1);
    let owner = svc.get(&post.id.to_hex(), Params::default()).await.unwrap();
    assert_eq!(ids(owner.data.get_array("tags").unwrap()), vec![tag_id]);
}

#[tokio::test]
async fn linking_twice_is_forbidden_without_duplicating() {
    let (store, svc) = posts();
    let post = svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let tag = store.inner.insert("tag", doc! { "name": "t" }).await.unwrap();
    let pid = post.id.to_hex();

    svc.add_to_collection(&pid, "tags", doc! { "_id": tag.id.0 }, Params::default())
        .await
        .unwrap();
    let err = svc
        .add_to_collection(&pid, "tags", doc! { "_id": tag.id.to_hex() }, Params::default())
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let owner = svc.get(&pid, Params::default()).await.unwrap();
    assert_eq!(ids(owner.data.get_array("tags").unwrap()), vec![tag.id]);
}

#[tokio::test]
async fn linking_unknown_document_is_not_found() {
    let (_, svc) = posts();
    let post = svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let err = svc
        .add_to_collection(
            &post.id.to_hex(),
            "tags",
            doc! { "_id": DocumentId::new().0 },
            Params::default(),
        )
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn embedded_items_get_an_id_and_respect_set_semantics() {
    let (_, svc) = posts();
    let post = svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let pid = post.id.to_hex();
    let comment = svc
        .add_to_collection(&pid, "comments", doc! { "body": "hi" }, Params::default())
        .await
        .unwrap();
    assert_eq!(comment.get_str("body").unwrap(), "hi");
    let cid = comment.get_object_id("_id").unwrap();

    let err = svc
        .add_to_collection(&pid, "comments", doc! { "_id": cid, "body": "again" }, Params::default())
        .await
        .unwrap_err();
    assert!(err.is_forbidden());

    let items = svc.find_in_collection(&pid, "comments", Params::default()).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn non_collection_fields_fail_before_any_write() {
    let (store, svc) = posts();
    let post = svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let pid = post.id.to_hex();
    let item = DocumentId::new().to_hex();
    let writes = store.writes().len();

    for field in ["title", "missing"] {
        let errs = [
            svc.find_in_collection(&pid, field, Params::default()).await.unwrap_err(),
            svc.add_to_collection(&pid, field, doc! { "x": 1 }, Params::default())
                .await
                .unwrap_err(),
            svc.get_in_collection(&pid, field, &item, Params::default()).await.unwrap_err(),
            svc.remove_from_collection(&pid, field, &item, Params::default())
                .await
                .unwrap_err(),
        ];
        assert!(errs.iter().all(nexus_odm::DbError::is_not_found), "{errs:?}");
    }
    assert_eq!(store.writes().len(), writes);
}

#[tokio::test]
async fn missing_owner_is_not_found() {
    let (_, svc) = posts();
    let err = svc
        .find_in_collection(&DocumentId::new().to_hex(), "tags", Params::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn find_in_collection_populates_references() {
    let (store, svc) = posts();
    let a = store.inner.insert("tag", doc! { "name": "a", "color": "red" }).await.unwrap();
    let b = store.inner.insert("tag", doc! { "name": "b", "color": "blue" }).await.unwrap();
    let post = svc
        .create(doc! { "title": "p", "tags": [a.id.0, b.id.0] }, Params::default())
        .await
        .unwrap();
    let items = svc
        .find_in_collection(&post.id.to_hex(), "tags", Params::new(doc! { "$select": "name" }))
        .await
        .unwrap();
    assert_eq!(ids(&items), vec![a.id, b.id]);
    for item in &items {
        let Bson::Document(d) = item else { panic!("not populated: {item}") };
        assert!(d.contains_key("name"));
        assert!(!d.contains_key("color"));
    }
}

#[tokio::test]
async fn get_in_collection_returns_single_item() {
    let (store, svc) = posts();
    let a = store.inner.insert("tag", doc! { "name": "a" }).await.unwrap();
    let b = store.inner.insert("tag", doc! { "name": "b" }).await.unwrap();
    let stray = store.inner.insert("tag", doc! { "name": "stray" }).await.unwrap();
    let post = svc
        .create(
            doc! { "title": "p", "tags": [a.id.0, b.id.0], "comments": [ { "body": "c" } ] },
            Params::default(),
        )
        .await
        .unwrap();
    let pid = post.id.to_hex();

    let got = svc.get_in_collection(&pid, "tags", &b.id.to_hex(), Params::default()).await.unwrap();
    assert_eq!(got.get_str("name").unwrap(), "b");

    let err = svc
        .get_in_collection(&pid, "tags", &stray.id.to_hex(), Params::default())
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let comment_id = ids(post.data.get_array("comments").unwrap())[0];
    let comment = svc
        .get_in_collection(&pid, "comments", &comment_id.to_hex(), Params::default())
        .await
        .unwrap();
    assert_eq!(comment.get_str("body").unwrap(), "c");
}

#[tokio::test]
async fn remove_from_collection_pulls_and_persists() {
    let (store, svc) = posts();
    let a = store.inner.insert("tag", doc! { "name": "a" }).await.unwrap();
    let b = store.inner.insert("tag", doc! { "name": "b" }).await.unwrap();
    let post = svc
        .create(
            doc! { "title": "p", "tags": [a.id.0, b.id.0], "comments": [ { "body": "c" } ] },
            Params::default(),
        )
        .await
        .unwrap();
    let pid = post.id.to_hex();

    let owner = svc
        .remove_from_collection(&pid, "tags", &a.id.to_hex(), Params::default())
        .await
        .unwrap();
    assert_eq!(ids(owner.data.get_array("tags").unwrap()), vec![b.id]);
    // the referenced document itself is kept
    assert_eq!(store.inner.count("tag"), 2);

    let comment_id = ids(post.data.get_array("comments").unwrap())[0];
    let owner = svc
        .remove_from_collection(&pid, "comments", &comment_id.to_hex(), Params::default())
        .await
        .unwrap();
    assert!(owner.data.get_array("comments").unwrap().is_empty());

    // pulling an absent item leaves the collection as it was
    let owner = svc
        .remove_from_collection(&pid, "tags", &a.id.to_hex(), Params::default())
        .await
        .unwrap();
    assert_eq!(ids(owner.data.get_array("tags").unwrap()), vec![b.id]);

    let stored = svc.get(&pid, Params::default()).await.unwrap();
    assert_eq!(ids(stored.data.get_array("tags").unwrap()), vec![b.id]);
}

#[tokio::test]
async fn new_references_are_created_through_the_sibling_service() {
    let registry = Arc::new(ModelRegistry::new());
    for m in models() {
        registry.register(m);
    }
    let post_store = Arc::new(MemoryStore::with_registry(registry.clone()));
    let tag_store = Arc::new(MemoryStore::with_registry(registry));

    let app = App::new();
    let post_svc = Arc::new(Service::new(post_store.clone(), "post", ServiceConfig::default()).unwrap());
    app.register("posts", post_svc.clone());
    app.register("tags", Arc::new(Service::new(tag_store.clone(), "tag", ServiceConfig::default()).unwrap()));

    let post = post_svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let tag = post_svc
        .add_to_collection(&post.id.to_hex(), "tags", doc! { "name": "new" }, Params::default())
        .await
        .unwrap();

    assert_eq!(tag_store.count("tag"), 1);
    assert_eq!(post_store.count("tag"), 0);
    let tags = app.service("tags").unwrap();
    let fetched = tags.get(&tag.get_object_id("_id").unwrap().to_hex(), Params::default()).await.unwrap();
    assert_eq!(fetched.data.get_str("name").unwrap(), "new");
}

#[tokio::test]
async fn invalid_new_reference_is_a_validation_error() {
    let (store, svc) = posts();
    let post = svc.create(doc! { "title": "p" }, Params::default()).await.unwrap();
    let err = svc
        .add_to_collection(&post.id.to_hex(), "tags", doc! { "color": "red" }, Params::default())
        .await
        .unwrap_err();
    assert!(matches!(err, nexus_odm::DbError::Validation(_)));
    let owner = store.inner.find_by_id("post", &post.id, None).await.unwrap().unwrap();
    assert!(owner.data.get("tags").is_none());
}
