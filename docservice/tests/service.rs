mod common;

use common::{FaultyBackend, Picture, faulty_service, id, ids, ids_of, seeded_backend};
use docservice::{bson::doc, memory::InMemoryBackend, prelude::*};

fn params(pairs: &[(&str, &str)]) -> QueryParams {
    pairs.iter().copied().collect()
}

#[tokio::test]
async fn invalid_ids_never_reach_the_backend() {
    let (service, backend, _) = faulty_service().await;

    let errors = [
        service.get_by_id("abc").await.unwrap_err(),
        service.get_by_id(0).await.unwrap_err(),
        service.update_by_id("1.5", doc! { "likes": 1 }).await.unwrap_err(),
        service.delete_by_id(-2).await.unwrap_err(),
    ];

    for err in &errors {
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(err.status_code(), 481);
    }
    assert_eq!(errors[0].message(), "id must be an integer");
    assert_eq!(errors[1].message(), "id must be a positive integer");
    assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn get_by_id_accepts_numeric_strings() {
    let (service, _, _) = faulty_service().await;

    let dog = service.get_by_id("3").await.unwrap().unwrap();
    assert_eq!(dog.title, "Dog");
    assert_eq!(dog.secret.as_deref(), Some("hidden"));
    assert!(dog.created_at.is_some());

    assert_eq!(service.get_by_id(99).await.unwrap(), None);
}

#[tokio::test]
async fn paginated_listing_applies_filters() {
    let (service, _, _) = faulty_service().await;

    let page = service
        .get_paginated(&params(&[("title__ilike", "BLACK")]))
        .await
        .unwrap();

    assert_eq!(ids_of(&page.docs), ids(&[1, 4]));
    assert_eq!((page.total, page.page, page.limit, page.pages), (2, 1, 15, 1));

    let page = service
        .get_paginated(&params(&[("title__like", "cat"), ("likes__lt", "5")]))
        .await
        .unwrap();
    assert_eq!(ids_of(&page.docs), ids(&[2]));

    let page = service
        .get_paginated(&params(&[("title__in", "Dog,Bird"), ("likes", "7")]))
        .await
        .unwrap();
    assert_eq!(ids_of(&page.docs), ids(&[3, 5]));

    let page = service
        .get_paginated(&params(&[("likes__nin", "7,10")]))
        .await
        .unwrap();
    assert_eq!(ids_of(&page.docs), ids(&[2, 4]));
}

#[tokio::test]
async fn between_with_multi_key_order() {
    let (service, _, _) = faulty_service().await;

    let page = service
        .get_paginated(&params(&[("likes__between", "3,7"), ("order", "-likes,title")]))
        .await
        .unwrap();

    assert_eq!(ids_of(&page.docs), ids(&[5, 3, 2]));

    let page = service
        .get_paginated(&params(&[("likes__between", ",3")]))
        .await
        .unwrap();
    assert_eq!(ids_of(&page.docs), ids(&[2, 4]));
}

#[tokio::test]
async fn pages_through_sorted_results() {
    let (service, _, _) = faulty_service().await;

    let page = service
        .get_paginated(&params(&[("limit", "2"), ("page", "2"), ("order", "likes")]))
        .await
        .unwrap();

    assert_eq!(ids_of(&page.docs), ids(&[3, 5]));
    assert_eq!((page.total, page.page, page.limit, page.pages), (5, 2, 2, 3));

    let beyond = service
        .get_paginated(&params(&[("limit", "2"), ("page", "9")]))
        .await
        .unwrap();
    assert!(beyond.docs.is_empty());
    assert_eq!(beyond.total, 5);
}

#[tokio::test]
async fn invalid_pagination_falls_back_to_defaults() {
    let (service, _, _) = faulty_service().await;

    let page = service
        .get_paginated(&params(&[("page", "abc"), ("limit", "-1"), ("order", "secret,nope")]))
        .await
        .unwrap();

    assert_eq!((page.page, page.limit), (1, 15));
    assert_eq!(ids_of(&page.docs), ids(&[1, 2, 3, 4, 5]));
}

#[tokio::test]
async fn configured_pagination_defaults_apply() {
    let settings = ServiceSettings {
        pagination: PaginationDefaults { page: 2, limit: 2 },
        ..ServiceSettings::default()
    };
    let service = ModelService::<Picture, _>::with_settings(seeded_backend().await, settings);

    let page = service.get_paginated(&QueryParams::new()).await.unwrap();

    assert_eq!(ids_of(&page.docs), ids(&[3, 4]));
    assert_eq!((page.page, page.limit), (2, 2));
}

#[tokio::test]
async fn unqueryable_and_unknown_parameters_are_ignored() {
    let (service, _, _) = faulty_service().await;

    let page = service
        .get_paginated(&params(&[
            ("secret", "hidden"),
            ("foo", "bar"),
            ("title__gt", "A"),
            ("likes__ilike", "1"),
            ("title__unknown", "x"),
        ]))
        .await
        .unwrap();

    assert_eq!(page.total, 5);
}

#[tokio::test]
async fn malformed_filters_fail() {
    let (service, _, _) = faulty_service().await;

    let err = service
        .get_paginated(&params(&[("likes__between", "1,2,3")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "Between filter requires 2 values comma separated");

    let err = service
        .get_paginated(&params(&[("likes__gte", "many")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .get_paginated(&params(&[("created_at__gt", "2020-01-01")]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotImplemented);
    assert_eq!(err.status_code(), 501);
}

#[tokio::test]
async fn create_one_assigns_ids_and_fires_created() {
    let (service, _, log) = faulty_service().await;

    let fish = service.create_one(doc! { "title": "Fish", "likes": 2 }).await.unwrap();

    assert_eq!(fish.id, id(6));
    assert_eq!(fish.likes, 2);
    assert!(fish.created_at.is_some());
    assert_eq!(fish.created_at, fish.updated_at);
    assert_eq!(log.entries(), vec![(EventName::Created, id(6))]);
    assert_eq!(service.get_by_id(6).await.unwrap(), Some(fish));
}

#[tokio::test]
async fn create_one_normalizes_backend_failures() {
    let (service, _, log) = faulty_service().await;

    let err = service
        .create_one(doc! { "id": 2, "title": "Copy", "likes": 1 })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.details()[0].property, "id");
    assert_eq!(err.details()[0].kind, "unique");

    let err = service.create_one(doc! { "title": "No likes" }).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.message(), "likes is required");

    let err = service
        .create_one(doc! { "title": "Typed", "likes": "lots" })
        .await
        .unwrap_err();
    assert_eq!(err.details()[0].kind, "type");

    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn update_of_missing_document_returns_empty_result() {
    let (service, _, log) = faulty_service().await;

    let result = service.update_by_id(99, doc! { "likes": 1 }).await.unwrap();

    assert_eq!(result, UpdateResult::not_found());
    assert!(!result.is_found());
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn empty_patch_is_a_silent_success() {
    let (service, backend, log) = faulty_service().await;
    backend.refuse_updates();

    let result = service.update_by_id(2, doc! {}).await.unwrap();

    assert_eq!(result.document.as_ref().map(|p| p.id), Some(id(2)));
    assert_eq!(result.document, result.updated);
    assert_eq!(result.error, None);
    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn update_by_id_refetches_and_fires_updated() {
    let (service, _, log) = faulty_service().await;

    let result = service.update_by_id(2, doc! { "likes": 4 }).await.unwrap();

    let before = result.document.unwrap();
    let after = result.updated.unwrap();
    assert_eq!(before.likes, 3);
    assert_eq!(after.likes, 4);
    assert_eq!(after.title, "White cat");
    assert_eq!(result.error, None);
    assert_eq!(log.entries(), vec![(EventName::Updated, id(2))]);
}

#[tokio::test]
async fn update_failures_are_reported_in_the_result() {
    let (service, backend, log) = faulty_service().await;
    backend.fail_updates_of(id(2));

    let failed = service.update_by_id(2, doc! { "likes": 4 }).await.unwrap();
    let err = failed.error.unwrap();
    assert_eq!(err.kind(), ErrorKind::Uncaught);
    assert!(err.message().contains("connection reset"));
    assert_eq!(failed.updated, None);
    assert!(failed.document.is_some());

    let immutable = service.update_by_id(3, doc! { "id": 30 }).await.unwrap();
    assert_eq!(immutable.error.map(|e| e.kind()), Some(ErrorKind::Validation));

    let invalid = service.update_by_id(3, doc! { "likes": "many" }).await.unwrap();
    assert_eq!(invalid.error.map(|e| e.kind()), Some(ErrorKind::Validation));

    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn identical_patch_bumps_updated_at() {
    let (service, _, log) = faulty_service().await;

    let result = service.update_by_id(2, doc! { "likes": 3 }).await.unwrap();

    assert_eq!(result.error, None);
    let before = result.document.unwrap();
    let after = result.updated.unwrap();
    assert_eq!(after.likes, 3);
    assert!(after.updated_at >= before.updated_at);
    assert_eq!(log.entries(), vec![(EventName::Updated, id(2))]);
}

#[tokio::test]
async fn unmodified_documents_are_update_errors_without_updated_at() {
    let schema = Schema::builder()
        .number("id", false)
        .string("title", true)
        .number("likes", true)
        .build();
    let backend = InMemoryBackend::builder()
        .with_schema(schema)
        .with_document(doc! { "title": "Plain", "likes": 3 })
        .build()
        .await
        .unwrap();
    let service = ModelService::<Picture, _>::new(backend);

    let unchanged = service.update_by_id(1, doc! { "likes": 3 }).await.unwrap();
    assert_eq!(unchanged.error, Some(ServiceError::uncaught("Model update error")));

    let changed = service.update_by_id(1, doc! { "likes": 4 }).await.unwrap();
    assert_eq!(changed.updated.map(|p| p.likes), Some(4));
}

#[tokio::test]
async fn refused_updates_are_update_errors() {
    let (service, backend, log) = faulty_service().await;

    backend.refuse_updates();
    let refused = service.update_by_id(2, doc! { "likes": 8 }).await.unwrap();
    assert_eq!(refused.error, Some(ServiceError::uncaught("Model update error")));
    assert_eq!(service.get_by_id(2).await.unwrap().map(|p| p.likes), Some(3));

    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn delete_by_id_then_not_found() {
    let (service, _, log) = faulty_service().await;

    let dog = service.delete_by_id("3").await.unwrap();
    assert_eq!(dog.title, "Dog");
    assert_eq!(service.get_by_id(3).await.unwrap(), None);

    let err = service.delete_by_id(3).await.unwrap_err();
    assert_eq!(err, ServiceError::not_found("pictures 3 not found"));
    assert_eq!(err.status_code(), 404);

    assert_eq!(log.entries(), vec![(EventName::Deleted, id(3))]);
}

#[tokio::test]
async fn unconfirmed_delete_by_id_is_uncaught() {
    let (service, backend, log) = faulty_service().await;

    backend.keep_on_remove(id(1));
    let err = service.delete_by_id(1).await.unwrap_err();
    assert_eq!(err, ServiceError::uncaught("Error while deleting the item"));

    backend.refuse_removes();
    let err = service.delete_by_id(2).await.unwrap_err();
    assert_eq!(err, ServiceError::uncaught("unable to delete the items"));

    assert!(log.entries().is_empty());
}

#[tokio::test]
async fn services_share_backends_through_arcs() {
    let backend: SharedBackend = std::sync::Arc::new(FaultyBackend::new(seeded_backend().await));
    let first = ModelService::<Picture>::new(backend.clone());
    let second = ModelService::<Picture>::new(backend);

    first.delete_by_id(1).await.unwrap();

    assert_eq!(second.get_by_id(1).await.unwrap(), None);
}

#[tokio::test]
async fn errors_serialize_to_envelopes() {
    let (service, _, _) = faulty_service().await;

    let err = service.get_by_id("abc").await.unwrap_err();

    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        serde_json::json!({
            "code": 481,
            "name": "ValidationError",
            "message": "id must be an integer",
            "details": [{
                "property": "id",
                "kind": "format",
                "message": "must be an integer",
                "value": "abc",
            }],
        })
    );
}
