//! Aggregation Module Tests
//!
//! ## Test Scopes
//! - **Types**: Group-by metadata, sum-by validation, row serialization.
//! - **Pipeline**: Stage construction per group-by.
//! - **Accumulator**: Cross-collection sums, falsy keys, ranking.
//! - **Engine**: End-to-end grouping over a seeded store.

#[cfg(test)]
mod tests {
    use crate::aggregate::engine::GroupAccumulator;
    use crate::aggregate::handlers::AggregateParams;
    use crate::aggregate::pipeline::build_pipeline;
    use crate::aggregate::types::{AggregateQuery, GroupBy, GroupCount, SumBy};
    use crate::days::{CollectionRef, DaySelection};
    use crate::engine::Engine;
    use crate::error::{EngineError, StoreError};
    use crate::posts::filter::PostFilter;
    use crate::test_utils::{
        CountingStore, UnavailableStore, day, doc, engine, oid, post_with, store_with,
    };
    use serde_json::json;

    fn tagged(n: u64, tags: &[&str]) -> crate::storage::types::Document {
        post_with(n, "article", json!({"tags": tags}))
    }

    fn keys(groups: &[GroupCount]) -> Vec<(String, f64)> {
        groups.iter().map(|g| (g.key.clone(), g.value)).collect()
    }

    fn collection(name: &str) -> CollectionRef {
        CollectionRef::parse(name).unwrap()
    }

    // ============================================================
    // TYPE TESTS
    // ============================================================

    #[test]
    fn test_group_by_metadata() {
        assert_eq!(GroupBy::Country.field_path(), "country");
        assert_eq!(GroupBy::Country.unwind_path(), None);
        assert_eq!(GroupBy::Tag.unwind_path(), Some("tags"));
        assert_eq!(GroupBy::SiblingRef.field_path(), "siblings._id");
        assert_eq!(GroupBy::RelatedRef.unwind_path(), Some("related"));
        assert!(GroupBy::SiblingRef.is_self_relation());
        assert!(!GroupBy::Tag.is_self_relation());
    }

    #[test]
    fn test_score_sum_requires_matching_relation() {
        assert!(SumBy::Count.accumulator(GroupBy::Country).is_ok());
        assert_eq!(
            SumBy::SiblingScore.accumulator(GroupBy::SiblingRef).unwrap(),
            json!("$siblings.score")
        );
        for (sum_by, group_by) in [
            (SumBy::SiblingScore, GroupBy::Tag),
            (SumBy::SiblingScore, GroupBy::RelatedRef),
            (SumBy::RelatedScore, GroupBy::Country),
        ] {
            assert!(matches!(
                sum_by.accumulator(group_by),
                Err(EngineError::InvalidAggregation { .. })
            ));
        }
    }

    #[test]
    fn test_group_count_serialization() {
        let row = GroupCount {
            group_by: GroupBy::Tag,
            key: "Politique".to_string(),
            value: 3.0,
            doc: None,
        };
        assert_eq!(serde_json::to_value(&row).unwrap(), json!({"tag": "Politique", "value": 3}));

        let row = GroupCount {
            group_by: GroupBy::SiblingRef,
            key: oid(1),
            value: 0.75,
            doc: None,
        };
        assert_eq!(serde_json::to_value(&row).unwrap(), json!({"sibling": oid(1), "value": 0.75}));
    }

    #[test]
    fn test_group_by_names_deserialize() {
        let group_by: GroupBy = serde_json::from_value(json!("countries")).unwrap();
        assert_eq!(group_by, GroupBy::Country);
        let sum_by: SumBy = serde_json::from_value(json!("related")).unwrap();
        assert_eq!(sum_by, SumBy::RelatedScore);
        assert!(serde_json::from_value::<GroupBy>(json!("authors")).is_err());
    }

    // ============================================================
    // PIPELINE TESTS
    // ============================================================

    #[test]
    fn test_pipeline_for_scalar_field() {
        let pipeline = build_pipeline(
            collection("2024-03-01"),
            json!({}),
            GroupBy::Country,
            SumBy::Count,
            true,
        )
        .unwrap();
        assert_eq!(
            pipeline,
            vec![
                json!({"$match": {}}),
                json!({"$group": {"_id": "$country", "value": {"$sum": 1}}}),
                json!({"$sort": {"value": -1}}),
            ]
        );
    }

    #[test]
    fn test_pipeline_for_self_relation() {
        let pipeline = build_pipeline(
            collection("2024-03-01"),
            json!({"type": "metapost"}),
            GroupBy::RelatedRef,
            SumBy::RelatedScore,
            true,
        )
        .unwrap();
        assert_eq!(pipeline.len(), 5);
        assert_eq!(pipeline[1], json!({"$unwind": "$related"}));
        assert_eq!(
            pipeline[2],
            json!({"$group": {"_id": "$related._id", "value": {"$sum": "$related.score"}}})
        );
        assert_eq!(
            pipeline[3],
            json!({"$lookup": {"from": "2024-03-01", "localField": "_id", "foreignField": "_id", "as": "doc"}})
        );

        let without_docs = build_pipeline(
            collection("2024-03-01"),
            json!({}),
            GroupBy::RelatedRef,
            SumBy::Count,
            false,
        )
        .unwrap();
        assert!(without_docs.iter().all(|stage| stage.get("$lookup").is_none()));
    }

    // ============================================================
    // ACCUMULATOR TESTS
    // ============================================================

    #[test]
    fn test_accumulator_sums_recurring_keys() {
        let mut acc = GroupAccumulator::new();
        acc.merge_rows(collection("2024-03-01"), vec![doc(json!({"_id": "fr", "value": 2}))]);
        acc.merge_rows(collection("2024-03-02"), vec![doc(json!({"_id": "fr", "value": 3}))]);
        acc.merge_rows(collection("2024-03-03"), vec![doc(json!({"_id": "fr", "value": 1}))]);
        assert_eq!(acc.len(), 1);
        let ranked = acc.into_ranked();
        assert_eq!(ranked[0].sum, 6.0);
    }

    #[test]
    fn test_accumulator_drops_falsy_keys() {
        let mut acc = GroupAccumulator::new();
        acc.merge_rows(
            collection("2024-03-01"),
            vec![
                doc(json!({"_id": null, "value": 4})),
                doc(json!({"_id": "", "value": 4})),
                doc(json!({"_id": false, "value": 4})),
                doc(json!({"_id": 0, "value": 4})),
                doc(json!({"value": 4})),
                doc(json!({"_id": "kept", "value": 1})),
            ],
        );
        let ranked = acc.into_ranked();
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].key, "kept");
    }

    #[test]
    fn test_accumulator_ranks_ties_by_key_and_keeps_first_representative() {
        let mut acc = GroupAccumulator::new();
        acc.merge_rows(
            collection("2024-03-01"),
            vec![
                doc(json!({"_id": "b", "value": 1, "doc": [{"_id": oid(1)}]})),
                doc(json!({"_id": "a", "value": 1})),
            ],
        );
        acc.merge_rows(
            collection("2024-03-02"),
            vec![doc(json!({"_id": "b", "value": 1, "doc": [{"_id": oid(2)}]}))],
        );

        let ranked = acc.into_ranked();
        assert_eq!(ranked.iter().map(|g| g.key.as_str()).collect::<Vec<_>>(), vec!["b", "a"]);
        let (from, representative) = ranked[0].representative.clone().unwrap();
        assert_eq!(from, collection("2024-03-01"));
        assert_eq!(representative["_id"], json!(oid(1)));

        let mut tie = GroupAccumulator::new();
        tie.add("z".to_string(), 2.0, None);
        tie.add("m".to_string(), 2.0, None);
        let ranked = tie.into_ranked();
        assert_eq!(ranked[0].key, "m");
    }

    // ============================================================
    // ENGINE TESTS
    // ============================================================

    #[tokio::test]
    async fn test_tags_are_ranked_across_collections() {
        let store = store_with(vec![
            ("2024-03-01", vec![tagged(1, &["Politique"]), tagged(2, &["Politique"])]),
            ("2024-03-02", vec![tagged(3, &["Politique"]), tagged(4, &["Culture"])]),
        ]);
        let engine = engine(store);

        let groups = engine.tag_counts(DaySelection::All).await.unwrap();
        assert_eq!(
            serde_json::to_value(&groups).unwrap(),
            json!([{"tag": "Politique", "value": 3}, {"tag": "Culture", "value": 1}])
        );
    }

    #[tokio::test]
    async fn test_ranking_reflects_every_collection() {
        // the last collection alone would rank "us" first
        let store = store_with(vec![
            ("2024-03-01", (1..=3).map(|n| post_with(n, "article", json!({"country": "fr"}))).collect()),
            ("2024-03-02", (4..=5).map(|n| post_with(n, "article", json!({"country": "us"}))).collect()),
            ("2024-03-03", vec![
                post_with(6, "article", json!({"country": "us"})),
                post_with(7, "article", json!({"country": "fr"})),
                post_with(8, "article", json!({"country": null})),
                post_with(9, "article", json!({"country": ""})),
            ]),
        ]);
        let engine = engine(store);

        let groups = engine
            .aggregate_group(&AggregateQuery::new(GroupBy::Country))
            .await
            .unwrap();
        assert_eq!(keys(&groups), vec![("fr".to_string(), 4.0), ("us".to_string(), 3.0)]);
        assert!(groups.iter().all(|g| g.doc.is_none()));
    }

    #[tokio::test]
    async fn test_sibling_scores_with_representatives() {
        let store = store_with(vec![
            (
                "2024-03-01",
                vec![
                    post_with(1, "article", json!({"siblings": [{"_id": oid(2), "score": 0.5}]})),
                    post_with(2, "article", json!({"siblings": [{"_id": oid(1), "score": 0.5}]})),
                    post_with(3, "metapost", json!({"siblings": [
                        {"_id": oid(1), "score": 0.25},
                        {"_id": oid(2), "score": 1}
                    ]})),
                ],
            ),
            (
                "2024-03-02",
                vec![post_with(10, "metapost", json!({"siblings": [{"_id": oid(1), "score": 2}]}))],
            ),
        ]);
        let engine = engine(store);

        let query = AggregateQuery {
            sum_by: SumBy::SiblingScore,
            ..AggregateQuery::new(GroupBy::SiblingRef)
        };
        let groups = engine.aggregate_group(&query).await.unwrap();

        // oid(1) is referenced from both days; the post 10 reference dangles
        assert_eq!(keys(&groups), vec![(oid(1), 2.75), (oid(2), 1.5)]);

        let representative = groups[0].doc.as_ref().unwrap();
        assert_eq!(representative.id(), Some(oid(1).as_str()));
        let siblings = representative.siblings.as_deref().unwrap();
        assert_eq!(siblings[0].id(), Some(oid(2).as_str()));
        assert_eq!(siblings[0].get("score"), Some(&json!(0.5)));
        assert!(representative.previous.is_none());

        let json = serde_json::to_value(&groups[0]).unwrap();
        assert_eq!(json["sibling"], json!(oid(1)));
        assert_eq!(json["doc"]["id"], json!(oid(1)));
    }

    #[tokio::test]
    async fn test_representatives_expand_configured_similar_fields() {
        let store = store_with(vec![(
            "2024-03-01",
            vec![
                post_with(1, "article", json!({
                    "siblings": [{"_id": oid(3), "score": 1}],
                    "related": [{"_id": oid(3), "score": 1}]
                })),
                post_with(2, "metapost", json!({"siblings": [{"_id": oid(1), "score": 1}]})),
                post_with(3, "article", json!({})),
            ],
        )]);
        let config = crate::config::EngineConfig {
            similar_fields: vec![crate::posts::types::SimilarityField::Related],
            ..Default::default()
        };
        let engine = Engine::new(std::sync::Arc::new(store), config);

        let query = AggregateQuery {
            sum_by: SumBy::SiblingScore,
            ..AggregateQuery::new(GroupBy::SiblingRef)
        };
        let groups = engine.aggregate_group(&query).await.unwrap();
        let representative = groups
            .iter()
            .find(|g| g.key == oid(1))
            .and_then(|g| g.doc.as_ref())
            .unwrap();
        assert!(representative.siblings.is_none());
        assert_eq!(representative.related.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_unreadable_representative_is_skipped() {
        let store = store_with(vec![(
            "2024-03-01",
            vec![
                post_with(1, "article", json!({"related": [
                    {"_id": 7, "score": 2},
                    {"_id": oid(2), "score": 1}
                ]})),
                post_with(2, "article", json!({})),
                doc(json!({"_id": 7, "type": "article"})),
            ],
        )]);
        let engine = engine(store);

        let query = AggregateQuery {
            sum_by: SumBy::RelatedScore,
            ..AggregateQuery::new(GroupBy::RelatedRef)
        };
        let groups = engine.aggregate_group(&query).await.unwrap();
        assert_eq!(keys(&groups), vec![("7".to_string(), 2.0), (oid(2), 1.0)]);
        assert!(groups[0].doc.is_none());
        assert_eq!(groups[1].doc.as_ref().and_then(|d| d.id()), Some(oid(2).as_str()));
    }

    #[tokio::test]
    async fn test_docs_can_be_left_out() {
        let store = store_with(vec![(
            "2024-03-01",
            vec![
                post_with(1, "article", json!({"related": [{"_id": oid(2), "score": 1}]})),
                post_with(2, "article", json!({})),
            ],
        )]);
        let engine = engine(store);
        let query = AggregateQuery {
            include_docs: false,
            ..AggregateQuery::new(GroupBy::RelatedRef)
        };
        let groups = engine.aggregate_group(&query).await.unwrap();
        assert_eq!(keys(&groups), vec![(oid(2), 1.0)]);
        assert!(groups[0].doc.is_none());
    }

    #[tokio::test]
    async fn test_filter_and_limit() {
        let store = store_with(vec![(
            "2024-03-01",
            vec![
                post_with(1, "article", json!({"category": "a", "country": "fr"})),
                post_with(2, "article", json!({"category": "a", "country": "fr"})),
                post_with(3, "article", json!({"category": "b", "country": "fr"})),
                post_with(4, "article", json!({"category": "c", "country": "us"})),
            ],
        )]);
        let engine = engine(store);
        let query = AggregateQuery {
            filter: PostFilter {
                countries: Some(vec!["fr".to_string()]),
                ..PostFilter::default()
            },
            limit: Some(1),
            ..AggregateQuery::new(GroupBy::Category)
        };
        let groups = engine.aggregate_group(&query).await.unwrap();
        assert_eq!(keys(&groups), vec![("a".to_string(), 2.0)]);
    }

    #[tokio::test]
    async fn test_empty_inclusion_set_skips_store() {
        let store = CountingStore::new(store_with(vec![("2024-03-01", vec![tagged(1, &["x"])])]));
        let engine = Engine::new(store.clone(), Default::default());
        let query = AggregateQuery {
            filter: PostFilter {
                countries: Some(vec![]),
                ..PostFilter::default()
            },
            ..AggregateQuery::new(GroupBy::Tag)
        };
        assert!(engine.aggregate_group(&query).await.unwrap().is_empty());
        assert_eq!(store.total(), 0);
    }

    #[tokio::test]
    async fn test_invalid_combination_fails_before_store() {
        let store = CountingStore::new(store_with(vec![("2024-03-01", vec![tagged(1, &["x"])])]));
        let engine = Engine::new(store.clone(), Default::default());
        let query = AggregateQuery {
            sum_by: SumBy::RelatedScore,
            ..AggregateQuery::new(GroupBy::Tag)
        };
        let err = engine.aggregate_group(&query).await.unwrap_err();
        assert!(matches!(err, EngineError::InvalidAggregation { group_by: "tags", sum_by: "related" }));
        assert_eq!(store.total(), 0);
    }

    #[tokio::test]
    async fn test_one_pipeline_per_selected_collection() {
        let store = CountingStore::new(store_with(vec![
            ("2024-03-01", vec![tagged(1, &["x"])]),
            ("2024-03-02", vec![tagged(2, &["x"])]),
            ("2024-03-03", vec![tagged(3, &["y"])]),
        ]));
        let engine = Engine::new(store.clone(), Default::default());
        let query = AggregateQuery {
            days: DaySelection::new(None, Some(day("2024-03-02")), None).unwrap(),
            ..AggregateQuery::new(GroupBy::Tag)
        };
        let groups = engine.aggregate_group(&query).await.unwrap();
        assert_eq!(keys(&groups), vec![("x".to_string(), 1.0), ("y".to_string(), 1.0)]);
        assert_eq!(store.aggregates(), 2);
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let engine = engine(UnavailableStore {
            collections: vec!["2024-03-01".to_string(), "2024-03-02".to_string()],
        });
        let err = engine
            .aggregate_group(&AggregateQuery::new(GroupBy::Country))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(StoreError::Unavailable(_))));
    }

    // ============================================================
    // HTTP PARAMETER TESTS
    // ============================================================

    #[test]
    fn test_aggregate_params_to_query() {
        let params: AggregateParams = serde_json::from_value(json!({
            "group_by": "siblings",
            "sum_by": "siblings",
            "days": "2024-03-01",
            "countries": "fr,us"
        }))
        .unwrap();
        let query = params.to_query().unwrap();
        assert_eq!(query.group_by, GroupBy::SiblingRef);
        assert_eq!(query.sum_by, SumBy::SiblingScore);
        assert_eq!(query.days, DaySelection::days([day("2024-03-01")]));
        assert_eq!(query.filter.countries, Some(vec!["fr".to_string(), "us".to_string()]));
        assert!(query.include_docs);

        let defaults: AggregateParams = serde_json::from_value(json!({"group_by": "tags"})).unwrap();
        assert_eq!(defaults.sum_by, SumBy::Count);
        assert_eq!(defaults.to_query().unwrap().days, DaySelection::All);
    }
}
