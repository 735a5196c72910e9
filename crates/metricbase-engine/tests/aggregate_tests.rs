mod common;

use common::{column, community, engine, request, social_events};
use metricbase_engine::{
    AggregateRequest, AggregationEngine, ConfigurationError, DataQualityIssue, EngineError,
    EngineSettings, EntityKind, Granularity, MetricCatalog, MetricDefinition, MissingKeyPolicy,
    Table, TimeGrain, UnknownMetricPolicy, Value,
};
use pretty_assertions::assert_eq;

fn catalog() -> MetricCatalog {
    MetricCatalog::from_definitions([
        MetricDefinition::sum("total_events", "events"),
        MetricDefinition::percentage("completion_rate", "done", "total"),
        MetricDefinition::simple_average("avg_score", "score"),
        MetricDefinition::distinct_count("people", "person"),
    ])
    .unwrap()
}

fn nums(values: &[f64]) -> Vec<Value> {
    values.iter().map(|&v| Value::from(v)).collect()
}

#[test]
fn cumulative_sum_groups_by_community() {
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("total_events", "events")]).unwrap();
    let request = AggregateRequest::new(community(TimeGrain::CumulativeMonthly), 202501, 202501);

    let table = engine()
        .aggregate(&social_events(), &catalog, &request)
        .unwrap();

    assert_eq!(table.columns(), &["community", "total_events"].map(String::from));
    assert_eq!(
        table.rows().map(<[Value]>::to_vec).collect::<Vec<_>>(),
        vec![
            vec![Value::from("A"), Value::from(60.0)],
            vec![Value::from("B"), Value::from(30.0)],
        ]
    );
}

#[test]
fn ratios_divide_group_sums_rather_than_averaging_row_ratios() {
    let table = engine()
        .aggregate(
            &social_events(),
            &catalog(),
            &request(community(TimeGrain::CumulativeMonthly)),
        )
        .unwrap();

    // A: done 10+10 over total 20+0; B: done 20+10 over total 30+30.
    assert_eq!(column(&table, "completion_rate"), nums(&[1.0, 0.5]));
    assert_eq!(column(&table, "avg_score"), nums(&[(4.5 + 4.7) / 2.0, (4.2 + 4.9) / 2.0]));
    assert_eq!(column(&table, "people"), nums(&[2.0, 2.0]));
}

#[test]
fn zero_denominator_yields_null_and_an_issue() {
    let input = Table::from_rows(
        "zeros",
        vec!["period", "community", "done", "total"],
        vec![
            vec![202501.into(), "A".into(), 5.into(), 0.into()],
            vec![202501.into(), "B".into(), 5.into(), 10.into()],
        ],
    )
    .unwrap();
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::average_ratio("rate", "done", "total")])
            .unwrap();

    let output = engine()
        .aggregate_detailed(&input, &catalog, &request(community(TimeGrain::CumulativeMonthly)))
        .unwrap();

    assert_eq!(column(&output.table, "rate"), vec![Value::Null, Value::from(0.5)]);
    assert_eq!(
        output.issues,
        vec![DataQualityIssue::UndefinedRatio {
            metric: "rate".to_string(),
            groups: 1,
        }]
    );
}

#[test]
fn monthly_grain_keeps_one_row_per_period_and_entity() {
    let table = engine()
        .aggregate(&social_events(), &catalog(), &request(community(TimeGrain::Monthly)))
        .unwrap();

    assert_eq!(
        table.columns(),
        &[
            "period",
            "community",
            "total_events",
            "completion_rate",
            "avg_score",
            "people"
        ]
        .map(String::from)
    );
    assert_eq!(
        column(&table, "period"),
        vec![Value::from(202501), Value::from(202501), Value::from(202502)]
    );
    assert_eq!(
        column(&table, "community"),
        vec![Value::from("A"), Value::from("B"), Value::from("B")]
    );
    assert_eq!(column(&table, "total_events"), nums(&[60.0, 30.0, 90.0]));
}

#[test]
fn selecting_metrics_commutes_with_projection() {
    let engine = engine();
    let input = social_events();
    let base = request(community(TimeGrain::Monthly));

    let full = engine.aggregate(&input, &catalog(), &base).unwrap();
    let selected = engine
        .aggregate(
            &input,
            &catalog(),
            &base.clone().select_metrics(["people", "total_events"]),
        )
        .unwrap();

    // Output keeps catalog order, not selection order.
    assert_eq!(
        selected,
        full.select(&["period", "community", "total_events", "people"])
            .unwrap()
    );
}

#[test]
fn period_filter_is_inclusive_and_accepts_text_periods() {
    let input = Table::from_rows(
        "text_periods",
        vec!["period", "community", "events"],
        vec![
            vec!["202412".into(), "A".into(), 1.into()],
            vec!["202501".into(), "A".into(), 2.into()],
            vec!["202503".into(), "A".into(), 4.into()],
            vec!["202504".into(), "A".into(), 8.into()],
        ],
    )
    .unwrap();
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("events", "events")]).unwrap();
    let request = AggregateRequest::new(community(TimeGrain::CumulativeMonthly), 202501, 202503);

    let table = engine().aggregate(&input, &catalog, &request).unwrap();
    assert_eq!(column(&table, "events"), nums(&[6.0]));
}

#[test]
fn rows_without_period_or_identity_are_dropped_and_recorded() {
    let input = Table::from_rows(
        "gaps",
        vec!["period", "community", "events"],
        vec![
            vec![202501.into(), "A".into(), 1.into()],
            vec![Value::Null, "A".into(), 2.into()],
            vec![202501.into(), Value::Null, 4.into()],
        ],
    )
    .unwrap();
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("events", "events")]).unwrap();

    let output = engine()
        .aggregate_detailed(&input, &catalog, &request(community(TimeGrain::Monthly)))
        .unwrap();

    assert_eq!(output.table.row_count(), 1);
    assert_eq!(column(&output.table, "events"), nums(&[1.0]));
    assert_eq!(
        output.issues,
        vec![
            DataQualityIssue::RowsWithoutPeriod { dropped: 1 },
            DataQualityIssue::RowsWithoutIdentity {
                column: "community".to_string(),
                dropped: 1,
            },
        ]
    );
}

#[test]
fn entity_filter_keeps_only_listed_entities() {
    let table = engine()
        .aggregate(
            &social_events(),
            &catalog(),
            &request(community(TimeGrain::CumulativeMonthly)).only_entities(["B"]),
        )
        .unwrap();
    assert_eq!(column(&table, "community"), vec![Value::from("B")]);
    assert_eq!(column(&table, "total_events"), nums(&[120.0]));
}

#[test]
fn unknown_selected_metrics_follow_the_configured_policy() {
    let input = social_events();
    let request = request(community(TimeGrain::CumulativeMonthly))
        .select_metrics(["total_events", "does_not_exist"]);

    let lenient = engine().aggregate(&input, &catalog(), &request).unwrap();
    assert_eq!(lenient.columns(), &["community", "total_events"].map(String::from));

    let strict = AggregationEngine::new(EngineSettings {
        unknown_metric_policy: UnknownMetricPolicy::Reject,
        ..EngineSettings::default()
    });
    let err = strict.aggregate(&input, &catalog(), &request).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Configuration {
            source: ConfigurationError::UnknownMetric { ref name },
            ..
        } if name == "does_not_exist"
    ));
}

#[test]
fn missing_key_column_fails_or_fills_nulls_per_policy() {
    let input = social_events()
        .select(&["period", "community", "team", "events"])
        .unwrap();
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("events_total", "events")]).unwrap();
    let request = request(Granularity::new(EntityKind::Team, TimeGrain::Monthly));

    let err = engine().aggregate(&input, &catalog, &request).unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("release_train"), "{err}");

    let lenient = AggregationEngine::new(EngineSettings {
        missing_key_policy: MissingKeyPolicy::FillNull,
        ..EngineSettings::default()
    });
    let output = lenient.aggregate_detailed(&input, &catalog, &request).unwrap();
    assert_eq!(
        output.table.columns(),
        &["period", "community", "release_train", "team", "events_total"].map(String::from)
    );
    assert!(column(&output.table, "release_train")
        .iter()
        .all(Value::is_null));
    assert_eq!(
        output.issues,
        vec![DataQualityIssue::MissingKeyColumn {
            column: "release_train".to_string()
        }]
    );
}

#[test]
fn absent_identity_column_fails_even_when_filling_nulls() {
    let input = social_events()
        .select(&["period", "community", "events"])
        .unwrap();
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("events_total", "events")]).unwrap();
    let lenient = AggregationEngine::new(EngineSettings {
        missing_key_policy: MissingKeyPolicy::FillNull,
        ..EngineSettings::default()
    });

    let err = lenient
        .aggregate_detailed(
            &input,
            &catalog,
            &request(Granularity::new(EntityKind::Team, TimeGrain::CumulativeMonthly)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Configuration {
            source: ConfigurationError::MissingGroupColumn { ref column },
            ..
        } if column == "team"
    ));
}

#[test]
fn configuration_errors_carry_the_aggregation_scope() {
    let input = social_events().select(&["community", "events"]).unwrap();
    let request = request(community(TimeGrain::Monthly)).for_block("social");

    let err = engine().aggregate(&input, &catalog(), &request).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Configuration {
            source: ConfigurationError::MissingPeriodColumn { .. },
            ..
        }
    ));
    let scope = err.scope().unwrap();
    assert_eq!(scope.block.as_deref(), Some("social"));
    assert_eq!(
        err.to_string(),
        "configuration error [block=social entity=community grain=monthly periods=202501..=202512]: \
         period column `period` is missing from the input table"
    );
}

#[test]
fn metric_named_like_a_key_is_rejected() {
    let catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("community", "events")]).unwrap();
    let err = engine()
        .aggregate(
            &social_events(),
            &catalog,
            &request(community(TimeGrain::CumulativeMonthly)),
        )
        .unwrap_err();
    assert!(matches!(
        err,
        EngineError::Configuration {
            source: ConfigurationError::MetricShadowsKey { .. },
            ..
        }
    ));
}

#[test]
fn explicit_catalog_keys_replace_the_granularity_keys() {
    let mut catalog =
        MetricCatalog::from_definitions([MetricDefinition::sum("events", "events")]).unwrap();
    catalog.set_explicit_keys(vec!["release_train".to_string()]);

    let table = engine()
        .aggregate(
            &social_events(),
            &catalog,
            &request(community(TimeGrain::Monthly)),
        )
        .unwrap();
    assert_eq!(column(&table, "release_train"), vec![Value::from("rt1"), Value::from("rt2")]);
    assert_eq!(column(&table, "events"), nums(&[60.0, 120.0]));
}

#[test]
fn non_numeric_cells_are_skipped_and_counted_once_per_field() {
    let input = Table::from_rows(
        "dirty",
        vec!["period", "community", "events"],
        vec![
            vec![202501.into(), "A".into(), 3.into()],
            vec![202501.into(), "A".into(), "n/a".into()],
        ],
    )
    .unwrap();
    let catalog = MetricCatalog::from_definitions([
        MetricDefinition::sum("events_sum", "events"),
        MetricDefinition::simple_average("events_avg", "events"),
    ])
    .unwrap();

    let output = engine()
        .aggregate_detailed(&input, &catalog, &request(community(TimeGrain::CumulativeMonthly)))
        .unwrap();
    assert_eq!(column(&output.table, "events_sum"), nums(&[3.0]));
    assert_eq!(column(&output.table, "events_avg"), nums(&[3.0]));
    assert_eq!(
        output.issues,
        vec![DataQualityIssue::NonNumericValues {
            field: "events".to_string(),
            count: 1,
        }]
    );
}

#[test]
fn empty_filtered_input_yields_an_empty_table_with_the_full_schema() {
    let request = AggregateRequest::new(community(TimeGrain::Monthly), 203001, 203012);
    let table = engine()
        .aggregate(&social_events(), &catalog(), &request)
        .unwrap();
    assert!(table.is_empty());
    assert_eq!(table.column_count(), 6);
}

#[test]
fn detailed_output_includes_a_report_on_request() {
    let output = engine()
        .aggregate_detailed(
            &social_events(),
            &catalog(),
            &request(community(TimeGrain::Monthly)).with_report(true),
        )
        .unwrap();
    let report = output.report.unwrap();
    assert_eq!(report.row_count, 3);
    assert_eq!(report.distinct_ids, Some(2));
    assert_eq!(
        report.distinct_periods,
        Some([Value::from(202501), Value::from(202502)].into_iter().collect())
    );
    assert_eq!(report.non_null_counts.get("total_events"), Some(&3));
}
