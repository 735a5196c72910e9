#![allow(dead_code)]

use metricbase_engine::{
    AggregateRequest, AggregationEngine, EngineSettings, EntityKind, Granularity, Table,
    TimeGrain, Value,
};

/// Events per community, mirroring the shape of the social indicators feed.
pub fn social_events() -> Table {
    Table::from_rows(
        "social",
        vec![
            "period",
            "community",
            "release_train",
            "team",
            "events",
            "done",
            "total",
            "score",
            "person",
        ],
        vec![
            row(202501, "A", "rt1", "t1", 20.0, 10.0, 20.0, 4.5, "p1"),
            row(202501, "A", "rt1", "t2", 40.0, 10.0, 0.0, 4.7, "p2"),
            row(202501, "B", "rt2", "t3", 30.0, 20.0, 30.0, 4.2, "p1"),
            row(202502, "B", "rt2", "t3", 90.0, 10.0, 30.0, 4.9, "p3"),
        ],
    )
    .unwrap()
}

#[allow(clippy::too_many_arguments)]
fn row(
    period: i64,
    community: &str,
    release_train: &str,
    team: &str,
    events: f64,
    done: f64,
    total: f64,
    score: f64,
    person: &str,
) -> Vec<Value> {
    vec![
        period.into(),
        community.into(),
        release_train.into(),
        team.into(),
        events.into(),
        done.into(),
        total.into(),
        score.into(),
        person.into(),
    ]
}

pub fn engine() -> AggregationEngine {
    AggregationEngine::new(EngineSettings::default())
}

pub fn community(grain: TimeGrain) -> Granularity {
    Granularity::new(EntityKind::Community, grain)
}

pub fn request(granularity: Granularity) -> AggregateRequest {
    AggregateRequest::new(granularity, 202501, 202512)
}

/// Values of `column`, in row order.
pub fn column(table: &Table, column: &str) -> Vec<Value> {
    table
        .column_values(column)
        .unwrap_or_else(|| panic!("missing column {column}"))
        .cloned()
        .collect()
}
