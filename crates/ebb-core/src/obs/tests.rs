use super::*;

#[test]
fn counters_accumulate_and_reset() {
    metrics_reset_all();

    emit(MetricsEvent::Mutation {
        kind: MutationKind::Add,
        entity: "Widget",
    });
    emit(MetricsEvent::Mutation {
        kind: MutationKind::Add,
        entity: "Widget",
    });
    emit(MetricsEvent::Accepted { entity: "Widget" });
    emit(MetricsEvent::ChangeSetBuilt { entries: 3 });

    let report = metrics_report();
    assert_eq!(report.adds, 2);
    assert_eq!(report.accepts, 1);
    assert_eq!(report.changesets_built, 1);
    assert_eq!(report.changeset_entries, 3);

    metrics_reset_all();
    assert_eq!(metrics_report(), MetricsReport::default());
}
