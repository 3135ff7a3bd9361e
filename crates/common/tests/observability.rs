use metrics_exporter_prometheus::PrometheusBuilder;

// Exercises the public `common::observability` surface, not its internals.

#[test]
fn error_events_counter_increments_on_error_event() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let (dispatch, _otel_guard) = common::observability::build_dispatch("test-wallet", "info");

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::error!(wallet_id = "w1", "balance update failed");
        });
    });

    let rendered = handle.render();
    assert!(
        rendered.contains(common::observability::ERROR_EVENTS_METRIC),
        "expected error counter in rendered metrics, got:\n{rendered}"
    );
}

#[test]
fn warn_events_are_not_counted() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let (dispatch, _otel_guard) = common::observability::build_dispatch("test-wallet", "info");

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::warn!("realtime socket closed");
        });
    });

    assert!(!handle
        .render()
        .contains(common::observability::ERROR_EVENTS_METRIC));
}
