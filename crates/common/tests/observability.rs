use metrics_exporter_prometheus::PrometheusBuilder;

#[test]
fn error_events_counter_increments_on_error_event() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let (dispatch, _otel_guard) = common::observability::build_dispatch("test-scorer", "info");

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::error!(wallet = "0xabc", "wallet skipped");
        });
    });

    let rendered = handle.render();
    assert!(
        rendered.contains(common::observability::ERROR_EVENTS_METRIC),
        "expected {} in rendered metrics, got:\n{rendered}",
        common::observability::ERROR_EVENTS_METRIC
    );
}

#[test]
fn warn_events_do_not_increment_error_counter() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    metrics::with_local_recorder(&recorder, || {
        let (dispatch, _otel_guard) = common::observability::build_dispatch("test-scorer", "info");

        tracing::dispatcher::with_default(&dispatch, || {
            tracing::warn!(attempt = 1, "retrying fetch");
        });
    });

    assert!(!handle
        .render()
        .contains(common::observability::ERROR_EVENTS_METRIC));
}
