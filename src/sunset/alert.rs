use crate::error::{ArchivalError, SunsetError};
use crate::sunset::notify::NotificationSink;
use crate::sunset::warn::{self, WarnEvent};
use anyhow::Result;
use serde_json::{Value, json};

/// Flatten a step failure into an alert payload. Archival and data-loss
/// failures contribute the index names they carry; anything else falls back
/// to the rendered error chain.
pub fn failure_payload(step: &str, err: &anyhow::Error) -> Value {
    if let Some(archival) = err.downcast_ref::<ArchivalError>() {
        return json!({
            "msg": format!("failure in {step}"),
            "error": archival.message,
            "index": archival.index,
            "new_index": archival.new_index,
            "cause": archival.cause.as_ref().map(|cause| cause.to_string()),
        });
    }
    if let Some(SunsetError::DataLoss {
        index,
        new_index,
        source_docs,
        dest_docs,
    }) = err.downcast_ref::<SunsetError>()
    {
        return json!({
            "msg": format!("failure in {step}"),
            "error": err.to_string(),
            "index": index,
            "new_index": new_index,
            "source_docs": source_docs,
            "dest_docs": dest_docs,
        });
    }
    json!({
        "msg": format!("failure in {step}"),
        "error": format!("{err:#}"),
    })
}

/// Run a step; on failure, emit a `GeneralAlert` and re-raise the original
/// error untouched. A failing sink is warned about, never allowed to mask
/// the step's own failure.
pub fn with_alert<T>(
    sink: &dyn NotificationSink,
    step: &str,
    run: impl FnOnce() -> Result<T>,
) -> Result<T> {
    match run() {
        Ok(value) => Ok(value),
        Err(err) => {
            let payload = failure_payload(step, &err);
            if let Err(notify_err) = sink.notify("GeneralAlert", "General Alert", &payload) {
                warn::emit(WarnEvent {
                    code: "ALERT_FAILED",
                    stage: step,
                    index: "",
                    new_index: "",
                    reason: "notification-sink-failed",
                    err: &format!("{notify_err:#}"),
                });
            }
            Err(err)
        }
    }
}

/// Best-effort discovery alert for a scanner candidate; never fatal.
pub fn notify_large_index(
    sink: &dyn NotificationSink,
    index: &str,
    size_bytes: u64,
    threshold_bytes: u64,
) {
    let payload = json!({
        "msg": format!("index {index} identified for archival"),
        "index": index,
        "index_size_bytes": size_bytes,
        "index_size_threshold_bytes": threshold_bytes,
    });
    if let Err(err) = sink.notify("LargeIndexAlert", "Large Index Alert", &payload) {
        warn::emit(WarnEvent {
            code: "ALERT_FAILED",
            stage: "find_large_indexes",
            index,
            new_index: "",
            reason: "notification-sink-failed",
            err: &format!("{err:#}"),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn archival_failures_surface_both_index_names() {
        let err: anyhow::Error = ArchivalError::new("failed to delete index")
            .with_index("telemetry-data")
            .with_new_index("telemetry-data-08062026")
            .with_cause(anyhow::anyhow!("connection reset"))
            .into();

        let payload = failure_payload("cleanup_archival", &err);
        assert_eq!(payload["index"], "telemetry-data");
        assert_eq!(payload["new_index"], "telemetry-data-08062026");
        assert_eq!(payload["cause"], "connection reset");
        assert_eq!(payload["msg"], "failure in cleanup_archival");
    }

    #[test]
    fn data_loss_failures_surface_counts() {
        let err: anyhow::Error = SunsetError::DataLoss {
            index: "telemetry-data".to_string(),
            new_index: "telemetry-data-08062026".to_string(),
            source_docs: 500,
            dest_docs: 495,
        }
        .into();

        let payload = failure_payload("cleanup_archival", &err);
        assert_eq!(payload["source_docs"], 500);
        assert_eq!(payload["dest_docs"], 495);
    }
}
