use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use jobexec_core::event::InboundEvent;
use jobexec_core::handler::{EventHandler, HandleOutcome};

use crate::error::AppError;
use crate::state::AppState;

/// POST / and POST /event: accept a structured-mode CloudEvent.
///
/// The event is validated synchronously and processed in the background;
/// the response only acknowledges receipt.
pub async fn receive_event(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let text = std::str::from_utf8(&body)
        .map_err(|_| AppError::bad_request("event body is not valid UTF-8"))?;
    let event = InboundEvent::from_json(text)?;
    let id = event.id.clone();

    tracing::info!(id = %id, event_type = %event.event_type, "received event");
    tokio::spawn(process_event(app, event));

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({ "id": id }))))
}

/// Run one event to completion on a fresh cluster driver.
pub async fn process_event(app: AppState, event: InboundEvent) {
    let cluster = app.drivers.driver();
    let handler = EventHandler {
        settings: &app.settings,
        configs: app.configs.as_ref(),
        mapper: app.mapper.as_ref(),
        filter: app.filter.as_ref(),
        cluster: cluster.as_ref(),
        sender: app.sender.as_ref(),
    };

    match handler.handle(&event).await {
        Ok(HandleOutcome::Executed { report }) => tracing::info!(
            id = %event.id,
            action = %report.action,
            status = %report.status(),
            result = %report.result(),
            "event processed"
        ),
        Ok(HandleOutcome::Ignored { .. }) => {}
        Err(e) => tracing::error!(id = %event.id, error = %e, "failed to process event"),
    }
}
