//! JSON frames sent to browser clients.

use axum::extract::ws::Message;
use serde_json::{json, Value};
use vlabs_core::run_events::{
    MSG_TYPE_PONG, MSG_TYPE_PROGRESS, MSG_TYPE_RESULT, MSG_TYPE_SCRIPT_END, MSG_TYPE_SCRIPT_ERROR,
    MSG_TYPE_SCRIPT_OUTPUT, MSG_TYPE_SCRIPT_START, MSG_TYPE_WELCOME,
};
use vlabs_core::types::ClientId;
use vlabs_events::{RunEvent, RunEventKind};

pub fn welcome(client_id: ClientId) -> Value {
    json!({
        "type": MSG_TYPE_WELCOME,
        "clientId": client_id,
    })
}

pub fn pong() -> Value {
    json!({ "type": MSG_TYPE_PONG })
}

/// Frame for a run event, with the routing fields every run frame carries.
pub fn run_frame(event: &RunEvent) -> Value {
    let mut frame = match &event.kind {
        RunEventKind::Started {
            command,
            parameters,
        } => json!({
            "type": MSG_TYPE_SCRIPT_START,
            "command": command,
            "parameters": parameters,
        }),
        RunEventKind::Output { stream, line } => json!({
            "type": MSG_TYPE_SCRIPT_OUTPUT,
            "stream": stream,
            "line": line,
        }),
        RunEventKind::Progress { event, percent } => json!({
            "type": MSG_TYPE_PROGRESS,
            "event": event,
            "percent": percent,
        }),
        RunEventKind::Result { data } => json!({
            "type": MSG_TYPE_RESULT,
            "data": data,
        }),
        RunEventKind::Error { message } => json!({
            "type": MSG_TYPE_SCRIPT_ERROR,
            "message": message,
        }),
        RunEventKind::Finished {
            status,
            exit_code,
            duration_ms,
            progress,
        } => json!({
            "type": MSG_TYPE_SCRIPT_END,
            "status": status,
            "exitCode": exit_code,
            "durationMs": duration_ms,
            "percent": progress.percent,
            "progress": progress,
        }),
    };

    if let Value::Object(fields) = &mut frame {
        fields.insert("runId".into(), json!(event.run_id));
        fields.insert("scriptId".into(), json!(event.script_id));
        fields.insert("wsClientId".into(), json!(event.client_id));
        fields.insert("timestamp".into(), json!(event.timestamp));
    }
    frame
}

pub fn to_message(frame: &Value) -> Message {
    Message::Text(frame.to_string().into())
}
