//! Control dispatcher for out-of-band service calls.

use serde_json::Value;

use cohort_wire::{Message, ServiceCode};

use crate::registry::OutboundSender;
use crate::HubState;

/// Handle one service call from the worker that read it.
///
/// `own_tx` is the calling worker's outbound queue (Init replies go back on
/// it); `registered` tracks the node id the worker has claimed so teardown
/// can remove the right registry entry.
pub(crate) fn dispatch(
    state: &HubState,
    own_tx: &OutboundSender,
    registered: &mut Option<i64>,
    msg: Message,
) {
    let Some(code) = ServiceCode::from_i64(msg.sink) else {
        tracing::warn!(sink = msg.sink, source = msg.source, "unknown service code");
        return;
    };

    match code {
        ServiceCode::Init => {
            let id = msg.tag;
            tracing::debug!(id, "init");
            state.registry.insert(id, own_tx.clone());
            *registered = Some(id);
            // The reply's tag carries the cohort size; receiving it is the
            // node's signal that the hub has sized the cohort.
            let reply =
                Message::service_reply(ServiceCode::Init, id, state.expected_nodes as i64, Value::Null);
            let _ = own_tx.send(reply);
        }
        ServiceCode::Terminate => {
            // Nothing to do beyond acknowledging receipt; the reader loop
            // observes EOF shortly after and tears the worker down.
            tracing::debug!(id = msg.tag, "terminate");
        }
        ServiceCode::Barrier => {
            let tag = msg.tag;
            if state.barriers.arrive(tag, state.expected_nodes) {
                tracing::debug!(tag, "barrier complete, releasing cohort");
                for (id, tx) in state.registry.snapshot() {
                    let release = Message::service_reply(ServiceCode::Barrier, id, tag, Value::Null);
                    let _ = tx.send(release);
                }
            } else {
                tracing::trace!(tag, source = msg.source, "barrier arrival");
            }
        }
        ServiceCode::Print => {
            println!("[{}]: {}", msg.source, payload_text(&msg.payload));
        }
        ServiceCode::Broadcast => {
            // A nonzero tag excludes the originator from the fan-out.
            let exclude = msg.tag != 0;
            for (id, tx) in state.registry.snapshot() {
                if exclude && id == msg.source {
                    continue;
                }
                let copy = Message::new(msg.source, id, msg.tag, msg.payload.clone());
                let _ = tx.send(copy);
            }
        }
    }
}

/// Text form of a payload for the print service: strings print bare,
/// everything else prints as compact JSON.
fn payload_text(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
