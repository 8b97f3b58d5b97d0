//! Domain events raised by fleet writes. Payloads are flat JSON objects so rule
//! conditions and templates can address every field by name.

use serde_json::json;
use uuid::Uuid;

use bosun_common::types::{
    DomainEvent, Engine, EventKind, LogbookEntry, ManifestEntry, PurchaseOrder,
};

/// Format integer cents as a decimal amount, e.g. `123456` → `"1234.56"`.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

pub fn logbook_submitted(entry: &LogbookEntry, actor_id: Uuid) -> DomainEvent {
    DomainEvent::new(entry.tenant_id, EventKind::LogbookSubmitted, logbook_payload(entry))
        .with_actor(actor_id)
        .with_subject(entry.id)
}

pub fn logbook_reviewed(entry: &LogbookEntry, actor_id: Uuid) -> DomainEvent {
    DomainEvent::new(entry.tenant_id, EventKind::LogbookReviewed, logbook_payload(entry))
        .with_actor(actor_id)
        .with_subject(entry.id)
}

fn logbook_payload(entry: &LogbookEntry) -> serde_json::Value {
    json!({
        "entry_id": entry.id,
        "yacht_id": entry.yacht_id,
        "author_id": entry.author_id,
        "kind": entry.kind.to_string(),
        "title": entry.title,
        "status": entry.status.as_str(),
        "occurred_at": entry.occurred_at.to_rfc3339(),
        "review_note": entry.review_note,
    })
}

pub fn engine_hours_recorded(engine: &Engine, previous_hours: f64, actor_id: Uuid) -> DomainEvent {
    let mut payload = engine_payload(engine);
    payload["previous_hours"] = json!(previous_hours);
    payload["hours_delta"] = json!(engine.current_hours - previous_hours);
    DomainEvent::new(engine.tenant_id, EventKind::EngineHoursRecorded, payload)
        .with_actor(actor_id)
        .with_subject(engine.id)
}

pub fn engine_serviced(engine: &Engine, actor_id: Uuid) -> DomainEvent {
    DomainEvent::new(engine.tenant_id, EventKind::EngineServiced, engine_payload(engine))
        .with_actor(actor_id)
        .with_subject(engine.id)
}

fn engine_payload(engine: &Engine) -> serde_json::Value {
    json!({
        "engine_id": engine.id,
        "engine_name": engine.name,
        "yacht_id": engine.yacht_id,
        "current_hours": engine.current_hours,
        "service_interval_hours": engine.service_interval_hours,
        "last_service_hours": engine.last_service_hours,
        "hours_until_service": engine.hours_until_service(),
        "service_due": engine.service_due(),
    })
}

/// Event for a purchase order that just reached its current status.
/// Returns `None` for statuses that raise no event (`draft`).
pub fn purchase_order_transitioned(order: &PurchaseOrder, actor_id: Uuid) -> Option<DomainEvent> {
    use bosun_common::types::ApprovalStatus::*;

    let kind = match order.status {
        Submitted => EventKind::PurchaseOrderSubmitted,
        Approved => EventKind::PurchaseOrderApproved,
        Rejected => EventKind::PurchaseOrderRejected,
        Closed => EventKind::PurchaseOrderClosed,
        Draft => return None,
    };

    let payload = json!({
        "purchase_order_id": order.id,
        "po_number": order.po_number,
        "yacht_id": order.yacht_id,
        "supplier": order.supplier,
        "currency": order.currency,
        "total_cents": order.total_cents,
        "total": format_cents(order.total_cents),
        "status": order.status.as_str(),
        "requested_by": order.requested_by,
        "decision_note": order.decision_note,
    });

    Some(
        DomainEvent::new(order.tenant_id, kind, payload)
            .with_actor(actor_id)
            .with_subject(order.id),
    )
}

/// `action` is one of `embarked`, `disembarked`, `removed`.
pub fn manifest_updated(entry: &ManifestEntry, action: &str, actor_id: Uuid) -> DomainEvent {
    DomainEvent::new(
        entry.tenant_id,
        EventKind::ManifestUpdated,
        json!({
            "manifest_entry_id": entry.id,
            "yacht_id": entry.yacht_id,
            "voyage_ref": entry.voyage_ref,
            "person_name": entry.person_name,
            "person_type": entry.person_type.to_string(),
            "action": action,
        }),
    )
    .with_actor(actor_id)
    .with_subject(entry.id)
}
