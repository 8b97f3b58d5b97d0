//! Purchase orders with line items and an approval workflow.
//!
//! `draft → submitted → approved | rejected`, `approved → closed`, and a rejected
//! order can be reopened to draft by its requester. Lines and header fields are only
//! editable in draft; the total is always recomputed from the lines.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use bosun_common::error::AppError;
use bosun_common::permissions::{Actor, Permission};
use bosun_common::types::{ApprovalStatus, PurchaseOrder, PurchaseOrderLine};

use crate::yachts::YachtService;

#[derive(Debug, Clone, Deserialize)]
pub struct LineParams {
    pub description: String,
    pub part_number: Option<String>,
    pub quantity: i32,
    pub unit_price_cents: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePurchaseOrderParams {
    pub yacht_id: Uuid,
    pub po_number: String,
    pub supplier: String,
    pub currency: String,
    pub notes: Option<String>,
    #[serde(default)]
    pub lines: Vec<LineParams>,
}

/// `lines`, when present, replaces every existing line.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePurchaseOrderParams {
    pub supplier: Option<String>,
    pub currency: Option<String>,
    pub notes: Option<String>,
    pub lines: Option<Vec<LineParams>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseOrderFilter {
    pub yacht_id: Option<Uuid>,
    pub status: Option<ApprovalStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionParams {
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PurchaseOrderView {
    #[serde(flatten)]
    pub order: PurchaseOrder,
    pub lines: Vec<PurchaseOrderLine>,
}

/// Sum of `quantity × unit_price_cents` over validated lines.
pub fn order_total(lines: &[LineParams]) -> Result<i64, AppError> {
    lines.iter().try_fold(0i64, |acc, line| {
        i64::from(line.quantity)
            .checked_mul(line.unit_price_cents)
            .and_then(|line_total| acc.checked_add(line_total))
            .ok_or_else(|| AppError::Validation("Order total is out of range".to_string()))
    })
}

fn validate_lines(lines: &[LineParams]) -> Result<(), AppError> {
    for (i, line) in lines.iter().enumerate() {
        if line.description.trim().is_empty() {
            return Err(AppError::Validation(format!("Line {} needs a description", i + 1)));
        }
        if line.quantity <= 0 {
            return Err(AppError::Validation(format!("Line {} quantity must be positive", i + 1)));
        }
        if line.unit_price_cents < 0 {
            return Err(AppError::Validation(format!(
                "Line {} unit price must not be negative",
                i + 1
            )));
        }
    }
    Ok(())
}

/// ISO 4217 style: three ASCII letters, normalised to upper case.
fn normalize_currency(currency: &str) -> Result<String, AppError> {
    let currency = currency.trim();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(AppError::Validation(format!(
            "Invalid currency code '{}'",
            currency
        )));
    }
    Ok(currency.to_ascii_uppercase())
}

fn ensure_transition(from: ApprovalStatus, to: ApprovalStatus) -> Result<(), AppError> {
    if !from.can_transition_to(to) {
        return Err(AppError::Conflict(format!(
            "Cannot move purchase order from {} to {}",
            from, to
        )));
    }
    Ok(())
}

pub struct PurchaseOrderService;

impl PurchaseOrderService {
    pub async fn create(
        pool: &PgPool,
        actor: &Actor,
        params: &CreatePurchaseOrderParams,
    ) -> Result<PurchaseOrderView, AppError> {
        actor.require(Permission::RequestPurchase)?;
        if params.po_number.trim().is_empty() || params.supplier.trim().is_empty() {
            return Err(AppError::Validation(
                "po_number and supplier are required".to_string(),
            ));
        }
        let currency = normalize_currency(&params.currency)?;
        validate_lines(&params.lines)?;
        let total = order_total(&params.lines)?;
        YachtService::ensure_exists(pool, actor, params.yacht_id).await?;

        let mut tx = pool.begin().await?;

        let order: PurchaseOrder = sqlx::query_as(
            r#"
            INSERT INTO purchase_orders
                (id, tenant_id, yacht_id, po_number, supplier, currency, status, total_cents,
                 requested_by, notes)
            VALUES ($1, $2, $3, $4, $5, $6, 'draft', $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(actor.tenant_id)
        .bind(params.yacht_id)
        .bind(params.po_number.trim())
        .bind(params.supplier.trim())
        .bind(&currency)
        .bind(total)
        .bind(actor.user_id)
        .bind(&params.notes)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            AppError::from_unique_violation(
                e,
                format!("Purchase order {} already exists", params.po_number.trim()),
            )
        })?;

        let lines = insert_lines(&mut tx, order.id, &params.lines).await?;
        tx.commit().await?;

        tracing::info!(
            purchase_order_id = %order.id,
            po_number = %order.po_number,
            total_cents = order.total_cents,
            "Purchase order drafted"
        );
        Ok(PurchaseOrderView { order, lines })
    }

    pub async fn list(
        pool: &PgPool,
        actor: &Actor,
        filter: &PurchaseOrderFilter,
    ) -> Result<Vec<PurchaseOrder>, AppError> {
        let orders = sqlx::query_as(
            r#"
            SELECT * FROM purchase_orders
            WHERE tenant_id = $1
              AND ($2::uuid IS NULL OR yacht_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY created_at DESC
            "#,
        )
        .bind(actor.tenant_id)
        .bind(filter.yacht_id)
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(pool)
        .await?;
        Ok(orders)
    }

    pub async fn get(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<PurchaseOrderView, AppError> {
        let order = Self::find(pool, actor, order_id).await?;
        let lines = sqlx::query_as(
            "SELECT * FROM purchase_order_lines WHERE purchase_order_id = $1 ORDER BY position",
        )
        .bind(order_id)
        .fetch_all(pool)
        .await?;
        Ok(PurchaseOrderView { order, lines })
    }

    async fn find(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<PurchaseOrder, AppError> {
        sqlx::query_as("SELECT * FROM purchase_orders WHERE id = $1 AND tenant_id = $2")
            .bind(order_id)
            .bind(actor.tenant_id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Purchase order {} not found", order_id)))
    }

    pub async fn update(
        pool: &PgPool,
        actor: &Actor,
        order_id: Uuid,
        params: &UpdatePurchaseOrderParams,
    ) -> Result<PurchaseOrderView, AppError> {
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_editor(&existing, actor)?;
        ensure_draft(&existing)?;

        let supplier = params.supplier.clone().unwrap_or(existing.supplier);
        if supplier.trim().is_empty() {
            return Err(AppError::Validation("supplier must not be empty".to_string()));
        }
        let currency = match &params.currency {
            Some(currency) => normalize_currency(currency)?,
            None => existing.currency,
        };
        if let Some(lines) = &params.lines {
            validate_lines(lines)?;
        }

        let mut tx = pool.begin().await?;

        if let Some(lines) = &params.lines {
            sqlx::query("DELETE FROM purchase_order_lines WHERE purchase_order_id = $1")
                .bind(order_id)
                .execute(&mut *tx)
                .await?;
            insert_lines(&mut tx, order_id, lines).await?;
        }

        let total = match &params.lines {
            Some(lines) => order_total(lines)?,
            None => existing.total_cents,
        };

        let order: Option<PurchaseOrder> = sqlx::query_as(
            r#"
            UPDATE purchase_orders
            SET supplier = $1, currency = $2, notes = $3, total_cents = $4, updated_at = NOW()
            WHERE id = $5 AND tenant_id = $6 AND status = 'draft'
            RETURNING *
            "#,
        )
        .bind(supplier.trim())
        .bind(&currency)
        .bind(params.notes.clone().or(existing.notes))
        .bind(total)
        .bind(order_id)
        .bind(actor.tenant_id)
        .fetch_optional(&mut *tx)
        .await?;
        let order = order.ok_or_else(|| {
            AppError::Conflict("Purchase order was modified concurrently".to_string())
        })?;

        tx.commit().await?;

        Self::get(pool, actor, order.id).await
    }

    pub async fn delete(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<bool, AppError> {
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_editor(&existing, actor)?;
        ensure_draft(&existing)?;

        let result = sqlx::query(
            "DELETE FROM purchase_orders WHERE id = $1 AND tenant_id = $2 AND status = 'draft'",
        )
        .bind(order_id)
        .bind(actor.tenant_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Send a draft for approval. An order without lines cannot be submitted.
    pub async fn submit(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<PurchaseOrder, AppError> {
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_requester(&existing, actor)?;
        ensure_transition(existing.status, ApprovalStatus::Submitted)?;

        let (line_count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM purchase_order_lines WHERE purchase_order_id = $1")
                .bind(order_id)
                .fetch_one(pool)
                .await?;
        if line_count == 0 {
            return Err(AppError::Validation(
                "A purchase order needs at least one line before it can be submitted".to_string(),
            ));
        }

        Self::transition(pool, actor, &existing, ApprovalStatus::Submitted, None).await
    }

    pub async fn approve(
        pool: &PgPool,
        actor: &Actor,
        order_id: Uuid,
        params: &DecisionParams,
    ) -> Result<PurchaseOrder, AppError> {
        actor.require(Permission::ApprovePurchaseOrders)?;
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_transition(existing.status, ApprovalStatus::Approved)?;
        Self::transition(pool, actor, &existing, ApprovalStatus::Approved, params.note.as_deref()).await
    }

    pub async fn reject(
        pool: &PgPool,
        actor: &Actor,
        order_id: Uuid,
        params: &DecisionParams,
    ) -> Result<PurchaseOrder, AppError> {
        actor.require(Permission::ApprovePurchaseOrders)?;
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_transition(existing.status, ApprovalStatus::Rejected)?;
        Self::transition(pool, actor, &existing, ApprovalStatus::Rejected, params.note.as_deref()).await
    }

    pub async fn close(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<PurchaseOrder, AppError> {
        actor.require(Permission::ApprovePurchaseOrders)?;
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_transition(existing.status, ApprovalStatus::Closed)?;
        Self::transition(pool, actor, &existing, ApprovalStatus::Closed, None).await
    }

    /// Return a rejected order to draft so the requester can amend it.
    pub async fn reopen(pool: &PgPool, actor: &Actor, order_id: Uuid) -> Result<PurchaseOrder, AppError> {
        let existing = Self::find(pool, actor, order_id).await?;
        ensure_requester(&existing, actor)?;
        ensure_transition(existing.status, ApprovalStatus::Draft)?;
        Self::transition(pool, actor, &existing, ApprovalStatus::Draft, None).await
    }

    async fn transition(
        pool: &PgPool,
        actor: &Actor,
        existing: &PurchaseOrder,
        next: ApprovalStatus,
        note: Option<&str>,
    ) -> Result<PurchaseOrder, AppError> {
        let order: Option<PurchaseOrder> = sqlx::query_as(
            r#"
            UPDATE purchase_orders
            SET status = $1,
                submitted_at = CASE WHEN $1 = 'submitted' THEN NOW() ELSE submitted_at END,
                decided_at = CASE
                    WHEN $1 IN ('approved', 'rejected') THEN NOW()
                    WHEN $1 = 'draft' THEN NULL
                    ELSE decided_at END,
                approved_by = CASE
                    WHEN $1 IN ('approved', 'rejected') THEN $2
                    WHEN $1 = 'draft' THEN NULL
                    ELSE approved_by END,
                decision_note = CASE
                    WHEN $1 IN ('approved', 'rejected') THEN $3
                    WHEN $1 = 'draft' THEN NULL
                    ELSE decision_note END,
                closed_at = CASE WHEN $1 = 'closed' THEN NOW() ELSE closed_at END,
                updated_at = NOW()
            WHERE id = $4 AND tenant_id = $5 AND status = $6
            RETURNING *
            "#,
        )
        .bind(next.as_str())
        .bind(actor.user_id)
        .bind(note)
        .bind(existing.id)
        .bind(actor.tenant_id)
        .bind(existing.status.as_str())
        .fetch_optional(pool)
        .await?;

        let order = order.ok_or_else(|| {
            AppError::Conflict("Purchase order was modified concurrently".to_string())
        })?;

        tracing::info!(
            purchase_order_id = %order.id,
            from = %existing.status,
            to = %order.status,
            "Purchase order transitioned"
        );
        Ok(order)
    }
}

async fn insert_lines(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    lines: &[LineParams],
) -> Result<Vec<PurchaseOrderLine>, AppError> {
    let mut inserted = Vec::with_capacity(lines.len());
    for (position, line) in lines.iter().enumerate() {
        let row: PurchaseOrderLine = sqlx::query_as(
            r#"
            INSERT INTO purchase_order_lines
                (id, purchase_order_id, description, part_number, quantity, unit_price_cents, position)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(order_id)
        .bind(line.description.trim())
        .bind(&line.part_number)
        .bind(line.quantity)
        .bind(line.unit_price_cents)
        .bind(position as i32)
        .fetch_one(&mut **tx)
        .await?;
        inserted.push(row);
    }
    Ok(inserted)
}

fn ensure_draft(order: &PurchaseOrder) -> Result<(), AppError> {
    if order.status != ApprovalStatus::Draft {
        return Err(AppError::Conflict(format!(
            "Purchase order is {} and can no longer be edited",
            order.status
        )));
    }
    Ok(())
}

fn ensure_requester(order: &PurchaseOrder, actor: &Actor) -> Result<(), AppError> {
    if order.requested_by != actor.user_id {
        return Err(AppError::Forbidden(
            "Only the requester can do this".to_string(),
        ));
    }
    Ok(())
}

/// The requester or anyone allowed to approve may edit a draft.
fn ensure_editor(order: &PurchaseOrder, actor: &Actor) -> Result<(), AppError> {
    if order.requested_by == actor.user_id || actor.can(Permission::ApprovePurchaseOrders) {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "Only the requester or an approver can change this purchase order".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(quantity: i32, unit_price_cents: i64) -> LineParams {
        LineParams {
            description: "Impeller".to_string(),
            part_number: Some("IMP-22".to_string()),
            quantity,
            unit_price_cents,
        }
    }

    #[test]
    fn test_order_total() {
        assert_eq!(order_total(&[]).unwrap(), 0);
        assert_eq!(order_total(&[line(3, 4_250), line(1, 19_900)]).unwrap(), 32_650);
    }

    #[test]
    fn test_order_total_overflow() {
        let err = order_total(&[line(i32::MAX, i64::MAX)]).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_validate_lines() {
        assert!(validate_lines(&[line(1, 0)]).is_ok());
        assert!(validate_lines(&[line(0, 100)]).is_err());
        assert!(validate_lines(&[line(1, -1)]).is_err());
        let mut blank = line(1, 100);
        blank.description = " ".to_string();
        assert!(validate_lines(&[blank]).is_err());
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("eur").unwrap(), "EUR");
        assert_eq!(normalize_currency(" usd ").unwrap(), "USD");
        assert!(normalize_currency("EURO").is_err());
        assert!(normalize_currency("E1R").is_err());
    }

    #[test]
    fn test_transitions() {
        assert!(ensure_transition(ApprovalStatus::Draft, ApprovalStatus::Submitted).is_ok());
        assert!(ensure_transition(ApprovalStatus::Rejected, ApprovalStatus::Draft).is_ok());
        assert!(ensure_transition(ApprovalStatus::Approved, ApprovalStatus::Closed).is_ok());
        assert!(ensure_transition(ApprovalStatus::Draft, ApprovalStatus::Closed).is_err());
        assert!(ensure_transition(ApprovalStatus::Closed, ApprovalStatus::Draft).is_err());
    }
}
