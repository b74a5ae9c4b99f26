//! Financial summary for the dashboard.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;

use backoffice_core::CurrencyCode;

use crate::db::{DocumentStore, RecordRepository, RepositoryError};
use crate::models::{Customer, Expense, Income, Invoice, Payment, StaffMember, Stored};

/// Totals shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinancialSummary {
    pub currency: CurrencyCode,
    pub total_income: Decimal,
    pub total_expenses: Decimal,
    /// Income minus expenses.
    pub net_income: Decimal,
    /// Sum of invoices that are neither draft nor void.
    pub invoiced_total: Decimal,
    pub payments_received: Decimal,
    /// Unpaid balance of receivable invoices; overpayments do not offset
    /// other invoices.
    pub outstanding_receivables: Decimal,
    pub customer_count: usize,
    pub active_staff_count: usize,
    /// Monthly salaries of active staff.
    pub monthly_payroll: Decimal,
}

/// Raw inputs to [`FinancialSummary::compute`].
pub struct Ledger<'a> {
    pub income: &'a [Stored<Income>],
    pub expenses: &'a [Stored<Expense>],
    pub invoices: &'a [Stored<Invoice>],
    pub payments: &'a [Stored<Payment>],
    pub customers: &'a [Stored<Customer>],
    pub staff: &'a [Stored<StaffMember>],
}

/// Add up money figures, failing instead of panicking on overflow.
fn checked_sum(
    figure: &str,
    values: impl IntoIterator<Item = Decimal>,
) -> Result<Decimal, RepositoryError> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, Decimal::checked_add)
        .ok_or_else(|| overflow(figure))
}

fn overflow(figure: &str) -> RepositoryError {
    tracing::error!(figure, "Financial summary overflowed");
    RepositoryError::DataCorruption(format!("{figure} overflows"))
}

impl FinancialSummary {
    /// Compute the summary from loaded records.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::DataCorruption` if a total does not fit in
    /// a `Decimal`.
    pub fn compute(currency: CurrencyCode, ledger: &Ledger<'_>) -> Result<Self, RepositoryError> {
        let total_income =
            checked_sum("total_income", ledger.income.iter().map(|s| s.record.0.amount))?;
        let total_expenses =
            checked_sum("total_expenses", ledger.expenses.iter().map(|s| s.record.0.amount))?;

        let mut paid_by_invoice: HashMap<String, Decimal> = HashMap::new();
        for payment in ledger.payments {
            let paid = paid_by_invoice
                .entry(payment.record.invoice_number.to_string())
                .or_default();
            *paid = paid
                .checked_add(payment.record.amount)
                .ok_or_else(|| overflow("payments_received"))?;
        }
        let payments_received =
            checked_sum("payments_received", paid_by_invoice.values().copied())?;

        let mut invoiced_total = Decimal::ZERO;
        let mut outstanding_receivables = Decimal::ZERO;
        for invoice in ledger.invoices.iter().filter(|s| s.record.status.is_receivable()) {
            let total = invoice.record.total().ok_or_else(|| overflow("invoiced_total"))?;
            let paid = paid_by_invoice.get(&invoice.id).copied().unwrap_or_default();
            let balance = total
                .checked_sub(paid)
                .ok_or_else(|| overflow("outstanding_receivables"))?
                .max(Decimal::ZERO);
            invoiced_total = invoiced_total
                .checked_add(total)
                .ok_or_else(|| overflow("invoiced_total"))?;
            outstanding_receivables = outstanding_receivables
                .checked_add(balance)
                .ok_or_else(|| overflow("outstanding_receivables"))?;
        }

        let active_staff: Vec<&StaffMember> = ledger
            .staff
            .iter()
            .map(|s| &s.record)
            .filter(|m| m.active)
            .collect();

        Ok(Self {
            currency,
            total_income,
            total_expenses,
            net_income: total_income
                .checked_sub(total_expenses)
                .ok_or_else(|| overflow("net_income"))?,
            invoiced_total,
            payments_received,
            outstanding_receivables,
            customer_count: ledger.customers.len(),
            active_staff_count: active_staff.len(),
            monthly_payroll: checked_sum(
                "monthly_payroll",
                active_staff.iter().map(|m| m.monthly_salary),
            )?,
        })
    }

    /// Load every relevant collection and compute the summary.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if any collection cannot be read or holds
    /// a corrupted record.
    pub async fn load(
        store: &dyn DocumentStore,
        currency: CurrencyCode,
    ) -> Result<Self, RepositoryError> {
        let income = RecordRepository::<Income>::new(store);
        let expenses = RecordRepository::<Expense>::new(store);
        let invoices = RecordRepository::<Invoice>::new(store);
        let payments = RecordRepository::<Payment>::new(store);
        let customers = RecordRepository::<Customer>::new(store);
        let staff = RecordRepository::<StaffMember>::new(store);

        let (income, expenses, invoices, payments, customers, staff) = tokio::try_join!(
            income.list(),
            expenses.list(),
            invoices.list(),
            payments.list(),
            customers.list(),
            staff.list(),
        )?;

        Self::compute(
            currency,
            &Ledger {
                income: &income,
                expenses: &expenses,
                invoices: &invoices,
                payments: &payments,
                customers: &customers,
                staff: &staff,
            },
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::db::{Collection, MemoryDocumentStore};
    use crate::models::Record;

    async fn put<R: Record>(store: &MemoryDocumentStore, key: &str, body: serde_json::Value) {
        let record: R = serde_json::from_value(body).unwrap();
        RecordRepository::<R>::new(store).insert(key, record).await.unwrap();
    }

    fn invoice(status: &str, price: &str) -> serde_json::Value {
        json!({
            "customer_number": 1,
            "issued_on": "2026-01-01",
            "due_on": "2026-01-31",
            "status": status,
            "lines": [{"description": "Work", "quantity": "1", "unit_price": price}],
        })
    }

    #[tokio::test]
    async fn test_summary() {
        let store = MemoryDocumentStore::new();
        put::<Income>(&store, "i1", json!({"category": "consulting", "amount": "500", "occurred_on": "2026-01-05"})).await;
        put::<Expense>(&store, "e1", json!({"category": "rent", "amount": "200", "occurred_on": "2026-01-06"})).await;
        put::<Customer>(&store, "1", json!({"name": "Acme"})).await;
        put::<StaffMember>(&store, "1", json!({"name": "A", "email": "a@example.com", "position": "Clerk", "monthly_salary": "3000", "hired_on": "2025-01-01"})).await;
        put::<StaffMember>(&store, "2", json!({"name": "B", "email": "b@example.com", "position": "Clerk", "monthly_salary": "2500", "hired_on": "2025-01-01", "active": false})).await;

        put::<Invoice>(&store, "1", invoice("sent", "1000")).await;
        put::<Invoice>(&store, "2", invoice("paid", "300")).await;
        put::<Invoice>(&store, "3", invoice("void", "999")).await;
        put::<Invoice>(&store, "4", invoice("draft", "50")).await;
        put::<Payment>(&store, "p1", json!({"invoice_number": 1, "amount": "400", "received_on": "2026-01-10"})).await;
        // Overpaid: the excess must not reduce invoice 1's balance.
        put::<Payment>(&store, "p2", json!({"invoice_number": 2, "amount": "350", "received_on": "2026-01-11"})).await;

        let summary = FinancialSummary::load(&store, CurrencyCode::USD).await.unwrap();
        assert_eq!(summary.total_income, Decimal::from(500));
        assert_eq!(summary.total_expenses, Decimal::from(200));
        assert_eq!(summary.net_income, Decimal::from(300));
        assert_eq!(summary.invoiced_total, Decimal::from(1300));
        assert_eq!(summary.payments_received, Decimal::from(750));
        assert_eq!(summary.outstanding_receivables, Decimal::from(600));
        assert_eq!(summary.customer_count, 1);
        assert_eq!(summary.active_staff_count, 1);
        assert_eq!(summary.monthly_payroll, Decimal::from(3000));
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = MemoryDocumentStore::new();
        let summary = FinancialSummary::load(&store, CurrencyCode::EUR).await.unwrap();
        assert_eq!(summary.net_income, Decimal::ZERO);
        assert_eq!(summary.currency, CurrencyCode::EUR);
    }

    async fn put_raw(
        store: &MemoryDocumentStore,
        collection: Collection,
        key: &str,
        body: serde_json::Value,
    ) {
        assert!(store.create(collection, key, &body).await.unwrap());
    }

    #[tokio::test]
    async fn test_oversized_invoice_line_is_an_error() {
        let store = MemoryDocumentStore::new();
        put_raw(
            &store,
            Collection::Invoices,
            "1",
            json!({
                "customer_number": 1,
                "issued_on": "2026-01-01",
                "due_on": "2026-01-31",
                "status": "sent",
                "lines": [{"description": "Work", "quantity": "79228162514264337593543950335", "unit_price": "2"}],
            }),
        )
        .await;

        let result = FinancialSummary::load(&store, CurrencyCode::USD).await;
        assert!(matches!(result, Err(RepositoryError::DataCorruption(ref m)) if m.contains("invoiced_total")));
    }

    #[tokio::test]
    async fn test_income_sum_overflow_is_an_error() {
        let store = MemoryDocumentStore::new();
        for key in ["i1", "i2"] {
            put_raw(
                &store,
                Collection::Income,
                key,
                json!({"category": "consulting", "amount": "79228162514264337593543950335", "occurred_on": "2026-01-05"}),
            )
            .await;
        }

        let result = FinancialSummary::load(&store, CurrencyCode::USD).await;
        assert!(matches!(result, Err(RepositoryError::DataCorruption(ref m)) if m.contains("total_income")));
    }
}
