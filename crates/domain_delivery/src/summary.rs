//! Rider daily collection summary

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{Currency, Money, MoneyError, OrderId, RiderId};

use crate::order::{Order, PaymentMethod};

/// How many deliveries the summary lists individually
pub const RECENT_DELIVERIES: usize = 10;

/// One completed delivery in the summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryLine {
    pub order_id: OrderId,
    pub order_number: String,
    pub cod_amount: Money,
    pub payment_method: Option<PaymentMethod>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// What a rider collected on one business day
///
/// `cash_amount` is what the rider remits through a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub rider_id: RiderId,
    pub date: NaiveDate,
    pub total_deliveries: usize,
    pub qrph_count: usize,
    pub qrph_amount: Money,
    pub cash_count: usize,
    pub cash_amount: Money,
    pub total_collected: Money,
    pub recent: Vec<DeliveryLine>,
}

/// Summarizes completed orders; expects them newest first
pub fn summarize(
    rider_id: RiderId,
    date: NaiveDate,
    orders: &[Order],
) -> Result<DailySummary, MoneyError> {
    let currency = orders.first().map(Order::currency).unwrap_or(Currency::PHP);

    let by_method = |method: PaymentMethod| -> Vec<&Money> {
        orders
            .iter()
            .filter(|o| o.payment_method == Some(method))
            .map(|o| &o.cod_amount)
            .collect()
    };
    let qrph = by_method(PaymentMethod::Qrph);
    let cash = by_method(PaymentMethod::Cash);

    Ok(DailySummary {
        rider_id,
        date,
        total_deliveries: orders.len(),
        qrph_count: qrph.len(),
        qrph_amount: Money::sum(currency, qrph.iter().copied())?,
        cash_count: cash.len(),
        cash_amount: Money::sum(currency, cash.iter().copied())?,
        total_collected: Money::sum(currency, orders.iter().map(|o| &o.cod_amount))?,
        recent: orders
            .iter()
            .take(RECENT_DELIVERIES)
            .map(|o| DeliveryLine {
                order_id: o.id,
                order_number: o.order_number.clone(),
                cod_amount: o.cod_amount,
                payment_method: o.payment_method,
                completed_at: o.completed_at,
            })
            .collect(),
    })
}
