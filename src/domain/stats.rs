//! Sales aggregation over orders

use chrono::{DateTime, Local, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesStats {
    pub order_count: i64,
    pub minimum_sale: Option<Decimal>,
    pub maximum_sale: Option<Decimal>,
    pub total_sales: Decimal,
    pub avg_sale: Option<Decimal>,
    pub sale_today: Decimal,
}

impl SalesStats {
    /// Folds `(total_price, created_at)` pairs. Orders at or after `today_start` count towards `sale_today`.
    /// Returns `None` when a sum leaves the decimal range.
    pub fn fold<I>(orders: I, today_start: DateTime<Utc>) -> Option<Self>
    where
        I: IntoIterator<Item = (Decimal, DateTime<Utc>)>,
    {
        let mut stats = Self::default();
        for (total, created_at) in orders {
            stats.order_count += 1;
            stats.total_sales = stats.total_sales.checked_add(total)?;
            stats.minimum_sale = Some(stats.minimum_sale.map_or(total, |m| m.min(total)));
            stats.maximum_sale = Some(stats.maximum_sale.map_or(total, |m| m.max(total)));
            if created_at >= today_start { stats.sale_today = stats.sale_today.checked_add(total)?; }
        }
        if stats.order_count > 0 {
            stats.avg_sale = stats.total_sales.checked_div(Decimal::from(stats.order_count));
        }
        Some(stats)
    }
}

/// Local midnight of the day containing `now`, expressed in UTC.
pub fn start_of_local_day(now: DateTime<Local>) -> DateTime<Utc> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(local) => local.with_timezone(&Utc),
        // midnight skipped by a DST jump; fall back to the UTC reading
        None => Utc.from_utc_datetime(&midnight),
    }
}
