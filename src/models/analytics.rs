use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 聚合结果快照
///
/// 每次加载整体重算, 发布后只读。Map 均为保序 Map:
/// 花费/数量类按值降序, 月度按键升序, 序列化时保持该顺序。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsSnapshot {
    pub vendor_spend: IndexMap<String, f64>,
    pub vendor_invoice_count: IndexMap<String, u64>,
    pub monthly_spend: IndexMap<String, f64>,
    pub top_products_qty: IndexMap<String, i64>,
    pub top_products_revenue: IndexMap<String, f64>,
    pub total_invoices: usize,
    pub total_transactions: usize,
    pub total_spend: f64,
    /// 解码失败被跳过的记录数 (不再静默丢弃)
    pub skipped_records: u64,
    pub computed_at: DateTime<Utc>,
}
