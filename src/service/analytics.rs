use chrono::Utc;
use indexmap::IndexMap;
use std::cmp::Ordering;
use tracing::info;

use crate::config::CollectionsConfig;
use crate::models::{parse_items, AnalyticsSnapshot, Invoice, Record, Transaction};
use crate::store::{load_all_records, StoreError, VectorStore};

/// 产品榜单保留的条目数
const TOP_PRODUCTS: usize = 20;

/// 单遍聚合: (发票序列, 交易序列) → 快照
///
/// 折叠满足交换/结合律, 同键累加与输入顺序无关;
/// 单条记录畸形按零贡献降级, 不中断整体聚合。
pub fn compute_analytics(invoices: &[Invoice], transactions: &[Transaction]) -> AnalyticsSnapshot {
    // 累加阶段用保序 Map, 使排序并列时保持首次出现的顺序
    let mut vendor_spend: IndexMap<String, f64> = IndexMap::new();
    let mut vendor_invoice_count: IndexMap<String, u64> = IndexMap::new();
    let mut monthly_spend: IndexMap<String, f64> = IndexMap::new();
    let mut product_qty: IndexMap<String, i64> = IndexMap::new();
    let mut product_revenue: IndexMap<String, f64> = IndexMap::new();

    for inv in invoices {
        let vendor = format!("Vendor {}", inv.vendor_id);
        *vendor_spend.entry(vendor.clone()).or_insert(0.0) += inv.total;
        *vendor_invoice_count.entry(vendor).or_insert(0) += 1;
        if let Some(month) = month_key(&inv.date) {
            *monthly_spend.entry(month).or_insert(0.0) += inv.total;
        }

        for item in parse_items(&inv.items) {
            *product_qty.entry(item.product.clone()).or_insert(0) += item.qty;
            *product_revenue.entry(item.product).or_insert(0.0) += item.total;
        }
    }

    for tx in transactions {
        let vendor = format!("Vendor {}", tx.vendor_id);
        *vendor_spend.entry(vendor).or_insert(0.0) += tx.amount;
        if let Some(month) = month_key(&tx.date) {
            *monthly_spend.entry(month).or_insert(0.0) += tx.amount;
        }
    }

    let total_spend = vendor_spend.values().sum();

    AnalyticsSnapshot {
        vendor_spend: sorted_desc(vendor_spend, usize::MAX),
        vendor_invoice_count: sorted_desc(vendor_invoice_count, usize::MAX),
        monthly_spend: sorted_by_key(monthly_spend),
        top_products_qty: sorted_desc(product_qty, TOP_PRODUCTS),
        top_products_revenue: sorted_desc(product_revenue, TOP_PRODUCTS),
        total_invoices: invoices.len(),
        total_transactions: transactions.len(),
        total_spend,
        skipped_records: 0,
        computed_at: Utc::now(),
    }
}

/// 加载两个集合、按推断形状分拣并聚合
pub async fn build_snapshot(
    store: &VectorStore,
    collections: &CollectionsConfig,
) -> Result<AnalyticsSnapshot, StoreError> {
    let a = load_all_records(store, &collections.invoices).await?;
    let b = load_all_records(store, &collections.transactions).await?;
    let skipped = a.skipped + b.skipped;

    let mut invoices = Vec::new();
    let mut transactions = Vec::new();
    for record in a.records.into_iter().chain(b.records) {
        match record {
            Record::Invoice(inv) => invoices.push(inv),
            Record::Transaction(tx) => transactions.push(tx),
        }
    }

    info!(
        "Loaded {} invoices, {} transactions ({} skipped)",
        invoices.len(),
        transactions.len(),
        skipped
    );

    let mut snapshot = compute_analytics(&invoices, &transactions);
    snapshot.skipped_records = skipped;
    Ok(snapshot)
}

/// 日期前 7 位为月桶键 (YYYY-MM 定宽, 字典序即时间序); 空日期不入桶
fn month_key(date: &str) -> Option<String> {
    if date.is_empty() {
        return None;
    }
    Some(date.chars().take(7).collect())
}

/// 按值稳定降序排序并截断
fn sorted_desc<V: PartialOrd + Copy>(map: IndexMap<String, V>, top: usize) -> IndexMap<String, V> {
    let mut entries: Vec<(String, V)> = map.into_iter().collect();
    entries.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    entries.truncate(top);
    entries.into_iter().collect()
}

/// 按键升序排序
fn sorted_by_key<V>(map: IndexMap<String, V>) -> IndexMap<String, V> {
    let mut entries: Vec<(String, V)> = map.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));
    entries.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn invoice(vendor: &str, total: f64, date: &str, items: Value) -> Invoice {
        Invoice {
            vendor_id: vendor.to_string(),
            total,
            date: date.to_string(),
            items,
        }
    }

    fn tx(vendor: &str, amount: f64, date: &str) -> Transaction {
        Transaction {
            vendor_id: vendor.to_string(),
            amount,
            date: date.to_string(),
        }
    }

    #[test]
    fn end_to_end_single_invoice() {
        let invoices = vec![invoice(
            "V1",
            100.0,
            "2026-01-15",
            json!([{"product": "Widget", "qty": 2, "total": 100}]),
        )];
        let snap = compute_analytics(&invoices, &[]);

        assert_eq!(snap.vendor_spend.get("Vendor V1"), Some(&100.0));
        assert_eq!(snap.monthly_spend.get("2026-01"), Some(&100.0));
        assert_eq!(snap.top_products_qty.get("Widget"), Some(&2));
        assert_eq!(snap.top_products_revenue.get("Widget"), Some(&100.0));
        assert_eq!(snap.total_invoices, 1);
        assert_eq!(snap.total_transactions, 0);
        assert_eq!(snap.total_spend, 100.0);
    }

    #[test]
    fn total_spend_is_sum_of_invoices_and_transactions() {
        let invoices = vec![
            invoice("V1", 100.0, "2026-01-15", Value::Null),
            invoice("V2", 50.0, "2026-02-01", Value::Null),
        ];
        let transactions = vec![tx("V1", 25.0, "2026-02-14"), tx("V3", 10.0, "")];
        let snap = compute_analytics(&invoices, &transactions);
        assert_eq!(snap.total_spend, 185.0);
    }

    #[test]
    fn same_vendor_accumulates_into_one_bucket_order_independently() {
        let a = vec![
            invoice("V1", 10.0, "", Value::Null),
            invoice("V1", 30.0, "", Value::Null),
            invoice("V2", 5.0, "", Value::Null),
        ];
        let mut b = a.clone();
        b.reverse();

        let snap_a = compute_analytics(&a, &[]);
        let snap_b = compute_analytics(&b, &[]);

        assert_eq!(snap_a.vendor_spend.get("Vendor V1"), Some(&40.0));
        assert_eq!(snap_a.vendor_invoice_count.get("Vendor V1"), Some(&2));
        assert_eq!(snap_a.vendor_spend.get("Vendor V1"), snap_b.vendor_spend.get("Vendor V1"));
        assert_eq!(snap_a.total_spend, snap_b.total_spend);
    }

    #[test]
    fn empty_date_contributes_to_no_month_bucket() {
        let invoices = vec![
            invoice("V1", 100.0, "2026-01-15", Value::Null),
            invoice("V1", 40.0, "", Value::Null),
        ];
        let snap = compute_analytics(&invoices, &[]);
        assert_eq!(snap.monthly_spend.len(), 1);
        assert_eq!(snap.monthly_spend.get("2026-01"), Some(&100.0));
    }

    #[test]
    fn months_sort_ascending() {
        let invoices = vec![
            invoice("V1", 1.0, "2026-03-02", Value::Null),
            invoice("V1", 2.0, "2025-12-31", Value::Null),
            invoice("V1", 3.0, "2026-01-10", Value::Null),
        ];
        let snap = compute_analytics(&invoices, &[]);
        let months: Vec<&String> = snap.monthly_spend.keys().collect();
        assert_eq!(months, ["2025-12", "2026-01", "2026-03"]);
    }

    #[test]
    fn product_tables_truncate_to_top_20_descending() {
        let items: Vec<Value> = (0..30)
            .map(|i| json!({"product": format!("P{:02}", i), "qty": i + 1, "total": (i + 1) as f64}))
            .collect();
        let invoices = vec![invoice("V1", 0.0, "", Value::Array(items))];
        let snap = compute_analytics(&invoices, &[]);

        assert_eq!(snap.top_products_qty.len(), 20);
        let quantities: Vec<i64> = snap.top_products_qty.values().copied().collect();
        let mut sorted = quantities.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(quantities, sorted);
        assert_eq!(quantities[0], 30);
    }

    #[test]
    fn ties_keep_first_encountered_order() {
        let items = json!([
            {"product": "A", "qty": 5, "total": 10},
            {"product": "B", "qty": 5, "total": 10},
            {"product": "C", "qty": 9, "total": 1},
        ]);
        let invoices = vec![invoice("V1", 0.0, "", items)];
        let snap = compute_analytics(&invoices, &[]);
        let names: Vec<&String> = snap.top_products_qty.keys().collect();
        assert_eq!(names, ["C", "A", "B"]);
    }

    #[test]
    fn garbage_items_contribute_zero() {
        let invoices = vec![invoice("V1", 100.0, "2026-01-15", json!("not a list"))];
        let snap = compute_analytics(&invoices, &[]);
        assert!(snap.top_products_qty.is_empty());
        assert_eq!(snap.total_spend, 100.0);
    }

    #[test]
    fn transactions_do_not_touch_invoice_count_or_products() {
        let transactions = vec![tx("V1", 70.0, "2026-02-14")];
        let snap = compute_analytics(&[], &transactions);
        assert_eq!(snap.vendor_spend.get("Vendor V1"), Some(&70.0));
        assert_eq!(snap.monthly_spend.get("2026-02"), Some(&70.0));
        assert!(snap.vendor_invoice_count.is_empty());
        assert!(snap.top_products_qty.is_empty());
        assert_eq!(snap.total_transactions, 1);
    }
}
