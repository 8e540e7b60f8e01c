use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::payload::{coerce_amount, coerce_qty, coerce_str};

/// 发票明细行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: String,
    pub qty: i64,
    pub total: f64,
}

impl LineItem {
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        Some(Self {
            product: coerce_str(obj.get("product"), "Unknown"),
            qty: coerce_qty(obj.get("qty")),
            total: coerce_amount(obj.get("total")),
        })
    }
}

/// 发票记录
///
/// items 保持原始 Value (数组或编码后的字符串), 聚合时再解码,
/// 解码失败按空明细降级。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub vendor_id: String,
    pub total: f64,
    pub date: String,
    pub items: Value,
}

/// 交易记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub vendor_id: String,
    pub amount: f64,
    pub date: String,
}

/// 解码后的记录: 形状不显式声明, 按字段推断
#[derive(Debug, Clone)]
pub enum Record {
    Invoice(Invoice),
    Transaction(Transaction),
}

impl Record {
    /// 从结构化对象推断记录形状
    ///
    /// 只带 amount 的是交易; 带 total 或 items 的是发票。
    /// vendor_id/金额缺失按 "unknown"/0 兜底, 不报错。
    pub fn from_value(v: &Value) -> Option<Self> {
        let obj = v.as_object()?;
        let vendor_id = coerce_str(obj.get("vendor_id"), "unknown");
        let date = coerce_str(obj.get("date"), "");

        if obj.contains_key("amount") && !obj.contains_key("total") && !obj.contains_key("items") {
            return Some(Record::Transaction(Transaction {
                vendor_id,
                amount: coerce_amount(obj.get("amount")),
                date,
            }));
        }

        Some(Record::Invoice(Invoice {
            vendor_id,
            total: coerce_amount(obj.get("total")),
            date,
            items: obj.get("items").cloned().unwrap_or(Value::Null),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_only_is_transaction() {
        let v = json!({"vendor_id": "V1", "amount": 50, "date": "2026-02-14"});
        match Record::from_value(&v) {
            Some(Record::Transaction(tx)) => {
                assert_eq!(tx.vendor_id, "V1");
                assert_eq!(tx.amount, 50.0);
            }
            other => panic!("expected transaction, got {:?}", other),
        }
    }

    #[test]
    fn total_or_items_is_invoice() {
        let v = json!({"vendor_id": "V2", "total": "120.5", "date": "2026-01-03", "items": []});
        match Record::from_value(&v) {
            Some(Record::Invoice(inv)) => {
                assert_eq!(inv.vendor_id, "V2");
                assert_eq!(inv.total, 120.5);
            }
            other => panic!("expected invoice, got {:?}", other),
        }
    }

    #[test]
    fn missing_fields_default_instead_of_failing() {
        let v = json!({"total": 10});
        match Record::from_value(&v) {
            Some(Record::Invoice(inv)) => {
                assert_eq!(inv.vendor_id, "unknown");
                assert_eq!(inv.date, "");
                assert!(inv.items.is_null());
            }
            other => panic!("expected invoice, got {:?}", other),
        }
    }

    #[test]
    fn non_object_is_rejected() {
        assert!(Record::from_value(&json!("just text")).is_none());
        assert!(Record::from_value(&json!([1, 2, 3])).is_none());
    }

    #[test]
    fn numeric_vendor_id_is_stringified() {
        let v = json!({"vendor_id": 17, "amount": 5});
        match Record::from_value(&v) {
            Some(Record::Transaction(tx)) => assert_eq!(tx.vendor_id, "17"),
            other => panic!("expected transaction, got {:?}", other),
        }
    }
}
