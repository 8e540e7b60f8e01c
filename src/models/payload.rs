use serde_json::Value;
use thiserror::Error;

use super::record::LineItem;

/// 载荷解析错误
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload has no usable text field")]
    MissingText,
    #[error("text payload is not a structured record")]
    NotStructured,
    #[error("unparsable text payload: {0}")]
    Unparsable(String),
}

/// 解析载荷的 text 字段
///
/// 上游写入不规范: text 可能已经是结构化对象, 也可能是 JSON 字符串,
/// 甚至是单引号风格的伪 JSON。先严格解析, 再做一次引号归一化重试;
/// 仍失败则返回类型化错误, 由调用方计数。绝不把字符串当代码求值。
pub fn parse_text_payload(payload: &Value) -> Result<Value, PayloadError> {
    match payload.get("text") {
        Some(Value::Object(map)) => Ok(Value::Object(map.clone())),
        Some(Value::String(s)) => parse_structured_text(s),
        _ => Err(PayloadError::MissingText),
    }
}

/// 字符串形式的结构化文本: 严格 JSON → 引号归一化后重试
pub fn parse_structured_text(s: &str) -> Result<Value, PayloadError> {
    if let Ok(v) = serde_json::from_str::<Value>(s) {
        return Ok(v);
    }
    serde_json::from_str::<Value>(&normalize_quotes(s))
        .map_err(|_| PayloadError::Unparsable(preview(s)))
}

fn normalize_quotes(s: &str) -> String {
    s.replace('\'', "\"")
}

fn preview(s: &str) -> String {
    s.chars().take(80).collect()
}

/// 解析发票明细字段: 数组直接用, 字符串先解码, 解不开则按空明细处理
pub fn parse_items(items: &Value) -> Vec<LineItem> {
    let decoded;
    let arr = match items {
        Value::Array(arr) => arr,
        Value::String(s) => match parse_structured_text(s) {
            Ok(Value::Array(parsed)) => {
                decoded = parsed;
                &decoded
            }
            _ => return Vec::new(),
        },
        _ => return Vec::new(),
    };
    arr.iter().filter_map(LineItem::from_value).collect()
}

/// 金额强转: 数字或数字字符串 → f64, 缺失/非法按 0 计
pub fn coerce_amount(v: Option<&Value>) -> f64 {
    match v {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// 数量强转: 同金额, 但落到整数
pub fn coerce_qty(v: Option<&Value>) -> i64 {
    coerce_amount(v) as i64
}

/// 字符串字段强转: 数字也转成字符串 (vendor_id 在部分记录里是数字)
pub fn coerce_str(v: Option<&Value>, default: &str) -> String {
    match v {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => default.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_field_already_structured() {
        let payload = json!({"text": {"vendor_id": "V1", "total": 100}});
        let v = parse_text_payload(&payload).unwrap();
        assert_eq!(v["vendor_id"], "V1");
    }

    #[test]
    fn text_field_json_string() {
        let payload = json!({"text": "{\"vendor_id\": \"V1\", \"total\": 100}"});
        let v = parse_text_payload(&payload).unwrap();
        assert_eq!(v["total"], 100);
    }

    #[test]
    fn text_field_single_quoted() {
        let payload = json!({"text": "{'vendor_id': 'V1', 'total': 100}"});
        let v = parse_text_payload(&payload).unwrap();
        assert_eq!(v["vendor_id"], "V1");
    }

    #[test]
    fn garbage_text_is_typed_error_not_panic() {
        let payload = json!({"text": "__import__('os').system('id')"});
        assert!(matches!(
            parse_text_payload(&payload),
            Err(PayloadError::Unparsable(_))
        ));
    }

    #[test]
    fn missing_text_field() {
        let payload = json!({"type": "chunk"});
        assert!(matches!(
            parse_text_payload(&payload),
            Err(PayloadError::MissingText)
        ));
    }

    #[test]
    fn items_from_array_and_string() {
        let arr = json!([{"product": "Widget", "qty": 2, "total": 100}]);
        let items = parse_items(&arr);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product, "Widget");

        let s = json!("[{'product': 'Widget', 'qty': 2, 'total': 100}]");
        let items = parse_items(&s);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].qty, 2);
        assert_eq!(items[0].total, 100.0);
    }

    #[test]
    fn unparsable_items_degrade_to_empty() {
        assert!(parse_items(&json!("not items at all")).is_empty());
        assert!(parse_items(&json!(null)).is_empty());
        assert!(parse_items(&json!(42)).is_empty());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(coerce_amount(Some(&json!(12.5))), 12.5);
        assert_eq!(coerce_amount(Some(&json!("99.9"))), 99.9);
        assert_eq!(coerce_amount(Some(&json!(" 7 "))), 7.0);
        assert_eq!(coerce_amount(Some(&json!("n/a"))), 0.0);
        assert_eq!(coerce_amount(None), 0.0);
        assert_eq!(coerce_qty(Some(&json!(3.0))), 3);
        assert_eq!(coerce_qty(Some(&json!("4"))), 4);
    }
}
