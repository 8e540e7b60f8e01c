use tracing::{debug, warn};

use crate::models::{parse_text_payload, Record};

use super::client::{StoreError, VectorStore};

/// 每页抓取的点数上限
const SCROLL_BATCH: usize = 250;

/// 一次全量加载的结果
#[derive(Debug, Default)]
pub struct LoadOutcome {
    pub records: Vec<Record>,
    /// 解码失败被跳过的点数
    pub skipped: u64,
}

/// 按游标滚动读完整个集合并解码载荷
///
/// 游标为 None 或返回空页即终止; 只读不写, 可从头重跑。
/// 解码失败的点计数并记日志, 不再静默丢弃。
pub async fn load_all_records(
    store: &VectorStore,
    collection: &str,
) -> Result<LoadOutcome, StoreError> {
    let mut outcome = LoadOutcome::default();
    let mut offset = None;

    loop {
        let (points, next_offset) = store.scroll(collection, SCROLL_BATCH, offset).await?;
        if points.is_empty() {
            break;
        }

        for point in points {
            match parse_text_payload(&point.payload).map(|v| Record::from_value(&v)) {
                Ok(Some(record)) => outcome.records.push(record),
                Ok(None) => {
                    debug!("point {:?} in {}: text decodes to a non-record value", point.id, collection);
                    outcome.skipped += 1;
                }
                Err(e) => {
                    debug!("point {:?} in {}: {}", point.id, collection, e);
                    outcome.skipped += 1;
                }
            }
        }

        offset = match next_offset {
            Some(o) => Some(o),
            None => break,
        };
    }

    if outcome.skipped > 0 {
        warn!(
            "Collection {}: skipped {} undecodable payloads ({} loaded)",
            collection,
            outcome.skipped,
            outcome.records.len()
        );
    }
    Ok(outcome)
}
