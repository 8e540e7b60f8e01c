pub mod analytics;
pub mod payload;
pub mod record;

pub use analytics::AnalyticsSnapshot;
pub use payload::{coerce_amount, coerce_qty, parse_items, parse_text_payload, PayloadError};
pub use record::{Invoice, LineItem, Record, Transaction};
