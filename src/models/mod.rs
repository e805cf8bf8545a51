pub mod category;
pub mod record;

pub use category::Category;
pub use record::{FieldValue, Record, ValueKind};
