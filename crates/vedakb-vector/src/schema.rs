use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Columns of a knowledge collection table.
///
/// `metadata` holds a JSON object of string values and may be null, in which
/// case readers synthesize provenance from the row id.
pub fn build_collection_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		Field::new("metadata", DataType::Utf8, true),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
