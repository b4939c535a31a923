use arrow_array::{Array, Float32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Connection;
use tracing::debug;

use vedakb_core::error::StoreError;
use vedakb_core::traits::VectorStore;
use vedakb_core::types::{Meta, ScoredPoint};

/// A LanceDB directory where every table is one knowledge collection.
pub struct LanceStore { conn: Connection, uri: String }

impl LanceStore {
	pub async fn open(uri: &str) -> Result<Self, StoreError> {
		let conn = lancedb::connect(uri)
			.execute()
			.await
			.map_err(|e| StoreError::Connect { url: uri.to_string(), message: e.to_string() })?;
		Ok(Self { conn, uri: uri.to_string() })
	}
}

#[async_trait]
impl VectorStore for LanceStore {
	fn kind(&self) -> &'static str { "lancedb" }

	fn url(&self) -> &str { &self.uri }

	async fn list_collections(&self) -> Result<Vec<String>, StoreError> {
		self.conn.table_names().execute().await.map_err(|e| StoreError::Backend(e.to_string()))
	}

	async fn collection_exists(&self, name: &str) -> Result<bool, StoreError> {
		Ok(self.list_collections().await?.iter().any(|n| n == name))
	}

	async fn search(&self, name: &str, vector: &[f32], k: usize) -> Result<Vec<ScoredPoint>, StoreError> {
		let table = self.conn.open_table(name).execute().await.map_err(request_err(name))?;
		let mut stream = table
			.vector_search(vector.to_vec())
			.map_err(request_err(name))?
			.limit(k)
			.execute()
			.await
			.map_err(request_err(name))?;
		let mut points = Vec::new();
		while let Some(batch) = stream.try_next().await.map_err(request_err(name))? {
			points.extend(batch_to_points(&batch)?);
		}
		debug!(collection = name, hits = points.len(), "lancedb search");
		Ok(points)
	}
}

fn request_err<E: std::fmt::Display>(collection: &str) -> impl FnOnce(E) -> StoreError + '_ {
	move |e| StoreError::Request { collection: collection.to_string(), message: e.to_string() }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Option<&'a StringArray> {
	batch.column_by_name(name).and_then(|c| c.as_any().downcast_ref::<StringArray>())
}

/// Decodes one result batch. `id` is mandatory; `text` and `metadata` may be
/// missing or null.
pub(crate) fn batch_to_points(batch: &RecordBatch) -> Result<Vec<ScoredPoint>, StoreError> {
	let ids = string_column(batch, "id").ok_or_else(|| StoreError::Malformed("missing 'id' column".into()))?;
	let texts = string_column(batch, "text");
	let metas = string_column(batch, "metadata");
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());
	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let text = texts.filter(|c| !c.is_null(i)).map(|c| c.value(i).to_string());
		let metadata = match metas.filter(|c| !c.is_null(i)) {
			Some(c) => Some(parse_metadata(c.value(i))?),
			None => None,
		};
		let score = distances.map(|d| 1.0 - d.value(i)).unwrap_or(0.0);
		out.push(ScoredPoint { id: ids.value(i).to_string(), score, text, metadata });
	}
	Ok(out)
}

fn parse_metadata(raw: &str) -> Result<Meta, StoreError> {
	let value: serde_json::Value = serde_json::from_str(raw).map_err(|e| StoreError::Malformed(format!("metadata: {e}")))?;
	let obj = value.as_object().ok_or_else(|| StoreError::Malformed("metadata is not an object".into()))?;
	Ok(obj
		.iter()
		.map(|(k, v)| (k.clone(), v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string())))
		.collect())
}

#[cfg(test)]
mod tests {
	use super::*;
	use arrow_schema::{DataType, Field, Schema};
	use std::sync::Arc;

	#[test]
	fn batch_to_points_reads_nullable_columns() {
		let schema = Arc::new(Schema::new(vec![
			Field::new("id", DataType::Utf8, false),
			Field::new("text", DataType::Utf8, true),
			Field::new("metadata", DataType::Utf8, true),
			Field::new("_distance", DataType::Float32, false),
		]));
		let batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(vec!["a", "b"])),
			Arc::new(StringArray::from(vec![Some("hello"), None])),
			Arc::new(StringArray::from(vec![Some(r#"{"source":"doc.txt","page":3}"#), None])),
			Arc::new(Float32Array::from(vec![0.25f32, 0.5])),
		]).unwrap();

		let points = batch_to_points(&batch).unwrap();
		assert_eq!(points.len(), 2);
		assert_eq!(points[0].text.as_deref(), Some("hello"));
		let meta = points[0].metadata.as_ref().unwrap();
		assert_eq!(meta.get("source").map(String::as_str), Some("doc.txt"));
		assert_eq!(meta.get("page").map(String::as_str), Some("3"));
		assert!((points[0].score - 0.75).abs() < 1e-6);
		assert!(points[1].text.is_none());
		assert!(points[1].metadata.is_none());
	}

	#[test]
	fn batch_without_id_is_malformed() {
		let schema = Arc::new(Schema::new(vec![Field::new("text", DataType::Utf8, false)]));
		let batch = RecordBatch::try_new(schema, vec![Arc::new(StringArray::from(vec!["x"]))]).unwrap();
		assert!(matches!(batch_to_points(&batch), Err(StoreError::Malformed(_))));
	}
}
