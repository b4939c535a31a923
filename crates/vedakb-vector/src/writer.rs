use anyhow::{Result, ensure};
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, StringArray};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::sync::Arc;
use tracing::info;

use vedakb_core::types::DocumentChunk;
use crate::schema::build_collection_schema;
use crate::table::{open_db, table_exists};

/// Writes embedded chunks into LanceDB collections, creating them on first use.
pub struct CollectionWriter { db: Connection, dim: i32, batch_size: usize }

impl CollectionWriter {
	pub async fn open(uri: &str, dim: usize) -> Result<Self> {
		Ok(Self { db: open_db(uri).await?, dim: i32::try_from(dim)?, batch_size: 1000 })
	}

	pub async fn write(&self, collection: &str, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<usize> {
		if chunks.is_empty() { info!(collection, "no chunks to write"); return Ok(0); }
		ensure!(chunks.len() == embeddings.len(), "chunks and embeddings length must match");
		for e in embeddings { ensure!(e.len() == self.dim as usize, "embedding width {} != {}", e.len(), self.dim); }
		let pb = ProgressBar::new(chunks.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		let mut written = 0usize;
		for (chunk_batch, emb_batch) in chunks.chunks(self.batch_size).zip(embeddings.chunks(self.batch_size)) {
			self.insert_batch(collection, chunk_batch, emb_batch).await?;
			written += chunk_batch.len();
			pb.set_position(written as u64);
		}
		pb.finish_with_message(format!("{collection} done"));
		info!(collection, written, "wrote chunks");
		Ok(written)
	}

	async fn insert_batch(&self, collection: &str, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<()> {
		let record_batch = self.to_record_batch(chunks, embeddings)?; let schema = record_batch.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), schema));
		if table_exists(&self.db, collection).await? {
			self.db.open_table(collection).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(collection, reader).execute().await?;
		}
		Ok(())
	}

	fn to_record_batch(&self, chunks: &[DocumentChunk], embeddings: &[Vec<f32>]) -> Result<RecordBatch> {
		let schema = build_collection_schema(self.dim);
		let mut ids = Vec::new(); let mut texts = Vec::new(); let mut sources = Vec::new(); let mut metas = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
		for (chunk, emb) in chunks.iter().zip(embeddings) {
			ids.push(chunk.id.clone()); texts.push(chunk.content.clone()); sources.push(chunk.source.clone());
			metas.push(Some(serde_json::json!({
				"source": chunk.source,
				"chunk_index": chunk.chunk_index.to_string(),
				"total_chunks": chunk.total_chunks.to_string(),
			}).to_string()));
			vectors.push(Some(emb.iter().map(|&x| Some(x)).collect()));
		}
		let record_batch = RecordBatch::try_new(schema, vec![
			Arc::new(StringArray::from(ids)),
			Arc::new(StringArray::from(texts)),
			Arc::new(StringArray::from(sources)),
			Arc::new(StringArray::from(metas)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim)),
		])?;
		Ok(record_batch)
	}
}
