
use super::{
    ChunkMetadata, CollectionMetadata, CollectionStats, EmbeddedChunk, ScoredChunk,
    StoredDocument,
};
use crate::{DocMindError, Result, config::Config};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const MODEL_METADATA_KEY: &str = "embedding_model";
const DIMENSION_METADATA_KEY: &str = "dimension";
const REMOTE_URI_PREFIX: &str = "db://";

/// Vector database store using LanceDB for similarity search
///
/// The store keeps no table handle; every operation looks the table up, so a
/// reset from one request is seen by the next.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    embedding_model: String,
    dimension: usize,
}

impl VectorStore {
    /// Connect to the configured location for vectors of `dimension` produced
    /// by `embedding_model`
    #[inline]
    pub async fn new(config: &Config, embedding_model: &str, dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(DocMindError::Config(
                "Embedding dimension must be positive".to_string(),
            ));
        }

        let uri = config.vector_store_uri();
        let connection = Self::connect(config, &uri).await?;

        info!(
            "Vector store ready at {} (collection {})",
            uri, config.vector_store.collection
        );

        Ok(Self {
            connection,
            table_name: config.vector_store.collection.clone(),
            embedding_model: embedding_model.to_string(),
            dimension,
        })
    }

    async fn connect(config: &Config, uri: &str) -> Result<Connection> {
        if uri.starts_with(REMOTE_URI_PREFIX) {
            return Self::connect_remote(config, uri).await;
        }

        debug!("Initializing LanceDB at path: {}", uri);
        std::fs::create_dir_all(uri).map_err(|e| {
            DocMindError::Store(format!("Failed to create vector database directory: {}", e))
        })?;

        lancedb::connect(uri)
            .execute()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to connect to LanceDB: {}", e)))
    }

    #[cfg(feature = "remote")]
    async fn connect_remote(config: &Config, uri: &str) -> Result<Connection> {
        debug!("Connecting to remote LanceDB at {}", uri);

        let api_key = config.vector_store.api_key.as_deref().ok_or_else(|| {
            DocMindError::Config(
                "Remote LanceDB requires an API key (set LANCEDB_API_KEY)".to_string(),
            )
        })?;

        let mut builder = lancedb::connect(uri).api_key(api_key);
        if let Some(region) = config.vector_store.region.as_deref() {
            builder = builder.region(region);
        }

        builder.execute().await.map_err(|e| {
            DocMindError::Store(format!("Failed to connect to remote LanceDB: {}", e))
        })
    }

    #[cfg(not(feature = "remote"))]
    #[expect(clippy::unused_async, reason = "mirrors the remote-enabled signature")]
    async fn connect_remote(_config: &Config, uri: &str) -> Result<Connection> {
        Err(DocMindError::Config(format!(
            "Cannot connect to {}: this build was compiled without the `remote` feature",
            uri
        )))
    }

    #[inline]
    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Schema for the active model, recorded in the table's schema metadata
    fn create_schema(&self) -> SchemaRef {
        let metadata = HashMap::from([
            (
                MODEL_METADATA_KEY.to_string(),
                self.embedding_model.clone(),
            ),
            (DIMENSION_METADATA_KEY.to_string(), self.dimension.to_string()),
        ]);

        Arc::new(Schema::new_with_metadata(
            vec![
                Field::new("id", DataType::Utf8, false),
                Field::new(
                    "vector",
                    DataType::FixedSizeList(
                        Arc::new(Field::new("item", DataType::Float32, true)),
                        self.vector_width(),
                    ),
                    false,
                ),
                Field::new("content", DataType::Utf8, false),
                Field::new("source", DataType::Utf8, false),
                Field::new("page", DataType::UInt32, false),
                Field::new("chunk_index", DataType::UInt32, false),
                Field::new("created_at", DataType::Utf8, false),
            ],
            metadata,
        ))
    }

    fn vector_width(&self) -> i32 {
        i32::try_from(self.dimension).unwrap_or(i32::MAX)
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to open table: {}", e)))?;

        Ok(Some(table))
    }

    /// Open the collection, creating it when missing
    async fn open_or_create_table(&self) -> Result<Table> {
        if let Some(table) = self.open_table().await? {
            return Ok(table);
        }

        info!(
            "Creating collection {} for {} ({} dimensions)",
            self.table_name, self.embedding_model, self.dimension
        );

        match self
            .connection
            .create_empty_table(&self.table_name, self.create_schema())
            .execute()
            .await
        {
            Ok(table) => Ok(table),
            Err(create_err) => {
                // Another writer may have created it first
                warn!(
                    "Failed to create collection ({}), trying to open it",
                    create_err
                );
                self.open_table().await?.ok_or_else(|| {
                    DocMindError::Store(format!("Failed to create table: {}", create_err))
                })
            }
        }
    }

    /// Embedding configuration recorded by an existing table
    async fn table_metadata(&self, table: &Table) -> Result<CollectionMetadata> {
        let schema = table
            .schema()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to get table schema: {}", e)))?;

        let dimension = schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => usize::try_from(*size).ok(),
                _ => None,
            })
            .ok_or_else(|| {
                DocMindError::Store("Could not find vector column or determine dimension".to_string())
            })?;

        let embedding_model = schema
            .metadata()
            .get(MODEL_METADATA_KEY)
            .cloned()
            .unwrap_or_default();

        Ok(CollectionMetadata {
            embedding_model,
            dimension,
        })
    }

    /// Reject tables built for another embedding model or dimension
    async fn ensure_compatible(&self, table: &Table) -> Result<()> {
        let existing = self.table_metadata(table).await?;

        if existing.dimension != self.dimension {
            return Err(DocMindError::Store(format!(
                "Collection '{}' holds {}-dimensional vectors but {} produces {}; reset the collection to switch embedding models",
                self.table_name, existing.dimension, self.embedding_model, self.dimension
            )));
        }

        if !existing.embedding_model.is_empty() && existing.embedding_model != self.embedding_model
        {
            return Err(DocMindError::Store(format!(
                "Collection '{}' was built with {} but the active model is {}; reset the collection to switch embedding models",
                self.table_name, existing.embedding_model, self.embedding_model
            )));
        }

        Ok(())
    }

    fn check_vector(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(DocMindError::Store(format!(
                "Expected a {}-dimensional vector, got {}",
                self.dimension,
                vector.len()
            )));
        }
        Ok(())
    }

    /// Append `chunks` in a single commit, creating the collection if needed
    ///
    /// Returns the number of rows written.
    #[inline]
    pub async fn upsert(&self, chunks: Vec<EmbeddedChunk>) -> Result<usize> {
        if chunks.is_empty() {
            debug!("No chunks to store");
            return Ok(0);
        }

        for chunk in &chunks {
            self.check_vector(&chunk.vector)?;
        }

        let table = self.open_or_create_table().await?;
        self.ensure_compatible(&table).await?;

        let record_batch = self.create_record_batch(&chunks)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to insert chunks: {}", e)))?;

        info!("Stored {} chunks in {}", chunks.len(), self.table_name);
        Ok(chunks.len())
    }

    fn create_record_batch(&self, chunks: &[EmbeddedChunk]) -> Result<RecordBatch> {
        let len = chunks.len();
        let created_at = chrono::Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for embedded in chunks {
            ids.push(uuid::Uuid::new_v4().to_string());
            contents.push(embedded.chunk.content.as_str());
            sources.push(embedded.chunk.source.as_str());
            pages.push(embedded.chunk.page);
            chunk_indices.push(u32::try_from(embedded.chunk.chunk_index).unwrap_or(u32::MAX));
            flat_values.extend_from_slice(&embedded.vector);
        }

        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array = FixedSizeListArray::try_new(
            field,
            self.vector_width(),
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| DocMindError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(sources)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| DocMindError::Store(format!("Failed to create record batch: {}", e)))
    }

    /// The `k` stored chunks closest to `vector` by cosine similarity,
    /// highest similarity first
    #[inline]
    pub async fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        self.check_vector(vector)?;

        let Some(table) = self.open_table().await? else {
            debug!("Collection {} does not exist yet", self.table_name);
            return Ok(Vec::new());
        };
        self.ensure_compatible(&table).await?;

        if k == 0 {
            return Ok(Vec::new());
        }

        debug!("Searching for {} nearest chunks", k);

        let stream = table
            .vector_search(vector)
            .map_err(|e| DocMindError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(k)
            .execute()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to execute search: {}", e)))?;

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to read result stream: {}", e)))?;

        let mut results = Vec::new();
        for batch in &batches {
            results.extend(parse_scored_batch(batch)?);
        }

        // Stable: equal scores keep the order LanceDB returned them in
        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(k);

        debug!("Found {} matching chunks", results.len());
        Ok(results)
    }

    /// Number of stored chunks; zero when the collection is missing
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        table
            .count_rows(None)
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to count rows: {}", e)))
    }

    /// Collection summary, or the empty sentinel when it cannot be read
    #[inline]
    pub async fn stats(&self) -> CollectionStats {
        match self.try_stats().await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to read collection stats: {}", e);
                CollectionStats::empty()
            }
        }
    }

    async fn try_stats(&self) -> Result<CollectionStats> {
        let Some(table) = self.open_table().await? else {
            return Ok(CollectionStats::empty());
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to count rows: {}", e)))?;
        let metadata = self.table_metadata(&table).await?;

        Ok(CollectionStats::active(
            count,
            self.table_name.clone(),
            Some(metadata),
        ))
    }

    /// Up to `limit` stored chunks in no particular order
    #[inline]
    pub async fn sample(&self, limit: usize) -> Vec<StoredDocument> {
        match self.try_sample(limit).await {
            Ok(documents) => documents,
            Err(e) => {
                warn!("Failed to sample collection: {}", e);
                Vec::new()
            }
        }
    }

    async fn try_sample(&self, limit: usize) -> Result<Vec<StoredDocument>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let Some(table) = self.open_table().await? else {
            return Ok(Vec::new());
        };

        let batches: Vec<RecordBatch> = table
            .query()
            .limit(limit)
            .execute()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to query collection: {}", e)))?
            .try_collect()
            .await
            .map_err(|e| DocMindError::Store(format!("Failed to read result stream: {}", e)))?;

        let mut documents = Vec::new();
        for batch in &batches {
            documents.extend(parse_document_batch(batch)?);
        }
        documents.truncate(limit);

        Ok(documents)
    }

    /// Drop every stored chunk and recreate an empty collection for the
    /// active model
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping collection {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| {
                    error!("Failed to drop collection: {}", e);
                    DocMindError::Store(format!("Failed to drop table: {}", e))
                })?;
        } else {
            debug!("Collection {} did not exist, nothing to drop", self.table_name);
        }

        self.open_or_create_table().await?;
        info!("Collection {} is empty", self.table_name);
        Ok(())
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DocMindError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| DocMindError::Store(format!("Invalid {} column type", name)))
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    batch
        .column_by_name(name)
        .ok_or_else(|| DocMindError::Store(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| DocMindError::Store(format!("Invalid {} column type", name)))
}

/// Content and provenance columns of one batch, row by row
fn parse_rows(batch: &RecordBatch) -> Result<Vec<(String, String, ChunkMetadata)>> {
    let ids = string_column(batch, "id")?;
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let pages = u32_column(batch, "page")?;
    let chunk_indices = u32_column(batch, "chunk_index")?;
    let created_ats = string_column(batch, "created_at")?;

    Ok((0..batch.num_rows())
        .map(|row| {
            (
                ids.value(row).to_string(),
                contents.value(row).to_string(),
                ChunkMetadata {
                    source: sources.value(row).to_string(),
                    page: pages.value(row),
                    chunk_index: chunk_indices.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
            )
        })
        .collect())
}

fn parse_scored_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    Ok(parse_rows(batch)?
        .into_iter()
        .enumerate()
        .map(|(row, (_id, content, metadata))| {
            let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
            ScoredChunk {
                content,
                metadata,
                similarity: 1.0 - distance,
                distance,
            }
        })
        .collect())
}

fn parse_document_batch(batch: &RecordBatch) -> Result<Vec<StoredDocument>> {
    Ok(parse_rows(batch)?
        .into_iter()
        .map(|(id, content, metadata)| StoredDocument {
            id,
            content,
            metadata,
        })
        .collect())
}
