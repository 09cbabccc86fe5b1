// SPDX-License-Identifier: Apache-2.0

//! MongoDB interception adapter
//!
//! Wraps a driver collection so every query-style operation is audited
//! before it reaches the server. An audit failure aborts the operation and
//! is returned to the caller; otherwise the driver call runs exactly once.

use std::sync::Arc;

use futures::TryStreamExt;
use mongodb::bson::{Bson, Document};
use mongodb::options::UpdateModifications;
use mongodb::results::{DeleteResult, UpdateResult};
use mongodb::{Collection, Cursor, IndexModel};
use qore_audit_core::{CollectionSchema, QueryOptions};
use tracing::debug;

use crate::engine::error::InterceptResult;
use crate::interceptor::{InterceptorPipeline, QueryHook};

/// Applies the query comment, if any, to a driver action
macro_rules! with_comment {
    ($action:expr, $options:expr) => {{
        let action = $action;
        match $options.comment {
            Some(comment) => action.comment(Bson::String(comment)),
            None => action,
        }
    }};
}

/// Ordered key names of an index model
pub fn index_fields(model: &IndexModel) -> Vec<String> {
    model.keys.keys().cloned().collect()
}

/// Adds the key lists of `models` to `schema` as declared indexes.
///
/// The server's default primary-key index is skipped; the metadata cache
/// adds it implicitly.
pub fn schema_with_index_models(mut schema: CollectionSchema, models: &[IndexModel]) -> CollectionSchema {
    for model in models {
        let fields = index_fields(model);
        if fields.is_empty() || fields == [schema.primary_key.as_str()] {
            continue;
        }
        schema.indexes.push(fields);
    }
    schema
}

/// A collection whose queries pass through the audit pipeline first
pub struct AuditedCollection {
    inner: Collection<Document>,
    schema: CollectionSchema,
    pipeline: Arc<InterceptorPipeline>,
}

impl AuditedCollection {
    pub fn new(
        inner: Collection<Document>,
        schema: CollectionSchema,
        pipeline: Arc<InterceptorPipeline>,
    ) -> Self {
        if inner.name() != schema.name {
            debug!(
                "Auditing collection '{}' with schema declared as '{}'",
                inner.name(),
                schema.name
            );
        }

        Self {
            inner,
            schema,
            pipeline,
        }
    }

    /// Builds the schema's index lists from the indexes present on the server
    pub async fn with_server_indexes(
        inner: Collection<Document>,
        schema: CollectionSchema,
        pipeline: Arc<InterceptorPipeline>,
    ) -> InterceptResult<Self> {
        let models: Vec<IndexModel> = inner.list_indexes().await?.try_collect().await?;
        debug!("Loaded {} indexes for '{}'", models.len(), inner.name());

        let schema = schema_with_index_models(schema, &models);
        Ok(Self::new(inner, schema, pipeline))
    }

    pub fn inner(&self) -> &Collection<Document> {
        &self.inner
    }

    pub fn schema(&self) -> &CollectionSchema {
        &self.schema
    }

    /// Runs the audit for `hook` without executing anything
    pub fn audit(&self, hook: QueryHook, filter: &Document, options: &QueryOptions) -> InterceptResult<()> {
        self.pipeline.pre_execute(hook, &self.schema, filter, options)?;
        Ok(())
    }

    pub async fn count_documents(&self, filter: Document, options: QueryOptions) -> InterceptResult<u64> {
        self.audit(QueryHook::Count, &filter, &options)?;
        Ok(with_comment!(self.inner.count_documents(filter), options).await?)
    }

    pub async fn delete_many(&self, filter: Document, options: QueryOptions) -> InterceptResult<DeleteResult> {
        self.audit(QueryHook::DeleteMany, &filter, &options)?;
        Ok(with_comment!(self.inner.delete_many(filter), options).await?)
    }

    pub async fn delete_one(&self, filter: Document, options: QueryOptions) -> InterceptResult<DeleteResult> {
        self.audit(QueryHook::DeleteOne, &filter, &options)?;
        Ok(with_comment!(self.inner.delete_one(filter), options).await?)
    }

    pub async fn find(&self, filter: Document, options: QueryOptions) -> InterceptResult<Cursor<Document>> {
        self.audit(QueryHook::Find, &filter, &options)?;
        Ok(with_comment!(self.inner.find(filter), options).await?)
    }

    pub async fn find_one(&self, filter: Document, options: QueryOptions) -> InterceptResult<Option<Document>> {
        self.audit(QueryHook::FindOne, &filter, &options)?;
        Ok(with_comment!(self.inner.find_one(filter), options).await?)
    }

    pub async fn find_one_and_delete(
        &self,
        filter: Document,
        options: QueryOptions,
    ) -> InterceptResult<Option<Document>> {
        self.audit(QueryHook::FindOneAndDelete, &filter, &options)?;
        Ok(with_comment!(self.inner.find_one_and_delete(filter), options).await?)
    }

    pub async fn find_one_and_update(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: QueryOptions,
    ) -> InterceptResult<Option<Document>> {
        self.audit(QueryHook::FindOneAndUpdate, &filter, &options)?;
        Ok(with_comment!(self.inner.find_one_and_update(filter, update), options).await?)
    }

    pub async fn update_one(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: QueryOptions,
    ) -> InterceptResult<UpdateResult> {
        self.audit(QueryHook::UpdateOne, &filter, &options)?;
        Ok(with_comment!(self.inner.update_one(filter, update), options).await?)
    }

    pub async fn update_many(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        options: QueryOptions,
    ) -> InterceptResult<UpdateResult> {
        self.audit(QueryHook::UpdateMany, &filter, &options)?;
        Ok(with_comment!(self.inner.update_many(filter, update), options).await?)
    }

    /// Legacy-style remove: deletes the first match or every match
    pub async fn remove(
        &self,
        filter: Document,
        just_one: bool,
        options: QueryOptions,
    ) -> InterceptResult<DeleteResult> {
        self.audit(QueryHook::Remove, &filter, &options)?;
        let result = if just_one {
            with_comment!(self.inner.delete_one(filter), options).await?
        } else {
            with_comment!(self.inner.delete_many(filter), options).await?
        };
        Ok(result)
    }

    /// Legacy-style update: modifies the first match or every match
    pub async fn update(
        &self,
        filter: Document,
        update: impl Into<UpdateModifications>,
        multi: bool,
        options: QueryOptions,
    ) -> InterceptResult<UpdateResult> {
        self.audit(QueryHook::Update, &filter, &options)?;
        let result = if multi {
            with_comment!(self.inner.update_many(filter, update), options).await?
        } else {
            with_comment!(self.inner.update_one(filter, update), options).await?
        };
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    #[test]
    fn test_index_fields_keep_key_order() {
        let model = IndexModel::builder()
            .keys(doc! { "createdAt": -1, "customer.name": 1 })
            .build();
        assert_eq!(
            index_fields(&model),
            vec!["createdAt".to_string(), "customer.name".to_string()]
        );
    }

    #[test]
    fn test_server_indexes_skip_primary_key() {
        let models = vec![
            IndexModel::builder().keys(doc! { "_id": 1 }).build(),
            IndexModel::builder().keys(doc! { "status": 1, "createdAt": 1 }).build(),
        ];

        let schema = schema_with_index_models(CollectionSchema::new("orders"), &models);
        assert_eq!(
            schema.indexes,
            vec![vec!["status".to_string(), "createdAt".to_string()]]
        );
    }
}
