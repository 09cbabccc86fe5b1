// SPDX-License-Identifier: Apache-2.0

//! Violation Policy Engine
//!
//! Runs the field-existence and index-coverage checks for a query and
//! decides, per check, whether to ignore, notify or fail. Failing takes
//! priority over notifying; notifications are throttled per distinct field
//! combination.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::coverage::{get_non_existing_fields, is_covered};
use crate::error::{AuditError, AuditResult};
use crate::filter::{FieldExtractor, FilterExpr};
use crate::metadata::{CollectionMetadata, MetadataCache, SchemaSource};
use crate::throttle::{fields_digest, ThrottleSet};
use crate::types::{CheckKind, CheckOutcome, InspectionReport, QueryOptions, ViolationRecord};

/// Threshold used when the index-check handler does not set one
pub const DEFAULT_MIN_COVERAGE: f64 = 1.0;

pub type NotifyFn = Arc<dyn Fn(&ViolationRecord) + Send + Sync>;
pub type FailMessageFn = Arc<dyn Fn(&ViolationRecord) -> String + Send + Sync>;
pub type PredicateFn = Arc<dyn Fn() -> bool + Send + Sync>;

/// A warn or throw switch: either fixed or evaluated on every query
#[derive(Clone)]
pub enum Condition {
    Constant(bool),
    Predicate(PredicateFn),
}

impl Condition {
    pub fn from_fn<F>(predicate: F) -> Self
    where
        F: Fn() -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(predicate))
    }

    pub fn evaluate(&self) -> bool {
        match self {
            Self::Constant(value) => *value,
            Self::Predicate(predicate) => predicate(),
        }
    }
}

impl From<bool> for Condition {
    fn from(value: bool) -> Self {
        Self::Constant(value)
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "Constant({})", value),
            Self::Predicate(_) => write!(f, "Predicate(..)"),
        }
    }
}

/// Callbacks for the field-existence check.
///
/// A missing callback disables the corresponding action.
#[derive(Clone, Default)]
pub struct FieldCheckHandler {
    pub notify: Option<NotifyFn>,
    pub fail_message: Option<FailMessageFn>,
}

impl FieldCheckHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_notify<F>(mut self, notify: F) -> Self
    where
        F: Fn(&ViolationRecord) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(notify));
        self
    }

    pub fn on_fail<F>(mut self, fail_message: F) -> Self
    where
        F: Fn(&ViolationRecord) -> String + Send + Sync + 'static,
    {
        self.fail_message = Some(Arc::new(fail_message));
        self
    }

    fn merge(&mut self, update: Self) {
        if update.notify.is_some() {
            self.notify = update.notify;
        }
        if update.fail_message.is_some() {
            self.fail_message = update.fail_message;
        }
    }
}

impl fmt::Debug for FieldCheckHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCheckHandler")
            .field("notify", &self.notify.is_some())
            .field("fail_message", &self.fail_message.is_some())
            .finish()
    }
}

/// Callbacks and threshold for the index-coverage check
#[derive(Clone, Default)]
pub struct IndexCheckHandler {
    pub notify: Option<NotifyFn>,
    pub fail_message: Option<FailMessageFn>,
    /// Fraction of query fields an index prefix must cover
    pub min_coverage: Option<f64>,
}

impl IndexCheckHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_notify<F>(mut self, notify: F) -> Self
    where
        F: Fn(&ViolationRecord) + Send + Sync + 'static,
    {
        self.notify = Some(Arc::new(notify));
        self
    }

    pub fn on_fail<F>(mut self, fail_message: F) -> Self
    where
        F: Fn(&ViolationRecord) -> String + Send + Sync + 'static,
    {
        self.fail_message = Some(Arc::new(fail_message));
        self
    }

    pub fn with_min_coverage(mut self, min_coverage: f64) -> Self {
        self.min_coverage = Some(min_coverage);
        self
    }

    fn merge(&mut self, update: Self) {
        if update.notify.is_some() {
            self.notify = update.notify;
        }
        if update.fail_message.is_some() {
            self.fail_message = update.fail_message;
        }
        if update.min_coverage.is_some() {
            self.min_coverage = update.min_coverage;
        }
    }
}

impl fmt::Debug for IndexCheckHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexCheckHandler")
            .field("notify", &self.notify.is_some())
            .field("fail_message", &self.fail_message.is_some())
            .field("min_coverage", &self.min_coverage)
            .finish()
    }
}

/// Mutable policy read on every query
#[derive(Debug, Clone)]
pub struct PolicyConfig {
    pub should_warn: Condition,
    pub should_throw: Condition,
    pub field_check: FieldCheckHandler,
    pub index_check: IndexCheckHandler,
}

impl PolicyConfig {
    /// Effective coverage threshold, never negative
    pub fn min_coverage(&self) -> f64 {
        self.index_check
            .min_coverage
            .unwrap_or(DEFAULT_MIN_COVERAGE)
            .max(0.0)
    }

    fn actions(&self, kind: CheckKind) -> (Option<&NotifyFn>, Option<&FailMessageFn>) {
        match kind {
            CheckKind::Field => (
                self.field_check.notify.as_ref(),
                self.field_check.fail_message.as_ref(),
            ),
            CheckKind::Index => (
                self.index_check.notify.as_ref(),
                self.index_check.fail_message.as_ref(),
            ),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            should_warn: Condition::Constant(true),
            should_throw: Condition::Constant(false),
            field_check: FieldCheckHandler::default(),
            index_check: IndexCheckHandler::default(),
        }
    }
}

/// Policy engine shared by every query issued through one interceptor
pub struct PolicyEngine {
    config: RwLock<PolicyConfig>,
    warned_field_queries: ThrottleSet,
    warned_index_queries: ThrottleSet,
    metadata: Arc<MetadataCache>,
    extractor: RwLock<FieldExtractor>,
}

impl PolicyEngine {
    /// Creates an engine with its own metadata cache
    pub fn new() -> Self {
        Self::with_cache(Arc::new(MetadataCache::new()))
    }

    /// Creates an engine reading metadata through a shared cache
    pub fn with_cache(metadata: Arc<MetadataCache>) -> Self {
        Self {
            config: RwLock::new(PolicyConfig::default()),
            warned_field_queries: ThrottleSet::new(),
            warned_index_queries: ThrottleSet::new(),
            metadata,
            extractor: RwLock::new(FieldExtractor::new()),
        }
    }

    pub fn metadata_cache(&self) -> &Arc<MetadataCache> {
        &self.metadata
    }

    /// Consistent copy of the current configuration
    pub fn config(&self) -> PolicyConfig {
        self.config.read().clone()
    }

    // ==================== Configuration ====================

    pub fn set_warn_condition(&self, condition: impl Into<Condition>) {
        let condition = condition.into();
        info!("Warn condition set to {:?}", condition);
        self.config.write().should_warn = condition;
    }

    pub fn set_throw_condition(&self, condition: impl Into<Condition>) {
        let condition = condition.into();
        info!("Throw condition set to {:?}", condition);
        self.config.write().should_throw = condition;
    }

    /// Merges the set callbacks into the field-check handler
    pub fn set_field_check_handler(&self, handler: FieldCheckHandler) {
        let mut config = self.config.write();
        config.field_check.merge(handler);
        info!("Field check handler updated: {:?}", config.field_check);
    }

    /// Merges the set callbacks and threshold into the index-check handler
    pub fn set_index_check_handler(&self, handler: IndexCheckHandler) {
        let mut config = self.config.write();
        config.index_check.merge(handler);
        info!("Index check handler updated: {:?}", config.index_check);
    }

    /// Edits the field-check handler in place under the config lock.
    ///
    /// Unlike `set_field_check_handler`, this can also unset callbacks.
    pub fn update_field_check_handler(&self, update: impl FnOnce(&mut FieldCheckHandler)) {
        let mut config = self.config.write();
        update(&mut config.field_check);
        info!("Field check handler replaced: {:?}", config.field_check);
    }

    /// Edits the index-check handler in place under the config lock
    pub fn update_index_check_handler(&self, update: impl FnOnce(&mut IndexCheckHandler)) {
        let mut config = self.config.write();
        update(&mut config.index_check);
        info!("Index check handler replaced: {:?}", config.index_check);
    }

    /// Replaces the field extractor, e.g. to extend its ignore-list
    pub fn set_extractor(&self, extractor: FieldExtractor) {
        *self.extractor.write() = extractor;
    }

    pub fn clear_warned_field_queries(&self) {
        self.warned_field_queries.clear();
        debug!("Cleared warned field queries");
    }

    pub fn clear_warned_index_queries(&self) {
        self.warned_index_queries.clear();
        debug!("Cleared warned index queries");
    }

    // ==================== Checks ====================

    /// Audits one query: extracts its fields, resolves collection metadata
    /// and runs the field check followed by the index check.
    ///
    /// A field-check failure ends the inspection.
    pub fn inspect<F: FilterExpr + ?Sized>(
        &self,
        source: &dyn SchemaSource,
        filter: &F,
        options: &QueryOptions,
    ) -> AuditResult<InspectionReport> {
        let fields = self.extractor.read().extract(filter);
        let metadata = self.metadata.get_metadata(source);
        let config = self.config();

        let field = self.field_check(&config, &metadata, filter, &fields, options)?;
        let index = self.index_check(&config, &metadata, filter, &fields, options)?;

        Ok(InspectionReport { field, index })
    }

    /// Field-existence check
    pub fn check_field<F: FilterExpr + ?Sized>(
        &self,
        metadata: &CollectionMetadata,
        filter: &F,
        fields: &BTreeSet<String>,
        options: &QueryOptions,
    ) -> AuditResult<CheckOutcome> {
        self.field_check(&self.config(), metadata, filter, fields, options)
    }

    /// Index-coverage check
    pub fn check_index<F: FilterExpr + ?Sized>(
        &self,
        metadata: &CollectionMetadata,
        filter: &F,
        fields: &BTreeSet<String>,
        options: &QueryOptions,
    ) -> AuditResult<CheckOutcome> {
        self.index_check(&self.config(), metadata, filter, fields, options)
    }

    fn field_check<F: FilterExpr + ?Sized>(
        &self,
        config: &PolicyConfig,
        metadata: &CollectionMetadata,
        filter: &F,
        fields: &BTreeSet<String>,
        options: &QueryOptions,
    ) -> AuditResult<CheckOutcome> {
        let referenced: Vec<&String> = fields.iter().collect();
        let violating = get_non_existing_fields(&referenced, &metadata.fields);
        if violating.is_empty() {
            return Ok(CheckOutcome::Passed);
        }

        let record = ViolationRecord {
            collection_name: metadata.name.clone(),
            violating_fields: violating,
            comment: options.comment.clone(),
            raw_filter: filter.to_json(),
        };

        self.enforce(config, CheckKind::Field, &record, fields)
    }

    fn index_check<F: FilterExpr + ?Sized>(
        &self,
        config: &PolicyConfig,
        metadata: &CollectionMetadata,
        filter: &F,
        fields: &BTreeSet<String>,
        options: &QueryOptions,
    ) -> AuditResult<CheckOutcome> {
        if metadata.indexes.is_empty() || fields.is_empty() {
            return Ok(CheckOutcome::Passed);
        }

        let referenced: Vec<&String> = fields.iter().collect();
        if is_covered(&referenced, &metadata.indexes, config.min_coverage()) {
            return Ok(CheckOutcome::Passed);
        }

        let record = ViolationRecord {
            collection_name: metadata.name.clone(),
            violating_fields: fields.iter().cloned().collect(),
            comment: options.comment.clone(),
            raw_filter: filter.to_json(),
        };

        self.enforce(config, CheckKind::Index, &record, fields)
    }

    /// Throw-over-warn decision shared by both checks.
    ///
    /// `config` is the snapshot the calling check already read; callbacks
    /// run with no lock held.
    fn enforce(
        &self,
        config: &PolicyConfig,
        kind: CheckKind,
        record: &ViolationRecord,
        fields: &BTreeSet<String>,
    ) -> AuditResult<CheckOutcome> {
        let (notify, fail_message) = config.actions(kind);

        if config.should_throw.evaluate() {
            if let Some(fail_message) = fail_message {
                let message = fail_message(record);
                return Err(match kind {
                    CheckKind::Field => AuditError::invalid_field(message),
                    CheckKind::Index => AuditError::low_index_coverage(message),
                });
            }
        }

        let Some(notify) = notify else {
            return Ok(CheckOutcome::Ignored);
        };
        if !config.should_warn.evaluate() {
            return Ok(CheckOutcome::Ignored);
        }

        let throttle = match kind {
            CheckKind::Field => &self.warned_field_queries,
            CheckKind::Index => &self.warned_index_queries,
        };
        if !throttle.first_sighting(fields_digest(fields)) {
            debug!(
                "Suppressed repeated {} violation on '{}'",
                kind.as_str(),
                record.collection_name
            );
            return Ok(CheckOutcome::Suppressed);
        }

        notify(record);
        Ok(CheckOutcome::Notified)
    }
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new()
    }
}
