// SPDX-License-Identifier: Apache-2.0

//! Interceptor Pipeline
//!
//! Orchestrates the per-query audit workflow:
//! 1. Configuration: load/save the audit config and push it into the policy engine
//! 2. Pre-execution: field and index checks, verdict for the adapter
//! 3. Bookkeeping: outcome counters

use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;
use qore_audit_core::policy::{FailMessageFn, NotifyFn};
use qore_audit_core::{
    AuditResult, FieldExtractor, FilterExpr, PolicyEngine, QueryOptions, SchemaSource,
    ViolationRecord,
};
use tracing::{debug, info, warn};

use super::stats::{AuditStats, AuditStatsSnapshot};
use super::types::{AuditConfig, QueryHook};
use crate::engine::error::{InterceptError, InterceptResult};

/// Conventional file name for a persisted audit config
pub const CONFIG_FILE_NAME: &str = "audit.json";

/// The main interceptor pipeline
pub struct InterceptorPipeline {
    /// Policy engine shared by every audited collection
    engine: Arc<PolicyEngine>,
    /// Outcome counters
    stats: AuditStats,
    /// Configuration
    config: RwLock<AuditConfig>,
    /// Callbacks this pipeline installs from its configuration
    builtins: BuiltinCallbacks,
}

/// Config-driven callbacks, kept so they can be told apart from callbacks
/// registered directly on the engine
struct BuiltinCallbacks {
    log_field: NotifyFn,
    log_index: NotifyFn,
    describe_field: FailMessageFn,
    describe_index: FailMessageFn,
}

impl BuiltinCallbacks {
    fn new() -> Self {
        Self {
            log_field: Arc::new(log_field_violation),
            log_index: Arc::new(log_index_violation),
            describe_field: Arc::new(describe_field_violation),
            describe_index: Arc::new(describe_index_violation),
        }
    }
}

/// Installs `builtin` in `slot`, or removes it when disabled. A callback
/// registered by someone else is left alone when disabling.
fn toggle_builtin<T: ?Sized>(slot: &mut Option<Arc<T>>, builtin: &Arc<T>, enabled: bool) {
    if enabled {
        *slot = Some(Arc::clone(builtin));
    } else if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, builtin)) {
        *slot = None;
    }
}

impl InterceptorPipeline {
    /// Creates a pipeline with the default configuration applied
    pub fn new() -> Self {
        Self::with_config(AuditConfig::default())
    }

    pub fn with_config(config: AuditConfig) -> Self {
        Self::with_engine(Arc::new(PolicyEngine::new()), config)
    }

    /// Creates a pipeline around an existing policy engine
    pub fn with_engine(engine: Arc<PolicyEngine>, config: AuditConfig) -> Self {
        let pipeline = Self {
            engine,
            stats: AuditStats::new(),
            config: RwLock::new(config.clone()),
            builtins: BuiltinCallbacks::new(),
        };
        pipeline.apply_config(config);

        info!("Audit interceptor pipeline initialized");
        pipeline
    }

    /// The policy engine, for programmatic callbacks and throttle resets
    pub fn engine(&self) -> &Arc<PolicyEngine> {
        &self.engine
    }

    // ==================== Configuration ====================

    /// Load configuration from a JSON file.
    ///
    /// A missing file keeps the current configuration.
    pub fn load_config(&self, path: &Path) -> InterceptResult<()> {
        if !path.exists() {
            debug!("No audit config file at {:?}, using current settings", path);
            return Ok(());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| InterceptError::config(format!("Failed to read config: {}", e)))?;

        let config: AuditConfig = serde_json::from_str(&content)
            .map_err(|e| InterceptError::config(format!("Failed to parse config: {}", e)))?;

        self.apply_config(config);

        info!("Loaded audit configuration from {:?}", path);
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save_config(&self, path: &Path) -> InterceptResult<()> {
        let config = self.get_config();
        let content = serde_json::to_string_pretty(&config)
            .map_err(|e| InterceptError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| InterceptError::config(format!("Failed to write config: {}", e)))?;

        debug!("Saved audit configuration to {:?}", path);
        Ok(())
    }

    /// Apply configuration.
    ///
    /// Built-in callbacks follow the flags: enabling one replaces whatever
    /// the handler held, disabling one removes it only if it is still the
    /// built-in.
    pub fn apply_config(&self, config: AuditConfig) {
        self.engine.set_warn_condition(config.warn);
        self.engine.set_throw_condition(config.throw);
        self.engine
            .set_extractor(FieldExtractor::new().with_ignored_keys(config.ignored_keys.iter().cloned()));

        let builtins = &self.builtins;
        self.engine.update_field_check_handler(|handler| {
            toggle_builtin(&mut handler.notify, &builtins.log_field, config.log_violations);
            toggle_builtin(&mut handler.fail_message, &builtins.describe_field, config.fail_with_messages);
        });
        self.engine.update_index_check_handler(|handler| {
            toggle_builtin(&mut handler.notify, &builtins.log_index, config.log_violations);
            toggle_builtin(&mut handler.fail_message, &builtins.describe_index, config.fail_with_messages);
            handler.min_coverage = Some(config.min_coverage);
        });

        *self.config.write() = config;
    }

    /// Get current configuration
    pub fn get_config(&self) -> AuditConfig {
        self.config.read().clone()
    }

    /// Enable or disable auditing
    pub fn set_enabled(&self, enabled: bool) {
        self.config.write().enabled = enabled;
        info!("Query auditing {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn is_enabled(&self) -> bool {
        self.config.read().enabled
    }

    // ==================== Pre-execution ====================

    /// Audits a query before it runs.
    ///
    /// `Ok` lets the query proceed; an error must abort it and reach the
    /// caller unchanged.
    pub fn pre_execute<F: FilterExpr + ?Sized>(
        &self,
        hook: QueryHook,
        source: &dyn SchemaSource,
        filter: &F,
        options: &QueryOptions,
    ) -> AuditResult<()> {
        if !self.is_enabled() {
            return Ok(());
        }

        match self.engine.inspect(source, filter, options) {
            Ok(report) => {
                self.stats.record_report(&report);
                debug!(
                    mutation = hook.is_mutation(),
                    "Audited {} on '{}': field={:?} index={:?}",
                    hook.as_str(),
                    source.collection_name(),
                    report.field,
                    report.index
                );
                Ok(())
            }
            Err(err) => {
                self.stats.record_failure(&err);
                warn!(
                    mutation = hook.is_mutation(),
                    "Blocked {} on '{}': {}",
                    hook.as_str(),
                    source.collection_name(),
                    err
                );
                Err(err)
            }
        }
    }

    // ==================== Stats API ====================

    pub fn get_stats(&self) -> AuditStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn reset_stats(&self) {
        self.stats.reset();
    }

    /// Forget reported field combinations so they notify again
    pub fn clear_warned_queries(&self) {
        self.engine.clear_warned_field_queries();
        self.engine.clear_warned_index_queries();
    }
}

impl Default for InterceptorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn log_field_violation(record: &ViolationRecord) {
    warn!(
        collection = %record.collection_name,
        comment = ?record.comment,
        "Query references fields missing from the schema: {}",
        record.violating_fields.join(", ")
    );
}

fn log_index_violation(record: &ViolationRecord) {
    warn!(
        collection = %record.collection_name,
        comment = ?record.comment,
        "Query is not covered by any index: {}",
        record.violating_fields.join(", ")
    );
}

fn describe_field_violation(record: &ViolationRecord) -> String {
    format!(
        "Query on '{}' references fields not declared in the schema: {}",
        record.collection_name,
        record.violating_fields.join(", ")
    )
}

fn describe_index_violation(record: &ViolationRecord) -> String {
    format!(
        "Query on '{}' is not sufficiently covered by any index: {}",
        record.collection_name,
        record.violating_fields.join(", ")
    )
}
