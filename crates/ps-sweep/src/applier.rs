//! Applying a sampled value to a live model instance.

use ps_types::{ModelInstance, ParameterMetadata, SensitivityError};
use serde_json::Value;
use tracing::debug;

use crate::mutability::MutabilityPreparer;
use crate::registry::{ParameterRegistry, ResolvedParameter};

/// Entry point for parameter changes: resolve, look up, update.
#[derive(Debug, Clone, Default)]
pub struct ParameterApplier {
    registry: ParameterRegistry,
}

impl ParameterApplier {
    pub fn new(registry: ParameterRegistry) -> Self {
        Self { registry }
    }

    /// An applier over the standard vocabulary.
    pub fn standard() -> Self {
        Self::new(ParameterRegistry::standard())
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    pub fn resolve(&self, label: &str) -> Result<ResolvedParameter<'_>, SensitivityError> {
        self.registry.resolve(label)
    }

    /// Flag the coefficients behind `labels` mutable. Call once per sweep,
    /// before the first `apply`.
    pub fn prepare<'a, I>(
        &self,
        instance: &mut ModelInstance,
        labels: I,
    ) -> Result<Vec<String>, SensitivityError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let flagged = MutabilityPreparer::new(&self.registry).prepare(instance, labels)?;
        Ok(flagged.into_iter().map(str::to_string).collect())
    }

    /// Set the parameter named by `label` to `value` on `instance`.
    ///
    /// Mutation happens in place and the same instance is handed back. On any
    /// error the instance is left exactly as it was.
    pub fn apply<'m>(
        &self,
        instance: &'m mut ModelInstance,
        label: &str,
        value: f64,
        metadata: Option<&ParameterMetadata>,
        context: Option<&Value>,
    ) -> Result<&'m mut ModelInstance, SensitivityError> {
        let resolved = self.registry.resolve(label)?;
        if !value.is_finite() {
            return Err(SensitivityError::InvalidValue {
                label: label.to_string(),
                value,
            });
        }

        let empty = ParameterMetadata::default();
        let metadata = metadata.unwrap_or(&empty);
        let updater = resolved.kind().updater();
        let writes = updater.plan(instance, value, metadata, context, resolved.label())?;
        instance.commit(&writes)?;

        debug!(
            "Changed parameter {} ({}) to {} via {} write(s)",
            label,
            updater.family(),
            value,
            writes.len()
        );
        Ok(instance)
    }
}
