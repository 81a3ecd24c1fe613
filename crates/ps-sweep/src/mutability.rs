//! Granting write access to the coefficients a sweep will touch.

use ps_types::{ModelInstance, SensitivityError};
use tracing::info;

use crate::registry::{extract_tag, ParameterRegistry, ResolvedParameter};

/// Flags model coefficients mutable ahead of a sweep.
#[derive(Debug, Clone, Copy)]
pub struct MutabilityPreparer<'r> {
    registry: &'r ParameterRegistry,
}

impl<'r> MutabilityPreparer<'r> {
    pub fn new(registry: &'r ParameterRegistry) -> Self {
        Self { registry }
    }

    /// Coefficients owned by a resolved parameter.
    ///
    /// Coordinated families return their whole group, the alias route returns
    /// the family's internal coefficient name, and everything else returns the
    /// tag inside the canonical label's parentheses.
    pub fn coefficients_for<'a>(resolved: &ResolvedParameter<'a>) -> Vec<&'a str> {
        let kind = resolved.kind();
        if let Some(group) = kind.coordinated_group() {
            return group.to_vec();
        }
        if resolved.alias.is_some() {
            return vec![kind.coefficient_tag()];
        }
        vec![extract_tag(&resolved.entry.label).unwrap_or(kind.coefficient_tag())]
    }

    /// Coefficient names to flag for a batch of raw labels, deduplicated in
    /// first-seen order.
    pub fn plan<'a, I>(&self, labels: I) -> Result<Vec<&'r str>, SensitivityError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut names: Vec<&'r str> = Vec::new();
        for label in labels {
            let resolved = self.registry.resolve(label)?;
            for name in Self::coefficients_for(&resolved) {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Flag every coefficient the labels will vary.
    ///
    /// Fails without flagging anything if a label is unknown or the model
    /// lacks one of the coefficients. Returns the flagged names.
    pub fn prepare<'a, I>(
        &self,
        model: &mut ModelInstance,
        labels: I,
    ) -> Result<Vec<&'r str>, SensitivityError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names = self.plan(labels)?;
        model.set_mutable(names.iter().copied())?;
        info!(
            "Flagged {} coefficient(s) mutable on model {:?}: {:?}",
            names.len(),
            model.name,
            names
        );
        Ok(names)
    }
}
