//! Canonical parameter vocabulary and label resolution.
//!
//! Labels reaching the engine are decorated display strings
//! (`"Yield factor (xi)"`), possibly prefixed, suffixed, or replaced by an
//! internal alias (`"electricity_price"`). Resolution evaluates the alias
//! rules first, then the canonical labels in declaration order, and picks the
//! first canonical label contained in the raw label. Several labels share a
//! tag such as `(delta_ut)`, so declaration order is what breaks ties.

use ps_types::SensitivityError;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::updaters::{
    CapitalCostUpdater, CoefficientUpdater, HeatPriceUpdater, HeatingDemandUpdater,
    IndexedUpdater, UtilityDemandUpdater, UtilityPriceUpdater,
};

pub const ELECTRICITY_PRICE_LABEL: &str = "Electricity price (delta_ut)";
pub const ELECTRICITY_PRICE_ALIAS: &str = "electricity_price";

const CAPEX_GROUP: &[&str] = &["lin_CAPEX_x", "lin_CAPEX_y"];
const HEATING_DEMAND_GROUP: &[&str] = &["tau_h", "tau_c", "tau"];

/// Utilities priced through `delta_ut` and demanded through `tau`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Utility {
    Electricity,
    Chilling,
}

impl Utility {
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Electricity => "Electricity",
            Self::Chilling => "Chilling",
        }
    }
}

/// Temperature levels of the heat price table `delta_q`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeatLevel {
    Super,
    High,
    Medium,
    Low,
}

impl HeatLevel {
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Super => "super",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

/// Heat streams of the heating-demand tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeatStream {
    Heat1,
    Heat2,
}

impl HeatStream {
    pub fn index_name(&self) -> &'static str {
        match self {
            Self::Heat1 => "heat1",
            Self::Heat2 => "heat2",
        }
    }
}

/// Every coefficient family the engine knows how to vary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterKind {
    SplitFactor,
    FeedComposition,
    ConversionFactor,
    StoichiometricFactor,
    YieldFactor,
    MaterialCost,
    ProductPrice,
    UtilityPrice(Utility),
    HeatPrice(HeatLevel),
    HeatingDemand(HeatStream),
    UtilityDemand(Utility),
    ComponentConcentration,
    CapitalCostReference,
    OperatingMaintenance,
}

impl ParameterKind {
    /// Name of the model coefficient the family is primarily stored in.
    pub fn coefficient_tag(&self) -> &'static str {
        match self {
            Self::SplitFactor => "myu",
            Self::FeedComposition => "phi",
            Self::ConversionFactor => "theta",
            Self::StoichiometricFactor => "gamma",
            Self::YieldFactor => "xi",
            Self::MaterialCost => "materialcosts",
            Self::ProductPrice => "ProductPrice",
            Self::UtilityPrice(_) => "delta_ut",
            Self::HeatPrice(_) => "delta_q",
            Self::HeatingDemand(_) => "tau_h",
            Self::UtilityDemand(_) => "tau",
            Self::ComponentConcentration => "conc",
            Self::CapitalCostReference => "C_Ref",
            Self::OperatingMaintenance => "K_OM",
        }
    }

    /// Coefficients that must be made mutable together, for the families
    /// that map onto more than one coefficient.
    pub fn coordinated_group(&self) -> Option<&'static [&'static str]> {
        match self {
            Self::CapitalCostReference => Some(CAPEX_GROUP),
            Self::HeatingDemand(_) => Some(HEATING_DEMAND_GROUP),
            _ => None,
        }
    }

    /// The update routine responsible for this family.
    pub fn updater(&self) -> Box<dyn CoefficientUpdater> {
        use ps_types::MetadataField::*;

        match *self {
            Self::SplitFactor => Box::new(IndexedUpdater::new(
                "myu",
                &[UnitNumber, TargetUnit, Component],
            )),
            Self::FeedComposition => Box::new(IndexedUpdater::new("phi", &[UnitNumber, Component])),
            Self::ConversionFactor => Box::new(IndexedUpdater::new(
                "theta",
                &[UnitNumber, ReactionNumber, Component],
            )),
            Self::StoichiometricFactor => Box::new(IndexedUpdater::new(
                "gamma",
                &[UnitNumber, Component, ReactionNumber],
            )),
            Self::YieldFactor => Box::new(IndexedUpdater::new("xi", &[UnitNumber, Component])),
            Self::MaterialCost => Box::new(IndexedUpdater::new("materialcosts", &[UnitNumber])),
            Self::ProductPrice => Box::new(IndexedUpdater::new("ProductPrice", &[UnitNumber])),
            Self::UtilityPrice(utility) => Box::new(UtilityPriceUpdater { utility }),
            Self::HeatPrice(level) => Box::new(HeatPriceUpdater { level }),
            Self::HeatingDemand(stream) => Box::new(HeatingDemandUpdater { stream }),
            Self::UtilityDemand(utility) => Box::new(UtilityDemandUpdater { utility }),
            Self::ComponentConcentration => {
                Box::new(IndexedUpdater::new("conc", &[UnitNumber, Component]))
            }
            Self::CapitalCostReference => Box::new(CapitalCostUpdater),
            Self::OperatingMaintenance => Box::new(IndexedUpdater::new("K_OM", &[UnitNumber])),
        }
    }
}

/// The standard vocabulary, in resolution order.
///
/// Heating demand labels carry their heat stream number: "Heating demand 1
/// (tau_h)" and "Heating demand 2 (tau_h)". The bare "Heating demand (tau_h)"
/// names no stream and does not resolve.
pub const STANDARD_PARAMETERS: [(&str, ParameterKind); 20] = [
    // also varied in the stochastic mode
    ("Split factors (myu)", ParameterKind::SplitFactor),
    ("Feed Composition (phi)", ParameterKind::FeedComposition),
    ("Conversion factor (theta)", ParameterKind::ConversionFactor),
    ("Stoichiometric factor (gamma)", ParameterKind::StoichiometricFactor),
    ("Yield factor (xi)", ParameterKind::YieldFactor),
    ("Costs (materialcosts)", ParameterKind::MaterialCost),
    ("Price (ProductPrice)", ParameterKind::ProductPrice),
    (
        "Electricity price (delta_ut)",
        ParameterKind::UtilityPrice(Utility::Electricity),
    ),
    (
        "Chilling price (delta_ut)",
        ParameterKind::UtilityPrice(Utility::Chilling),
    ),
    (
        "Heating price super (delta_q)",
        ParameterKind::HeatPrice(HeatLevel::Super),
    ),
    (
        "Heating price high (delta_q)",
        ParameterKind::HeatPrice(HeatLevel::High),
    ),
    (
        "Heating price medium (delta_q)",
        ParameterKind::HeatPrice(HeatLevel::Medium),
    ),
    (
        "Heating price low (delta_q)",
        ParameterKind::HeatPrice(HeatLevel::Low),
    ),
    (
        "Heating demand 1 (tau_h)",
        ParameterKind::HeatingDemand(HeatStream::Heat1),
    ),
    (
        "Heating demand 2 (tau_h)",
        ParameterKind::HeatingDemand(HeatStream::Heat2),
    ),
    (
        "Electricity demand (tau)",
        ParameterKind::UtilityDemand(Utility::Electricity),
    ),
    (
        "Chilling demand (tau)",
        ParameterKind::UtilityDemand(Utility::Chilling),
    ),
    ("Component concentration (conc)", ParameterKind::ComponentConcentration),
    ("Reference Capital costs (C_Ref)", ParameterKind::CapitalCostReference),
    ("Operating and maintenance (K_OM)", ParameterKind::OperatingMaintenance),
];

/// A canonical label and the family it stands for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub label: String,
    pub kind: ParameterKind,
}

/// A raw-label pattern that short-circuits to a canonical label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasRule {
    pub pattern: String,
    pub canonical: String,
}

/// Outcome of resolving a raw label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedParameter<'a> {
    pub entry: &'a RegistryEntry,
    /// The alias rule that matched, if resolution went through one.
    pub alias: Option<&'a AliasRule>,
}

impl ResolvedParameter<'_> {
    pub fn label(&self) -> &str {
        &self.entry.label
    }

    pub fn kind(&self) -> ParameterKind {
        self.entry.kind
    }
}

/// Fixed, ordered table of canonical labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterRegistry {
    aliases: Vec<AliasRule>,
    entries: Vec<RegistryEntry>,
}

impl ParameterRegistry {
    /// A registry with no entries and no aliases.
    pub fn empty() -> Self {
        Self {
            aliases: Vec::new(),
            entries: Vec::new(),
        }
    }

    /// The standard vocabulary plus the `electricity_price` alias.
    pub fn standard() -> Self {
        let registry = STANDARD_PARAMETERS
            .iter()
            .fold(Self::empty(), |r, (label, kind)| r.with_entry(*label, *kind));
        registry.with_alias(ELECTRICITY_PRICE_ALIAS, ELECTRICITY_PRICE_LABEL)
    }

    /// Append a canonical label; it ranks after every existing entry.
    pub fn with_entry(mut self, label: impl Into<String>, kind: ParameterKind) -> Self {
        self.entries.push(RegistryEntry {
            label: label.into(),
            kind,
        });
        self
    }

    /// Append an alias rule; aliases are checked before canonical labels.
    pub fn with_alias(mut self, pattern: impl Into<String>, canonical: impl Into<String>) -> Self {
        self.aliases.push(AliasRule {
            pattern: pattern.into(),
            canonical: canonical.into(),
        });
        self
    }

    pub fn entries(&self) -> &[RegistryEntry] {
        &self.entries
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.label.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup of a canonical label.
    pub fn get(&self, canonical: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.label == canonical)
    }

    /// Resolve a raw label to its canonical entry.
    pub fn resolve(&self, raw: &str) -> Result<ResolvedParameter<'_>, SensitivityError> {
        let unknown = || SensitivityError::UnknownParameter {
            label: raw.to_string(),
        };

        if let Some(alias) = self.aliases.iter().find(|a| raw.contains(a.pattern.as_str())) {
            let entry = self.get(&alias.canonical).ok_or_else(unknown)?;
            debug!("Resolved {raw:?} to {:?} via alias {:?}", entry.label, alias.pattern);
            return Ok(ResolvedParameter {
                entry,
                alias: Some(alias),
            });
        }

        let entry = self
            .entries
            .iter()
            .find(|e| raw.contains(e.label.as_str()))
            .ok_or_else(unknown)?;
        debug!("Resolved {raw:?} to {:?}", entry.label);
        Ok(ResolvedParameter { entry, alias: None })
    }
}

impl Default for ParameterRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Text inside the first pair of parentheses, e.g. `"Yield factor (xi)"`
/// gives `"xi"`.
pub fn extract_tag(label: &str) -> Option<&str> {
    let open = label.find('(')?;
    let rest = &label[open + 1..];
    let close = rest.find(')')?;
    Some(&rest[..close])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_preserves_declaration_order() {
        let registry = ParameterRegistry::standard();
        let labels: Vec<&str> = registry.labels().collect();
        let expected: Vec<&str> = STANDARD_PARAMETERS.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, expected);
        assert_eq!(registry.len(), 20);
    }

    #[test]
    fn standard_tags_match_kinds() {
        for (label, kind) in STANDARD_PARAMETERS {
            assert_eq!(extract_tag(label), Some(kind.coefficient_tag()), "{label}");
        }
    }

    #[test]
    fn resolves_decorated_labels() {
        let registry = ParameterRegistry::standard();
        let resolved = registry.resolve("Yield factor (xi)_7").unwrap();
        assert_eq!(resolved.label(), "Yield factor (xi)");
        assert_eq!(resolved.kind(), ParameterKind::YieldFactor);
        assert!(resolved.alias.is_none());

        let resolved = registry.resolve("Heating price low (delta_q)_3").unwrap();
        assert_eq!(resolved.kind(), ParameterKind::HeatPrice(HeatLevel::Low));
    }

    #[test]
    fn alias_short_circuits_resolution() {
        let registry = ParameterRegistry::standard();
        let resolved = registry
            .resolve("electricity_price_sensitivity_run3")
            .unwrap();
        assert_eq!(resolved.label(), ELECTRICITY_PRICE_LABEL);
        assert!(resolved.alias.is_some());

        // an alias still wins when its raw label also contains a canonical label
        let resolved = registry
            .resolve("Chilling price (delta_ut) electricity_price")
            .unwrap();
        assert_eq!(resolved.label(), ELECTRICITY_PRICE_LABEL);
    }

    #[test]
    fn alias_wins_regardless_of_declaration_order() {
        let registry = ParameterRegistry::empty()
            .with_entry("Chilling price (delta_ut)", ParameterKind::UtilityPrice(Utility::Chilling))
            .with_entry(
                ELECTRICITY_PRICE_LABEL,
                ParameterKind::UtilityPrice(Utility::Electricity),
            )
            .with_alias(ELECTRICITY_PRICE_ALIAS, ELECTRICITY_PRICE_LABEL);
        let resolved = registry.resolve("electricity_price_sensitivity_run3").unwrap();
        assert_eq!(resolved.label(), ELECTRICITY_PRICE_LABEL);
    }

    #[test]
    fn earlier_declaration_wins_ties() {
        let registry = ParameterRegistry::empty()
            .with_entry("price", ParameterKind::ProductPrice)
            .with_entry("Heating price", ParameterKind::HeatPrice(HeatLevel::High));
        let resolved = registry.resolve("Heating price high").unwrap();
        assert_eq!(resolved.label(), "price");

        let swapped = ParameterRegistry::empty()
            .with_entry("Heating price", ParameterKind::HeatPrice(HeatLevel::High))
            .with_entry("price", ParameterKind::ProductPrice);
        assert_eq!(
            swapped.resolve("Heating price high").unwrap().label(),
            "Heating price"
        );
    }

    #[test]
    fn unknown_label_is_reported() {
        let registry = ParameterRegistry::standard();
        let err = registry.resolve("bogus_param").unwrap_err();
        assert_eq!(
            err,
            SensitivityError::UnknownParameter {
                label: "bogus_param".into()
            }
        );
        assert!(err.to_string().contains("bogus_param"));
    }

    #[test]
    fn alias_to_missing_canonical_is_unknown() {
        let registry = ParameterRegistry::empty().with_alias("electricity_price", "Nope (x)");
        assert!(matches!(
            registry.resolve("electricity_price"),
            Err(SensitivityError::UnknownParameter { .. })
        ));
    }

    #[test]
    fn coordinated_groups() {
        assert_eq!(
            ParameterKind::CapitalCostReference.coordinated_group(),
            Some(&["lin_CAPEX_x", "lin_CAPEX_y"][..])
        );
        assert_eq!(
            ParameterKind::HeatingDemand(HeatStream::Heat2)
                .coordinated_group()
                .map(<[&str]>::len),
            Some(3)
        );
        assert_eq!(ParameterKind::YieldFactor.coordinated_group(), None);
    }

    #[test]
    fn extract_tag_edge_cases() {
        assert_eq!(extract_tag("Costs (materialcosts)"), Some("materialcosts"));
        assert_eq!(extract_tag("a (b) (c)"), Some("b"));
        assert_eq!(extract_tag("no tag"), None);
        assert_eq!(extract_tag("open (only"), None);
    }
}
