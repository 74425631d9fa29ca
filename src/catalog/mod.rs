//! Industry template catalog.
//!
//! Templates are loaded once, validated, and shared as `Arc<IndustryTemplate>`;
//! downstream stages borrow them and never mutate them.

pub mod builtin;
/// Deduplicating async fetch layer in front of a template store.
pub mod loader;
pub mod template;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;

use crate::config::ConfigError;
use crate::error::{EngineError, EngineResult};

pub use template::IndustryTemplate;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CatalogFile {
    #[serde(default)]
    templates: Vec<IndustryTemplate>,
}

/// Immutable set of industry templates keyed by `industry[/subtype]`.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    templates: BTreeMap<String, Arc<IndustryTemplate>>,
}

impl Catalog {
    /// Builds a catalog. Later templates with the same key are reported by
    /// [`Catalog::from_templates`]; here they replace earlier ones.
    pub fn new(templates: impl IntoIterator<Item = IndustryTemplate>) -> Self {
        let templates = templates
            .into_iter()
            .map(|t| (t.key(), Arc::new(t)))
            .collect();
        Self { templates }
    }

    /// Builds a catalog, rejecting duplicate keys.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` naming the first duplicated key.
    pub fn from_templates(templates: Vec<IndustryTemplate>) -> Result<Self, ConfigError> {
        let mut seen = BTreeMap::new();
        for t in &templates {
            if let Some(prev) = seen.insert(t.key(), t.template_id.clone()) {
                return Err(ConfigError {
                    field: format!("templates[{}]", t.template_id),
                    message: format!(
                        "duplicate catalog key \"{}\" (also used by {prev})",
                        t.key()
                    ),
                });
            }
        }
        Ok(Self::new(templates))
    }

    /// The templates shipped with the engine.
    pub fn builtin() -> Self {
        Self::new(builtin::templates())
    }

    /// Parses a catalog from a TOML file with a `[[templates]]` array.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the file cannot be read or is invalid.
    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError {
            field: "catalog".to_string(),
            message: format!("cannot read \"{}\": {e}", path.display()),
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses a catalog from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if the TOML is invalid or keys collide.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let file: CatalogFile = toml::from_str(s).map_err(|e| ConfigError {
            field: "toml".to_string(),
            message: e.to_string(),
        })?;
        Self::from_templates(file.templates)
    }

    /// Validates every template.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors: Vec<ConfigError> =
            self.templates.values().flat_map(|t| t.validate()).collect();
        if self.templates.is_empty() {
            errors.push(ConfigError {
                field: "templates".into(),
                message: "catalog must contain at least one template".into(),
            });
        }
        errors
    }

    /// Finds the template for an industry and optional subtype.
    ///
    /// # Errors
    ///
    /// `UnknownIndustry` when no template mentions the industry at all,
    /// `TemplateNotFound` when the industry exists but not the subtype.
    pub fn lookup(
        &self,
        industry: &str,
        subtype: Option<&str>,
    ) -> EngineResult<Arc<IndustryTemplate>> {
        let key = match subtype {
            Some(s) => format!("{industry}/{s}"),
            None => industry.to_string(),
        };
        if let Some(t) = self.templates.get(&key) {
            return Ok(Arc::clone(t));
        }
        if self.templates.values().any(|t| t.industry == industry) {
            Err(EngineError::TemplateNotFound {
                industry: industry.to_string(),
                subtype: subtype.map(str::to_string),
            })
        } else {
            Err(EngineError::UnknownIndustry(industry.to_string()))
        }
    }

    pub fn templates(&self) -> impl Iterator<Item = &Arc<IndustryTemplate>> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        let errors = catalog.validate();
        assert!(errors.is_empty(), "builtin catalog should be valid: {errors:?}");
        assert_eq!(catalog.len(), 7);
    }

    #[test]
    fn lookup_by_industry_and_subtype() {
        let catalog = Catalog::builtin();
        let hotel = catalog.lookup("hotel", None).expect("hotel exists");
        assert_eq!(hotel.template_id, "hotel.full_service");
        let limited = catalog
            .lookup("hotel", Some("limited_service"))
            .expect("subtype exists");
        assert_eq!(limited.template_id, "hotel.limited_service");
    }

    #[test]
    fn lookup_distinguishes_unknown_industry_from_missing_subtype() {
        let catalog = Catalog::builtin();
        assert_eq!(
            catalog.lookup("bakery", None).err(),
            Some(EngineError::UnknownIndustry("bakery".into()))
        );
        assert!(matches!(
            catalog.lookup("hotel", Some("boutique")),
            Err(EngineError::TemplateNotFound { .. })
        ));
    }

    #[test]
    fn lookup_shares_the_same_template() {
        let catalog = Catalog::builtin();
        let a = catalog.lookup("office", None).expect("office exists");
        let b = catalog.lookup("office", None).expect("office exists");
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn toml_catalog_rejects_duplicate_keys() {
        let one = r#"
template_id = "x.{n}"
template_version = "1"
industry = "x"
use_case = "x"
load_factor = 0.5
roof_usable_factor = 0.5
carport_usable_factor = 0.5
solar_density_kw_per_sqft = 0.015
bess_duration_hours = 2.0
power_basis = { kind = "density", watts_per_sqft = 10.0 }
tier_multipliers = { starter = 0.7, perfect_fit = 1.0, beast_mode = 1.25 }
"#;
        let toml = format!(
            "[[templates]]\n{}\n[[templates]]\n{}",
            one.replace("{n}", "a"),
            one.replace("{n}", "b")
        );
        let err = Catalog::from_toml_str(&toml).expect_err("duplicate key");
        assert!(err.message.contains("duplicate catalog key"));
    }

    #[test]
    fn toml_catalog_loads_templates() {
        let toml = r#"
[[templates]]
template_id = "bakery.retail"
template_version = "2025.1"
industry = "bakery"
use_case = "retail_bakery"
load_factor = 0.4
roof_usable_factor = 0.6
carport_usable_factor = 0.9
solar_density_kw_per_sqft = 0.015
bess_duration_hours = { starter = 1.0, perfect_fit = 2.0, beast_mode = 2.0 }
power_basis = { kind = "per_unit", field = "square_feet", watts_per_unit = 20.0 }
tier_multipliers = { starter = 0.7, perfect_fit = 1.0, beast_mode = 1.25 }
"#;
        let catalog = Catalog::from_toml_str(toml).expect("valid catalog");
        assert!(catalog.validate().is_empty());
        assert!(catalog.lookup("bakery", None).is_ok());
    }
}
