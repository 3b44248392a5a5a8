//! The canonical recipe record.
//!
//! Field names follow the remote service's JSON so a [`Recipe`] can be sent
//! as-is in a create or update request. Keys this model does not know are kept
//! in [`Recipe::extra`] and written back unchanged.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    Adjunct, DEFAULT_SOURCE, Fermentable, Hop, RecipeType, Step, UnitType, Yeast,
};
use crate::wire;

/// A named formulation, as held by any of the three recipe stores.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    /// Remote-assigned id; `None` until the recipe is bound to the service.
    #[serde(
        default,
        deserialize_with = "wire::opt_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<u64>,

    /// Identity across sources (case-sensitive, verbatim).
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    /// Liters into the fermenter, excluding losses.
    #[serde(default, deserialize_with = "wire::number")]
    pub batch_size: f64,

    #[serde(
        default,
        deserialize_with = "wire::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub boil_size: Option<f64>,

    /// Minutes.
    #[serde(default, deserialize_with = "wire::number")]
    pub boil_time: f64,

    /// Mash efficiency as a fraction.
    #[serde(
        default,
        deserialize_with = "wire::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub efficiency: Option<f64>,

    /// Kettle and transfer losses in liters.
    #[serde(
        default,
        deserialize_with = "wire::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub losses: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_type_id: Option<UnitType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipe_type_id: Option<RecipeType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Always serialized, `null` for recipes that are not forks.
    #[serde(default, deserialize_with = "wire::opt_id")]
    pub parent_recipe_id: Option<u64>,

    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub og: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub fg: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub abv: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub srm: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub ibu: Option<f64>,
    /// Bitterness-to-gravity ratio.
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub bggu: Option<f64>,
    #[serde(default, deserialize_with = "wire::opt_number", skip_serializing_if = "Option::is_none")]
    pub calories: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bjcp_style_id: Option<String>,

    #[serde(default, deserialize_with = "wire::opt_flag", skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,

    #[serde(default, deserialize_with = "wire::opt_flag", skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(default, with = "wire::timestamp", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default, with = "wire::timestamp", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub fermentables: Vec<Fermentable>,
    #[serde(default)]
    pub hops: Vec<Hop>,
    #[serde(default)]
    pub yeasts: Vec<Yeast>,
    #[serde(default)]
    pub adjuncts: Vec<Adjunct>,
    #[serde(default)]
    pub mash_steps: Vec<Step>,
    #[serde(default)]
    pub fermentation_steps: Vec<Step>,

    /// Remote keys this model does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Recipe {
    /// Create an empty recipe with the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Fill the fields the remote service requires when they are absent.
    pub fn tidy(&mut self) {
        self.unit_type_id.get_or_insert(UnitType::Metric);
        self.recipe_type_id.get_or_insert(RecipeType::AllGrain);
        if self.source.is_none() {
            self.source = Some(DEFAULT_SOURCE.to_string());
        }
    }

    /// Whether the recipe has a server-side representation.
    pub fn is_bound(&self) -> bool {
        self.id.is_some()
    }

    /// Bind this recipe to a remote id so the next save is an update.
    pub fn bind(&mut self, id: u64) {
        self.id = Some(id);
    }

    /// Serialize into the JSON object sent to the remote service.
    pub fn to_payload(&self) -> serde_json::Value {
        let mut tidy = self.clone();
        tidy.tidy();
        serde_json::to_value(&tidy).unwrap_or(serde_json::Value::Null)
    }

    /// Parse a remote JSON object.
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| crate::BrewSyncError::parse(format!("invalid recipe payload: {e}")))
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_bound() { "registered" } else { "unregistered" };
        write!(f, "<{state} Recipe")?;
        if let Some(id) = self.id {
            write!(f, " id {id}")?;
        }
        write!(f, " named \"{}\">", self.name)
    }
}
