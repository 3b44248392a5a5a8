//! Ingredient, step, and enumeration types shared by every recipe source.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::wire;

/// Attribution written into recipes created by this tool.
pub const DEFAULT_SOURCE: &str = "brewsync recipe synchronizer";

// ---------------------------------------------------------------------------
// Numeric wire enumerations
// ---------------------------------------------------------------------------

/// Declares an enumeration that travels as a numeric id on the wire.
///
/// Ids arrive as numbers or numeric strings. Ids without a named variant are
/// kept in `Other` and written back unchanged.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $id:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
        #[serde(into = "u16")]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// An id without a named variant.
            Other(u16),
        }

        impl $name {
            /// Numeric id used by the remote service.
            pub fn id(self) -> u16 {
                match self {
                    $(Self::$variant => $id,)+
                    Self::Other(id) => id,
                }
            }
        }

        impl From<u16> for $name {
            fn from(id: u16) -> Self {
                match id {
                    $($id => Self::$variant,)+
                    other => Self::Other(other),
                }
            }
        }

        impl From<$name> for u16 {
            fn from(value: $name) -> u16 {
                value.id()
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                $crate::wire::enum_id(deserializer).map(Self::from)
            }
        }
    };
}

pub(crate) use wire_enum;

wire_enum! {
    /// Measurement system of a recipe. Recipes are only written in metric.
    UnitType { Metric = 10, Imperial = 20 }
}

wire_enum! {
    /// Brewing method of a recipe.
    RecipeType { AllGrain = 10 }
}

wire_enum! {
    /// When a fermentable enters the process.
    FermentableUsage {
        Mash = 10,
        Extract = 20,
        Steep = 30,
        LateAddition = 40,
    }
}

wire_enum! {
    /// Physical form of a hop.
    HopForm {
        Leaf = 10,
        Pellet = 20,
        Plug = 30,
        Extract = 40,
    }
}

wire_enum! {
    /// When a hop is added. Hopstand and aroma additions share one id.
    HopUsage {
        Mash = 10,
        FirstWort = 15,
        Boil = 20,
        Aroma = 30,
        DryHop = 40,
    }
}

wire_enum! {
    /// When an adjunct (misc ingredient) is added.
    AdjunctUsage {
        Mash = 10,
        Sparge = 15,
        Boil = 20,
        Flameout = 25,
        Primary = 30,
        Secondary = 40,
        Bottle = 50,
    }
}

impl HopUsage {
    /// Hopstand is the same canonical usage as aroma.
    pub const HOPSTAND: HopUsage = HopUsage::Aroma;
}

impl FromStr for HopUsage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "mash" => Ok(Self::Mash),
            "firstwort" | "fwh" => Ok(Self::FirstWort),
            "boil" => Ok(Self::Boil),
            "aroma" | "hopstand" | "whirlpool" => Ok(Self::Aroma),
            "dryhop" => Ok(Self::DryHop),
            _ => Err(format!("unknown hop usage '{s}'")),
        }
    }
}

impl FromStr for HopForm {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "leaf" | "whole" => Ok(Self::Leaf),
            "pellet" | "pellets" => Ok(Self::Pellet),
            "plug" => Ok(Self::Plug),
            "extract" => Ok(Self::Extract),
            _ => Err(format!("unknown hop form '{s}'")),
        }
    }
}

impl FromStr for FermentableUsage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "mash" => Ok(Self::Mash),
            "extract" | "boil" => Ok(Self::Extract),
            "steep" => Ok(Self::Steep),
            "lateaddition" | "late" => Ok(Self::LateAddition),
            _ => Err(format!("unknown fermentable usage '{s}'")),
        }
    }
}

impl FromStr for AdjunctUsage {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_name(s).as_str() {
            "mash" => Ok(Self::Mash),
            "sparge" => Ok(Self::Sparge),
            "boil" => Ok(Self::Boil),
            "flameout" => Ok(Self::Flameout),
            "primary" => Ok(Self::Primary),
            "secondary" => Ok(Self::Secondary),
            "bottle" | "bottling" => Ok(Self::Bottle),
            _ => Err(format!("unknown adjunct usage '{s}'")),
        }
    }
}

/// Lower-case and drop separators so `Dry Hop`, `dry-hop` and `DRYHOP` compare equal.
fn normalize_name(s: &str) -> String {
    s.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Packaging unit of a yeast addition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YeastUnit {
    Packets,
    Vials,
    G,
    Ml,
}

impl FromStr for YeastUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "packets" => Ok(Self::Packets),
            "vials" => Ok(Self::Vials),
            "g" => Ok(Self::G),
            "ml" => Ok(Self::Ml),
            other => Err(format!("unknown yeast unit '{other}'")),
        }
    }
}

/// Unit of an adjunct amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdjunctUnit {
    Each,
    Kg,
    G,
    L,
    Ml,
    Tbsp,
    Tsp,
}

impl FromStr for AdjunctUnit {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "each" | "" => Ok(Self::Each),
            "kg" => Ok(Self::Kg),
            "g" => Ok(Self::G),
            "l" => Ok(Self::L),
            "ml" => Ok(Self::Ml),
            "tbsp" => Ok(Self::Tbsp),
            "tsp" => Ok(Self::Tsp),
            other => Err(format!("unknown adjunct unit '{other}'")),
        }
    }
}

// ---------------------------------------------------------------------------
// Ingredients and steps
// ---------------------------------------------------------------------------

/// A grain, sugar, or extract contributing gravity and color.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fermentable {
    pub name: String,
    /// Gravity points per pound per gallon.
    #[serde(default, deserialize_with = "wire::number")]
    pub ppg: f64,
    /// Color in degrees Lovibond.
    #[serde(default, deserialize_with = "wire::number")]
    pub lovibond: f64,
    #[serde(rename = "fermentable_usage_type_id")]
    pub usage: FermentableUsage,
    /// Remote ingredient-database reference (always sent, usually null).
    #[serde(default, deserialize_with = "wire::opt_id")]
    pub fermentable_id: Option<u64>,
    /// Mass in kilograms.
    #[serde(default, deserialize_with = "wire::number")]
    pub amount: f64,
}

/// A hop addition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hop {
    pub name: String,
    /// Alpha acid in percent.
    #[serde(default, deserialize_with = "wire::number")]
    pub aa: f64,
    #[serde(rename = "hop_type_id")]
    pub form: HopForm,
    #[serde(rename = "hop_usage_type_id")]
    pub usage: HopUsage,
    /// Minutes, or days for dry hops.
    #[serde(default, deserialize_with = "wire::number")]
    pub time: f64,
    /// Mass in grams.
    #[serde(default, deserialize_with = "wire::number")]
    pub amount: f64,
    /// Bitterness contributed by this addition, when known.
    #[serde(
        default,
        deserialize_with = "wire::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub ibu: Option<f64>,
}

/// A yeast pitch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Yeast {
    pub name: String,
    /// Apparent attenuation as a fraction (0..1).
    #[serde(
        default,
        deserialize_with = "wire::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub attenuation: Option<f64>,
    #[serde(default, deserialize_with = "wire::number")]
    pub amount: f64,
    pub unit: YeastUnit,
}

/// Any other addition: salts, finings, spices, fruit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjunct {
    pub name: String,
    #[serde(rename = "adjunct_usage_type_id")]
    pub usage: AdjunctUsage,
    #[serde(default, deserialize_with = "wire::number")]
    pub amount: f64,
    pub unit: AdjunctUnit,
    #[serde(
        default,
        deserialize_with = "wire::opt_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub time: Option<f64>,
}

/// One rest of a mash schedule, or one stage of a fermentation schedule.
///
/// Mash steps count `time` in minutes, fermentation steps in days.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub order: u32,
    pub name: String,
    /// Degrees Celsius.
    #[serde(default, deserialize_with = "wire::number")]
    pub temperature: f64,
    #[serde(default, deserialize_with = "wire::number")]
    pub time: f64,
}
