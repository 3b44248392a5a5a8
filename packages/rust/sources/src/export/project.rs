//! Translation of raw export records into canonical recipes.

use std::str::FromStr;

use serde_json::Value;
use tracing::debug;

use brewsync_calc::units::{ebc_to_lovibond, round_to, yield_to_ppg};
use brewsync_shared::{
    Adjunct, AdjunctUnit, AdjunctUsage, BrewSyncError, Fermentable, FermentableUsage, Hop,
    HopForm, HopUsage, Recipe, Result, Step, Yeast, YeastUnit,
};

use super::ExportRecord;
use crate::annotations::{self, Annotations};
use crate::localtime::local_to_utc;
use crate::CanonicalRecord;

/// Exports carry recipes only, never brew sessions.
pub fn canonical(record: &ExportRecord) -> Result<CanonicalRecord> {
    Ok(CanonicalRecord {
        recipe: recipe(record)?,
        brew: None,
    })
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

fn text<'a>(node: &'a Value, key: &str) -> Option<&'a str> {
    node.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number(node: &Value, key: &str) -> Result<Option<f64>> {
    match text(node, key) {
        None => Ok(None),
        Some(raw) => raw
            .replace(',', ".")
            .parse::<f64>()
            .map(Some)
            .map_err(|_| BrewSyncError::parse(format!("{key} is not a number: '{raw}'"))),
    }
}

fn number_or_zero(node: &Value, key: &str) -> Result<f64> {
    Ok(number(node, key)?.unwrap_or(0.0))
}

/// Children named `item` of the container `list`, whether one or many.
fn children<'a>(node: &'a Value, list: &str, item: &str) -> Vec<&'a Value> {
    match node.get(list).and_then(|l| l.get(item)) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(one @ Value::Object(_)) => vec![one],
        _ => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Numeric enumerations
// ---------------------------------------------------------------------------

fn fermentable_usage(raw: &str) -> Result<FermentableUsage> {
    match raw {
        "0" => Ok(FermentableUsage::Mash),
        "1" => Ok(FermentableUsage::Steep),
        "2" => Ok(FermentableUsage::Extract),
        "3" => Ok(FermentableUsage::LateAddition),
        other => FermentableUsage::from_str(other).map_err(BrewSyncError::parse),
    }
}

fn hop_form(raw: &str) -> Result<HopForm> {
    match raw {
        "0" => Ok(HopForm::Pellet),
        "1" => Ok(HopForm::Leaf),
        "2" => Ok(HopForm::Plug),
        "3" => Ok(HopForm::Extract),
        other => HopForm::from_str(other).map_err(BrewSyncError::parse),
    }
}

fn hop_usage(raw: &str) -> Result<HopUsage> {
    match raw {
        "0" => Ok(HopUsage::Mash),
        "1" => Ok(HopUsage::FirstWort),
        "2" => Ok(HopUsage::Boil),
        "3" => Ok(HopUsage::HOPSTAND),
        "4" => Ok(HopUsage::DryHop),
        other => HopUsage::from_str(other).map_err(BrewSyncError::parse),
    }
}

fn misc_usage(raw: &str) -> Result<AdjunctUsage> {
    match raw {
        "0" => Ok(AdjunctUsage::Mash),
        "1" => Ok(AdjunctUsage::Sparge),
        "2" => Ok(AdjunctUsage::Boil),
        "3" => Ok(AdjunctUsage::Flameout),
        "4" => Ok(AdjunctUsage::Primary),
        "5" => Ok(AdjunctUsage::Secondary),
        "6" => Ok(AdjunctUsage::Bottle),
        other => AdjunctUsage::from_str(other).map_err(BrewSyncError::parse),
    }
}

fn required<'a>(node: &'a Value, key: &str, what: &str) -> Result<&'a str> {
    text(node, key).ok_or_else(|| BrewSyncError::parse(format!("{what} without {key}")))
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// Translate one export record. Unknown enumeration codes fail the record.
pub fn recipe(record: &ExportRecord) -> Result<Recipe> {
    let raw = &record.raw;
    let name = required(raw, "NAME", "recipe")?;
    let notes_raw = text(raw, "NOTES").unwrap_or_default();
    let tags = Annotations::parse(notes_raw);
    let notes = annotations::strip(notes_raw);

    let mut recipe = Recipe::named(name);
    recipe.description = notes
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    recipe.notes = Some(notes.trim_end().to_string()).filter(|n| !n.is_empty());
    recipe.bjcp_style_id = tags.text("BJCP-Style");
    recipe.is_public = Some(tags.flag("Public"));
    recipe.image_url = tags.text("Image");

    recipe.batch_size = number_or_zero(raw, "BATCH_SIZE")?;
    recipe.boil_size = number(raw, "BOIL_SIZE")?;
    recipe.boil_time = number_or_zero(raw, "BOIL_TIME")?;
    recipe.efficiency = number(raw, "EFFICIENCY")?.map(|e| round_to(e / 100.0, 2));
    recipe.losses = match raw.get("EQUIPMENT") {
        Some(equipment) => number(equipment, "LOSSES")?,
        None => None,
    };
    recipe.created_at = text(raw, "CREATED").and_then(local_to_utc);
    recipe.updated_at = text(raw, "UPDATED").and_then(local_to_utc);

    recipe.fermentables = children(raw, "FERMENTABLES", "FERMENTABLE")
        .into_iter()
        .map(fermentable)
        .collect::<Result<_>>()?;
    recipe.hops = children(raw, "HOPS", "HOP")
        .into_iter()
        .map(hop)
        .collect::<Result<_>>()?;
    recipe.yeasts = children(raw, "YEASTS", "YEAST")
        .into_iter()
        .map(yeast)
        .collect::<Result<_>>()?;
    recipe.adjuncts = children(raw, "MISCS", "MISC")
        .into_iter()
        .map(misc)
        .collect::<Result<_>>()?;
    recipe.mash_steps = steps(children(raw, "MASH", "STEP"))?;
    recipe.fermentation_steps = steps(children(raw, "FERMENTATION", "STEP"))?;
    if recipe.fermentation_steps.is_empty() {
        recipe.fermentation_steps = tags.fermentation_steps();
    }

    debug!(recipe = %recipe.name, "translated export recipe");
    Ok(recipe)
}

fn fermentable(node: &Value) -> Result<Fermentable> {
    Ok(Fermentable {
        name: required(node, "NAME", "fermentable")?.to_string(),
        ppg: round_to(yield_to_ppg(number_or_zero(node, "YIELD")?), 1),
        lovibond: ebc_to_lovibond(number_or_zero(node, "COLOR")?),
        usage: fermentable_usage(text(node, "USAGE").unwrap_or("0"))?,
        fermentable_id: None,
        amount: number_or_zero(node, "AMOUNT")?,
    })
}

fn hop(node: &Value) -> Result<Hop> {
    Ok(Hop {
        name: required(node, "NAME", "hop")?.to_string(),
        aa: number_or_zero(node, "ALPHA")?,
        form: hop_form(text(node, "FORM").unwrap_or("0"))?,
        usage: hop_usage(text(node, "USAGE").unwrap_or("2"))?,
        time: number_or_zero(node, "TIME")?,
        amount: number_or_zero(node, "AMOUNT")?,
        ibu: None,
    })
}

fn yeast(node: &Value) -> Result<Yeast> {
    let unit = match text(node, "UNIT") {
        None => YeastUnit::Packets,
        Some(raw) => YeastUnit::from_str(&raw.to_lowercase()).unwrap_or_else(|e| {
            debug!(error = %e, "treating yeast amount as packets");
            YeastUnit::Packets
        }),
    };
    Ok(Yeast {
        name: required(node, "NAME", "yeast")?.to_string(),
        attenuation: number(node, "ATTENUATION")?.map(|a| a / 100.0),
        amount: number_or_zero(node, "AMOUNT")?,
        unit,
    })
}

fn misc(node: &Value) -> Result<Adjunct> {
    let unit = match text(node, "UNIT") {
        None => AdjunctUnit::Each,
        Some(raw) => AdjunctUnit::from_str(raw).unwrap_or_else(|e| {
            debug!(error = %e, "treating adjunct amount as items");
            AdjunctUnit::Each
        }),
    };
    Ok(Adjunct {
        name: required(node, "NAME", "misc")?.to_string(),
        usage: misc_usage(text(node, "USAGE").unwrap_or("2"))?,
        amount: number_or_zero(node, "AMOUNT")?,
        unit,
        time: number(node, "TIME")?,
    })
}

fn steps(nodes: Vec<&Value>) -> Result<Vec<Step>> {
    nodes
        .into_iter()
        .enumerate()
        .map(|(i, node)| {
            Ok(Step {
                order: i as u32,
                name: text(node, "NAME").unwrap_or_default().to_string(),
                temperature: number_or_zero(node, "TEMP")?,
                time: number_or_zero(node, "TIME")?,
            })
        })
        .collect()
}
