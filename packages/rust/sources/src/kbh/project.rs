//! Projection of raw brewing-log rows onto the canonical model.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use brewsync_calc::session::{self, DEFAULT_KETTLE_LOSSES};
use brewsync_calc::units::{co2_grams_to_volumes, ebc_to_lovibond, plato_to_gravity, round_to, yield_to_ppg};
use brewsync_shared::{
    Adjunct, AdjunctUnit, AdjunctUsage, Brew, BrewStatus, Fermentable, FermentableUsage,
    GravityReading, Hop, HopForm, HopUsage, Recipe, Step, Yeast, YeastUnit,
};

use super::{Addition, LogRecord, YeastStock};
use crate::annotations::{self, Annotations};
use crate::localtime::local_to_utc;
use crate::CanonicalRecord;

/// Extract potential assumed for every malt, the log does not store one.
const MALT_PPG: f64 = 35.0;

/// Minutes per day, for additions that stay in the fermenter.
const MINUTES_PER_DAY: f64 = 1440.0;

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+(?:[.,][0-9]+)?)\s*(.*)$").expect("valid number regex"));

/// Recipe and (when brewed) brew session of one batch.
pub fn canonical(record: &LogRecord) -> CanonicalRecord {
    let recipe = recipe(record);
    let brew = brew(record, &recipe);
    CanonicalRecord { recipe, brew }
}

// ---------------------------------------------------------------------------
// Recipe
// ---------------------------------------------------------------------------

/// Project a batch onto a canonical recipe. Derived metrics the log lacks
/// are left empty for the calculator.
pub fn recipe(record: &LogRecord) -> Recipe {
    let batch = &record.batch;
    let tags = Annotations::parse(&batch.notes);
    let notes = annotations::strip(&batch.notes);
    let final_plato = record.readings.last().map_or(0.0, |r| r.plato);

    let mut recipe = Recipe::named(batch.name.clone());
    recipe.description = notes
        .lines()
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string);
    recipe.notes = Some(notes.trim_end().to_string()).filter(|n| !n.is_empty());

    recipe.batch_size = batch.pitch_volume;
    recipe.boil_size = positive(batch.boil_end_volume);
    recipe.boil_time = batch.boil_time;
    recipe.efficiency = positive(batch.brewhouse_yield).map(|y| round_to(y / 100.0, 2));
    if batch.bottled_volume > 0.0 && batch.pre_strain_volume > 0.0 {
        recipe.losses = positive(round_to(batch.pre_strain_volume - batch.bottled_volume, 1));
    }

    recipe.og = Some(plato_to_gravity(batch.og_plato));
    recipe.fg = Some(plato_to_gravity(final_plato));
    recipe.abv = positive(batch.abv);
    recipe.ibu = positive(batch.ibu);
    recipe.srm = Some((batch.color_ebc * 0.508).round());
    recipe.calories = positive(calories(batch.og_plato, final_plato));

    recipe.created_at = local_to_utc(&batch.created);
    recipe.updated_at = local_to_utc(&batch.saved);

    recipe.bjcp_style_id = tags.text("BJCP-Style");
    recipe.is_public = Some(tags.flag("Public"));
    recipe.image_url = tags.text("Image");
    recipe.is_active = Some(true);

    recipe.fermentables = fermentables(record);
    recipe.hops = hops(record);
    recipe.yeasts = yeast(record).into_iter().collect();
    recipe.adjuncts = adjuncts(record);
    recipe.mash_steps = record
        .rests
        .iter()
        .enumerate()
        .map(|(i, rest)| Step {
            order: i as u32,
            name: rest.name.clone(),
            temperature: rest.temperature,
            time: rest.minutes,
        })
        .collect();
    recipe.fermentation_steps = tags.fermentation_steps();
    recipe
}

fn positive(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

/// Energy content from original and real extract, the way the log computes it.
fn calories(og_plato: f64, real_extract: f64) -> f64 {
    let wfg = 0.1808 * og_plato + 0.1892 * real_extract;
    let density = 261.1 / (261.53 - real_extract);
    let abw = (og_plato - wfg) / (2.0665 - 0.010665 * og_plato);
    let kcal = ((6.9 * abw + 4.0 * (wfg - 0.1)) * density).round();
    (kcal * 3.55).round()
}

fn hop_form(pellets: bool) -> HopForm {
    // The log does not tell leaf from plug.
    if pellets { HopForm::Pellet } else { HopForm::Plug }
}

/// Addition time: days once it reaches a full day, minutes below that.
fn addition_time(minutes: f64) -> f64 {
    if minutes >= MINUTES_PER_DAY {
        (minutes / MINUTES_PER_DAY).round()
    } else {
        minutes
    }
}

fn fermentables(record: &LogRecord) -> Vec<Fermentable> {
    let malts = record.malts.iter().map(|malt| Fermentable {
        name: malt.name.clone(),
        ppg: MALT_PPG,
        lovibond: ebc_to_lovibond(malt.ebc),
        usage: FermentableUsage::Mash,
        fermentable_id: None,
        amount: round_to(malt.kg, 3),
    });

    let others = record
        .additions
        .iter()
        .filter(|a| a.is_fermentable())
        .filter_map(|addition| {
            let usage = match addition.stage {
                2 => FermentableUsage::Mash,
                1 => FermentableUsage::Extract,
                0 => FermentableUsage::LateAddition,
                other => {
                    debug!(name = %addition.name, stage = other, "skipping addition with unknown stage");
                    return None;
                }
            };
            Some(Fermentable {
                name: addition.name.clone(),
                ppg: round_to(yield_to_ppg(addition.yield_percent), 1),
                lovibond: ebc_to_lovibond(addition.ebc),
                usage,
                fermentable_id: None,
                amount: round_to(addition.grams / 1000.0, 3),
            })
        });

    malts.chain(others).collect()
}

fn hops(record: &LogRecord) -> Vec<Hop> {
    let boil_time = record.batch.boil_time;
    let kettle = record.hops.iter().map(|hop| {
        let (usage, time) = if hop.first_wort {
            (HopUsage::FirstWort, boil_time)
        } else if hop.minutes <= 0.0 {
            (HopUsage::HOPSTAND, 0.0)
        } else {
            (HopUsage::Boil, hop.minutes)
        };
        Hop {
            name: hop.name.clone(),
            aa: hop.alpha,
            form: hop_form(hop.pellets),
            usage,
            time,
            amount: round_to(hop.grams, 3),
            ibu: None,
        }
    });

    let dry = record
        .additions
        .iter()
        .filter(|a| a.is_hop() && a.stage == 0)
        .map(|addition| dry_hop(record, addition));

    kettle.chain(dry).collect()
}

fn dry_hop(record: &LogRecord, addition: &Addition) -> Hop {
    let (aa, form) = match record.hop_stock.get(&addition.name) {
        Some(stock) => (stock.alpha, hop_form(stock.pellets)),
        None => (0.0, HopForm::Pellet),
    };
    let days = if addition.duration > 0.0 {
        (addition.duration / MINUTES_PER_DAY).round()
    } else {
        0.0
    };
    Hop {
        name: addition.name.clone(),
        aa,
        form,
        usage: HopUsage::DryHop,
        time: days,
        amount: round_to(addition.grams, 3),
        ibu: None,
    }
}

/// The single yeast of a batch, if any units were pitched.
fn yeast(record: &LogRecord) -> Option<Yeast> {
    let batch = &record.batch;
    if batch.yeast_units <= 0.0 {
        return None;
    }
    let mut yeast = Yeast {
        name: batch.yeast_name.clone(),
        attenuation: None,
        amount: batch.yeast_units,
        unit: YeastUnit::Packets,
    };
    if let Some(stock) = &record.yeast {
        apply_yeast_stock(&mut yeast, stock);
    }
    Some(yeast)
}

fn apply_yeast_stock(yeast: &mut Yeast, stock: &YeastStock) {
    yeast.attenuation = LEADING_NUMBER
        .captures(&stock.attenuation)
        .and_then(|caps| caps[1].replace(',', ".").parse::<f64>().ok())
        .map(|percent| percent / 100.0);
    yeast.unit = if stock.dry { YeastUnit::Packets } else { YeastUnit::Vials };

    let package = LEADING_NUMBER.captures(&stock.package).and_then(|caps| {
        let amount = caps[1].replace(',', ".").parse::<f64>().ok()?;
        let unit = YeastUnit::from_str(&caps[2]).ok()?;
        (amount > 0.0).then_some((amount, unit))
    });
    match package {
        Some((amount, unit)) => {
            yeast.amount *= amount;
            yeast.unit = unit;
        }
        None => debug!(
            yeast = %yeast.name,
            package = %stock.package,
            "could not convert yeast package size to amount and unit"
        ),
    }
}

fn adjuncts(record: &LogRecord) -> Vec<Adjunct> {
    record
        .additions
        .iter()
        .filter(|a| !a.is_hop() && !a.is_fermentable())
        .filter_map(|addition| {
            let usage = match addition.stage {
                2 => AdjunctUsage::Mash,
                1 if addition.duration == 0.0 => AdjunctUsage::Flameout,
                1 => AdjunctUsage::Boil,
                0 => AdjunctUsage::Primary,
                other => {
                    debug!(name = %addition.name, stage = other, "skipping addition with unknown stage");
                    return None;
                }
            };
            Some(Adjunct {
                name: addition.name.clone(),
                usage,
                amount: round_to(addition.grams, 3),
                unit: AdjunctUnit::G,
                time: positive(addition.duration).map(addition_time),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Brew session
// ---------------------------------------------------------------------------

/// The batch's brew session; `None` until the batch has been brewed.
pub fn brew(record: &LogRecord, recipe: &Recipe) -> Option<Brew> {
    let batch = &record.batch;
    if !batch.brewed {
        return None;
    }

    let equipment_tags = record
        .equipment
        .as_ref()
        .map(|e| Annotations::parse(&e.notes))
        .unwrap_or_default();
    let evaporation = record.equipment.as_ref().map_or(0.0, |e| e.evaporation_rate);

    let fermentation_start = local_to_utc(&batch.pitch_date);
    let conditioning_start = batch
        .bottled
        .then(|| local_to_utc(&batch.bottling_date))
        .flatten();
    let status = if batch.bottled {
        BrewStatus::Conditioning
    } else if fermentation_start.is_some() {
        BrewStatus::Fermentation
    } else {
        BrewStatus::BrewDay
    };

    let mut brew = Brew {
        name: Some(batch.name.clone()),
        status,
        created_at: local_to_utc(&batch.brew_date).or(recipe.created_at),
        updated_at: recipe.updated_at,
        fermentation_start,
        conditioning_start,
        conditioning_days: positive(batch.maturation_weeks * 7.0),
        og: recipe.og,
        fg: recipe.fg,
        abv: recipe.abv,
        notes: recipe.notes.clone(),
        ..Brew::default()
    };

    brew.mash_water = positive(batch.mash_water);
    brew.sparge_water = positive(batch.sparge_water);
    if batch.mash_in_temperature > 0.0 {
        let mash = session::mash_summary(batch.mash_in_temperature, &recipe.mash_steps);
        brew.mash_start_temperature = Some(batch.mash_in_temperature);
        brew.mash_end_temperature = Some(mash.end_temperature);
        brew.mash_duration = Some(mash.duration);
    }

    if batch.boil_end_volume > 0.0 {
        let volumes = session::boil_volumes(batch.boil_end_volume, evaporation, batch.boil_time);
        brew.boil_start_volume = Some(volumes.start);
        brew.boil_end_volume = Some(volumes.end);
        brew.post_boil_volume = Some(batch.boil_end_volume);
    }
    brew.fermenter_volume = positive(batch.pitch_volume);
    brew.bottling_volume = positive(batch.bottled_volume);
    brew.kettle_losses = Some(round_to(
        session::kettle_losses(
            equipment_tags.number("Kettle-Losses"),
            batch.pre_strain_volume,
            batch.pitch_volume,
            DEFAULT_KETTLE_LOSSES,
        ),
        1,
    ));

    if batch.co2 > 0.0 {
        let beer = if batch.bottled_volume > 0.0 {
            batch.bottled_volume
        } else {
            batch.pitch_volume
        };
        brew.carbonation = Some(session::carbonation(
            co2_grams_to_volumes(batch.co2),
            batch.carbonation_temperature,
            beer,
        ));
    }

    brew.gravity_readings = record
        .readings
        .iter()
        .map(|r| GravityReading {
            recorded_at: local_to_utc(&r.timestamp),
            gravity: plato_to_gravity(r.plato),
        })
        .collect();

    Some(brew)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kbh::{KbhDatabase, fixture};
    use brewsync_shared::NamePattern;

    async fn pale_ale() -> LogRecord {
        let path = fixture::create().await;
        let db = KbhDatabase::open(&path).await.unwrap();
        let record = db.record(&NamePattern::new("Pale Ale").unwrap()).await.unwrap();
        let _ = std::fs::remove_file(&path);
        record
    }

    #[tokio::test]
    async fn recipe_header() {
        let recipe = recipe(&pale_ale().await);
        assert_eq!(recipe.name, "Pale Ale");
        assert_eq!(recipe.og, Some(1.048));
        assert_eq!(recipe.fg, Some(1.01));
        assert_eq!(recipe.abv, Some(5.1));
        assert_eq!(recipe.batch_size, 20.0);
        assert_eq!(recipe.boil_size, Some(22.0));
        assert_eq!(recipe.boil_time, 60.0);
        assert_eq!(recipe.efficiency, Some(0.72));
        assert_eq!(recipe.losses, Some(4.5));
        assert_eq!(recipe.ibu, Some(35.0));
        assert_eq!(recipe.srm, Some(5.0));
        assert_eq!(recipe.calories, Some(156.0));
        assert_eq!(recipe.bggu, None);
        assert!(recipe.created_at.is_some());
        assert!(recipe.updated_at > recipe.created_at);
    }

    #[tokio::test]
    async fn annotations_become_fields() {
        let recipe = recipe(&pale_ale().await);
        assert_eq!(recipe.description.as_deref(), Some("Summer pale ale."));
        assert_eq!(recipe.notes.as_deref(), Some("Summer pale ale.\nDry hopped."));
        assert_eq!(recipe.bjcp_style_id.as_deref(), Some("18B"));
        assert_eq!(recipe.is_public, Some(true));
        assert_eq!(recipe.image_url, None);
        assert_eq!(recipe.fermentation_steps.len(), 2);
        assert_eq!(recipe.fermentation_steps[1].name, "Cold");
        assert_eq!(recipe.fermentation_steps[1].temperature, 2.0);
    }

    #[tokio::test]
    async fn ingredients() {
        let recipe = recipe(&pale_ale().await);

        let names: Vec<_> = recipe.fermentables.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["Pilsner", "Cara", "Dextrose"]);
        assert_eq!(recipe.fermentables[0].ppg, 35.0);
        assert_eq!(recipe.fermentables[0].lovibond, 1.873);
        assert_eq!(recipe.fermentables[2].usage, FermentableUsage::Extract);
        assert_eq!(recipe.fermentables[2].ppg, 46.2);
        assert_eq!(recipe.fermentables[2].amount, 0.25);

        let hops: Vec<_> = recipe.hops.iter().map(|h| (h.name.as_str(), h.usage, h.time)).collect();
        assert_eq!(
            hops,
            [
                ("Magnum", HopUsage::FirstWort, 60.0),
                ("Cascade", HopUsage::Boil, 60.0),
                ("Amarillo", HopUsage::Aroma, 0.0),
                ("Citra", HopUsage::DryHop, 4.0),
            ]
        );
        assert_eq!(recipe.hops[2].form, HopForm::Plug);
        assert_eq!(recipe.hops[3].aa, 13.0);
        assert_eq!(recipe.hops[3].form, HopForm::Pellet);

        let yeast = &recipe.yeasts[0];
        assert_eq!(yeast.name, "US-05");
        assert_eq!(yeast.attenuation, Some(0.78));
        assert_eq!(yeast.amount, 11.5);
        assert_eq!(yeast.unit, YeastUnit::G);

        let adjuncts: Vec<_> = recipe.adjuncts.iter().map(|a| (a.name.as_str(), a.usage)).collect();
        assert_eq!(
            adjuncts,
            [("Irish Moss", AdjunctUsage::Flameout), ("Gypsum", AdjunctUsage::Mash)]
        );
        assert_eq!(recipe.adjuncts[1].time, Some(90.0));

        assert_eq!(recipe.mash_steps.len(), 3);
        assert_eq!(recipe.mash_steps[2].order, 2);
    }

    #[tokio::test]
    async fn brewed_batch_has_a_brew_session() {
        let record = pale_ale().await;
        let CanonicalRecord { recipe, brew } = canonical(&record);
        let brew = brew.unwrap();

        assert_eq!(brew.status, BrewStatus::Conditioning);
        assert_eq!(brew.conditioning_days, Some(28.0));
        assert!(brew.conditioning_start.is_some());
        assert!(brew.fermentation_start.is_some());
        assert_eq!(brew.og, recipe.og);
        assert_eq!(brew.kettle_losses, Some(2.5));
        assert_eq!(brew.boil_end_volume, Some(22.9));
        assert_eq!(brew.boil_start_volume, Some(26.0));
        assert_eq!(brew.post_boil_volume, Some(22.0));
        assert_eq!(brew.mash_start_temperature, Some(55.0));
        assert_eq!(brew.mash_end_temperature, Some(78.0));
        assert_eq!(brew.mash_duration, Some(91.5));
        assert_eq!(brew.gravity_readings.len(), 2);
        assert_eq!(brew.gravity_readings[0].gravity, 1.048);

        let carbonation = brew.carbonation.unwrap();
        assert_eq!(carbonation.co2_volumes, 2.53);
        assert!((carbonation.priming_sugar - 127.0).abs() < 0.2);
    }

    #[tokio::test]
    async fn planned_batch_has_no_brew_session() {
        let path = fixture::create().await;
        let db = KbhDatabase::open(&path).await.unwrap();
        let stout = db.recipe(&NamePattern::new("Stout").unwrap()).await.unwrap();
        let _ = std::fs::remove_file(&path);

        assert!(stout.brew.is_none());
        assert_eq!(stout.recipe.fg, Some(1.0));
        assert_eq!(stout.recipe.is_public, Some(false));
        assert!(stout.recipe.yeasts.is_empty());
        assert_eq!(stout.recipe.fermentation_steps[0].name, "Primary");
    }

    #[test]
    fn measured_kettle_losses_without_override() {
        let mut record = LogRecord::default();
        record.batch.brewed = true;
        record.batch.pre_strain_volume = 24.0;
        record.batch.pitch_volume = 21.0;
        let brew = brew(&record, &Recipe::named("x")).unwrap();
        assert_eq!(brew.kettle_losses, Some(3.0));
        assert_eq!(brew.status, BrewStatus::BrewDay);

        record.batch.pitch_volume = 25.0;
        let brew = super::brew(&record, &Recipe::named("x")).unwrap();
        assert_eq!(brew.kettle_losses, Some(DEFAULT_KETTLE_LOSSES));
    }

    #[test]
    fn yeast_package_in_unknown_unit_keeps_units() {
        let mut yeast = Yeast {
            name: "Wyeast 1056".into(),
            attenuation: None,
            amount: 2.0,
            unit: YeastUnit::Packets,
        };
        let stock = YeastStock {
            attenuation: "75%".into(),
            dry: false,
            package: "1 Beutel".into(),
        };
        apply_yeast_stock(&mut yeast, &stock);
        assert_eq!(yeast.amount, 2.0);
        assert_eq!(yeast.unit, YeastUnit::Vials);
        assert_eq!(yeast.attenuation, Some(0.75));
    }
}
