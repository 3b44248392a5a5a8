//! Derived recipe metrics: gravity, alcohol, color, calories, bitterness.
//!
//! [`recalculate`] fills the derived fields of a [`Recipe`] in place. A field
//! that already holds a plausible value is left alone unless `force` is set,
//! so values entered by hand in a source survive a sync.

use tracing::debug;

use brewsync_shared::{FermentableUsage, Hop, HopUsage, Recipe};

use crate::units::{grams_to_ounces, kilograms_to_pounds, liters_to_gallons, round_to};

/// Attenuation assumed for yeasts that do not state one.
pub const DEFAULT_ATTENUATION: f64 = 0.75;

/// Mash efficiency assumed when the recipe does not state one.
pub const DEFAULT_EFFICIENCY: f64 = 0.75;

/// Extraction efficiency of steeped grains.
pub const STEEP_EFFICIENCY: f64 = 0.5;

/// Alcohol by volume per gravity unit of apparent attenuation.
const ABV_FACTOR: f64 = 131.25;

// ---------------------------------------------------------------------------
// Intermediate totals
// ---------------------------------------------------------------------------

/// Gravity and color contributed by a recipe's fermentables.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GravityTotals {
    /// Gravity points of the finished wort.
    pub total_points: f64,
    /// Gravity points present during the boil (late additions excluded).
    pub early_points: f64,
    /// Malt color units (Lovibond · lb / gal).
    pub mcu: f64,
    /// Post-boil volume in US gallons.
    pub post_boil_gallons: f64,
}

impl GravityTotals {
    /// Original gravity of the finished wort.
    pub fn og(&self) -> f64 {
        1.0 + self.total_points / 1000.0
    }

    /// Gravity during the boil, used for hop utilization.
    pub fn early_og(&self) -> f64 {
        1.0 + self.early_points / 1000.0
    }

    /// Final gravity after the given apparent attenuation.
    pub fn fg(&self, attenuation: f64) -> f64 {
        1.0 + self.total_points * (1.0 - attenuation) / 1000.0
    }
}

/// Mean attenuation of the recipe's yeasts.
///
/// Missing or non-positive values count as [`DEFAULT_ATTENUATION`].
pub fn mean_attenuation(recipe: &Recipe) -> f64 {
    if recipe.yeasts.is_empty() {
        return DEFAULT_ATTENUATION;
    }
    let sum: f64 = recipe
        .yeasts
        .iter()
        .map(|y| match y.attenuation {
            Some(a) if a > 0.0 => a,
            _ => DEFAULT_ATTENUATION,
        })
        .sum();
    sum / recipe.yeasts.len() as f64
}

/// Batch size plus losses, in gallons.
pub fn post_boil_gallons(recipe: &Recipe) -> f64 {
    liters_to_gallons(recipe.batch_size + recipe.losses.unwrap_or(0.0))
}

/// Accumulate gravity points and color over all fermentables.
pub fn gravity_totals(recipe: &Recipe) -> GravityTotals {
    let gallons = post_boil_gallons(recipe);
    let mut totals = GravityTotals {
        post_boil_gallons: gallons,
        ..GravityTotals::default()
    };
    if gallons <= 0.0 {
        return totals;
    }

    let mash_efficiency = recipe.efficiency.unwrap_or(DEFAULT_EFFICIENCY);
    for fermentable in recipe.fermentables.iter().filter(|f| f.amount > 0.0) {
        let efficiency = match fermentable.usage {
            FermentableUsage::Mash | FermentableUsage::Other(_) => mash_efficiency,
            FermentableUsage::Steep => STEEP_EFFICIENCY,
            FermentableUsage::Extract | FermentableUsage::LateAddition => 1.0,
        };
        let pounds = kilograms_to_pounds(fermentable.amount);
        let points = pounds * fermentable.ppg * efficiency / gallons;

        totals.total_points += points;
        if fermentable.usage != FermentableUsage::LateAddition {
            totals.early_points += points;
        }
        totals.mcu += pounds * fermentable.lovibond / gallons;
    }
    totals
}

// ---------------------------------------------------------------------------
// Formulas
// ---------------------------------------------------------------------------

/// Tinseth utilization of one hop addition.
///
/// Returns 0 for usages that contribute no bitterness.
pub fn hop_utilization(usage: HopUsage, minutes: f64, early_og: f64) -> f64 {
    let factor = match usage {
        HopUsage::Mash | HopUsage::FirstWort | HopUsage::Boil | HopUsage::Other(_) => 1.1,
        HopUsage::Aroma => 1.0,
        HopUsage::DryHop => return 0.0,
    };
    let bigness = 1.65 * 0.000125_f64.powf(early_og - 1.0);
    let boil_time = (1.0 - (-0.04 * minutes).exp()) / 4.15;
    bigness * boil_time * factor
}

/// Bitterness contributed by one hop addition, unrounded.
///
/// `boil_time` replaces the hop's own time for first-wort additions.
pub fn hop_ibu(hop: &Hop, boil_time: f64, early_og: f64, post_boil_gallons: f64) -> f64 {
    if post_boil_gallons <= 0.0 {
        return 0.0;
    }
    let minutes = match hop.usage {
        HopUsage::FirstWort => boil_time,
        _ => hop.time,
    };
    let utilization = hop_utilization(hop.usage, minutes, early_og);
    let ibu = hop.aa / 100.0 * grams_to_ounces(hop.amount) * 7490.0 / post_boil_gallons
        * utilization;
    match hop.usage {
        HopUsage::Aroma => ibu * 0.5,
        HopUsage::Mash => ibu * 0.2,
        HopUsage::FirstWort => ibu * 1.1,
        HopUsage::Boil | HopUsage::Other(_) => ibu,
        HopUsage::DryHop => 0.0,
    }
}

/// Bitterness-to-gravity ratio, saturating when there is no gravity.
pub fn bu_gu(ibu: f64, og: f64) -> f64 {
    if og <= 1.0 {
        return if ibu > 0.0 { 1.0 } else { 0.0 };
    }
    ibu / ((og - 1.0) * 1000.0)
}

/// Estimated energy content, never negative.
pub fn calories(og: f64, fg: f64) -> f64 {
    let alcohol = 1881.22 * fg * (og - fg) / (1.775 - og);
    let extract = 3550.0 * fg * (0.1808 * og + 0.8192 * fg - 1.0004);
    (alcohol + extract).round().max(0.0)
}

/// Morey color equation.
pub fn morey_srm(mcu: f64) -> f64 {
    if mcu <= 0.0 {
        return 0.0;
    }
    1.49 * mcu.powf(0.69)
}

// ---------------------------------------------------------------------------
// Recalculation
// ---------------------------------------------------------------------------

/// Whether a derived field should be (re)computed.
fn stale(value: Option<f64>, floor: f64, force: bool) -> bool {
    force || value.is_none_or(|v| v <= floor)
}

/// Fill derived metrics of `recipe`.
///
/// Gravities count as present when above 1.000, every other metric when
/// positive. With `force`, every derived field is overwritten.
pub fn recalculate(recipe: &mut Recipe, force: bool) {
    let totals = gravity_totals(recipe);
    let attenuation = mean_attenuation(recipe);

    if stale(recipe.og, 1.0, force) {
        recipe.og = Some(round_to(totals.og(), 3));
    }
    if stale(recipe.fg, 1.0, force) {
        recipe.fg = Some(round_to(totals.fg(attenuation), 3));
    }
    let og = recipe.og.unwrap_or(1.0);
    let fg = recipe.fg.unwrap_or(1.0);

    if stale(recipe.abv, 0.0, force) {
        recipe.abv = Some(round_to(((og - fg) * ABV_FACTOR).max(0.0), 1));
    }
    if stale(recipe.srm, 0.0, force) {
        recipe.srm = Some(round_to(morey_srm(totals.mcu), 1));
    }
    if stale(recipe.calories, 0.0, force) {
        recipe.calories = Some(calories(og, fg));
    }

    let early_og = totals.early_og();
    let boil_time = recipe.boil_time;
    let mut total_ibu = 0.0;
    for hop in &mut recipe.hops {
        if stale(hop.ibu, 0.0, force) {
            let ibu = hop_ibu(hop, boil_time, early_og, totals.post_boil_gallons);
            hop.ibu = Some(round_to(ibu, 1));
        }
        total_ibu += hop.ibu.unwrap_or(0.0);
    }
    if stale(recipe.ibu, 0.0, force) {
        recipe.ibu = Some(round_to(total_ibu, 1));
    }

    let ibu = recipe.ibu.unwrap_or(0.0);
    if stale(recipe.bggu, 0.0, force) {
        recipe.bggu = Some(round_to(bu_gu(ibu, og), 2));
    }

    debug!(
        recipe = %recipe.name,
        og = og,
        fg = fg,
        ibu = ibu,
        force,
        "recalculated recipe metrics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::{liters_to_gallons, pounds_to_kilograms};
    use brewsync_shared::{Fermentable, HopForm, Yeast, YeastUnit};

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    fn fermentable(usage: FermentableUsage, kg: f64, ppg: f64, lovibond: f64) -> Fermentable {
        Fermentable {
            name: "Pilsner".into(),
            ppg,
            lovibond,
            usage,
            fermentable_id: None,
            amount: kg,
        }
    }

    fn hop(usage: HopUsage, time: f64, grams: f64) -> Hop {
        Hop {
            name: "Hallertauer".into(),
            aa: 6.5,
            form: HopForm::Pellet,
            usage,
            time,
            amount: grams,
            ibu: None,
        }
    }

    /// 20 L of wort at exactly 1.050 from a single extract addition.
    fn pale_ale() -> Recipe {
        let mut recipe = Recipe::named("Pale Ale");
        recipe.batch_size = 20.0;
        recipe.boil_time = 60.0;
        let pounds = 50.0 * liters_to_gallons(20.0) / 40.0;
        recipe.fermentables = vec![fermentable(
            FermentableUsage::Extract,
            pounds_to_kilograms(pounds),
            40.0,
            4.0,
        )];
        recipe.hops = vec![hop(HopUsage::Boil, 60.0, 28.0)];
        recipe
    }

    #[test]
    fn tinseth_single_boil_hop() {
        let utilization = hop_utilization(HopUsage::Boil, 60.0, 1.050);
        assert!(close(utilization, 0.253_730, 1e-6));

        let mut recipe = pale_ale();
        recalculate(&mut recipe, false);
        assert_eq!(recipe.og, Some(1.05));
        assert_eq!(recipe.hops[0].ibu, Some(23.1));
        assert_eq!(recipe.ibu, Some(23.1));
        assert_eq!(recipe.bggu, Some(0.46));
    }

    #[test]
    fn gravity_alcohol_and_calories() {
        let mut recipe = pale_ale();
        recalculate(&mut recipe, false);
        assert_eq!(recipe.fg, Some(1.013));
        assert_eq!(recipe.abv, Some(4.9));
        // 1.050 -> 1.0125 is the reference pair; stored FG rounds to 1.013.
        assert_eq!(calories(1.050, 1.0125), 166.0);
        assert!(recipe.calories.is_some_and(|c| c > 150.0));
    }

    #[test]
    fn zero_fermentables_is_not_an_error() {
        let mut recipe = Recipe::named("Water");
        recipe.batch_size = 20.0;
        recalculate(&mut recipe, false);
        assert_eq!(recipe.og, Some(1.0));
        assert_eq!(recipe.fg, Some(1.0));
        assert_eq!(recipe.abv, Some(0.0));
        assert_eq!(recipe.srm, Some(0.0));
        assert_eq!(recipe.calories, Some(0.0));
        assert_eq!(recipe.ibu, Some(0.0));
        assert_eq!(recipe.bggu, Some(0.0));
    }

    #[test]
    fn zero_volume_contributes_nothing() {
        let mut recipe = pale_ale();
        recipe.batch_size = 0.0;
        recalculate(&mut recipe, false);
        assert_eq!(recipe.og, Some(1.0));
        assert_eq!(recipe.hops[0].ibu, Some(0.0));
    }

    #[test]
    fn bu_gu_saturates_without_gravity() {
        assert_eq!(bu_gu(5.0, 1.0), 1.0);
        assert_eq!(bu_gu(0.0, 1.0), 0.0);
        assert!(close(bu_gu(25.0, 1.050), 0.5, 1e-12));

        let mut recipe = Recipe::named("Hop Water");
        recipe.batch_size = 20.0;
        recipe.og = Some(1.0);
        recipe.ibu = Some(5.0);
        recalculate(&mut recipe, false);
        assert_eq!(recipe.ibu, Some(5.0));
        assert_eq!(recipe.bggu, Some(1.0));
    }

    #[test]
    fn plausible_values_survive_without_force() {
        let mut recipe = pale_ale();
        recipe.og = Some(1.062);
        recipe.ibu = Some(40.0);
        recipe.srm = Some(12.0);
        recalculate(&mut recipe, false);
        assert_eq!(recipe.og, Some(1.062));
        assert_eq!(recipe.ibu, Some(40.0));
        assert_eq!(recipe.srm, Some(12.0));
        // ABV follows the stored OG.
        assert_eq!(recipe.abv, Some(round_to((1.062 - 1.013) * 131.25, 1)));
    }

    #[test]
    fn implausible_gravity_is_replaced() {
        let mut recipe = pale_ale();
        recipe.og = Some(0.998);
        recipe.fg = Some(1.0);
        recalculate(&mut recipe, false);
        assert_eq!(recipe.og, Some(1.05));
        assert_eq!(recipe.fg, Some(1.013));
    }

    #[test]
    fn force_overwrites_everything() {
        let mut recipe = pale_ale();
        recipe.og = Some(1.062);
        recipe.fg = Some(1.010);
        recipe.abv = Some(9.9);
        recipe.srm = Some(30.0);
        recipe.calories = Some(999.0);
        recipe.ibu = Some(80.0);
        recipe.bggu = Some(2.0);
        recipe.hops[0].ibu = Some(80.0);
        recalculate(&mut recipe, true);
        assert_eq!(recipe.og, Some(1.05));
        assert_eq!(recipe.fg, Some(1.013));
        assert_eq!(recipe.abv, Some(4.9));
        assert_ne!(recipe.srm, Some(30.0));
        assert_ne!(recipe.calories, Some(999.0));
        assert_eq!(recipe.ibu, Some(23.1));
        assert_eq!(recipe.bggu, Some(0.46));
    }

    #[test]
    fn recalculate_is_idempotent() {
        let mut recipe = pale_ale();
        recipe.hops.push(hop(HopUsage::Aroma, 0.0, 50.0));
        recipe.hops.push(hop(HopUsage::DryHop, 4.0, 100.0));
        recipe.yeasts.push(Yeast {
            name: "US-05".into(),
            attenuation: Some(0.81),
            amount: 1.0,
            unit: YeastUnit::Packets,
        });
        recalculate(&mut recipe, false);
        let first = recipe.clone();
        recalculate(&mut recipe, false);
        assert_eq!(recipe, first);
    }

    #[test]
    fn late_additions_do_not_raise_boil_gravity() {
        let mut recipe = pale_ale();
        recipe.fermentables.push(fermentable(
            FermentableUsage::LateAddition,
            1.0,
            46.0,
            0.0,
        ));
        let totals = gravity_totals(&recipe);
        assert!(totals.total_points > totals.early_points);
        assert!(close(totals.early_og(), 1.050, 1e-9));
    }

    #[test]
    fn steep_and_mash_efficiencies() {
        let mut recipe = Recipe::named("Stout");
        recipe.batch_size = 20.0;
        recipe.efficiency = Some(0.7);
        recipe.fermentables = vec![
            fermentable(FermentableUsage::Mash, 1.0, 37.0, 2.0),
            fermentable(FermentableUsage::Steep, 1.0, 37.0, 500.0),
        ];
        let totals = gravity_totals(&recipe);
        let one_kg = kilograms_to_pounds(1.0) * 37.0 / liters_to_gallons(20.0);
        assert!(close(totals.total_points, one_kg * 0.7 + one_kg * 0.5, 1e-9));
        assert!(morey_srm(totals.mcu) > 40.0);
    }

    #[test]
    fn hop_usage_scaling() {
        let gallons = liters_to_gallons(20.0);
        let boil = hop_ibu(&hop(HopUsage::Boil, 60.0, 28.0), 60.0, 1.05, gallons);
        let first_wort = hop_ibu(&hop(HopUsage::FirstWort, 0.0, 28.0), 60.0, 1.05, gallons);
        let mash = hop_ibu(&hop(HopUsage::Mash, 60.0, 28.0), 60.0, 1.05, gallons);
        let dry = hop_ibu(&hop(HopUsage::DryHop, 60.0, 28.0), 60.0, 1.05, gallons);
        assert!(close(first_wort, boil * 1.1, 1e-9));
        assert!(close(mash, boil * 0.2, 1e-9));
        assert_eq!(dry, 0.0);

        let aroma = hop_ibu(&hop(HopUsage::HOPSTAND, 60.0, 28.0), 60.0, 1.05, gallons);
        assert!(close(aroma, boil / 1.1 * 0.5, 1e-9));
    }

    #[test]
    fn attenuation_defaults() {
        let mut recipe = Recipe::named("Lager");
        assert_eq!(mean_attenuation(&recipe), DEFAULT_ATTENUATION);
        recipe.yeasts = vec![
            Yeast {
                name: "W-34/70".into(),
                attenuation: Some(0.85),
                amount: 2.0,
                unit: YeastUnit::Packets,
            },
            Yeast {
                name: "Unknown".into(),
                attenuation: Some(0.0),
                amount: 1.0,
                unit: YeastUnit::Packets,
            },
        ];
        assert!(close(mean_attenuation(&recipe), 0.8, 1e-12));
    }

    #[test]
    fn unknown_hop_usage_counts_as_boil() {
        assert_eq!(
            hop_utilization(HopUsage::Other(99), 60.0, 1.050),
            hop_utilization(HopUsage::Boil, 60.0, 1.050)
        );
    }
}
