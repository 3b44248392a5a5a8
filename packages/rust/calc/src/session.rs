//! Values derived for a brew session from raw brewing-log measurements.

use brewsync_shared::{Carbonation, Step};

use crate::units::{CO2_GRAMS_PER_VOLUME, round_to, volume_at_temperature};

/// Kettle losses used when the measured value is implausible.
pub const DEFAULT_KETTLE_LOSSES: f64 = 1.0;

/// Reference temperature of cold volume measurements, °C.
pub const COLD_REFERENCE: f64 = 20.0;

/// Temperature of boiling wort, °C.
pub const BOIL_REFERENCE: f64 = 99.0;

/// Minutes of heating per degree of mash temperature rise.
const HEAT_UP_MINUTES_PER_DEGREE: f64 = 0.5;

/// Grams of sucrose yielding one gram of CO2 on full fermentation.
const SUCROSE_PER_CO2: f64 = 1.0 / 0.5;

const PSI_PER_BAR: f64 = 14.5038;

/// Atmospheric pressure, bar.
const ATMOSPHERE: f64 = 1.013;

/// Kettle losses in liters.
///
/// An explicit override wins. Otherwise the difference between the volume
/// before straining hops and the pitched volume, falling back to `default`
/// when that difference is negative.
pub fn kettle_losses(override_liters: Option<f64>, pre_strain: f64, pitched: f64, default: f64) -> f64 {
    if let Some(losses) = override_liters {
        return losses;
    }
    let measured = pre_strain - pitched;
    if measured < 0.0 { default } else { measured }
}

/// Hot volumes at the start and end of the boil.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoilVolumes {
    /// Liters at boiling temperature before evaporation.
    pub start: f64,
    /// Liters at boiling temperature after evaporation.
    pub end: f64,
}

/// Reconstruct the hot boil volumes from the cold post-boil volume.
///
/// `evaporation` is liters per hour, `boil_minutes` the boil duration.
pub fn boil_volumes(post_boil_cold: f64, evaporation: f64, boil_minutes: f64) -> BoilVolumes {
    let end = volume_at_temperature(post_boil_cold, COLD_REFERENCE, BOIL_REFERENCE);
    let pre_boil_cold = post_boil_cold + evaporation * boil_minutes / 60.0;
    let start = volume_at_temperature(pre_boil_cold, COLD_REFERENCE, BOIL_REFERENCE);
    BoilVolumes {
        start: round_to(start, 1),
        end: round_to(end, 1),
    }
}

/// Outcome of walking a mash schedule.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MashSummary {
    /// Temperature of the last rest, °C.
    pub end_temperature: f64,
    /// Total minutes including heat-up between rests.
    pub duration: f64,
}

/// Walk the mash steps in order, summing rest times and heat-up.
///
/// Heat-up is estimated at half a minute per degree between the mash-in
/// temperature and the final rest.
pub fn mash_summary(start_temperature: f64, steps: &[Step]) -> MashSummary {
    let end_temperature = steps.last().map_or(start_temperature, |s| s.temperature);
    let rests: f64 = steps.iter().map(|s| s.time).sum();
    let heat_up = (end_temperature - start_temperature).max(0.0) * HEAT_UP_MINUTES_PER_DEGREE;
    MashSummary {
        end_temperature,
        duration: rests + heat_up,
    }
}

/// CO2 solubility term of the carbonation curve at `celsius`.
fn solubility(celsius: f64) -> f64 {
    (-10.73797 + 2617.25 / (celsius + 273.15)).exp() * 10.0
}

/// Dissolved CO2 left in beer at atmospheric pressure, g/l.
pub fn residual_co2(celsius: f64) -> f64 {
    ATMOSPHERE * solubility(celsius)
}

/// Sucrose for bottle conditioning to `co2_volumes`, grams.
pub fn priming_sugar(co2_volumes: f64, celsius: f64, beer_liters: f64) -> f64 {
    let missing = co2_volumes * CO2_GRAMS_PER_VOLUME - residual_co2(celsius);
    (missing * beer_liters * SUCROSE_PER_CO2).max(0.0)
}

/// Keg head pressure for force carbonation to `co2_volumes`, psi.
pub fn keg_pressure(co2_volumes: f64, celsius: f64) -> f64 {
    let bar = co2_volumes * CO2_GRAMS_PER_VOLUME / solubility(celsius) - ATMOSPHERE;
    (bar * PSI_PER_BAR).max(0.0)
}

/// Carbonation targets and derived amounts for a batch.
pub fn carbonation(co2_volumes: f64, celsius: f64, beer_liters: f64) -> Carbonation {
    Carbonation {
        co2_volumes: round_to(co2_volumes, 2),
        beer_temperature: celsius,
        priming_sugar: round_to(priming_sugar(co2_volumes, celsius, beer_liters), 1),
        keg_pressure: round_to(keg_pressure(co2_volumes, celsius), 1),
    }
}
