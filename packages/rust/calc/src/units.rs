//! Scalar unit conversions used by every other component.
//!
//! All constants are empirical and must stay exactly as they are: the remote
//! service publishes values computed with the same formulas, and cross-system
//! comparisons only agree to displayed rounding if these match.

/// Liters in one US gallon.
pub const LITERS_PER_GALLON: f64 = 3.785_411_784;

/// Pounds in one kilogram.
pub const POUNDS_PER_KILOGRAM: f64 = 2.204_622_621_8;

/// Grams in one ounce (avoirdupois).
pub const GRAMS_PER_OUNCE: f64 = 28.349_523_125;

/// Grams of CO2 per liter of beer for one volume of dissolved CO2.
pub const CO2_GRAMS_PER_VOLUME: f64 = 1.977;

/// Gravity points per pound per gallon for one percent of extract yield.
const PPG_PER_YIELD_PERCENT: f64 = 0.46177;

/// Water density polynomial in degrees Celsius (kg/l), lowest order first.
const WATER_DENSITY: [f64; 6] = [
    0.999_854_277_7,
    6.100_081_918_7e-5,
    -8.297_085_978_3e-6,
    6.384_627_649_9e-8,
    -3.904_315_650_5e-10,
    1.058_572_102_1e-12,
];

/// Round to a fixed number of decimal digits.
pub fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}

pub fn liters_to_gallons(liters: f64) -> f64 {
    liters / LITERS_PER_GALLON
}

pub fn gallons_to_liters(gallons: f64) -> f64 {
    gallons * LITERS_PER_GALLON
}

pub fn kilograms_to_pounds(kg: f64) -> f64 {
    kg * POUNDS_PER_KILOGRAM
}

pub fn pounds_to_kilograms(lb: f64) -> f64 {
    lb / POUNDS_PER_KILOGRAM
}

pub fn grams_to_ounces(g: f64) -> f64 {
    g / GRAMS_PER_OUNCE
}

pub fn ounces_to_grams(oz: f64) -> f64 {
    oz * GRAMS_PER_OUNCE
}

pub fn fahrenheit_to_celsius(f: f64) -> f64 {
    (f - 32.0) * 5.0 / 9.0
}

pub fn celsius_to_fahrenheit(c: f64) -> f64 {
    c * 9.0 / 5.0 + 32.0
}

/// Degrees Plato to specific gravity, rounded to 3 decimals.
pub fn plato_to_gravity(plato: f64) -> f64 {
    let gravity = 1.0 + plato / (258.6 - (plato / 258.2) * 227.1);
    round_to(gravity, 3)
}

/// Specific gravity to degrees Plato; the exact inverse of the Plato polynomial.
pub fn gravity_to_plato(gravity: f64) -> f64 {
    let points = gravity - 1.0;
    258.6 * points / (1.0 + points * 227.1 / 258.2)
}

/// EBC color to degrees Lovibond, rounded to 3 decimals.
///
/// Inverse of the published `EBC = (L * 1.3546 - 0.76) * 1.97`.
pub fn ebc_to_lovibond(ebc: f64) -> f64 {
    round_to((ebc / 1.97 + 0.76) / 1.3546, 3)
}

pub fn lovibond_to_ebc(lovibond: f64) -> f64 {
    (lovibond * 1.3546 - 0.76) * 1.97
}

/// EBC color to SRM.
pub fn ebc_to_srm(ebc: f64) -> f64 {
    ebc * 0.508
}

/// Extract yield in percent to gravity points per pound per gallon.
pub fn yield_to_ppg(yield_percent: f64) -> f64 {
    yield_percent * PPG_PER_YIELD_PERCENT
}

/// Density of water at a temperature in degrees Celsius, kg/l.
pub fn water_density(celsius: f64) -> f64 {
    WATER_DENSITY
        .iter()
        .rev()
        .fold(0.0, |acc, coefficient| acc * celsius + coefficient)
}

/// Volume measured at `from_celsius` expressed at `to_celsius`.
pub fn volume_at_temperature(volume: f64, from_celsius: f64, to_celsius: f64) -> f64 {
    volume * water_density(from_celsius) / water_density(to_celsius)
}

/// Dissolved CO2 in g/l to volumes.
pub fn co2_grams_to_volumes(grams_per_liter: f64) -> f64 {
    grams_per_liter / CO2_GRAMS_PER_VOLUME
}

pub fn co2_volumes_to_grams(volumes: f64) -> f64 {
    volumes * CO2_GRAMS_PER_VOLUME
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tolerance: f64) -> bool {
        (a - b).abs() <= tolerance
    }

    #[test]
    fn volume_and_mass_conversions() {
        assert!(close(liters_to_gallons(20.0), 5.2834, 1e-4));
        assert!(close(gallons_to_liters(liters_to_gallons(23.0)), 23.0, 1e-9));
        assert!(close(kilograms_to_pounds(1.0), 2.2046, 1e-4));
        assert!(close(pounds_to_kilograms(kilograms_to_pounds(4.5)), 4.5, 1e-9));
        assert!(close(grams_to_ounces(28.0), 0.9877, 1e-4));
        assert!(close(ounces_to_grams(1.0), 28.3495, 1e-4));
    }

    #[test]
    fn temperature_conversions() {
        assert!(close(fahrenheit_to_celsius(212.0), 100.0, 1e-9));
        assert!(close(celsius_to_fahrenheit(-40.0), -40.0, 1e-9));
    }

    #[test]
    fn plato_examples() {
        assert_eq!(plato_to_gravity(0.0), 1.0);
        assert_eq!(plato_to_gravity(12.0), 1.048);
        assert!(close(gravity_to_plato(plato_to_gravity(12.0)), 12.0, 0.1));
    }

    #[test]
    fn plato_is_monotonic_over_supported_range() {
        let mut previous = plato_to_gravity(0.0);
        for step in 1..=300 {
            let current = plato_to_gravity(step as f64 / 10.0);
            assert!(current >= previous, "not monotonic at {step}");
            previous = current;
        }
        for degree in 1..=30 {
            assert!(plato_to_gravity(degree as f64) > plato_to_gravity((degree - 1) as f64));
        }
    }

    #[test]
    fn ebc_lovibond_roundtrip() {
        assert!(close(ebc_to_lovibond(8.0), 3.559, 1e-9));
        for lovibond in [1.5, 3.5, 20.0, 120.0, 450.0] {
            let back = ebc_to_lovibond(lovibond_to_ebc(lovibond));
            assert!(close(back, lovibond, 1e-3), "{lovibond} -> {back}");
        }
    }

    #[test]
    fn yield_to_ppg_matches_reference() {
        assert!(close(yield_to_ppg(80.0), 36.9416, 1e-4));
    }

    #[test]
    fn water_density_reference_points() {
        assert!(close(water_density(4.0), 0.99997, 1e-4));
        assert!(close(water_density(20.0), 0.99820, 1e-4));
        assert!(close(water_density(99.0), 0.95908, 1e-4));
    }

    #[test]
    fn hot_wort_expands() {
        let hot = volume_at_temperature(20.0, 20.0, 99.0);
        assert!(close(hot, 20.816, 0.01));
        assert!(close(volume_at_temperature(hot, 99.0, 20.0), 20.0, 1e-9));
    }

    #[test]
    fn co2_volumes() {
        assert!(close(co2_grams_to_volumes(co2_volumes_to_grams(2.4)), 2.4, 1e-12));
        assert!(close(co2_grams_to_volumes(5.0), 2.529, 1e-3));
    }

    #[test]
    fn rounding() {
        assert_eq!(round_to(1.04849, 3), 1.048);
        assert_eq!(round_to(4.95, 0), 5.0);
        assert_eq!(round_to(23.0921, 1), 23.1);
    }
}
