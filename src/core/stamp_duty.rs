/// Residential bands as `(upper bound, marginal rate)`; each band taxes only
/// the slice of value between the previous bound and its own.
const STANDARD_BANDS: [(f64, f64); 4] = [
    (250_000.0, 0.0),
    (925_000.0, 0.05),
    (1_500_000.0, 0.10),
    (f64::INFINITY, 0.12),
];

/// Additional-dwelling surcharge, charged on the whole price.
pub const SECOND_HOME_SURCHARGE: f64 = 0.05;

pub fn stamp_duty(property_value: f64, is_second_home: bool) -> f64 {
    if property_value.is_nan() || property_value <= 0.0 {
        return 0.0;
    }

    let mut duty = 0.0;
    let mut lower = 0.0;
    for (upper, rate) in STANDARD_BANDS {
        if property_value <= lower {
            break;
        }
        let taxable = property_value.min(upper) - lower;
        duty += taxable * rate;
        lower = upper;
    }

    if is_second_home {
        duty += property_value * SECOND_HOME_SURCHARGE;
    }
    duty
}
