/// One consumption range of a slabbed tariff.
///
/// `upper_kwh` is the inclusive upper bound of the range; `None` marks the
/// final, unbounded slab. The fixed charge is slab-dependent: a bill whose
/// total lands in this slab pays this slab's fixed charge, not a global one.
#[derive(Debug, Clone, Copy)]
pub struct Slab {
    pub upper_kwh: Option<f64>,
    /// Marginal rate, currency per kWh, for units inside this range.
    pub rate: f64,
    pub fixed_charge: f64,
}

/// The active pricing policy.
#[derive(Debug, Clone)]
pub enum Tariff {
    Flat {
        name: String,
        fixed_charge: f64,
        per_unit_charge: f64,
    },
    Slabbed {
        name: String,
        slabs: Vec<Slab>,
    },
}

/// Cost breakdown for a consumption quantity.
///
/// `marginal_rate` is the rate applied to the last unit consumed, not a
/// blended average.
#[derive(Debug, Clone, Copy)]
pub struct CostBreakdown {
    pub variable_charge: f64,
    pub fixed_charge: f64,
    pub total: f64,
    pub marginal_rate: f64,
}

#[derive(thiserror::Error, Debug)]
pub enum TariffError {
    #[error("consumption must be a non-negative finite number, got {0}")]
    InvalidUnits(f64),
    #[error("malformed slabbed tariff: {0}")]
    Malformed(&'static str),
}

impl Tariff {
    /// BESCOM LT2A domestic tariff, the canonical slabbed policy.
    pub fn bescom_lt2a() -> Self {
        Tariff::Slabbed {
            name: "BESCOM LT2A".to_string(),
            slabs: vec![
                Slab { upper_kwh: Some(50.0), rate: 4.15, fixed_charge: 60.0 },
                Slab { upper_kwh: Some(100.0), rate: 5.60, fixed_charge: 80.0 },
                Slab { upper_kwh: Some(200.0), rate: 7.15, fixed_charge: 100.0 },
                Slab { upper_kwh: None, rate: 8.20, fixed_charge: 120.0 },
            ],
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Tariff::Flat { name, .. } => name,
            Tariff::Slabbed { name, .. } => name,
        }
    }

    /// Evaluate the cost of `units` kWh under this tariff.
    ///
    /// Slabbed variant: every slab strictly below the containing one
    /// contributes its full width at its own rate; the containing slab
    /// contributes the partial width, and its fixed charge applies. At
    /// `units == 0` the first slab contains the total, so the base fixed
    /// charge is still billed.
    ///
    /// Arithmetic stays at full `f64` precision; rounding for presentation
    /// is the caller's concern.
    pub fn cost_of(&self, units: f64) -> Result<CostBreakdown, TariffError> {
        if !units.is_finite() || units < 0.0 {
            return Err(TariffError::InvalidUnits(units));
        }

        match self {
            Tariff::Flat { fixed_charge, per_unit_charge, .. } => {
                let variable_charge = units * per_unit_charge;
                Ok(CostBreakdown {
                    variable_charge,
                    fixed_charge: *fixed_charge,
                    total: fixed_charge + variable_charge,
                    marginal_rate: *per_unit_charge,
                })
            }
            Tariff::Slabbed { slabs, .. } => {
                let mut variable_charge = 0.0;
                let mut lower = 0.0;

                for slab in slabs {
                    match slab.upper_kwh {
                        Some(upper) if upper <= lower => {
                            return Err(TariffError::Malformed(
                                "slab upper bounds must be strictly increasing",
                            ));
                        }
                        Some(upper) if units > upper => {
                            variable_charge += (upper - lower) * slab.rate;
                            lower = upper;
                        }
                        // Containing slab: units fall within (lower, upper],
                        // or this is the final unbounded slab.
                        _ => {
                            variable_charge += (units - lower) * slab.rate;
                            return Ok(CostBreakdown {
                                variable_charge,
                                fixed_charge: slab.fixed_charge,
                                total: variable_charge + slab.fixed_charge,
                                marginal_rate: slab.rate,
                            });
                        }
                    }
                }

                Err(TariffError::Malformed("last slab must be unbounded"))
            }
        }
    }
}
