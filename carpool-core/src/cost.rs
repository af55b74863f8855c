//! Fare model for shared rides.
//!
//! Fares are expressed in minor currency units (e.g. cents). The total is
//! `base + per_km * km + per_minute * minutes`, discounted by five percent
//! for every passenger beyond the first and floored at eighty percent.

use crate::geometry::travel_minutes;

/// Average speed assumed for dense urban traffic.
pub const DEFAULT_AVERAGE_SPEED_KMH: f64 = 25.0;

/// Tunable fare and speed constants.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CostModel {
    /// Flat amount charged per ride.
    pub base_fare: f64,
    /// Amount charged per kilometre.
    pub per_km_rate: f64,
    /// Amount charged per minute.
    pub per_minute_rate: f64,
    /// Average speed used when no provider supplies durations.
    pub average_speed_kmh: f64,
    /// Discount per additional passenger.
    pub discount_per_passenger: f64,
    /// Lowest multiplier the discount may reach.
    pub min_discount_factor: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            base_fare: 250.0,
            per_km_rate: 150.0,
            per_minute_rate: 25.0,
            average_speed_kmh: DEFAULT_AVERAGE_SPEED_KMH,
            discount_per_passenger: 0.05,
            min_discount_factor: 0.8,
        }
    }
}

/// Total and per-person fare for one ride.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FareQuote {
    /// Discounted total for the whole vehicle.
    pub total_cost: f64,
    /// Rounded share paid by each passenger.
    pub cost_per_person: u64,
}

impl CostModel {
    /// Override the average speed.
    #[must_use]
    pub const fn with_average_speed(mut self, speed_kmh: f64) -> Self {
        self.average_speed_kmh = speed_kmh;
        self
    }

    /// Minutes needed to drive `distance_km` at the configured speed.
    pub fn duration_minutes(&self, distance_km: f64) -> f64 {
        travel_minutes(distance_km, self.average_speed_kmh)
    }

    /// Multiplier applied for `passengers` sharing the vehicle.
    ///
    /// # Examples
    /// ```
    /// use carpool_core::CostModel;
    ///
    /// let model = CostModel::default();
    /// assert!((model.discount_factor(1) - 1.0).abs() < 1e-9);
    /// assert!((model.discount_factor(3) - 0.9).abs() < 1e-9);
    /// assert!((model.discount_factor(10) - 0.8).abs() < 1e-9);
    /// ```
    #[expect(clippy::float_arithmetic, reason = "discount is a fractional multiplier")]
    pub fn discount_factor(&self, passengers: usize) -> f64 {
        let extra = u32::try_from(passengers.saturating_sub(1)).unwrap_or(u32::MAX);
        (1.0 - self.discount_per_passenger * f64::from(extra)).max(self.min_discount_factor)
    }

    /// Price a ride of `distance_km` lasting `duration_minutes`.
    ///
    /// `passengers` counts everyone in the vehicle; zero is treated as one.
    #[expect(clippy::float_arithmetic, reason = "fares are fractional amounts")]
    pub fn quote(&self, distance_km: f64, duration_minutes: f64, passengers: usize) -> FareQuote {
        let passengers = passengers.max(1);
        let gross = self.base_fare
            + self.per_km_rate * distance_km
            + self.per_minute_rate * duration_minutes;
        let total_cost = gross * self.discount_factor(passengers);
        let share = total_cost / f64::from(u32::try_from(passengers).unwrap_or(u32::MAX));
        FareQuote {
            total_cost,
            cost_per_person: round_to_units(share),
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "value is rounded, finite and clamped to be non-negative"
)]
fn round_to_units(value: f64) -> u64 {
    if !value.is_finite() || value <= 0.0 {
        return 0;
    }
    value.round() as u64
}
