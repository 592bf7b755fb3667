// src/services/fare_service.rs
use crate::errors::{RideError, RideResult};
use crate::models::money::Money;
use crate::models::ride::{BookingDetails, BookingType, FareQuote};

/// Pricing curve. Read-only after start-up.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    pub base_fare: Money,
    pub per_km: Money,
    pub minimum_fare: Money,
    pub currency: String,
    pub semester_move_multiplier: f64,
    pub holiday_multiplier: f64,
    /// Added to the group multiplier for every passenger after the first.
    pub group_extra_passenger_multiplier: f64,
    pub furniture_item_fee: Money,
    pub free_luggage_items: u32,
    pub extra_luggage_fee: Money,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fare: Money::from_cents(15_00),
            per_km: Money::from_cents(7_50),
            minimum_fare: Money::from_cents(30_00),
            currency: "ZAR".to_string(),
            semester_move_multiplier: 1.5,
            holiday_multiplier: 1.25,
            group_extra_passenger_multiplier: 0.2,
            furniture_item_fee: Money::from_cents(25_00),
            free_luggage_items: 2,
            extra_luggage_fee: Money::from_cents(5_00),
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> RideResult<()> {
        let amounts = [
            ("FARE_BASE", self.base_fare),
            ("FARE_PER_KM", self.per_km),
            ("FARE_MINIMUM", self.minimum_fare),
            ("FARE_FURNITURE_ITEM", self.furniture_item_fee),
            ("FARE_EXTRA_LUGGAGE", self.extra_luggage_fee),
        ];
        for (variable, amount) in amounts {
            if amount.is_negative() {
                return Err(RideError::InvalidConfiguration {
                    variable: variable.to_string(),
                    reason: "must not be negative".to_string(),
                });
            }
        }

        let multipliers = [
            self.semester_move_multiplier,
            self.holiday_multiplier,
            self.group_extra_passenger_multiplier,
        ];
        if multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(RideError::InvalidConfiguration {
                variable: "pricing multipliers".to_string(),
                reason: "must be finite and non-negative".to_string(),
            });
        }

        if self.currency.trim().is_empty() {
            return Err(RideError::InvalidConfiguration {
                variable: "FARE_CURRENCY".to_string(),
                reason: "cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

pub struct FareCalculator {
    config: PricingConfig,
}

impl FareCalculator {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn booking_multiplier(&self, booking_type: BookingType, details: &BookingDetails) -> f64 {
        match booking_type {
            BookingType::Regular => 1.0,
            BookingType::SemesterMoveIn | BookingType::SemesterMoveOut => self.config.semester_move_multiplier,
            BookingType::HolidayTransport => self.config.holiday_multiplier,
            BookingType::GroupBooking => {
                let extra = details.group_size.unwrap_or(1).saturating_sub(1);
                1.0 + self.config.group_extra_passenger_multiplier * f64::from(extra)
            }
        }
    }

    fn surcharges(&self, details: &BookingDetails) -> Money {
        let furniture = self.config.furniture_item_fee.cents() * details.furniture_items.len() as i64;
        let extra_luggage = details
            .luggage_count
            .unwrap_or(0)
            .saturating_sub(self.config.free_luggage_items);
        let luggage = self.config.extra_luggage_fee.cents() * i64::from(extra_luggage);
        Money::from_cents(furniture + luggage)
    }

    /// Deterministic, never negative, non-decreasing in distance. A zero
    /// distance with no surcharges costs exactly the minimum fare.
    pub fn quote(&self, distance_km: f64, booking_type: BookingType, details: &BookingDetails) -> FareQuote {
        let distance_km = if distance_km.is_finite() { distance_km.max(0.0) } else { 0.0 };

        let base_fare = self.config.base_fare;
        let distance_fare = Money::from_cents((self.config.per_km.cents() as f64 * distance_km).round() as i64);
        let booking_multiplier = self.booking_multiplier(booking_type, details);
        let trip = Money::from_cents(((base_fare + distance_fare).cents() as f64 * booking_multiplier).round() as i64);

        let minimum_applied = trip < self.config.minimum_fare;
        let trip = trip.max(self.config.minimum_fare);
        let surcharges = self.surcharges(details);

        FareQuote {
            base_fare,
            distance_fare,
            booking_multiplier,
            surcharges,
            minimum_applied,
            total: (trip + surcharges).max(Money::ZERO),
            currency: self.config.currency.clone(),
        }
    }

    pub fn price(&self, distance_km: f64, booking_type: BookingType, details: &BookingDetails) -> Money {
        self.quote(distance_km, booking_type, details).total
    }

    /// Per-participant shares that add up to `price` exactly.
    pub fn split(&self, price: Money, participants: usize) -> Vec<Money> {
        price.split_evenly(participants)
    }
}
