// src/services/route_matcher.rs
use chrono::{DateTime, FixedOffset, NaiveDate, Offset, Utc};

use crate::errors::{RideError, RideResult};
use crate::models::ride::{Location, MatchGroups, RideMatch, RideRequest};
use crate::services::geo_service::distance_m;

pub const DEFAULT_MATCH_RADIUS_M: f64 = 500.0;
const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Clone)]
pub struct MatchConfig {
    /// Both pickup and dropoff must lie within this distance.
    pub radius_m: f64,
    /// Offset used to decide which calendar day a ride falls on.
    pub utc_offset_minutes: i32,
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self {
            radius_m: DEFAULT_MATCH_RADIUS_M,
            utc_offset_minutes: 0,
        }
    }
}

impl MatchConfig {
    pub fn validate(&self) -> RideResult<()> {
        if !self.radius_m.is_finite() || self.radius_m <= 0.0 {
            return Err(RideError::InvalidConfiguration {
                variable: "MATCH_RADIUS_M".to_string(),
                reason: "must be a positive number of metres".to_string(),
            });
        }
        if self.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(RideError::InvalidConfiguration {
                variable: "MATCH_UTC_OFFSET_MINUTES".to_string(),
                reason: "must be within +/- 14 hours".to_string(),
            });
        }
        Ok(())
    }
}

pub struct RouteMatcher {
    radius_m: f64,
    offset: FixedOffset,
}

impl RouteMatcher {
    pub fn new(config: &MatchConfig) -> Self {
        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Self {
            radius_m: config.radius_m,
            offset,
        }
    }

    pub fn radius_m(&self) -> f64 {
        self.radius_m
    }

    /// Calendar day of a timestamp in the configured offset.
    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.offset).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_date(Utc::now())
    }

    fn offsets(&self, ride: &RideRequest, pickup: &Location, dropoff: &Location) -> Option<(f64, f64)> {
        let pickup_offset = distance_m(pickup, &ride.pickup);
        if pickup_offset > self.radius_m {
            return None;
        }
        let dropoff_offset = distance_m(dropoff, &ride.dropoff);
        if dropoff_offset > self.radius_m {
            return None;
        }
        Some((pickup_offset, dropoff_offset))
    }

    /// Pending or accepted rides whose pickup and dropoff are both close to the
    /// given ones. With a `date`, only rides on that calendar day are kept.
    /// Groups are keyed by day and ordered by scheduled time. No match is an
    /// empty grouping.
    pub fn find_matches<'a, I>(
        &self,
        pickup: &Location,
        dropoff: &Location,
        date: Option<NaiveDate>,
        rides: I,
        exclude_id: Option<&str>,
    ) -> MatchGroups
    where
        I: IntoIterator<Item = &'a RideRequest>,
    {
        let mut groups = MatchGroups::default();

        for ride in rides {
            if !ride.is_matchable() || exclude_id == Some(ride.id.as_str()) {
                continue;
            }
            let day = self.local_date(ride.scheduled_time);
            if date.is_some_and(|wanted| wanted != day) {
                continue;
            }
            let Some((pickup_offset, dropoff_offset)) = self.offsets(ride, pickup, dropoff) else {
                continue;
            };

            groups
                .groups
                .entry(MatchGroups::date_key(day))
                .or_default()
                .push(ride.to_match(pickup_offset, dropoff_offset));
        }

        for matches in groups.groups.values_mut() {
            matches.sort_by_key(|m| m.scheduled_time);
        }
        groups
    }

    /// Shared rides that could merge with `request`, capped so the request
    /// plus merged riders stays within its passenger limit.
    pub fn sharing_candidates<'a, I>(&self, request: &RideRequest, rides: I) -> Vec<RideMatch>
    where
        I: IntoIterator<Item = &'a RideRequest>,
    {
        if !request.is_shared_ride {
            return Vec::new();
        }
        let capacity = usize::from(request.max_shared_passengers).saturating_sub(1);
        let day = self.local_date(request.scheduled_time);

        self.find_matches(
            &request.pickup,
            &request.dropoff,
            Some(day),
            rides,
            Some(request.id.as_str()),
        )
        .into_date(day)
        .into_iter()
        .filter(|candidate| candidate.is_shared_ride)
        .take(capacity)
        .collect()
    }
}
