// src/models/lifecycle.rs
//
// Transition rules for a RideRequest. Every method validates before it
// writes, so a failed call leaves the ride untouched.
use chrono::{DateTime, Utc};

use crate::errors::{RideError, RideResult};
use crate::models::money::Money;
use crate::models::ride::{RideRequest, RideStatus, SplitFare, MAX_FARE};

impl RideStatus {
    pub const fn is_terminal(&self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    /// Valid transitions:
    /// - Pending -> Accepted
    /// - Accepted -> InProgress
    /// - InProgress -> Completed
    /// - any non-terminal -> Cancelled
    pub const fn can_transition_to(&self, target: RideStatus) -> bool {
        matches!(
            (self, target),
            (RideStatus::Pending, RideStatus::Accepted)
                | (RideStatus::Accepted, RideStatus::InProgress)
                | (RideStatus::InProgress, RideStatus::Completed)
                | (
                    RideStatus::Pending | RideStatus::Accepted | RideStatus::InProgress,
                    RideStatus::Cancelled
                )
        )
    }

    pub const ALL: [RideStatus; 5] = [
        RideStatus::Pending,
        RideStatus::Accepted,
        RideStatus::InProgress,
        RideStatus::Completed,
        RideStatus::Cancelled,
    ];
}

impl SplitFare {
    pub fn new(requester_id: &str, total_participants: u8, price: Money) -> Self {
        let mut split = Self {
            enabled: true,
            total_participants,
            participants: vec![requester_id.to_string()],
            is_open: true,
            shares: Vec::new(),
        };
        split.reallocate(price);
        split
    }

    /// Seats the price is divided over: the declared total while collecting,
    /// the participants actually present once closed.
    pub fn allocated_seats(&self) -> usize {
        if self.is_open {
            self.total_participants as usize
        } else {
            self.participants.len().max(1)
        }
    }

    pub fn reallocate(&mut self, price: Money) {
        self.shares = price.split_evenly(self.allocated_seats());
    }

    pub fn is_full(&self) -> bool {
        self.participants.len() >= self.total_participants as usize
    }
}

impl RideRequest {
    /// The driver bound to the ride, or the one it held before cancellation.
    pub fn driver_of_record(&self) -> Option<&str> {
        self.assigned_driver.as_deref().or(self.cancelled_driver.as_deref())
    }

    fn touch(&mut self, now: DateTime<Utc>) {
        self.updated_at = now;
    }

    fn ensure_transition(&self, target: RideStatus) -> RideResult<()> {
        if self.status.can_transition_to(target) {
            Ok(())
        } else {
            Err(RideError::InvalidStateTransition {
                from: self.status,
                to: target,
            })
        }
    }

    /// Binds a driver and moves the ride from pending to accepted.
    pub fn assign_driver(&mut self, driver_id: &str, now: DateTime<Utc>) -> RideResult<()> {
        if self.status != RideStatus::Pending || self.assigned_driver.is_some() {
            return Err(RideError::RequestNotPending(self.status));
        }

        self.assigned_driver = Some(driver_id.to_string());
        self.status = RideStatus::Accepted;
        self.accepted_at = Some(now);
        if let Some(split) = self.split_fare.as_mut() {
            split.is_open = false;
            split.reallocate(self.estimated_price);
        }
        self.touch(now);
        Ok(())
    }

    /// Applies a status update coming from outside the dispatch workflow.
    ///
    /// Pending -> Accepted is rejected here: a driver can only be bound
    /// through [`RideRequest::assign_driver`].
    pub fn apply_status(
        &mut self,
        target: RideStatus,
        actual_price: Option<Money>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> RideResult<()> {
        self.ensure_transition(target)?;

        match target {
            RideStatus::Accepted | RideStatus::Pending => {
                return Err(RideError::InvalidStateTransition {
                    from: self.status,
                    to: target,
                });
            }
            RideStatus::InProgress => {
                self.started_at = Some(now);
            }
            RideStatus::Completed => {
                let price = actual_price.unwrap_or(self.estimated_price);
                if price.is_negative() {
                    return Err(RideError::validation_error("actual_price", "must not be negative"));
                }
                if price > MAX_FARE {
                    return Err(RideError::validation_error(
                        "actual_price",
                        format!("must not exceed {}", MAX_FARE),
                    ));
                }
                self.actual_price = Some(price);
                self.completed_at = Some(now);
            }
            RideStatus::Cancelled => {
                self.cancelled_at = Some(now);
                self.cancellation_reason = reason;
                self.cancelled_driver = self.assigned_driver.take();
                if let Some(split) = self.split_fare.as_mut() {
                    split.is_open = false;
                }
            }
        }

        self.status = target;
        self.touch(now);
        Ok(())
    }

    /// Records the requester's rating. Allowed once, after completion.
    pub fn rate(
        &mut self,
        rater_id: &str,
        rating: u8,
        feedback: Option<String>,
        now: DateTime<Utc>,
    ) -> RideResult<()> {
        if self.requester_id != rater_id {
            return Err(RideError::forbidden("only the requester can rate this ride"));
        }
        if self.status != RideStatus::Completed {
            return Err(RideError::NotCompleted(self.status));
        }
        if self.rating.is_some() {
            return Err(RideError::AlreadyRated);
        }
        if !(1..=5).contains(&rating) {
            return Err(RideError::validation_error("rating", "must be between 1 and 5"));
        }

        self.rating = Some(rating);
        self.feedback = feedback.filter(|text| !text.trim().is_empty());
        self.rated_at = Some(now);
        self.touch(now);
        Ok(())
    }

    /// Operator sign-off for advanced bookings. Status is left unchanged.
    pub fn confirm(&mut self, notes: Option<String>, now: DateTime<Utc>) -> RideResult<()> {
        if self.status.is_terminal() {
            return Err(RideError::RideClosed(self.status));
        }

        self.is_confirmed = true;
        self.confirmation_notes = notes;
        self.confirmed_at = Some(now);
        self.touch(now);
        Ok(())
    }

    pub fn join_split_fare(&mut self, participant_id: &str, now: DateTime<Utc>) -> RideResult<()> {
        if self.status != RideStatus::Pending {
            return Err(RideError::RequestNotPending(self.status));
        }
        let price = self.estimated_price;
        let split = self
            .split_fare
            .as_mut()
            .filter(|split| split.enabled)
            .ok_or_else(|| RideError::bad_request("ride does not use split fare"))?;

        if !split.is_open || split.is_full() {
            return Err(RideError::SplitFareClosed);
        }
        if split.participants.iter().any(|p| p == participant_id) {
            return Err(RideError::conflict("already a participant of this ride"));
        }

        split.participants.push(participant_id.to_string());
        if split.is_full() {
            split.is_open = false;
        }
        split.reallocate(price);
        self.touch(now);
        Ok(())
    }

    pub fn close_split_fare(&mut self, now: DateTime<Utc>) -> RideResult<()> {
        if self.status.is_terminal() {
            return Err(RideError::RideClosed(self.status));
        }
        let price = self.estimated_price;
        let split = self
            .split_fare
            .as_mut()
            .filter(|split| split.enabled)
            .ok_or_else(|| RideError::bad_request("ride does not use split fare"))?;

        if !split.is_open {
            return Err(RideError::SplitFareClosed);
        }
        split.is_open = false;
        split.reallocate(price);
        self.touch(now);
        Ok(())
    }
}
