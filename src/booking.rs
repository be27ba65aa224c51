//! Rules deciding whether a booking may be created or cancelled.
//!
//! These functions only inspect state. Backends call them while holding
//! their serialization point (store lock or row locks inside a transaction)
//! and apply the effects before releasing it.

use crate::{
    error::BookingError,
    types::{Booking, NewTimeSlot, Role, TimeSlot, TraineeSummary, User},
};
use chrono::NaiveDate;
use std::collections::HashMap;
use uuid::Uuid;

/// Upper bound for a balance set by a trainer or at registration.
pub const MAX_VISITS: i32 = 1000;

pub fn check_booking(user: &User, slot: &TimeSlot) -> Result<(), BookingError> {
    if user.role != Role::Trainee {
        return Err(BookingError::NotTrainee);
    }
    if user.remaining_visits <= 0 {
        return Err(BookingError::InsufficientVisits);
    }
    if slot.is_full() {
        return Err(BookingError::SlotFull);
    }
    if slot.is_booked_by(user.id) {
        return Err(BookingError::AlreadyBooked);
    }
    Ok(())
}

/// The booking's own user and the trainer owning the slot may cancel.
pub fn check_cancellation(
    booking: &Booking,
    requester: &User,
    slot: &TimeSlot,
) -> Result<(), BookingError> {
    if !booking.is_active() {
        return Err(BookingError::BookingNotActive);
    }
    if booking.user_id != requester.id && slot.trainer_id != requester.id {
        return Err(BookingError::NotPermitted);
    }
    Ok(())
}

pub fn validate_visits(visits: i32) -> Result<(), BookingError> {
    if !(0..=MAX_VISITS).contains(&visits) {
        return Err(BookingError::InvalidVisits(visits));
    }
    Ok(())
}

/// Balance after a booking took one visit.
pub fn charged_visits(user: &User) -> Result<i32, BookingError> {
    user.remaining_visits
        .checked_sub(1)
        .filter(|visits| *visits >= 0)
        .ok_or(BookingError::InsufficientVisits)
}

/// Balance after a cancellation returned one visit.
pub fn refunded_visits(user: &User) -> Result<i32, BookingError> {
    user.remaining_visits
        .checked_add(1)
        .ok_or(BookingError::InvalidVisits(user.remaining_visits))
}

/// Builds a trainer's roster from the active bookings on their slots, given
/// as `(trainee id, slot date)`. Slots dated `today` or later count as upcoming.
pub fn summarize_trainees(
    trainees: Vec<User>,
    active_bookings: &[(Uuid, NaiveDate)],
    today: NaiveDate,
) -> Vec<TraineeSummary> {
    let mut counts: HashMap<Uuid, (usize, usize)> = HashMap::new();
    for (user_id, date) in active_bookings {
        let (total, upcoming) = counts.entry(*user_id).or_default();
        *total += 1;
        if *date >= today {
            *upcoming += 1;
        }
    }

    let mut roster: Vec<TraineeSummary> = trainees
        .into_iter()
        .filter(|user| user.role == Role::Trainee)
        .filter_map(|user| {
            let (total_bookings, upcoming_bookings) = counts.get(&user.id).copied()?;
            Some(TraineeSummary {
                user,
                total_bookings,
                upcoming_bookings,
                completed_sessions: total_bookings - upcoming_bookings,
            })
        })
        .collect();
    roster.sort_by(|a, b| a.user.name.cmp(&b.user.name));
    roster
}

pub fn check_trainer(user: &User) -> Result<(), BookingError> {
    match user.role {
        Role::Trainer => Ok(()),
        Role::Trainee => Err(BookingError::NotTrainer),
    }
}

pub fn validate_new_slot(new_slot: &NewTimeSlot) -> Result<(), BookingError> {
    if new_slot.max_capacity < 1 {
        return Err(BookingError::InvalidSlot(
            "capacity must be at least one".into(),
        ));
    }
    if new_slot.end_time <= new_slot.start_time {
        return Err(BookingError::InvalidSlot(
            "end time must be after start time".into(),
        ));
    }
    Ok(())
}

/// Trims the text and rejects empty messages.
pub fn normalize_message(text: &str) -> Result<String, BookingError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(BookingError::InvalidMessage("message is empty".into()));
    }
    Ok(text.to_string())
}
