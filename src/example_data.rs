use crate::{
    backend::BookingBackend,
    error::BookingError,
    types::{NewTimeSlot, Role},
};
use chrono::{NaiveDate, NaiveTime};
use tracing::info;

/// Loads the demo community: two trainers, three trainees, four slots with
/// a few bookings and a short conversation.
pub fn insert_example_data<T: BookingBackend>(backend: &T) -> Result<(), BookingError> {
    let john = backend.add_user("John Doe", "john@example.com", Role::Trainee, 5)?;
    let sarah = backend.add_user("Sarah Johnson", "sarah@example.com", Role::Trainer, 0)?;
    let mike = backend.add_user("Mike Wilson", "mike@example.com", Role::Trainer, 0)?;
    let emma = backend.add_user("Emma Davis", "emma@example.com", Role::Trainee, 8)?;
    let alex = backend.add_user("Alex Thompson", "alex@example.com", Role::Trainee, 3)?;

    let slots = [
        (&sarah, (2025, 7, 24), (9, 10), 4, "High-intensity interval training session"),
        (&sarah, (2025, 7, 24), (11, 12), 3, "Strength training focused on upper body"),
        (&mike, (2025, 7, 25), (8, 9), 5, "Morning cardio and flexibility training"),
        (&mike, (2025, 7, 26), (10, 11), 4, "Core strengthening and balance training"),
    ];
    let mut slot_ids = vec![];
    for (trainer, (year, month, day), (start, end), max_capacity, description) in slots {
        let (Some(date), Some(start_time), Some(end_time)) = (
            NaiveDate::from_ymd_opt(year, month, day),
            NaiveTime::from_hms_opt(start, 0, 0),
            NaiveTime::from_hms_opt(end, 0, 0),
        ) else {
            return Err(BookingError::InvalidSlot("invalid example date".into()));
        };
        let slot = backend.add_time_slot(
            trainer.id,
            NewTimeSlot {
                date,
                start_time,
                end_time,
                max_capacity,
                description: Some(description.into()),
            },
        )?;
        slot_ids.push(slot.id);
    }

    for (user, slot_index) in [(&emma, 0), (&alex, 0), (&emma, 1), (&john, 2), (&alex, 2)] {
        backend.attempt_booking(user.id, slot_ids[slot_index])?;
    }

    backend.send_message(
        sarah.id,
        emma.id,
        "Hi Emma! Looking forward to our training session tomorrow.",
    )?;
    backend.send_message(
        emma.id,
        sarah.id,
        "Hi Sarah! Me too! Should I bring anything specific?",
    )?;
    backend.send_message(
        sarah.id,
        emma.id,
        "Just bring a water bottle and a towel. We'll focus on upper body strength training.",
    )?;

    info!("Inserted example data");
    Ok(())
}
