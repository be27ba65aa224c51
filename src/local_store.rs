use crate::{
    backend::BookingBackend,
    booking::{
        charged_visits, check_booking, check_cancellation, check_trainer, normalize_message,
        refunded_visits, summarize_trainees, validate_new_slot, validate_visits,
    },
    error::BookingError,
    types::{Booking, BookingStatus, ChatMessage, NewTimeSlot, Role, TimeSlot, TraineeSummary, User},
};
use chrono::{NaiveDate, Utc};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::sync::watch::{self, Sender};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    slots: HashMap<Uuid, TimeSlot>,
    bookings: HashMap<Uuid, Booking>,
    messages: Vec<ChatMessage>,
}

/// In-memory store. A single lock guards every table, so each operation
/// observes and mutates a consistent snapshot.
#[derive(Debug, Clone)]
pub struct LocalStore {
    tables: Arc<Mutex<Tables>>,
    sender: Sender<Vec<TimeSlot>>,
}

impl LocalStore {
    pub fn default() -> LocalStore {
        let (sender, _) = watch::channel(vec![]);
        Self {
            tables: Arc::new(Mutex::default()),
            sender,
        }
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, BookingError> {
        self.tables.lock().map_err(|err| {
            error!(%err, "Store lock poisoned");
            BookingError::Storage("store lock poisoned".into())
        })
    }

    fn send_timeslots(&self) {
        match self.time_slots() {
            Ok(timeslots) => {
                if let Err(err) = self.sender.send(timeslots) {
                    // No subscribers yet
                    debug!(?err, "Nobody listens to slot updates");
                }
            }
            Err(err) => error!(?err, "Failed to send current timeslots"),
        }
    }
}

fn sort_slots(slots: &mut [TimeSlot]) {
    slots.sort_unstable_by(|a, b| (a.date, a.start_time, a.id).cmp(&(b.date, b.start_time, b.id)));
}

impl BookingBackend for LocalStore {
    fn add_user(
        &self,
        name: &str,
        email: &str,
        role: Role,
        remaining_visits: i32,
    ) -> Result<User, BookingError> {
        validate_visits(remaining_visits)?;
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: email.into(),
            role,
            remaining_visits: match role {
                Role::Trainer => 0,
                Role::Trainee => remaining_visits,
            },
        };
        let mut tables = self.tables()?;
        let lowercase = name.to_lowercase();
        if tables
            .users
            .values()
            .any(|existing| existing.name.to_lowercase() == lowercase)
        {
            warn!(name, "User name already taken");
            return Err(BookingError::NameTaken(name.into()));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn users(&self) -> Result<Vec<User>, BookingError> {
        let mut users: Vec<User> = self.tables()?.users.values().cloned().collect();
        users.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(users)
    }

    fn user(&self, id: Uuid) -> Result<User, BookingError> {
        self.tables()?
            .users
            .get(&id)
            .cloned()
            .ok_or(BookingError::UserNotFound(id))
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>, BookingError> {
        let name = name.to_lowercase();
        Ok(self
            .tables()?
            .users
            .values()
            .find(|user| user.name.to_lowercase() == name)
            .cloned())
    }

    fn set_remaining_visits(
        &self,
        trainer_id: Uuid,
        user_id: Uuid,
        visits: i32,
    ) -> Result<User, BookingError> {
        validate_visits(visits)?;
        let mut tables = self.tables()?;
        let trainer = tables
            .users
            .get(&trainer_id)
            .ok_or(BookingError::UserNotFound(trainer_id))?;
        check_trainer(trainer)?;

        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or(BookingError::UserNotFound(user_id))?;
        if user.role != Role::Trainee {
            return Err(BookingError::NotTrainee);
        }
        user.remaining_visits = visits;
        info!(%trainer_id, %user_id, visits, "Updated remaining visits");
        Ok(user.clone())
    }

    fn trainee_roster(
        &self,
        trainer_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<TraineeSummary>, BookingError> {
        let tables = self.tables()?;
        let active_bookings: Vec<(Uuid, NaiveDate)> = tables
            .bookings
            .values()
            .filter(|booking| booking.is_active())
            .filter_map(|booking| {
                let slot = tables.slots.get(&booking.slot_id)?;
                (slot.trainer_id == trainer_id).then_some((booking.user_id, slot.date))
            })
            .collect();
        let users = tables.users.values().cloned().collect();
        Ok(summarize_trainees(users, &active_bookings, today))
    }

    fn time_slots(&self) -> Result<Vec<TimeSlot>, BookingError> {
        let mut timeslots: Vec<TimeSlot> = self.tables()?.slots.values().cloned().collect();
        sort_slots(&mut timeslots);
        Ok(timeslots)
    }

    fn time_slots_of_trainer(&self, trainer_id: Uuid) -> Result<Vec<TimeSlot>, BookingError> {
        let mut timeslots: Vec<TimeSlot> = self
            .tables()?
            .slots
            .values()
            .filter(|slot| slot.trainer_id == trainer_id)
            .cloned()
            .collect();
        sort_slots(&mut timeslots);
        Ok(timeslots)
    }

    fn time_slot(&self, id: Uuid) -> Result<TimeSlot, BookingError> {
        self.tables()?
            .slots
            .get(&id)
            .cloned()
            .ok_or(BookingError::SlotNotFound(id))
    }

    fn add_time_slot(
        &self,
        trainer_id: Uuid,
        new_slot: NewTimeSlot,
    ) -> Result<TimeSlot, BookingError> {
        validate_new_slot(&new_slot)?;
        let slot = {
            let mut tables = self.tables()?;
            let trainer = tables
                .users
                .get(&trainer_id)
                .ok_or(BookingError::UserNotFound(trainer_id))?;
            check_trainer(trainer)?;

            let slot = TimeSlot {
                id: Uuid::new_v4(),
                trainer_id,
                trainer_name: trainer.name.clone(),
                date: new_slot.date,
                start_time: new_slot.start_time,
                end_time: new_slot.end_time,
                max_capacity: new_slot.max_capacity,
                current_bookings: 0,
                booked_by_ids: vec![],
                description: new_slot.description,
            };
            tables.slots.insert(slot.id, slot.clone());
            slot
        };
        info!(slot_id = %slot.id, %trainer_id, "Added timeslot");
        self.send_timeslots();
        Ok(slot)
    }

    fn remove_time_slot(&self, trainer_id: Uuid, slot_id: Uuid) -> Result<(), BookingError> {
        {
            let mut tables = self.tables()?;
            let slot = tables
                .slots
                .get(&slot_id)
                .ok_or(BookingError::SlotNotFound(slot_id))?;
            if slot.trainer_id != trainer_id {
                warn!(%slot_id, %trainer_id, "Timeslot belongs to another trainer");
                return Err(BookingError::NotPermitted);
            }
            if slot.current_bookings > 0 {
                return Err(BookingError::SlotHasBookings);
            }
            tables.slots.remove(&slot_id);
            tables.bookings.retain(|_, booking| booking.slot_id != slot_id);
        }
        info!(%slot_id, "Removed timeslot");
        self.send_timeslots();
        Ok(())
    }

    fn time_slot_stream(&self) -> WatchStream<Vec<TimeSlot>> {
        let stream = WatchStream::new(self.sender.subscribe());
        self.send_timeslots();
        stream
    }

    fn attempt_booking(&self, user_id: Uuid, slot_id: Uuid) -> Result<Booking, BookingError> {
        let booking = {
            let mut tables = self.tables()?;
            let user = tables
                .users
                .get(&user_id)
                .ok_or(BookingError::UserNotFound(user_id))?;
            let slot = tables
                .slots
                .get(&slot_id)
                .ok_or(BookingError::SlotNotFound(slot_id))?;
            if let Err(err) = check_booking(user, slot) {
                warn!(%user_id, %slot_id, reason = err.reason(), "Booking rejected");
                return Err(err);
            }
            let visits = charged_visits(user)?;

            let booking = Booking {
                id: Uuid::new_v4(),
                user_id,
                slot_id,
                booked_at: Utc::now(),
                status: BookingStatus::Active,
            };
            if let Some(slot) = tables.slots.get_mut(&slot_id) {
                slot.current_bookings += 1;
                slot.booked_by_ids.push(user_id);
            }
            if let Some(user) = tables.users.get_mut(&user_id) {
                user.remaining_visits = visits;
            }
            tables.bookings.insert(booking.id, booking.clone());
            booking
        };
        info!(booking_id = %booking.id, %user_id, %slot_id, "Timeslot booked");
        self.send_timeslots();
        Ok(booking)
    }

    fn cancel_booking(
        &self,
        requester_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        let booking = {
            let mut tables = self.tables()?;
            let booking = tables
                .bookings
                .get(&booking_id)
                .ok_or(BookingError::BookingNotFound(booking_id))?;
            let requester = tables
                .users
                .get(&requester_id)
                .ok_or(BookingError::UserNotFound(requester_id))?;
            let slot = tables
                .slots
                .get(&booking.slot_id)
                .ok_or(BookingError::SlotNotFound(booking.slot_id))?;
            if let Err(err) = check_cancellation(booking, requester, slot) {
                warn!(%booking_id, %requester_id, reason = err.reason(), "Cancellation rejected");
                return Err(err);
            }

            let (user_id, slot_id) = (booking.user_id, booking.slot_id);
            let visits = tables
                .users
                .get(&user_id)
                .ok_or(BookingError::UserNotFound(user_id))
                .and_then(refunded_visits)?;
            if let Some(slot) = tables.slots.get_mut(&slot_id) {
                slot.current_bookings -= 1;
                slot.booked_by_ids.retain(|id| *id != user_id);
            }
            if let Some(user) = tables.users.get_mut(&user_id) {
                user.remaining_visits = visits;
            }
            let booking = tables
                .bookings
                .get_mut(&booking_id)
                .ok_or(BookingError::BookingNotFound(booking_id))?;
            booking.status = BookingStatus::Cancelled;
            booking.clone()
        };
        info!(%booking_id, user_id = %booking.user_id, "Booking cancelled");
        self.send_timeslots();
        Ok(booking)
    }

    fn bookings_of_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        let mut bookings: Vec<Booking> = self
            .tables()?
            .bookings
            .values()
            .filter(|booking| booking.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|booking| booking.booked_at);
        Ok(bookings)
    }

    fn bookings_of_user_for_slot(
        &self,
        user_id: Uuid,
        slot_id: Uuid,
    ) -> Result<Vec<Booking>, BookingError> {
        Ok(self
            .bookings_of_user(user_id)?
            .into_iter()
            .filter(|booking| booking.slot_id == slot_id)
            .collect())
    }

    fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage, BookingError> {
        let text = normalize_message(text)?;
        let mut tables = self.tables()?;
        let sender = tables
            .users
            .get(&sender_id)
            .ok_or(BookingError::UserNotFound(sender_id))?;
        if !tables.users.contains_key(&receiver_id) {
            return Err(BookingError::UserNotFound(receiver_id));
        }

        let message = ChatMessage {
            id: Uuid::new_v4(),
            sender_id,
            sender_name: sender.name.clone(),
            receiver_id,
            text,
            timestamp: Utc::now(),
        };
        tables.messages.push(message.clone());
        Ok(message)
    }

    fn chat_messages(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<ChatMessage>, BookingError> {
        let mut messages: Vec<ChatMessage> = self
            .tables()?
            .messages
            .iter()
            .filter(|message| {
                (message.sender_id == user_a && message.receiver_id == user_b)
                    || (message.sender_id == user_b && message.receiver_id == user_a)
            })
            .cloned()
            .collect();
        messages.sort_by_key(|message| message.timestamp);
        Ok(messages)
    }
}
