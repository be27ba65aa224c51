use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use chrono::{NaiveDate, Utc};
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

use crate::{
    backend::BookingBackend,
    error::BookingError,
    types::{
        Booking, BookingStatus, ChatMessage, NewTimeSlot, Role, TimeSlot, TraineeSummary, User,
    },
};

pub async fn read_from_timeslot_stream(
    timeslot_stream: &mut WatchStream<Vec<TimeSlot>>,
) -> Vec<TimeSlot> {
    tokio::time::timeout(Duration::from_secs(1), timeslot_stream.next())
        .await
        .expect("No timeslot update received")
        .expect("Timeslot stream closed")
}

pub struct MockBookingBackendInner {
    pub success: AtomicBool,
    pub calls_to_users: AtomicU64,
    pub calls_to_set_remaining_visits: AtomicU64,
    pub calls_to_trainee_roster: AtomicU64,
    pub calls_to_time_slots: AtomicU64,
    pub calls_to_time_slots_of_trainer: AtomicU64,
    pub calls_to_add_time_slot: AtomicU64,
    pub calls_to_remove_time_slot: AtomicU64,
    pub calls_to_attempt_booking: AtomicU64,
    pub calls_to_cancel_booking: AtomicU64,
    pub calls_to_bookings_of_user: AtomicU64,
    pub calls_to_send_message: AtomicU64,
    pub calls_to_chat_messages: AtomicU64,
    pub users: Mutex<HashMap<Uuid, User>>,
    pub timeslots: Mutex<Vec<TimeSlot>>,
    pub failure: Mutex<Option<BookingError>>,
    sender: watch::Sender<Vec<TimeSlot>>,
}

/// Counts calls and answers from canned data; `success` switches every
/// mutating call to a failure (`failure`, or a storage error by default).
#[derive(Clone)]
pub struct MockBookingBackend(pub Arc<MockBookingBackendInner>);

impl MockBookingBackendInner {
    fn new() -> Self {
        let (sender, _) = watch::channel(vec![]);
        Self {
            success: AtomicBool::new(true),
            calls_to_users: AtomicU64::default(),
            calls_to_set_remaining_visits: AtomicU64::default(),
            calls_to_trainee_roster: AtomicU64::default(),
            calls_to_time_slots: AtomicU64::default(),
            calls_to_time_slots_of_trainer: AtomicU64::default(),
            calls_to_add_time_slot: AtomicU64::default(),
            calls_to_remove_time_slot: AtomicU64::default(),
            calls_to_attempt_booking: AtomicU64::default(),
            calls_to_cancel_booking: AtomicU64::default(),
            calls_to_bookings_of_user: AtomicU64::default(),
            calls_to_send_message: AtomicU64::default(),
            calls_to_chat_messages: AtomicU64::default(),
            users: Mutex::default(),
            timeslots: Mutex::default(),
            failure: Mutex::default(),
            sender,
        }
    }
}

impl MockBookingBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockBookingBackendInner::new()))
    }

    pub fn insert_user(&self, name: &str, role: Role) -> User {
        let user = User {
            id: Uuid::new_v4(),
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            role,
            remaining_visits: 5,
        };
        self.0.users.lock().unwrap().insert(user.id, user.clone());
        user
    }

    pub fn fail_with(&self, err: BookingError) {
        *self.0.failure.lock().unwrap() = Some(err);
        self.0.success.store(false, Ordering::SeqCst);
    }

    fn result(&self) -> Result<(), BookingError> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(self
                .0
                .failure
                .lock()
                .unwrap()
                .clone()
                .unwrap_or(BookingError::Storage("Supposed to fail".into()))),
        }
    }

    fn count(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

fn example_slot(id: Uuid, trainer_id: Uuid) -> TimeSlot {
    TimeSlot {
        id,
        trainer_id,
        trainer_name: "Sarah Johnson".into(),
        date: Utc::now().date_naive(),
        start_time: chrono::NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        end_time: chrono::NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
        max_capacity: 4,
        current_bookings: 0,
        booked_by_ids: vec![],
        description: None,
    }
}

fn example_booking(id: Uuid, user_id: Uuid, slot_id: Uuid, status: BookingStatus) -> Booking {
    Booking {
        id,
        user_id,
        slot_id,
        booked_at: Utc::now(),
        status,
    }
}

impl BookingBackend for MockBookingBackend {
    fn add_user(
        &self,
        name: &str,
        email: &str,
        role: Role,
        remaining_visits: i32,
    ) -> Result<User, BookingError> {
        self.result()?;
        let mut user = self.insert_user(name, role);
        user.email = email.into();
        user.remaining_visits = remaining_visits;
        self.0.users.lock().unwrap().insert(user.id, user.clone());
        Ok(user)
    }

    fn users(&self) -> Result<Vec<User>, BookingError> {
        Self::count(&self.0.calls_to_users);
        Ok(self.0.users.lock().unwrap().values().cloned().collect())
    }

    fn user(&self, id: Uuid) -> Result<User, BookingError> {
        self.0
            .users
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or(BookingError::UserNotFound(id))
    }

    fn user_by_name(&self, name: &str) -> Result<Option<User>, BookingError> {
        let name = name.to_lowercase();
        Ok(self
            .0
            .users
            .lock()
            .unwrap()
            .values()
            .find(|user| user.name.to_lowercase() == name)
            .cloned())
    }

    fn set_remaining_visits(
        &self,
        _trainer_id: Uuid,
        user_id: Uuid,
        visits: i32,
    ) -> Result<User, BookingError> {
        Self::count(&self.0.calls_to_set_remaining_visits);
        self.result()?;
        let mut user = self.user(user_id)?;
        user.remaining_visits = visits;
        Ok(user)
    }

    fn trainee_roster(
        &self,
        _trainer_id: Uuid,
        _today: NaiveDate,
    ) -> Result<Vec<TraineeSummary>, BookingError> {
        Self::count(&self.0.calls_to_trainee_roster);
        self.result()?;
        Ok(self
            .0
            .users
            .lock()
            .unwrap()
            .values()
            .filter(|user| user.role == Role::Trainee)
            .map(|user| TraineeSummary {
                user: user.clone(),
                total_bookings: 1,
                upcoming_bookings: 1,
                completed_sessions: 0,
            })
            .collect())
    }

    fn time_slots(&self) -> Result<Vec<TimeSlot>, BookingError> {
        Self::count(&self.0.calls_to_time_slots);
        Ok(self.0.timeslots.lock().unwrap().clone())
    }

    fn time_slots_of_trainer(&self, trainer_id: Uuid) -> Result<Vec<TimeSlot>, BookingError> {
        Self::count(&self.0.calls_to_time_slots_of_trainer);
        Ok(self
            .0
            .timeslots
            .lock()
            .unwrap()
            .iter()
            .filter(|slot| slot.trainer_id == trainer_id)
            .cloned()
            .collect())
    }

    fn time_slot(&self, id: Uuid) -> Result<TimeSlot, BookingError> {
        Ok(self
            .0
            .timeslots
            .lock()
            .unwrap()
            .iter()
            .find(|slot| slot.id == id)
            .cloned()
            .unwrap_or_else(|| example_slot(id, Uuid::new_v4())))
    }

    fn add_time_slot(
        &self,
        trainer_id: Uuid,
        new_slot: NewTimeSlot,
    ) -> Result<TimeSlot, BookingError> {
        Self::count(&self.0.calls_to_add_time_slot);
        self.result()?;
        let mut slot = example_slot(Uuid::new_v4(), trainer_id);
        slot.date = new_slot.date;
        slot.max_capacity = new_slot.max_capacity;
        Ok(slot)
    }

    fn remove_time_slot(&self, _trainer_id: Uuid, _slot_id: Uuid) -> Result<(), BookingError> {
        Self::count(&self.0.calls_to_remove_time_slot);
        self.result()
    }

    fn time_slot_stream(&self) -> WatchStream<Vec<TimeSlot>> {
        let stream = WatchStream::new(self.0.sender.subscribe());
        let _ = self.0.sender.send(self.0.timeslots.lock().unwrap().clone());
        stream
    }

    fn attempt_booking(&self, user_id: Uuid, slot_id: Uuid) -> Result<Booking, BookingError> {
        Self::count(&self.0.calls_to_attempt_booking);
        self.result()?;
        Ok(example_booking(
            Uuid::new_v4(),
            user_id,
            slot_id,
            BookingStatus::Active,
        ))
    }

    fn cancel_booking(
        &self,
        requester_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Booking, BookingError> {
        Self::count(&self.0.calls_to_cancel_booking);
        self.result()?;
        Ok(example_booking(
            booking_id,
            requester_id,
            Uuid::new_v4(),
            BookingStatus::Cancelled,
        ))
    }

    fn bookings_of_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError> {
        Self::count(&self.0.calls_to_bookings_of_user);
        let slot_id = self
            .0
            .timeslots
            .lock()
            .unwrap()
            .first()
            .map(|slot| slot.id)
            .unwrap_or_else(Uuid::new_v4);
        Ok(vec![
            example_booking(Uuid::new_v4(), user_id, slot_id, BookingStatus::Cancelled),
            example_booking(Uuid::new_v4(), user_id, slot_id, BookingStatus::Active),
        ])
    }

    fn bookings_of_user_for_slot(
        &self,
        user_id: Uuid,
        slot_id: Uuid,
    ) -> Result<Vec<Booking>, BookingError> {
        Self::count(&self.0.calls_to_bookings_of_user);
        Ok(vec![example_booking(
            Uuid::new_v4(),
            user_id,
            slot_id,
            BookingStatus::Active,
        )])
    }

    fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage, BookingError> {
        Self::count(&self.0.calls_to_send_message);
        self.result()?;
        let sender = self.user(sender_id)?;
        Ok(ChatMessage {
            id: Uuid::new_v4(),
            sender_id,
            sender_name: sender.name,
            receiver_id,
            text: text.into(),
            timestamp: Utc::now(),
        })
    }

    fn chat_messages(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<ChatMessage>, BookingError> {
        Self::count(&self.0.calls_to_chat_messages);
        Ok(vec![
            ChatMessage {
                id: Uuid::new_v4(),
                sender_id: user_a,
                sender_name: "A".into(),
                receiver_id: user_b,
                text: "Hi!".into(),
                timestamp: Utc::now(),
            },
            ChatMessage {
                id: Uuid::new_v4(),
                sender_id: user_b,
                sender_name: "B".into(),
                receiver_id: user_a,
                text: "Hello!".into(),
                timestamp: Utc::now(),
            },
        ])
    }
}
