use crate::{
    error::BookingError,
    types::{Booking, ChatMessage, NewTimeSlot, Role, TimeSlot, TraineeSummary, User},
};
use chrono::NaiveDate;
use tokio_stream::wrappers::WatchStream;
use uuid::Uuid;

pub trait BookingBackend: Clone + Send + Sync + 'static {
    /// Registers a profile. Trainers always start with zero visits. Names are
    /// unique regardless of case.
    fn add_user(
        &self,
        name: &str,
        email: &str,
        role: Role,
        remaining_visits: i32,
    ) -> Result<User, BookingError>;
    fn users(&self) -> Result<Vec<User>, BookingError>;
    fn user(&self, id: Uuid) -> Result<User, BookingError>;
    /// Case-insensitive lookup used at sign in.
    fn user_by_name(&self, name: &str) -> Result<Option<User>, BookingError>;
    fn set_remaining_visits(
        &self,
        trainer_id: Uuid,
        user_id: Uuid,
        visits: i32,
    ) -> Result<User, BookingError>;
    /// Trainees holding active bookings on the trainer's slots.
    fn trainee_roster(
        &self,
        trainer_id: Uuid,
        today: NaiveDate,
    ) -> Result<Vec<TraineeSummary>, BookingError>;

    /// All slots ordered by date and start time.
    fn time_slots(&self) -> Result<Vec<TimeSlot>, BookingError>;
    fn time_slots_of_trainer(&self, trainer_id: Uuid) -> Result<Vec<TimeSlot>, BookingError>;
    fn time_slot(&self, id: Uuid) -> Result<TimeSlot, BookingError>;
    fn add_time_slot(
        &self,
        trainer_id: Uuid,
        new_slot: NewTimeSlot,
    ) -> Result<TimeSlot, BookingError>;
    fn remove_time_slot(&self, trainer_id: Uuid, slot_id: Uuid) -> Result<(), BookingError>;
    /// Yields the full slot list after every change.
    fn time_slot_stream(&self) -> WatchStream<Vec<TimeSlot>>;

    /// Checks and applies a booking as one atomic step.
    fn attempt_booking(&self, user_id: Uuid, slot_id: Uuid) -> Result<Booking, BookingError>;
    fn cancel_booking(&self, requester_id: Uuid, booking_id: Uuid)
        -> Result<Booking, BookingError>;
    fn bookings_of_user(&self, user_id: Uuid) -> Result<Vec<Booking>, BookingError>;
    fn bookings_of_user_for_slot(
        &self,
        user_id: Uuid,
        slot_id: Uuid,
    ) -> Result<Vec<Booking>, BookingError>;

    fn send_message(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        text: &str,
    ) -> Result<ChatMessage, BookingError>;
    /// Conversation between two users in both directions, oldest first.
    fn chat_messages(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<ChatMessage>, BookingError>;
}
