use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BookingError {
    #[error("No visits left to book a slot")]
    InsufficientVisits,
    #[error("Slot has reached its maximum capacity")]
    SlotFull,
    #[error("Slot was already booked by this user")]
    AlreadyBooked,
    #[error("Only trainees can book slots")]
    NotTrainee,
    #[error("Only trainers can perform this operation")]
    NotTrainer,
    #[error("Operation is not permitted for this user")]
    NotPermitted,
    #[error("Booking is not active and can't therefore be cancelled")]
    BookingNotActive,
    #[error("Slot still has active bookings")]
    SlotHasBookings,
    #[error("User name '{0}' is already taken")]
    NameTaken(String),
    #[error("User {0} does not exist")]
    UserNotFound(Uuid),
    #[error("Slot {0} does not exist")]
    SlotNotFound(Uuid),
    #[error("Booking {0} does not exist")]
    BookingNotFound(Uuid),
    #[error("Invalid slot: {0}")]
    InvalidSlot(String),
    #[error("Invalid visit count {0}")]
    InvalidVisits(i32),
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Storage failure: {0}")]
    Storage(String),
}

impl BookingError {
    /// Stable machine readable name of the failure.
    pub fn reason(&self) -> &'static str {
        match self {
            BookingError::InsufficientVisits => "insufficient_visits",
            BookingError::SlotFull => "slot_full",
            BookingError::AlreadyBooked => "already_booked",
            BookingError::NotTrainee => "not_trainee",
            BookingError::NotTrainer => "not_trainer",
            BookingError::NotPermitted => "not_permitted",
            BookingError::BookingNotActive => "booking_not_active",
            BookingError::SlotHasBookings => "slot_has_bookings",
            BookingError::NameTaken(_) => "name_taken",
            BookingError::UserNotFound(_) => "user_not_found",
            BookingError::SlotNotFound(_) => "slot_not_found",
            BookingError::BookingNotFound(_) => "booking_not_found",
            BookingError::InvalidSlot(_) => "invalid_slot",
            BookingError::InvalidVisits(_) => "invalid_visits",
            BookingError::InvalidMessage(_) => "invalid_message",
            BookingError::Storage(_) => "storage",
        }
    }
}

impl From<diesel::result::Error> for BookingError {
    fn from(err: diesel::result::Error) -> Self {
        BookingError::Storage(err.to_string())
    }
}
