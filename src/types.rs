use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Trainer,
    Trainee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Trainer => "trainer",
            Role::Trainee => "trainee",
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trainer" => Ok(Role::Trainer),
            "trainee" => Ok(Role::Trainee),
            other => Err(format!("Unknown role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    /// Only meaningful for trainees, always zero for trainers.
    pub remaining_visits: i32,
}

/// A trainee as listed on a trainer's roster, counted over active bookings
/// on that trainer's slots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraineeSummary {
    #[serde(flatten)]
    pub user: User,
    pub total_bookings: usize,
    pub upcoming_bookings: usize,
    pub completed_sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: Uuid,
    pub trainer_id: Uuid,
    pub trainer_name: String,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub current_bookings: i32,
    pub booked_by_ids: Vec<Uuid>,
    pub description: Option<String>,
}

impl TimeSlot {
    pub fn is_full(&self) -> bool {
        self.current_bookings >= self.max_capacity
    }

    pub fn is_booked_by(&self, user_id: Uuid) -> bool {
        self.booked_by_ids.contains(&user_id)
    }
}

/// The part of a [`TimeSlot`] a trainer chooses when publishing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTimeSlot {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub max_capacity: i32,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Active,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Active => "active",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(BookingStatus::Active),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("Unknown booking status '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub slot_id: Uuid,
    pub booked_at: DateTime<Utc>,
    pub status: BookingStatus,
}

impl Booking {
    pub fn is_active(&self) -> bool {
        self.status == BookingStatus::Active
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub receiver_id: Uuid,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
