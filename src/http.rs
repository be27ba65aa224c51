use crate::backend::BookingBackend;
use crate::booking::{check_trainer, MAX_VISITS};
use crate::error::BookingError;
use crate::sessions::SessionStore;
use crate::types::{Booking, ChatMessage, NewTimeSlot, TimeSlot, TraineeSummary, User};
use axum::extract::{FromRequest, Path, Request};
use axum::http::{header, HeaderMap};
use axum::middleware::{self, Next};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::Response;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Extension, Json};
use axum::{
    routing::{get, post},
    Router,
};
use axum_valid::{Valid, ValidationRejection};
use chrono::{NaiveDate, NaiveTime, Utc};
use futures::{Stream, StreamExt};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::Validate;

lazy_static! {
    static ref USERNAME: Regex = Regex::new(r"^[\p{L}][\p{L} .'-]{0,99}$").unwrap();
}

#[derive(Clone)]
pub struct AppState<T: BookingBackend> {
    backend: T,
    sessions: SessionStore,
}

/// Set by the authentication middleware for every protected route.
#[derive(Debug, Clone)]
struct CurrentUser {
    user: User,
    token: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
    message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct SignInRequest {
    #[validate(regex(path = *USERNAME))]
    username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SignInResponse {
    token: Uuid,
    user: User,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct UpdateVisitsRequest {
    user_id: Uuid,
    #[validate(range(min = 0, max = MAX_VISITS))]
    visits: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct AddTimeslotRequest {
    date: NaiveDate,
    start_time: NaiveTime,
    end_time: NaiveTime,
    #[validate(range(min = 1, max = 1000))]
    max_capacity: i32,
    #[validate(length(max = 1000))]
    description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct DeleteTimeslotRequest {
    id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct BookingRequest {
    slot_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct CancelRequest {
    booking_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
struct SendMessageRequest {
    receiver_id: Uuid,
    #[validate(length(min = 1, max = 2000))]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct BookingWithSlot {
    #[serde(flatten)]
    booking: Booking,
    slot: TimeSlot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConversationEntry {
    #[serde(flatten)]
    message: ChatMessage,
    is_current_user: bool,
}

fn error_response(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.into(),
            message: message.into(),
        }),
    )
        .into_response()
}

/// JSON body extractor running `validator` checks. Both malformed bodies and
/// failed checks are answered with an [`ErrorBody`].
struct ValidJson<T>(T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = Response;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Valid::<Json<T>>::from_request(request, state).await {
            Ok(Valid(Json(value))) => Ok(ValidJson(value)),
            Err(ValidationRejection::Valid(errors)) => Err(error_response(
                StatusCode::BAD_REQUEST,
                "invalid_request",
                errors.to_string(),
            )),
            Err(ValidationRejection::Inner(rejection)) => Err(error_response(
                rejection.status(),
                "invalid_request",
                rejection.body_text(),
            )),
        }
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = match self {
            BookingError::InsufficientVisits
            | BookingError::SlotFull
            | BookingError::AlreadyBooked
            | BookingError::BookingNotActive
            | BookingError::SlotHasBookings
            | BookingError::NameTaken(_) => StatusCode::CONFLICT,
            BookingError::UserNotFound(_)
            | BookingError::SlotNotFound(_)
            | BookingError::BookingNotFound(_) => StatusCode::NOT_FOUND,
            BookingError::NotTrainee | BookingError::NotTrainer | BookingError::NotPermitted => {
                StatusCode::FORBIDDEN
            }
            BookingError::InvalidSlot(_)
            | BookingError::InvalidVisits(_)
            | BookingError::InvalidMessage(_) => StatusCode::BAD_REQUEST,
            BookingError::Storage(ref err) => {
                error!(%err, "Storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error_response(status, self.reason(), self.to_string())
    }
}

pub fn create_app<T: BookingBackend>(backend: T) -> Router {
    let state = AppState {
        backend,
        sessions: SessionStore::default(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let public = Router::new()
        .route("/sign_in", post(sign_in))
        .route("/slots", get(get_timeslots))
        .route("/slots/stream", get(timeslot_stream))
        .route("/slots/{id}", get(get_timeslot))
        .route("/trainers/{id}/slots", get(get_timeslots_of_trainer));

    let authenticated = Router::new()
        .route("/sign_out", post(sign_out))
        .route("/me", get(get_me))
        .route("/users", get(get_users))
        .route("/users/visits", post(update_visits))
        .route("/trainees", get(get_trainee_roster))
        .route("/slots", post(add_timeslot))
        .route("/slots/remove", post(remove_timeslot))
        .route("/slots/{id}/bookings", get(get_bookings_for_slot))
        .route("/book", post(book_timeslot))
        .route("/cancel", post(cancel_booking))
        .route("/bookings", get(get_bookings))
        .route("/chat", post(send_message))
        .route("/chat/{user_id}", get(get_conversation))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            authenticate::<T>,
        ));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn bearer_token(headers: &HeaderMap) -> Option<Uuid> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?;
    Uuid::parse_str(token.trim()).ok()
}

async fn authenticate<T: BookingBackend>(
    State(state): State<AppState<T>>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(request.headers()) else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "unauthorized",
            "Missing credentials",
        );
    };
    let Some(user_id) = state.sessions.current_user_id(token) else {
        return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Unknown session");
    };
    let user = match state.backend.user(user_id) {
        Ok(user) => user,
        Err(BookingError::UserNotFound(_)) => {
            state.sessions.sign_out(token);
            return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Unknown user");
        }
        Err(err) => return err.into_response(),
    };
    request.extensions_mut().insert(CurrentUser { user, token });
    next.run(request).await
}

async fn sign_in<T: BookingBackend>(
    State(state): State<AppState<T>>,
    ValidJson(request): ValidJson<SignInRequest>,
) -> Response {
    let user = match state.backend.user_by_name(&request.username) {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(username = %request.username, "Sign in with unknown user");
            return error_response(StatusCode::UNAUTHORIZED, "unauthorized", "Unknown user");
        }
        Err(err) => return err.into_response(),
    };
    match state.sessions.sign_in(user.id) {
        Some(token) => Json(SignInResponse { token, user }).into_response(),
        None => BookingError::Storage("session store unavailable".into()).into_response(),
    }
}

async fn sign_out<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
) -> impl IntoResponse {
    state.sessions.sign_out(current.token);
    info!(user_id = %current.user.id, "Signed out");
    (StatusCode::OK, "Signed out successfully".to_string())
}

async fn get_me(Extension(current): Extension<CurrentUser>) -> Json<User> {
    Json(current.user)
}

async fn get_users<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<User>>, BookingError> {
    check_trainer(&current.user)?;
    Ok(Json(state.backend.users()?))
}

async fn update_visits<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(request): ValidJson<UpdateVisitsRequest>,
) -> Result<Json<User>, BookingError> {
    check_trainer(&current.user)?;
    let user =
        state
            .backend
            .set_remaining_visits(current.user.id, request.user_id, request.visits)?;
    Ok(Json(user))
}

async fn get_trainee_roster<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<TraineeSummary>>, BookingError> {
    check_trainer(&current.user)?;
    let today = Utc::now().date_naive();
    Ok(Json(state.backend.trainee_roster(current.user.id, today)?))
}

async fn get_timeslots<T: BookingBackend>(
    State(state): State<AppState<T>>,
) -> Result<Json<Vec<TimeSlot>>, BookingError> {
    Ok(Json(state.backend.time_slots()?))
}

async fn get_timeslot<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Path(id): Path<Uuid>,
) -> Result<Json<TimeSlot>, BookingError> {
    Ok(Json(state.backend.time_slot(id)?))
}

async fn get_timeslots_of_trainer<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimeSlot>>, BookingError> {
    Ok(Json(state.backend.time_slots_of_trainer(id)?))
}

async fn timeslot_stream<T: BookingBackend>(
    State(state): State<AppState<T>>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = state
        .backend
        .time_slot_stream()
        .map(|timeslots| Event::default().event("slots").json_data(timeslots));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn add_timeslot<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(timeslot): ValidJson<AddTimeslotRequest>,
) -> Result<Json<TimeSlot>, BookingError> {
    check_trainer(&current.user)?;
    let new_slot = NewTimeSlot {
        date: timeslot.date,
        start_time: timeslot.start_time,
        end_time: timeslot.end_time,
        max_capacity: timeslot.max_capacity,
        description: timeslot.description,
    };
    Ok(Json(state.backend.add_time_slot(current.user.id, new_slot)?))
}

async fn remove_timeslot<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(timeslot): ValidJson<DeleteTimeslotRequest>,
) -> Result<impl IntoResponse, BookingError> {
    state
        .backend
        .remove_time_slot(current.user.id, timeslot.id)?;
    Ok((StatusCode::OK, "Timeslot removed successfully".to_string()))
}

async fn book_timeslot<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(booking): ValidJson<BookingRequest>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(
        state
            .backend
            .attempt_booking(current.user.id, booking.slot_id)?,
    ))
}

async fn cancel_booking<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(request): ValidJson<CancelRequest>,
) -> Result<Json<Booking>, BookingError> {
    Ok(Json(
        state
            .backend
            .cancel_booking(current.user.id, request.booking_id)?,
    ))
}

async fn get_bookings<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
) -> Result<Json<Vec<BookingWithSlot>>, BookingError> {
    let bookings = state
        .backend
        .bookings_of_user(current.user.id)?
        .into_iter()
        .filter(Booking::is_active)
        .map(|booking| {
            let slot = state.backend.time_slot(booking.slot_id)?;
            Ok(BookingWithSlot { booking, slot })
        })
        .collect::<Result<Vec<_>, BookingError>>()?;
    Ok(Json(bookings))
}

async fn get_bookings_for_slot<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, BookingError> {
    Ok(Json(
        state
            .backend
            .bookings_of_user_for_slot(current.user.id, id)?,
    ))
}

async fn send_message<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    ValidJson(request): ValidJson<SendMessageRequest>,
) -> Result<Json<ChatMessage>, BookingError> {
    Ok(Json(state.backend.send_message(
        current.user.id,
        request.receiver_id,
        &request.text,
    )?))
}

async fn get_conversation<T: BookingBackend>(
    State(state): State<AppState<T>>,
    Extension(current): Extension<CurrentUser>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<Vec<ConversationEntry>>, BookingError> {
    let conversation = state
        .backend
        .chat_messages(current.user.id, user_id)?
        .into_iter()
        .map(|message| ConversationEntry {
            is_current_user: message.sender_id == current.user.id,
            message,
        })
        .collect();
    Ok(Json(conversation))
}
