use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::{error, info};
use uuid::Uuid;

/// Maps opaque session tokens to the signed in user. Each user holds at most
/// one session; signing in again replaces the previous token.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Uuid>>>,
}

impl SessionStore {
    pub fn sign_in(&self, user_id: Uuid) -> Option<Uuid> {
        let token = Uuid::new_v4();
        match self.sessions.lock() {
            Ok(mut sessions) => {
                sessions.retain(|_, signed_in| *signed_in != user_id);
                sessions.insert(token, user_id);
                info!(%user_id, "Signed in");
                Some(token)
            }
            Err(err) => {
                error!(%err, "Session store unavailable");
                None
            }
        }
    }

    /// Returns whether the token belonged to a session.
    pub fn sign_out(&self, token: Uuid) -> bool {
        match self.sessions.lock() {
            Ok(mut sessions) => sessions.remove(&token).is_some(),
            Err(err) => {
                error!(%err, "Session store unavailable");
                false
            }
        }
    }

    pub fn current_user_id(&self, token: Uuid) -> Option<Uuid> {
        self.sessions.lock().ok()?.get(&token).copied()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sign_in_sign_out() {
        let sessions = SessionStore::default();
        let user_id = Uuid::new_v4();

        let other_user_id = Uuid::new_v4();

        let first = sessions.sign_in(user_id).unwrap();
        let other = sessions.sign_in(other_user_id).unwrap();
        assert_eq!(sessions.current_user_id(first), Some(user_id));

        let second = sessions.sign_in(user_id).unwrap();
        assert_ne!(first, second);
        assert_eq!(sessions.current_user_id(first), None);
        assert_eq!(sessions.current_user_id(second), Some(user_id));
        assert_eq!(sessions.current_user_id(other), Some(other_user_id));

        assert!(!sessions.sign_out(first));
        assert!(sessions.sign_out(second));
        assert_eq!(sessions.current_user_id(second), None);
        assert_eq!(sessions.current_user_id(other), Some(other_user_id));
        assert_eq!(sessions.current_user_id(Uuid::new_v4()), None);
    }

    #[test]
    fn test_repeated_sign_in_keeps_one_session() {
        let sessions = SessionStore::default();
        let user_id = Uuid::new_v4();
        for _ in 0..100 {
            sessions.sign_in(user_id).unwrap();
        }
        assert_eq!(sessions.sessions.lock().unwrap().len(), 1);
    }
}
