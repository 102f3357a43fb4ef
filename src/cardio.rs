use std::{result, str::FromStr, sync::Arc};

use log::{debug, error, info, trace, warn};
use warp::http;

use crate::auth::{Credentials, Principal, PwHash, SessionId};
use crate::backend::{Backend, CreateError, FindError};
use crate::features::Features;
use crate::model::Forest;
use crate::prediction::{PredictionRecord, PredictionText, Risk};
use crate::time::Timestamp;

/// How many rows `/view_data` shows.
pub const RECENT_LIMIT: u32 = 10;

pub struct CardioRisk {
    backend: Backend,
    model: Forest,
}

pub struct Session {
    app: Arc<CardioRisk>,
    session_id: SessionId,
    user_id: i64,
    username: String,
}

#[derive(Copy, Clone, Debug)]
pub enum Error {
    Internal,
    Unauthorized,
}

pub type Result<T> = result::Result<T, Error>;

impl From<Error> for http::StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
            Error::Unauthorized => http::StatusCode::UNAUTHORIZED,
        }
    }
}

impl warp::reject::Reject for Error {}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegisterError {
    Incomplete,
    Exists,
    Internal,
}

impl CardioRisk {
    pub fn new(backend: Backend, model: Forest) -> Self {
        Self { backend, model }
    }

    pub async fn register(&self, creds: &Credentials) -> result::Result<(), RegisterError> {
        if !creds.is_complete() {
            info!("rejecting registration with empty username or password");
            return Err(RegisterError::Incomplete);
        }

        let username = creds.user();
        let pwhash = PwHash::new(creds.pass());

        match self.backend.create_user(username, pwhash.as_str()).await {
            Ok(id) => {
                info!("{username} registered, id {id}");
                Ok(())
            }
            Err(CreateError::Exists) => {
                info!("{username} already exists, registration rejected");
                Err(RegisterError::Exists)
            }
            Err(CreateError::Internal) => Err(RegisterError::Internal),
        }
    }

    pub async fn login(self: &Arc<Self>, creds: &Credentials) -> Result<Session> {
        let username = creds.user();

        let user = self.backend.find_user(username).await.map_err(|e| {
            if matches!(e, FindError::NotFound) {
                warn!("rejecting non-existant user {}", username);
                Error::Unauthorized
            } else {
                error!("couldn't authenticate user {}: {e:?}", username);
                Error::Internal
            }
        })?;

        if !user.check_password(creds.pass()) {
            warn!("wrong password for user {}", username);
            return Err(Error::Unauthorized);
        }

        let session_id = match user.session_id {
            Some(ref id) => {
                // already logged in elsewhere, share the session
                let session_id = SessionId::from_str(id).map_err(|()| {
                    error!("invalid stored session_id: {:?}", user.session_id);
                    Error::Internal
                })?;
                info!("{username} login: existing session");
                session_id
            }
            None => {
                let session_id = SessionId::new();

                if !self
                    .backend
                    .update_user(user.id(), Some(&session_id.to_string()))
                    .await
                {
                    error!("couldn't login user {}", username);
                    return Err(Error::Internal);
                }

                info!("{username} login: new session created");
                session_id
            }
        };

        Ok(Session {
            app: Arc::clone(self),
            session_id,
            user_id: user.id(),
            username: user.name().to_string(),
        })
    }

    pub async fn authenticate(self: &Arc<Self>, session_id: SessionId) -> Result<Session> {
        let session_str = session_id.to_string();

        let users = self
            .backend
            .users_with_session(&session_str)
            .await
            .map_err(|()| Error::Internal)?;

        match &users[..] {
            [] => {
                debug!("no user found for session {session_id}");
                Err(Error::Unauthorized)
            }
            [user] => {
                trace!("found user {} by session", user.name());
                Ok(Session {
                    app: Arc::clone(self),
                    session_id,
                    user_id: user.id(),
                    username: user.name().to_string(),
                })
            }
            _ => {
                error!("multiple users found for session {session_id}");
                Err(Error::Internal)
            }
        }
    }

    /// Runs the classifier over already-extracted features.
    pub fn assess(&self, features: &Features) -> result::Result<Risk, String> {
        let class = self.model.predict(&features.to_vector());
        Risk::try_from(class)
    }
}

impl Session {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn logout(&self) -> Result<()> {
        let username = &self.username;
        info!("{username} logout");

        self.app
            .backend
            .update_user(self.user_id, None)
            .await
            .then_some(())
            .ok_or(Error::Internal)
    }

    /// Never fails: problems with the input or the model come back as an
    /// `Error: ...` label, and a failed insert is only logged.
    pub async fn predict(&self, body: &[u8]) -> PredictionText {
        let username = &self.username;

        let assessed = Features::from_json(body)
            .map_err(|e| e.to_string())
            .and_then(|features| Ok((features, self.app.assess(&features)?)));

        let (features, risk) = match assessed {
            Ok(x) => x,
            Err(msg) => {
                warn!("{username} prediction failed: {msg}");
                return PredictionText::error(msg);
            }
        };

        info!("{username} prediction: {risk}");

        match Timestamp::now() {
            Ok(now) => {
                let stored = self
                    .app
                    .backend
                    .insert_prediction(Some(self.user_id), now, &features, risk.as_str())
                    .await;

                if stored.is_err() {
                    error!("{username} prediction not recorded");
                }
            }
            Err(()) => error!("{username} prediction not recorded, no timestamp"),
        }

        PredictionText::risk(risk)
    }

    pub async fn recent_predictions(&self) -> Result<Vec<PredictionRecord>> {
        let username = &self.username;
        trace!("{username} viewing recent predictions");

        self.app
            .backend
            .recent_predictions(RECENT_LIMIT)
            .await
            .map_err(|()| Error::Internal)
    }
}
