use std::path::{Path, PathBuf};
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{query, query_as, Pool, Sqlite};

use log::{error, info};

use crate::backend::{CreateError, FindError};
use crate::features::Features;
use crate::prediction::PredictionRecord;
use crate::time::Timestamp;
use crate::user::User;

type Result<T> = std::result::Result<T, ()>;

// SQLITE_CONSTRAINT_UNIQUE
const UNIQUE_VIOLATION: &str = "2067";

pub struct Backend(pub Pool<Sqlite>);

pub fn into_sql(path: &Path) -> PathBuf {
    path.join("heart.db")
}

impl Backend {
    pub async fn new(data_dir: &Path) -> std::result::Result<Self, sqlx::Error> {
        let db_path = into_sql(data_dir);
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("Using {}", db_path.display());
        Ok(Self(pool))
    }
}

impl Backend {
    pub async fn find_user(&self, username: &str) -> std::result::Result<User, FindError> {
        query_as::<_, User>(
            "
            SELECT id, username, pwhash, session_id
            FROM users
            WHERE username = ?
            ",
        )
        .bind(username)
        .fetch_one(&self.0)
        .await
        .map_err(|e| {
            if matches!(e, sqlx::Error::RowNotFound) {
                FindError::NotFound
            } else {
                error!("find user {username}: {e:?}");
                FindError::Internal
            }
        })
    }

    pub async fn create_user(
        &self,
        username: &str,
        pwhash: &str,
    ) -> std::result::Result<i64, CreateError> {
        query(
            "
            INSERT INTO users
            (username, pwhash)
            VALUES
            (?, ?) -- `session_id` <- NULL
            ",
        )
        .bind(username)
        .bind(pwhash)
        .execute(&self.0)
        .await
        .map(|done| done.last_insert_rowid())
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err)
                if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                CreateError::Exists
            }
            e => {
                error!("create user {username}: {e:?}");
                CreateError::Internal
            }
        })
    }

    /// session_id: set to None to logout / make NULL
    pub async fn update_user(&self, user_id: i64, session_id: Option<&str>) -> bool {
        query(
            "
            UPDATE users
            SET session_id = ?
            WHERE id = ?
            ",
        )
        .bind(session_id)
        .bind(user_id)
        .execute(&self.0)
        .await
        .map_err(|e| {
            error!("update user: {e}");
            e
        })
        .is_ok()
    }

    pub async fn users_with_session(&self, session_id: &str) -> Result<Vec<User>> {
        query_as::<_, User>(
            "
            SELECT id, username, pwhash, session_id
            FROM users
            WHERE session_id = ?
            ",
        )
        .bind(session_id)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("couldn't query for session {session_id}: {e:?}");
        })
    }
}

impl Backend {
    pub async fn insert_prediction(
        &self,
        user_id: Option<i64>,
        timestamp: Timestamp,
        features: &Features,
        result: &str,
    ) -> Result<i64> {
        let Features {
            age,
            sex,
            cp,
            trestbps,
            chol,
            fbs,
            restecg,
            thalach,
            exang,
            oldpeak,
            slope,
            ca,
            thal,
        } = *features;

        query(
            "
            INSERT INTO predictions
            (
                user_id, timestamp,
                age, sex, cp, trestbps, chol, fbs, restecg,
                thalach, exang, oldpeak, slope, ca, thal,
                prediction_result
            )
            VALUES
            (
                ?, ?,
                ?, ?, ?, ?, ?, ?, ?,
                ?, ?, ?, ?, ?, ?,
                ?
            )
            ",
        )
        .bind(user_id)
        .bind(timestamp)
        .bind(age)
        .bind(sex)
        .bind(cp)
        .bind(trestbps)
        .bind(chol)
        .bind(fbs)
        .bind(restecg)
        .bind(thalach)
        .bind(exang)
        .bind(oldpeak)
        .bind(slope)
        .bind(ca)
        .bind(thal)
        .bind(result)
        .execute(&self.0)
        .await
        .map(|done| done.last_insert_rowid())
        .map_err(|e| {
            error!("error inserting prediction: {e:?}");
        })
    }

    pub async fn recent_predictions(&self, limit: u32) -> Result<Vec<PredictionRecord>> {
        query_as::<_, PredictionRecord>(
            "
            SELECT id, user_id, timestamp,
                age, sex, cp, trestbps, chol, fbs, restecg,
                thalach, exang, oldpeak, slope, ca, thal,
                prediction_result
            FROM predictions
            ORDER BY id DESC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(&self.0)
        .await
        .map_err(|e| {
            error!("error selecting predictions: {e:?}");
        })
    }
}
