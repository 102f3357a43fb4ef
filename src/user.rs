use crate::auth::{Principal, PwHash};

#[derive(Debug)]
#[derive(sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub pwhash: String,
    pub session_id: Option<String>,
}

impl Principal for User {
    fn id(&self) -> i64 {
        self.id
    }

    fn name(&self) -> &str {
        &self.username
    }

    fn check_password(&self, pass: &str) -> bool {
        PwHash::verify(&self.pwhash, pass)
    }
}
