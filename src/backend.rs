#[derive(Debug)]
pub enum FindError {
    NotFound,
    Internal,
}

#[derive(Debug)]
pub enum CreateError {
    Exists,
    Internal,
}

mod backend_sql;
pub use backend_sql::*;
