use db::Db;
use std::convert::Infallible;
use warp::Filter;

/// Hands a clone of the shared store to the handler
pub fn with_db(db: Db) -> impl Filter<Extract = (Db,), Error = Infallible> + Clone {
    warp::any().map(move || db.clone())
}
