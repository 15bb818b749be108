use crate::with_db;
use db::models::Role;
use db::{Database, Db};

use warp::{Filter, Rejection};

/// Header carrying the caller's email, set by the gateway once the identity provider verified it
pub const IDENTITY_HEADER: &str = "x-learnly-email";

/// Who is making the request. Built for every request and handed to handlers explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: u32,
    pub email: String,
    pub role: Role,
}

impl Session {
    /// Admins may act on behalf of anyone, other users only on themselves
    pub fn can_act_for(&self, email: &str) -> bool {
        self.role.is_admin() || self.email == email
    }
}

#[derive(Debug)]
pub struct Forbidden;

impl warp::reject::Reject for Forbidden {}

#[derive(Debug)]
pub struct Unauthorized;

impl warp::reject::Reject for Unauthorized {}

/// Filter extracting the verified email of the caller, who may not have an account yet
pub fn identity() -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::header::optional::<String>(IDENTITY_HEADER).and_then(|email: Option<String>| async move {
        match email.as_deref().map(str::trim) {
            Some(email) if !email.is_empty() => Ok(email.to_string()),
            _ => Err(warp::reject::custom(Forbidden)),
        }
    })
}

/// Filter that checks if the caller has an account, and rejects the request if he/she doesn't
pub fn authed(db: &Db) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone {
    with_db(db.clone()).and(identity()).and_then(guard)
}

/// Filters that checks if the user has one of the requested roles, and rejects the request if
/// he/she doesn't have the authorization ; also checks if the user is authenticated.
pub fn authed_is_of_kind<'a>(
    db: &Db,
    roles: &'a [Role],
) -> impl Filter<Extract = (Session,), Error = Rejection> + Clone + 'a {
    authed(db).and_then(move |session: Session| async move {
        if roles.contains(&session.role) {
            Ok(session)
        } else {
            Err(warp::reject::custom(Unauthorized))
        }
    })
}

async fn guard(db: Db, email: String) -> Result<Session, Rejection> {
    let db = db.lock().await;

    match db.user_get(&email) {
        Some(user) => Ok(Session {
            user_id: user.id,
            email: user.email.clone(),
            role: user.role,
        }),
        None => Err(warp::reject::custom(Forbidden)),
    }
}
