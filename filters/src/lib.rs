mod authed;
mod with_db;

pub use authed::{
    authed, authed_is_of_kind, identity, Forbidden, Session, Unauthorized, IDENTITY_HEADER,
};
pub use with_db::with_db;
