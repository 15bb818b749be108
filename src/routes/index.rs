use warp::{Filter, Rejection, Reply};

pub fn routes() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get().and(warp::path::end()).and_then(index)
}

async fn index() -> Result<impl warp::Reply, warp::Rejection> {
    Ok("Learnly is Learning!!!")
}
