use hyper::Method;
use matchplay_core::MatchId;
use serde::Deserialize;

use crate::http::{Request, RequestUri, Response, Result};
use crate::{method, Error};

/// The body of a score submission, one score string per team.
#[derive(Clone, Debug, Deserialize)]
struct ScoreBody {
    first: String,
    second: String,
}

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    let id: MatchId = match uri.take() {
        Some(part) => part.parse()?,
        None => return Err(Error::NotFound),
    };

    match uri.take_str() {
        Some("score") => method!(req, {
            Method::POST => submit_score(req, id).await,
        }),
        _ => Err(Error::NotFound),
    }
}

async fn submit_score(mut req: Request, id: MatchId) -> Result {
    let schedule = req
        .state()
        .store
        .match_schedule(id)
        .await?
        .ok_or(Error::NotFound)?;

    req.require_staff(schedule).await?;

    let body: ScoreBody = req.json().await?;

    let submission = req
        .state()
        .service
        .submit_score(id, &body.first, &body.second)
        .await?;

    Ok(Response::ok().json(&submission))
}
