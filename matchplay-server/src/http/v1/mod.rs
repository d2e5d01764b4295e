mod matches;
mod schedules;

use super::{Request, RequestUri, Result};
use crate::Error;

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    match uri.take_str() {
        Some("schedules") => schedules::route(req, uri).await,
        Some("matches") => matches::route(req, uri).await,
        _ => Err(Error::NotFound),
    }
}
