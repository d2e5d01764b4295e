use hyper::Method;
use matchplay_core::{Competition, ScheduleId};
use serde::Deserialize;

use crate::http::{Request, RequestUri, Response, Result};
use crate::{method, Error};

#[derive(Copy, Clone, Debug, Deserialize)]
#[serde(untagged)]
enum PublishBody {
    Flag(bool),
    Object { published: bool },
}

impl PublishBody {
    fn published(self) -> bool {
        match self {
            Self::Flag(published) | Self::Object { published } => published,
        }
    }
}

pub async fn route(req: Request, mut uri: RequestUri<'_>) -> Result {
    let id: ScheduleId = match uri.take() {
        Some(part) => part.parse()?,
        None => return Err(Error::NotFound),
    };

    match uri.take_str() {
        Some("draw") => match uri.take_str() {
            None => method!(req, {
                Method::GET => get_draw(req, id).await,
                Method::POST => generate_draw(req, id).await,
            }),
            Some("regenerate") => method!(req, {
                Method::POST => regenerate_draw(req, id).await,
            }),
            Some("published") => method!(req, {
                Method::PUT => publish_draw(req, id).await,
            }),
            Some(_) => Err(Error::NotFound),
        },
        Some("start") => method!(req, {
            Method::POST => start(req, id).await,
        }),
        Some("playoff") => method!(req, {
            Method::POST => advance_to_playoff(req, id).await,
        }),
        Some("bracket") => method!(req, {
            Method::GET => bracket(req, id).await,
        }),
        Some("matches") => method!(req, {
            Method::GET => matches(req, id).await,
        }),
        Some("standings") => method!(req, {
            Method::GET => standings(req, id).await,
        }),
        Some("competition") => method!(req, {
            Method::PUT => configure(req, id).await,
        }),
        Some("awards") => method!(req, {
            Method::GET => awards(req, id).await,
            Method::POST => configure_awards(req, id).await,
        }),
        _ => Err(Error::NotFound),
    }
}

async fn get_draw(req: Request, id: ScheduleId) -> Result {
    let draw = req.state().service.draw(id).await?;

    // Unpublished draws are only visible to staff.
    if !draw.published {
        req.require_staff(id).await?;
    }

    Ok(Response::ok().json(&draw))
}

async fn generate_draw(req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let draw = req.state().service.generate_draw(id).await?;
    Ok(Response::ok().json(&draw))
}

async fn regenerate_draw(req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let draw = req.state().service.regenerate_draw(id).await?;
    Ok(Response::ok().json(&draw))
}

async fn publish_draw(mut req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let body: PublishBody = req.json().await?;
    req.state()
        .service
        .publish_draw(id, body.published())
        .await?;

    Ok(Response::no_content())
}

async fn start(req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let bracket = req.state().service.start_competition(id).await?;
    Ok(Response::created().json(&bracket))
}

async fn advance_to_playoff(req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let bracket = req.state().service.advance_to_playoff(id).await?;
    Ok(Response::ok().json(&bracket))
}

async fn bracket(req: Request, id: ScheduleId) -> Result {
    let bracket = req.state().service.bracket(id).await?;
    Ok(Response::ok().json(&bracket))
}

async fn matches(req: Request, id: ScheduleId) -> Result {
    let matches = req.state().service.matches(id).await?;
    Ok(Response::ok().json(&matches))
}

async fn standings(req: Request, id: ScheduleId) -> Result {
    let standings = req.state().service.standings(id).await?;
    Ok(Response::ok().json(&standings))
}

async fn configure(mut req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let mut competition: Competition = req.json().await?;
    competition.schedule_id = id;

    let competition = req.state().service.configure(competition).await?;
    Ok(Response::ok().json(&competition))
}

async fn awards(req: Request, id: ScheduleId) -> Result {
    let awards = req.state().service.awards(id).await?;
    Ok(Response::ok().json(&awards))
}

async fn configure_awards(req: Request, id: ScheduleId) -> Result {
    req.require_staff(id).await?;

    let awards = req.state().service.configure_awards(id).await?;
    Ok(Response::ok().json(&awards))
}

#[cfg(test)]
mod tests {
    use super::PublishBody;

    #[test]
    fn test_publish_body() {
        let body: PublishBody = serde_json::from_str("true").unwrap();
        assert!(body.published());

        let body: PublishBody = serde_json::from_str(r#"{"published":false}"#).unwrap();
        assert!(!body.published());
    }
}
