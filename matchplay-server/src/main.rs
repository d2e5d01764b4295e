mod auth;
mod config;
mod http;
mod locks;
mod logger;
mod service;
mod state;
mod store;

use std::fmt::{self, Display, Formatter};
use std::io::{self, ErrorKind};
use std::path::PathBuf;

use clap::Parser;
use hyper::StatusCode;
use matchplay_core::ScheduleId;
use sqlx::mysql::MySqlDatabaseError;
use thiserror::Error;
use tokio::sync::watch;

pub use config::Config;
pub use state::State;

use config::ConfigError;

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the config file. If the file does not exist the config is read from the
    /// environment.
    #[arg(short, long, value_name = "FILE", default_value = "config.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match Config::from_file(&args.config).await {
        Ok(config) => config.with_environment(),
        Err(ConfigError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            Config::from_environment()?
        }
        Err(err) => return Err(err.into()),
    };

    logger::init(config.loglevel)?;

    log::info!("Using config file {:?}", args.config);
    log::debug!("Using config: {:?}", config);

    let state = State::new(&config)?;

    state.store.create_tables().await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(());
    tokio::task::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for shutdown signal: {}", err);
            return;
        }

        log::info!("Received shutdown signal");
        let _ = shutdown_tx.send(());
    });

    http::bind(config.bind, state, shutdown_rx).await?;

    log::info!("Server stopped");
    Ok(())
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] matchplay_core::Error),
    #[error(transparent)]
    Store(sqlx::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Hyper(#[from] hyper::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error("schedule {0} has no competition configured")]
    NotConfigured(ScheduleId),
    #[error("the bracket of schedule {0} cannot be changed after matches were created")]
    CompetitionStarted(ScheduleId),
    #[error("the schedule was modified by another process, reload and retry")]
    Conflict,
    #[error("forbidden")]
    Forbidden,
    #[error("unauthorized")]
    Unauthorized,
    #[error("not found")]
    NotFound,
    #[error("bad request")]
    BadRequest,
    #[error("method not allowed")]
    MethodNotAllowed,
    #[error("{0}")]
    StatusCodeError(#[from] StatusCodeError),
}

impl Error {
    /// Returns the [`StatusCodeError`] sent to the client. Returns `None` for internal errors
    /// which are logged and answered with a plain 500.
    pub fn to_status_code_error(&self) -> Option<StatusCodeError> {
        use matchplay_core::Error as CoreError;

        let err = match self {
            Self::Core(err) => match err {
                CoreError::NotEnoughTeams(_) => {
                    StatusCodeError::new(StatusCode::UNPROCESSABLE_ENTITY, err)
                }
                CoreError::MatchNotFound(_) => StatusCodeError::not_found().message(err),
                CoreError::MatchNotPlayable { .. }
                | CoreError::PoolStageIncomplete
                | CoreError::PlayoffStarted
                | CoreError::NotPoolPlay(_) => StatusCodeError::conflict().message(err),
                CoreError::InvalidNumberOfIds { .. } => return None,
            },
            Self::Token(_) | Self::Unauthorized => StatusCodeError::unauthorized(),
            Self::NotConfigured(_) | Self::CompetitionStarted(_) | Self::Conflict => {
                StatusCodeError::conflict().message(self)
            }
            Self::Forbidden => StatusCodeError::forbidden(),
            Self::NotFound => StatusCodeError::not_found(),
            Self::BadRequest => StatusCodeError::bad_request(),
            Self::MethodNotAllowed => StatusCodeError::method_not_allowed(),
            Self::StatusCodeError(err) => err.clone(),
            Self::Store(_) | Self::Json(_) | Self::Hyper(_) | Self::Io(_) => return None,
        };

        Some(err)
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        // Lock wait timeouts and deadlocks mean another transaction holds the schedule.
        if let sqlx::Error::Database(db) = &err {
            if let Some(err) = db.try_downcast_ref::<MySqlDatabaseError>() {
                if matches!(err.number(), 1205 | 1213) {
                    log::warn!("Transaction aborted: {}", err);
                    return Self::Conflict;
                }
            }
        }

        Self::Store(err)
    }
}

/// An error with an http status code and a message for the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusCodeError {
    pub code: StatusCode,
    pub message: String,
}

impl StatusCodeError {
    pub fn new<T>(code: StatusCode, message: T) -> Self
    where
        T: ToString,
    {
        Self {
            code,
            message: message.to_string(),
        }
    }

    /// Replaces the message of the error.
    pub fn message<T>(mut self, message: T) -> Self
    where
        T: ToString,
    {
        self.message = message.to_string();
        self
    }

    fn from_code(code: StatusCode) -> Self {
        Self {
            code,
            message: code.canonical_reason().unwrap_or_default().to_owned(),
        }
    }

    pub fn bad_request() -> Self {
        Self::from_code(StatusCode::BAD_REQUEST)
    }

    pub fn unauthorized() -> Self {
        Self::from_code(StatusCode::UNAUTHORIZED)
    }

    pub fn forbidden() -> Self {
        Self::from_code(StatusCode::FORBIDDEN)
    }

    pub fn not_found() -> Self {
        Self::from_code(StatusCode::NOT_FOUND)
    }

    pub fn method_not_allowed() -> Self {
        Self::from_code(StatusCode::METHOD_NOT_ALLOWED)
    }

    pub fn request_timeout() -> Self {
        Self::from_code(StatusCode::REQUEST_TIMEOUT)
    }

    pub fn conflict() -> Self {
        Self::from_code(StatusCode::CONFLICT)
    }

    pub fn length_required() -> Self {
        Self::from_code(StatusCode::LENGTH_REQUIRED)
    }

    pub fn payload_too_large() -> Self {
        Self::from_code(StatusCode::PAYLOAD_TOO_LARGE)
    }

    pub fn internal_server_error() -> Self {
        Self::from_code(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl Display for StatusCodeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for StatusCodeError {}

#[cfg(test)]
mod tests {
    use hyper::StatusCode;
    use matchplay_core::{MatchId, MatchStatus, ScheduleId};

    use super::{Error, StatusCodeError};

    #[test]
    fn test_status_code_error() {
        let err = StatusCodeError::not_found();
        assert_eq!(err.code, StatusCode::NOT_FOUND);
        assert_eq!(err.message, "Not Found");

        let err = StatusCodeError::bad_request().message("Invalid id");
        assert_eq!(err.code, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Invalid id");
    }

    #[test]
    fn test_error_to_status_code_error() {
        let err: Error = matchplay_core::Error::MatchNotPlayable {
            id: MatchId(4),
            status: MatchStatus::Pending,
        }
        .into();
        let err = err.to_status_code_error().unwrap();
        assert_eq!(err.code, StatusCode::CONFLICT);
        assert_eq!(err.message, "match 4 cannot be scored while it is Pending");

        let err = Error::NotConfigured(ScheduleId(2))
            .to_status_code_error()
            .unwrap();
        assert_eq!(err.code, StatusCode::CONFLICT);

        let err = Error::CompetitionStarted(ScheduleId(2))
            .to_status_code_error()
            .unwrap();
        assert_eq!(err.code, StatusCode::CONFLICT);
        assert_eq!(
            err.message,
            "the bracket of schedule 2 cannot be changed after matches were created"
        );

        let err = Error::from(matchplay_core::Error::NotEnoughTeams(1))
            .to_status_code_error()
            .unwrap();
        assert_eq!(err.code, StatusCode::UNPROCESSABLE_ENTITY);

        assert_eq!(
            Error::Forbidden.to_status_code_error().unwrap().code,
            StatusCode::FORBIDDEN
        );
        assert!(Error::Store(sqlx::Error::RowNotFound)
            .to_status_code_error()
            .is_none());
    }
}
