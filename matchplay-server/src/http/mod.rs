mod v1;

use crate::config::BindAddr;
use crate::{Error, State, StatusCodeError};

use std::convert::Infallible;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::Future;
use hyper::header::{
    HeaderValue, IntoHeaderName, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_ORIGIN,
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE,
};
use hyper::http::request::Parts;
use hyper::server::conn::Http;
use hyper::service::Service;
use hyper::{Body, HeaderMap, Method, StatusCode, Uri};
use matchplay_core::ScheduleId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::sync::watch;
use tokio::time::Instant;

#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

pub type Result = std::result::Result<Response, Error>;

/// The maximum accepted request body size.
const MAX_BODY_SIZE: u64 = 16384;

pub async fn bind(
    addr: BindAddr,
    state: State,
    mut shutdown_rx: watch::Receiver<()>,
) -> std::result::Result<(), Error> {
    let service = RootService { state };

    let listener = Listener::bind(&addr)?;
    log::info!("Listening on {:?}", addr);

    loop {
        tokio::select! {
            res = listener.accept() => {
                let conn = match res {
                    Ok(conn) => conn,
                    Err(err) => {
                        log::warn!("Failed to accept connection: {:?}", err);
                        continue;
                    }
                };

                match conn {
                    Connection::Tcp(stream) => {
                        if let Ok(addr) = stream.peer_addr() {
                            log::info!("Accepting new connection from {:?}", addr);
                        }

                        serve_connection(stream, service.clone(), shutdown_rx.clone());
                    }
                    #[cfg(unix)]
                    Connection::Unix(stream) => {
                        log::info!("Accepting new connection on unix socket");
                        serve_connection(stream, service.clone(), shutdown_rx.clone());
                    }
                }
            }
            // Shut down the server.
            _ = shutdown_rx.changed() => {
                log::debug!("Shutting down http server");
                return Ok(());
            }
        }
    }
}

fn serve_connection<S>(stream: S, service: RootService, mut shutdown_rx: watch::Receiver<()>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    tokio::task::spawn(async move {
        let mut conn = Http::new()
            .http1_keep_alive(true)
            .serve_connection(stream, service);

        let mut conn = Pin::new(&mut conn);

        tokio::select! {
            res = &mut conn => {
                if let Err(err) = res {
                    log::warn!("Http error: {:?}", err);
                }
            }
            _ = shutdown_rx.changed() => {
                log::debug!("Shutting down connection");
                conn.as_mut().graceful_shutdown();

                if let Err(err) = conn.await {
                    log::warn!("Http error: {:?}", err);
                }
            }
        }
    });
}

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

enum Connection {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Listener {
    fn bind(addr: &BindAddr) -> std::io::Result<Self> {
        match addr {
            BindAddr::Tcp(addr) => {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };

                if let Err(err) = socket.set_reuseaddr(true) {
                    log::warn!("Failed to set SO_REUSEADDR flag: {}", err);
                }

                socket.bind(*addr)?;
                Ok(Self::Tcp(socket.listen(1024)?))
            }
            #[cfg(unix)]
            BindAddr::Unix(path) => Ok(Self::Unix(UnixListener::bind(path)?)),
            #[cfg(not(unix))]
            BindAddr::Unix(_) => Err(std::io::Error::new(
                std::io::ErrorKind::Unsupported,
                "unix sockets are not supported on this platform",
            )),
        }
    }

    async fn accept(&self) -> std::io::Result<Connection> {
        match self {
            Self::Tcp(listener) => listener
                .accept()
                .await
                .map(|(stream, _)| Connection::Tcp(stream)),
            #[cfg(unix)]
            Self::Unix(listener) => listener
                .accept()
                .await
                .map(|(stream, _)| Connection::Unix(stream)),
        }
    }
}

#[derive(Clone, Debug)]
struct RootService {
    state: State,
}

impl Service<hyper::Request<Body>> for RootService {
    type Response = hyper::Response<Body>;
    type Error = Infallible;
    type Future = RootServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    #[inline]
    fn call(&mut self, req: hyper::Request<Body>) -> Self::Future {
        RootServiceFuture::new(req, self.state.clone())
    }
}

struct RootServiceFuture(BoxFuture<'static, std::result::Result<hyper::Response<Body>, Infallible>>);

impl RootServiceFuture {
    fn new(req: hyper::Request<Body>, state: State) -> Self {
        Self(Box::pin(async move { Ok(service_root(req, state).await) }))
    }
}

impl Future for RootServiceFuture {
    type Output = std::result::Result<hyper::Response<Body>, Infallible>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context) -> Poll<Self::Output> {
        self.get_mut().0.as_mut().poll(cx)
    }
}

async fn service_root(req: hyper::Request<Body>, state: State) -> hyper::Response<Body> {
    log::trace!("Received Request:");
    log::trace!("Head: {} {}", req.method(), req.uri());
    log::trace!("Headers: {:?}", req.headers());

    let req = Request::new(req, state);

    if matches!(*req.method(), Method::POST | Method::PUT) {
        match req.content_length() {
            Ok(length) if length > MAX_BODY_SIZE => {
                return Response::ok()
                    .status(StatusCode::PAYLOAD_TOO_LARGE)
                    .body("Payload Too Large")
                    .build();
            }
            Ok(_) => (),
            Err(err) => return error_response(err).build(),
        }
    }

    let path = String::from(req.uri().path());
    let mut uri = RequestUri::new(&path);

    log::debug!("{} {:?}", req.method(), uri);

    let origin = req.headers().get("Origin").cloned();

    let res = match uri.take_str() {
        Some("v1") => v1::route(req, uri).await,
        _ => Err(Error::NotFound),
    };

    let mut resp = match res {
        Ok(resp) => resp,
        Err(err) => error_response(err),
    };

    if let Some(origin) = origin {
        log::debug!("Setting CORS for origin: {:?}", origin);
        resp = resp.header(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }

    resp.header(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("content-type,authorization"),
    )
    .build()
}

fn error_response(err: Error) -> Response {
    match err.to_status_code_error() {
        Some(err) => Response::ok().status(err.code).json(&ErrorResponse {
            code: err.code.as_u16(),
            message: err.message,
        }),
        None => {
            log::error!("{:?}", err);

            Response::ok()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .body("Internal Server Error")
        }
    }
}

#[derive(Debug)]
pub struct Request {
    pub parts: Parts,
    pub body: Option<Body>,
    state: State,
}

impl Request {
    #[inline]
    fn new(req: hyper::Request<Body>, state: State) -> Self {
        let (parts, body) = req.into_parts();

        Self {
            parts,
            body: Some(body),
            state,
        }
    }

    #[inline]
    pub fn state(&self) -> &State {
        &self.state
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.parts.method
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.parts.headers
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.parts.uri
    }

    pub async fn json<T>(&mut self) -> std::result::Result<T, Error>
    where
        T: DeserializeOwned,
    {
        const DUR: Duration = Duration::new(30, 0);

        let deadline = Instant::now() + DUR;

        let body = self.body.take().unwrap_or_default();

        let bytes = tokio::select! {
            res = hyper::body::to_bytes(body) => {
                res?
            }
            _ = tokio::time::sleep_until(deadline) => {
                log::info!("Client failed to transmit body in {}s, dropping connection", DUR.as_secs());
                return Err(StatusCodeError::request_timeout().into());
            }
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(err) => Err(StatusCodeError::new(StatusCode::BAD_REQUEST, err).into()),
        }
    }

    /// Returns the value of the "Content-Length" header. If the header is not present or has an
    /// invalid value an error is returned.
    pub fn content_length(&self) -> std::result::Result<u64, Error> {
        match self.headers().get(CONTENT_LENGTH) {
            Some(value) => match value.to_str() {
                Ok(value) => match value.parse() {
                    Ok(value) => Ok(value),
                    Err(err) => {
                        log::debug!("Failed to parse \"Content-Length\" header: {:?}", err);

                        Err(StatusCodeError::bad_request().into())
                    }
                },
                Err(err) => {
                    log::debug!("Failed to parse \"Content-Length\" header: {:?}", err);

                    Err(StatusCodeError::bad_request().into())
                }
            },
            None => Err(StatusCodeError::length_required().into()),
        }
    }

    /// Checks that the request carries a valid bearer token of an organizer or staff member of
    /// `schedule`.
    pub async fn require_staff(&self, schedule: ScheduleId) -> std::result::Result<(), Error> {
        let token = self
            .headers()
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(Error::Unauthorized)?;

        let claims = self.state.auth.validate(token)?;

        if !self.state.store.is_staff(schedule, claims.sub).await? {
            log::debug!("User {} is not staff of schedule {}", claims.sub, schedule);
            return Err(Error::Forbidden);
        }

        Ok(())
    }
}

#[derive(Copy, Clone, Debug)]
pub struct RequestUri<'a> {
    path: &'a str,
}

impl<'a> RequestUri<'a> {
    pub fn new(mut path: &'a str) -> Self {
        if let Some(stripped) = path.strip_prefix('/') {
            path = stripped;
        }

        Self { path }
    }

    pub fn take(&mut self) -> Option<UriPart<'a>> {
        let part = self.take_str()?;

        Some(UriPart { part })
    }

    pub fn take_str(&mut self) -> Option<&'a str> {
        if self.path.is_empty() {
            None
        } else {
            Some(match self.path.split_once('/') {
                Some((part, rem)) => {
                    self.path = rem;
                    part
                }
                None => {
                    let path = self.path;
                    self.path = "";
                    path
                }
            })
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct UriPart<'a> {
    part: &'a str,
}

impl<'a> UriPart<'a> {
    pub fn parse<T>(&self) -> std::result::Result<T, Error>
    where
        T: FromStr,
    {
        match self.part.parse() {
            Ok(v) => Ok(v),
            Err(_) => Err(Error::BadRequest),
        }
    }
}

impl<'a> AsRef<str> for UriPart<'a> {
    fn as_ref(&self) -> &str {
        self.part
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// 200 OK
    pub fn ok() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// 201 Created
    pub fn created() -> Self {
        Self {
            status: StatusCode::CREATED,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    /// 204 No Content
    pub fn no_content() -> Self {
        Self {
            status: StatusCode::NO_CONTENT,
            headers: HeaderMap::new(),
            body: Body::empty(),
        }
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn body<T>(mut self, body: T) -> Self
    where
        T: Into<Body>,
    {
        self.body = body.into();
        self
    }

    pub fn json<T>(mut self, body: &T) -> Self
    where
        T: Serialize,
    {
        match serde_json::to_vec(body) {
            Ok(buf) => {
                self.body = Body::from(buf);
                self.header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            }
            Err(err) => {
                log::error!("Failed to serialize response body: {}", err);

                self.status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body("Internal Server Error")
            }
        }
    }

    pub fn header<K>(mut self, key: K, value: HeaderValue) -> Self
    where
        K: IntoHeaderName,
    {
        self.headers.append(key, value);
        self
    }

    fn build(self) -> hyper::Response<Body> {
        let mut resp = hyper::Response::new(self.body);
        *resp.status_mut() = self.status;
        *resp.headers_mut() = self.headers;
        resp
    }
}

/// Checks the request method and runs the specified path. If no matching method is found
/// an method_not_allowed error is returned.
#[macro_export]
macro_rules! method {
    ($req:expr, {$($method:expr => $branch:expr),* $(,)?}) => {
        match $req.method() {
            $(
                method if method == $method => $branch,
            )*
            method if method == hyper::Method::OPTIONS => {
                use $crate::http::Response;
                use hyper::header::{HeaderValue, ALLOW, ACCESS_CONTROL_ALLOW_METHODS};

                let allow = vec![$($method.as_str()),*];
                let allow = HeaderValue::from_str(&allow.join(","))
                    .map_err(|_| $crate::StatusCodeError::internal_server_error())?;

                Ok(Response::no_content()
                    .header(ALLOW, allow.clone())
                    .header(ACCESS_CONTROL_ALLOW_METHODS, allow))
            }
            _ => Err($crate::StatusCodeError::method_not_allowed().into()),
        }
    };
}
