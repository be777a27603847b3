use std::{collections::HashMap, convert::Infallible, net::SocketAddr, sync::Arc};

use anyhow::{Context, Result as AnyhowResult};
use hyper::{
    body::Bytes,
    header::{self, HeaderValue},
    server::conn::AddrStream,
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use log::{debug, error, info, warn};
use multer::{Constraints, Multipart, SizeLimit};
use serde::Serialize;

use crate::animation::{self, AnimationParams, ParamLimits};
use crate::config::Config;
use crate::error::AnimationError;

pub const GENERATE_PATH: &str = "/api/generate";

#[derive(Debug, Clone)]
pub struct AppState {
    pub limits: ParamLimits,
    pub max_upload_bytes: u64,
}

impl From<&Config> for AppState {
    fn from(config: &Config) -> Self {
        Self {
            limits: config.limits(),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }

    fn into_response(self) -> Response<Body> {
        let body = serde_json::to_vec(&ErrorBody {
            error: &self.message,
        })
        .unwrap_or_else(|_| br#"{"error":"unknown error"}"#.to_vec());
        let mut resp = Response::new(Body::from(body));
        *resp.status_mut() = self.status;
        resp.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        resp
    }
}

impl From<AnimationError> for ApiError {
    fn from(err: AnimationError) -> Self {
        if err.is_client_error() {
            warn!("rejected request: {err}");
        } else {
            error!("failed to make animation: {err}");
        }
        match err {
            AnimationError::BadParameter(detail) => {
                Self::bad_request(format!("Invalid parameter: {detail}"))
            }
            AnimationError::InvalidImage(_) => Self::bad_request(
                "Could not read the image. It might be corrupted or in an unsupported format.",
            ),
            AnimationError::EncodingFailure(_) | AnimationError::Internal(_) => {
                Self::internal("Failed to process image")
            }
        }
    }
}

impl From<multer::Error> for ApiError {
    fn from(err: multer::Error) -> Self {
        warn!("bad multipart body: {err}");
        Self::bad_request(format!("Malformed upload: {err}"))
    }
}

fn with_cors(mut resp: Response<Body>) -> Response<Body> {
    let headers = resp.headers_mut();
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Disposition"),
    );
    resp
}

struct Upload {
    file_name: Option<String>,
    data: Bytes,
}

#[derive(Default)]
struct Form {
    image: Option<Upload>,
    /// Every other field, as text.
    fields: HashMap<String, String>,
}

async fn read_form(req: Request<Body>, state: &AppState) -> Result<Form, ApiError> {
    let boundary = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .and_then(|ct| multer::parse_boundary(ct).ok())
        .ok_or_else(|| ApiError::bad_request("Expected a multipart/form-data body"))?;
    let constraints =
        Constraints::new().size_limit(SizeLimit::new().whole_stream(state.max_upload_bytes));
    let mut multipart = Multipart::with_constraints(req.into_body(), boundary, constraints);

    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await? {
        // unnamed fields are drained by next_field
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        if name == "image" {
            let file_name = field.file_name().map(str::to_owned);
            let data = field.bytes().await?;
            form.image = Some(Upload { file_name, data });
        } else {
            let value = field.text().await?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

async fn generate(req: Request<Body>, state: &AppState) -> Result<Response<Body>, ApiError> {
    let form = read_form(req, state).await?;

    let upload = form
        .image
        .ok_or_else(|| ApiError::bad_request("No image file provided"))?;
    if upload.file_name.as_deref() == Some("") {
        return Err(ApiError::bad_request("No image file selected"));
    }
    let params = AnimationParams::parse(
        |name: &str| form.fields.get(name).map(String::as_str),
        &state.limits,
    )?;
    debug!(
        "upload of {} bytes, {} frames over {}s",
        upload.data.len(),
        params.frame_count,
        params.duration_secs
    );

    // decoding and encoding are cpu bound, keep them off the reactor
    let animation = tokio::task::spawn_blocking(move || {
        let image = animation::decode_image(&upload.data)?;
        animation::create_animation(&image, params)
    })
    .await
    .map_err(|e| AnimationError::internal(format!("animation worker died: {e}")))??;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, animation.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", animation.filename()),
        )
        .body(Body::from(animation.data))
        .map_err(|e| ApiError::internal(format!("could not build response: {e}")))
}

pub async fn handle(
    req: Request<Body>,
    state: Arc<AppState>,
) -> Result<Response<Body>, Infallible> {
    let method = req.method().clone();
    let path = req.uri().path().to_owned();
    debug!("{method} {path}");
    let resp = match (&method, path.as_str()) {
        (&Method::OPTIONS, _) => {
            let mut resp = Response::new(Body::empty());
            *resp.status_mut() = StatusCode::NO_CONTENT;
            resp
        }
        (&Method::POST, GENERATE_PATH) => match generate(req, &state).await {
            Ok(resp) => resp,
            Err(e) => e.into_response(),
        },
        (_, GENERATE_PATH) => ApiError {
            status: StatusCode::METHOD_NOT_ALLOWED,
            message: "Method not allowed".into(),
        }
        .into_response(),
        _ => ApiError {
            status: StatusCode::NOT_FOUND,
            message: "Not found".into(),
        }
        .into_response(),
    };
    Ok(with_cors(resp))
}

pub async fn serve(config: Config) -> AnyhowResult<()> {
    let addr = config.addr();
    let state = Arc::new(AppState::from(&config));

    let make_svc = make_service_fn(move |conn: &AddrStream| {
        let remote: SocketAddr = conn.remote_addr();
        let state = state.clone();
        async move {
            debug!("connection from {remote}");
            Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone())))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("could not bind to {addr}"))?
        .serve(make_svc);
    info!("listening on http://{addr}");

    server
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("could not listen for ctrl-c: {e}");
                std::future::pending::<()>().await;
            }
            info!("shutting down");
        })
        .await
        .context("server error")
}
