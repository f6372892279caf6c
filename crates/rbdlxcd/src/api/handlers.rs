//! HTTP handlers for the `/lxc` endpoints.

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use rbdlxc::Orchestrator;
use rbdlxc::runtime::{
    BringDown, ContainerRecord, DEFAULT_FSTYPE, DEFAULT_PEER_PORT, DEFAULT_POOL, Move,
};
use rbdlxc_common::RbdlxcError;
use serde::{Deserialize, Serialize};

use super::error::ApiError;

type ApiResult<T> = Result<T, ApiError>;

/// `GET /lxc` parameters.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only report this container.
    pub name: Option<String>,
}

/// `GET /lxc` response.
#[derive(Debug, Serialize)]
pub struct ListResponse {
    /// Name of the answering host.
    pub server: String,
    /// Matching containers.
    pub containers: Vec<ContainerRecord>,
}

/// `GET /lxc/start` parameters.
#[derive(Debug, Deserialize)]
pub struct StartQuery {
    /// Container, and rbd image, name.
    pub name: Option<String>,
    /// Pool holding the image.
    pub pool: Option<String>,
    /// Filesystem type of the image.
    pub fstype: Option<String>,
}

/// `GET /lxc/stop` parameters.
#[derive(Debug, Deserialize)]
pub struct StopQuery {
    /// Container name.
    pub name: Option<String>,
}

/// `GET /lxc/moveto` parameters.
#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    /// Container name.
    pub name: Option<String>,
    /// Target host.
    pub next: Option<String>,
    /// Target daemon port.
    pub port: Option<String>,
}

/// Empty values count as absent.
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

fn required(name: &str, value: Option<String>) -> ApiResult<String> {
    present(value).ok_or_else(|| {
        RbdlxcError::MissingParameter {
            name: name.to_string(),
        }
        .into()
    })
}

fn parse_port(value: Option<String>) -> ApiResult<u16> {
    match present(value) {
        None => Ok(DEFAULT_PEER_PORT),
        Some(raw) => raw.parse().map_err(|_| {
            RbdlxcError::InvalidParameter {
                name: "port".to_string(),
                value: raw,
            }
            .into()
        }),
    }
}

/// List containers on this host.
pub async fn list_containers(
    State(orchestrator): State<Orchestrator>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<ListResponse>> {
    let filter = present(query.name);
    let containers = orchestrator.list(filter.as_deref()).await?;

    Ok(Json(ListResponse {
        server: orchestrator.local_host().to_string(),
        containers,
    }))
}

/// Attach, mount and start a container.
pub async fn start_container(
    State(orchestrator): State<Orchestrator>,
    Query(query): Query<StartQuery>,
) -> ApiResult<StatusCode> {
    let name = required("name", query.name)?;
    let pool = present(query.pool).unwrap_or_else(|| DEFAULT_POOL.to_string());
    let fstype = present(query.fstype).unwrap_or_else(|| DEFAULT_FSTYPE.to_string());

    let up = orchestrator.bring_up(&name, &pool, &fstype).await?;
    tracing::info!(
        container = %name,
        device = %up.device,
        starting = up.start.is_some(),
        "Bring-up accepted"
    );

    Ok(StatusCode::ACCEPTED)
}

/// Shut a container down and release its volume.
pub async fn stop_container(
    State(orchestrator): State<Orchestrator>,
    Query(query): Query<StopQuery>,
) -> ApiResult<StatusCode> {
    let name = required("name", query.name)?;

    match orchestrator.bring_down(&name).await? {
        BringDown::Initiated(_) => Ok(StatusCode::ACCEPTED),
        BringDown::AlreadyStopped => Ok(StatusCode::OK),
    }
}

/// Release a container here and bring it up on another host.
pub async fn move_container(
    State(orchestrator): State<Orchestrator>,
    Query(query): Query<MoveQuery>,
) -> ApiResult<StatusCode> {
    let name = required("name", query.name)?;
    let next = required("next", query.next)?;
    let port = parse_port(query.port)?;

    match orchestrator.move_to(&name, &next, port).await? {
        Move::AlreadyLocal => Ok(StatusCode::OK),
        Move::Relocated => Ok(StatusCode::ACCEPTED),
    }
}
