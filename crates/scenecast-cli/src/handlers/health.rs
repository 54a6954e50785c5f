#![deny(clippy::all, clippy::pedantic)]

use reqwest::{Method, StatusCode};
use scenecast_api_types::{HealthResponse, HealthStatus};

use crate::client::{CliError, Ctx};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx) -> Result<(), CliError> {
    let res: HealthResponse = ctx
        .request(
            Method::GET,
            "health",
            None::<&()>,
            &[StatusCode::SERVICE_UNAVAILABLE],
        )
        .await?;
    print_json(&res)?;

    match res.status {
        HealthStatus::Healthy => Ok(()),
        HealthStatus::Unhealthy => Err(CliError::Unhealthy),
    }
}
