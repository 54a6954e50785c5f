#![deny(clippy::all, clippy::pedantic)]

use reqwest::{Method, StatusCode};
use scenecast_api_types::{MergeRequest, MergeResponse};

use super::{Summary, failure};
use crate::args::MergeArgs;
use crate::client::{CliError, Ctx};
use crate::io::write_artifact;
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, args: MergeArgs) -> Result<(), CliError> {
    if args
        .transition_duration
        .is_some_and(|duration| !(duration.is_finite() && duration > 0.0))
    {
        return Err(CliError::InvalidInput(
            "transition duration must be a positive number".into(),
        ));
    }

    let body = MergeRequest {
        video_urls: Some(serde_json::Value::from(args.urls)),
        add_transitions: Some(args.transitions),
        transition_duration: args.transition_duration,
    };

    let res: MergeResponse = ctx
        .request(
            Method::POST,
            "merge",
            Some(&body),
            &[StatusCode::BAD_REQUEST],
        )
        .await?;

    let Some(encoded) = res.video_bytes_base64.as_deref().filter(|_| res.success) else {
        return Err(failure(res.error, res.error_kind, res.logs.as_deref()));
    };

    let bytes = write_artifact(encoded, &args.out)?;
    print_json(&Summary {
        output: args.out.display().to_string(),
        bytes,
        duration: res.duration,
        scene_count: res.scene_count,
    })
}
