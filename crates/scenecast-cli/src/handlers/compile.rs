#![deny(clippy::all, clippy::pedantic)]

use reqwest::{Method, StatusCode};
use scenecast_api_types::{CompileRequest, CompileResponse};

use super::{Summary, failure};
use crate::args::CompileArgs;
use crate::client::{CliError, Ctx};
use crate::io::{read_value, write_artifact};
use crate::print::print_json;

pub async fn handle(ctx: &Ctx, args: CompileArgs) -> Result<(), CliError> {
    let body = CompileRequest {
        python_code: Some(read_value(args.script, args.script_file)?),
        class_name: args.class_name,
        quality: args.quality,
    };

    let res: CompileResponse = ctx
        .request(
            Method::POST,
            "compile",
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
        scene_count: None,
    })
}
