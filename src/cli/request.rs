//! Request and get command implementations

use reqwest::Method;

use crate::cli::args::GlobalOptions;
use crate::cli::CommandContext;
use crate::client::{ApiRequest, ApiResponse};
use crate::error::Result;

/// Build a request from CLI arguments, parsing `data` as a JSON body.
pub fn build(method: Method, path: &str, data: Option<&str>) -> Result<ApiRequest> {
    let request = ApiRequest::new(method, path);
    match data {
        Some(data) => Ok(request.with_body(serde_json::from_str(data)?)),
        None => Ok(request),
    }
}

/// Send `request` through the pipeline and print the response body.
pub async fn run(opts: &GlobalOptions, request: ApiRequest, raw: bool) -> Result<()> {
    let mut ctx = CommandContext::new(opts)?;
    let outcome = ctx.pipeline.send(request).await;
    ctx.report_session_events();

    let response = outcome?.error_for_status()?;
    let body = render_body(&response, raw);
    if !body.is_empty() {
        println!("{}", body);
    }
    Ok(())
}

/// Pretty-print JSON bodies unless `raw`; anything else is printed as received.
fn render_body(response: &ApiResponse, raw: bool) -> String {
    if raw {
        return response.text().to_string();
    }

    match response.json::<serde_json::Value>() {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| response.text().to_string()),
        Err(_) => response.text().to_string(),
    }
}
