//! `herd stream` - print a live event stream until it ends or Ctrl-C

use anyhow::{bail, Context};
use herd_foundation::HerdConfig;
use herd_stream::{EventRouter, StreamRequest, StreamSession, StreamState};
use std::io::Write;

pub struct StreamArgs {
    pub url: String,
    pub headers: Vec<String>,
    pub body: Option<String>,
    pub events: bool,
}

/// Split `Name: value`
fn parse_header(raw: &str) -> anyhow::Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("invalid header '{}', expected 'Name: value'", raw);
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("invalid header '{}', empty name", raw);
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn build_request(args: &StreamArgs) -> anyhow::Result<StreamRequest> {
    let mut request = StreamRequest::post(&args.url);

    if let Some(body) = &args.body {
        let payload: serde_json::Value =
            serde_json::from_str(body).context("--body is not valid JSON")?;
        request = request.json(&payload);
    }

    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.header(name, value);
    }

    Ok(request)
}

fn printer(show_named: bool) -> EventRouter {
    let router = EventRouter::new()
        .on_message(|event| {
            print!("{}", event.data);
            let _ = std::io::stdout().flush();
        })
        .on_error(|error| eprintln!("\nError: {}", error))
        .on_close(|| println!());

    if show_named {
        router.fallback(|event| println!("\n[{}] {}", event.kind, event.data))
    } else {
        router
    }
}

pub async fn run(config: &HerdConfig, args: StreamArgs) -> anyhow::Result<()> {
    let request = build_request(&args)?;
    let session = StreamSession::http(config.stream.clone());

    session.start_with(request, printer(args.events));

    let state = tokio::select! {
        state = session.wait() => state,
        _ = tokio::signal::ctrl_c() => {
            session.cancel();
            eprintln!("\nCancelled");
            StreamState::Cancelled
        }
    };

    let snapshot = session.snapshot();
    tracing::debug!(
        %state,
        events = snapshot.events,
        bytes = snapshot.buffer.len(),
        "Stream finished"
    );

    match (state, snapshot.error) {
        (StreamState::Failed, Some(error)) => bail!(error),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(headers: &[&str], body: Option<&str>) -> StreamArgs {
        StreamArgs {
            url: "http://localhost/stream".into(),
            headers: headers.iter().map(|h| h.to_string()).collect(),
            body: body.map(str::to_string),
            events: false,
        }
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("Authorization:  Bearer a:b ").unwrap(),
            ("Authorization".to_string(), "Bearer a:b".to_string())
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_build_request() {
        let request = build_request(&args(&["X-Farm: 3"], Some(r#"{"goat": 1}"#))).unwrap();
        assert_eq!(request.body.as_deref(), Some(r#"{"goat":1}"#));
        assert!(request
            .headers
            .contains(&("X-Farm".to_string(), "3".to_string())));
    }

    #[test]
    fn test_build_request_rejects_bad_body() {
        assert!(build_request(&args(&[], Some("{not json"))).is_err());
    }
}
