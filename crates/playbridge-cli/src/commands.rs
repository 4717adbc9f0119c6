//! CLI command implementations

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use playbridge_core::{
    format::resolve_format,
    mock::{CallLog, MockChannel, MockEngine, MockTexture},
    telemetry, ChannelListener, EngineEvent, EngineState, PlaybackSession, SessionRequest,
    SourceFormat, SourceStrategy, TracingAnalytics, VideoFormat,
};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;

use crate::output::print_output;

#[derive(Serialize)]
struct FormatReport<'a> {
    locator: &'a str,
    format: SourceFormat,
    token: &'static str,
    strategy: SourceStrategy,
}

/// Resolve and print the format of a locator
pub fn format(locator: &str, hint: Option<&str>, output: &str) -> anyhow::Result<()> {
    let format = resolve_format(locator, hint)?;
    let report = FormatReport {
        locator,
        format,
        token: format.token(),
        strategy: format.strategy(),
    };

    print_output(&report, output, |r| {
        println!("Source: {}", r.locator);
        println!("  Format: {} ({})", r.format, r.token);
        println!("  Strategy: {:?}", r.strategy);
    });
    Ok(())
}

/// Parse `key=value` header arguments
pub fn parse_headers(pairs: &[String]) -> anyhow::Result<HashMap<String, String>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => bail!("invalid header {pair:?}, expected key=value"),
        })
        .collect()
}

/// Resolve and print telemetry metadata
pub fn telemetry(
    locator: &str,
    pairs: &[String],
    headers_file: Option<PathBuf>,
    output: &str,
) -> anyhow::Result<()> {
    let mut headers = match headers_file {
        Some(path) => {
            let json = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<HashMap<String, String>>(&json)
                .with_context(|| format!("parsing {}", path.display()))?
        }
        None => HashMap::new(),
    };
    headers.extend(parse_headers(pairs)?);

    match telemetry::resolve(&headers, locator) {
        Ok(Some(metadata)) => print_output(&metadata, output, |m| {
            println!("Telemetry for {}", m.video_source_url);
            println!("  Environment: {}", m.environment_key);
            println!("  Title: {}", m.video_title);
            println!("  View session: {}", m.session_id);
            let optional = [
                ("Video id", &m.video_id),
                ("Content type", &m.content_type),
                ("Stream type", &m.stream_type),
                ("Series", &m.video_series),
                ("App version", &m.client_app_version),
            ];
            for (label, value) in optional {
                if let Some(value) = value {
                    println!("  {label}: {value}");
                }
            }
            if let Some(duration) = m.video_duration_millis {
                println!("  Duration: {duration} ms");
            }
            for i in 1..=telemetry::CUSTOM_FIELD_COUNT {
                if let Some(value) = m.custom_field(i) {
                    println!("  Custom {i}: {value}");
                }
            }
        }),
        Ok(None) => println!(
            "Telemetry disabled ({} is not \"{}\")",
            telemetry::ENABLE_ANALYTICS_KEY,
            telemetry::ENABLE_ANALYTICS_TOKEN
        ),
        Err(err) => println!("Telemetry rejected: {err}"),
    }
    Ok(())
}

/// Parse `WIDTHxHEIGHT[@ROTATION]`
pub fn parse_video(geometry: &str) -> anyhow::Result<VideoFormat> {
    let (size, rotation) = match geometry.split_once('@') {
        Some((size, rotation)) => (size, rotation.parse().context("invalid rotation")?),
        None => (geometry, 0),
    };
    let Some((width, height)) = size.split_once('x') else {
        bail!("invalid video geometry {geometry:?}, expected WIDTHxHEIGHT[@ROTATION]");
    };
    Ok(VideoFormat::new(
        width.parse().context("invalid width")?,
        height.parse().context("invalid height")?,
        rotation,
    ))
}

/// Settings for [`simulate`]
pub struct SimulateOptions {
    pub attach_after: usize,
    pub duration_ms: i64,
    pub video: Option<VideoFormat>,
    pub fail: Option<String>,
    pub interval_ms: u64,
}

fn script(fail: Option<&str>) -> Vec<EngineEvent> {
    let mut events = vec![
        EngineEvent::state(EngineState::Buffering),
        EngineEvent::state(EngineState::Ready),
        EngineEvent::state(EngineState::Buffering),
        EngineEvent::state(EngineState::Ready),
    ];
    events.push(match fail {
        Some(message) => EngineEvent::error(message),
        None => EngineEvent::state(EngineState::Ended),
    });
    events
}

/// Run a session against an in-process engine and print delivered events
pub async fn simulate(path: &Path, options: SimulateOptions) -> anyhow::Result<()> {
    let request = SessionRequest::from_json_file(path)
        .with_context(|| format!("loading request {}", path.display()))?;

    let log = CallLog::new();
    let mut engine = MockEngine::new(log.clone())
        .with_duration(options.duration_ms)
        .with_buffered(options.duration_ms / 4);
    if let Some(video) = options.video {
        engine = engine.with_video_format(video);
    }
    let (channel, handle) = MockChannel::new(log.clone());

    let mut session = PlaybackSession::new(
        request,
        Box::new(engine),
        Box::new(MockTexture::new(1, log.clone())),
        Box::new(channel),
        &TracingAnalytics,
    )?;

    let (listener, mut delivered) = ChannelListener::channel();
    let printer = tokio::spawn(async move {
        let mut count = 0usize;
        while let Some(message) = delivered.recv().await {
            println!("{}", serde_json::to_string(&message)?);
            count += 1;
        }
        Ok::<_, serde_json::Error>(count)
    });

    let script = script(options.fail.as_deref());
    let attach_after = options.attach_after;
    let interval = Duration::from_millis(options.interval_ms);
    let (tx, events) = mpsc::unbounded_channel();
    let listener = Arc::new(listener);

    let producer = tokio::spawn(async move {
        let mut attached = false;
        for (i, event) in script.into_iter().enumerate() {
            if i == attach_after {
                attached = handle.listen(listener.clone());
            }
            if tx.send(event).is_err() {
                break;
            }
            tokio::time::sleep(interval).await;
        }
        if !attached {
            handle.listen(listener);
        }
    });

    let final_state = session.drive(events).await;
    producer.await?;
    session.dispose();

    let printed = printer.await??;
    info!(
        state = %final_state,
        events = printed,
        engine_calls = log.calls().len(),
        "Simulation finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_headers() {
        let headers =
            parse_headers(&["muxEnvKey=env123".to_string(), "vtt=A=B".to_string()]).unwrap();
        assert_eq!(headers["muxEnvKey"], "env123");
        assert_eq!(headers["vtt"], "A=B");

        assert!(parse_headers(&["novalue".to_string()]).is_err());
        assert!(parse_headers(&["=x".to_string()]).is_err());
    }

    #[test]
    fn test_parse_video() {
        assert_eq!(parse_video("1920x1080").unwrap(), VideoFormat::new(1920, 1080, 0));
        assert_eq!(parse_video("1280x720@90").unwrap(), VideoFormat::new(1280, 720, 90));
        assert!(parse_video("1280").is_err());
        assert!(parse_video("axb").is_err());
    }

    #[test]
    fn test_script_ends_with_outcome() {
        assert_eq!(script(None).last(), Some(&EngineEvent::state(EngineState::Ended)));
        assert_eq!(
            script(Some("boom")).last(),
            Some(&EngineEvent::error("boom"))
        );
    }
}
