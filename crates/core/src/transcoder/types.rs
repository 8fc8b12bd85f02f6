//! Request building, result parsing, and the progress sink seam.

use async_trait::async_trait;
use serde::Deserialize;

use crate::bus::{EventTemplate, SignedEvent, Tag, TRANSCODE_REQUEST_KIND};
use crate::task::{Artifact, Quality};

use super::error::JobError;

/// A progress update reported by the worker mid-job.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobProgress {
    /// Free-text status message.
    pub message: Option<String>,
    /// Completion percentage (0-100).
    pub percentage: Option<f32>,
    /// Estimated seconds remaining.
    pub eta_seconds: Option<u64>,
}

/// Receives progress updates during [`JobClient::await_result`].
///
/// The orchestrator implements this by persisting the update onto the
/// task's transcode record.
///
/// [`JobClient::await_result`]: super::JobClient::await_result
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn update(&self, progress: JobProgress);
}

/// Build the unsigned job-request event for one (input, quality) pair.
pub fn build_request(
    input_url: &str,
    worker_id: &str,
    quality: Quality,
    write_targets: &[String],
) -> EventTemplate {
    let mut relays_tag = vec!["relays".to_string()];
    relays_tag.extend(write_targets.iter().cloned());

    EventTemplate::new(TRANSCODE_REQUEST_KIND, "")
        .with_tag(Tag::new(["i", input_url, "url"]))
        .with_tag(Tag::pair("p", worker_id))
        .with_tag(Tag::new(["param", "mode", "mp4"]))
        .with_tag(Tag::new(["param", "resolution", quality.label()]))
        .with_tag(Tag(relays_tag))
}

/// Structured result payload. Workers that publish a bare URL instead are
/// handled by the fallback path.
#[derive(Debug, Deserialize)]
struct ResultPayload {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    urls: Option<Vec<String>>,
    #[serde(default)]
    mimetype: Option<String>,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    size_bytes: Option<u64>,
    #[serde(default)]
    bitrate: Option<u64>,
    #[serde(default)]
    resolution: Option<String>,
}

/// Parse a result event into an [`Artifact`].
///
/// `known_duration` backfills the artifact duration when the worker omits
/// it (the caller knows the input duration from upload probing).
pub fn parse_result_event(
    event: &SignedEvent,
    quality: Quality,
    known_duration: Option<f64>,
) -> Result<Artifact, JobError> {
    let payload = serde_json::from_str::<ResultPayload>(&event.content).ok();

    let url = match &payload {
        Some(p) => p
            .url
            .clone()
            .or_else(|| p.urls.as_ref().and_then(|urls| urls.first().cloned())),
        None => {
            let trimmed = event.content.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
    };
    let url = url.ok_or_else(|| {
        JobError::MalformedResult(format!("result event {} carries no output url", event.id))
    })?;

    let payload = payload.unwrap_or(ResultPayload {
        url: None,
        urls: None,
        mimetype: None,
        duration: None,
        size_bytes: None,
        bitrate: None,
        resolution: None,
    });

    let (video_codec, audio_codec) = payload
        .mimetype
        .as_deref()
        .map(split_codecs)
        .unwrap_or((None, None));

    let duration_seconds = payload.duration.or(known_duration).unwrap_or(0.0);

    let bitrate = payload.bitrate.or_else(|| {
        payload.size_bytes.and_then(|size| {
            (duration_seconds > 0.0).then(|| (size as f64 * 8.0 / duration_seconds) as u64)
        })
    });

    let dimension = payload
        .resolution
        .filter(|r| r.contains('x'))
        .unwrap_or_else(|| quality.dimension_label());

    Ok(Artifact {
        url,
        dimension,
        size_bytes: payload.size_bytes,
        duration_seconds,
        bitrate,
        video_codec,
        audio_codec,
        quality_label: quality.label().to_string(),
    })
}

/// Split a mimetype's `codecs` parameter into (video, audio) codec strings.
///
/// `video/mp4; codecs="avc1.64001f, mp4a.40.2"` → (avc1.64001f, mp4a.40.2).
fn split_codecs(mimetype: &str) -> (Option<String>, Option<String>) {
    let codecs = mimetype
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("codecs="))
        .map(|v| v.trim_matches('"'));

    let Some(codecs) = codecs else {
        return (None, None);
    };

    let mut parts = codecs.split(',').map(str::trim).filter(|s| !s.is_empty());
    (
        parts.next().map(str::to_string),
        parts.next().map(str::to_string),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::bus::TRANSCODE_RESULT_KIND;

    fn result_event(content: &str) -> SignedEvent {
        SignedEvent {
            id: "res1".to_string(),
            pubkey: "worker".to_string(),
            sig: "sig".to_string(),
            kind: TRANSCODE_RESULT_KIND,
            content: content.to_string(),
            tags: vec![Tag::pair("e", "req1")],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_build_request_tags() {
        let template = build_request(
            "https://example.com/in.mp4",
            "worker-pk",
            Quality::Q720p,
            &["wss://relay.example.com".to_string()],
        );

        assert_eq!(template.kind, TRANSCODE_REQUEST_KIND);
        let tags: Vec<Vec<String>> = template.tags.iter().map(|t| t.0.clone()).collect();
        assert!(tags.contains(&vec![
            "i".to_string(),
            "https://example.com/in.mp4".to_string(),
            "url".to_string()
        ]));
        assert!(tags.contains(&vec!["p".to_string(), "worker-pk".to_string()]));
        assert!(tags.contains(&vec![
            "param".to_string(),
            "mode".to_string(),
            "mp4".to_string()
        ]));
        assert!(tags.contains(&vec![
            "param".to_string(),
            "resolution".to_string(),
            "720p".to_string()
        ]));
        assert!(tags.contains(&vec![
            "relays".to_string(),
            "wss://relay.example.com".to_string()
        ]));
    }

    #[test]
    fn test_parse_structured_result() {
        let event = result_event(
            r#"{"url":"https://cdn.example.com/out.mp4","mimetype":"video/mp4; codecs=\"avc1.64001f, mp4a.40.2\"","duration":120.0,"size_bytes":9000000,"resolution":"1280x720"}"#,
        );

        let artifact = parse_result_event(&event, Quality::Q720p, None).unwrap();
        assert_eq!(artifact.url, "https://cdn.example.com/out.mp4");
        assert_eq!(artifact.dimension, "1280x720");
        assert_eq!(artifact.duration_seconds, 120.0);
        assert_eq!(artifact.video_codec.as_deref(), Some("avc1.64001f"));
        assert_eq!(artifact.audio_codec.as_deref(), Some("mp4a.40.2"));
        // 9 MB over 120 s
        assert_eq!(artifact.bitrate, Some(600_000));
        assert_eq!(artifact.quality_label, "720p");
    }

    #[test]
    fn test_parse_bare_url_result() {
        let event = result_event("https://cdn.example.com/out.mp4\n");
        let artifact = parse_result_event(&event, Quality::Q480p, Some(60.0)).unwrap();
        assert_eq!(artifact.url, "https://cdn.example.com/out.mp4");
        assert_eq!(artifact.duration_seconds, 60.0);
        // No dimensions from the worker: fall back to the quality table
        assert_eq!(artifact.dimension, "854x480");
        assert!(artifact.bitrate.is_none());
    }

    #[test]
    fn test_parse_urls_array() {
        let event = result_event(r#"{"urls":["https://a.example.com/1.mp4","https://b.example.com/1.mp4"]}"#);
        let artifact = parse_result_event(&event, Quality::Q720p, None).unwrap();
        assert_eq!(artifact.url, "https://a.example.com/1.mp4");
    }

    #[test]
    fn test_parse_explicit_bitrate_wins() {
        let event = result_event(
            r#"{"url":"https://cdn.example.com/out.mp4","duration":10.0,"size_bytes":1000,"bitrate":123456}"#,
        );
        let artifact = parse_result_event(&event, Quality::Q720p, None).unwrap();
        assert_eq!(artifact.bitrate, Some(123_456));
    }

    #[test]
    fn test_parse_empty_result_is_malformed() {
        let event = result_event("   ");
        let err = parse_result_event(&event, Quality::Q720p, None).unwrap_err();
        assert!(matches!(err, JobError::MalformedResult(_)));
    }

    #[test]
    fn test_split_codecs_variants() {
        assert_eq!(
            split_codecs(r#"video/mp4; codecs="avc1, mp4a""#),
            (Some("avc1".to_string()), Some("mp4a".to_string()))
        );
        assert_eq!(
            split_codecs(r#"video/mp4; codecs=hvc1"#),
            (Some("hvc1".to_string()), None)
        );
        assert_eq!(split_codecs("video/mp4"), (None, None));
    }
}
