//! Server-sent-event rendering: deterministic, bit-stable text framing with a
//! base64-encoded little-endian float payload for block samples.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// The three event types a session ever produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Heartbeat,
    AudioBlock,
    VizBlock,
}

impl EventKind {
    const fn as_str(self) -> &'static str {
        match self {
            EventKind::Heartbeat => "heartbeat",
            EventKind::AudioBlock => "audio-block",
            EventKind::VizBlock => "viz-block",
        }
    }
}

/// A single queued SSE event. `samples` is empty for heartbeats.
#[derive(Debug, Clone)]
pub struct Event {
    pub id: Option<u64>,
    pub kind: EventKind,
    pub samples: Vec<f64>,
}

impl Event {
    pub const fn heartbeat() -> Self {
        Self {
            id: None,
            kind: EventKind::Heartbeat,
            samples: Vec::new(),
        }
    }

    pub const fn audio_block(id: u64, samples: Vec<f64>) -> Self {
        Self {
            id: Some(id),
            kind: EventKind::AudioBlock,
            samples,
        }
    }

    pub const fn viz_block(id: u64, samples: Vec<f64>) -> Self {
        Self {
            id: Some(id),
            kind: EventKind::VizBlock,
            samples,
        }
    }

    /// Renders the SSE wire form: `id: <n>\n` (empty when absent, still
    /// emitted — this resets the client's last-event-id),
    /// `event: <type>\n`, `data: <base64>\n`, then a blank terminating line.
    pub fn render(&self) -> String {
        let mut bytes = Vec::with_capacity(self.samples.len() * 8);
        for sample in &self.samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let data = BASE64.encode(bytes);

        let id = self.id.map_or(String::new(), |id| id.to_string());

        let mut out = String::new();
        out.push_str(&format!("id: {id}\n"));
        out.push_str(&format!("event: {}\n", self.kind.as_str()));
        out.push_str(&format!("data: {data}\n\n"));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_single_sample_audio_block() {
        let event = Event::audio_block(0, vec![1.0]);
        let rendered = event.render();
        assert!(rendered.contains("event: audio-block"));
        assert!(rendered.contains("data: AAAAAAAA8D8="));
        assert!(rendered.ends_with("\n\n"));
    }

    #[test]
    fn heartbeat_renders_empty_id_line() {
        let rendered = Event::heartbeat().render();
        assert!(rendered.starts_with("id: \n"));
        assert!(rendered.contains("event: heartbeat"));
    }
}
