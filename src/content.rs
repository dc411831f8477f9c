//! Content descriptors: what a channel is supposed to show.
//!
//! The serde representation doubles as the wire format of assign requests and
//! as the on-disk format of the state file, so renaming a field here is a
//! protocol change.

use std::time::Duration;

/// A non-negative, finite number of seconds as sent by clients.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Seconds(f64);

impl Seconds {
    pub fn as_duration(self) -> Duration {
        Duration::try_from_secs_f64(self.0).unwrap_or(Duration::MAX)
    }
}

impl TryFrom<f64> for Seconds {
    type Error = ContentError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if Duration::try_from_secs_f64(value).is_ok() {
            Ok(Self(value))
        } else {
            Err(ContentError::InvalidSeconds(value))
        }
    }
}

impl From<Seconds> for f64 {
    fn from(value: Seconds) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Content {
    #[serde(rename = "text")]
    Text(Text),

    #[serde(rename = "time")]
    Clock(Clock),

    #[serde(rename = "sequence")]
    Rotation(Rotation),
}

/// One item of a rotation. Rotations do not nest.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    #[serde(rename = "text")]
    Text(Text),

    #[serde(rename = "time")]
    Clock(Clock),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Text {
    pub text: String,

    /// Only meaningful inside a rotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Seconds>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Clock {
    /// strftime-style pattern, e.g. `%d.%m.%Y %H:%M`
    pub format: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Seconds>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rotation {
    #[serde(rename = "messages")]
    pub items: Vec<Frame>,

    /// Applies to every item without a duration of its own.
    #[serde(rename = "interval")]
    pub default_duration: Seconds,
}

impl Content {
    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ContentError> {
        match self {
            Content::Rotation(rotation) if rotation.items.is_empty() => {
                Err(ContentError::EmptyRotation)
            }
            _ => Ok(()),
        }
    }

    /// Strip every character the displays cannot show from texts and clock
    /// patterns.
    pub fn sanitized(self) -> Self {
        match self {
            Content::Text(text) => Content::Text(text.sanitized()),
            Content::Clock(clock) => Content::Clock(clock.sanitized()),
            Content::Rotation(Rotation {
                items,
                default_duration,
            }) => Content::Rotation(Rotation {
                items: items.into_iter().map(Frame::sanitized).collect(),
                default_duration,
            }),
        }
    }
}

impl Frame {
    pub fn duration(&self) -> Option<Seconds> {
        match self {
            Frame::Text(text) => text.duration,
            Frame::Clock(clock) => clock.duration,
        }
    }

    fn sanitized(self) -> Self {
        match self {
            Frame::Text(text) => Frame::Text(text.sanitized()),
            Frame::Clock(clock) => Frame::Clock(clock.sanitized()),
        }
    }
}

impl Text {
    fn sanitized(self) -> Self {
        Self {
            text: crate::charset::filter(&self.text),
            duration: self.duration,
        }
    }
}

impl Clock {
    fn sanitized(self) -> Self {
        Self {
            format: crate::charset::filter(&self.format),
            duration: self.duration,
        }
    }
}

impl Rotation {
    /// Display duration of the item at `index`.
    pub fn duration_of(&self, index: usize) -> Duration {
        self.items
            .get(index)
            .and_then(Frame::duration)
            .unwrap_or(self.default_duration)
            .as_duration()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("Durations must be finite and non-negative, got {0}")]
    InvalidSeconds(f64),

    #[error("A sequence needs at least one message")]
    EmptyRotation,
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::Content;
    use super::Frame;

    #[test]
    fn test_deser_text() {
        let content: Content =
            serde_json::from_str(r#"{"type": "text", "text": "Hello world"}"#).unwrap();
        let Content::Text(text) = content else {
            panic!("Expected text, got {content:?}")
        };
        assert_eq!(text.text, "Hello world");
        assert!(text.duration.is_none());
    }

    #[test]
    fn test_deser_time() {
        let content: Content =
            serde_json::from_str(r#"{"type": "time", "format": "%d.%m.%Y %H:%M"}"#).unwrap();
        assert!(matches!(content, Content::Clock(ref c) if c.format == "%d.%m.%Y %H:%M"));
    }

    #[test]
    fn test_deser_sequence_durations() {
        let s = r#"{
            "type": "sequence",
            "messages": [
                {"type": "text", "text": "Next Stop", "duration": 2.0},
                {"type": "time", "format": "%H:%M"}
            ],
            "interval": 5.0
        }"#;
        let content: Content = serde_json::from_str(s).unwrap();
        let Content::Rotation(rotation) = content else {
            panic!("Expected sequence, got {content:?}")
        };
        assert_eq!(rotation.items.len(), 2);
        assert_eq!(rotation.duration_of(0), Duration::from_secs(2));
        assert_eq!(rotation.duration_of(1), Duration::from_secs(5));
    }

    #[test]
    fn test_zero_duration_is_kept() {
        let s = r#"{"type": "sequence", "messages": [{"type": "text", "text": "A", "duration": 0}], "interval": 5}"#;
        let Content::Rotation(rotation) = serde_json::from_str(s).unwrap() else {
            panic!("Expected sequence")
        };
        assert_eq!(rotation.duration_of(0), Duration::ZERO);
    }

    #[test]
    fn test_nested_sequence_is_rejected() {
        let s = r#"{
            "type": "sequence",
            "messages": [{"type": "sequence", "messages": [], "interval": 1}],
            "interval": 5
        }"#;
        assert!(serde_json::from_str::<Content>(s).is_err());
    }

    #[test]
    fn test_negative_duration_is_rejected() {
        let s = r#"{"type": "text", "text": "A", "duration": -1.5}"#;
        assert!(serde_json::from_str::<Content>(s).is_err());
    }

    #[test]
    fn test_empty_sequence_fails_validation() {
        let s = r#"{"type": "sequence", "messages": [], "interval": 5}"#;
        let content: Content = serde_json::from_str(s).unwrap();
        assert!(content.validate().is_err());
    }

    #[test]
    fn test_sanitized_filters_every_item() {
        let s = r#"{
            "type": "sequence",
            "messages": [
                {"type": "text", "text": "Bus 🚌 Süd"},
                {"type": "time", "format": "%H:%M ✓"}
            ],
            "interval": 5
        }"#;
        let content: Content = serde_json::from_str(s).unwrap();
        let Content::Rotation(rotation) = content.sanitized() else {
            panic!("Expected sequence")
        };
        assert!(matches!(&rotation.items[0], Frame::Text(t) if t.text == "Bus  Süd"));
        assert!(matches!(&rotation.items[1], Frame::Clock(c) if c.format == "%H:%M "));
    }

    #[test]
    fn test_ser_sequence() {
        let s = r#"{"type": "sequence", "messages": [{"type": "text", "text": "A", "duration": 2.0}, {"type": "text", "text": "B"}], "interval": 5.0}"#;
        let content: Content = serde_json::from_str(s).unwrap();
        let json = serde_json::to_string_pretty(&content).unwrap();
        insta::assert_snapshot!(json, @r#"
        {
          "type": "sequence",
          "messages": [
            {
              "type": "text",
              "text": "A",
              "duration": 2.0
            },
            {
              "type": "text",
              "text": "B"
            }
          ],
          "interval": 5.0
        }
        "#);
    }
}
