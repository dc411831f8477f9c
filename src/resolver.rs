use std::fmt::Display;
use std::fmt::Write;

use chrono::DateTime;
use chrono::TimeZone;

use crate::content::Content;
use crate::content::Frame;
use crate::store::Channel;

/// The text a channel should show at `now`, `None` when it should be blank.
///
/// Reads the channel only, calling it twice with the same inputs gives the
/// same answer.
pub fn resolve<Tz>(channel: &Channel, now: &DateTime<Tz>) -> Option<String>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let assignment = channel.assignment.as_ref()?;

    let text = match &assignment.content {
        Content::Text(text) => text.text.clone(),
        Content::Clock(clock) => format_clock(&clock.format, now),
        Content::Rotation(rotation) => {
            let frame = rotation.items.get(channel.rotation_index.unwrap_or(0))?;
            resolve_frame(frame, now)
        }
    };

    Some(text)
}

pub fn resolve_frame<Tz>(frame: &Frame, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match frame {
        Frame::Text(text) => text.text.clone(),
        Frame::Clock(clock) => format_clock(&clock.format, now),
    }
}

/// Render `now` through a strftime pattern. A pattern chrono cannot handle is
/// shown literally.
pub fn format_clock<Tz>(pattern: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut out = String::new();
    match write!(out, "{}", now.format(pattern)) {
        Ok(()) => out,
        Err(_) => pattern.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use chrono::FixedOffset;
    use chrono::TimeZone;

    use super::format_clock;
    use super::resolve;
    use crate::content::Clock;
    use crate::content::Content;
    use crate::content::Frame;
    use crate::content::Rotation;
    use crate::content::Seconds;
    use crate::content::Text;
    use crate::store::Assignment;
    use crate::store::Channel;

    fn noon() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(3600)
            .unwrap()
            .with_ymd_and_hms(2014, 7, 13, 12, 5, 9)
            .unwrap()
    }

    fn channel_with(content: Content) -> Channel {
        let mut channel = Channel::default();
        channel.assign(Some(Assignment {
            content,
            priority: 0,
            owner: "test".to_string(),
        }));
        channel
    }

    fn rotation() -> Content {
        Content::Rotation(Rotation {
            items: vec![
                Frame::Text(Text {
                    text: "Next Stop".to_string(),
                    duration: Some(Seconds::try_from(2.0).unwrap()),
                }),
                Frame::Clock(Clock {
                    format: "%H:%M".to_string(),
                    duration: None,
                }),
            ],
            default_duration: Seconds::try_from(5.0).unwrap(),
        })
    }

    #[test]
    fn test_empty_channel_is_blank() {
        assert_eq!(resolve(&Channel::default(), &noon()), None);
    }

    #[test]
    fn test_static_text() {
        let channel = channel_with(Content::Text(Text {
            text: "Frankfurt".to_string(),
            duration: None,
        }));
        assert_eq!(resolve(&channel, &noon()).as_deref(), Some("Frankfurt"));
    }

    #[test]
    fn test_clock() {
        let channel = channel_with(Content::Clock(Clock {
            format: "%d.%m.%Y %H:%M".to_string(),
            duration: None,
        }));
        assert_eq!(
            resolve(&channel, &noon()).as_deref(),
            Some("13.07.2014 12:05")
        );
    }

    #[test]
    fn test_invalid_pattern_is_shown_literally() {
        assert_eq!(format_clock("%Q broken", &noon()), "%Q broken");
    }

    #[test]
    fn test_rotation_without_index_shows_first_item() {
        let channel = channel_with(rotation());
        assert_eq!(resolve(&channel, &noon()).as_deref(), Some("Next Stop"));
    }

    #[test]
    fn test_rotation_follows_index() {
        let mut channel = channel_with(rotation());
        channel.rotation_index = Some(1);
        assert_eq!(resolve(&channel, &noon()).as_deref(), Some("12:05"));
    }

    #[test]
    fn test_resolve_is_pure() {
        let mut channel = channel_with(rotation());
        channel.rotation_index = Some(1);
        let now = noon();
        let first = resolve(&channel, &now);
        let second = resolve(&channel, &now);
        assert_eq!(first, second);
        assert_eq!(channel.rotation_index, Some(1));
    }
}
