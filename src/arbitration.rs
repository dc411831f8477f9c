use crate::store::Channel;

/// Outcome of asking whether a request may replace a channel's assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accept,
    Reject { held_priority: i64 },
}

impl Decision {
    pub fn is_accepted(self) -> bool {
        matches!(self, Decision::Accept)
    }
}

/// Owners may always replace their own content. Anybody else needs a
/// strictly higher priority than what the channel holds.
pub fn decide(channel: &Channel, priority: i64, owner: &str) -> Decision {
    let (Some(held_priority), Some(held_owner)) = (channel.priority(), channel.owner()) else {
        return Decision::Accept;
    };

    if held_owner == owner || priority > held_priority {
        Decision::Accept
    } else {
        Decision::Reject { held_priority }
    }
}
