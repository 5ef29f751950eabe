use serde::{Deserialize, Serialize};

/// Room mode, fixed at room creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomMode {
    /// Direct two-party call; admission capped at two participants.
    OneToOne,
    /// One broadcaster, any number of viewers.
    Broadcasting,
    /// Screen sharing session; no admission cap.
    ScreenSharing,
}

impl RoomMode {
    /// Parse a client-supplied mode string. Unrecognized values coerce to
    /// `OneToOne`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "broadcasting" => Self::Broadcasting,
            "screen_sharing" => Self::ScreenSharing,
            _ => Self::OneToOne,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::Broadcasting => "broadcasting",
            Self::ScreenSharing => "screen_sharing",
        }
    }
}

impl std::fmt::Display for RoomMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection details carried in room snapshots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConnectionInfo {
    #[serde(rename = "type")]
    pub mode: RoomMode,
    pub is_broadcaster: bool,
    pub is_screen_share: bool,
}
