//! Per-frame routing policy.

use felt_core::EventKind;
use felt_settings::RoutingSettings;

/// Where a decoded frame goes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameRoute {
    /// Logged only.
    Silent,
    /// Dispatched to listeners of its type, and optionally buffered too.
    FanOut {
        /// Whether the frame is also appended to the recency buffer.
        buffer: bool,
    },
    /// Appended to the recency buffer only.
    Buffer,
}

/// Routing decisions derived from [`RoutingSettings`].
#[derive(Clone, Debug)]
pub struct FrameRouter {
    settings: RoutingSettings,
}

impl Default for FrameRouter {
    fn default() -> Self {
        Self::from_settings(&RoutingSettings::default())
    }
}

impl FrameRouter {
    /// Build a router from settings.
    pub fn from_settings(settings: &RoutingSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Route for a frame of `kind`.
    pub fn route(&self, kind: &EventKind) -> FrameRoute {
        if self.settings.is_silent(kind.as_str()) {
            return FrameRoute::Silent;
        }
        match kind {
            EventKind::Message => FrameRoute::Buffer,
            EventKind::Other(_) => FrameRoute::FanOut {
                buffer: self.settings.buffer_unknown_types,
            },
            EventKind::Connected
            | EventKind::Ping
            | EventKind::ReloadCreated
            | EventKind::ReloadApproved
            | EventKind::ReloadStatus
            | EventKind::BalanceUpdated
            | EventKind::DashboardRefresh => FrameRoute::FanOut { buffer: false },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy() {
        let router = FrameRouter::default();
        assert_eq!(router.route(&EventKind::Connected), FrameRoute::Silent);
        assert_eq!(router.route(&EventKind::Ping), FrameRoute::Silent);
        assert_eq!(
            router.route(&EventKind::ReloadCreated),
            FrameRoute::FanOut { buffer: false }
        );
        assert_eq!(
            router.route(&EventKind::DashboardRefresh),
            FrameRoute::FanOut { buffer: false }
        );
        assert_eq!(router.route(&EventKind::Message), FrameRoute::Buffer);
        assert_eq!(
            router.route(&EventKind::Other("table_closed".into())),
            FrameRoute::FanOut { buffer: true }
        );
    }

    #[test]
    fn ping_can_be_fanned_out() {
        let router = FrameRouter::from_settings(&RoutingSettings {
            silent_types: vec!["connected".into()],
            buffer_unknown_types: false,
        });
        assert_eq!(router.route(&EventKind::Ping), FrameRoute::FanOut { buffer: false });
        assert_eq!(
            router.route(&EventKind::Other("x".into())),
            FrameRoute::FanOut { buffer: false }
        );
    }

    #[test]
    fn domain_type_can_be_silenced() {
        let router = FrameRouter::from_settings(&RoutingSettings {
            silent_types: vec!["dashboard_refresh".into()],
            buffer_unknown_types: true,
        });
        assert_eq!(router.route(&EventKind::DashboardRefresh), FrameRoute::Silent);
        assert_eq!(router.route(&EventKind::Connected), FrameRoute::FanOut { buffer: false });
    }

    #[test]
    fn unknown_type_can_be_silenced() {
        let router = FrameRouter::from_settings(&RoutingSettings {
            silent_types: vec!["heartbeat".into()],
            buffer_unknown_types: true,
        });
        assert_eq!(router.route(&EventKind::from_name("heartbeat")), FrameRoute::Silent);
    }
}
