//! Connection lifecycle state machine.

use crate::error::HicpError;

/// Phase of one client connection.
///
/// Every connection starts in `WaitConnect`. A connect event moves it
/// either straight to `Running` or through `WaitAuthenticate` when
/// credentials are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Waiting for the client's connect event.
    WaitConnect,
    /// Connect received, authenticate event outstanding.
    WaitAuthenticate,
    /// Application started, normal event flow.
    Running,
}

impl SessionPhase {
    /// Validate and apply a phase transition.
    pub fn transition(self, next: SessionPhase) -> Result<SessionPhase, HicpError> {
        let ok = matches!(
            (self, next),
            (SessionPhase::WaitConnect, SessionPhase::WaitAuthenticate)
                | (SessionPhase::WaitConnect, SessionPhase::Running)
                | (SessionPhase::WaitAuthenticate, SessionPhase::WaitAuthenticate)
                | (SessionPhase::WaitAuthenticate, SessionPhase::Running)
        );
        if ok {
            Ok(next)
        } else {
            Err(HicpError::ProtocolViolation("invalid phase transition"))
        }
    }

    pub fn is_running(self) -> bool {
        self == SessionPhase::Running
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_paths() {
        let phase = SessionPhase::WaitConnect;
        assert_eq!(
            phase.transition(SessionPhase::Running).unwrap(),
            SessionPhase::Running
        );
        assert_eq!(
            phase.transition(SessionPhase::WaitAuthenticate).unwrap(),
            SessionPhase::WaitAuthenticate
        );
    }

    #[test]
    fn authenticate_retry_allowed() {
        let phase = SessionPhase::WaitAuthenticate;
        assert!(phase.transition(SessionPhase::WaitAuthenticate).is_ok());
        assert!(phase.transition(SessionPhase::Running).is_ok());
    }

    #[test]
    fn no_way_back() {
        assert!(SessionPhase::Running
            .transition(SessionPhase::WaitConnect)
            .is_err());
        assert!(SessionPhase::Running
            .transition(SessionPhase::WaitAuthenticate)
            .is_err());
        assert!(SessionPhase::WaitAuthenticate
            .transition(SessionPhase::WaitConnect)
            .is_err());
    }
}
