//! System reset contract.

/// Reset type argument of the system reset call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResetType {
    /// Power the platform off.
    Shutdown = 0,
    /// Full power cycle.
    ColdReboot = 1,
    /// Reboot without removing power.
    WarmReboot = 2,
}

impl ResetType {
    /// Decodes a raw reset type; `None` for reserved values.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::Shutdown),
            1 => Some(Self::ColdReboot),
            2 => Some(Self::WarmReboot),
            _ => None,
        }
    }
}

/// Reset reason argument of the system reset call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResetReason {
    /// No reason given.
    NoReason = 0,
    /// The caller hit an unrecoverable failure.
    SystemFailure = 1,
}

impl ResetReason {
    /// Decodes a raw reset reason; `None` for reserved values.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(Self::NoReason),
            1 => Some(Self::SystemFailure),
            _ => None,
        }
    }
}

/// A device able to shut down or reboot the platform.
pub trait SystemResetDevice: Sync {
    /// Name for logging.
    fn name(&self) -> &'static str;

    /// Returns `true` if this device can perform `kind`.
    fn can_handle(&self, kind: ResetType, reason: ResetReason) -> bool;

    /// Performs the reset. Never returns; on failure the hart is parked.
    fn reset(&self, kind: ResetType, reason: ResetReason) -> !;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_raw_arguments() {
        assert_eq!(ResetType::from_raw(0), Some(ResetType::Shutdown));
        assert_eq!(ResetType::from_raw(2), Some(ResetType::WarmReboot));
        assert_eq!(ResetType::from_raw(3), None);
        assert_eq!(ResetReason::from_raw(1), Some(ResetReason::SystemFailure));
        assert_eq!(ResetReason::from_raw(0xF000_0000), None);
    }
}
