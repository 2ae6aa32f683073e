//! Backend negotiation
//!
//! Decides which backend to build from the preferred [`VideoMode`] and the
//! [`BackendTable`], then builds it. Failures of individual backends stay
//! inside this module as [`BackendAttempt`] values; only exhausting every
//! candidate becomes an error.

use crate::render::backends::{BackendKind, BackendTable, DeviceParams, VideoMode};
use crate::render::device::Device;
use crate::render::error::{BackendAttempt, InitFailureCause, VideoError, VideoResult};

/// Which backend negotiation settles on, without building anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionOutcome {
    /// The OpenGL backend is tried first
    OpenGl,
    /// The Vulkan backend is tried first
    Vulkan,
    /// No candidate is available
    Failed,
}

impl From<BackendKind> for SelectionOutcome {
    fn from(kind: BackendKind) -> Self {
        match kind {
            BackendKind::OpenGl => Self::OpenGl,
            BackendKind::Vulkan => Self::Vulkan,
            BackendKind::Null => Self::Failed,
        }
    }
}

/// Available candidates for `mode`, in the order they would be tried
pub fn plan(mode: VideoMode, table: &BackendTable) -> Vec<BackendKind> {
    mode.candidates()
        .iter()
        .copied()
        .filter(|kind| table.is_available(*kind))
        .collect()
}

/// Outcome for the first candidate of `mode`
pub fn outcome(mode: VideoMode, table: &BackendTable) -> SelectionOutcome {
    plan(mode, table)
        .first()
        .map_or(SelectionOutcome::Failed, |kind| SelectionOutcome::from(*kind))
}

/// Build a device for `mode`
///
/// Tries each candidate of [`plan`] in order and returns the first device
/// that constructs. A failed candidate is logged and leaves nothing behind.
/// Fails with [`VideoError::DeviceInitFailure`] when a specific family was
/// requested but is not in the table, or when every candidate failed.
pub fn select_and_construct(
    mode: VideoMode,
    table: &BackendTable,
    params: &DeviceParams,
) -> VideoResult<Box<dyn Device>> {
    let candidates = plan(mode, table);

    if candidates.is_empty() && mode != VideoMode::Any {
        log::warn!("Requested {} backend is not available", mode);
        return Err(VideoError::DeviceInitFailure(InitFailureCause::Unavailable(mode)));
    }

    let mut attempts = Vec::with_capacity(candidates.len());
    for kind in candidates {
        let Some(factory) = table.factory(kind) else {
            continue;
        };

        log::debug!("Trying {} backend", kind);
        match factory(params) {
            Ok(device) => {
                log::info!("{} backend selected", kind);
                return Ok(device);
            }
            Err(error) => {
                log::warn!("{} backend failed: {}", kind, error);
                attempts.push(BackendAttempt { backend: kind, error });
            }
        }
    }

    Err(VideoError::DeviceInitFailure(InitFailureCause::Exhausted(attempts)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::headless::{self, VirtualDisplay};
    use crate::render::error::{DeviceError, DeviceResult};
    use std::cell::RefCell;
    use std::rc::Rc;

    fn failing(kind: BackendKind) -> impl Fn(&DeviceParams) -> DeviceResult<Box<dyn Device>> {
        move |_| Err(DeviceError::construction(kind, "driver refused"))
    }

    fn headless_table() -> BackendTable {
        BackendTable::new()
            .with(BackendKind::Vulkan, headless::factory(BackendKind::Vulkan, VirtualDisplay::default()))
            .with(BackendKind::OpenGl, headless::factory(BackendKind::OpenGl, VirtualDisplay::default()))
    }

    #[test]
    fn test_plan_follows_priority_not_registration_order() {
        let table = headless_table();
        assert_eq!(plan(VideoMode::Any, &table), vec![BackendKind::OpenGl, BackendKind::Vulkan]);
        assert_eq!(plan(VideoMode::Vulkan, &table), vec![BackendKind::Vulkan]);
        assert_eq!(outcome(VideoMode::Any, &table), SelectionOutcome::OpenGl);
        assert_eq!(outcome(VideoMode::Any, &BackendTable::new()), SelectionOutcome::Failed);
    }

    #[test]
    fn test_any_picks_highest_priority() {
        let device = select_and_construct(VideoMode::Any, &headless_table(), &DeviceParams::default()).unwrap();
        assert_eq!(device.backend(), BackendKind::OpenGl);
    }

    #[test]
    fn test_failed_candidate_falls_through() {
        let tried = Rc::new(RefCell::new(Vec::new()));
        let log = Rc::clone(&tried);
        let table = headless_table().with(BackendKind::OpenGl, move |_: &DeviceParams| {
            log.borrow_mut().push(BackendKind::OpenGl);
            Err(DeviceError::construction(BackendKind::OpenGl, "no context"))
        });

        let device = select_and_construct(VideoMode::Any, &table, &DeviceParams::default()).unwrap();
        assert_eq!(device.backend(), BackendKind::Vulkan);
        assert_eq!(*tried.borrow(), vec![BackendKind::OpenGl]);
    }

    #[test]
    fn test_exhaustion_lists_every_attempt() {
        let table = BackendTable::new()
            .with(BackendKind::OpenGl, failing(BackendKind::OpenGl))
            .with(BackendKind::Vulkan, failing(BackendKind::Vulkan));

        let err = select_and_construct(VideoMode::Any, &table, &DeviceParams::default()).err().unwrap();
        match err {
            VideoError::DeviceInitFailure(InitFailureCause::Exhausted(attempts)) => {
                let kinds: Vec<_> = attempts.iter().map(|a| a.backend).collect();
                assert_eq!(kinds, vec![BackendKind::OpenGl, BackendKind::Vulkan]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_empty_table_fails_for_any() {
        let err = select_and_construct(VideoMode::Any, &BackendTable::new(), &DeviceParams::default()).err().unwrap();
        assert!(matches!(
            err,
            VideoError::DeviceInitFailure(InitFailureCause::Exhausted(ref attempts)) if attempts.is_empty()
        ));
    }

    #[test]
    fn test_unavailable_family_fails_without_trying_others() {
        let table = BackendTable::new().with(BackendKind::OpenGl, |_: &DeviceParams| -> DeviceResult<Box<dyn Device>> {
            panic!("OpenGL must not be tried when Vulkan was requested")
        });

        let err = select_and_construct(VideoMode::Vulkan, &table, &DeviceParams::default()).err().unwrap();
        assert!(matches!(
            err,
            VideoError::DeviceInitFailure(InitFailureCause::Unavailable(VideoMode::Vulkan))
        ));
    }
}
