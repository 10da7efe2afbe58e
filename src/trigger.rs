//! Revalidation triggers.
//!
//! Subscriptions can be refreshed by external events such as a window
//! regaining focus or a network connection coming back. Those event
//! sources are injected as installers; the engine hands each one a
//! notify callback wired to the subscription's revalidation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::utils::now_ms;

/// Callback a trigger fires to request a revalidation.
pub type Notify = Arc<dyn Fn() + Send + Sync>;

/// Cleanup returned by an installer, run once when the subscription
/// ends.
pub type Teardown = Box<dyn FnOnce() + Send>;

/// Per-installation settings passed to a [`TriggerInstaller`].
#[derive(Debug, Clone, Copy)]
pub struct TriggerConfig {
    /// Minimum spacing in milliseconds between fires delivered to the
    /// same installation. Installers are expected to honor it.
    pub throttle_interval: i64,
}

/// Hooks a notify callback up to an external event source.
///
/// Returns a teardown when there is something to undo.
pub type TriggerInstaller =
    Arc<dyn Fn(Notify, TriggerConfig) -> Option<Teardown> + Send + Sync>;

/// An installer that never fires. This is the default in environments
/// without focus or reconnect events.
pub fn noop_trigger() -> TriggerInstaller {
    Arc::new(|_notify, _config| None)
}

struct Installed {
    id: u64,
    notify: Notify,
    throttle_interval: i64,
    last_fired: Option<i64>,
}

type Installations = Arc<Mutex<Vec<Installed>>>;

/// Handle for firing a [`manual_trigger`] by hand.
#[derive(Clone)]
pub struct TriggerHandle {
    installations: Installations,
}

impl TriggerHandle {
    /// Fire every installation whose throttle window has passed.
    pub fn fire(&self) {
        let now = now_ms();
        let ready: Vec<Notify> = {
            let mut installations = self
                .installations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);

            installations
                .iter_mut()
                .filter(|entry| {
                    entry
                        .last_fired
                        .is_none_or(|last| now - last >= entry.throttle_interval)
                })
                .map(|entry| {
                    entry.last_fired = Some(now);
                    entry.notify.clone()
                })
                .collect()
        };

        for notify in ready {
            notify();
        }
    }

    /// Number of live installations.
    pub fn installed_count(&self) -> usize {
        self.installations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// An installer driven by hand, for tests and server-side wiring.
///
/// Each subscription that installs it registers its notify callback
/// with the returned handle; [`TriggerHandle::fire`] then notifies
/// every registration, honoring each one's throttle interval.
pub fn manual_trigger() -> (TriggerInstaller, TriggerHandle) {
    let installations: Installations = Arc::new(Mutex::new(Vec::new()));
    let ids = AtomicU64::new(0);

    let handle = TriggerHandle {
        installations: installations.clone(),
    };

    let installer: TriggerInstaller = Arc::new(move |notify, config| {
        let id = ids.fetch_add(1, Ordering::SeqCst);

        {
            let mut entries = installations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            entries.push(Installed {
                id,
                notify,
                throttle_interval: config.throttle_interval,
                last_fired: None,
            });
        }

        let installations = installations.clone();
        Some(Box::new(move || {
            let mut entries = installations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            entries.retain(|entry| entry.id != id);
        }) as Teardown)
    });

    (installer, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn counting_notify() -> (Notify, Arc<AtomicUsize>) {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let notify: Notify = Arc::new(move || {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        (notify, count)
    }

    #[test]
    fn test_noop_trigger_installs_nothing() {
        let installer = noop_trigger();
        let (notify, _count) = counting_notify();
        assert!(installer(notify, TriggerConfig { throttle_interval: 0 }).is_none());
    }

    #[test]
    fn test_manual_trigger_fires_installed_notify() {
        let (installer, handle) = manual_trigger();
        let (notify, count) = counting_notify();

        let teardown = installer(notify, TriggerConfig { throttle_interval: 0 });
        assert!(teardown.is_some());
        assert_eq!(handle.installed_count(), 1);

        handle.fire();
        handle.fire();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_manual_trigger_honors_throttle_window() {
        let (installer, handle) = manual_trigger();
        let (notify, count) = counting_notify();

        installer(
            notify,
            TriggerConfig {
                throttle_interval: 5000,
            },
        );

        handle.fire();
        handle.fire();
        handle.fire();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_manual_trigger_fires_again_after_window() {
        let (installer, handle) = manual_trigger();
        let (notify, count) = counting_notify();

        installer(
            notify,
            TriggerConfig {
                throttle_interval: 30,
            },
        );

        handle.fire();
        std::thread::sleep(Duration::from_millis(50));
        handle.fire();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_teardown_removes_installation() {
        let (installer, handle) = manual_trigger();
        let (notify, count) = counting_notify();

        let teardown =
            installer(notify, TriggerConfig { throttle_interval: 0 }).expect("installed");
        teardown();

        assert_eq!(handle.installed_count(), 0);
        handle.fire();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_installations_throttle_independently() {
        let (installer, handle) = manual_trigger();
        let (first, first_count) = counting_notify();
        let (second, second_count) = counting_notify();

        installer(
            first,
            TriggerConfig {
                throttle_interval: 5000,
            },
        );
        installer(second, TriggerConfig { throttle_interval: 0 });

        handle.fire();
        handle.fire();

        assert_eq!(first_count.load(Ordering::SeqCst), 1);
        assert_eq!(second_count.load(Ordering::SeqCst), 2);
    }
}
