// ============================================================================
// spark-store - Notifier
//
// Pluggable wake-up hook for the UI context that owns bindings.
// ============================================================================
//
// Store change notifications can arrive on any thread. They are queued in
// the owning thread's inbox and the notifier tells the host event loop that
// a `tick()` is due. The notifier is only called when the inbox goes from
// empty to non-empty, so a burst of writes wakes the loop once.
// ============================================================================

use std::sync::mpsc::{self, Receiver, Sender};

// =============================================================================
// NOTIFIER TRAIT
// =============================================================================

/// A wake-up mechanism for a UI context with pending store changes.
///
/// Called from whichever thread performed the store write, so it must be
/// cheap and must not touch the UI context's reactive state.
pub trait Notifier: Send + Sync + 'static {
    /// Signal that `tick()` should run on the owning context.
    fn notify(&self);
}

// =============================================================================
// NOOP NOTIFIER
// =============================================================================

/// A notifier that does nothing. The owning context has to poll.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self) {}
}

// =============================================================================
// CHANNEL NOTIFIER
// =============================================================================

/// Sends `()` on a channel; the event loop blocks or polls on the receiver.
///
/// # Example
///
/// ```
/// use spark_store::{ChannelNotifier, Notifier};
///
/// let (notifier, wake) = ChannelNotifier::new();
/// notifier.notify();
/// assert!(wake.try_recv().is_ok());
/// ```
pub struct ChannelNotifier {
    sender: Sender<()>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiver it wakes.
    pub fn new() -> (Self, Receiver<()>) {
        let (sender, receiver) = mpsc::channel();
        (Self { sender }, receiver)
    }
}

impl Notifier for ChannelNotifier {
    fn notify(&self) {
        // Receiver gone means the loop shut down; nothing left to wake.
        let _ = self.sender.send(());
    }
}

// =============================================================================
// FN NOTIFIER
// =============================================================================

/// Wraps a closure, e.g. a GUI toolkit's "request redraw" handle.
pub struct FnNotifier<F>(pub F);

impl<F> Notifier for FnNotifier<F>
where
    F: Fn() + Send + Sync + 'static,
{
    fn notify(&self) {
        (self.0)()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn noop_notifier_does_nothing() {
        NoopNotifier.notify();
    }

    #[test]
    fn channel_notifier_sends_wake() {
        let (notifier, wake) = ChannelNotifier::new();
        notifier.notify();
        notifier.notify();
        assert_eq!(wake.try_iter().count(), 2);
    }

    #[test]
    fn channel_notifier_survives_dropped_receiver() {
        let (notifier, wake) = ChannelNotifier::new();
        drop(wake);
        notifier.notify();
    }

    #[test]
    fn fn_notifier_calls_closure() {
        let hits = Arc::new(AtomicUsize::new(0));
        let notifier = FnNotifier({
            let hits = hits.clone();
            move || {
                hits.fetch_add(1, Ordering::SeqCst);
            }
        });

        notifier.notify();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
