//! Host-provided hooks (spec.md §6, "Host-provided hooks").
//!
//! Generalizes the teacher's `Interface` trait (`tx_space`/`tx_start`/
//! `tx_finished`/`tx_byte`) from a fixed four required methods to one
//! required method (`write`) plus defaulted optional ones, since this
//! protocol's host contract has hooks that are genuinely optional
//! (lock claim/release, diagnostics) where the teacher's did not.

/// Everything the engine needs from the outside world to move bytes and,
/// optionally, serialize concurrent sends and receive diagnostics.
pub trait Transport {
    /// Write `bytes` to the transport. The engine assumes every byte is
    /// accepted before this call returns (spec.md §6).
    fn write(&self, bytes: &[u8]);

    /// Claim the send lock. Return `true` on success. The default
    /// implementation reports "no host lock provided": the engine falls
    /// back to its own single-boolean guard (spec.md §4.4, "Send lock").
    fn claim(&self) -> Option<bool> {
        None
    }

    /// Release a lock previously claimed via `claim`. Never called if
    /// `claim` returned `None`.
    fn release(&self) {}

    /// Diagnostic sink; no control-flow impact. The engine also logs
    /// through the `log` crate facade regardless of whether this is
    /// overridden.
    fn report(&self, _message: &str) {}
}
