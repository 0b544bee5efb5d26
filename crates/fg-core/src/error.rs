/// Errors crossing the engine's three user-visible failure surfaces (§7).
///
/// `StopRequested` is deliberately absent: it's an internal queue sentinel
/// ([`fg_queue::Recv::Stop`]) that unwinds consumer loops during shutdown,
/// never something a user callback observes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// `process_frame` raised. Carries the filter's message and propagates
    /// down the kill-tree to every transitively-dependent callback.
    #[error("filter failed: {0}")]
    FilterFailed(String),

    /// `frame_data`/graph wiring raised during construction. Fails only the
    /// top-level request that triggered it.
    #[error("construction failed: {0}")]
    ConstructionFailed(String),

    /// An invariant was violated in the maintainer's own bookkeeping, or a
    /// kill-tree cascade reached an instance with no callback to absorb it.
    /// Not recoverable — the engine logs and aborts the process.
    #[error("fatal engine error: {0}")]
    Fatal(String),
}
