// ============================================================================
// Domain Layer
// ============================================================================
//
// Plain data for the order aggregate and the invariants that live on it.
// Persistence is in src/store (rows) and src/repository (aggregate assembly).
//
// ============================================================================

pub mod order;
