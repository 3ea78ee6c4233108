// ============================================================================
// spark-store - Constants
// Flag constants for the reactive graph and store-binding bookkeeping
// ============================================================================

// =============================================================================
// NODE TYPE FLAGS
// =============================================================================

/// Source signal (basic reactive value, e.g. a binding's cache)
pub const SOURCE: u32 = 1 << 0;

/// Node is an effect
pub const EFFECT: u32 = 1 << 2;

/// Effect runs synchronously on creation
pub const RENDER_EFFECT: u32 = 1 << 3;

/// Effect was created by user code
pub const USER_EFFECT: u32 = 1 << 6;

/// Effect backs a binding change listener (`StoreBinding::on_change`)
pub const LISTENER_EFFECT: u32 = 1 << 7;

// =============================================================================
// STATE FLAGS
// =============================================================================

/// Signal/reaction is clean (up-to-date)
pub const CLEAN: u32 = 1 << 10;

/// Signal/reaction is dirty (needs to re-run)
pub const DIRTY: u32 = 1 << 11;

/// Reaction is currently being updated
pub const REACTION_IS_UPDATING: u32 = 1 << 13;

/// Effect has been destroyed
pub const DESTROYED: u32 = 1 << 14;

/// Effect is inert (paused)
pub const INERT: u32 = 1 << 15;

/// Effect has run at least once
pub const EFFECT_RAN: u32 = 1 << 16;

// =============================================================================
// STATUS MASK (for clearing status bits)
// =============================================================================

/// Mask to clear all status bits (CLEAN, DIRTY)
pub const STATUS_MASK: u32 = !(DIRTY | CLEAN);

// =============================================================================
// LIMITS
// =============================================================================

/// Flush rounds before an effect cycle is reported as an infinite loop
pub const MAX_FLUSH_COUNT: u32 = 1000;

// =============================================================================
// TESTS
// =============================================================================
