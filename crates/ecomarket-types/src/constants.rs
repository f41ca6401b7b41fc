//! System-wide constants and defaults for the EcoMarket settlement core.

/// Hold duration applied when a checkout request asks for `<= 0` minutes.
pub const DEFAULT_HOLD_MINUTES: i64 = 30;

/// Upper bound on a requested hold (one week).
pub const MAX_HOLD_MINUTES: i64 = 7 * 24 * 60;

/// Default platform fee taken from every payout, as a fraction (10%).
/// Expressed as `(mantissa, scale)` for `Decimal::new`.
pub const DEFAULT_FEE_RATE: (i64, u32) = (10, 2);

/// Decimal places kept for money amounts produced by fee arithmetic.
pub const MONEY_SCALE: u32 = 2;

/// Default interval between settlement sweeps in milliseconds.
pub const DEFAULT_SWEEP_INTERVAL_MS: u64 = 60_000;

/// Smallest sweep interval accepted from configuration.
pub const MIN_SWEEP_INTERVAL_MS: u64 = 10;

/// Maximum number of items accepted in a single checkout cart.
pub const MAX_CART_ITEMS: usize = 500;

/// Default `RUST_LOG`-style filter used when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Domain separator mixed into every wallet entry hash.
pub const LEDGER_HASH_DOMAIN: &[u8] = b"ecomarket:wallet_tx:v1:";

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Service name.
pub const SERVICE_NAME: &str = "EcoMarket";
