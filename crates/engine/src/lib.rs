//! Collateralization-ratio evaluation engine.
//!
//! Turns raw position and price data into a health verdict for each
//! monitored position:
//! 1. `fixed_point` rescales native-decimal integer amounts to the
//!    canonical 10^18 scale
//! 2. `cr_calculator` computes backing collateral, the collateralization
//!    ratio, and the liquidation price (integer arithmetic only)
//! 3. `evaluator` classifies one monitor request per cycle and dispatches
//!    the alert when the ratio falls below the configured threshold
//!
//! External collaborators (store, position data, price feed, messenger)
//! are consumed through the traits in `traits`.

pub mod cr_calculator;
pub mod evaluator;
pub mod fixed_point;
pub mod traits;
