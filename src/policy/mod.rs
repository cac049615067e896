pub mod expbackoff;
pub mod fixed;
pub mod wait;

pub use expbackoff::ExponentialBackoff;
pub use fixed::FixedWait;
pub use wait::{WaitContext, WaitDecision, WaitStrategy, WaitStrategyChain};
