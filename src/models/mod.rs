pub mod bus;
pub mod pass;
pub mod trip;
pub mod wallet;

pub use bus::{Bus, Ref};
pub use pass::{NewPass, Pass, PassUsage};
pub use trip::{Location, NewTrip, Trip, TripCompletion};
pub use wallet::{Wallet, WalletTransaction};
