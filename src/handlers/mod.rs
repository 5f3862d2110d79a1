pub mod passes;
pub mod rides;
pub mod scanner;
pub mod trips;
pub mod wallet;
