// Thu Oct 15 2026 - Alex

pub mod address;
pub mod region;

pub use address::Address;
pub use region::Region;
