//! Reader adapter implementations, one per reader family.

mod framed;
mod proton;
mod sensx;
mod speedway;

pub use framed::FramedAdapter;
pub use proton::ProtonAdapter;
pub use sensx::SensxAdapter;
pub use speedway::SpeedwayAdapter;
