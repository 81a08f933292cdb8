/// Standard registry listing command.
pub mod describe;
/// Wire decode command.
pub mod decode;
/// Wire encode command.
pub mod encode;
/// Prototype flatten command.
pub mod flatten;
/// Flat buffer materialise command.
pub mod unflatten;
/// Shared parsing and rendering helpers.
pub mod util;
