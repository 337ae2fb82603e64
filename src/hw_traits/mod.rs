// Register-level helpers, one module per peripheral family. Nothing here checks arguments;
// the public drivers validate before calling in.

pub mod ccp;
pub mod eusart;
pub mod gpio;
pub mod mssp;
pub mod timer;
