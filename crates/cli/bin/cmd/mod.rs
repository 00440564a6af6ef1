pub mod decode;
pub mod layout;
