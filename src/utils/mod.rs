// Leaf helpers: byte access, text encodings, base64

pub mod base64;
pub mod encoding;
pub mod io;
