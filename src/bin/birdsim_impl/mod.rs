pub mod args;
pub mod compare;
pub mod init;
pub mod matrix;
pub mod relatedness;
pub mod utils;
