pub mod string;
pub mod tables;
