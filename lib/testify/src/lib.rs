pub mod random;
pub mod temp;
pub mod wait;
