pub mod stats;
pub mod utils;

pub mod finetune;
pub mod inference;
