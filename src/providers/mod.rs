pub mod alpha_vantage;
pub mod backend;
