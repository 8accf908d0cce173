pub mod reconstruction;
pub mod sabr_calibrator;
pub mod sabr_model;
pub mod shift;
