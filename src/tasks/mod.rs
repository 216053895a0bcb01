pub mod decoder;
pub mod dispatcher;
