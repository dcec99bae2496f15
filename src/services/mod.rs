pub mod csv_codec;
pub mod porter;
pub mod upload;
