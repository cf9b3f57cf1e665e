pub mod archive;
pub mod notify;
pub mod templates;

use std::io;

#[derive(thiserror::Error, Debug)]
pub enum BundleError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
}
