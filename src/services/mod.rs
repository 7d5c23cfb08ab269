pub mod catalog;
pub mod deletion;
pub mod file;
pub mod library;
pub mod listing;
pub mod upload;

pub use catalog::MetadataCatalog;
pub use deletion::DeletionService;
pub use file::FileService;
pub use library::UserLibrary;
pub use listing::ListingService;
pub use upload::UploadService;
