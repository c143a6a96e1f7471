//! Mock collaborators for unit and integration tests.

mod mock_client;
mod mock_library;
mod mock_sites;

pub use mock_client::MockDownloadClient;
pub use mock_library::MockMetadataLibrary;
pub use mock_sites::MockSiteRegistry;
