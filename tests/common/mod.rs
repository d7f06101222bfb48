//! Shared test doubles

pub mod mock_platform;
pub mod mock_vcs;
pub mod recording_progress;

#[allow(unused_imports)]
pub use mock_platform::{MockPlatformService, details, pull_request, ready};
#[allow(unused_imports)]
pub use mock_vcs::MockVcs;
#[allow(unused_imports)]
pub use recording_progress::RecordingProgress;
