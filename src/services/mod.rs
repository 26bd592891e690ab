pub mod ranker;
pub mod recommendations;
pub mod stats;
pub mod taste_profile;

pub use ranker::Ranker;
pub use recommendations::RecommendationService;
pub use taste_profile::TasteProfileComputer;
