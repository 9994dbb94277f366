mod git;

pub use git::GitFetcher;
