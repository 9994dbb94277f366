mod docker;

pub use docker::DockerBackend;
